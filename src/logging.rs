//! # Logging
//!
//! Console logging through `tracing-subscriber`, suitable for containers:
//! everything goes to stdout, ANSI colours only when attached to a terminal.
//!
//! Initialisation is idempotent. If another global subscriber is already
//! installed (an embedding application, a test harness) it is left in place.
//!
//! Level selection, first match wins:
//! 1. `logging.level` from configuration
//! 2. `LOG_LEVEL`, then `RUST_LOG`
//! 3. a default for the environment named by `CACHE_ASIDE_ENV` / `APP_ENV`

use crate::config::{LogFormat, LoggingConfig};
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialise pretty console logging with environment defaults
pub fn init_console_only() {
    init_tracing(&LoggingConfig::default());
}

/// Initialise console logging from configuration
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = match config.format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed(),
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                level = %log_level,
                format = ?config.format,
                ansi_colors = use_ansi,
                "Console logging initialized"
            );
        }
    });
}

/// Current environment name, `development` when unset
pub fn get_environment() -> String {
    std::env::var("CACHE_ASIDE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Log level from `LOG_LEVEL` / `RUST_LOG`, else the environment default
pub fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        return level.to_lowercase();
    }

    if let Ok(level) = std::env::var("RUST_LOG") {
        return level.to_lowercase();
    }

    default_level_for(environment).to_string()
}

fn default_level_for(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
