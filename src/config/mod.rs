//! # Configuration
//!
//! Typed configuration for the cache, lock, logging and circuit breaker.
//! Every section has working defaults, so an empty file (or no file at all)
//! yields an in-process Moka cache with the standard TTLs.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cache_aside::config::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // defaults -> optional file -> CACHE_ASIDE__* environment variables
//! let config = AppConfig::load(None)?;
//! println!("backend = {}", config.cache.backend);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::codec::Codec;
use crate::resilience::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ENV_PREFIX;

/// Default TTL for positive entries (one day)
pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;
/// Default TTL for the not-found marker (one minute)
pub const DEFAULT_NOT_FOUND_TTL_SECONDS: u64 = 60;
/// Default namespace for cache keys
pub const DEFAULT_CACHE_PREFIX: &str = "cache";
/// Default namespace for lock keys
pub const DEFAULT_LOCK_PREFIX: &str = "lock";
/// Default lock TTL
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 30;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cache backend and key/TTL policy
    pub cache: CacheConfig,

    /// Distributed lock defaults
    pub lock: LockConfig,

    /// Log output settings
    pub logging: LoggingConfig,

    /// Circuit breaker for distributed cache backends
    pub circuit_breaker: CircuitBreakerSettings,
}

/// Caching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// `redis` | `dragonfly` | `moka` | `memory` | `in-memory`
    pub backend: String,
    pub prefix: String,
    pub codec: Codec,
    pub default_ttl_seconds: u64,
    pub not_found_ttl_seconds: u64,
    /// Per-operation deadline; 0 disables it
    pub operation_timeout_ms: u64,
    /// Fail a read when the cache write after a successful fetch fails
    pub strict_cache_writes: bool,
    pub redis: Option<RedisConfig>,
    pub moka: Option<MokaConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "moka".to_string(),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            codec: Codec::Json,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            not_found_ttl_seconds: DEFAULT_NOT_FOUND_TTL_SECONDS,
            operation_timeout_ms: 0,
            strict_cache_writes: true,
            redis: None,
            moka: None,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn not_found_ttl(&self) -> Duration {
        Duration::from_secs(self.not_found_ttl_seconds)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_ms > 0).then(|| Duration::from_millis(self.operation_timeout_ms))
    }
}

/// Redis connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// `redis://[user:pass@]host:port[/db]`
    pub url: String,
    #[serde(default = "default_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,
}

fn default_connection_timeout_seconds() -> u64 {
    5
}

impl RedisConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

/// Moka in-memory cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MokaConfig {
    pub max_capacity: u64,
}

impl Default for MokaConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// Distributed lock defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    pub prefix: String,
    pub ttl_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_LOCK_PREFIX.to_string(),
            ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive; falls back to an environment-based level
    pub level: Option<String>,
    pub format: LogFormat,
}

/// Circuit breaker settings as they appear in configuration files
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::for_cache();
        Self {
            enabled: true,
            failure_threshold: defaults.failure_threshold,
            timeout_seconds: defaults.timeout.as_secs(),
            success_threshold: defaults.success_threshold,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_resilience_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            timeout: Duration::from_secs(self.timeout_seconds),
            success_threshold: self.success_threshold,
        }
    }
}

impl AppConfig {
    /// Reject configurations that would misbehave at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        let cache = &self.cache;

        if cache.default_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.default_ttl_seconds",
                cache.default_ttl_seconds,
                "must be greater than 0",
            ));
        }

        if cache.not_found_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.not_found_ttl_seconds",
                cache.not_found_ttl_seconds,
                "must be greater than 0",
            ));
        }

        if cache.not_found_ttl_seconds > cache.default_ttl_seconds {
            return Err(ConfigurationError::invalid_value(
                "cache.not_found_ttl_seconds",
                cache.not_found_ttl_seconds,
                "must not exceed cache.default_ttl_seconds",
            ));
        }

        if cache.enabled
            && matches!(cache.backend.as_str(), "redis" | "dragonfly")
            && cache.redis.is_none()
        {
            return Err(ConfigurationError::MissingRequiredField {
                field: "cache.redis.url".to_string(),
                context: format!("backend '{}'", cache.backend),
            });
        }

        if self.lock.ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "lock.ttl_seconds",
                self.lock.ttl_seconds,
                "must be greater than 0",
            ));
        }

        if self.circuit_breaker.enabled {
            self.circuit_breaker
                .to_resilience_config()
                .validate()
                .map_err(|reason| {
                    ConfigurationError::invalid_value("circuit_breaker", "<section>", reason)
                })?;
        }

        Ok(())
    }
}
