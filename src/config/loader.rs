//! Configuration Loader
//!
//! Layers sources in increasing precedence:
//!
//! 1. Built-in defaults (`#[serde(default)]` on every section)
//! 2. `cache-aside.{toml,yaml,json}` in the working directory, if present
//! 3. An explicit file passed by the caller (must exist)
//! 4. `CACHE_ASIDE__<SECTION>__<FIELD>` environment variables
//!
//! The merged result is validated before it is returned.

use super::error::ConfigResult;
use super::AppConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Prefix for environment overrides, e.g. `CACHE_ASIDE__CACHE__BACKEND=redis`
pub const ENV_PREFIX: &str = "CACHE_ASIDE";

const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_BASENAME: &str = "cache-aside";

impl AppConfig {
    /// Load configuration from the default file, `path` and the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_environment(path, None)
    }

    /// Load configuration with an explicit environment map instead of the
    /// process environment. `None` reads the real environment.
    pub fn load_with_environment(
        path: Option<&Path>,
        environment: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(environment),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            backend = %config.cache.backend,
            prefix = %config.cache.prefix,
            codec = ?config.cache.codec,
            default_ttl_seconds = config.cache.default_ttl_seconds,
            not_found_ttl_seconds = config.cache.not_found_ttl_seconds,
            "Configuration loaded"
        );

        Ok(config)
    }
}
