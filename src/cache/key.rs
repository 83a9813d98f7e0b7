//! Cache key namespacing

use super::errors::{CacheError, CacheResult};

/// Delimiter placed between a prefix and the caller's key
pub const KEY_DELIMITER: &str = ":";

/// Build a namespaced cache key.
///
/// An empty prefix leaves the key untouched. An empty key is rejected.
pub fn build_cache_key(prefix: &str, key: &str) -> CacheResult<String> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey(
            "cache key must not be empty".to_string(),
        ));
    }

    if prefix.is_empty() {
        return Ok(key.to_string());
    }

    Ok(format!("{prefix}{KEY_DELIMITER}{key}"))
}
