//! No-op cache provider
//!
//! Always misses, always accepts writes. Used when caching is disabled or
//! when the remote store is unavailable at startup (graceful degradation).

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use std::time::Duration;

/// No-op cache service that never caches anything
///
/// Lock primitives are refused: pretending to hold a lock would break
/// mutual exclusion.
#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    /// Create a new no-op cache service
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        Ok(vec![None; keys.len()])
    }

    async fn multi_set(&self, _entries: &[(String, Vec<u8>)], _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<u64> {
        Ok(0)
    }

    async fn set_if_absent(&self, key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<bool> {
        Err(CacheError::Unsupported(format!(
            "noop cache cannot hold lock key {key}"
        )))
    }

    async fn compare_and_delete(&self, key: &str, _expected: &[u8]) -> CacheResult<bool> {
        Err(CacheError::Unsupported(format!(
            "noop cache cannot release lock key {key}"
        )))
    }

    async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
        Ok(None)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_distributed(&self) -> bool {
        // No state at all, so nothing can diverge between instances
        true
    }
}
