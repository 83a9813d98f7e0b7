//! Cache service trait definition

use super::errors::CacheResult;
use std::future::Future;
use std::time::Duration;

/// Longest TTL a backend will store (ten years); longer values are clamped
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Bound `ttl` to [`MAX_TTL`]
pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.min(MAX_TTL)
}

/// Byte-level operations every cache backend provides
///
/// Implemented by concrete cache providers (Redis, Moka, NoOp) and by
/// [`CacheProvider`](super::CacheProvider) itself. Keys arrive already
/// namespaced; values arrive already encoded.
pub trait CacheService: Send + Sync {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<Vec<u8>>>> + Send;

    /// Set a value in the cache with a TTL
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Get several keys at once, positionally aligned with `keys`
    fn multi_get(
        &self,
        keys: &[String],
    ) -> impl Future<Output = CacheResult<Vec<Option<Vec<u8>>>>> + Send;

    /// Store several entries sharing one TTL in a single request
    fn multi_set(
        &self,
        entries: &[(String, Vec<u8>)],
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Delete keys, returning how many existed
    fn delete(&self, keys: &[String]) -> impl Future<Output = CacheResult<u64>> + Send;

    /// Store `value` only when `key` is absent. Returns `true` when stored.
    fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Atomically delete `key` only if it currently holds `expected`.
    /// Returns `true` when an entry was removed.
    fn compare_and_delete(
        &self,
        key: &str,
        expected: &[u8],
    ) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Remaining time to live of `key`, `None` when absent or persistent
    fn ttl(&self, key: &str) -> impl Future<Output = CacheResult<Option<Duration>>> + Send;

    /// Check if the cache backend is healthy
    fn health_check(&self) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes
    fn is_distributed(&self) -> bool;
}
