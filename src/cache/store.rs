//! Typed cache facade
//!
//! [`Cache`] sits on top of any [`CacheService`] and adds key namespacing,
//! value encoding, default and negative TTLs, and an optional per-operation
//! deadline. Reads return a tagged [`CacheValue`] so a negative hit is an
//! outcome rather than an error.

use super::errors::{CacheError, CacheResult};
use super::key::build_cache_key;
use super::provider::CacheProvider;
use super::traits::CacheService;
use crate::codec::Codec;
use crate::config::{AppConfig, CacheConfig, DEFAULT_NOT_FOUND_TTL_SECONDS, DEFAULT_TTL_SECONDS};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Stored in place of a value for keys confirmed absent at the origin.
/// Neither codec can produce this payload.
pub const NOT_FOUND_PLACEHOLDER: &[u8] = b"*";

/// Outcome of a single cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue<T> {
    Hit(T),
    Miss,
    /// The key holds the not-found marker
    Placeholder,
}

impl<T> CacheValue<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss | Self::Placeholder => None,
        }
    }
}

/// Result of a batch read, keyed by the caller's (unprefixed) keys
#[derive(Debug)]
pub struct MultiGet<T> {
    /// `Hit` or `Placeholder` for every key present in the store
    pub values: HashMap<String, CacheValue<T>>,
    /// Keys whose stored payload could not be decoded
    pub corrupt: HashMap<String, CacheError>,
}

impl<T> Default for MultiGet<T> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            corrupt: HashMap::new(),
        }
    }
}

/// Typed, namespaced cache over a byte-level store
#[derive(Debug)]
pub struct Cache<S = CacheProvider> {
    store: Arc<S>,
    codec: Codec,
    prefix: Arc<str>,
    default_ttl: Duration,
    not_found_ttl: Duration,
    operation_timeout: Option<Duration>,
}

impl<S> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: self.codec,
            prefix: Arc::clone(&self.prefix),
            default_ttl: self.default_ttl,
            not_found_ttl: self.not_found_ttl,
            operation_timeout: self.operation_timeout,
        }
    }
}

impl Cache<CacheProvider> {
    /// Build the provider described by `config` and wrap it
    pub async fn from_config(config: &AppConfig) -> Self {
        let provider =
            CacheProvider::from_config_graceful(&config.cache, Some(&config.circuit_breaker)).await;
        Self::with_config(provider, &config.cache)
    }
}

impl<S: CacheService> Cache<S> {
    /// Wrap `store` with the default prefix, codec and TTLs
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Wrap a store that is shared with other components (e.g. a lock)
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            codec: Codec::default(),
            prefix: Arc::from(crate::config::DEFAULT_CACHE_PREFIX),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            not_found_ttl: Duration::from_secs(DEFAULT_NOT_FOUND_TTL_SECONDS),
            operation_timeout: None,
        }
    }

    /// Wrap `store` using the prefix, codec, TTLs and timeout from `config`
    pub fn with_config(store: S, config: &CacheConfig) -> Self {
        Self::new(store)
            .with_prefix(config.prefix.as_str())
            .with_codec(config.codec)
            .with_default_ttl(config.default_ttl())
            .with_not_found_ttl(config.not_found_ttl())
            .with_operation_timeout(config.operation_timeout())
    }

    pub fn with_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_not_found_ttl(mut self, ttl: Duration) -> Self {
        self.not_found_ttl = ttl;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn not_found_ttl(&self) -> Duration {
        self.not_found_ttl
    }

    /// Namespace `key` with this cache's prefix
    pub fn build_key(&self, key: &str) -> CacheResult<String> {
        build_cache_key(&self.prefix, key)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        key: &str,
        call: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        let Some(limit) = self.operation_timeout else {
            return call.await;
        };

        tokio::time::timeout(limit, call).await.map_err(|_| {
            CacheError::Timeout(format!(
                "{} on '{}' exceeded {}ms",
                operation,
                key,
                limit.as_millis()
            ))
        })?
    }

    fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() {
            self.default_ttl
        } else {
            ttl
        }
    }

    fn classify<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> CacheResult<CacheValue<T>> {
        if bytes.is_empty() {
            return Ok(CacheValue::Miss);
        }
        if bytes == NOT_FOUND_PLACEHOLDER {
            return Ok(CacheValue::Placeholder);
        }

        self.codec
            .decode(bytes)
            .map(CacheValue::Hit)
            .map_err(|e| CacheError::DeserializationError(format!("key '{}': {}", key, e)))
    }

    /// Read and decode `key`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<CacheValue<T>> {
        let full_key = self.build_key(key)?;
        let bytes = self
            .timed("get", &full_key, self.store.get(&full_key))
            .await?;

        match bytes {
            None => Ok(CacheValue::Miss),
            Some(bytes) => self.classify(&full_key, &bytes),
        }
    }

    /// Encode and store `value`. A zero `ttl` applies the default TTL.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let full_key = self.build_key(key)?;
        let bytes = self.codec.encode(value).map_err(|e| {
            CacheError::SerializationError(format!("key '{}': {}", full_key, e))
        })?;
        let ttl = self.effective_ttl(ttl);

        self.timed("set", &full_key, self.store.set(&full_key, &bytes, ttl))
            .await
    }

    /// Batch read. Absent keys are omitted; undecodable entries are
    /// reported in [`MultiGet::corrupt`].
    pub async fn multi_get<T, K>(&self, keys: &[K]) -> CacheResult<MultiGet<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(MultiGet::default());
        }

        let full_keys = keys
            .iter()
            .map(|k| self.build_key(k.as_ref()))
            .collect::<CacheResult<Vec<_>>>()?;
        let payloads = self
            .timed("multi_get", self.prefix(), self.store.multi_get(&full_keys))
            .await?;

        let mut result = MultiGet::default();
        for ((key, full_key), payload) in keys.iter().zip(&full_keys).zip(payloads) {
            let Some(bytes) = payload else { continue };

            match self.classify(full_key, &bytes) {
                Ok(CacheValue::Miss) => {}
                Ok(value) => {
                    result.values.insert(key.as_ref().to_string(), value);
                }
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Skipping undecodable cache entry");
                    result.corrupt.insert(key.as_ref().to_string(), e);
                }
            }
        }

        Ok(result)
    }

    /// Batch write with one uniform TTL. Items that fail to encode are
    /// skipped; returns how many were written.
    pub async fn multi_set<T: Serialize>(
        &self,
        values: &HashMap<String, T>,
        ttl: Duration,
    ) -> CacheResult<usize> {
        let mut entries = Vec::with_capacity(values.len());
        for (key, value) in values {
            let full_key = self.build_key(key)?;
            match self.codec.encode(value) {
                Ok(bytes) => entries.push((full_key, bytes)),
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Skipping unencodable cache value");
                }
            }
        }

        if entries.is_empty() {
            return Ok(0);
        }

        let ttl = self.effective_ttl(ttl);
        self.timed(
            "multi_set",
            self.prefix(),
            self.store.multi_set(&entries, ttl),
        )
        .await?;

        debug!(count = entries.len(), ttl_ms = ttl.as_millis() as u64, "Cache multi_set");
        Ok(entries.len())
    }

    /// Delete keys; absent keys are not an error
    pub async fn del<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let full_keys = keys
            .iter()
            .map(|k| self.build_key(k.as_ref()))
            .collect::<CacheResult<Vec<_>>>()?;

        self.timed("del", self.prefix(), self.store.delete(&full_keys))
            .await
    }

    /// Record `key` as confirmed absent for the negative TTL
    pub async fn set_cache_with_not_found(&self, key: &str) -> CacheResult<()> {
        let full_key = self.build_key(key)?;

        self.timed(
            "set_cache_with_not_found",
            &full_key,
            self.store
                .set(&full_key, NOT_FOUND_PLACEHOLDER, self.not_found_ttl),
        )
        .await
        .map_err(|e| CacheError::NotFoundMarker(format!("key '{}': {}", full_key, e)))?;

        debug!(
            key = %full_key,
            ttl_ms = self.not_found_ttl.as_millis() as u64,
            "Cached not-found marker"
        );
        Ok(())
    }

    /// Remaining time to live of `key`
    pub async fn remaining_ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let full_key = self.build_key(key)?;
        self.timed("ttl", &full_key, self.store.ttl(&full_key)).await
    }

    pub async fn health_check(&self) -> CacheResult<bool> {
        self.timed("health_check", self.prefix(), self.store.health_check())
            .await
    }
}
