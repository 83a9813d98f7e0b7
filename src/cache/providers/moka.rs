//! In-memory cache provider using Moka
//!
//! Provides in-process caching with per-entry TTL for single-instance
//! deployments and tests.
//!
//! **Important**: This cache is NOT distributed. Each process maintains its own
//! cache state, so a lock taken here only excludes callers in the same process.

use crate::cache::errors::CacheResult;
use crate::cache::traits::{clamp_ttl, CacheService};
use crate::config::MokaConfig;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Stored payload plus the TTL it was written with
#[derive(Debug)]
struct StoredEntry {
    bytes: Vec<u8>,
    ttl: Duration,
    expires_at: Instant,
}

impl StoredEntry {
    fn new(bytes: Vec<u8>, ttl: Duration) -> Arc<Self> {
        let ttl = clamp_ttl(ttl);
        let now = Instant::now();
        Arc::new(Self {
            bytes,
            ttl,
            expires_at: now.checked_add(ttl).unwrap_or(now),
        })
    }
}

/// Expiry policy reading the TTL carried by each entry
struct PerEntryExpiry;

impl Expiry<String, Arc<StoredEntry>> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<StoredEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(clamp_ttl(value.ttl))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<StoredEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(clamp_ttl(value.ttl))
    }
}

/// In-memory cache service using Moka
#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, Arc<StoredEntry>>,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaCacheService {
    /// Create a new Moka cache service from configuration
    pub fn from_config(config: &MokaConfig) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        debug!(
            max_capacity = config.max_capacity,
            "Moka in-memory cache service created"
        );

        Self { cache }
    }

    /// Create with an explicit capacity (for testing)
    pub fn new(max_capacity: u64) -> Self {
        Self::from_config(&MokaConfig { max_capacity })
    }
}

impl CacheService for MokaCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let result = self.cache.get(key).await.map(|entry| entry.bytes.clone());

        if result.is_some() {
            debug!(key = key, "Cache HIT (moka)");
        } else {
            debug!(key = key, "Cache MISS (moka)");
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.cache
            .insert(key.to_string(), StoredEntry::new(value.to_vec(), ttl))
            .await;

        debug!(key = key, ttl_ms = ttl.as_millis() as u64, "Cache SET (moka)");
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.cache.get(key).await.map(|entry| entry.bytes.clone()));
        }
        Ok(values)
    }

    async fn multi_set(&self, entries: &[(String, Vec<u8>)], ttl: Duration) -> CacheResult<()> {
        for (key, value) in entries {
            self.cache
                .insert(key.clone(), StoredEntry::new(value.clone(), ttl))
                .await;
        }

        debug!(count = entries.len(), "Cache MSET (moka)");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        let mut deleted = 0;
        for key in keys {
            if self.cache.remove(key).await.is_some() {
                deleted += 1;
            }
        }

        debug!(keys = ?keys, deleted = deleted, "Cache DEL (moka)");
        Ok(deleted)
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let stored = StoredEntry::new(value.to_vec(), ttl);
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(async move { stored })
            .await;

        Ok(entry.is_fresh())
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> CacheResult<bool> {
        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().bytes == expected => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::Removed(_)))
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        Ok(self
            .cache
            .get(key)
            .await
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now())))
    }

    async fn health_check(&self) -> CacheResult<bool> {
        // In-memory cache is always healthy
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}
