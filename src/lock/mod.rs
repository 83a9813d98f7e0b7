//! # Distributed lock
//!
//! Mutual exclusion through the cache store. Each [`DistributedLock`] owns a
//! random token for its whole lifetime:
//!
//! - `lock()` stores the token with `set_if_absent` and a TTL;
//! - `unlock()` deletes the key only if it still holds this token, as one
//!   atomic operation in the store.
//!
//! An instance whose TTL ran out can therefore never release a lock that
//! another instance has since acquired.
//!
//! Contention is not an error: `lock()` returns `Ok(false)`. The caller
//! chooses its retry policy.
//!
//! ```rust
//! use cache_aside::cache::MokaCacheService;
//! use cache_aside::lock::{DistributedLock, LockOptions};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MokaCacheService::new(1_000));
//! let lock = DistributedLock::new(Arc::clone(&store), "job:7", LockOptions::default())?;
//! let rival = DistributedLock::new(store, "job:7", LockOptions::default())?;
//!
//! assert!(lock.lock().await?);
//! assert!(!rival.lock().await?);
//! assert!(lock.unlock().await?);
//! # Ok::<(), cache_aside::lock::LockError>(())
//! # }).unwrap();
//! ```

use crate::cache::{build_cache_key, CacheError, CacheService};
use crate::config::{LockConfig, DEFAULT_LOCK_PREFIX, DEFAULT_LOCK_TTL_SECONDS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("invalid lock key: {0}")]
    InvalidKey(String),

    #[error("lock ttl must be greater than zero (key '{0}')")]
    InvalidTtl(String),

    #[error("lock backend error on '{key}': {source}")]
    Backend { key: String, source: CacheError },
}

pub type LockResult<T> = Result<T, LockError>;

/// Key namespace and TTL for a lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    pub prefix: String,
    pub ttl: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_LOCK_PREFIX.to_string(),
            ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECONDS),
        }
    }
}

impl From<&LockConfig> for LockOptions {
    fn from(config: &LockConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            ttl: config.ttl(),
        }
    }
}

/// A named lock held through a shared cache store
#[derive(Debug)]
pub struct DistributedLock<S> {
    store: Arc<S>,
    key: String,
    token: String,
    ttl: Duration,
}

impl<S: CacheService> DistributedLock<S> {
    /// Create a lock on `prefix:key` with a fresh token.
    ///
    /// A zero TTL is rejected: the record would expire as it is written.
    pub fn new(store: Arc<S>, key: &str, options: LockOptions) -> LockResult<Self> {
        let key = build_cache_key(&options.prefix, key)
            .map_err(|e| LockError::InvalidKey(e.to_string()))?;
        if options.ttl.is_zero() {
            return Err(LockError::InvalidTtl(key));
        }

        if !store.is_distributed() {
            debug!(key = %key, backend = store.provider_name(), "Lock store is process-local");
        }

        Ok(Self {
            store,
            key,
            token: Uuid::new_v4().to_string(),
            ttl: options.ttl,
        })
    }

    pub fn from_config(store: Arc<S>, key: &str, config: &LockConfig) -> LockResult<Self> {
        Self::new(store, key, LockOptions::from(config))
    }

    /// Try to acquire. `Ok(false)` means another holder has it.
    pub async fn lock(&self) -> LockResult<bool> {
        let acquired = self
            .store
            .set_if_absent(&self.key, self.token.as_bytes(), self.ttl)
            .await
            .map_err(|source| self.backend_error(source))?;

        debug!(
            key = %self.key,
            acquired = acquired,
            ttl_ms = self.ttl.as_millis() as u64,
            "Lock attempt"
        );
        Ok(acquired)
    }

    /// Release if still held by this instance. `Ok(false)` means the lock
    /// had expired or belongs to someone else; nothing was deleted.
    pub async fn unlock(&self) -> LockResult<bool> {
        let released = self
            .store
            .compare_and_delete(&self.key, self.token.as_bytes())
            .await
            .map_err(|source| self.backend_error(source))?;

        if released {
            debug!(key = %self.key, "Lock released");
        } else {
            warn!(key = %self.key, "Unlock skipped: lock not held by this instance");
        }
        Ok(released)
    }

    /// This instance's token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Fully namespaced lock key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn backend_error(&self, source: CacheError) -> LockError {
        LockError::Backend {
            key: self.key.clone(),
            source,
        }
    }
}
