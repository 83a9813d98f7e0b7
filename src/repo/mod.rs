//! # Cache-aside repository
//!
//! [`Repo::query_with_cache`] reads through the cache:
//!
//! 1. a hit fills the destination and returns;
//! 2. a not-found marker empties the destination and returns;
//! 3. a miss runs the origin fetch once per key across concurrent callers,
//!    caching the value or, when the origin has nothing, the not-found
//!    marker for the short negative TTL.
//!
//! ```rust,no_run
//! use cache_aside::cache::{Cache, MokaCacheService};
//! use cache_aside::repo::{FetchError, Record, Repo};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), cache_aside::repo::RepoError> {
//! let repo = Repo::new(Cache::new(MokaCacheService::new(10_000)));
//! let mut name: Record<String> = Record::default();
//! repo.query_with_cache("user:42:name", &mut name, Duration::ZERO, || async {
//!     Err::<Record<String>, _>(FetchError::NotFound)
//! })
//! .await?;
//! assert!(name.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod shape;

pub use errors::{FetchError, RepoError};
pub use shape::{Record, Records, Shape, EMPTY_RECORDS_CAPACITY};

use crate::cache::{Cache, CacheProvider, CacheService, CacheValue};
use crate::config::AppConfig;
use crate::single_flight::SingleFlight;
use std::any::{type_name, Any};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one coalesced origin load, shared by every waiter on the key
#[derive(Clone)]
enum Outcome {
    Found(Arc<dyn Any + Send + Sync>),
    Absent,
}

type Flight = SingleFlight<Result<Outcome, RepoError>>;

/// Cache-aside reads with request coalescing and negative caching
pub struct Repo<S = CacheProvider> {
    cache: Cache<S>,
    flight: Flight,
    strict_cache_writes: bool,
}

impl<S> Clone for Repo<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            flight: self.flight.clone(),
            strict_cache_writes: self.strict_cache_writes,
        }
    }
}

impl<S> std::fmt::Debug for Repo<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("flight", &self.flight)
            .field("strict_cache_writes", &self.strict_cache_writes)
            .finish()
    }
}

impl Repo<CacheProvider> {
    /// Build the cache provider and repository described by `config`
    pub async fn from_config(config: &AppConfig) -> Self {
        Self::new(Cache::from_config(config).await)
            .with_strict_cache_writes(config.cache.strict_cache_writes)
    }
}

impl<S: CacheService + 'static> Repo<S> {
    pub fn new(cache: Cache<S>) -> Self {
        Self {
            cache,
            flight: SingleFlight::new(),
            strict_cache_writes: true,
        }
    }

    /// When `false`, a failed cache write after a successful fetch is logged
    /// and the fetched value is still returned.
    pub fn with_strict_cache_writes(mut self, strict: bool) -> Self {
        self.strict_cache_writes = strict;
        self
    }

    pub fn cache(&self) -> &Cache<S> {
        &self.cache
    }

    /// Number of keys currently being loaded from the origin
    pub fn loads_in_flight(&self) -> usize {
        self.flight.in_flight()
    }

    /// Fill `dest` from the cache, or from `fetch` on a miss.
    ///
    /// `ttl` applies to the positive entry; zero uses the cache default.
    /// Concurrent callers on the same key share a single `fetch` and its
    /// result, including its error.
    pub async fn query_with_cache<D, F, Fut>(
        &self,
        key: &str,
        dest: &mut D,
        ttl: Duration,
        fetch: F,
    ) -> Result<(), RepoError>
    where
        D: Shape,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<D, FetchError>> + Send + 'static,
    {
        match self.cache.get::<D>(key).await {
            Ok(CacheValue::Hit(value)) => {
                *dest = value;
                return Ok(());
            }
            Ok(CacheValue::Placeholder) => {
                debug!(key = key, "Negative cache hit");
                dest.set_empty();
                return Ok(());
            }
            Ok(CacheValue::Miss) => {}
            Err(source) => {
                return Err(RepoError::CacheRead {
                    key: key.to_string(),
                    source,
                })
            }
        }

        let cache = self.cache.clone();
        let strict = self.strict_cache_writes;
        let owned_key = key.to_string();

        let outcome = self
            .flight
            .work(key, move || {
                let fetched = fetch();
                load_from_origin(cache, owned_key, ttl, strict, fetched)
            })
            .await
            .map_err(|source| RepoError::Coalesce {
                key: key.to_string(),
                source,
            })??;

        match outcome {
            Outcome::Absent => dest.set_empty(),
            Outcome::Found(value) => {
                let value = value
                    .downcast_ref::<D>()
                    .ok_or_else(|| RepoError::ShapeMismatch {
                        key: key.to_string(),
                        expected: type_name::<D>(),
                    })?;
                *dest = value.clone();
            }
        }

        Ok(())
    }

    /// Best-effort invalidation; failures are logged, never returned
    pub async fn del_cache(&self, key: &str) {
        match self.cache.del(&[key]).await {
            Ok(deleted) => debug!(key = key, deleted = deleted, "Cache invalidated"),
            Err(e) => warn!(key = key, error = %e, "Cache invalidation failed"),
        }
    }
}

async fn load_from_origin<S, D, Fut>(
    cache: Cache<S>,
    key: String,
    ttl: Duration,
    strict_cache_writes: bool,
    fetched: Fut,
) -> Result<Outcome, RepoError>
where
    S: CacheService + 'static,
    D: Shape,
    Fut: Future<Output = Result<D, FetchError>> + Send + 'static,
{
    match fetched.await {
        Ok(value) => {
            if let Err(source) = cache.set(&key, &value, ttl).await {
                if strict_cache_writes {
                    return Err(RepoError::CacheWrite { key, source });
                }
                warn!(key = %key, error = %source, "Cache write failed, returning fetched value");
            }
            Ok(Outcome::Found(Arc::new(value)))
        }
        Err(FetchError::NotFound | FetchError::EmptyResult) => {
            if let Err(e) = cache.set_cache_with_not_found(&key).await {
                warn!(key = %key, error = %e, "Failed to cache not-found marker");
            }
            Ok(Outcome::Absent)
        }
        Err(FetchError::Source(message)) => Err(RepoError::Fetch { key, message }),
    }
}
