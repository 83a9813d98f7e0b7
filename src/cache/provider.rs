//! Cache provider with integrated circuit breaker
//!
//! Uses enum dispatch over the compiled-in backends. Circuit breaker
//! protection is internal: consumers use `CacheProvider` and get fail-fast
//! behaviour for distributed backends automatically.

use super::errors::{CacheError, CacheResult};
use super::providers::NoOpCacheService;
use super::traits::CacheService;
use crate::config::{CacheConfig, CircuitBreakerSettings};
use crate::resilience::{CircuitBreaker, CircuitState};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

#[cfg(feature = "cache-moka")]
use super::providers::MokaCacheService;

/// Internal cache backend enum for zero-cost dispatch
#[derive(Debug, Clone)]
enum CacheBackend {
    /// Redis or Dragonfly (boxed to reduce enum size)
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),

    /// Moka in-memory cache
    #[cfg(feature = "cache-moka")]
    Moka(Box<MokaCacheService>),

    /// Always miss, always succeed
    NoOp(NoOpCacheService),
}

/// Forward a call to whichever backend is active
macro_rules! dispatch {
    ($backend:expr, $svc:ident => $call:expr) => {
        match $backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis($svc) => $call,
            #[cfg(feature = "cache-moka")]
            CacheBackend::Moka($svc) => $call,
            CacheBackend::NoOp($svc) => $call,
        }
    };
}

impl CacheBackend {
    fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    fn is_distributed(&self) -> bool {
        dispatch!(self, s => s.is_distributed())
    }

    fn provider_name(&self) -> &'static str {
        dispatch!(self, s => s.provider_name())
    }
}

/// Cache provider with circuit breaker protection for distributed backends
///
/// ## Backends
///
/// - **Redis/Dragonfly**: shared across processes; required for a lock that
///   excludes other hosts
/// - **Moka**: in-process only
/// - **NoOp**: always-miss fallback when caching is disabled or unreachable
///
/// ## Circuit Breaker
///
/// When the circuit is open:
/// - `get()` / `multi_get()` / `ttl()` behave as misses
/// - `health_check()` returns `Ok(false)`
/// - every mutation (`set()`, `multi_set()`, `delete()`, `set_if_absent()`,
///   `compare_and_delete()`) fails with [`CacheError::CircuitOpen`]; a
///   dropped write or invalidation is never reported as success
#[derive(Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl std::fmt::Debug for CacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheProvider")
            .field("backend", &self.backend)
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .finish()
    }
}

impl CacheProvider {
    /// Create a cache provider from configuration with graceful degradation
    ///
    /// A Redis backend that cannot be reached at startup is replaced by the
    /// NoOp provider with a warning; startup never fails because of the cache.
    /// Pass `cb_settings` to protect distributed backends with a circuit breaker.
    pub async fn from_config_graceful(
        config: &CacheConfig,
        cb_settings: Option<&CircuitBreakerSettings>,
    ) -> Self {
        let backend = Self::create_backend(config).await;

        let circuit_breaker = if backend.is_distributed() && backend.is_enabled() {
            cb_settings.filter(|s| s.enabled).map(|settings| {
                info!(
                    failure_threshold = settings.failure_threshold,
                    timeout_seconds = settings.timeout_seconds,
                    "Cache circuit breaker initialized"
                );
                Arc::new(CircuitBreaker::new(
                    "cache".to_string(),
                    settings.to_resilience_config(),
                ))
            })
        } else {
            None
        };

        Self {
            backend,
            circuit_breaker,
        }
    }

    async fn create_backend(config: &CacheConfig) -> CacheBackend {
        if !config.enabled {
            info!("Cache disabled by configuration");
            return CacheBackend::NoOp(NoOpCacheService::new());
        }

        match config.backend.as_str() {
            // Dragonfly speaks the Redis protocol
            "redis" | "dragonfly" => Self::create_redis_backend(config).await,
            "moka" | "memory" | "in-memory" => Self::create_moka_backend(config),
            other => {
                warn!(backend = other, "Unknown cache backend, falling back to NoOp");
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        }
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        let Some(redis_config) = &config.redis else {
            warn!("Redis cache enabled but no [cache.redis] config found, falling back to NoOp");
            return CacheBackend::NoOp(NoOpCacheService::new());
        };

        match RedisCacheService::from_config(redis_config).await {
            Ok(service) => {
                info!(backend = "redis", "Distributed cache provider initialized");
                CacheBackend::Redis(Box::new(service))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp cache (graceful degradation)"
                );
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis_backend(_config: &CacheConfig) -> CacheBackend {
        warn!("Redis cache backend requested but 'cache-redis' feature not enabled, using NoOp");
        CacheBackend::NoOp(NoOpCacheService::new())
    }

    #[cfg(feature = "cache-moka")]
    fn create_moka_backend(config: &CacheConfig) -> CacheBackend {
        let moka_config = config.moka.clone().unwrap_or_default();
        let service = MokaCacheService::from_config(&moka_config);
        info!(
            backend = "moka",
            max_capacity = moka_config.max_capacity,
            "In-memory cache provider initialized"
        );
        CacheBackend::Moka(Box::new(service))
    }

    #[cfg(not(feature = "cache-moka"))]
    fn create_moka_backend(_config: &CacheConfig) -> CacheBackend {
        warn!("Moka cache backend requested but 'cache-moka' feature not enabled, using NoOp");
        CacheBackend::NoOp(NoOpCacheService::new())
    }

    /// Create a NoOp provider (for explicit opt-out or testing)
    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
            circuit_breaker: None,
        }
    }

    /// Wrap an existing Moka service
    #[cfg(feature = "cache-moka")]
    pub fn moka(service: MokaCacheService) -> Self {
        Self {
            backend: CacheBackend::Moka(Box::new(service)),
            circuit_breaker: None,
        }
    }

    /// Wrap an existing Redis service, optionally behind a circuit breaker
    #[cfg(feature = "cache-redis")]
    pub fn redis(service: RedisCacheService, circuit_breaker: Option<Arc<CircuitBreaker>>) -> Self {
        Self {
            backend: CacheBackend::Redis(Box::new(service)),
            circuit_breaker,
        }
    }

    /// Protect this provider with `circuit_breaker`. Has no effect on NoOp.
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    /// Check if caching is actually enabled (not NoOp)
    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    /// Current circuit breaker state, `None` when no breaker is configured
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    fn active_breaker(&self) -> Option<&CircuitBreaker> {
        if self.backend.is_enabled() {
            self.circuit_breaker.as_deref()
        } else {
            None
        }
    }

    /// Run `call` through the circuit breaker; `when_open` supplies the
    /// result when the circuit refuses the call.
    async fn guarded<T, F>(
        &self,
        operation: &'static str,
        when_open: impl FnOnce() -> CacheResult<T>,
        call: F,
    ) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let Some(cb) = self.active_breaker() else {
            return call.await;
        };

        if !cb.should_allow() {
            debug!(operation = operation, "Cache circuit open, call refused");
            return when_open();
        }

        let start = Instant::now();
        let result = call.await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => cb.record_success_manual(duration),
            Err(_) => cb.record_failure_manual(duration),
        }

        result
    }

    fn circuit_open_error(&self, operation: &str) -> CacheError {
        CacheError::CircuitOpen(format!(
            "{} refused by open circuit on '{}'",
            operation,
            self.backend.provider_name()
        ))
    }
}

impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.guarded(
            "get",
            || Ok(None),
            async { dispatch!(&self.backend, s => s.get(key).await) },
        )
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.guarded(
            "set",
            || Err(self.circuit_open_error("set")),
            async { dispatch!(&self.backend, s => s.set(key, value, ttl).await) },
        )
        .await
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        self.guarded(
            "multi_get",
            || Ok(vec![None; keys.len()]),
            async { dispatch!(&self.backend, s => s.multi_get(keys).await) },
        )
        .await
    }

    async fn multi_set(&self, entries: &[(String, Vec<u8>)], ttl: Duration) -> CacheResult<()> {
        self.guarded(
            "multi_set",
            || Err(self.circuit_open_error("multi_set")),
            async { dispatch!(&self.backend, s => s.multi_set(entries, ttl).await) },
        )
        .await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.guarded(
            "delete",
            || Err(self.circuit_open_error("delete")),
            async { dispatch!(&self.backend, s => s.delete(keys).await) },
        )
        .await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.guarded(
            "set_if_absent",
            || Err(self.circuit_open_error("set_if_absent")),
            async { dispatch!(&self.backend, s => s.set_if_absent(key, value, ttl).await) },
        )
        .await
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> CacheResult<bool> {
        self.guarded(
            "compare_and_delete",
            || Err(self.circuit_open_error("compare_and_delete")),
            async { dispatch!(&self.backend, s => s.compare_and_delete(key, expected).await) },
        )
        .await
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.guarded(
            "ttl",
            || Ok(None),
            async { dispatch!(&self.backend, s => s.ttl(key).await) },
        )
        .await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let Some(cb) = self.active_breaker() else {
            return dispatch!(&self.backend, s => s.health_check().await);
        };

        if !cb.should_allow() {
            debug!("Cache circuit open, returning unhealthy");
            return Ok(false);
        }

        let start = Instant::now();
        let result = dispatch!(&self.backend, s => s.health_check().await);
        let duration = start.elapsed();

        match &result {
            Ok(true) => cb.record_success_manual(duration),
            Ok(false) | Err(_) => cb.record_failure_manual(duration),
        }

        result
    }

    fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// `true` for Redis/Dragonfly (shared state) and NoOp (no state),
    /// `false` for Moka (in-process only)
    fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }
}
