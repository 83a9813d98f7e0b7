#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Cache Aside
//!
//! Cache-aside reads with request coalescing and negative caching, plus a
//! token-safe distributed lock, over Redis/Dragonfly or an in-process Moka
//! cache.
//!
//! ## Overview
//!
//! - [`repo::Repo::query_with_cache`] reads through the cache. On a miss one
//!   origin fetch runs per key, however many callers are waiting; "not found"
//!   is cached for a short negative TTL so absent keys do not hammer the
//!   origin.
//! - [`repo::Repo::del_cache`] invalidates best-effort.
//! - [`lock::DistributedLock`] gives mutual exclusion with `SET NX` and a
//!   compare-and-delete release that can never remove another holder's lock.
//!
//! ## Module Organization
//!
//! - [`cache`] - backend trait, providers, circuit-broken dispatch, typed facade
//! - [`codec`] - JSON and gzip-JSON value encoding
//! - [`single_flight`] - per-key request coalescing
//! - [`repo`] - cache-aside read orchestration
//! - [`lock`] - distributed lock
//! - [`resilience`] - circuit breaker
//! - [`config`] - layered configuration
//! - [`logging`] - tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cache_aside::config::AppConfig;
//! use cache_aside::repo::{FetchError, Record, Repo};
//! use std::time::Duration;
//!
//! # #[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
//! # struct User { id: u64, name: String }
//! # async fn demo() -> cache_aside::Result<()> {
//! let config = AppConfig::load(None)?;
//! cache_aside::logging::init_tracing(&config.logging);
//!
//! let repo = Repo::from_config(&config).await;
//! let mut user: Record<User> = Record::default();
//! repo.query_with_cache("user:42", &mut user, Duration::ZERO, || async {
//!     Err::<Record<User>, _>(FetchError::NotFound)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                              # unit + integration (Moka)
//! cargo test --features test-services     # also against REDIS_URL
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod repo;
pub mod resilience;
pub mod single_flight;

pub use cache::{Cache, CacheError, CacheProvider, CacheService, CacheValue};
pub use codec::Codec;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use lock::{DistributedLock, LockError, LockOptions};
pub use repo::{FetchError, Record, Records, Repo, RepoError, Shape};
pub use single_flight::SingleFlight;
