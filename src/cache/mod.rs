//! # Cache
//!
//! Byte-level backends behind the [`CacheService`] trait, enum dispatch with
//! circuit breaking in [`CacheProvider`], and the typed [`Cache`] facade the
//! repository and callers use.
//!
//! ## Backends
//!
//! | backend | feature | distributed |
//! |---|---|---|
//! | Redis / Dragonfly | `cache-redis` | yes |
//! | Moka | `cache-moka` | no |
//! | NoOp | always | n/a (holds nothing) |

pub mod errors;
pub mod key;
pub mod provider;
pub mod providers;
pub mod store;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use key::{build_cache_key, KEY_DELIMITER};
pub use provider::CacheProvider;
pub use providers::NoOpCacheService;
pub use store::{Cache, CacheValue, MultiGet, NOT_FOUND_PLACEHOLDER};
pub use traits::{clamp_ttl, CacheService, MAX_TTL};

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;

#[cfg(feature = "cache-moka")]
pub use providers::MokaCacheService;
