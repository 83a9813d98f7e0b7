//! Cache error types

use thiserror::Error;

/// Errors that can occur during cache operations
///
/// Payloads are plain strings so results can be cloned and shared between
/// callers waiting on the same coalesced fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Failed to connect to cache backend
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize a value before storing it
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Stored payload could not be decoded into the requested type
    #[error("Cache deserialization error: {0}")]
    DeserializationError(String),

    /// Key is empty or otherwise unusable
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Cache operation timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// The not-found marker could not be written
    #[error("Cache set error for not found marker: {0}")]
    NotFoundMarker(String),

    /// Operation is not available on this backend
    #[error("Cache operation not supported: {0}")]
    Unsupported(String),

    /// Circuit breaker refused the call
    #[error("Cache circuit open: {0}")]
    CircuitOpen(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
