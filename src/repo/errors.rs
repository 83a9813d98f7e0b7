//! Repository error types

use crate::cache::CacheError;
use crate::single_flight::FlightError;
use thiserror::Error;

/// Signal returned by an origin fetch
///
/// `NotFound` and `EmptyResult` are normal outcomes that produce the
/// canonical empty shape; only `Source` is an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("record not found")]
    NotFound,

    #[error("empty result set")]
    EmptyResult,

    #[error("{0}")]
    Source(String),
}

impl FetchError {
    /// Wrap any displayable origin failure
    pub fn other(error: impl std::fmt::Display) -> Self {
        Self::Source(error.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::EmptyResult)
    }
}

impl From<sqlx::Error> for FetchError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Source(other.to_string()),
        }
    }
}

/// Errors from [`Repo`](super::Repo) operations
///
/// `Clone` because one coalesced failure is handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("cache read failed for key '{key}': {source}")]
    CacheRead { key: String, source: CacheError },

    #[error("cache write failed for key '{key}': {source}")]
    CacheWrite { key: String, source: CacheError },

    #[error("origin fetch failed for key '{key}': {message}")]
    Fetch { key: String, message: String },

    #[error("coalesced fetch for key '{key}' failed: {source}")]
    Coalesce { key: String, source: FlightError },

    /// Another caller coalesced on the same key with a different destination type
    #[error("coalesced result for key '{key}' is not a {expected}")]
    ShapeMismatch { key: String, expected: &'static str },
}

impl RepoError {
    pub fn key(&self) -> &str {
        match self {
            Self::CacheRead { key, .. }
            | Self::CacheWrite { key, .. }
            | Self::Fetch { key, .. }
            | Self::Coalesce { key, .. }
            | Self::ShapeMismatch { key, .. } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_row_not_found_is_not_found() {
        assert_eq!(FetchError::from(sqlx::Error::RowNotFound), FetchError::NotFound);
        assert!(FetchError::from(sqlx::Error::PoolTimedOut).eq(&FetchError::Source(
            sqlx::Error::PoolTimedOut.to_string()
        )));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(FetchError::NotFound.is_not_found());
        assert!(FetchError::EmptyResult.is_not_found());
        assert!(!FetchError::other("boom").is_not_found());
    }

    #[test]
    fn test_repo_error_carries_key() {
        let error = RepoError::Fetch {
            key: "user:42".to_string(),
            message: "connection reset".to_string(),
        };
        assert_eq!(error.key(), "user:42");
        assert!(error.to_string().contains("user:42"));
    }
}
