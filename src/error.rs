//! Crate-level error aggregating the module errors

use crate::cache::CacheError;
use crate::codec::CodecError;
use crate::config::ConfigurationError;
use crate::lock::LockError;
use crate::repo::RepoError;
use crate::single_flight::FlightError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Flight(#[from] FlightError),
}

pub type Result<T> = std::result::Result<T, Error>;
