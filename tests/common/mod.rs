#![allow(dead_code)]

pub mod stores;
pub mod strategies;

use cache_aside::cache::{Cache, MokaCacheService};
use cache_aside::repo::Repo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

pub fn ada() -> User {
    User {
        id: 42,
        name: "Ada".to_string(),
    }
}

pub fn moka_cache() -> Cache<MokaCacheService> {
    Cache::new(MokaCacheService::new(10_000))
}

pub fn moka_repo() -> Repo<MokaCacheService> {
    Repo::new(moka_cache())
}
