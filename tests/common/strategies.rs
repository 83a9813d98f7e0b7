//! Proptest strategies for cache keys and cached values

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub name: String,
    pub tags: Vec<String>,
    pub score: Option<i32>,
}

/// Non-empty keys in the usual `entity:id` style
pub fn cache_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}(:[a-z0-9_]{1,12}){0,3}"
}

pub fn prefix_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}"
}

pub fn profile_strategy() -> impl Strategy<Value = Profile> {
    (
        any::<u64>(),
        ".{0,40}",
        prop::collection::vec("[a-zA-Z0-9 ]{0,10}", 0..8),
        prop::option::of(any::<i32>()),
    )
        .prop_map(|(id, name, tags, score)| Profile {
            id,
            name,
            tags,
            score,
        })
}
