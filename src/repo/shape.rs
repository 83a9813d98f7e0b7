//! Destination shapes for cache-aside reads.
//!
//! A read either fills a single [`Record`] or a sequence of [`Records`].
//! Each shape knows its canonical empty form, which is what callers see after
//! the origin reports "not found": a zero-valued record or an empty,
//! iterable sequence, never an unset value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Capacity given to a sequence that was never touched before emptying
pub const EMPTY_RECORDS_CAPACITY: usize = 20;

/// A cacheable destination with a canonical empty form
pub trait Shape: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Replace the contents with the canonical empty form
    fn set_empty(&mut self);
}

/// A single record; empty means `T::default()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record<T>(pub T);

impl<T> Record<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> Shape for Record<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    fn set_empty(&mut self) {
        self.0 = T::default();
    }
}

/// A sequence of records; empty means a valid, zero-length vector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Records<T>(pub Vec<T>);

impl<T> Records<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self(values)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Records<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> DerefMut for Records<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> From<Vec<T>> for Records<T> {
    fn from(values: Vec<T>) -> Self {
        Self(values)
    }
}

impl<T> Shape for Records<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn set_empty(&mut self) {
        if self.0.is_empty() && self.0.capacity() == 0 {
            self.0 = Vec::with_capacity(EMPTY_RECORDS_CAPACITY);
        } else {
            self.0.clear();
        }
    }
}
