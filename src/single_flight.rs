//! Request coalescing.
//!
//! [`SingleFlight`] runs at most one future per key at a time. Callers that
//! arrive while a call is in flight await a [`Shared`] handle to it and get a
//! clone of its output. The key is retired as soon as the call finishes, so
//! nothing is cached between windows.
//!
//! The leader's future is spawned onto the tokio runtime: a caller that gives
//! up waiting does not cancel the work other callers (or the cache) depend on.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt as _;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// `None` means the call panicked
type SharedCall<T> = Shared<BoxFuture<'static, Option<T>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlightError {
    #[error("in-flight call for key '{0}' panicked")]
    Panicked(String),
}

struct Call<T: Clone> {
    generation: u64,
    future: SharedCall<T>,
}

/// Per-key execution deduplication
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    calls: Arc<DashMap<String, Call<T>>>,
    next_generation: Arc<AtomicU64>,
}

impl<T: Clone + Send + Sync + 'static> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
            next_generation: Arc::clone(&self.next_generation),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.calls.len())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `f` for `key` unless a call for `key` is already in flight, in
    /// which case wait for that call instead. Every caller of one window
    /// receives a clone of the same output.
    ///
    /// `f` runs in the leader's task after the map entry is published, so it
    /// may itself inspect this `SingleFlight`.
    pub async fn work<F, Fut>(&self, key: &str, f: F) -> Result<T, FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (future, starter) = match self.calls.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().future.clone(), None),
            Entry::Vacant(entry) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let (starter, pending) = oneshot::channel();
                let future = self.retiring(key.to_string(), generation, pending);
                entry.insert(Call {
                    generation,
                    future: future.clone(),
                });
                (future, Some(starter))
            }
        };

        match starter {
            Some(starter) => {
                debug!(key = key, "Starting coalesced call");
                // Spawned before `f` runs: if `f` panics, the dropped sender
                // still lets the call finish and retire.
                tokio::spawn(future.clone());
                if starter.send(f().boxed()).is_err() {
                    debug!(key = key, "Coalesced call finished before it started");
                }
            }
            None => debug!(key = key, "Joining in-flight call"),
        }

        future
            .await
            .ok_or_else(|| FlightError::Panicked(key.to_string()))
    }

    /// The shared call for one generation: wait for the leader's future,
    /// run it catching panics, then remove its own map entry. A newer
    /// generation under the same key is left alone.
    fn retiring(
        &self,
        key: String,
        generation: u64,
        pending: oneshot::Receiver<BoxFuture<'static, T>>,
    ) -> SharedCall<T> {
        let calls = Arc::clone(&self.calls);
        async move {
            let output = match pending.await {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await.ok(),
                // leader panicked while building its future
                Err(_) => None,
            };
            calls.remove_if(&key, |_, call| call.generation == generation);
            output
        }
        .boxed()
        .shared()
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.calls.contains_key(key)
    }
}
