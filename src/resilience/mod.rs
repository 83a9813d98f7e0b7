//! # Resilience
//!
//! Circuit breaking for calls into the remote cache store.

pub mod circuit_breaker;
pub mod config;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
