//! # Circuit Breaker Implementation
//!
//! Classic three-state breaker: Closed (normal operation), Open (failing fast),
//! and Half-Open (testing recovery). State and counters are atomics so the
//! hot path never takes a lock.

use crate::resilience::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Get current epoch nanos from SystemTime
#[inline]
fn epoch_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - limited calls allowed to test system health
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Circuit breaker with atomic state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging
    name: String,
    state: AtomicU8,
    config: CircuitBreakerConfig,
    consecutive_failures: AtomicU64,
    half_open_calls: AtomicU64,
    /// Epoch nanos when circuit was opened (0 = not open)
    opened_at_epoch_nanos: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_ms = config.timeout.as_millis() as u64,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            consecutive_failures: AtomicU64::new(0),
            half_open_calls: AtomicU64::new(0),
            opened_at_epoch_nanos: AtomicU64::new(0),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Component name this breaker protects
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a call should be allowed based on current state.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open here.
    pub fn should_allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_nanos = self.opened_at_epoch_nanos.load(Ordering::Acquire);
                if opened_nanos == 0 {
                    warn!(component = %self.name, "Circuit open but no timestamp recorded");
                    return true;
                }

                let elapsed_nanos = epoch_nanos_now().saturating_sub(opened_nanos);
                if elapsed_nanos >= self.config.timeout.as_nanos() as u64 {
                    self.transition_to_half_open();
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_calls.load(Ordering::Relaxed)
                    < self.config.success_threshold as u64
            }
        }
    }

    /// Record a successful call made outside [`should_allow`](Self::should_allow) bookkeeping
    pub fn record_success_manual(&self, duration: Duration) {
        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation succeeded"
        );

        match self.state() {
            CircuitState::HalfOpen => {
                let calls = self.half_open_calls.fetch_add(1, Ordering::Relaxed) + 1;
                if calls >= self.config.success_threshold as u64 {
                    self.transition_to_closed();
                }
            }
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed call
    pub fn record_failure_manual(&self, duration: Duration) {
        warn!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation failed"
        );

        match self.state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.config.failure_threshold as u64 {
                    self.transition_to_open();
                }
            }
            // Any failure while probing reopens immediately
            CircuitState::HalfOpen => self.transition_to_open(),
            CircuitState::Open => {}
        }
    }

    fn transition_to_closed(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.half_open_calls.store(0, Ordering::Relaxed);
        self.opened_at_epoch_nanos.store(0, Ordering::Release);
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);

        info!(component = %self.name, "Circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self) {
        self.opened_at_epoch_nanos
            .store(epoch_nanos_now(), Ordering::Release);
        self.half_open_calls.store(0, Ordering::Relaxed);
        self.state.store(CircuitState::Open as u8, Ordering::Release);

        warn!(
            component = %self.name,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Circuit breaker opened"
        );
    }

    fn transition_to_half_open(&self) {
        self.half_open_calls.store(0, Ordering::Relaxed);
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);

        info!(component = %self.name, "Circuit breaker half-open (testing recovery)");
    }
}
