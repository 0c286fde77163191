//! Failure isolation for unreliable downstream calls.
//!
//! ```text
//! ┌─────────┐  failure threshold  ┌─────────┐  reset timeout  ┌──────────┐
//! │ Closed  │ ──────────────────► │  Open   │ ──────────────► │ HalfOpen │
//! └─────────┘                     └─────────┘                 └──────────┘
//!      ▲                               ▲        probe fails        │
//!      │                               └───────────────────────────┤
//!      │                 probe succeeds                            │
//!      └───────────────────────────────────────────────────────────┘
//! ```
//!
//! While HalfOpen exactly one probe runs; concurrent callers are rejected as if the
//! circuit were still open.
//! Calls admitted before the circuit opened may still finish later; they add to the
//! failure count but never move the circuit out of Open or HalfOpen.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed through.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker `{name}` is open; service unavailable")]
    Open { name: String },
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub timeout_secs: u64,
    pub seconds_since_last_failure: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            event_name = "system.circuit_breaker.initialized",
            breaker = %name,
            failure_threshold = config.failure_threshold,
            timeout_secs = config.reset_timeout.as_secs(),
            "circuit breaker initialized"
        );
        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let guard = self.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: guard.state,
            failure_count: guard.failure_count,
            failure_threshold: self.config.failure_threshold,
            timeout_secs: self.config.reset_timeout.as_secs(),
            seconds_since_last_failure: guard.last_failure.map(|at| at.elapsed().as_secs()),
        }
    }

    /// Runs `operation` under breaker protection. The operation's own error is always
    /// handed back to the caller after bookkeeping.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut permit = self.acquire()?;

        match operation().await {
            Ok(value) => {
                let probe = permit.settle();
                self.on_success(probe);
                Ok(value)
            }
            Err(error) => {
                let probe = permit.settle();
                self.on_failure(probe);
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    fn acquire<E>(&self) -> Result<Permit<'_>, CircuitBreakerError<E>> {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => Ok(Permit { breaker: self, probe: false }),
            CircuitState::Open => {
                let elapsed_enough = guard
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if !elapsed_enough {
                    return Err(CircuitBreakerError::Open { name: self.name.clone() });
                }
                info!(
                    event_name = "system.circuit_breaker.half_open",
                    breaker = %self.name,
                    "circuit breaker OPEN -> HALF_OPEN"
                );
                guard.state = CircuitState::HalfOpen;
                guard.probe_in_flight = true;
                Ok(Permit { breaker: self, probe: true })
            }
            CircuitState::HalfOpen if guard.probe_in_flight => {
                Err(CircuitBreakerError::Open { name: self.name.clone() })
            }
            CircuitState::HalfOpen => {
                guard.probe_in_flight = true;
                Ok(Permit { breaker: self, probe: true })
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let mut guard = self.lock();
        if !probe && guard.state != CircuitState::Closed {
            // a call admitted before the circuit opened; it does not close it
            return;
        }
        if guard.state == CircuitState::HalfOpen {
            info!(
                event_name = "system.circuit_breaker.closed",
                breaker = %self.name,
                "circuit breaker HALF_OPEN -> CLOSED"
            );
        }
        guard.state = CircuitState::Closed;
        guard.failure_count = 0;
        guard.last_failure = None;
        guard.probe_in_flight = false;
    }

    fn on_failure(&self, probe: bool) {
        let mut guard = self.lock();
        guard.failure_count = guard.failure_count.saturating_add(1);
        guard.last_failure = Some(Instant::now());
        if probe {
            guard.probe_in_flight = false;
        }

        let reopen = probe
            || (guard.state == CircuitState::Closed
                && guard.failure_count >= self.config.failure_threshold);

        warn!(
            event_name = "system.circuit_breaker.failure",
            breaker = %self.name,
            failure_count = guard.failure_count,
            failure_threshold = self.config.failure_threshold,
            "circuit breaker recorded failure"
        );

        if reopen && guard.state != CircuitState::Open {
            warn!(
                event_name = "system.circuit_breaker.opened",
                breaker = %self.name,
                from = %guard.state,
                "circuit breaker opened"
            );
            guard.state = CircuitState::Open;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Releases a HalfOpen probe slot if the probing future is dropped before settling.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
}

impl Permit<'_> {
    fn settle(&mut self) -> bool {
        std::mem::replace(&mut self.probe, false)
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}
