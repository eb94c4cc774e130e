//! Per-tier circuit breakers.
//!
//! closed --K failures in window--> open --cool-down--> half_open
//! half_open --M successes--> closed, half_open --any failure--> open
//!
//! Breakers live in a [`CircuitBreakers`] registry that the engine owns, so
//! tests build isolated instances and a deployment can reset them.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::models::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker thresholds
#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit (K)
    pub failure_threshold: u32,
    /// Failures further apart than this do not accumulate
    pub failure_window: Duration,
    /// Time an open circuit waits before allowing a trial
    pub cooldown: Duration,
    /// Consecutive half-open successes that close the circuit (M)
    pub success_threshold: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitState {
    pub tier: Tier,
    pub consecutive_failures: u32,
    pub state: CircuitStatus,
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    status: CircuitStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    first_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
}

impl Inner {
    fn closed() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            first_failure_at: None,
            opened_at: None,
            opened_at_wall: None,
        }
    }

    fn open(&mut self, now: Instant) {
        self.status = CircuitStatus::Open;
        self.consecutive_successes = 0;
        self.opened_at = Some(now);
        self.opened_at_wall = Some(Utc::now());
    }
}

/// Circuit breaker guarding one tier
#[derive(Debug)]
pub struct CircuitBreaker {
    tier: Tier,
    config: CircuitConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(tier: Tier, config: CircuitConfig) -> Self {
        Self {
            tier,
            config,
            inner: Mutex::new(Inner::closed()),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether the tier may be invoked now
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    pub fn allow_request_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.status {
            CircuitStatus::Closed | CircuitStatus::HalfOpen => true,
            CircuitStatus::Open => {
                let cooled = inner
                    .opened_at
                    .map(|at| now.saturating_duration_since(at) >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled {
                    inner.status = CircuitStatus::HalfOpen;
                    inner.consecutive_successes = 0;
                    info!(tier = %self.tier, "Circuit half-open, allowing trial request");
                }
                cooled
            }
        }
    }

    pub fn record_success(&self) {
        self.record_success_at(Instant::now())
    }

    pub fn record_success_at(&self, _now: Instant) {
        let mut inner = self.inner.lock();
        match inner.status {
            CircuitStatus::Closed => {
                inner.consecutive_failures = 0;
                inner.first_failure_at = None;
            }
            CircuitStatus::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    *inner = Inner::closed();
                    info!(tier = %self.tier, "Circuit closed after successful trials");
                }
            }
            // A request admitted before the circuit opened finished late
            CircuitStatus::Open => {}
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        match inner.status {
            CircuitStatus::Closed => {
                let window_expired = inner
                    .first_failure_at
                    .map(|first| now.saturating_duration_since(first) > self.config.failure_window)
                    .unwrap_or(true);
                if window_expired {
                    inner.first_failure_at = Some(now);
                    inner.consecutive_failures = 0;
                }
                inner.consecutive_failures += 1;

                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.open(now);
                    warn!(
                        tier = %self.tier,
                        failures = inner.consecutive_failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Circuit opened"
                    );
                }
            }
            CircuitStatus::HalfOpen => {
                inner.consecutive_failures += 1;
                inner.open(now);
                warn!(tier = %self.tier, "Trial request failed, circuit re-opened");
            }
            CircuitStatus::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.inner.lock().status
    }

    pub fn snapshot(&self) -> CircuitState {
        let inner = self.inner.lock();
        CircuitState {
            tier: self.tier,
            consecutive_failures: inner.consecutive_failures,
            state: inner.status,
            opened_at: inner.opened_at_wall,
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::closed();
    }
}

/// Registry of breakers for every tier that can fail
///
/// The rule-based tier never gets a breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakers {
    breakers: Arc<HashMap<Tier, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(config: CircuitConfig) -> Self {
        let breakers = [Tier::Ai, Tier::Semantic]
            .into_iter()
            .map(|tier| (tier, Arc::new(CircuitBreaker::new(tier, config))))
            .collect();

        Self {
            breakers: Arc::new(breakers),
        }
    }

    pub fn get(&self, tier: Tier) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(&tier).cloned()
    }

    /// Snapshots ordered ai, semantic
    pub fn snapshot(&self) -> Vec<CircuitState> {
        let mut states: Vec<CircuitState> = self.breakers.values().map(|b| b.snapshot()).collect();
        states.sort_by_key(|s| s.tier != Tier::Ai);
        states
    }

    pub fn any_open(&self) -> bool {
        self.breakers
            .values()
            .any(|b| b.status() == CircuitStatus::Open)
    }

    pub fn reset(&self) {
        for breaker in self.breakers.values() {
            breaker.reset();
        }
        info!("All circuits reset");
    }

    pub fn shutdown(&self) {
        for state in self.snapshot() {
            info!(
                tier = %state.tier,
                state = ?state.state,
                failures = state.consecutive_failures,
                "Circuit state at shutdown"
            );
        }
        self.reset();
    }
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self::new(CircuitConfig::default())
    }
}
