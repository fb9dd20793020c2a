//! Bounded retry with exponential backoff
//!
//! Transient failures (lock contention, stale versions, flaky storage) are
//! retried with `delay = min(initial * factor^attempt, max)`, jittered by
//! ±10% so that colliding processes do not retry in lockstep. Fatal errors
//! propagate immediately; `Error::is_transient` is the single
//! classification point.
//!
//! Policies come from one named preset table rather than magic numbers at
//! call sites. Presets are looked up by name with a default fallback, and
//! any policy can still be built by hand for unusual call sites.

use crewsync_core::{Error, Result};
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

/// Retry budget and backoff shape for one class of operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    /// (`max_retries = 3` means at most 4 calls total)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Whether to jitter each delay by ±10%
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

/// Named presets for the call sites the backend actually has
///
/// Lock acquisition retries fast and often (contention clears quickly);
/// generic database work backs off more conservatively; field updates sit
/// in between.
static PRESETS: Lazy<HashMap<&'static str, RetryPolicy>> = Lazy::new(|| {
    HashMap::from([
        (
            "lock-acquire",
            RetryPolicy {
                max_retries: 5,
                initial_delay: Duration::from_millis(50),
                backoff_factor: 2.0,
                max_delay: Duration::from_secs(1),
                jitter: true,
            },
        ),
        (
            "database",
            RetryPolicy {
                max_retries: 3,
                initial_delay: Duration::from_millis(100),
                backoff_factor: 2.0,
                max_delay: Duration::from_secs(5),
                jitter: true,
            },
        ),
        (
            "field-update",
            RetryPolicy {
                max_retries: 4,
                initial_delay: Duration::from_millis(50),
                backoff_factor: 2.0,
                max_delay: Duration::from_secs(2),
                jitter: true,
            },
        ),
    ])
});

impl RetryPolicy {
    /// Look up a named preset, falling back to the default policy
    pub fn preset(name: &str) -> RetryPolicy {
        PRESETS.get(name).copied().unwrap_or_default()
    }

    /// Set the retry budget (builder style)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first-retry delay (builder style)
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set the delay ceiling (builder style)
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Disable jitter, for deterministic tests
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Backoff delay before retry number `attempt` (0-based), before jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.min(63) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Runs operations under a [`RetryPolicy`]
///
/// The closure is re-invoked from scratch on each attempt, so it must be
/// safe to re-run: it should re-read any state it depends on. Closures that
/// captured reads before the executor was entered must not be retried here;
/// that is what [`crate::with_optimistic_lock`] is for.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with an explicit policy
    pub fn new(policy: RetryPolicy) -> Self {
        RetryExecutor { policy }
    }

    /// Create an executor from a named preset
    pub fn named(preset: &str) -> Self {
        RetryExecutor {
            policy: RetryPolicy::preset(preset),
        }
    }

    /// The policy this executor runs under
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op`, retrying transient failures up to the policy budget
    ///
    /// Fatal errors propagate on the spot. After the budget is exhausted the
    /// last transient error is returned to the caller, never swallowed.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.jittered(self.policy.delay_for(attempt));
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off before retry"
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(
                            attempts = attempt + 1,
                            error = %e,
                            "retry budget exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Like [`RetryExecutor::run`], but return `fallback` instead of the
    /// last transient error once the budget is exhausted
    ///
    /// Fatal errors still propagate: the fallback only papers over
    /// contention, never over bad input.
    pub fn run_with_fallback<T, F>(&self, op: F, fallback: T) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        match self.run(op) {
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "returning fallback after exhausted retries");
                Ok(fallback)
            }
            other => other,
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.policy.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.9..=1.1);
        delay.mul_f64(factor)
    }
}
