//! Backoff policies for failed jobs.
//!
//! Policies only compute the delay before the next attempt; whether a job
//! is retried at all is decided by the worker against the configured
//! `max_attempts`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry strategy enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    /// Immediate retry, no delay.
    None,
    /// Fixed delay between retries.
    Fixed,
    /// Exponential backoff with optional jitter.
    Exponential,
    /// Linear backoff.
    Linear,
    /// Polynomial backoff: base delay plus `attempt^exponent` seconds.
    Polynomial,
}

/// Backoff policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retry strategy.
    pub strategy: RetryStrategy,

    /// Initial (base) delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,

    /// Backoff multiplier (for exponential).
    pub multiplier: f64,

    /// Polynomial exponent (for polynomial).
    pub exponent: u32,

    /// Add random jitter to delays.
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::polynomial()
    }
}

impl RetryPolicy {
    /// Creates a policy that retries without delay.
    pub fn none() -> Self {
        Self {
            strategy: RetryStrategy::None,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            exponent: 1,
            jitter: false,
            jitter_factor: 0.0,
        }
    }

    /// Creates a fixed delay policy.
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            multiplier: 1.0,
            exponent: 1,
            jitter: false,
            jitter_factor: 0.0,
        }
    }

    /// Creates an exponential backoff policy.
    pub fn exponential() -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            initial_delay_ms: 1000,    // 1 second
            max_delay_ms: 3_600_000,   // 1 hour
            multiplier: 2.0,
            exponent: 1,
            jitter: true,
            jitter_factor: 0.1,
        }
    }

    /// Creates a linear backoff policy.
    pub fn linear(increment_ms: u64) -> Self {
        Self {
            strategy: RetryStrategy::Linear,
            initial_delay_ms: increment_ms,
            max_delay_ms: 3_600_000, // 1 hour
            multiplier: 1.0,
            exponent: 1,
            jitter: false,
            jitter_factor: 0.0,
        }
    }

    /// Creates the polynomial backoff policy: five seconds plus the
    /// fourth power of the attempt count, the curve long-running queues
    /// use to space out persistent failures without giving up early.
    pub fn polynomial() -> Self {
        Self {
            strategy: RetryStrategy::Polynomial,
            initial_delay_ms: 5000,      // 5 second base
            max_delay_ms: 604_800_000,   // 7 days
            multiplier: 1.0,
            exponent: 4,
            jitter: false,
            jitter_factor: 0.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the polynomial exponent.
    pub fn with_exponent(mut self, exponent: u32) -> Self {
        self.exponent = exponent;
        self
    }

    /// Enables jitter.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = true;
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Disables jitter.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self.jitter_factor = 0.0;
        self
    }

    /// Calculate delay before the next execution, given the number of
    /// failures so far. Monotonically non-decreasing in `attempt` up to
    /// the configured cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.strategy == RetryStrategy::None {
            return Duration::ZERO;
        }

        let base_delay = match self.strategy {
            RetryStrategy::None => 0,
            RetryStrategy::Fixed => self.initial_delay_ms,
            RetryStrategy::Exponential => {
                let exp = attempt - 1;
                let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exp as i32);
                delay as u64
            }
            RetryStrategy::Linear => self.initial_delay_ms.saturating_mul(attempt as u64),
            RetryStrategy::Polynomial => {
                let growth = (attempt as u64)
                    .saturating_pow(self.exponent)
                    .saturating_mul(1000);
                self.initial_delay_ms.saturating_add(growth)
            }
        };

        // Cap at max delay
        let capped_delay = base_delay.min(self.max_delay_ms);

        // Apply jitter if enabled
        let final_delay = if self.jitter && self.jitter_factor > 0.0 {
            let jitter_range = (capped_delay as f64 * self.jitter_factor) as u64;
            let jitter = rand_jitter(jitter_range);
            capped_delay
                .saturating_add(jitter)
                .saturating_sub(jitter_range / 2)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay)
    }
}

/// Generate random jitter using a simple LCG.
fn rand_jitter(range: u64) -> u64 {
    use std::time::SystemTime;

    if range == 0 {
        return 0;
    }

    // Simple pseudo-random based on time
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    // LCG parameters
    let a: u64 = 6364136223846793005;
    let c: u64 = 1442695040888963407;

    let random = seed.wrapping_mul(a).wrapping_add(c);
    random % range
}
