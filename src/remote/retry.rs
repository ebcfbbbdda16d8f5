//! Retry policy with exponential backoff for remote operations.
//!
//! Both listing calls and file transfers retry every failure: the remote API
//! gives no reliable signal that separates transient from permanent errors,
//! so the only bound is the attempt ceiling.
//!
//! # Delay Calculation
//!
//! ```text
//! delay(n) = base_delay * 2^n + uniform(0, max_jitter)
//! ```
//!
//! where `n` is the number of failures so far (1 for the first retry). With
//! the defaults a listing call waits about 2s, 4s, 8s ... 1024s (plus up to
//! 3s jitter) across its 10 retries; downloads use the same schedule without
//! jitter.
//!
//! # Example
//!
//! ```
//! use alist_mirror::remote::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::for_downloads();
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Maximum jitter added to listing retry delays (3 seconds).
pub const LISTING_MAX_JITTER: Duration = Duration::from_secs(3);

/// Decision on whether to retry a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_retries`: 10 (11 attempts in total)
/// - `base_delay`: 1 second
/// - `max_jitter`: none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    max_retries: u32,

    /// Delay unit scaled by `2^failures`.
    base_delay: Duration,

    /// Upper bound of the uniform random jitter added to each delay.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter,
        }
    }

    /// Policy for directory listing calls: default schedule plus up to 3s jitter.
    #[must_use]
    pub fn for_listing() -> Self {
        Self {
            max_jitter: LISTING_MAX_JITTER,
            ..Self::default()
        }
    }

    /// Policy for file transfers: default schedule, no jitter.
    #[must_use]
    pub fn for_downloads() -> Self {
        Self::default()
    }

    /// Policy that retries `max_retries` times without waiting.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Returns a copy with a different retry ceiling.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the configured number of retries.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts, including the initial one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Determines whether to retry after `failures` consecutive failures.
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failures: u32) -> RetryDecision {
        if failures > self.max_retries {
            debug!(failures, max = self.max_retries, "retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts()),
            };
        }

        let delay = self.backoff_delay(failures) + self.jitter();

        debug!(
            failures,
            next_attempt = failures + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: failures + 1,
        }
    }

    /// Deterministic part of the delay after `failures` failures: `base * 2^failures`.
    ///
    /// Non-decreasing in `failures`; saturates instead of overflowing.
    #[must_use]
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(failures))
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
