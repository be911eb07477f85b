//! Retry logic for transient filesystem and remote-host failures
//!
//! File deletion and remote host calls are retried transparently; every failed
//! attempt is logged and the last error is handed back once the policy is
//! exhausted.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

/// Retry policy for a fallible operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: usize,

    /// Backoff before the second attempt
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (1.0 for fixed backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::file_delete()
    }
}

impl RetryPolicy {
    /// No retries (fail fast)
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Three attempts with a fixed one second backoff
    #[must_use]
    pub fn file_delete() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
        }
    }

    /// Six retries after the first attempt, fixed backoff
    #[must_use]
    pub fn remote_command() -> Self {
        Self {
            max_attempts: 7,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 1.0,
        }
    }

    /// Fixed backoff with the given number of attempts
    #[must_use]
    pub fn fixed(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: backoff,
            max_backoff: backoff,
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate backoff duration for attempt number (0-indexed)
    #[must_use]
    pub fn backoff_duration(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let backoff = self
            .initial_backoff
            .mul_f64(self.backoff_multiplier.max(1.0).powi(exponent).min(1e6));

        backoff.min(self.max_backoff)
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub fn retry_sync<T, E, F>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            std::thread::sleep(policy.backoff_duration(attempt));
        }

        match operation() {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("{} succeeded on attempt {}/{}", what, attempt + 1, attempts);
                }
                return Ok(value);
            }
            Err(error) if attempt + 1 < attempts => {
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt + 1,
                    attempts,
                    policy.backoff_duration(attempt + 1),
                    error
                );
            }
            Err(error) => {
                tracing::error!("{} failed after {} attempts: {}", what, attempts, error);
                return Err(error);
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fixed_backoff() {
        let policy = RetryPolicy::file_delete();

        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.backoff_duration(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_duration(9), Duration::from_secs(10));
    }

    #[test]
    fn test_remote_policy_allows_six_retries() {
        assert_eq!(RetryPolicy::remote_command().max_attempts, 7);
    }

    #[test]
    fn test_retry_succeeds_on_second_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        let calls = Cell::new(0);

        let result: Result<u32, String> = retry_sync(&policy, "flaky", || {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err("transient".to_string())
            } else {
                Ok(7)
            }
        });

        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_retry_returns_last_error() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        let calls = Cell::new(0);

        let result: Result<(), String> = retry_sync(&policy, "broken", || {
            calls.set(calls.get() + 1);
            Err(format!("failure {}", calls.get()))
        });

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_no_retry_runs_once() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = retry_sync(&RetryPolicy::no_retry(), "once", || {
            calls.set(calls.get() + 1);
            Err("nope")
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
