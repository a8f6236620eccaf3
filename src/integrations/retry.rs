//! Retry with exponential backoff for Jira API calls
//!
//! Retries transient failures with a doubling base delay, multiplied by a
//! uniform jitter factor in `[0.5, 1.5)` and capped at a maximum delay.

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Base delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound on any single sleep
    pub max_backoff: Duration,

    /// Backoff multiplier (2.0 doubles the base delay each retry)
    pub multiplier: f64,

    /// Scale each delay by a random factor in [0.5, 1.5)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Base delay for a retry before jitter and capping
    pub fn base_delay(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(retry as i32);
        Duration::from_secs_f64(base)
    }

    /// Calculate the actual sleep for a given retry
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry).as_secs_f64();

        let jittered = if self.jitter {
            base * rand::thread_rng().gen_range(0.5..1.5)
        } else {
            base
        };

        Duration::from_secs_f64(jittered.min(self.max_backoff.as_secs_f64()))
    }
}

/// Suspension used between attempts
///
/// Production code sleeps on the tokio timer; tests substitute a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation
    Retry,
    /// Don't retry, the error is permanent
    NoRetry,
}

/// Trait for errors that can indicate whether to retry
pub trait RetryableError {
    /// Determine if this error should be retried
    fn retry_decision(&self) -> RetryDecision;
}

/// Execute an async operation with retry logic
///
/// The operation receives the zero-based attempt number. Returns the first
/// success, the first permanent error, or the last retryable error once
/// `max_retries` retries have been spent.
pub async fn with_retry_using<S, F, Fut, T, E>(
    config: &RetryConfig,
    sleeper: &S,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    S: Sleeper + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => match e.retry_decision() {
                RetryDecision::NoRetry => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation failed with non-retryable error: {}",
                        e
                    );
                    return Err(e);
                }
                RetryDecision::Retry => {
                    if attempt >= config.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation failed after {} attempts: {}",
                            attempt + 1,
                            e
                        );
                        return Err(e);
                    }

                    let backoff = config.backoff_duration(attempt);

                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = config.max_retries + 1,
                        backoff_secs = backoff.as_secs_f64(),
                        "Retrying after error: {}",
                        e
                    );

                    sleeper.sleep(backoff).await;
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records requested sleeps instead of sleeping
    #[derive(Debug, Default)]
    pub struct RecordingSleeper {
        pub sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn recorded(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;

    #[test]
    fn test_backoff_duration() {
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        // Without jitter, should be exactly: 1, 2, 4, 8, 16, 32, 60 (capped)
        assert_eq!(config.backoff_duration(0), Duration::from_secs(1));
        assert_eq!(config.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(config.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(config.backoff_duration(3), Duration::from_secs(8));
        assert_eq!(config.backoff_duration(6), Duration::from_secs(60)); // Capped
    }

    #[test]
    fn test_backoff_with_jitter() {
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
            ..Default::default()
        };

        for _ in 0..50 {
            let first = config.backoff_duration(0);
            assert!(first >= Duration::from_secs(5));
            assert!(first < Duration::from_secs(15));

            // 40s base jitters to [20s, 60s), then the cap applies
            let third = config.backoff_duration(2);
            assert!(third >= Duration::from_secs(20));
            assert!(third <= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_base_delay_doubles() {
        let config = RetryConfig::default();
        assert_eq!(config.base_delay(0), Duration::from_secs(10));
        assert_eq!(config.base_delay(1), Duration::from_secs(20));
        assert_eq!(config.base_delay(2), Duration::from_secs(40));
    }

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError(retryable={})", self.retryable)
        }
    }

    impl RetryableError for TestError {
        fn retry_decision(&self) -> RetryDecision {
            if self.retryable {
                RetryDecision::Retry
            } else {
                RetryDecision::NoRetry
            }
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let config = RetryConfig::default();
        let sleeper = RecordingSleeper::default();
        let mut attempts = 0;

        let result: Result<&str, TestError> =
            with_retry_using(&config, &sleeper, "test", |_| {
                attempts += 1;
                let current = attempts;
                async move {
                    if current < 3 {
                        Err(TestError { retryable: true })
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts, 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let config = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let sleeper = RecordingSleeper::default();
        let mut attempts = 0;

        let result: Result<&str, TestError> =
            with_retry_using(&config, &sleeper, "test", |_| {
                attempts += 1;
                async move { Err(TestError { retryable: true }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3); // Initial + 2 retries
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let config = RetryConfig::default();
        let sleeper = RecordingSleeper::default();
        let mut attempts = 0;

        let result: Result<&str, TestError> =
            with_retry_using(&config, &sleeper, "test", |_| {
                attempts += 1;
                async move { Err(TestError { retryable: false }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1); // No retries
        assert!(sleeper.recorded().is_empty());
    }
}
