//! Retry manager for handling transient failures with exponential backoff
//!
//! Only errors whose `is_retryable()` reports a transient condition are
//! retried. Everything else is returned on the spot, without delay.

use crate::config::RetryConfig;
use crate::error::RetryableError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry manager with exponential backoff support
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation runs at most `max_attempts` times. After the n-th failed
    /// attempt (0-based) it waits `calculate_backoff(n)` before trying again.
    /// The error of the final attempt is returned once the budget is spent.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt + 1 >= max_attempts {
                        warn!(
                            attempts = attempt + 1,
                            max_attempts,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        return Err(err);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Calculate backoff duration for a given attempt number
    ///
    /// Uses exponential backoff: initial_delay * factor^attempt,
    /// capped at max_delay, scaled to 50-100% when jitter is on
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.config.max_delay_ms as f64);

        let delay = if self.config.jitter {
            let jitter = rand::thread_rng().gen_range(0.5..1.0);
            capped * jitter
        } else {
            capped
        };

        Duration::from_millis(delay.round() as u64)
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn config(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            backoff_factor: 2.0,
            jitter: false,
        }
    }

    // Test 1: Success on first attempt returns immediately
    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new(config(3, 0, 0));

        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result: Result<&str, SyncError> = manager
            .execute(|| {
                let count = call_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok("success")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    // Test 2: Two transient failures then success waits 1000ms then 2000ms
    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_exact() {
        let manager = RetryManager::new(config(3, 1000, 60_000));

        let attempts = Arc::new(Mutex::new(Vec::new()));
        let attempts_clone = attempts.clone();

        let result: Result<&str, SyncError> = manager
            .execute(|| {
                let attempts = attempts_clone.clone();
                async move {
                    let mut seen = attempts.lock().unwrap();
                    seen.push(Instant::now());
                    if seen.len() < 3 {
                        Err(SyncError::NetworkTimeout)
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        let seen = attempts.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1] - seen[0], Duration::from_millis(1000));
        assert_eq!(seen[2] - seen[1], Duration::from_millis(2000));
    }

    // Test 3: Gives up after max attempts with the transient error
    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let manager = RetryManager::new(config(3, 0, 0));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), SyncError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::ConnectionRefused)
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), SyncError::ConnectionRefused);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 4: Non-retryable error returns immediately without delay
    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let manager = RetryManager::new(config(5, 1000, 60_000));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();
        let start = Instant::now();

        let result: Result<(), SyncError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::Api {
                        status: 503,
                        message: "maintenance".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            SyncError::Api { status: 503, .. }
        ));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // Test 5: Exponential backoff calculation without jitter
    #[test]
    fn test_exponential_backoff_calculation() {
        let manager = RetryManager::new(config(5, 500, 300_000));

        assert_eq!(manager.calculate_backoff(0), Duration::from_millis(500));
        assert_eq!(manager.calculate_backoff(1), Duration::from_millis(1000));
        assert_eq!(manager.calculate_backoff(2), Duration::from_millis(2000));
        assert_eq!(manager.calculate_backoff(3), Duration::from_millis(4000));
    }

    // Test 6: Backoff is capped at max_delay
    #[test]
    fn test_backoff_capped_at_max() {
        let manager = RetryManager::new(config(10, 1000, 5000));

        assert_eq!(manager.calculate_backoff(5), Duration::from_millis(5000));
        assert_eq!(manager.calculate_backoff(10), Duration::from_millis(5000));
    }

    // Test 7: Jitter reduces backoff to 50-100% range
    #[test]
    fn test_jitter_within_range() {
        let manager = RetryManager::new(RetryConfig {
            jitter: true,
            ..config(3, 10_000, 300_000)
        });

        for _ in 0..100 {
            let backoff = manager.calculate_backoff(0);
            assert!(
                backoff >= Duration::from_millis(5000) && backoff <= Duration::from_millis(10_000),
                "Backoff {:?} should be between 5-10 seconds",
                backoff
            );
        }
    }

    // Test 8: Single attempt budget never retries
    #[tokio::test]
    async fn test_single_attempt() {
        let manager = RetryManager::new(config(1, 0, 0));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), SyncError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::NetworkTimeout)
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    // Test 9: Invalid data is not retried
    #[tokio::test]
    async fn test_invalid_data_not_retried() {
        let manager = RetryManager::new(config(4, 0, 0));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), SyncError> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::InvalidData("truncated".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(SyncError::InvalidData(_))));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    // Test 10: Default configuration
    #[test]
    fn test_default_configuration() {
        let manager = RetryManager::with_defaults();
        let config = manager.config();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!((config.backoff_factor - 2.0).abs() < f64::EPSILON);
        assert!(!config.jitter);
    }
}
