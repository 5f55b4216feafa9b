use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::logging::{ErrorLogger, LogContext};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between attempts in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&ApiConfig> for RetryConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_delay_ms: config.retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms,
            ..Self::default()
        }
    }
}

impl RetryConfig {
    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Retries recoverable ledger API failures with exponential backoff
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute an operation with retry logic
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(
                            &self.operation_name,
                            attempt,
                            started.elapsed().as_millis() as u64,
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_recoverable() {
                LogContext::new("retry", &self.operation_name)
                    .with_retry_count(attempt)
                    .debug(&format!("Non-recoverable error, not retrying: {}", error));
                return Err(error);
            }

            ErrorLogger::log_retry_attempt(&self.operation_name, &error, attempt, max_attempts);
            if attempt >= max_attempts {
                return Err(error);
            }

            let mut delay = self.calculate_delay(attempt);
            if let ApiError::RateLimit { seconds } = &error {
                delay = delay.max(Duration::from_secs(*seconds));
            }
            sleep(delay).await;
        }
    }

    /// Calculate delay for the given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = exponential_delay.min(self.config.max_delay_ms as f64);

        let final_delay = if self.config.jitter {
            // 10% jitter
            let jitter = capped_delay * 0.1 * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_retry_config_from_api_config() {
        let api = ApiConfig {
            max_retries: 4,
            retry_delay_ms: 100,
            max_retry_delay_ms: 1_000,
            ..ApiConfig::default()
        };
        let config = RetryConfig::from(&api);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 1_000);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new("test", fast_config(3));
        let result = manager.execute(|| async { Ok::<u64, ApiError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let manager = RetryManager::new("test", fast_config(3));

        let result = manager
            .execute(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::Timeout { seconds: 1 })
                } else {
                    Ok(7u64)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let manager = RetryManager::new("test", fast_config(5));

        let result = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u64, ApiError>(ApiError::InvalidResponse("garbage".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let manager = RetryManager::new("test", fast_config(3));

        let result = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u64, ApiError>(ApiError::Status { status: 503, body: String::new() })
            })
            .await;

        assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_calculation() {
        let manager = RetryManager::new(
            "test",
            RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 200,
                max_delay_ms: 1_000,
                backoff_multiplier: 2.0,
                jitter: false,
            },
        );

        assert_eq!(manager.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(manager.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(manager.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(manager.calculate_delay(4), Duration::from_millis(1_000));
    }
}
