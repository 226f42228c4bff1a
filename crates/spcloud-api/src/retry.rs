//! Rate-limit retry policy: capped Fibonacci backoff on HTTP 429.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Same retry count, no waiting. Used by tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based): base x 1, 2, 3, 5, 8, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let (mut prev, mut cur) = (1u32, 1u32);
        for _ in 0..retry {
            let next = prev.saturating_add(cur);
            prev = cur;
            cur = next;
        }
        self.base_delay
            .checked_mul(cur)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `f`, retrying while it reports a rate limit.
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.run_with_sleep(operation, f, tokio::time::sleep).await
    }

    pub async fn run_with_sleep<T, F, Fut, S, SFut>(
        &self,
        operation: &str,
        mut f: F,
        mut sleep: S,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let mut retries = 0u32;
        loop {
            match f().await {
                Err(ApiError::RateLimited { message, .. }) => {
                    if retries >= self.max_retries {
                        return Err(ApiError::RateLimited {
                            attempts: retries + 1,
                            message,
                        });
                    }
                    let delay = self.delay_for(retries);
                    retries += 1;
                    warn!(
                        "{}: rate limited, retry {}/{} in {:?}",
                        operation, retries, self.max_retries, delay
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn rate_limited() -> ApiError {
        ApiError::RateLimited {
            attempts: 1,
            message: "too many requests".to_string(),
        }
    }

    /// Replays `statuses` in order; each 429 becomes a rate-limit error.
    async fn replay(statuses: Vec<u16>) -> (Result<u16, ApiError>, Vec<Duration>, usize) {
        let calls = Arc::new(Mutex::new(0usize));
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::default();

        let result = policy
            .run_with_sleep(
                "test",
                || {
                    let calls = Arc::clone(&calls);
                    let statuses = statuses.clone();
                    async move {
                        let mut n = calls.lock().unwrap();
                        let status = statuses[(*n).min(statuses.len() - 1)];
                        *n += 1;
                        match status {
                            429 => Err(rate_limited()),
                            200 => Ok(200),
                            other => Err(ApiError::Status {
                                status: other,
                                message: "boom".to_string(),
                            }),
                        }
                    }
                },
                |d| {
                    sleeps.lock().unwrap().push(d);
                    async {}
                },
            )
            .await;

        let calls = *calls.lock().unwrap();
        let sleeps = sleeps.lock().unwrap().clone();
        (result, sleeps, calls)
    }

    #[test]
    fn test_fibonacci_delays() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..6).map(|n| policy.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 300, 500, 800, 1300]);
        assert_eq!(policy.delay_for(30), DEFAULT_MAX_DELAY);
    }

    #[tokio::test]
    async fn test_two_rate_limits_then_success() {
        let (result, sleeps, calls) = replay(vec![429, 429, 200]).await;
        assert_eq!(result.unwrap(), 200);
        assert_eq!(sleeps.len(), 2);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_ten_retries() {
        let (result, sleeps, calls) = replay(vec![429; 11]).await;
        match result {
            Err(ApiError::RateLimited { attempts, .. }) => assert_eq!(attempts, 11),
            other => panic!("expected RateLimited, got {:?}", other),
        }
        assert_eq!(sleeps.len(), 10);
        assert_eq!(calls, 11);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let (result, sleeps, calls) = replay(vec![500, 200]).await;
        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
        assert!(sleeps.is_empty());
        assert_eq!(calls, 1);
    }
}
