//! Retry and pacing policy for upstream fetches

use std::time::Duration;

use rand::Rng;

use crate::error::{PreloadError, PreloadResult};

/// Exponential backoff policy for one upstream fetch.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff multiplier; the wait before retry `n` is `base^n` seconds.
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: f64) -> Self {
        Self {
            max_attempts,
            backoff_base,
        }
    }

    /// Wait before the given retry (0-based: first retry waits base^0 = 1s
    /// for the default base).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_base.powi(attempt as i32))
    }

    pub fn should_retry(&self, error: &PreloadError, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts && error.is_retryable()
    }
}

/// Jittered delay inserted before every upstream request, so a preload of
/// thousands of panoramas never looks like a burst to the provider.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub min_seconds: f64,
    pub max_seconds: f64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_seconds: 1.0,
            max_seconds: 3.0,
        }
    }
}

impl Pacing {
    pub fn new(min_seconds: f64, max_seconds: f64) -> Self {
        Self {
            min_seconds,
            max_seconds,
        }
    }

    /// No delay at all; used by tests and trusted mirrors.
    pub fn none() -> Self {
        Self {
            min_seconds: 0.0,
            max_seconds: 0.0,
        }
    }

    pub async fn pause(&self) {
        let secs = if self.max_seconds > self.min_seconds {
            rand::thread_rng().gen_range(self.min_seconds..=self.max_seconds)
        } else {
            self.min_seconds
        };
        if secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }
}

/// Run a fetch under pacing + retry. Every attempt is preceded by the
/// pacing delay; retryable failures back off exponentially until the
/// attempt budget runs out.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    pacing: &Pacing,
    mut fetch: F,
) -> PreloadResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = PreloadResult<T>>,
{
    let mut attempt = 0;
    loop {
        pacing.pause().await;
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.should_retry(&error, attempt) {
                    if attempt > 0 {
                        return Err(PreloadError::RetryExhausted {
                            attempts: attempt + 1,
                            last: Box::new(error),
                        });
                    }
                    return Err(error);
                }
                let wait = policy.delay_for_attempt(attempt);
                tracing::debug!(attempt, wait_secs = wait.as_secs_f64(), %error,
                    "upstream fetch failed, backing off");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
