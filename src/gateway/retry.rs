//! Retry policy for device exchanges.
//
// Device faults here are transient resets rather than congestion, so the
// backoff is a fixed delay between attempts, not exponential.

use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Defines a policy for retrying a device exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// The delay between failed attempts.
    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub backoff: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_millis(100)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// `attempt` receives the 1-based attempt number. Non-transient errors are
    /// returned immediately without waiting.
    pub async fn run<T, F, Fut>(&self, command: &str, mut attempt: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut number = 1;
        loop {
            debug!(command, attempt = number, "attempting request");
            match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || number >= attempts => return Err(e),
                Err(e) => {
                    warn!(command, attempt = number, error = %e, "request failed, retrying");
                    sleep(self.backoff).await;
                    number += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn timeout() -> TransportError {
        TransportError::Timeout {
            command: "ping".to_string(),
            deadline: Duration::from_millis(150),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_logic_succeeds() {
        let attempts = RefCell::new(0);
        let policy = RetryPolicy::default();
        let result = policy
            .run("ping", |n| {
                *attempts.borrow_mut() = n;
                async move {
                    if n >= 2 {
                        Ok("pong")
                    } else {
                        Err(timeout())
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "pong");
        assert_eq!(*attempts.borrow(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_logic_fails_after_budget() {
        let attempts = RefCell::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        };
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = policy
            .run("ping", |n| {
                *attempts.borrow_mut() = n;
                async { Err(timeout()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(*attempts.borrow(), 3);
        // Two backoffs between three attempts, none after the last.
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let attempts = RefCell::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("trigger", |n| {
                *attempts.borrow_mut() = n;
                async {
                    Err(TransportError::Rejected {
                        command: "trigger".to_string(),
                        status: 409,
                        body: "busy".to_string(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(TransportError::Rejected { .. })));
        assert_eq!(*attempts.borrow(), 1);
    }
}
