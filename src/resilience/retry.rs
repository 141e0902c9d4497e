//! # Retry Policies
//!
//! Fixed-backoff retry with an optional attempt bound and cooperative cancellation.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BrokerError;

/// How often, and how patiently, to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// `None` retries until success or cancellation
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            backoff,
        }
    }

    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some()
    }

    fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Why a retried operation gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: E,
    },

    #[error("{operation} cancelled after {attempts} attempts")]
    Cancelled { operation: String, attempts: u32 },
}

impl<E: fmt::Display> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Convert to the broker's terminal error at the call site
    pub fn into_broker_error(self) -> BrokerError {
        match self {
            Self::Exhausted {
                operation,
                attempts,
                last_error,
            } => BrokerError::retries_exhausted(operation, attempts, last_error.to_string()),
            Self::Cancelled { operation, .. } => BrokerError::Cancelled { operation },
        }
    }
}

/// Run `operation` until it succeeds, the policy runs out, or `cancel` fires
pub async fn retry_with_policy<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(RetryError::Cancelled {
                operation: operation.to_string(),
                attempts: attempt,
            });
        }

        attempt += 1;
        let error = match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = %operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !policy.allows_attempt(attempt + 1) {
            warn!(
                operation = %operation,
                attempts = attempt,
                error = %error,
                "Retries exhausted"
            );
            return Err(RetryError::Exhausted {
                operation: operation.to_string(),
                attempts: attempt,
                last_error: error,
            });
        }

        warn!(
            operation = %operation,
            attempt,
            max_attempts = ?policy.max_attempts,
            backoff_ms = policy.backoff.as_millis() as u64,
            error = %error,
            "Operation failed, retrying"
        );

        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled {
                            operation: operation.to_string(),
                            attempts: attempt,
                        });
                    }
                    _ = tokio::time::sleep(policy.backoff) => {}
                }
            }
            None => tokio::time::sleep(policy.backoff).await,
        }
    }
}
