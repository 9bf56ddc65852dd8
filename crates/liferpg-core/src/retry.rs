//! Bounded retry of transactions that lost a concurrency race.
//!
//! A conflict means the transaction was rolled back in full, so running
//! the whole operation again is safe. Business-rule failures and other
//! storage errors are returned immediately. When every attempt conflicts
//! the last conflict is surfaced as [`GameError::Storage`].

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::GameError;

/// How many times an operation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` attempts in total (at least one).
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    /// Policy that never retries.
    pub const fn no_retry() -> Self {
        Self::new(1)
    }

    /// Total attempts allowed.
    pub const fn max_attempts(self) -> u32 {
        self.max_attempts
    }

    /// Run `attempt` until it returns something other than a conflict or
    /// the attempts are used up.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or [`GameError::Storage`] once
    /// the attempts are exhausted by conflicts.
    pub async fn run<T, F, Fut>(self, operation: &'static str, mut attempt: F) -> Result<T, GameError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GameError>>,
    {
        let mut number: u32 = 1;
        loop {
            match attempt().await {
                Err(GameError::ConcurrencyConflict(source)) => {
                    if number >= self.max_attempts {
                        tracing::error!(
                            operation,
                            attempts = number,
                            error = %source,
                            "Concurrency conflict persisted, giving up"
                        );
                        return Err(GameError::Storage(source));
                    }
                    tracing::warn!(
                        operation,
                        attempt = number,
                        error = %source,
                        "Concurrency conflict, retrying"
                    );
                    number = number.saturating_add(1);
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use liferpg_db::DbError;

    use super::*;

    fn conflict() -> GameError {
        GameError::ConcurrencyConflict(DbError::Conflict("could not obtain lock".to_owned()))
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflicts() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::new(3)
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(conflict()) } else { Ok(n) }
            })
            .await;

        assert!(matches!(result, Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_storage_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), GameError> = RetryPolicy::new(2)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            })
            .await;

        assert!(matches!(result, Err(GameError::Storage(DbError::Conflict(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), GameError> = RetryPolicy::new(5)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GameError::InsufficientFunds {
                    required: 100,
                    available: 50,
                })
            })
            .await;

        assert!(matches!(result, Err(GameError::InsufficientFunds { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }
}
