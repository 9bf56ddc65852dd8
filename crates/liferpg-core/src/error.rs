//! Error types for the gamification engines.
//!
//! Every engine operation fails with a [`GameError`]. Business-rule
//! failures are terminal for the request. Storage conflicts are retried a
//! bounded number of times (see [`crate::retry`]) before being surfaced as
//! [`GameError::Storage`].

use liferpg_db::DbError;
use liferpg_ledger::LedgerError;
use liferpg_types::{RewardId, TaskId};
use uuid::Uuid;

/// Stable, machine-readable classification of a [`GameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced user, task, or reward does not exist.
    NotFound,
    /// The task exists but is deactivated.
    TaskInactive,
    /// The completion window for the task is already used.
    AlreadyCompleted,
    /// The reward exists but is deactivated.
    RewardInactive,
    /// The reward has no stock left.
    OutOfStock,
    /// The user cannot afford the reward.
    InsufficientFunds,
    /// The request input was rejected before touching storage.
    InvalidInput,
    /// The username is already registered.
    UsernameTaken,
    /// A lock or serialization race was lost.
    ConcurrencyConflict,
    /// The datastore failed, or a stored value broke an invariant.
    StorageFailure,
}

impl ErrorKind {
    /// The kind as a `snake_case` string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::TaskInactive => "task_inactive",
            Self::AlreadyCompleted => "already_completed",
            Self::RewardInactive => "reward_inactive",
            Self::OutOfStock => "out_of_stock",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidInput => "invalid_input",
            Self::UsernameTaken => "username_taken",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::StorageFailure => "storage_failure",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the engines.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name (`user`, `task`, `reward`).
        entity: &'static str,
        /// The id that was looked up.
        id: Uuid,
    },

    /// The task is deactivated.
    #[error("task {0} is not active")]
    TaskInactive(TaskId),

    /// The task was already completed in the current window.
    #[error("task {task_id} already completed")]
    AlreadyCompleted {
        /// The task.
        task_id: TaskId,
    },

    /// The reward is deactivated.
    #[error("reward {0} is not active")]
    RewardInactive(RewardId),

    /// The reward has finite stock and none is left.
    #[error("reward {0} is out of stock")]
    OutOfStock(RewardId),

    /// The user's gold is below the reward cost.
    #[error("insufficient gold: need {required}, have {available}")]
    InsufficientFunds {
        /// Reward cost.
        required: i64,
        /// Current gold balance.
        available: i64,
    },

    /// Input rejected before any storage access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The username is already registered.
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    /// A lock or serialization race was lost; the transaction rolled back.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(#[source] DbError),

    /// The datastore failed.
    #[error("storage failure: {0}")]
    Storage(#[source] DbError),

    /// A ledger entry could not be constructed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A balance computation overflowed or a definition holds a negative
    /// amount.
    #[error("balance invariant violated: {0}")]
    Invariant(String),
}

impl GameError {
    /// The stable kind used by the HTTP layer.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::TaskInactive(_) => ErrorKind::TaskInactive,
            Self::AlreadyCompleted { .. } => ErrorKind::AlreadyCompleted,
            Self::RewardInactive(_) => ErrorKind::RewardInactive,
            Self::OutOfStock(_) => ErrorKind::OutOfStock,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UsernameTaken(_) => ErrorKind::UsernameTaken,
            Self::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
            Self::Storage(_) | Self::Ledger(_) | Self::Invariant(_) => ErrorKind::StorageFailure,
        }
    }

    /// Whether the error is a business-rule outcome rather than a fault.
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::TaskInactive(_)
                | Self::AlreadyCompleted { .. }
                | Self::RewardInactive(_)
                | Self::OutOfStock(_)
                | Self::InsufficientFunds { .. }
        )
    }
}

impl From<DbError> for GameError {
    fn from(err: DbError) -> Self {
        if err.is_conflict() {
            Self::ConcurrencyConflict(err)
        } else {
            Self::Storage(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_classified_on_conversion() {
        let err = GameError::from(DbError::Conflict("deadlock detected".to_owned()));
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);

        let err = GameError::from(DbError::NotFound("user".to_owned()));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn kinds_are_snake_case() {
        let err = GameError::InsufficientFunds {
            required: 100,
            available: 50,
        };
        assert_eq!(err.kind().as_str(), "insufficient_funds");
        assert_eq!(err.to_string(), "insufficient gold: need 100, have 50");
        assert!(err.is_business_rule());
    }

    #[test]
    fn faults_are_not_business_rules() {
        let err = GameError::Invariant("gold overflow".to_owned());
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(!err.is_business_rule());
    }
}
