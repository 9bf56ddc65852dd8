//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`]. Database errors are
//! classified on conversion so callers can tell a lock or serialization
//! conflict (worth retrying) from a unique violation (a business rule
//! lost a race) from any other storage failure.

/// SQLSTATE codes that indicate a transient concurrency conflict:
/// serialization failure, deadlock detected, lock not available.
const CONFLICT_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The transaction lost a lock or serialization race and may be retried.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A row expected to exist was not found.
    #[error("row not found: {0}")]
    NotFound(String),

    /// A write was rejected by the store and the transaction is unusable.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A stored row could not be mapped to a domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the failed transaction may succeed if run again.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code();
            match code.as_deref() {
                Some(c) if CONFLICT_CODES.contains(&c) => {
                    return Self::Conflict(db_err.message().to_owned());
                }
                Some(UNIQUE_VIOLATION_CODE) => {
                    return Self::UniqueViolation(db_err.message().to_owned());
                }
                _ => {}
            }
        }
        Self::Postgres(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DbError::Conflict("deadlock".to_owned()).is_conflict());
        assert!(!DbError::UniqueViolation("dup".to_owned()).is_conflict());
        assert!(!DbError::NotFound("user".to_owned()).is_conflict());
        assert!(!DbError::WriteFailed("ledger".to_owned()).is_conflict());
    }

    #[test]
    fn non_database_sqlx_errors_stay_postgres() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Postgres(_)));
    }
}
