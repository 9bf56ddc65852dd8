//! Error types for the HTTP adapter.
//!
//! [`ApiError`] unifies engine failures and request-shape failures into a
//! single enum that converts into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"error", "kind", "status"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use liferpg_core::{ErrorKind, GameError};

/// Errors that can occur in the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An engine operation failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The request carried no user identity.
    #[error("missing x-user-id header")]
    Unauthenticated,

    /// The user identity header is not a UUID.
    #[error("invalid x-user-id header: {0}")]
    InvalidUserHeader(String),

    /// A path identifier is not a UUID.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// The request body was rejected.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Game(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::TaskInactive
                | ErrorKind::AlreadyCompleted
                | ErrorKind::RewardInactive
                | ErrorKind::OutOfStock
                | ErrorKind::InsufficientFunds
                | ErrorKind::UsernameTaken => StatusCode::CONFLICT,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::ConcurrencyConflict => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidUserHeader(_) | Self::InvalidId(_) | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Stable machine-readable kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Game(e) => e.kind().as_str(),
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidUserHeader(_) => "invalid_user_header",
            Self::InvalidId(_) => "invalid_id",
            Self::InvalidBody(_) => "invalid_body",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Game(e) if e.is_business_rule() => {
                tracing::debug!(kind = e.kind().as_str(), error = %e, "Request refused by game rules");
                e.to_string()
            }
            Self::Game(e) => match e.kind() {
                ErrorKind::ConcurrencyConflict => {
                    tracing::warn!(error = %e, "Request lost a concurrency race");
                    "the request conflicted with another update, please try again".to_owned()
                }
                ErrorKind::StorageFailure => {
                    tracing::error!(error = %e, "Storage failure while serving request");
                    "internal storage error".to_owned()
                }
                _ => e.to_string(),
            },
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": self.kind(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use liferpg_db::DbError;
    use liferpg_types::{RewardId, TaskId};

    use super::*;

    #[test]
    fn business_errors_are_conflicts() {
        let err = ApiError::from(GameError::AlreadyCompleted {
            task_id: TaskId::new(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "already_completed");
    }

    #[test]
    fn storage_errors_are_server_errors() {
        let err = ApiError::from(GameError::Storage(DbError::Config("down".to_owned())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "storage_failure");

        let err = ApiError::from(GameError::ConcurrencyConflict(DbError::Conflict(
            "deadlock".to_owned(),
        )));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn refused_purchase_keeps_its_message() {
        let err = ApiError::from(GameError::OutOfStock(RewardId::new()));
        assert!(matches!(&err, ApiError::Game(e) if e.is_business_rule()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn identity_errors() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InvalidUserHeader("abc".to_owned()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
