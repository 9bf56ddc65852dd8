//! Request extractors.
//!
//! Authentication happens upstream. The gateway resolves the session and
//! forwards the caller's id in the `x-user-id` header; this layer trusts
//! it as given.

use core::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use liferpg_types::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf the request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(ApiError::Unauthenticated)?;
        let text = value
            .to_str()
            .map_err(|e| ApiError::InvalidUserHeader(e.to_string()))?;
        text.trim()
            .parse::<UserId>()
            .map(Self)
            .map_err(|e| ApiError::InvalidUserHeader(format!("{text}: {e}")))
    }
}

/// Parse a path segment as a typed id.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::InvalidId(format!("{raw}: {e}")))
}
