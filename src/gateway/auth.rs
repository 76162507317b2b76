//! Caller identification
//!
//! Session issuance lives in an upstream collaborator; by the time a
//! request reaches this gateway the authenticated user id travels in the
//! `X-User-Id` header. A missing or malformed header maps to the
//! authentication-required category, not a generic error.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::core_types::UserId;

use super::types::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// Extractor for the authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<UserId>().ok())
            .map(AuthUser)
            .ok_or_else(ApiError::unauthorized)
    }
}
