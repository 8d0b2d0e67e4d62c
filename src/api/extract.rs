//! Request extractors.

use super::server::AppState;
use crate::error::ApiError;
use crate::types::User;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};

/// The authenticated user, resolved from the `Authorization: Bearer` header.
/// Rejects with 401 when the header is absent or the session is invalid.
pub struct CurrentUser(pub User);

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;

        let user = state.db.authenticate(token).map_err(ApiError::from)?;
        Ok(CurrentUser(user))
    }
}
