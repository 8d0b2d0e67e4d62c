//! Signup, login, and logout.

use super::extract::{CurrentUser, bearer_token};
use super::server::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
pub struct SignupRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ApiError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::missing_field(field)),
    }
}

/// Create an account. Provisions the user's personal workspace and returns
/// a fresh session alongside the user.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = required(&req.email, "email")?;
    let password = required(&req.password, "password")?;
    let name = required(&req.name, "name")?;

    let (user, session) = state
        .db
        .signup(email, password, name, state.session_ttl_ms)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "user": user, "session": session })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = required(&req.email, "email")?;
    let password = required(&req.password, "password")?;

    let (user, session) = state
        .db
        .login(email, password, state.session_ttl_ms)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "user": user, "session": session })))
}

/// Invalidate the caller's session token.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _user: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    // CurrentUser already validated the header, so the token is present.
    if let Some(token) = bearer_token(&headers) {
        state.db.logout(token).map_err(ApiError::from)?;
    }

    Ok(Json(json!({ "message": "logged out" })))
}
