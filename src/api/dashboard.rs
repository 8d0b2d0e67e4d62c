//! Dashboard statistics handler.

use super::extract::CurrentUser;
use super::server::AppState;
use crate::error::ApiError;
use crate::types::DashboardStats;
use axum::Json;
use axum::extract::State;

/// Task counts and time windows for the caller, recomputed on every call.
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state.db.dashboard_stats(&user.id).map_err(ApiError::from)?;
    Ok(Json(stats))
}
