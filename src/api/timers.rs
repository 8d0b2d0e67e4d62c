//! Timer and time-entry handlers.

use super::extract::CurrentUser;
use super::server::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
pub struct StartTimerRequest {
    task_id: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct StopTimerRequest {
    entry_id: Option<String>,
}

#[derive(Deserialize)]
pub struct EntryListQuery {
    task_id: Option<String>,
    from: Option<i64>,
    to: Option<i64>,
}

/// Start the caller's timer against a task. 409 with the running entry's id
/// if one is already open.
pub async fn start_timer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<StartTimerRequest>,
) -> Result<Json<Value>, ApiError> {
    let task_id = req
        .task_id
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("task_id"))?;

    let entry = state
        .db
        .start_timer(&user.id, task_id, req.description.clone())
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "entry": entry })))
}

/// Stop an open entry. Closing writes `end_time` and the rounded duration;
/// stopping anything that is not the caller's open entry is a 404.
pub async fn stop_timer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<StopTimerRequest>,
) -> Result<Json<Value>, ApiError> {
    let entry_id = req
        .entry_id
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("entry_id"))?;

    let entry = state
        .db
        .stop_timer(entry_id, &user.id)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "entry": entry })))
}

/// The caller's running entry with its task summary, or `entry: null`.
pub async fn get_active(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let active = state.db.get_active(&user.id).map_err(ApiError::from)?;
    Ok(Json(json!({ "entry": active })))
}

/// List the caller's entries, optionally filtered by `?task_id=` and/or a
/// `?from=&to=` start-time window (epoch ms, half-open).
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<EntryListQuery>,
) -> Result<Json<Value>, ApiError> {
    let range_ms = match (query.from, query.to) {
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        (Some(_), None) => return Err(ApiError::missing_field("to")),
        (None, Some(_)) => return Err(ApiError::missing_field("from")),
    };

    let entries = state
        .db
        .list_entries(&user.id, query.task_id.as_deref(), range_ms)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "entries": entries })))
}
