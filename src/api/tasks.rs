//! Task CRUD handlers.

use super::extract::CurrentUser;
use super::server::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH-style payloads.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    project_id: Option<String>,
    assignee_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    status: Option<String>,
    priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    assignee_id: Option<Option<String>>,
}

/// List the caller's visible tasks, newest first, each with its project,
/// time entries, and summed logged minutes.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let tasks = state.db.list_tasks(&user.id).map_err(ApiError::from)?;
    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    let title = req
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("title"))?;
    let project_id = req
        .project_id
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("project_id"))?;

    let task = state
        .db
        .create_task(
            &user.id,
            title,
            req.description.clone(),
            req.status.as_deref(),
            req.priority.as_deref(),
            project_id,
            req.assignee_id.clone(),
        )
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "task": task })))
}

/// Status audit trail for one visible task, oldest change first. The
/// creation row is always present, so the list is never empty for a task
/// the caller can see.
pub async fn get_status_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let history = state
        .db
        .get_status_history(&task_id, &user.id)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "history": history })))
}

/// Partial update. Absent fields keep their value; `description` and
/// `assignee_id` accept an explicit `null` to clear.
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    let task = state
        .db
        .update_task(
            &task_id,
            &user.id,
            req.title,
            req.description,
            req.status,
            req.priority,
            req.assignee_id,
        )
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "task": task })))
}
