//! Project and workspace handlers.

use super::extract::CurrentUser;
use super::server::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    name: Option<String>,
    description: Option<String>,
    workspace_id: Option<String>,
}

/// Workspaces the caller belongs to, oldest first.
pub async fn list_workspaces(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let workspaces = state.db.list_workspaces(&user.id).map_err(ApiError::from)?;
    Ok(Json(json!({ "workspaces": workspaces })))
}

pub async fn list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let projects = state.db.list_projects(&user.id).map_err(ApiError::from)?;
    Ok(Json(json!({ "projects": projects })))
}

/// Create a project in a workspace the caller is a member of.
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = req
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("name"))?;
    let workspace_id = req
        .workspace_id
        .as_deref()
        .filter(|w| !w.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("workspace_id"))?;

    let project = state
        .db
        .create_project(&user.id, name, req.description.clone(), workspace_id)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "project": project })))
}
