//! Workspace and project directory: who can see what.
//!
//! Visibility is membership-based. A user sees a workspace iff they are a
//! member, a project iff its workspace is visible, and a task iff its
//! project is visible.

use super::Database;
use crate::error::ApiError;
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::types::{Project, Workspace};

/// Outcome of a project visibility check. Missing and invisible are kept
/// apart here; the task store decides what each one surfaces as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProjectAccess {
    Visible,
    Missing,
    Forbidden,
}

pub(crate) fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
    })
}

/// Internal helper to check workspace membership on an existing connection.
pub(crate) fn workspace_member(
    conn: &Connection,
    workspace_id: &str,
    user_id: &str,
) -> Result<bool> {
    let member: bool = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM workspace_members
             WHERE workspace_id = ?1 AND user_id = ?2
         )",
        params![workspace_id, user_id],
        |row| row.get(0),
    )?;
    Ok(member)
}

/// Internal helper to resolve a project for an acting user.
pub(crate) fn project_access(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<ProjectAccess> {
    let workspace_id: Option<String> = {
        let result = conn.query_row(
            "SELECT workspace_id FROM projects WHERE id = ?1",
            params![project_id],
            |row| row.get(0),
        );
        match result {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        }
    };

    let Some(workspace_id) = workspace_id else {
        return Ok(ProjectAccess::Missing);
    };

    if workspace_member(conn, &workspace_id, user_id)? {
        Ok(ProjectAccess::Visible)
    } else {
        Ok(ProjectAccess::Forbidden)
    }
}

impl Database {
    /// Create a project in a workspace the acting user belongs to.
    pub fn create_project(
        &self,
        user_id: &str,
        name: &str,
        description: Option<String>,
        workspace_id: &str,
    ) -> Result<Project> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::missing_field("name").into());
        }

        let now = self.now_ms();

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM workspaces WHERE id = ?1)",
                params![workspace_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(ApiError::invalid_value(
                    "workspace_id",
                    format!("workspace does not exist: {}", workspace_id),
                )
                .into());
            }
            if !workspace_member(conn, workspace_id, user_id)? {
                return Err(
                    ApiError::forbidden("not a member of this workspace").into()
                );
            }

            let project = Project {
                id: Uuid::now_v7().to_string(),
                workspace_id: workspace_id.to_string(),
                name,
                description,
                created_by: user_id.to_string(),
                created_at: now,
            };

            conn.execute(
                "INSERT INTO projects (id, workspace_id, name, description, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id,
                    project.workspace_id,
                    project.name,
                    project.description,
                    project.created_by,
                    project.created_at
                ],
            )?;

            Ok(project)
        })
    }

    /// List projects across the user's workspaces, ordered by name.
    pub fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.workspace_id, p.name, p.description, p.created_by, p.created_at
                 FROM projects p
                 JOIN workspace_members m ON m.workspace_id = p.workspace_id
                 WHERE m.user_id = ?1
                 ORDER BY p.name",
            )?;

            let projects = stmt
                .query_map(params![user_id], parse_project_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(projects)
        })
    }

    /// List workspaces the user is a member of, oldest first.
    pub fn list_workspaces(&self, user_id: &str) -> Result<Vec<Workspace>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.name, w.owner_id, w.created_at
                 FROM workspaces w
                 JOIN workspace_members m ON m.workspace_id = w.id
                 WHERE m.user_id = ?1
                 ORDER BY w.created_at",
            )?;

            let workspaces = stmt
                .query_map(params![user_id], |row| {
                    Ok(Workspace {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        owner_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(workspaces)
        })
    }
}
