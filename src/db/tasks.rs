//! Task store: creation, visible listings, and audited updates.

use super::Database;
use super::directory::{ProjectAccess, project_access};
use super::entries::parse_entry_row;
use super::users::get_user_internal;
use crate::error::ApiError;
use crate::types::{
    ProjectSummary, StatusChange, Task, TaskPriority, TaskStatus, TaskWithContext, TimeEntry,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status_raw: String = row.get("status")?;
    let priority_raw: String = row.get("priority")?;

    let status = TaskStatus::from_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown task status '{}'", status_raw).into(),
        )
    })?;
    let priority = TaskPriority::from_str(&priority_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown task priority '{}'", priority_raw).into(),
        )
    })?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status,
        priority,
        project_id: row.get("project_id")?,
        assignee_id: row.get("assignee_id")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to fetch a task iff it is visible to the acting user.
/// Missing and invisible both come back as `None`.
pub(crate) fn get_task_visible_internal(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(
        "SELECT t.* FROM tasks t
         JOIN projects p ON p.id = t.project_id
         JOIN workspace_members m ON m.workspace_id = p.workspace_id
         WHERE t.id = ?1 AND m.user_id = ?2",
    )?;

    let result = stmt.query_row(params![task_id, user_id], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append a snapshot row to the status audit log.
fn record_status_change(
    conn: &Connection,
    task_id: &str,
    status: TaskStatus,
    changed_by: &str,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO task_status_log (task_id, status, changed_by, changed_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![task_id, status.as_str(), changed_by, now],
    )?;
    Ok(())
}

fn parse_status(raw: Option<&str>) -> Result<Option<TaskStatus>> {
    match raw {
        None => Ok(None),
        Some(s) => match TaskStatus::from_str(s) {
            Some(status) => Ok(Some(status)),
            None => Err(ApiError::invalid_value(
                "status",
                format!("unknown status '{}', expected todo, in_progress, or completed", s),
            )
            .into()),
        },
    }
}

fn parse_priority(raw: Option<&str>) -> Result<Option<TaskPriority>> {
    match raw {
        None => Ok(None),
        Some(s) => match TaskPriority::from_str(s) {
            Some(priority) => Ok(Some(priority)),
            None => Err(ApiError::invalid_value(
                "priority",
                format!("unknown priority '{}', expected low, medium, or high", s),
            )
            .into()),
        },
    }
}

impl Database {
    /// Create a task in a project visible to the acting user.
    ///
    /// An unresolvable project is a validation failure; a project the user
    /// merely cannot access is an authorization failure.
    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &self,
        user_id: &str,
        title: &str,
        description: Option<String>,
        status: Option<&str>,
        priority: Option<&str>,
        project_id: &str,
        assignee_id: Option<String>,
    ) -> Result<Task> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::missing_field("title").into());
        }
        let status = parse_status(status)?.unwrap_or(TaskStatus::Todo);
        let priority = parse_priority(priority)?.unwrap_or(TaskPriority::Medium);

        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            match project_access(&tx, project_id, user_id)? {
                ProjectAccess::Visible => {}
                ProjectAccess::Missing => {
                    return Err(ApiError::invalid_value(
                        "project_id",
                        format!("project does not resolve: {}", project_id),
                    )
                    .into());
                }
                ProjectAccess::Forbidden => {
                    return Err(ApiError::forbidden("no access to this project").into());
                }
            }

            if let Some(ref assignee) = assignee_id
                && get_user_internal(&tx, assignee)?.is_none()
            {
                return Err(ApiError::invalid_value(
                    "assignee_id",
                    format!("no such user: {}", assignee),
                )
                .into());
            }

            let task = Task {
                id: Uuid::now_v7().to_string(),
                title,
                description,
                status,
                priority,
                project_id: project_id.to_string(),
                assignee_id,
                created_by: user_id.to_string(),
                created_at: now,
                updated_at: now,
            };

            tx.execute(
                "INSERT INTO tasks (
                    id, title, description, status, priority,
                    project_id, assignee_id, created_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.project_id,
                    task.assignee_id,
                    task.created_by,
                    task.created_at,
                    task.updated_at,
                ],
            )?;

            // Baseline snapshot so the audit log starts at the initial status
            record_status_change(&tx, &task.id, task.status, user_id, now)?;

            tx.commit()?;

            Ok(task)
        })
    }

    /// List the user's visible tasks, newest first, each enriched with its
    /// project summary, embedded time entries, and total recorded minutes.
    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskWithContext>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.*, p.name AS project_name
                 FROM tasks t
                 JOIN projects p ON p.id = t.project_id
                 JOIN workspace_members m ON m.workspace_id = p.workspace_id
                 WHERE m.user_id = ?1
                 ORDER BY t.created_at DESC",
            )?;

            let tasks = stmt
                .query_map(params![user_id], |row| {
                    let task = parse_task_row(row)?;
                    let project_name: String = row.get("project_name")?;
                    Ok((task, project_name))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            // One pass over the entries of all visible tasks, grouped by task
            let mut stmt = conn.prepare(
                "SELECT e.* FROM time_entries e
                 JOIN tasks t ON t.id = e.task_id
                 JOIN projects p ON p.id = t.project_id
                 JOIN workspace_members m ON m.workspace_id = p.workspace_id
                 WHERE m.user_id = ?1
                 ORDER BY e.start_time DESC",
            )?;

            let entries = stmt
                .query_map(params![user_id], parse_entry_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut by_task: HashMap<String, Vec<TimeEntry>> = HashMap::new();
            for entry in entries {
                by_task.entry(entry.task_id.clone()).or_default().push(entry);
            }

            let listed = tasks
                .into_iter()
                .map(|(task, project_name)| {
                    let time_entries = by_task.remove(&task.id).unwrap_or_default();
                    let total_time = time_entries
                        .iter()
                        .filter(|e| e.end_time.is_some())
                        .map(|e| e.duration.unwrap_or(0))
                        .sum();

                    TaskWithContext {
                        project: ProjectSummary {
                            id: task.project_id.clone(),
                            name: project_name,
                        },
                        task,
                        time_entries,
                        total_time,
                    }
                })
                .collect();

            Ok(listed)
        })
    }

    /// Partially update a task the user can see. A status change appends to
    /// the audit log; open time entries are never touched.
    #[allow(clippy::too_many_arguments)]
    pub fn update_task(
        &self,
        task_id: &str,
        user_id: &str,
        title: Option<String>,
        description: Option<Option<String>>,
        status: Option<String>,
        priority: Option<String>,
        assignee_id: Option<Option<String>>,
    ) -> Result<Task> {
        let new_status = parse_status(status.as_deref())?;
        let new_priority = parse_priority(priority.as_deref())?;
        if let Some(ref t) = title
            && t.trim().is_empty()
        {
            return Err(ApiError::invalid_value("title", "title must not be empty").into());
        }

        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_visible_internal(&tx, task_id, user_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            if let Some(Some(ref assignee)) = assignee_id
                && get_user_internal(&tx, assignee)?.is_none()
            {
                return Err(ApiError::invalid_value(
                    "assignee_id",
                    format!("no such user: {}", assignee),
                )
                .into());
            }

            let new_title = title
                .map(|t| t.trim().to_string())
                .unwrap_or(task.title.clone());
            let new_description = description.unwrap_or(task.description.clone());
            let new_status = new_status.unwrap_or(task.status);
            let new_priority = new_priority.unwrap_or(task.priority);
            let new_assignee = assignee_id.unwrap_or(task.assignee_id.clone());

            tx.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, status = ?3, priority = ?4,
                    assignee_id = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    new_title,
                    new_description,
                    new_status.as_str(),
                    new_priority.as_str(),
                    new_assignee,
                    now,
                    task_id,
                ],
            )?;

            if new_status != task.status {
                record_status_change(&tx, task_id, new_status, user_id, now)?;
            }

            tx.commit()?;

            Ok(Task {
                title: new_title,
                description: new_description,
                status: new_status,
                priority: new_priority,
                assignee_id: new_assignee,
                updated_at: now,
                ..task
            })
        })
    }

    /// The task's status audit trail, oldest first. The first row is the
    /// status at creation; each later row records the status after a change.
    pub fn get_status_history(&self, task_id: &str, user_id: &str) -> Result<Vec<StatusChange>> {
        self.with_conn(|conn| {
            if get_task_visible_internal(conn, task_id, user_id)?.is_none() {
                return Err(ApiError::task_not_found(task_id).into());
            }

            let mut stmt = conn.prepare(
                "SELECT status, changed_by, changed_at FROM task_status_log
                 WHERE task_id = ?1
                 ORDER BY id ASC",
            )?;

            let history = stmt
                .query_map(params![task_id], |row| {
                    let raw: String = row.get("status")?;
                    let status = TaskStatus::from_str(&raw).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            format!("unknown task status '{}'", raw).into(),
                        )
                    })?;
                    Ok(StatusChange {
                        status,
                        changed_by: row.get("changed_by")?,
                        changed_at: row.get("changed_at")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(history)
        })
    }
}
