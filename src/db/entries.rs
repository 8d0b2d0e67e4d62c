//! Time entry ledger: listings and window sums over closed entries.

use super::Database;
use crate::types::{TaskPriority, TaskStatus, TaskSummary, TimeEntry, TimeEntryWithTask};
use anyhow::Result;
use rusqlite::{Row, params};

pub(crate) fn parse_entry_row(row: &Row) -> rusqlite::Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        description: row.get("description")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        duration: row.get("duration")?,
        clock_skew: row.get("clock_skew")?,
    })
}

/// Closed-entry minutes for one user over the half-open window
/// `[from_ms, to_ms)`, keyed on `start_time`.
pub(crate) fn sum_durations_internal(
    conn: &rusqlite::Connection,
    user_id: &str,
    from_ms: i64,
    to_ms: i64,
) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(duration), 0) FROM time_entries
         WHERE user_id = ?1 AND end_time IS NOT NULL
           AND start_time >= ?2 AND start_time < ?3",
        params![user_id, from_ms, to_ms],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub(crate) fn parse_entry_with_task_row(row: &Row) -> rusqlite::Result<TimeEntryWithTask> {
    let entry = parse_entry_row(row)?;

    let status_raw: String = row.get("task_status")?;
    let priority_raw: String = row.get("task_priority")?;
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

    let task = TaskSummary {
        id: entry.task_id.clone(),
        title: row.get("task_title")?,
        status,
        priority,
        project_id: row.get("task_project_id")?,
    };

    Ok(TimeEntryWithTask { entry, task })
}

impl Database {
    /// List the user's time entries, newest start first, each with a summary
    /// of its owning task. Optionally narrowed to one task and/or a half-open
    /// `[from_ms, to_ms)` window keyed on `start_time`.
    pub fn list_entries(
        &self,
        user_id: &str,
        task_id: Option<&str>,
        range_ms: Option<(i64, i64)>,
    ) -> Result<Vec<TimeEntryWithTask>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT e.*, t.title AS task_title, t.status AS task_status,
                        t.priority AS task_priority, t.project_id AS task_project_id
                 FROM time_entries e
                 JOIN tasks t ON t.id = e.task_id
                 WHERE e.user_id = ?1",
            );

            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            params_vec.push(Box::new(user_id.to_string()));

            if let Some(tid) = task_id {
                params_vec.push(Box::new(tid.to_string()));
                sql.push_str(&format!(" AND e.task_id = ?{}", params_vec.len()));
            }
            if let Some((from_ms, to_ms)) = range_ms {
                params_vec.push(Box::new(from_ms));
                sql.push_str(&format!(" AND e.start_time >= ?{}", params_vec.len()));
                params_vec.push(Box::new(to_ms));
                sql.push_str(&format!(" AND e.start_time < ?{}", params_vec.len()));
            }

            sql.push_str(" ORDER BY e.start_time DESC");

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params_refs.as_slice(), parse_entry_with_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(entries)
        })
    }

    /// Sum closed-entry minutes whose start falls in the half-open window
    /// `[from_ms, to_ms)`. Open entries contribute nothing until stopped.
    pub fn sum_durations(&self, user_id: &str, from_ms: i64, to_ms: i64) -> Result<i64> {
        self.with_conn(|conn| sum_durations_internal(conn, user_id, from_ms, to_ms))
    }
}
