//! Aggregator: derived dashboard counts and time windows.
//!
//! Everything here is computed from the task store and the ledger on each
//! call; nothing is cached or stored back.

use super::Database;
use super::entries::sum_durations_internal;
use crate::types::{DashboardStats, TaskStats, TaskStatus, TimeStats};
use anyhow::{Context, Result};
use chrono::{Datelike, TimeZone, Utc};
use rusqlite::params;

const DAY_MS: i64 = 86_400_000;

/// The UTC day containing `now_ms`: midnight to midnight, half open.
fn day_window(now_ms: i64) -> (i64, i64) {
    let start = now_ms - now_ms.rem_euclid(DAY_MS);
    (start, start + DAY_MS)
}

/// Rolling seven days ending at `now_ms`.
fn week_window(now_ms: i64) -> (i64, i64) {
    (now_ms - 7 * DAY_MS, now_ms)
}

/// The UTC calendar month containing `now_ms`: first of the month to first
/// of the next.
fn month_window(now_ms: i64) -> Result<(i64, i64)> {
    let now = Utc
        .timestamp_millis_opt(now_ms)
        .single()
        .context("timestamp out of range")?;

    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .context("month start out of range")?;

    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .context("month end out of range")?;

    Ok((start.timestamp_millis(), end.timestamp_millis()))
}

impl Database {
    /// Dashboard snapshot for the caller: counts of visible tasks by status
    /// plus summed minutes for today, the trailing week, and the current
    /// calendar month.
    pub fn dashboard_stats(&self, user_id: &str) -> Result<DashboardStats> {
        let now = self.now_ms();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.status, COUNT(*) FROM tasks t
                 JOIN projects p ON p.id = t.project_id
                 JOIN workspace_members m ON m.workspace_id = p.workspace_id
                 WHERE m.user_id = ?1
                 GROUP BY t.status",
            )?;
            let status_counts = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut task_stats = TaskStats::default();
            for (status, count) in status_counts {
                task_stats.total += count;
                // Rows with an unrecognized status (hand-edited database)
                // still count toward the total.
                match TaskStatus::from_str(&status) {
                    Some(TaskStatus::Todo) => task_stats.todo += count,
                    Some(TaskStatus::InProgress) => task_stats.in_progress += count,
                    Some(TaskStatus::Completed) => task_stats.completed += count,
                    None => {}
                }
            }

            let (today_from, today_to) = day_window(now);
            let (week_from, week_to) = week_window(now);
            let (month_from, month_to) = month_window(now)?;

            let time_stats = TimeStats {
                today: sum_durations_internal(conn, user_id, today_from, today_to)?,
                week: sum_durations_internal(conn, user_id, week_from, week_to)?,
                month: sum_durations_internal(conn, user_id, month_from, month_to)?,
            };

            Ok(DashboardStats {
                task_stats,
                time_stats,
            })
        })
    }
}
