//! Timer engine: per-user single active timer over the time entry ledger.
//!
//! A user is either idle or tracking exactly one entry. Starting while idle
//! opens an entry (`end_time` NULL); stopping closes it by writing
//! `end_time` and the rounded duration in one statement. The partial unique
//! index `ux_time_entries_open` backs the one-open-entry rule at the storage
//! level, so a lost race surfaces as a constraint failure rather than a
//! second open row.

use super::Database;
use super::entries::{parse_entry_row, parse_entry_with_task_row};
use super::tasks::get_task_visible_internal;
use crate::error::ApiError;
use crate::types::{TimeEntry, TimeEntryWithTask};
use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior, params};
use uuid::Uuid;

/// Round a non-negative elapsed span to whole minutes, half up.
/// 30s becomes one minute; 29.999s becomes zero.
pub(crate) fn round_minutes(elapsed_ms: i64) -> i64 {
    (elapsed_ms + 30_000) / 60_000
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// The user's open entry, if any. At most one row can match thanks to
/// `ux_time_entries_open`.
pub(crate) fn open_entry_internal(conn: &Connection, user_id: &str) -> Result<Option<TimeEntry>> {
    let result = conn.query_row(
        "SELECT * FROM time_entries WHERE user_id = ?1 AND end_time IS NULL",
        params![user_id],
        parse_entry_row,
    );

    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Start tracking time against a task. Fails with `TIMER_ALREADY_RUNNING`
    /// (carrying the running entry's id) if the user already has an open
    /// entry, and with `NOT_FOUND` if the task is missing or not visible.
    pub fn start_timer(
        &self,
        user_id: &str,
        task_id: &str,
        description: Option<String>,
    ) -> Result<TimeEntry> {
        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if get_task_visible_internal(&tx, task_id, user_id)?.is_none() {
                return Err(ApiError::task_not_found(task_id).into());
            }

            if let Some(active) = open_entry_internal(&tx, user_id)? {
                return Err(ApiError::timer_already_running(&active.id).into());
            }

            let entry = TimeEntry {
                id: Uuid::now_v7().to_string(),
                task_id: task_id.to_string(),
                user_id: user_id.to_string(),
                description,
                start_time: now,
                end_time: None,
                duration: None,
                clock_skew: false,
            };

            let inserted = tx.execute(
                "INSERT INTO time_entries (id, task_id, user_id, description, start_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id,
                    entry.task_id,
                    entry.user_id,
                    entry.description,
                    entry.start_time
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    // Lost the open-entry race to a writer outside this
                    // transaction. Report the entry that won.
                    return match open_entry_internal(&tx, user_id)? {
                        Some(active) => Err(ApiError::timer_already_running(&active.id).into()),
                        None => Err(err.into()),
                    };
                }
                Err(err) => return Err(err.into()),
            }

            tx.commit()?;

            Ok(entry)
        })
    }

    /// Stop an open entry owned by the caller, writing `end_time` and the
    /// rounded duration atomically. A missing, foreign, or already-closed
    /// entry reads uniformly as "no active timer", so retrying a stop is
    /// harmless.
    pub fn stop_timer(&self, entry_id: &str, user_id: &str) -> Result<TimeEntry> {
        let now = self.now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let result = tx.query_row(
                "SELECT * FROM time_entries
                 WHERE id = ?1 AND user_id = ?2 AND end_time IS NULL",
                params![entry_id, user_id],
                parse_entry_row,
            );

            let open = match result {
                Ok(entry) => entry,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(ApiError::no_active_timer().into());
                }
                Err(e) => return Err(e.into()),
            };

            let elapsed_ms = now - open.start_time;
            // A backwards clock clamps to zero and flags the entry instead
            // of recording a negative duration.
            let clock_skew = elapsed_ms < 0;
            let duration = if clock_skew { 0 } else { round_minutes(elapsed_ms) };

            tx.execute(
                "UPDATE time_entries SET end_time = ?1, duration = ?2, clock_skew = ?3
                 WHERE id = ?4 AND end_time IS NULL",
                params![now, duration, clock_skew, entry_id],
            )?;

            tx.commit()?;

            Ok(TimeEntry {
                end_time: Some(now),
                duration: Some(duration),
                clock_skew,
                ..open
            })
        })
    }

    /// The caller's running entry with its task summary, or `None` when idle.
    pub fn get_active(&self, user_id: &str) -> Result<Option<TimeEntryWithTask>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT e.*, t.title AS task_title, t.status AS task_status,
                        t.priority AS task_priority, t.project_id AS task_project_id
                 FROM time_entries e
                 JOIN tasks t ON t.id = e.task_id
                 WHERE e.user_id = ?1 AND e.end_time IS NULL",
                params![user_id],
                parse_entry_with_task_row,
            );

            match result {
                Ok(active) => Ok(Some(active)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up_to_whole_minutes() {
        assert_eq!(round_minutes(0), 0);
        assert_eq!(round_minutes(29_999), 0);
        assert_eq!(round_minutes(30_000), 1);
        assert_eq!(round_minutes(59_999), 1);
        assert_eq!(round_minutes(60_000), 1);
        assert_eq!(round_minutes(89_999), 1);
        assert_eq!(round_minutes(90_000), 2);
        assert_eq!(round_minutes(180_000), 3);
    }
}
