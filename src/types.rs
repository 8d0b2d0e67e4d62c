//! Core types for the worklog service.

use serde::{Deserialize, Serialize};

/// Task status. Closed set; adding a variant means updating the dashboard
/// bucket mapping in `db::stats` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// Task priority. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

/// A registered user. The password hash never leaves the db layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: i64,
}

/// An authenticated session. The token is the bearer credential, exposed on
/// the wire as `access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "access_token")]
    pub token: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A workspace grouping projects. Signup provisions one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: i64,
}

/// A project inside a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: i64,
}

/// Compact project representation embedded in task listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
}

/// A task in a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub project_id: String,
    pub assignee_id: Option<String>,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compact task representation embedded in time entry listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub project_id: String,
}

/// One row of a task's status audit trail: the status the task held from
/// `changed_at` on, and who put it there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TaskStatus,
    pub changed_by: String,
    pub changed_at: i64,
}

/// A recorded stretch of work on a task.
///
/// `end_time` and `duration` are null while the entry is running and are set
/// together by a single stop. `duration` is whole minutes. `clock_skew` marks
/// entries whose duration was clamped to zero because the stop observed an
/// end time earlier than the start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub description: Option<String>,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration: Option<i64>,
    #[serde(default)]
    pub clock_skew: bool,
}

impl TimeEntry {
    /// True while the timer is still running.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A task enriched with its project, entries, and recorded minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWithContext {
    #[serde(flatten)]
    pub task: Task,
    pub project: ProjectSummary,
    pub time_entries: Vec<TimeEntry>,
    /// Sum of this task's closed-entry durations, in minutes.
    pub total_time: i64,
}

/// A time entry enriched with a summary of its owning task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntryWithTask {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub task: TaskSummary,
}

/// Task counts per status for the requesting user's visible tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub completed: i64,
}

/// Summed minutes of the user's closed entries per window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStats {
    /// Current UTC day, midnight to midnight.
    pub today: i64,
    /// Rolling 7-day window ending at now.
    pub week: i64,
    /// Current UTC calendar month.
    pub month: i64,
}

/// Derived dashboard snapshot. Recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(rename = "taskStats")]
    pub task_stats: TaskStats,
    #[serde(rename = "timeStats")]
    pub time_stats: TimeStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("archived"), None);
    }

    #[test]
    fn priority_round_trips_through_str() {
        for priority in [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High] {
            assert_eq!(TaskPriority::from_str(priority.as_str()), Some(priority));
        }
        assert_eq!(TaskPriority::from_str("urgent"), None);
    }

    #[test]
    fn dashboard_stats_serialize_with_camel_case_keys() {
        let stats = DashboardStats {
            task_stats: TaskStats { total: 3, todo: 1, in_progress: 1, completed: 1 },
            time_stats: TimeStats { today: 5, week: 30, month: 120 },
        };

        let json = serde_json::to_value(&stats).expect("serializes");
        assert!(json.get("taskStats").is_some());
        assert!(json.get("timeStats").is_some());
        assert_eq!(json["taskStats"]["in_progress"], 1);
        assert_eq!(json["timeStats"]["week"], 30);
    }
}
