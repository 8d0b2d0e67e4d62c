//! Integration tests for the timer engine and time entry ledger.
//!
//! These tests drive the engine through the database layer with a pinned
//! clock, so durations and window sums are exact rather than wall-time
//! dependent.

use std::sync::{Arc, Barrier};
use worklog::clock::Clock;
use worklog::db::Database;
use worklog::error::{ApiError, ErrorCode};
use worklog::types::{Project, Task, User};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;

/// Arbitrary pinned instant all fixed-clock tests start from.
const T0: i64 = 1_756_000_000_000;

/// Helper to create a fresh in-memory database with a pinned clock.
fn setup_db() -> Database {
    Database::open_in_memory_with_clock(Clock::fixed(T0))
        .expect("Failed to create in-memory database")
}

fn seed_user(db: &Database, email: &str) -> User {
    let (user, _session) = db
        .signup(email, "password1", "Test User", 86_400_000)
        .expect("signup should succeed");
    user
}

fn seed_project(db: &Database, user: &User) -> Project {
    let workspaces = db.list_workspaces(&user.id).expect("list workspaces");
    db.create_project(&user.id, "Deep Work", None, &workspaces[0].id)
        .expect("create project")
}

fn seed_task(db: &Database, user: &User, project: &Project) -> Task {
    db.create_task(
        &user.id,
        "Write report",
        None,
        None,
        None,
        &project.id,
        None,
    )
    .expect("create task")
}

fn api_error(err: anyhow::Error) -> ApiError {
    err.downcast::<ApiError>().expect("structured api error")
}

mod start_tests {
    use super::*;

    #[test]
    fn start_creates_open_entry_at_now() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let entry = db
            .start_timer(&user.id, &task.id, Some("pairing".to_string()))
            .expect("start should succeed");

        assert_eq!(entry.task_id, task.id);
        assert_eq!(entry.user_id, user.id);
        assert_eq!(entry.start_time, T0);
        assert_eq!(entry.description.as_deref(), Some("pairing"));
        assert!(entry.end_time.is_none());
        assert!(entry.duration.is_none());
        assert!(!entry.clock_skew);
    }

    #[test]
    fn active_reports_the_open_entry_with_its_task() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        assert!(db.get_active(&user.id).expect("get_active").is_none());

        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");

        let active = db
            .get_active(&user.id)
            .expect("get_active")
            .expect("running entry");
        assert_eq!(active.entry.id, entry.id);
        assert_eq!(active.task.id, task.id);
        assert_eq!(active.task.title, "Write report");
    }

    #[test]
    fn start_on_missing_task_is_not_found() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");

        let err = api_error(
            db.start_timer(&user.id, "no-such-task", None)
                .expect_err("start should fail"),
        );
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn start_on_invisible_task_reads_as_missing() {
        let db = setup_db();
        let owner = seed_user(&db, "owner@example.com");
        let project = seed_project(&db, &owner);
        let task = seed_task(&db, &owner, &project);

        let outsider = seed_user(&db, "outsider@example.com");
        let err = api_error(
            db.start_timer(&outsider.id, &task.id, None)
                .expect_err("start should fail"),
        );
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}

mod stop_tests {
    use super::*;

    #[test]
    fn immediate_stop_records_zero_minutes() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        let closed = db
            .stop_timer(&entry.id, &user.id)
            .expect("stop should succeed");

        assert_eq!(closed.end_time, Some(T0));
        assert_eq!(closed.duration, Some(0));
        assert!(!closed.clock_skew);

        // Zero recorded minutes roll up as zero.
        let tasks = db.list_tasks(&user.id).expect("list tasks");
        assert_eq!(tasks[0].total_time, 0);
    }

    #[test]
    fn three_minutes_of_work_record_three() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().advance_ms(180_000);

        let closed = db
            .stop_timer(&entry.id, &user.id)
            .expect("stop should succeed");
        assert_eq!(closed.end_time, Some(T0 + 180_000));
        assert_eq!(closed.duration, Some(3));
    }

    #[test]
    fn durations_round_half_up() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        // 90s rounds up to 2 minutes
        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().advance_ms(90_000);
        let closed = db
            .stop_timer(&entry.id, &user.id)
            .expect("stop should succeed");
        assert_eq!(closed.duration, Some(2));

        // 29.999s rounds down to 0
        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("second start should succeed");
        db.clock().advance_ms(29_999);
        let closed = db
            .stop_timer(&entry.id, &user.id)
            .expect("stop should succeed");
        assert_eq!(closed.duration, Some(0));
    }

    #[test]
    fn backwards_clock_clamps_to_zero_and_flags() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().set_ms(T0 - 5 * MINUTE_MS);

        let closed = db
            .stop_timer(&entry.id, &user.id)
            .expect("stop should still succeed");
        assert_eq!(closed.end_time, Some(T0 - 5 * MINUTE_MS));
        assert_eq!(closed.duration, Some(0));
        assert!(closed.clock_skew);

        // The flag is persisted, not just returned.
        let listed = db.list_entries(&user.id, None, None).expect("list entries");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].entry.clock_skew);
    }

    #[test]
    fn second_stop_is_no_active_timer() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().advance_ms(MINUTE_MS);
        let closed = db
            .stop_timer(&entry.id, &user.id)
            .expect("first stop should succeed");

        let err = api_error(
            db.stop_timer(&entry.id, &user.id)
                .expect_err("second stop should fail"),
        );
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "no active timer");

        // The recorded duration is untouched by the retry.
        let listed = db.list_entries(&user.id, None, None).expect("list entries");
        assert_eq!(listed[0].entry.duration, closed.duration);
    }

    #[test]
    fn stopping_someone_elses_entry_reads_as_no_active_timer() {
        let db = setup_db();
        let owner = seed_user(&db, "owner@example.com");
        let project = seed_project(&db, &owner);
        let task = seed_task(&db, &owner, &project);
        let entry = db
            .start_timer(&owner.id, &task.id, None)
            .expect("start should succeed");

        let outsider = seed_user(&db, "outsider@example.com");
        let err = api_error(
            db.stop_timer(&entry.id, &outsider.id)
                .expect_err("foreign stop should fail"),
        );
        assert_eq!(err.code, ErrorCode::NotFound);

        // The owner's entry is still open.
        assert!(db.get_active(&owner.id).expect("get_active").is_some());
    }
}

mod conflict_tests {
    use super::*;

    #[test]
    fn second_start_conflicts_with_the_running_entry_id() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);
        let other_task = db
            .create_task(&user.id, "Review PR", None, None, None, &project.id, None)
            .expect("create second task");

        let first = db
            .start_timer(&user.id, &task.id, None)
            .expect("first start should succeed");

        let err = api_error(
            db.start_timer(&user.id, &other_task.id, None)
                .expect_err("second start should conflict"),
        );
        assert_eq!(err.code, ErrorCode::TimerAlreadyRunning);
        let details = err.details.expect("conflict carries details");
        assert_eq!(details["active_entry_id"], first.id.as_str());

        // The first timer is unaffected.
        let active = db
            .get_active(&user.id)
            .expect("get_active")
            .expect("running entry");
        assert_eq!(active.entry.id, first.id);
    }

    #[test]
    fn stop_then_start_opens_a_fresh_entry() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let first = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().advance_ms(MINUTE_MS);
        db.stop_timer(&first.id, &user.id).expect("stop succeeds");

        let second = db
            .start_timer(&user.id, &task.id, None)
            .expect("restart should succeed");
        assert_ne!(second.id, first.id);
        assert_eq!(second.start_time, T0 + MINUTE_MS);
    }

    #[test]
    fn timers_do_not_contend_across_users() {
        let db = setup_db();
        let alice = seed_user(&db, "alice@example.com");
        let alice_project = seed_project(&db, &alice);
        let alice_task = seed_task(&db, &alice, &alice_project);

        let bob = seed_user(&db, "bob@example.com");
        let bob_project = seed_project(&db, &bob);
        let bob_task = seed_task(&db, &bob, &bob_project);

        db.start_timer(&alice.id, &alice_task.id, None)
            .expect("alice starts");
        db.start_timer(&bob.id, &bob_task.id, None)
            .expect("bob starts despite alice's open entry");
    }

    #[test]
    fn concurrent_starts_admit_exactly_one_open_entry() {
        // File-backed database: each pooled connection must see the same
        // data for the race to be real.
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(dir.path().join("worklog.db"), 4).expect("open file db");

        let user = seed_user(&db, "racer@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            let user_id = user.id.clone();
            let task_id = task.id.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                db.start_timer(&user_id, &task_id, None)
            }));
        }

        let mut winner = None;
        let mut conflict = None;
        for handle in handles {
            match handle.join().expect("thread joins") {
                Ok(entry) => {
                    assert!(winner.replace(entry).is_none(), "both starts succeeded");
                }
                Err(err) => {
                    conflict = Some(api_error(err));
                }
            }
        }

        let winner = winner.expect("exactly one start succeeds");
        let conflict = conflict.expect("exactly one start conflicts");
        assert_eq!(conflict.code, ErrorCode::TimerAlreadyRunning);
        let details = conflict.details.expect("conflict carries details");
        assert_eq!(details["active_entry_id"], winner.id.as_str());

        let active = db
            .get_active(&user.id)
            .expect("get_active")
            .expect("running entry");
        assert_eq!(active.entry.id, winner.id);
    }
}

mod ledger_tests {
    use super::*;

    /// Start at the current pinned instant, run for `minutes`, stop.
    fn record(db: &Database, user: &User, task: &Task, minutes: i64) {
        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().advance_ms(minutes * MINUTE_MS);
        db.stop_timer(&entry.id, &user.id)
            .expect("stop should succeed");
    }

    #[test]
    fn listing_is_newest_first_with_task_summaries() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        record(&db, &user, &task, 10);
        db.clock().advance_ms(HOUR_MS);
        record(&db, &user, &task, 20);

        let entries = db.list_entries(&user.id, None, None).expect("list entries");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].entry.start_time > entries[1].entry.start_time);
        assert_eq!(entries[0].entry.duration, Some(20));
        assert_eq!(entries[0].task.title, "Write report");
    }

    #[test]
    fn filter_by_task_narrows_the_listing() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let report = seed_task(&db, &user, &project);
        let review = db
            .create_task(&user.id, "Review PR", None, None, None, &project.id, None)
            .expect("create second task");

        record(&db, &user, &report, 5);
        db.clock().advance_ms(MINUTE_MS);
        record(&db, &user, &review, 7);
        db.clock().advance_ms(MINUTE_MS);
        record(&db, &user, &report, 9);

        let all = db.list_entries(&user.id, None, None).expect("list all");
        assert_eq!(all.len(), 3);

        let filtered = db
            .list_entries(&user.id, Some(report.id.as_str()), None)
            .expect("list filtered");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|e| e.task.id == report.id));
    }

    #[test]
    fn date_range_narrows_by_start_time() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        record(&db, &user, &task, 5); // starts at T0
        db.clock().set_ms(T0 + HOUR_MS);
        record(&db, &user, &task, 5);
        db.clock().set_ms(T0 + 2 * HOUR_MS);
        record(&db, &user, &task, 5);

        let windowed = db
            .list_entries(&user.id, None, Some((T0 + HOUR_MS, T0 + 2 * HOUR_MS)))
            .expect("list windowed");
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].entry.start_time, T0 + HOUR_MS);

        // Lower bound is inclusive, upper bound exclusive.
        let windowed = db
            .list_entries(&user.id, None, Some((T0, T0 + 2 * HOUR_MS)))
            .expect("list windowed");
        assert_eq!(windowed.len(), 2);
        assert!(windowed.iter().all(|e| e.entry.start_time < T0 + 2 * HOUR_MS));
    }

    #[test]
    fn date_range_combines_with_the_task_filter() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let report = seed_task(&db, &user, &project);
        let review = db
            .create_task(&user.id, "Review PR", None, None, None, &project.id, None)
            .expect("create second task");

        record(&db, &user, &report, 5); // starts at T0
        db.clock().set_ms(T0 + HOUR_MS);
        record(&db, &user, &review, 5);
        db.clock().set_ms(T0 + 2 * HOUR_MS);
        record(&db, &user, &report, 5);

        // The review entry is inside the window but filtered out by task.
        let filtered = db
            .list_entries(
                &user.id,
                Some(report.id.as_str()),
                Some((T0 + HOUR_MS, T0 + 3 * HOUR_MS)),
            )
            .expect("list filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].task.id, report.id);
        assert_eq!(filtered[0].entry.start_time, T0 + 2 * HOUR_MS);
    }

    #[test]
    fn entries_are_scoped_to_their_user() {
        let db = setup_db();
        let alice = seed_user(&db, "alice@example.com");
        let project = seed_project(&db, &alice);
        let task = seed_task(&db, &alice, &project);
        record(&db, &alice, &task, 15);

        let bob = seed_user(&db, "bob@example.com");
        assert!(db.list_entries(&bob.id, None, None).expect("list").is_empty());
    }

    #[test]
    fn sum_counts_closed_entries_in_half_open_window() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        record(&db, &user, &task, 10); // starts at T0

        // An entry starting exactly at the upper bound stays out.
        db.clock().set_ms(T0 + HOUR_MS);
        record(&db, &user, &task, 20);

        let sum = db
            .sum_durations(&user.id, T0, T0 + HOUR_MS)
            .expect("sum window");
        assert_eq!(sum, 10);

        // Inclusive lower bound, and both inside a wider window.
        let sum = db
            .sum_durations(&user.id, T0, T0 + 2 * HOUR_MS)
            .expect("sum window");
        assert_eq!(sum, 30);
    }

    #[test]
    fn open_entries_contribute_nothing_until_stopped() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        let entry = db
            .start_timer(&user.id, &task.id, None)
            .expect("start should succeed");
        db.clock().advance_ms(30 * MINUTE_MS);

        let sum = db
            .sum_durations(&user.id, T0, T0 + HOUR_MS)
            .expect("sum window");
        assert_eq!(sum, 0);

        db.stop_timer(&entry.id, &user.id).expect("stop succeeds");
        let sum = db
            .sum_durations(&user.id, T0, T0 + HOUR_MS)
            .expect("sum window");
        assert_eq!(sum, 30);
    }

    #[test]
    fn entries_attribute_to_the_window_containing_their_start() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        // Starts 10 minutes before the boundary, ends 20 after: all 30
        // minutes land in the first window.
        db.clock().set_ms(T0 + HOUR_MS - 10 * MINUTE_MS);
        record(&db, &user, &task, 30);

        let first = db
            .sum_durations(&user.id, T0, T0 + HOUR_MS)
            .expect("sum window");
        let second = db
            .sum_durations(&user.id, T0 + HOUR_MS, T0 + 2 * HOUR_MS)
            .expect("sum window");
        assert_eq!(first, 30);
        assert_eq!(second, 0);
    }

    #[test]
    fn adjacent_windows_sum_to_their_union() {
        let db = setup_db();
        let user = seed_user(&db, "a@example.com");
        let project = seed_project(&db, &user);
        let task = seed_task(&db, &user, &project);

        record(&db, &user, &task, 10);
        db.clock().set_ms(T0 + HOUR_MS); // exactly on the shared boundary
        record(&db, &user, &task, 20);
        db.clock().set_ms(T0 + HOUR_MS + 30 * MINUTE_MS);
        record(&db, &user, &task, 5);

        let a = T0;
        let b = T0 + HOUR_MS;
        let c = T0 + 2 * HOUR_MS;

        let left = db.sum_durations(&user.id, a, b).expect("sum left");
        let right = db.sum_durations(&user.id, b, c).expect("sum right");
        let union = db.sum_durations(&user.id, a, c).expect("sum union");
        assert_eq!(left + right, union);
        assert_eq!(left, 10);
        assert_eq!(right, 25);
    }
}
