//! Database layer for the worklog service.

pub mod directory;
pub mod entries;
pub mod stats;
pub mod tasks;
pub mod timers;
pub mod users;

use crate::clock::Clock;
use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    // WAL for concurrent readers alongside the single writer
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )
}

/// Database handle wrapping a SQLite connection pool and the service clock.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    clock: Clock,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self> {
        Self::open_with_clock(path, pool_size, Clock::system())
    }

    /// Open a file-backed database with an explicit clock.
    pub fn open_with_clock<P: AsRef<Path>>(
        path: P,
        pool_size: u32,
        clock: Clock,
    ) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let db = Self { pool, clock };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing). Capped at one pooled
    /// connection: every `:memory:` connection is its own database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_clock(Clock::system())
    }

    /// In-memory database with an explicit clock.
    pub fn open_in_memory_with_clock(clock: Clock) -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(configure_connection);
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool, clock };
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.get()?;
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// The clock this handle stamps rows with.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current time in epoch milliseconds, from the service clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Execute a function with a pooled connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.pool.get()?;
        f(&conn)
    }

    /// Execute a function with a mutable pooled connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }
}
