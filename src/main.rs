//! Worklog server
//!
//! Task and time tracking over HTTP: a task store, a per-user timer, a
//! time entry ledger, and dashboard aggregation on top of SQLite.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use worklog::api::{AppState, serve};
use worklog::cli::{Cli, Command};
use worklog::config::Config;
use worklog::db::Database;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    // CLI arguments override file values
    if let Some(database) = &cli.database {
        config.database.path = database.into();
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    config.ensure_db_dir()?;

    match cli.command {
        Some(Command::Migrate) => {
            // Opening the database applies any pending migrations
            Database::open(&config.database.path, config.database.pool_size)?;
            info!("migrations up to date at {}", config.database.path.display());
        }
        Some(Command::Serve) | None => {
            let db = Database::open(&config.database.path, config.database.pool_size)?;
            let state = AppState::new(db, config.auth.session_ttl_ms());
            serve(state, &config.server.host, config.server.port).await?;
        }
    }

    Ok(())
}
