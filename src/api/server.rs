//! Axum server wiring: shared state, routes, and lifecycle.

use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{auth, dashboard, projects, tasks, timers};
use crate::db::Database;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the task and ledger database.
    pub db: Database,
    /// Lifetime stamped onto newly minted sessions.
    pub session_ttl_ms: i64,
}

impl AppState {
    pub fn new(db: Database, session_ttl_ms: i64) -> Self {
        Self { db, session_ttl_ms }
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Permissive CORS; the API is bearer-token authenticated.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/workspaces", get(projects::list_workspaces))
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/{task_id}", put(tasks::update_task))
        .route(
            "/api/tasks/{task_id}/history",
            get(tasks::get_status_history),
        )
        .route("/api/time-entries", get(timers::list_entries))
        .route("/api/time-entries/start", post(timers::start_timer))
        .route("/api/time-entries/stop", post(timers::stop_timer))
        .route("/api/time-entries/active", get(timers::get_active))
        .route("/api/dashboard/stats", get(dashboard::stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

/// Bind and serve until interrupted.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
