//! HTTP/JSON surface for the worklog service.
//!
//! Handlers derive the acting user from the bearer token and call straight
//! into the database layer; errors ride the [`ApiError`] envelope.

pub mod server;

mod auth;
mod dashboard;
mod extract;
mod projects;
mod tasks;
mod timers;

pub use extract::CurrentUser;
pub use server::{AppState, build_router, serve};

use crate::error::{ApiError, ErrorCode};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::MissingRequiredField | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::TimerAlreadyRunning | ErrorCode::AlreadyExists => StatusCode::CONFLICT,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Substrate failures are logged in full but cross the wire with a generic
/// message. Everything else passes through unchanged.
fn scrub(err: ApiError) -> ApiError {
    match err.code {
        ErrorCode::DatabaseError | ErrorCode::InternalError => {
            error!("internal error: {}", err.message);
            ApiError::new(err.code, "internal error")
        }
        ErrorCode::Forbidden => {
            // Audit trail for denied access
            warn!("authorization denied: {}", err.message);
            err
        }
        _ => err,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.code);
        let err = scrub(self);
        (status, Json(json!({ "error": err }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_expected_statuses() {
        assert_eq!(
            status_for(ErrorCode::MissingRequiredField),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(ErrorCode::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for(ErrorCode::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorCode::TimerAlreadyRunning),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(ErrorCode::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorCode::DatabaseError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_messages_are_scrubbed_from_the_wire() {
        let scrubbed = scrub(ApiError::database("disk I/O error at /var/db"));
        assert_eq!(scrubbed.code, ErrorCode::DatabaseError);
        assert_eq!(scrubbed.message, "internal error");

        let passed = scrub(ApiError::no_active_timer());
        assert_eq!(passed.message, "no active timer");
    }
}
