//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`, and every error body uses the standard envelope
//! (`success: false` plus a message).

use std::sync::OnceLock;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

static EXPOSE_DETAIL: OnceLock<bool> = OnceLock::new();

/// Record whether 5xx bodies may carry internal detail. Set once at startup
/// from the environment; defaults to hidden.
pub fn init_detail_mode(expose: bool) {
    let _ = EXPOSE_DETAIL.set(expose);
}

fn expose_detail() -> bool {
    *EXPOSE_DETAIL.get().unwrap_or(&false)
}

/// Application-level error type for the commerce API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request payload failed validation.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Request conflicts with existing state (e.g. duplicate email).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The entity cannot move from its current status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Single validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_))
            | Self::Validation(_)
            | Self::Conflict(_)
            | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::Database(e)) if is_unavailable(e) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Don't expose internal error details to clients.
    fn client_message(&self) -> String {
        match self {
            Self::Store(StoreError::NotFound) => "Not found".to_owned(),
            Self::Store(StoreError::Conflict(message)) => message.clone(),
            Self::Store(StoreError::Database(e)) if is_unavailable(e) => {
                "Service temporarily unavailable".to_owned()
            }
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Validation(_) => "Validation failed".to_owned(),
            Self::NotFound(message) | Self::Conflict(message) | Self::InvalidState(message) => {
                message.clone()
            }
        }
    }
}

/// Pool exhaustion and connection loss mean the store is down, not that the
/// request was bad.
fn is_unavailable(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Store(StoreError::Database(_) | StoreError::DataCorruption(_))
                | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();
        let mut body = serde_json::json!({
            "success": false,
            "message": self.client_message(),
        });
        match &self {
            Self::Validation(errors) => {
                body["error"] = serde_json::json!(errors);
            }
            _ if status.is_server_error() && expose_detail() => {
                body["error"] = serde_json::json!(self.to_string());
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
