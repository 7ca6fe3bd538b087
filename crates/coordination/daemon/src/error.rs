//! Error types for the coordination daemon

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coordination_types::CoordinationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daemon startup and lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Errors surfaced by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Coordination(err) => coordination_status(err),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Coordination(err) => err.code(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        let Self::Coordination(err) = self else {
            return None;
        };
        match err {
            CoordinationError::AmbiguousTransition { from, candidates } => Some(serde_json::json!({
                "from": from,
                "candidates": candidates,
            })),
            CoordinationError::StateIncomplete { state, missing } => Some(serde_json::json!({
                "state": state,
                "missing": missing,
            })),
            CoordinationError::SlotValidationFailed { slot, reason } => Some(serde_json::json!({
                "slot": slot,
                "reason": reason,
            })),
            _ => None,
        }
    }
}

fn coordination_status(err: &CoordinationError) -> StatusCode {
    use CoordinationError::*;

    match err {
        InvalidToken => StatusCode::UNAUTHORIZED,
        ParticipantMismatch(_) | RoleNotAllowedInState { .. } | SlotNotEditableByRole { .. } => {
            StatusCode::FORBIDDEN
        }
        RunNotFound(_) | TemplateNotFound(_) | RoleNotFound(_) | ParticipantNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        StateIncomplete { .. }
        | InvalidTransition(_)
        | AmbiguousTransition { .. }
        | InvalidTargetState(_)
        | RunNotActive(_)
        | TemplateAlreadyRegistered(_)
        | TemplateInactive(_)
        | RoleCapacityReached { .. }
        | RunCapacityReached { .. } => StatusCode::CONFLICT,
        SlotValidationFailed { .. } | InvalidTemplate(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TemplateIntegrity(_) | Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}
