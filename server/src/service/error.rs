//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::persistence::PersistenceError;
use crate::sync::SyncError;

/// Body of every error response: `{"error": {"status": 400, "message": "..."}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("username required")]
    UsernameRequired,
    #[error("setup already in progress for {0}")]
    SetupConflict(String),
    #[error("user data setup in progress")]
    SetupInProgress,
    #[error("user not set up")]
    NotSetUp,
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UsernameRequired | Self::SetupInProgress | Self::NotSetUp => {
                StatusCode::BAD_REQUEST
            }
            Self::SetupConflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InvalidUsername => Self::UsernameRequired,
            SyncError::InProgress { id } => Self::SetupConflict(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "Request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                status: status.as_u16(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
