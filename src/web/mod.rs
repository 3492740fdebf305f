//! HTTP surface
//!
//! Handlers return [`Result`]; every error becomes a JSON body of the form
//! `{"error": ..., "code": ...}` with a matching status code.

pub mod app;
pub mod extract;
pub mod handlers;
pub mod session;
pub mod state;

use crate::core::BlogError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub use app::build_router;
pub use state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Success envelope: the payload plus an optional notification.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: &'static str) -> Self {
        Self {
            data,
            message: Some(message),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Input(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Storage(String),
    Internal(String),
}

impl From<BlogError> for WebError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::Validation(message) => Self::Input(message),
            BlogError::NotFound(message) => Self::NotFound(message),
            BlogError::Unauthorized(message) => Self::Unauthorized(message),
            BlogError::Forbidden(message) => Self::Forbidden(message),
            BlogError::Conflict(message) => Self::Conflict(message),
            BlogError::Storage(message) => Self::Storage(message),
            BlogError::Internal(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Input(msg) => (StatusCode::BAD_REQUEST, msg, "validation_error"),
            WebError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "unauthorized"),
            WebError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "forbidden"),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "not_found"),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, msg, "conflict"),
            WebError::Storage(msg) => {
                tracing::error!(error = %msg, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage failure".to_string(),
                    "storage_error",
                )
            }
            WebError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    "internal_error",
                )
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
