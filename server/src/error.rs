//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use medley_library::LibraryError;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

/// Message returned for any malformed directory update.
pub const NO_DIRECTORIES_MSG: &str = "Failed! No directories were given.";

/// Errors returned to HTTP callers as `{ "msg": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body could not be understood.
    #[error("{NO_DIRECTORIES_MSG}")]
    BadRequest(String),

    /// The server failed to carry out a valid request.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::InvalidRequest(detail) => Self::BadRequest(detail),
            LibraryError::Persistence(detail) => {
                Self::Internal(format!("Failed to save root directories: {detail}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::BadRequest(detail) => debug!("Rejected request: {detail}"),
            Self::Internal(msg) => error!("Request failed: {msg}"),
        }
        (self.status(), Json(json!({ "msg": self.to_string() }))).into_response()
    }
}
