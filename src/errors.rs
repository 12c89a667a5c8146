use crate::services::storage_service::{StorageError, StorageService};
use axum::{
    Json,
    extract::{State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// 413 naming the configured limit in MiB.
    pub fn payload_too_large(max_mib: f64) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("File too large. Maximum size is {}MB", max_mib),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Body read failures keep the status axum assigns them (400 for malformed
/// input, 413 once the body limit is hit).
impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), "Invalid multipart data")
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EmptyFilename => AppError::bad_request("No file selected"),
            StorageError::ExtensionNotAllowed(_) => AppError::bad_request("File type not allowed"),
            StorageError::InvalidFilename(_) | StorageError::PathEscape(_) => {
                AppError::bad_request("Invalid filename")
            }
            StorageError::FileNotFound(_) => AppError::not_found("File not found"),
            StorageError::Body(err) => {
                let status = err
                    .get_ref()
                    .and_then(|inner| inner.downcast_ref::<MultipartError>())
                    .map(MultipartError::status)
                    .unwrap_or(StatusCode::BAD_REQUEST);
                AppError::new(status, "Failed to read uploaded file")
            }
            StorageError::Io(_) => AppError::internal("Internal storage error"),
        }
    }
}

/// Router-wide response mapper: any 413, wherever it was produced, leaves
/// the service as the structured error naming the configured limit.
pub async fn translate_payload_too_large(
    State(service): State<StorageService>,
    response: Response,
) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }

    tracing::warn!(
        max_upload_bytes = service.config.max_upload_bytes,
        "request body exceeded upload limit"
    );
    AppError::payload_too_large(service.config.max_upload_mib()).into_response()
}
