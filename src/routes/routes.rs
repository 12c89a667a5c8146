//! Defines routes for the upload service.
//!
//! ## Structure
//! - `GET  /`                 — upload page
//! - `POST /upload`           — multipart upload (field `file`)
//! - `GET  /files`            — list stored files
//! - `GET  /files/{filename}` — download a file as an attachment
//! - `GET  /healthz`, `GET /readyz` — probes
//!
//! `{filename}` is a single path segment; percent-encoded separators reach
//! the handler decoded and are neutralized by filename sanitization.

use crate::{
    errors::translate_payload_too_large,
    handlers::{
        file_handlers::{download_file, list_files, upload_file},
        health_handlers::{healthz, readyz},
        page_handlers::index,
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

/// Build the router for all endpoints, still expecting `StorageService` state.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/", get(index))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // file endpoints
        .route("/upload", post(upload_file))
        .route("/files", get(list_files))
        .route("/files/{filename}", get(download_file))
}

/// Build the complete application: routes, the global body limit and the
/// 413 translation layer, bound to `service`.
pub fn app(service: StorageService) -> Router {
    let max_upload_bytes = service.config.max_upload_bytes;

    routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::map_response_with_state(
            service.clone(),
            translate_payload_too_large,
        ))
        .with_state(service)
}
