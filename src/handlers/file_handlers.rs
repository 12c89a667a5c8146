//! HTTP handlers for file upload, listing and download.
//! Streams file bodies in both directions to avoid buffering in memory and
//! delegates filesystem concerns to `StorageService`.

use crate::{
    errors::AppError,
    models::file::{FileList, FileRecord, UploadResponse},
    services::storage_service::{StorageError, StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::PathRejection,
    },
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

/// `POST /upload` — store the multipart field named `file`.
///
/// Other fields are skipped, as is a `file` field sent without a filename
/// (a plain form value, not a file part); only the first file part is stored.
pub async fn upload_file(
    State(service): State<StorageService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Upload error: not a multipart request: {}", rejection);
        AppError::bad_request("No file part in request")
    })?;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        warn!("Upload error: failed to read multipart data: {}", err);
        AppError::from(err)
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));

        let record = service
            .upload_file_stream(&original, stream)
            .await
            .map_err(|err| upload_error(&original, err))?;

        info!(
            filename = %record.name,
            size = record.size,
            "File uploaded successfully: {} ({} bytes)",
            record.name,
            record.size
        );
        return Ok(Json(record.into()));
    }

    warn!("Upload error: no file part in request");
    Err(AppError::bad_request("No file part in request"))
}

/// `GET /files` — list stored files with their sizes.
pub async fn list_files(State(service): State<StorageService>) -> Result<Json<FileList>, AppError> {
    let files = service.list_files().await.map_err(|err| {
        error!("List files error: {}", err);
        AppError::internal("An error occurred while listing files")
    })?;

    Ok(Json(FileList { files }))
}

/// `GET /files/{filename}` — stream a stored file back as an attachment.
///
/// Escaping the storage root is a 400; every other failure, I/O and
/// undecodable path segments included, is reported as 404.
pub async fn download_file(
    State(service): State<StorageService>,
    filename: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(filename) = filename.map_err(|rejection| {
        warn!("Download error: unusable filename segment: {}", rejection);
        AppError::not_found("File not found")
    })?;

    let (record, file) = service.open_file(&filename).await.map_err(|err| {
        warn!("Download error for `{}`: {}", filename, err);
        match err {
            err @ StorageError::PathEscape(_) => AppError::from(err),
            _ => AppError::not_found("File not found"),
        }
    })?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    set_download_headers(response.headers_mut(), &record);

    Ok(response)
}

fn upload_error(original: &str, err: StorageError) -> AppError {
    match err {
        StorageError::Io(_) => {
            error!("Upload error for `{}`: {}", original, err);
            AppError::internal("An error occurred during file upload")
        }
        other => {
            warn!("Upload rejected for `{}`: {}", original, other);
            other.into()
        }
    }
}

fn set_download_headers(headers: &mut HeaderMap, record: &FileRecord) {
    let content_type = mime_guess::from_path(&record.name).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(record.size));

    // Sanitized names are plain ASCII, so no RFC 5987 encoding is needed.
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", record.name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
