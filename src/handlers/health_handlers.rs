//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks disk I/O in the storage root

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

const PROBE_CONTENT: &[u8] = b"readyz";

/// `GET /healthz`
///
/// Liveness probe; never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// HTTP 200 when the storage root accepts a write/read/delete round trip,
/// 503 otherwise.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let disk = match check_disk(&service.base_path).await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => {
            tracing::warn!("readiness disk check: {}", err);
            CheckStatus {
                ok: false,
                error: Some(err),
            }
        }
    };

    let (status, label) = if disk.ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    };
    let body = ReadyResponse {
        status: label.into(),
        checks: HashMap::from([("disk", disk)]),
    };

    (status, Json(body))
}

/// Round-trip a hidden probe file through `root`.
///
/// The probe name is dot-prefixed so a concurrent `GET /files` never lists
/// it. The probe is removed whether or not the read back matched.
async fn check_disk(root: &Path) -> Result<(), String> {
    let probe = root.join(format!(".readyz-{}", Uuid::new_v4()));

    fs::write(&probe, PROBE_CONTENT)
        .await
        .map_err(|e| format!("could not write probe file: {}", e))?;
    let read_back = fs::read(&probe).await;
    let removed = fs::remove_file(&probe).await;

    match read_back {
        Ok(bytes) if bytes == PROBE_CONTENT => {}
        Ok(_) => return Err("probe file content mismatch".into()),
        Err(e) => return Err(format!("could not read probe file: {}", e)),
    }
    removed.map_err(|e| format!("could not remove probe file: {}", e))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
