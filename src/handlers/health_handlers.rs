//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and disk I/O

use crate::services::store::CoverStore;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

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

/// `GET /healthz`
///
/// Liveness probe — always 200, never performs I/O.
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
/// Readiness probe: a `SELECT 1` against the metadata store and a
/// write/read/delete round trip under the data root. 200 when both pass,
/// 503 otherwise.
pub async fn readyz(State(store): State<CoverStore>) -> impl IntoResponse {
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*store.db)
        .await
    {
        Ok(1) => CheckStatus {
            ok: true,
            error: None,
        },
        Ok(v) => CheckStatus {
            ok: false,
            error: Some(format!("unexpected result: {}", v)),
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(format!("error: {}", e)),
        },
    };

    let disk_check = match disk_round_trip(&store).await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(e),
        },
    };

    let overall_ok = sqlite_check.ok && disk_check.ok;
    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite_check);
    checks.insert("disk", disk_check);

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if overall_ok { "ok".into() } else { "error".into() },
        checks,
    };
    (status, Json(body))
}

async fn disk_round_trip(store: &CoverStore) -> Result<(), String> {
    let tmp_path = store.data_root.join(format!(".readyz-{}", Uuid::new_v4()));
    fs::write(&tmp_path, b"readyz")
        .await
        .map_err(|e| format!("could not write tmp file: {}", e))?;
    let bytes = fs::read(&tmp_path).await;
    let _ = fs::remove_file(&tmp_path).await;
    match bytes {
        Ok(bytes) if bytes == b"readyz" => Ok(()),
        Ok(_) => Err("file content mismatch".into()),
        Err(e) => Err(format!("could not read tmp file: {}", e)),
    }
}
