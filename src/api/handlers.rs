// src/api/handlers.rs

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::error::{ApiError, ApiResult};
use crate::app::AppState;
use crate::core::engine_api::EngineAction;
use crate::core::models::{ScanHandle, TriagedResult};

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: u8,
}

#[derive(Debug, Serialize)]
pub struct EngineHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: EngineHealth,
    pub checked_at: DateTime<Utc>,
}

/// `POST /scan`: runs crawl, active scan, and triage for the posted URL.
///
/// The scan is tied to this request. If the client goes away or the server
/// shuts down, the drop guard cancels the run at its next poll or retry.
pub async fn scan_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TriagedResult>)> {
    let Json(request) = payload?;
    let url = request
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    info!(url = %url, "Scan requested.");
    let result = state.orchestrator.run_scan(&url, &cancel).await?;
    Ok((StatusCode::OK, Json(result)))
}

/// `GET /progress/{scan_id}`: current completion of an active scan.
pub async fn progress_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let status = state.progress.query_progress(&ScanHandle::new(scan_id), &cancel).await?;
    Ok(Json(ProgressResponse { progress: status.percent() }))
}

/// `GET /health`: liveness of this service plus a one-shot engine probe.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = match state.client.probe(EngineAction::Version).await {
        Ok(body) => EngineHealth {
            reachable: true,
            version: EngineAction::Version.answer(&body).and_then(Value::as_str).map(str::to_string),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Engine health probe failed.");
            EngineHealth { reachable: false, version: None, error: Some(e.kind().to_string()) }
        }
    };

    Json(HealthResponse { status: "ok", engine, checked_at: Utc::now() })
}
