// crates/server/src/routes/scans.rs
//! Scan job endpoints.
//!
//! - POST /scan               - run a scan synchronously
//! - GET  /scans              - job history, newest first
//! - GET  /scan/{id}/status   - cache-first status
//! - GET  /scan/{id}/dupes    - result groups
//! - POST /scan/delete        - apply delete/skip decisions
//! - GET  /scan/{id}/deletions - recorded action records

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use dupe_manager_core::{
    ActionOutcome, ActionRecord, Decision, GroupItem, JobId, JobStatus, ScanJob,
};
use serde::{Deserialize, Serialize};

use crate::decisions::apply_decisions;
use crate::error::{ApiError, ApiResult};
use crate::jobs::ScanRequest;
use crate::live::StatusSource;
use crate::state::AppState;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct StartScanRequest {
    pub root_path: String,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartScanResponse {
    pub scan_id: JobId,
    pub status: JobStatus,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub scan_id: JobId,
    pub status: JobStatus,
    pub total_files: u64,
    pub scanned_files: u64,
    pub message: Option<String>,
    pub source: StatusSource,
}

#[derive(Debug, Serialize)]
pub struct DupeGroup {
    pub dup_key: String,
    pub filename: String,
    pub size_bytes: u64,
    pub items: Vec<GroupItem>,
}

#[derive(Debug, Serialize)]
pub struct DupesResponse {
    pub scan_id: JobId,
    pub groups: Vec<DupeGroup>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub scan_id: JobId,
    pub choices: Vec<Decision>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub scan_id: JobId,
    pub results: Vec<ActionOutcome>,
}

#[derive(Debug, Serialize)]
pub struct DeletionsResponse {
    pub scan_id: JobId,
    pub records: Vec<ActionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/scan - blocks until the job is terminal.
async fn start_scan(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartScanRequest>,
) -> ApiResult<Json<StartScanResponse>> {
    if state.require_live_events && state.live.channel.is_none() {
        return Err(ApiError::ChannelUnavailable);
    }
    // The job runs on its own task so a dropped connection cannot cancel
    // it before the terminal write.
    let executor = Arc::clone(&state.executor);
    let request = ScanRequest {
        root_path: body.root_path,
        extensions: body.extensions,
    };
    let outcome = tokio::spawn(async move { executor.run(request).await })
        .await
        .map_err(|e| ApiError::Internal(format!("scan task failed: {e}")))??;
    Ok(Json(StartScanResponse {
        scan_id: outcome.job.id,
        status: outcome.job.status,
        message: outcome.job.message,
    }))
}

/// GET /api/scans?limit&offset
async fn list_scans(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<ScanJob>>> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let offset = page.offset.unwrap_or(0).max(0);
    Ok(Json(state.db.list_jobs(limit, offset).await?))
}

/// GET /api/scan/{id}/status
async fn scan_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let resolved = state.resolver.resolve(&id).await?;
    let snapshot = resolved.snapshot();
    Ok(Json(StatusResponse {
        scan_id: snapshot.job_id,
        status: snapshot.status,
        total_files: snapshot.total_files,
        scanned_files: snapshot.scanned_files,
        message: snapshot.message,
        source: resolved.source(),
    }))
}

/// GET /api/scan/{id}/dupes
async fn list_dupes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DupesResponse>> {
    if !state.db.job_exists(&id).await? {
        return Err(ApiError::JobNotFound(id));
    }
    let groups = state
        .db
        .list_result_groups(&id)
        .await?
        .into_iter()
        .map(|group| DupeGroup {
            dup_key: group.group_key,
            filename: group.file_name,
            size_bytes: group.size_bytes,
            items: group.items,
        })
        .collect();
    Ok(Json(DupesResponse {
        scan_id: id,
        groups,
    }))
}

/// POST /api/scan/delete
async fn delete_files(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteRequest>,
) -> ApiResult<Json<DeleteResponse>> {
    let results = apply_decisions(&state.db, &body.scan_id, &body.choices).await?;
    Ok(Json(DeleteResponse {
        scan_id: body.scan_id,
        results,
    }))
}

/// GET /api/scan/{id}/deletions
async fn list_deletions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletionsResponse>> {
    if !state.db.job_exists(&id).await? {
        return Err(ApiError::JobNotFound(id));
    }
    let records = state.db.list_action_records(&id).await?;
    Ok(Json(DeletionsResponse {
        scan_id: id,
        records,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan", post(start_scan))
        .route("/scans", get(list_scans))
        .route("/scan/delete", post(delete_files))
        .route("/scan/{id}/status", get(scan_status))
        .route("/scan/{id}/dupes", get(list_dupes))
        .route("/scan/{id}/deletions", get(list_deletions))
}
