//! Storage quota handlers for Web API.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::quota::{QuotaLedger, StorageBreakdown, StorageSummary};
use crate::web::dto::{ApiResponse, StorageCheckRequest, StorageCheckResponse, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/storage - Quota summary.
pub async fn storage_summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<StorageSummary>>, ApiError> {
    let summary = QuotaLedger::new(state.db.pool()).summary(user.id()).await?;
    Ok(Json(ApiResponse::new(summary)))
}

/// GET /api/storage/breakdown - Usage per folder and file kind.
pub async fn storage_breakdown(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<StorageBreakdown>>, ApiError> {
    let breakdown = QuotaLedger::new(state.db.pool())
        .breakdown(user.id())
        .await?;
    Ok(Json(ApiResponse::new(breakdown)))
}

/// POST /api/storage/check - Whether an upload of `fileSize` bytes would fit.
pub async fn check_storage(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<StorageCheckRequest>,
) -> Result<Json<ApiResponse<StorageCheckResponse>>, ApiError> {
    let ledger = QuotaLedger::new(state.db.pool());
    let allowed = ledger.reserve(user.id(), req.file_size).await?;
    let available = ledger.summary(user.id()).await?.available;
    Ok(Json(ApiResponse::new(StorageCheckResponse {
        allowed,
        available,
        requested: req.file_size,
    })))
}

/// POST /api/storage/recalculate - Rebuild counters from live files.
pub async fn recalculate_storage(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<StorageSummary>>, ApiError> {
    let ledger = QuotaLedger::new(state.db.pool());
    let used = ledger.recalculate(user.id()).await?;
    tracing::info!(user_id = user.id(), used, "Storage recalculated");
    Ok(Json(ApiResponse::new(ledger.summary(user.id()).await?)))
}
