//! Activity log handlers for Web API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::activity::{Activity, ActivityLog};
use crate::web::dto::{ApiResponse, DaysQuery, DeletedCountResponse, LimitQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// Default number of entries for `GET /api/activity`.
const DEFAULT_RECENT_LIMIT: i64 = 20;

/// Default window for `GET /api/activity/stats`.
const DEFAULT_STATS_DAYS: i64 = 30;

/// GET /api/activity - Most recent activities.
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Activity>>>, ApiError> {
    let activities = ActivityLog::new(state.db.pool())
        .recent(user.id(), query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await?;
    Ok(Json(ApiResponse::new(activities)))
}

/// GET /api/activity/stats - Counts per action over the last days.
pub async fn activity_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> Result<Json<ApiResponse<BTreeMap<String, i64>>>, ApiError> {
    let stats = ActivityLog::new(state.db.pool())
        .stats(user.id(), query.days.unwrap_or(DEFAULT_STATS_DAYS))
        .await?;
    Ok(Json(ApiResponse::new(stats)))
}

/// GET /api/activity/day/:date - Activities of one day (YYYY-MM-DD).
pub async fn activity_for_day(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<Vec<Activity>>>, ApiError> {
    let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Date must be YYYY-MM-DD"))?;
    let activities = ActivityLog::new(state.db.pool())
        .for_day(user.id(), day)
        .await?;
    Ok(Json(ApiResponse::new(activities)))
}

/// DELETE /api/activity?days= - Drop entries older than the given days.
pub async fn clear_activity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> Result<Json<ApiResponse<DeletedCountResponse>>, ApiError> {
    let days = query
        .days
        .ok_or_else(|| ApiError::bad_request("Missing days parameter"))?;
    let deleted = ActivityLog::new(state.db.pool())
        .clear_older_than(user.id(), days)
        .await?;
    Ok(Json(ApiResponse::new(DeletedCountResponse { deleted })))
}
