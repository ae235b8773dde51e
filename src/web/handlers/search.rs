//! Search handler for Web API.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::file::SearchResults;
use crate::web::dto::{ApiResponse, SearchQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/search?q=&scope= - Substring search over files and folders.
pub async fn search(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<SearchResults>>, ApiError> {
    let results = state
        .files()
        .search(user.id(), &query.q, query.scope)
        .await?;
    Ok(Json(ApiResponse::new(results)))
}
