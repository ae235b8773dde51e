//! Folder handlers for Web API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::file::{Crumb, DeletedSubtree, Folder, FolderContents, NewFolder};
use crate::web::dto::{
    ApiResponse, CreateFolderRequest, FolderListQuery, MoveFolderRequest, PrivacyResponse,
    RenameFolderRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/folders - List folders under a parent (roots by default).
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<FolderListQuery>,
) -> Result<Json<ApiResponse<Vec<Folder>>>, ApiError> {
    let folders = state
        .tree()
        .list_folders(user.id(), query.parent, query.include_private)
        .await?;
    Ok(Json(ApiResponse::new(folders)))
}

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Folder>>), ApiError> {
    let new_folder = NewFolder {
        name: req.name,
        parent_id: req.parent_id,
        is_private: req.is_private,
    };
    let folder = state.tree().create_folder(user.id(), new_folder).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(folder))))
}

/// GET /api/folders/:id - Get folder details.
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Folder>>, ApiError> {
    let folder = state.tree().get_folder(id, user.id()).await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// GET /api/folders/:id/contents - Direct subfolders and files.
pub async fn folder_contents(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FolderContents>>, ApiError> {
    let contents = state.tree().children(id, user.id()).await?;
    Ok(Json(ApiResponse::new(contents)))
}

/// GET /api/folders/:id/breadcrumb - Path from the root.
pub async fn folder_breadcrumb(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Crumb>>>, ApiError> {
    let crumbs = state.tree().breadcrumb(id, user.id()).await?;
    Ok(Json(ApiResponse::new(crumbs)))
}

/// PATCH /api/folders/:id/rename - Rename a folder.
pub async fn rename_folder(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RenameFolderRequest>,
) -> Result<Json<ApiResponse<Folder>>, ApiError> {
    let folder = state.tree().rename_folder(id, user.id(), &req.name).await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// PATCH /api/folders/:id/move - Move a folder.
pub async fn move_folder(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<MoveFolderRequest>,
) -> Result<Json<ApiResponse<Folder>>, ApiError> {
    let folder = state
        .tree()
        .move_folder(id, user.id(), req.parent_id)
        .await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// PATCH /api/folders/:id/private - Toggle privacy of the whole subtree.
pub async fn toggle_folder_private(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PrivacyResponse>>, ApiError> {
    let is_private = state.tree().toggle_private(id, user.id()).await?;
    Ok(Json(ApiResponse::new(PrivacyResponse { is_private })))
}

/// DELETE /api/folders/:id - Delete a folder and everything inside it.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedSubtree>>, ApiError> {
    let deleted = state.tree().delete_folder(id, user.id()).await?;
    Ok(Json(ApiResponse::new(deleted)))
}
