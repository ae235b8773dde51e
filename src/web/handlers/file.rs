//! File handlers for Web API.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::db::UserRepository;
use crate::file::{detect_upload_kind, FilePatch, FileRecord, NewNote, UploadRequest};
use crate::web::dto::{
    ApiResponse, CreateNoteRequest, FavoriteResponse, FileListQuery, FolderTargetRequest,
    LimitQuery, PaginatedResponse, PrivacyResponse, TagCount, UpdateFileRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;
use crate::JotterError;

/// Build a Content-Disposition value that is safe for any filename.
///
/// Control characters, quotes and backslashes are stripped from the plain
/// `filename` parameter; non-ASCII names also get an RFC 5987 `filename*`.
fn content_disposition_header(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();

    if filename.is_ascii() && fallback == filename {
        return format!("attachment; filename=\"{filename}\"");
    }

    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

/// Parse a multipart `tags` field: a JSON array or a comma-separated list.
fn parse_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw) {
            return tags;
        }
    }
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

/// GET /api/files - List files with filters and pagination.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<FileListQuery>,
) -> Result<Json<PaginatedResponse<FileRecord>>, ApiError> {
    let settings = UserRepository::new(state.db.pool())
        .require(user.id())
        .await?
        .settings();
    let (filter, list) = query.into_parts(settings.items_per_page);

    let page = state.files().list_files(user.id(), &filter, list).await?;
    Ok(Json(PaginatedResponse::from_page(page)))
}

/// POST /api/files/notes - Create a note.
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FileRecord>>), ApiError> {
    let is_private = match req.is_private {
        Some(value) => value,
        None => {
            UserRepository::new(state.db.pool())
                .require(user.id())
                .await?
                .default_private
        }
    };

    let note = NewNote {
        title: req.title,
        content: req.content,
        folder_id: req.folder_id,
        is_private,
        tags: req.tags,
    };
    let file = state.files().create_note(user.id(), note).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(file))))
}

/// POST /api/files/upload - Upload an image or PDF.
///
/// Request body: multipart/form-data with a `file` field and optional
/// `title`, `folder_id`, `is_private` and `tags` fields.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileRecord>>), ApiError> {
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut title: Option<String> = None;
    let mut folder_id: Option<i64> = None;
    let mut is_private = false;
    let mut tags = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            let bytes = field.bytes().await.map_err(|e| {
                tracing::warn!("Failed to read file content: {}", e);
                ApiError::bad_request("Failed to read file")
            })?;
            content = Some(bytes.to_vec());
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| ApiError::bad_request(format!("Invalid field: {name}")))?;
        match name.as_str() {
            "title" if !value.trim().is_empty() => title = Some(value),
            "folder_id" | "folderId" if !value.trim().is_empty() => {
                folder_id = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ApiError::bad_request("Invalid folder id"))?,
                );
            }
            "is_private" | "isPrivate" => is_private = parse_bool(&value),
            "tags" => tags = parse_tags(&value),
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file content"))?;
    let kind = detect_upload_kind(&filename, content_type.as_deref()).ok_or_else(|| {
        ApiError::from(JotterError::Validation(
            "only images and PDFs can be uploaded".to_string(),
        ))
    })?;

    let request = UploadRequest {
        kind,
        filename,
        content,
        title,
        folder_id,
        is_private,
        tags,
    };
    let file = state.files().create_upload(user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(file))))
}

/// GET /api/files/:id - Get a file.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileRecord>>, ApiError> {
    let file = state.files().get_file(id, user.id()).await?;
    Ok(Json(ApiResponse::new(file)))
}

/// GET /api/files/:id/download - Download the stored image or PDF.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let download = state.files().download(id, user.id()).await?;
    let filename = download
        .record
        .filename
        .clone()
        .unwrap_or_else(|| download.record.title.clone());
    let mime = mime_guess::from_path(&filename).first_or_octet_stream();

    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, download.content.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&filename),
        )
        .body(Body::from(download.content))
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// PATCH /api/files/:id - Update title, tags or note content.
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileRecord>>, ApiError> {
    let patch = FilePatch {
        title: req.title,
        tags: req.tags,
        content: req.content,
    };
    let file = state.files().update_file(id, user.id(), patch).await?;
    Ok(Json(ApiResponse::new(file)))
}

/// DELETE /api/files/:id - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.files().delete_file(id, user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/files/:id/copy - Copy a file, optionally into another folder.
pub async fn copy_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    body: Option<Json<FolderTargetRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<FileRecord>>), ApiError> {
    let target = body.map(|Json(b)| b).unwrap_or_default();
    let file = state
        .files()
        .copy_file(id, user.id(), target.folder_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(file))))
}

/// POST /api/files/:id/duplicate - Copy a file into its own folder.
pub async fn duplicate_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<FileRecord>>), ApiError> {
    let file = state.files().duplicate_file(id, user.id()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(file))))
}

/// PATCH /api/files/:id/move - Move a file to a folder or the root.
pub async fn move_file(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<FolderTargetRequest>,
) -> Result<Json<ApiResponse<FileRecord>>, ApiError> {
    let file = state.files().move_file(id, user.id(), req.folder_id).await?;
    Ok(Json(ApiResponse::new(file)))
}

/// PATCH /api/files/:id/favorite - Toggle the favorite flag.
pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FavoriteResponse>>, ApiError> {
    let is_favorite = state.files().toggle_favorite(id, user.id()).await?;
    Ok(Json(ApiResponse::new(FavoriteResponse { is_favorite })))
}

/// PATCH /api/files/:id/private - Toggle the privacy flag.
pub async fn toggle_file_private(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PrivacyResponse>>, ApiError> {
    let is_private = state.files().toggle_private(id, user.id()).await?;
    Ok(Json(ApiResponse::new(PrivacyResponse { is_private })))
}

/// GET /api/files/tags/popular - Most used tags.
pub async fn popular_tags(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TagCount>>>, ApiError> {
    let tags = state
        .files()
        .popular_tags(user.id(), query.limit.unwrap_or(10))
        .await?
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    Ok(Json(ApiResponse::new(tags)))
}

/// GET /api/files/tags/:tag - Files carrying a tag.
pub async fn files_by_tag(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(tag): Path<String>,
) -> Result<Json<ApiResponse<Vec<FileRecord>>>, ApiError> {
    let files = state.files().files_by_tag(user.id(), &tag).await?;
    Ok(Json(ApiResponse::new(files)))
}
