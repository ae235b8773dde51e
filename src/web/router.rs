//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::*;
use super::middleware::{create_cors_layer, jwt_auth, JwtState};

/// Headroom on top of the upload limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
) -> Router {
    let body_limit = usize::try_from(app_state.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let folder_routes = Router::new()
        .route("/", get(list_folders).post(create_folder))
        .route("/:id", get(get_folder).delete(delete_folder))
        .route("/:id/contents", get(folder_contents))
        .route("/:id/breadcrumb", get(folder_breadcrumb))
        .route("/:id/rename", patch(rename_folder))
        .route("/:id/move", patch(move_folder))
        .route("/:id/private", patch(toggle_folder_private));

    let file_routes = Router::new()
        .route("/", get(list_files))
        .route("/notes", post(create_note))
        .route("/upload", post(upload_file))
        .route("/tags/popular", get(popular_tags))
        .route("/tags/:tag", get(files_by_tag))
        .route(
            "/:id",
            get(get_file).patch(update_file).delete(delete_file),
        )
        .route("/:id/download", get(download_file))
        .route("/:id/copy", post(copy_file))
        .route("/:id/duplicate", post(duplicate_file))
        .route("/:id/move", patch(move_file))
        .route("/:id/favorite", patch(toggle_favorite))
        .route("/:id/private", patch(toggle_file_private));

    let storage_routes = Router::new()
        .route("/", get(storage_summary))
        .route("/breakdown", get(storage_breakdown))
        .route("/check", post(check_storage))
        .route("/recalculate", post(recalculate_storage));

    let activity_routes = Router::new()
        .route("/", get(recent_activity).delete(clear_activity))
        .route("/stats", get(activity_stats))
        .route("/day/:date", get(activity_for_day));

    let api_routes = Router::new()
        .nest("/folders", folder_routes)
        .nest("/files", file_routes)
        .nest("/storage", storage_routes)
        .nest("/activity", activity_routes)
        .route("/search", get(search))
        .route("/pin", get(pin_status).put(put_pin).delete(delete_pin))
        .route("/settings", get(get_settings).patch(update_settings));

    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
