//! PIN and settings handlers for Web API.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::auth::{has_pin_set, remove_pin, set_pin};
use crate::db::UserRepository;
use crate::web::dto::{
    ApiResponse, PinStatusResponse, RemovePinRequest, SetPinRequest, SettingsResponse,
    UpdateSettingsRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/pin - Whether a PIN is configured.
pub async fn pin_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<PinStatusResponse>>, ApiError> {
    let has_pin = has_pin_set(state.db.pool(), user.id()).await?;
    Ok(Json(ApiResponse::new(PinStatusResponse { has_pin })))
}

/// PUT /api/pin - Set or replace the PIN.
pub async fn put_pin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<SetPinRequest>,
) -> Result<StatusCode, ApiError> {
    set_pin(state.db.pool(), user.id(), &req.pin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/pin - Remove the PIN after verifying it.
pub async fn delete_pin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<RemovePinRequest>,
) -> Result<StatusCode, ApiError> {
    remove_pin(state.db.pool(), user.id(), &req.pin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/settings - Current user's settings.
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<SettingsResponse>>, ApiError> {
    let user = UserRepository::new(state.db.pool()).require(user.id()).await?;
    Ok(Json(ApiResponse::new(user.into())))
}

/// PATCH /api/settings - Update preferences.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<SettingsResponse>>, ApiError> {
    let repo = UserRepository::new(state.db.pool());
    let mut settings = repo.require(user.id()).await?.settings();
    if let Some(default_private) = req.default_private {
        settings.default_private = default_private;
    }
    if let Some(items_per_page) = req.items_per_page {
        settings.items_per_page = items_per_page;
    }

    let updated = repo
        .update_settings(user.id(), settings)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(ApiResponse::new(updated.into())))
}
