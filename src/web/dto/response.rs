//! Response DTOs for Web API.

use serde::Serialize;

use crate::db::User;
use crate::file::Page;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Wrap one page of results.
    pub fn from_page(page: Page<T>) -> Self {
        Self {
            meta: PaginationMeta {
                total: page.total,
                page: page.page,
                limit: page.limit,
                total_pages: page.total_pages,
                has_next_page: page.has_next_page,
                has_prev_page: page.has_prev_page,
            },
            data: page.items,
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Total number of items.
    pub total: i64,
    /// Current page number.
    pub page: i64,
    /// Items per page.
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

/// Favorite flag after a toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub is_favorite: bool,
}

/// Privacy flag after a toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyResponse {
    pub is_private: bool,
}

/// A tag with its number of uses.
#[derive(Debug, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

/// Whether the user has a PIN.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinStatusResponse {
    pub has_pin: bool,
}

/// Answer to an upload pre-check.
#[derive(Debug, Serialize)]
pub struct StorageCheckResponse {
    pub allowed: bool,
    pub available: i64,
    pub requested: i64,
}

/// Number of removed entries.
#[derive(Debug, Serialize)]
pub struct DeletedCountResponse {
    pub deleted: u64,
}

/// Current user's profile and settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub default_private: bool,
    pub items_per_page: i64,
    pub has_pin: bool,
}

impl From<User> for SettingsResponse {
    fn from(user: User) -> Self {
        let settings = user.settings();
        Self {
            has_pin: user.has_pin(),
            username: user.username,
            email: user.email,
            default_private: settings.default_private,
            items_per_page: settings.items_per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_response_meta() {
        let page = Page::new(vec![1, 2, 3], 23, 2, 10);
        let response = PaginatedResponse::from_page(page);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["meta"]["total"], 23);
        assert_eq!(json["meta"]["totalPages"], 3);
        assert_eq!(json["meta"]["hasNextPage"], true);
        assert_eq!(json["meta"]["hasPrevPage"], true);
    }

    #[test]
    fn test_api_response_envelope() {
        let json = serde_json::to_value(ApiResponse::new(PrivacyResponse { is_private: true }))
            .unwrap();
        assert_eq!(json, serde_json::json!({ "data": { "isPrivate": true } }));
    }
}
