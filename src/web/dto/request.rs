//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::{not_empty_trimmed, single_line_text};
use crate::file::{FileFilter, FileKind, ListQuery, SearchScope, SortField, SortOrder};

/// Folder creation request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Folder name.
    #[validate(length(min = 1, max = 100), custom(function = "single_line_text"))]
    pub name: String,
    /// Parent folder (root when absent).
    #[serde(default, alias = "parent_id")]
    pub parent_id: Option<i64>,
    /// Create inside the private space.
    #[serde(default, alias = "is_private")]
    pub is_private: bool,
}

/// Folder rename request.
#[derive(Debug, Deserialize, Validate)]
pub struct RenameFolderRequest {
    #[validate(length(min = 1, max = 100), custom(function = "single_line_text"))]
    pub name: String,
}

/// Folder move request. A missing parent moves the folder to the root.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveFolderRequest {
    #[serde(default, alias = "parent_id")]
    pub parent_id: Option<i64>,
}

/// File move or copy target. A missing folder means the root for moves
/// and the source folder for copies.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTargetRequest {
    #[serde(default, alias = "folder_id")]
    pub folder_id: Option<i64>,
}

/// Note creation request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_empty_trimmed"))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "folder_id")]
    pub folder_id: Option<i64>,
    /// Defaults to the user's `default_private` setting.
    #[serde(default, alias = "is_private")]
    pub is_private: Option<bool>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
}

/// File update request.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFileRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
    /// New note body.
    pub content: Option<String>,
}

/// Upload pre-check request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StorageCheckRequest {
    #[serde(alias = "file_size", alias = "size")]
    #[validate(range(min = 1, message = "File size must be positive"))]
    pub file_size: i64,
}

/// PIN set request.
#[derive(Debug, Deserialize, Validate)]
pub struct SetPinRequest {
    #[validate(length(min = 4, max = 6))]
    pub pin: String,
}

/// PIN removal request.
#[derive(Debug, Deserialize, Validate)]
pub struct RemovePinRequest {
    /// Current PIN.
    #[validate(length(min = 1))]
    pub pin: String,
}

/// Settings update request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(alias = "default_private")]
    pub default_private: Option<bool>,
    #[serde(alias = "items_per_page")]
    #[validate(range(min = 10, max = 100))]
    pub items_per_page: Option<i64>,
}

/// Query for `GET /api/folders`.
#[derive(Debug, Default, Deserialize)]
pub struct FolderListQuery {
    pub parent: Option<i64>,
    #[serde(default)]
    pub include_private: bool,
}

/// Query for `GET /api/files`.
#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub kind: Option<FileKind>,
    pub folder: Option<i64>,
    pub favorite: Option<bool>,
    pub private: Option<bool>,
    pub tag: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
}

impl FileListQuery {
    /// Split into filter and pagination, using `default_limit` when no
    /// limit was given.
    pub fn into_parts(self, default_limit: i64) -> (FileFilter, ListQuery) {
        let filter = FileFilter {
            kind: self.kind,
            folder_id: self.folder,
            favorite: self.favorite,
            private: self.private,
            tag: self.tag.filter(|t| !t.trim().is_empty()),
        };
        let query = ListQuery {
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(default_limit),
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
        }
        .normalized();
        (filter, query)
    }
}

/// Query for `GET /api/search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub scope: SearchScope,
}

/// Optional `limit` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Optional `days` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}
