//! Folders and files for Jotter.
//!
//! This module provides:
//! - Hierarchical folders with cascading privacy
//! - Typed file records (notes, images, PDFs)
//! - Blob storage with UUID naming
//! - Upload metadata extraction

mod extract;
mod folder;
mod record;
mod service;
mod storage;
mod tree;

pub use extract::{detect_upload_kind, image_info, pdf_info, ImageInfo, PdfInfo};
pub use folder::{Folder, FolderRepository, NewFolder, MAX_FOLDER_NAME_LENGTH};
pub use record::{
    FileFilter, FileKind, FilePayload, FileRecord, FileRepository, ListQuery, NewFileRecord, Page,
    SortField, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use service::{
    DownloadResult, FilePatch, FileService, NewNote, SearchResults, SearchScope, UploadRequest,
    SEARCH_LIMIT,
};
pub use storage::{BlobStore, FileStorage};
pub use tree::{Crumb, DeletedSubtree, FolderContents, FolderTree};

use crate::{JotterError, Result};

/// Maximum length for file titles (in characters).
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum number of tags on one file.
pub const MAX_TAGS: usize = 20;

/// Maximum length for a single tag (in characters).
pub const MAX_TAG_LENGTH: usize = 50;

/// Validate a folder name. Returns the trimmed name.
pub fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(JotterError::Validation(
            "folder name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(JotterError::Validation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(JotterError::Validation(
            "folder name must not contain slashes".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Validate a file title. Returns the trimmed title.
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(JotterError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(JotterError::Validation(format!(
            "title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(title.to_string())
}

/// Trim, drop empties and deduplicate tags, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || normalized.iter().any(|t| t == tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(JotterError::Validation(format!(
                "tags must be at most {MAX_TAG_LENGTH} characters"
            )));
        }
        normalized.push(tag.to_string());
    }
    if normalized.len() > MAX_TAGS {
        return Err(JotterError::Validation(format!(
            "at most {MAX_TAGS} tags are allowed"
        )));
    }
    Ok(normalized)
}
