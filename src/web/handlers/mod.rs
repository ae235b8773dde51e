//! API handlers for the Jotter web API.

pub mod activity;
pub mod file;
pub mod folder;
pub mod pin;
pub mod search;
pub mod storage;

pub use activity::*;
pub use file::*;
pub use folder::*;
pub use pin::*;
pub use search::*;
pub use storage::*;

use std::sync::Arc;

use crate::db::Database;
use crate::file::{FileService, FileStorage, FolderTree};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database handle.
    pub db: Database,
    /// Blob storage for uploads.
    pub storage: Arc<FileStorage>,
    /// Maximum upload size in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, storage: FileStorage, max_upload_size: u64) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            max_upload_size,
        }
    }

    /// Folder tree service over the shared state.
    pub fn tree(&self) -> FolderTree<'_> {
        FolderTree::new(self.db.pool(), self.storage.as_ref())
    }

    /// File service over the shared state.
    pub fn files(&self) -> FileService<'_> {
        FileService::new(self.db.pool(), self.storage.as_ref())
            .with_max_upload_size(self.max_upload_size)
    }
}
