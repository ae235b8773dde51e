//! File service for Jotter.
//!
//! This module provides high-level file operations including:
//! - Note creation and image/PDF upload with quota checks
//! - Updates, copies, moves and deletion with folder counters kept in step
//! - Listing, tag queries and simple search

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{error, info};

use super::extract::{image_info, pdf_info};
use super::folder::{Folder, FolderRepository};
use super::record::{
    FileFilter, FileKind, FilePayload, FileRecord, FileRepository, ListQuery, NewFileRecord, Page,
};
use super::storage::BlobStore;
use super::{normalize_tags, validate_title};
use crate::activity::{ActivityAction, ActivityLog};
use crate::auth::require_pin;
use crate::db::begin_write;
use crate::quota::QuotaLedger;
use crate::{JotterError, Result};

/// Maximum results per kind returned by [`FileService::search`].
pub const SEARCH_LIMIT: i64 = 50;

/// Default maximum upload size (50MB).
const DEFAULT_MAX_UPLOAD_SIZE: u64 = 50 * 1024 * 1024;

/// Request data for note creation.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub folder_id: Option<i64>,
    pub is_private: bool,
    pub tags: Vec<String>,
}

/// Request data for image or PDF upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Image or PDF.
    pub kind: FileKind,
    /// Original filename.
    pub filename: String,
    /// File content.
    pub content: Vec<u8>,
    /// Title; defaults to the filename.
    pub title: Option<String>,
    pub folder_id: Option<i64>,
    pub is_private: bool,
    pub tags: Vec<String>,
}

impl UploadRequest {
    /// Create a new upload request.
    pub fn new(kind: FileKind, filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            kind,
            filename: filename.into(),
            content,
            title: None,
            folder_id: None,
            is_private: false,
            tags: Vec::new(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the target folder.
    pub fn in_folder(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

/// Editable fields of a file. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Note body; only valid for notes.
    pub content: Option<String>,
}

/// A file's editable fields after applying a [`FilePatch`].
struct Patched {
    title: String,
    tags: Vec<String>,
    payload: FilePayload,
    size: i64,
}

impl FilePatch {
    fn apply_to(&self, file: &FileRecord) -> Result<Patched> {
        let title = match self.title {
            Some(ref title) => validate_title(title)?,
            None => file.title.clone(),
        };
        let tags = match self.tags {
            Some(ref tags) => normalize_tags(tags)?,
            None => file.tags.clone(),
        };
        let (payload, size) = match self.content {
            Some(ref content) if file.kind == FileKind::Note => (
                FilePayload::Note {
                    content: content.clone(),
                },
                content.len() as i64,
            ),
            Some(_) => {
                return Err(JotterError::Validation(
                    "only notes have editable content".to_string(),
                ))
            }
            None => (file.payload.clone(), file.file_size),
        };
        Ok(Patched {
            title,
            tags,
            payload,
            size,
        })
    }
}

/// Result of a file download.
#[derive(Debug)]
pub struct DownloadResult {
    pub record: FileRecord,
    pub content: Vec<u8>,
}

/// What [`FileService::search`] looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Files,
    Folders,
}

/// Search hits, at most [`SEARCH_LIMIT`] of each.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub files: Vec<FileRecord>,
    pub folders: Vec<Folder>,
}

/// File service for notes, images and PDFs.
pub struct FileService<'a> {
    pool: &'a SqlitePool,
    blobs: &'a dyn BlobStore,
    max_upload_size: u64,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(pool: &'a SqlitePool, blobs: &'a dyn BlobStore) -> Self {
        Self {
            pool,
            blobs,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Create a new FileService with a custom max upload size.
    pub fn with_max_upload_size(mut self, max_size: u64) -> Self {
        self.max_upload_size = max_size;
        self
    }

    fn files(&self) -> FileRepository<'a> {
        FileRepository::new(self.pool)
    }

    fn activity(&self) -> ActivityLog<'a> {
        ActivityLog::new(self.pool)
    }

    /// Check that the target folder exists and is owned by the caller.
    async fn check_folder(&self, folder_id: Option<i64>, owner_id: i64) -> Result<()> {
        if let Some(folder_id) = folder_id {
            FolderRepository::new(self.pool)
                .require(folder_id, owner_id)
                .await?;
        }
        Ok(())
    }

    /// Insert a record, charge the quota and bump the folder counters in
    /// one transaction. Returns the new ID.
    async fn persist(&self, owner_id: i64, record: &NewFileRecord) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = FileRepository::insert(&mut tx, owner_id, record).await?;
        QuotaLedger::require_growth(&mut tx, owner_id, record.file_size).await?;
        FolderRepository::adjust_counters(&mut tx, record.folder_id, 1, record.file_size).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Remove a blob that no record refers to. Failures are only logged.
    fn discard_blob(&self, stored_name: &str) {
        if let Err(e) = self.blobs.delete(stored_name) {
            error!(blob = stored_name, "Failed to clean up blob: {}", e);
        }
    }

    /// Create a note. Its size is the UTF-8 byte length of the content.
    pub async fn create_note(&self, owner_id: i64, note: NewNote) -> Result<FileRecord> {
        let title = validate_title(&note.title)?;
        let tags = normalize_tags(&note.tags)?;
        self.check_folder(note.folder_id, owner_id).await?;
        if note.is_private {
            require_pin(self.pool, owner_id).await?;
        }

        let record = NewFileRecord::note(title, note.content)
            .in_folder(note.folder_id)
            .private(note.is_private)
            .with_tags(tags);
        QuotaLedger::new(self.pool)
            .ensure_room(owner_id, record.file_size)
            .await?;

        let id = self.persist(owner_id, &record).await?;
        info!(owner_id, file_id = id, size = record.file_size, "Note created");

        self.activity()
            .record(
                owner_id,
                ActivityAction::Created,
                FileKind::Note.resource_type(),
                id,
                &record.title,
            )
            .await;
        self.files().require(id, owner_id).await
    }

    /// Upload an image or PDF.
    ///
    /// The blob is written before the record commits and removed again if
    /// anything after the write fails.
    pub async fn create_upload(&self, owner_id: i64, request: UploadRequest) -> Result<FileRecord> {
        if request.kind == FileKind::Note {
            return Err(JotterError::Validation(
                "uploads must be images or PDFs".to_string(),
            ));
        }
        if request.content.is_empty() {
            return Err(JotterError::Validation("file is empty".to_string()));
        }
        if request.content.len() as u64 > self.max_upload_size {
            let max_mb = self.max_upload_size / 1024 / 1024;
            return Err(JotterError::Validation(format!(
                "file is too large (max {max_mb}MB)"
            )));
        }

        let title = validate_title(request.title.as_deref().unwrap_or(&request.filename))?;
        let tags = normalize_tags(&request.tags)?;
        self.check_folder(request.folder_id, owner_id).await?;
        if request.is_private {
            require_pin(self.pool, owner_id).await?;
        }

        let size = request.content.len() as i64;
        QuotaLedger::new(self.pool).ensure_room(owner_id, size).await?;

        let stored_name = self.blobs.write(&request.content, &request.filename)?;
        let payload = match request.kind {
            FileKind::Pdf => FilePayload::Pdf(pdf_info(&request.content)),
            _ => FilePayload::Image(image_info(&request.content, &request.filename)),
        };

        let record = NewFileRecord {
            title,
            folder_id: request.folder_id,
            filename: Some(request.filename),
            file_path: Some(stored_name.clone()),
            file_size: size,
            is_private: request.is_private,
            is_favorite: false,
            tags,
            payload,
        };

        let id = match self.persist(owner_id, &record).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_blob(&stored_name);
                return Err(e);
            }
        };
        info!(
            owner_id,
            file_id = id,
            kind = %request.kind,
            size,
            "File uploaded"
        );

        self.activity()
            .record(
                owner_id,
                ActivityAction::Created,
                request.kind.resource_type(),
                id,
                &record.title,
            )
            .await;
        self.files().require(id, owner_id).await
    }

    /// Get a file. Records a `viewed` activity.
    pub async fn get_file(&self, id: i64, owner_id: i64) -> Result<FileRecord> {
        let file = self.files().require(id, owner_id).await?;
        self.activity()
            .record(
                owner_id,
                ActivityAction::Viewed,
                file.kind.resource_type(),
                id,
                &file.title,
            )
            .await;
        Ok(file)
    }

    /// Read the stored blob of an image or PDF.
    pub async fn download(&self, id: i64, owner_id: i64) -> Result<DownloadResult> {
        let record = self.files().require(id, owner_id).await?;
        let stored_name = record
            .file_path
            .as_deref()
            .ok_or_else(|| JotterError::Validation("notes have no stored content".to_string()))?;
        let content = self.blobs.read(stored_name)?;
        Ok(DownloadResult { record, content })
    }

    /// Update title, tags or note content.
    ///
    /// The size delta comes from the row as read inside the write transaction.
    pub async fn update_file(&self, id: i64, owner_id: i64, patch: FilePatch) -> Result<FileRecord> {
        let file = self.files().require(id, owner_id).await?;
        let growth = patch.apply_to(&file)?.size - file.file_size;
        if growth > 0 {
            QuotaLedger::new(self.pool).ensure_room(owner_id, growth).await?;
        }

        let mut tx = begin_write(self.pool).await?;
        let current = FileRepository::get_in(&mut tx, id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("file".to_string()))?;
        let patched = patch.apply_to(&current)?;
        let delta = patched.size - current.file_size;

        FileRepository::update_content(
            &mut tx,
            id,
            owner_id,
            &patched.title,
            &patched.tags,
            &patched.payload,
            patched.size,
        )
        .await?;
        QuotaLedger::require_growth(&mut tx, owner_id, delta).await?;
        FolderRepository::adjust_counters(&mut tx, current.folder_id, 0, delta).await?;
        tx.commit().await?;

        self.activity()
            .record(
                owner_id,
                ActivityAction::Updated,
                current.kind.resource_type(),
                id,
                &patched.title,
            )
            .await;
        self.files().require(id, owner_id).await
    }

    /// Delete a file and release its storage.
    pub async fn delete_file(&self, id: i64, owner_id: i64) -> Result<()> {
        let mut tx = begin_write(self.pool).await?;
        let file = FileRepository::get_in(&mut tx, id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("file".to_string()))?;
        FileRepository::delete(&mut tx, id, owner_id).await?;
        QuotaLedger::commit_in(&mut tx, owner_id, -file.file_size).await?;
        FolderRepository::adjust_counters(&mut tx, file.folder_id, -1, -file.file_size).await?;
        tx.commit().await?;

        if let Some(ref stored_name) = file.file_path {
            if let Err(e) = self.blobs.delete(stored_name) {
                error!(owner_id, file_id = id, blob = %stored_name, "Failed to delete blob: {}", e);
            }
        }
        info!(owner_id, file_id = id, size = file.file_size, "File deleted");

        self.activity()
            .record(
                owner_id,
                ActivityAction::Deleted,
                file.kind.resource_type(),
                id,
                &file.title,
            )
            .await;
        Ok(())
    }

    /// Copy a file into `dest_folder` (the source folder when `None`).
    pub async fn copy_file(
        &self,
        id: i64,
        owner_id: i64,
        dest_folder: Option<i64>,
    ) -> Result<FileRecord> {
        let source = self.files().require(id, owner_id).await?;
        let folder_id = dest_folder.or(source.folder_id);
        self.check_folder(folder_id, owner_id).await?;

        QuotaLedger::new(self.pool)
            .ensure_room(owner_id, source.file_size)
            .await?;

        let file_path = match source.file_path {
            Some(ref stored_name) => Some(self.blobs.copy(stored_name)?),
            None => None,
        };
        let record = NewFileRecord {
            title: format!("{} (Copy)", source.title),
            folder_id,
            filename: source.filename.clone(),
            file_path: file_path.clone(),
            file_size: source.file_size,
            is_private: source.is_private,
            is_favorite: false,
            tags: source.tags.clone(),
            payload: source.payload.clone(),
        };

        let new_id = match self.persist(owner_id, &record).await {
            Ok(new_id) => new_id,
            Err(e) => {
                if let Some(ref stored_name) = file_path {
                    self.discard_blob(stored_name);
                }
                return Err(e);
            }
        };
        info!(owner_id, source_id = id, file_id = new_id, "File copied");

        self.activity()
            .record(
                owner_id,
                ActivityAction::Created,
                source.kind.resource_type(),
                new_id,
                &format!("Copied {}", source.title),
            )
            .await;
        self.files().require(new_id, owner_id).await
    }

    /// Copy a file next to itself.
    pub async fn duplicate_file(&self, id: i64, owner_id: i64) -> Result<FileRecord> {
        self.copy_file(id, owner_id, None).await
    }

    /// Move a file into `folder_id` (the root when `None`).
    pub async fn move_file(
        &self,
        id: i64,
        owner_id: i64,
        folder_id: Option<i64>,
    ) -> Result<FileRecord> {
        self.files().require(id, owner_id).await?;
        self.check_folder(folder_id, owner_id).await?;

        let mut tx = begin_write(self.pool).await?;
        let file = FileRepository::get_in(&mut tx, id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("file".to_string()))?;
        if file.folder_id == folder_id {
            return Ok(file);
        }
        FileRepository::set_folder(&mut tx, id, owner_id, folder_id).await?;
        FolderRepository::adjust_counters(&mut tx, file.folder_id, -1, -file.file_size).await?;
        FolderRepository::adjust_counters(&mut tx, folder_id, 1, file.file_size).await?;
        tx.commit().await?;

        self.activity()
            .record(
                owner_id,
                ActivityAction::Moved,
                file.kind.resource_type(),
                id,
                &file.title,
            )
            .await;
        self.files().require(id, owner_id).await
    }

    /// Flip the favorite flag. Returns the new value.
    pub async fn toggle_favorite(&self, id: i64, owner_id: i64) -> Result<bool> {
        let file = self.files().require(id, owner_id).await?;
        let is_favorite = self
            .files()
            .toggle_favorite(id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("file".to_string()))?;

        self.activity()
            .record(
                owner_id,
                ActivityAction::Favorited,
                file.kind.resource_type(),
                id,
                &file.title,
            )
            .await;
        Ok(is_favorite)
    }

    /// Flip the privacy flag. Going private requires a PIN.
    pub async fn toggle_private(&self, id: i64, owner_id: i64) -> Result<bool> {
        let file = self.files().require(id, owner_id).await?;
        let is_private = !file.is_private;
        if is_private {
            require_pin(self.pool, owner_id).await?;
        }
        self.files().set_private(id, owner_id, is_private).await?;

        let note = if is_private {
            "Moved to private space"
        } else {
            "Removed from private space"
        };
        self.activity()
            .record(
                owner_id,
                ActivityAction::Updated,
                file.kind.resource_type(),
                id,
                note,
            )
            .await;
        Ok(is_private)
    }

    /// List files with filters and pagination.
    pub async fn list_files(
        &self,
        owner_id: i64,
        filter: &FileFilter,
        query: ListQuery,
    ) -> Result<Page<FileRecord>> {
        self.files().list(owner_id, filter, query).await
    }

    /// Case-insensitive substring search over titles, tags and folder names.
    pub async fn search(
        &self,
        owner_id: i64,
        term: &str,
        scope: SearchScope,
    ) -> Result<SearchResults> {
        let term = term.trim();
        if term.is_empty() {
            return Err(JotterError::Validation(
                "search query must not be empty".to_string(),
            ));
        }

        let mut results = SearchResults::default();
        if scope != SearchScope::Folders {
            results.files = self.files().search(owner_id, term, SEARCH_LIMIT).await?;
        }
        if scope != SearchScope::Files {
            results.folders = FolderRepository::new(self.pool)
                .search(owner_id, term, SEARCH_LIMIT)
                .await?;
        }
        Ok(results)
    }

    /// Files carrying `tag`.
    pub async fn files_by_tag(&self, owner_id: i64, tag: &str) -> Result<Vec<FileRecord>> {
        self.files().by_tag(owner_id, tag.trim()).await
    }

    /// Most used tags, most frequent first.
    pub async fn popular_tags(&self, owner_id: i64, limit: i64) -> Result<Vec<(String, i64)>> {
        self.files().popular_tags(owner_id, limit.clamp(1, 100)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::set_pin;
    use crate::db::{Database, NewUser, UserRepository};
    use crate::file::{FileStorage, FolderTree, NewFolder, SortField, SortOrder};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory blob store that can be told to fail writes.
    #[derive(Default)]
    struct MemoryBlobs {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes: bool,
        next: Mutex<u32>,
    }

    impl MemoryBlobs {
        fn count(&self) -> usize {
            self.blobs.lock().unwrap().len()
        }

        fn fresh_name(&self) -> String {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            format!("blob-{next}")
        }
    }

    impl BlobStore for MemoryBlobs {
        fn write(&self, content: &[u8], _original_name: &str) -> Result<String> {
            if self.fail_writes {
                return Err(JotterError::Io(std::io::Error::other("disk full")));
            }
            let name = self.fresh_name();
            self.blobs
                .lock()
                .unwrap()
                .insert(name.clone(), content.to_vec());
            Ok(name)
        }

        fn read(&self, stored_name: &str) -> Result<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(stored_name)
                .cloned()
                .ok_or_else(|| JotterError::NotFound("blob".to_string()))
        }

        fn delete(&self, stored_name: &str) -> Result<bool> {
            Ok(self.blobs.lock().unwrap().remove(stored_name).is_some())
        }

        fn copy(&self, stored_name: &str) -> Result<String> {
            let content = self.read(stored_name)?;
            let name = self.fresh_name();
            self.blobs.lock().unwrap().insert(name.clone(), content);
            Ok(name)
        }

        fn exists(&self, stored_name: &str) -> bool {
            self.blobs.lock().unwrap().contains_key(stored_name)
        }
    }

    async fn setup_with_limit(limit: i64) -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("alice").with_storage_limit(limit))
            .await
            .unwrap();
        (db, user.id)
    }

    async fn used_storage(db: &Database, user: i64) -> i64 {
        UserRepository::new(db.pool())
            .require(user)
            .await
            .unwrap()
            .used_storage
    }

    fn note(title: &str, content: &str) -> NewNote {
        NewNote {
            title: title.to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    const PNG_1X1: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0,
        0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0,
    ];

    #[tokio::test]
    async fn test_create_note() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);

        let mut request = note("Groceries", "milk, eggs");
        request.tags = vec!["home".to_string(), " home ".to_string()];
        let file = service.create_note(user, request).await.unwrap();

        assert_eq!(file.kind, FileKind::Note);
        assert_eq!(file.file_size, 10);
        assert_eq!(file.tags, vec!["home"]);
        assert_eq!(file.payload.content(), Some("milk, eggs"));
        assert_eq!(used_storage(&db, user).await, 10);
        assert_eq!(blobs.count(), 0);
    }

    #[tokio::test]
    async fn test_create_note_in_foreign_folder() {
        let (db, user) = setup_with_limit(1000).await;
        let other = UserRepository::new(db.pool())
            .create(&NewUser::new("bob"))
            .await
            .unwrap();
        let blobs = MemoryBlobs::default();
        let folder = FolderTree::new(db.pool(), &blobs)
            .create_folder(other.id, NewFolder::new("Bob"))
            .await
            .unwrap();

        let mut request = note("x", "y");
        request.folder_id = Some(folder.id);
        let result = FileService::new(db.pool(), &blobs)
            .create_note(user, request)
            .await;
        assert!(matches!(result, Err(JotterError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_private_note_requires_pin() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);

        let mut request = note("secret", "shh");
        request.is_private = true;
        let result = service.create_note(user, request.clone()).await;
        assert!(matches!(result, Err(JotterError::PinRequired)));

        set_pin(db.pool(), user, "2468").await.unwrap();
        assert!(service.create_note(user, request).await.unwrap().is_private);
    }

    #[tokio::test]
    async fn test_quota_rejects_upload_and_cleans_up() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);

        service
            .create_note(user, note("big", &"x".repeat(900)))
            .await
            .unwrap();

        let request = UploadRequest::new(FileKind::Pdf, "doc.pdf", vec![b'%'; 200]);
        let result = service.create_upload(user, request).await;
        match result {
            Err(JotterError::StorageLimitExceeded {
                requested,
                available,
            }) => {
                assert_eq!(requested, 200);
                assert_eq!(available, 100);
            }
            other => panic!("expected StorageLimitExceeded, got {other:?}"),
        }

        assert_eq!(used_storage(&db, user).await, 900);
        assert_eq!(blobs.count(), 0);
        let page = service
            .list_files(user, &FileFilter::default(), ListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_rejected_upload_keeps_existing_blobs() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);

        let mut tx = db.pool().begin().await.unwrap();
        let record = NewFileRecord::note("other", "x".repeat(950));
        FileRepository::insert(&mut tx, user, &record).await.unwrap();
        tx.commit().await.unwrap();
        QuotaLedger::new(db.pool()).commit(user, 950).await.unwrap();

        let request = UploadRequest::new(FileKind::Image, "a.png", PNG_1X1.to_vec());
        assert!(service.create_upload(user, request).await.is_ok());

        let request = UploadRequest::new(FileKind::Image, "b.png", vec![0u8; 100]);
        let result = service.create_upload(user, request).await;
        assert!(matches!(
            result,
            Err(JotterError::StorageLimitExceeded { .. })
        ));
        assert_eq!(blobs.count(), 1);
    }

    #[tokio::test]
    async fn test_upload_write_failure() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs {
            fail_writes: true,
            ..Default::default()
        };
        let service = FileService::new(db.pool(), &blobs);

        let request = UploadRequest::new(FileKind::Image, "a.png", PNG_1X1.to_vec());
        let result = service.create_upload(user, request).await;
        assert!(matches!(result, Err(JotterError::Io(_))));
        assert_eq!(used_storage(&db, user).await, 0);
    }

    #[tokio::test]
    async fn test_upload_extracts_metadata() {
        let (db, user) = setup_with_limit(1000).await;
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let service = FileService::new(db.pool(), &storage);

        let request =
            UploadRequest::new(FileKind::Image, "dot.png", PNG_1X1.to_vec()).with_title("Dot");
        let file = service.create_upload(user, request).await.unwrap();

        assert_eq!(file.title, "Dot");
        assert_eq!(file.filename.as_deref(), Some("dot.png"));
        match file.payload {
            FilePayload::Image(ref info) => {
                assert_eq!(info.width, Some(1));
                assert_eq!(info.height, Some(1));
            }
            ref other => panic!("expected image payload, got {other:?}"),
        }

        let download = service.download(file.id, user).await.unwrap();
        assert_eq!(download.content, PNG_1X1);
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let (db, user) = setup_with_limit(1_000_000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs).with_max_upload_size(10);

        let request = UploadRequest::new(FileKind::Pdf, "a.pdf", vec![0u8; 11]);
        let result = service.create_upload(user, request).await;
        assert!(matches!(result, Err(JotterError::Validation(_))));
    }

    #[tokio::test]
    async fn test_folder_counters_follow_create_and_delete() {
        let (db, user) = setup_with_limit(10_000).await;
        let blobs = MemoryBlobs::default();
        let tree = FolderTree::new(db.pool(), &blobs);
        let service = FileService::new(db.pool(), &blobs);

        let work = tree
            .create_folder(user, NewFolder::new("Work"))
            .await
            .unwrap();
        let mut request = note("doc", &"d".repeat(1000));
        request.folder_id = Some(work.id);
        let doc = service.create_note(user, request).await.unwrap();

        let work_now = tree.get_folder(work.id, user).await.unwrap();
        assert_eq!(work_now.total_items, 1);
        assert_eq!(work_now.storage_used, 1000);
        assert_eq!(used_storage(&db, user).await, 1000);

        service.delete_file(doc.id, user).await.unwrap();
        let work_now = tree.get_folder(work.id, user).await.unwrap();
        assert_eq!(work_now.total_items, 0);
        assert_eq!(work_now.storage_used, 0);
        assert_eq!(used_storage(&db, user).await, 0);
    }

    #[tokio::test]
    async fn test_update_note_content() {
        let (db, user) = setup_with_limit(100).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);
        let file = service
            .create_note(user, note("n", "12345"))
            .await
            .unwrap();

        let patch = FilePatch {
            content: Some("1234567890".to_string()),
            ..Default::default()
        };
        let updated = service.update_file(file.id, user, patch).await.unwrap();
        assert_eq!(updated.file_size, 10);
        assert_eq!(used_storage(&db, user).await, 10);

        let patch = FilePatch {
            content: Some("x".repeat(200)),
            ..Default::default()
        };
        let result = service.update_file(file.id, user, patch).await;
        assert!(matches!(
            result,
            Err(JotterError::StorageLimitExceeded { .. })
        ));
        let unchanged = service.get_file(file.id, user).await.unwrap();
        assert_eq!(unchanged.payload.content(), Some("1234567890"));

        let patch = FilePatch {
            title: Some("renamed".to_string()),
            content: Some("1".to_string()),
            ..Default::default()
        };
        let updated = service.update_file(file.id, user, patch).await.unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(used_storage(&db, user).await, 1);
    }

    #[tokio::test]
    async fn test_update_content_of_upload_rejected() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);
        let file = service
            .create_upload(
                user,
                UploadRequest::new(FileKind::Image, "a.png", PNG_1X1.to_vec()),
            )
            .await
            .unwrap();

        let patch = FilePatch {
            content: Some("text".to_string()),
            ..Default::default()
        };
        let result = service.update_file(file.id, user, patch).await;
        assert!(matches!(result, Err(JotterError::Validation(_))));
    }

    #[tokio::test]
    async fn test_copy_and_duplicate() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let tree = FolderTree::new(db.pool(), &blobs);
        let service = FileService::new(db.pool(), &blobs);

        let folder = tree
            .create_folder(user, NewFolder::new("Pics"))
            .await
            .unwrap();
        let original = service
            .create_upload(
                user,
                UploadRequest::new(FileKind::Image, "a.png", PNG_1X1.to_vec()).in_folder(folder.id),
            )
            .await
            .unwrap();
        service.toggle_favorite(original.id, user).await.unwrap();

        let copy = service.duplicate_file(original.id, user).await.unwrap();
        assert_eq!(copy.title, "a.png (Copy)");
        let recent = ActivityLog::new(db.pool()).recent(user, 1).await.unwrap();
        assert_eq!(recent[0].resource_title, "Copied a.png");
        assert_eq!(copy.folder_id, Some(folder.id));
        assert!(!copy.is_favorite);
        assert_ne!(copy.file_path, original.file_path);
        assert_eq!(blobs.count(), 2);

        let size = PNG_1X1.len() as i64;
        assert_eq!(used_storage(&db, user).await, 2 * size);
        let folder = tree.get_folder(folder.id, user).await.unwrap();
        assert_eq!(folder.total_items, 2);

        let limited = service.copy_file(original.id, user, Some(9999)).await;
        assert!(matches!(limited, Err(JotterError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_copy_over_quota() {
        let (db, user) = setup_with_limit(15).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);
        let file = service
            .create_note(user, note("n", "1234567890"))
            .await
            .unwrap();

        let result = service.copy_file(file.id, user, None).await;
        assert!(matches!(
            result,
            Err(JotterError::StorageLimitExceeded { .. })
        ));
        assert_eq!(used_storage(&db, user).await, 10);
    }

    #[tokio::test]
    async fn test_move_file_updates_counters() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let tree = FolderTree::new(db.pool(), &blobs);
        let service = FileService::new(db.pool(), &blobs);

        let a = tree.create_folder(user, NewFolder::new("A")).await.unwrap();
        let b = tree.create_folder(user, NewFolder::new("B")).await.unwrap();
        let mut request = note("n", "abcd");
        request.folder_id = Some(a.id);
        let file = service.create_note(user, request).await.unwrap();

        let moved = service.move_file(file.id, user, Some(b.id)).await.unwrap();
        assert_eq!(moved.folder_id, Some(b.id));

        let a = tree.get_folder(a.id, user).await.unwrap();
        let b = tree.get_folder(b.id, user).await.unwrap();
        assert_eq!((a.total_items, a.storage_used), (0, 0));
        assert_eq!((b.total_items, b.storage_used), (1, 4));

        let rooted = service.move_file(file.id, user, None).await.unwrap();
        assert_eq!(rooted.folder_id, None);
    }

    #[tokio::test]
    async fn test_toggle_flags() {
        let (db, user) = setup_with_limit(1000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);
        let file = service.create_note(user, note("n", "x")).await.unwrap();

        assert!(service.toggle_favorite(file.id, user).await.unwrap());
        assert!(!service.toggle_favorite(file.id, user).await.unwrap());

        let result = service.toggle_private(file.id, user).await;
        assert!(matches!(result, Err(JotterError::PinRequired)));

        set_pin(db.pool(), user, "1357").await.unwrap();
        assert!(service.toggle_private(file.id, user).await.unwrap());
        assert!(!service.toggle_private(file.id, user).await.unwrap());

        let result = service.toggle_favorite(9999, user).await;
        assert!(matches!(result, Err(JotterError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_files_pagination_and_privacy() {
        let (db, user) = setup_with_limit(100_000).await;
        let blobs = MemoryBlobs::default();
        let service = FileService::new(db.pool(), &blobs);
        set_pin(db.pool(), user, "1234").await.unwrap();

        for i in 0..25 {
            service
                .create_note(user, note(&format!("note {i:02}"), "x"))
                .await
                .unwrap();
        }
        let mut hidden = note("hidden", "x");
        hidden.is_private = true;
        service.create_note(user, hidden).await.unwrap();

        let query = ListQuery {
            page: 2,
            limit: 10,
            sort: SortField::Title,
            order: SortOrder::Asc,
        };
        let page = service
            .list_files(user, &FileFilter::default(), query)
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page);
        assert!(page.has_prev_page);
        assert_eq!(page.items[0].title, "note 10");

        let private = FileFilter {
            private: Some(true),
            ..Default::default()
        };
        let page = service
            .list_files(user, &private, ListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_search_and_tags() {
        let (db, user) = setup_with_limit(100_000).await;
        let blobs = MemoryBlobs::default();
        let tree = FolderTree::new(db.pool(), &blobs);
        let service = FileService::new(db.pool(), &blobs);

        tree.create_folder(user, NewFolder::new("Recipes"))
            .await
            .unwrap();
        let mut pasta = note("Pasta night", "boil water");
        pasta.tags = vec!["Food".to_string(), "quick".to_string()];
        service.create_note(user, pasta).await.unwrap();
        let mut salad = note("Salad", "chop");
        salad.tags = vec!["food".to_string()];
        service.create_note(user, salad).await.unwrap();

        let all = service.search(user, "RECIPE", SearchScope::All).await.unwrap();
        assert_eq!(all.folders.len(), 1);
        assert!(all.files.is_empty());

        let files = service.search(user, "food", SearchScope::Files).await.unwrap();
        assert_eq!(files.files.len(), 2);
        assert!(files.folders.is_empty());

        assert!(service.search(user, "  ", SearchScope::All).await.is_err());

        assert_eq!(service.files_by_tag(user, "FOOD").await.unwrap().len(), 2);
        let popular = service.popular_tags(user, 5).await.unwrap();
        assert_eq!(popular[0], ("food".to_string(), 2));
    }
}
