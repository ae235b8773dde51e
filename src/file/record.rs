//! File records: typed notes, images and PDFs.
//!
//! This module holds the record types and the SQL repository. Quota and
//! folder-counter side effects are coordinated by [`super::FileService`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::extract::{ImageInfo, PdfInfo};
use super::folder::{push_id_list, MAX_BATCH_SIZE};
use crate::activity::ResourceType;
use crate::{JotterError, Result};

/// Kind of file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Note,
    Image,
    Pdf,
}

impl FileKind {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Note => "note",
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
        }
    }

    /// Resource type used in activity records.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            FileKind::Note => ResourceType::Note,
            FileKind::Image => ResourceType::Image,
            FileKind::Pdf => ResourceType::Pdf,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = JotterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "note" => Ok(FileKind::Note),
            "image" => Ok(FileKind::Image),
            "pdf" => Ok(FileKind::Pdf),
            _ => Err(JotterError::Validation(format!("unknown file type: {s}"))),
        }
    }
}

/// Type-specific content of a file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilePayload {
    Note { content: String },
    Image(ImageInfo),
    Pdf(PdfInfo),
}

#[derive(Deserialize)]
struct NoteBody {
    #[serde(default)]
    content: String,
}

impl FilePayload {
    /// Kind this payload belongs to.
    pub fn kind(&self) -> FileKind {
        match self {
            FilePayload::Note { .. } => FileKind::Note,
            FilePayload::Image(_) => FileKind::Image,
            FilePayload::Pdf(_) => FileKind::Pdf,
        }
    }

    /// Note body, if this is a note.
    pub fn content(&self) -> Option<&str> {
        match self {
            FilePayload::Note { content } => Some(content),
            _ => None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| JotterError::Database(format!("payload encode: {e}")))
    }

    /// Decode a stored payload. Unreadable payloads decode as empty.
    fn from_json(kind: FileKind, json: &str) -> Self {
        match kind {
            FileKind::Note => FilePayload::Note {
                content: serde_json::from_str::<NoteBody>(json)
                    .map(|b| b.content)
                    .unwrap_or_default(),
            },
            FileKind::Image => FilePayload::Image(serde_json::from_str(json).unwrap_or_default()),
            FileKind::Pdf => FilePayload::Pdf(serde_json::from_str(json).unwrap_or_default()),
        }
    }
}

/// A stored file record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub title: String,
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    /// Original upload name.
    pub filename: Option<String>,
    /// Stored blob name; never exposed.
    #[serde(skip_serializing)]
    pub file_path: Option<String>,
    pub file_size: i64,
    pub is_private: bool,
    pub is_favorite: bool,
    pub tags: Vec<String>,
    #[serde(rename = "metadata")]
    pub payload: FilePayload,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row type for FileRecord.
#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    kind: String,
    title: String,
    owner_id: i64,
    folder_id: Option<i64>,
    filename: Option<String>,
    file_path: Option<String>,
    file_size: i64,
    is_private: bool,
    is_favorite: bool,
    tags: String,
    payload: String,
    created_at: String,
    updated_at: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        let kind = row.kind.parse().unwrap_or(FileKind::Note);
        Self {
            id: row.id,
            kind,
            title: row.title,
            owner_id: row.owner_id,
            folder_id: row.folder_id,
            filename: row.filename,
            file_path: row.file_path,
            file_size: row.file_size,
            is_private: row.is_private,
            is_favorite: row.is_favorite,
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            payload: FilePayload::from_json(kind, &row.payload),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FILE_COLUMNS: &str = "id, kind, title, owner_id, folder_id, filename, file_path, file_size,
                            is_private, is_favorite, tags, payload, created_at, updated_at";

/// Data for inserting a file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub title: String,
    pub folder_id: Option<i64>,
    pub filename: Option<String>,
    pub file_path: Option<String>,
    pub file_size: i64,
    pub is_private: bool,
    pub is_favorite: bool,
    pub tags: Vec<String>,
    pub payload: FilePayload,
}

impl NewFileRecord {
    /// A note whose size is the UTF-8 byte length of its content.
    pub fn note(title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            title: title.into(),
            folder_id: None,
            filename: None,
            file_path: None,
            file_size: content.len() as i64,
            is_private: false,
            is_favorite: false,
            tags: Vec::new(),
            payload: FilePayload::Note { content },
        }
    }

    /// Set the containing folder.
    pub fn in_folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = folder_id;
        self
    }

    /// Set the privacy flag.
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn kind(&self) -> FileKind {
        self.payload.kind()
    }
}

/// Sortable columns for file listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    #[serde(alias = "created_at")]
    CreatedAt,
    #[serde(alias = "updated_at")]
    UpdatedAt,
    Title,
    #[serde(alias = "file_size")]
    FileSize,
    #[serde(alias = "type")]
    Kind,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title COLLATE NOCASE",
            SortField::FileSize => "file_size",
            SortField::Kind => "kind",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination and sort parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page: i64,
    pub limit: i64,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

impl ListQuery {
    /// Clamp page and limit into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Filters for file listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    pub kind: Option<FileKind>,
    pub folder_id: Option<i64>,
    pub favorite: Option<bool>,
    /// `None` lists public files only.
    pub private: Option<bool>,
    /// Exact tag match.
    pub tag: Option<String>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).map_err(|e| JotterError::Database(format!("tags encode: {e}")))
}

/// Repository for file records.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record on the given connection. Returns the new ID.
    pub async fn insert(
        conn: &mut SqliteConnection,
        owner_id: i64,
        file: &NewFileRecord,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO files (kind, title, owner_id, folder_id, filename, file_path, file_size,
                                is_private, is_favorite, tags, payload)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file.kind().as_str())
        .bind(&file.title)
        .bind(owner_id)
        .bind(file.folder_id)
        .bind(&file.filename)
        .bind(&file.file_path)
        .bind(file.file_size)
        .bind(file.is_private)
        .bind(file.is_favorite)
        .bind(encode_tags(&file.tags)?)
        .bind(file.payload.to_json()?)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a file by ID, scoped to its owner.
    pub async fn get(&self, id: i64, owner_id: i64) -> Result<Option<FileRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id, owner_id).await
    }

    /// [`get`](Self::get) on an existing connection or transaction.
    pub async fn get_in(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(FileRecord::from))
    }

    /// Get a file by ID, failing with `NotFound`.
    pub async fn require(&self, id: i64, owner_id: i64) -> Result<FileRecord> {
        self.get(id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("file".to_string()))
    }

    /// Delete a record on the given connection. Returns false if absent.
    pub async fn delete(conn: &mut SqliteConnection, id: i64, owner_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rewrite the editable fields of a record.
    pub async fn update_content(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
        title: &str,
        tags: &[String],
        payload: &FilePayload,
        file_size: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET title = ?, tags = ?, payload = ?, file_size = ?,
                              updated_at = datetime('now')
             WHERE id = ? AND owner_id = ?",
        )
        .bind(title)
        .bind(encode_tags(tags)?)
        .bind(payload.to_json()?)
        .bind(file_size)
        .bind(id)
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-home a record.
    pub async fn set_folder(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
        folder_id: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET folder_id = ?, updated_at = datetime('now')
             WHERE id = ? AND owner_id = ?",
        )
        .bind(folder_id)
        .bind(id)
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip the favorite flag. Returns the new value.
    pub async fn toggle_favorite(&self, id: i64, owner_id: i64) -> Result<Option<bool>> {
        let value: Option<(bool,)> = sqlx::query_as(
            "UPDATE files SET is_favorite = NOT is_favorite, updated_at = datetime('now')
             WHERE id = ? AND owner_id = ? RETURNING is_favorite",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(value.map(|v| v.0))
    }

    /// Set the privacy flag.
    pub async fn set_private(&self, id: i64, owner_id: i64, is_private: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET is_private = ?, updated_at = datetime('now')
             WHERE id = ? AND owner_id = ?",
        )
        .bind(is_private)
        .bind(id)
        .bind(owner_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, owner_id: i64, filter: &FileFilter) {
        query.push(" WHERE owner_id = ");
        query.push_bind(owner_id);
        query.push(" AND is_private = ");
        query.push_bind(filter.private.unwrap_or(false));

        if let Some(kind) = filter.kind {
            query.push(" AND kind = ");
            query.push_bind(kind.as_str());
        }
        if let Some(folder_id) = filter.folder_id {
            query.push(" AND folder_id = ");
            query.push_bind(folder_id);
        }
        if let Some(favorite) = filter.favorite {
            query.push(" AND is_favorite = ");
            query.push_bind(favorite);
        }
        if let Some(ref tag) = filter.tag {
            query.push(" AND EXISTS (SELECT 1 FROM json_each(files.tags) WHERE lower(value) = ");
            query.push_bind(tag.to_lowercase());
            query.push(")");
        }
    }

    /// List files with filters, sorting and pagination.
    pub async fn list(
        &self,
        owner_id: i64,
        filter: &FileFilter,
        query: ListQuery,
    ) -> Result<Page<FileRecord>> {
        let query = query.normalized();

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM files");
        Self::push_filters(&mut count, owner_id, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(self.pool).await?;

        let mut select: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files"));
        Self::push_filters(&mut select, owner_id, filter);
        select.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort.column(),
            query.order.keyword(),
            query.order.keyword()
        ));
        select.push(" LIMIT ");
        select.push_bind(query.limit);
        select.push(" OFFSET ");
        select.push_bind(query.offset());

        let rows: Vec<FileRow> = select.build_query_as().fetch_all(self.pool).await?;
        let items = rows.into_iter().map(FileRecord::from).collect();

        Ok(Page::new(items, total, query.page, query.limit))
    }

    /// Files in a folder, newest first.
    pub async fn list_in_folder(&self, folder_id: i64, owner_id: i64) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folder_id = ? AND owner_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(folder_id)
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    /// Case-insensitive substring search on titles and tags.
    pub async fn search(&self, owner_id: i64, term: &str, limit: i64) -> Result<Vec<FileRecord>> {
        let pattern = like_pattern(term);
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ?
               AND (lower(title) LIKE ? ESCAPE '\\'
                    OR EXISTS (SELECT 1 FROM json_each(files.tags)
                               WHERE lower(value) LIKE ? ESCAPE '\\'))
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(owner_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    /// Files carrying a tag (case-insensitive), newest first.
    pub async fn by_tag(&self, owner_id: i64, tag: &str) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ?
               AND EXISTS (SELECT 1 FROM json_each(files.tags) WHERE lower(value) = ?)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .bind(tag.to_lowercase())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    /// Delete every file directly inside any of `folder_ids`.
    ///
    /// Returns `(file_size, file_path)` of each deleted record.
    pub async fn delete_in_folders(
        conn: &mut SqliteConnection,
        owner_id: i64,
        folder_ids: &[i64],
    ) -> Result<Vec<(i64, Option<String>)>> {
        let mut deleted = Vec::new();
        for chunk in folder_ids.chunks(MAX_BATCH_SIZE) {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM files WHERE owner_id = ");
            query.push_bind(owner_id);
            query.push(" AND folder_id IN ");
            push_id_list(&mut query, chunk);
            query.push(" RETURNING file_size, file_path");

            let rows: Vec<(i64, Option<String>)> =
                query.build_query_as().fetch_all(&mut *conn).await?;
            deleted.extend(rows);
        }
        Ok(deleted)
    }

    /// Most used tags with their counts.
    pub async fn popular_tags(&self, owner_id: i64, limit: i64) -> Result<Vec<(String, i64)>> {
        let tags = sqlx::query_as(
            "SELECT lower(t.value) AS tag, COUNT(*) AS uses
             FROM files, json_each(files.tags) AS t
             WHERE files.owner_id = ?
             GROUP BY lower(t.value)
             ORDER BY uses DESC, tag ASC
             LIMIT ?",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(tags)
    }
}
