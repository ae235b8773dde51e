//! Folder types and repository for Jotter.
//!
//! Tree-level rules (ownership, cycles, cascades) live in
//! [`super::FolderTree`]; this module only talks to SQL.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::record::like_pattern;
use crate::{JotterError, Result};

/// Maximum number of IDs bound into a single `IN (...)` list.
pub(crate) const MAX_BATCH_SIZE: usize = 500;

/// Maximum length for folder names (in characters).
pub const MAX_FOLDER_NAME_LENGTH: usize = 100;

/// A folder owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name, unique among siblings.
    pub name: String,
    /// Owning user.
    pub owner_id: i64,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
    pub is_private: bool,
    /// Number of files directly inside.
    pub total_items: i64,
    /// Bytes of files directly inside.
    pub storage_used: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_private: bool,
}

impl NewFolder {
    /// Create a public root folder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
            is_private: false,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the privacy flag.
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }
}

const FOLDER_COLUMNS: &str =
    "id, name, owner_id, parent_id, is_private, total_items, storage_used, created_at, updated_at";

/// Push `(?, ?, ...)` for a list of IDs.
pub(crate) fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    query.push("(");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a folder. Returns the created folder.
    pub async fn create(&self, owner_id: i64, folder: &NewFolder) -> Result<Folder> {
        let result = sqlx::query(
            "INSERT INTO folders (name, owner_id, parent_id, is_private) VALUES (?, ?, ?, ?)",
        )
        .bind(&folder.name)
        .bind(owner_id)
        .bind(folder.parent_id)
        .bind(folder.is_private)
        .execute(self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID, scoped to its owner.
    pub async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Folder>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id, owner_id).await
    }

    /// [`get`](Self::get) on an existing connection or transaction.
    pub async fn get_in(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(folder)
    }

    /// Get a folder by ID, failing with `NotFound`.
    pub async fn require(&self, id: i64, owner_id: i64) -> Result<Folder> {
        self.get(id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("folder".to_string()))
    }

    /// Owner of a folder regardless of the caller.
    ///
    /// Used to tell a missing folder apart from someone else's.
    pub async fn owner_of(conn: &mut SqliteConnection, id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT owner_id FROM folders WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Parent of a folder. Outer `None` when the folder is absent.
    pub async fn parent_of(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<Option<i64>>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT parent_id FROM folders WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Folders under a parent (or at the root), sorted by name.
    pub async fn list(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        include_private: bool,
    ) -> Result<Vec<Folder>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE owner_id = "));
        query.push_bind(owner_id);

        match parent_id {
            Some(parent_id) => {
                query.push(" AND parent_id = ");
                query.push_bind(parent_id);
            }
            None => {
                query.push(" AND parent_id IS NULL");
            }
        }
        if !include_private {
            query.push(" AND is_private = 0");
        }
        query.push(" ORDER BY name COLLATE NOCASE, id");

        let folders: Vec<Folder> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(folders)
    }

    /// Whether a sibling with this name exists, optionally ignoring one folder.
    pub async fn name_taken(
        conn: &mut SqliteConnection,
        owner_id: i64,
        parent_id: Option<i64>,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                SELECT 1 FROM folders
                WHERE owner_id = ? AND COALESCE(parent_id, 0) = COALESCE(?, 0)
                  AND name = ? AND id != COALESCE(?, 0))",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists.0)
    }

    /// Rename a folder.
    pub async fn rename(&self, id: i64, owner_id: i64, name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE folders SET name = ?, updated_at = datetime('now')
             WHERE id = ? AND owner_id = ?",
        )
        .bind(name)
        .bind(id)
        .bind(owner_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change a folder's parent.
    pub async fn set_parent(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
        parent_id: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE folders SET parent_id = ?, updated_at = datetime('now')
             WHERE id = ? AND owner_id = ?",
        )
        .bind(parent_id)
        .bind(id)
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Case-insensitive substring search on folder names.
    pub async fn search(&self, owner_id: i64, term: &str, limit: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND lower(name) LIKE ? ESCAPE '\\'
             ORDER BY name COLLATE NOCASE, id
             LIMIT ?"
        ))
        .bind(owner_id)
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// IDs of the direct children of any of `parents`.
    pub async fn child_ids(&self, owner_id: i64, parents: &[i64]) -> Result<Vec<i64>> {
        let mut children = Vec::new();

        for chunk in parents.chunks(MAX_BATCH_SIZE) {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id FROM folders WHERE owner_id = ");
            query.push_bind(owner_id);
            query.push(" AND parent_id IN ");
            push_id_list(&mut query, chunk);

            let rows: Vec<(i64,)> = query.build_query_as().fetch_all(self.pool).await?;
            children.extend(rows.into_iter().map(|r| r.0));
        }

        Ok(children)
    }

    /// Adjust the direct-children counters of a folder.
    ///
    /// No-op when `folder_id` is `None`. Counters never go below zero.
    pub async fn adjust_counters(
        conn: &mut SqliteConnection,
        folder_id: Option<i64>,
        items: i64,
        bytes: i64,
    ) -> Result<()> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        if items == 0 && bytes == 0 {
            return Ok(());
        }

        sqlx::query(
            "UPDATE folders SET total_items = MAX(total_items + ?, 0),
                                storage_used = MAX(storage_used + ?, 0),
                                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(items)
        .bind(bytes)
        .bind(folder_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Delete folders by ID on the given connection.
    pub async fn delete_many(conn: &mut SqliteConnection, owner_id: i64, ids: &[i64]) -> Result<u64> {
        let mut deleted = 0;
        for chunk in ids.chunks(MAX_BATCH_SIZE) {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM folders WHERE owner_id = ");
            query.push_bind(owner_id);
            query.push(" AND id IN ");
            push_id_list(&mut query, chunk);
            deleted += query.build().execute(&mut *conn).await?.rows_affected();
        }
        Ok(deleted)
    }

    /// Set the privacy flag on folders and on the files directly inside them.
    pub async fn set_private_many(
        conn: &mut SqliteConnection,
        owner_id: i64,
        ids: &[i64],
        is_private: bool,
    ) -> Result<u64> {
        let mut files = 0;
        for chunk in ids.chunks(MAX_BATCH_SIZE) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "UPDATE folders SET updated_at = datetime('now'), is_private = ",
            );
            query.push_bind(is_private);
            query.push(" WHERE owner_id = ");
            query.push_bind(owner_id);
            query.push(" AND id IN ");
            push_id_list(&mut query, chunk);
            query.build().execute(&mut *conn).await?;

            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "UPDATE files SET updated_at = datetime('now'), is_private = ",
            );
            query.push_bind(is_private);
            query.push(" WHERE owner_id = ");
            query.push_bind(owner_id);
            query.push(" AND folder_id IN ");
            push_id_list(&mut query, chunk);
            files += query.build().execute(&mut *conn).await?.rows_affected();
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("alice"))
            .await
            .unwrap();
        (db, user.id)
    }

    #[test]
    fn test_new_folder_builder() {
        let folder = NewFolder::new("Work").with_parent(3).private(true);
        assert_eq!(folder.name, "Work");
        assert_eq!(folder.parent_id, Some(3));
        assert!(folder.is_private);
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(uid, &NewFolder::new("Work")).await.unwrap();
        assert_eq!(folder.name, "Work");
        assert_eq!(folder.owner_id, uid);
        assert!(folder.parent_id.is_none());
        assert_eq!(folder.total_items, 0);
        assert_eq!(folder.storage_used, 0);

        assert!(repo.get(folder.id, uid + 1).await.unwrap().is_none());
        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(
            FolderRepository::owner_of(&mut conn, folder.id).await.unwrap(),
            Some(uid)
        );
        assert_eq!(FolderRepository::owner_of(&mut conn, 999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unique_index_reports_conflict() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());

        repo.create(uid, &NewFolder::new("Work")).await.unwrap();
        let result = repo.create(uid, &NewFolder::new("Work")).await;
        assert!(matches!(result, Err(JotterError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_name_taken() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create(uid, &NewFolder::new("Work")).await.unwrap();
        let child = repo
            .create(uid, &NewFolder::new("Docs").with_parent(root.id))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let conn = &mut *conn;
        assert!(FolderRepository::name_taken(conn, uid, None, "Work", None)
            .await
            .unwrap());
        assert!(!FolderRepository::name_taken(conn, uid, None, "Docs", None)
            .await
            .unwrap());
        assert!(FolderRepository::name_taken(conn, uid, Some(root.id), "Docs", None)
            .await
            .unwrap());
        assert!(
            !FolderRepository::name_taken(conn, uid, Some(root.id), "Docs", Some(child.id))
                .await
                .unwrap()
        );
        assert!(!FolderRepository::name_taken(conn, uid + 1, None, "Work", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_sorted_and_private_filter() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());

        repo.create(uid, &NewFolder::new("beta")).await.unwrap();
        repo.create(uid, &NewFolder::new("Alpha")).await.unwrap();
        repo.create(uid, &NewFolder::new("secret").private(true))
            .await
            .unwrap();

        let names: Vec<_> = repo
            .list(uid, None, false)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert_eq!(repo.list(uid, None, true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_child_ids_and_parent_of() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let a = repo.create(uid, &NewFolder::new("a")).await.unwrap();
        let b = repo
            .create(uid, &NewFolder::new("b").with_parent(a.id))
            .await
            .unwrap();
        let c = repo
            .create(uid, &NewFolder::new("c").with_parent(a.id))
            .await
            .unwrap();

        let mut children = repo.child_ids(uid, &[a.id]).await.unwrap();
        children.sort();
        assert_eq!(children, vec![b.id, c.id]);
        assert!(repo.child_ids(uid, &[]).await.unwrap().is_empty());

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(
            FolderRepository::parent_of(&mut conn, b.id, uid).await.unwrap(),
            Some(Some(a.id))
        );
        assert_eq!(
            FolderRepository::parent_of(&mut conn, a.id, uid).await.unwrap(),
            Some(None)
        );
        assert_eq!(FolderRepository::parent_of(&mut conn, 999, uid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_adjust_counters_clamps() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());
        let folder = repo.create(uid, &NewFolder::new("Work")).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        FolderRepository::adjust_counters(&mut conn, Some(folder.id), 1, 1000)
            .await
            .unwrap();
        FolderRepository::adjust_counters(&mut conn, Some(folder.id), -5, -5000)
            .await
            .unwrap();
        FolderRepository::adjust_counters(&mut conn, None, 1, 1)
            .await
            .unwrap();
        drop(conn);

        let folder = repo.require(folder.id, uid).await.unwrap();
        assert_eq!(folder.total_items, 0);
        assert_eq!(folder.storage_used, 0);
    }

    #[tokio::test]
    async fn test_search() {
        let (db, uid) = setup().await;
        let repo = FolderRepository::new(db.pool());

        repo.create(uid, &NewFolder::new("Project_X")).await.unwrap();
        repo.create(uid, &NewFolder::new("ProjectY")).await.unwrap();

        assert_eq!(repo.search(uid, "project", 50).await.unwrap().len(), 2);
        assert_eq!(repo.search(uid, "t_x", 50).await.unwrap().len(), 1);
    }
}
