//! Folder hierarchy operations.
//!
//! [`FolderTree`] enforces the rules the repository cannot express in SQL
//! alone: ownership of parents, acyclic moves, subtree deletion and the
//! privacy cascade.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info};

use super::folder::{Folder, FolderRepository, NewFolder};
use super::record::{FileRecord, FileRepository};
use super::storage::BlobStore;
use super::validate_folder_name;
use crate::activity::{ActivityAction, ActivityLog, ResourceType};
use crate::auth::require_pin;
use crate::db::begin_write;
use crate::quota::QuotaLedger;
use crate::{JotterError, Result};

/// Upper bound on parent-chain walks. Reaching it means the stored
/// hierarchy is corrupt.
const MAX_ANCESTOR_STEPS: usize = 10_000;

/// One step of a breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub id: i64,
    pub name: String,
}

/// What a folder deletion removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSubtree {
    pub folders: u64,
    pub files: u64,
    pub bytes_freed: i64,
}

/// A folder with its direct children.
#[derive(Debug, Clone, Serialize)]
pub struct FolderContents {
    pub folder: Folder,
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}

/// Folder hierarchy service.
pub struct FolderTree<'a> {
    pool: &'a SqlitePool,
    blobs: &'a dyn BlobStore,
}

impl<'a> FolderTree<'a> {
    /// Create a new FolderTree.
    pub fn new(pool: &'a SqlitePool, blobs: &'a dyn BlobStore) -> Self {
        Self { pool, blobs }
    }

    fn folders(&self) -> FolderRepository<'a> {
        FolderRepository::new(self.pool)
    }

    /// Check that `parent_id` exists and belongs to `owner_id`.
    async fn check_parent(conn: &mut SqliteConnection, parent_id: i64, owner_id: i64) -> Result<()> {
        match FolderRepository::owner_of(conn, parent_id).await? {
            None => Err(JotterError::NotFound("parent folder".to_string())),
            Some(owner) if owner != owner_id => Err(JotterError::Forbidden(
                "parent folder belongs to another user".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Create a folder.
    ///
    /// Private folders require the owner to have a PIN set.
    pub async fn create_folder(&self, owner_id: i64, folder: NewFolder) -> Result<Folder> {
        let name = validate_folder_name(&folder.name)?;
        let mut conn = self.pool.acquire().await?;
        if let Some(parent_id) = folder.parent_id {
            Self::check_parent(&mut conn, parent_id, owner_id).await?;
        }
        if FolderRepository::name_taken(&mut conn, owner_id, folder.parent_id, &name, None).await? {
            return Err(JotterError::Conflict(format!(
                "a folder named '{name}' already exists here"
            )));
        }
        drop(conn);
        if folder.is_private {
            require_pin(self.pool, owner_id).await?;
        }

        let created = self.folders().create(owner_id, &NewFolder { name, ..folder }).await?;
        info!(
            owner_id,
            folder_id = created.id,
            parent_id = ?created.parent_id,
            "Folder created"
        );

        ActivityLog::new(self.pool)
            .record(
                owner_id,
                ActivityAction::Created,
                ResourceType::Folder,
                created.id,
                &created.name,
            )
            .await;
        Ok(created)
    }

    /// Get a folder owned by `owner_id`.
    pub async fn get_folder(&self, id: i64, owner_id: i64) -> Result<Folder> {
        self.folders().require(id, owner_id).await
    }

    /// Folders under `parent_id` (roots when `None`).
    ///
    /// Private folders are skipped unless `include_private` is set.
    pub async fn list_folders(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        include_private: bool,
    ) -> Result<Vec<Folder>> {
        let repo = self.folders();
        if let Some(parent_id) = parent_id {
            repo.require(parent_id, owner_id).await?;
        }
        repo.list(owner_id, parent_id, include_private).await
    }

    /// A folder with its direct subfolders and files.
    pub async fn children(&self, id: i64, owner_id: i64) -> Result<FolderContents> {
        let repo = self.folders();
        let folder = repo.require(id, owner_id).await?;
        let folders = repo.list(owner_id, Some(id), true).await?;
        let files = FileRepository::new(self.pool)
            .list_in_folder(id, owner_id)
            .await?;

        Ok(FolderContents {
            folder,
            folders,
            files,
        })
    }

    /// Rename a folder. Names stay unique among siblings.
    pub async fn rename_folder(&self, id: i64, owner_id: i64, name: &str) -> Result<Folder> {
        let repo = self.folders();
        let folder = repo.require(id, owner_id).await?;
        let name = validate_folder_name(name)?;
        if name == folder.name {
            return Ok(folder);
        }

        let mut conn = self.pool.acquire().await?;
        let taken =
            FolderRepository::name_taken(&mut conn, owner_id, folder.parent_id, &name, Some(id))
                .await?;
        drop(conn);
        if taken {
            return Err(JotterError::Conflict(format!(
                "a folder named '{name}' already exists here"
            )));
        }
        repo.rename(id, owner_id, &name).await?;

        ActivityLog::new(self.pool)
            .record(
                owner_id,
                ActivityAction::Updated,
                ResourceType::Folder,
                id,
                &name,
            )
            .await;
        repo.require(id, owner_id).await
    }

    /// Move a folder under `new_parent` (or to the root).
    ///
    /// Rejects moves into the folder itself or any of its descendants. The
    /// ancestor walk and the re-parenting commit in one write transaction,
    /// so concurrent moves cannot combine into a cycle.
    pub async fn move_folder(
        &self,
        id: i64,
        owner_id: i64,
        new_parent: Option<i64>,
    ) -> Result<Folder> {
        let mut tx = begin_write(self.pool).await?;
        let folder = FolderRepository::get_in(&mut tx, id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("folder".to_string()))?;

        if let Some(target) = new_parent {
            match FolderRepository::owner_of(&mut tx, target).await? {
                None => return Err(JotterError::NotFound("target folder".to_string())),
                Some(owner) if owner != owner_id => {
                    return Err(JotterError::Forbidden(
                        "target folder belongs to another user".to_string(),
                    ))
                }
                Some(_) => {}
            }
            if target == id {
                return Err(JotterError::InvalidMove(
                    "cannot move a folder into itself".to_string(),
                ));
            }
            Self::ensure_not_descendant(&mut tx, id, target, owner_id).await?;
        }

        if new_parent == folder.parent_id {
            return Ok(folder);
        }
        if FolderRepository::name_taken(&mut tx, owner_id, new_parent, &folder.name, Some(id))
            .await?
        {
            return Err(JotterError::Conflict(format!(
                "a folder named '{}' already exists in the target",
                folder.name
            )));
        }

        FolderRepository::set_parent(&mut tx, id, owner_id, new_parent).await?;
        let moved = FolderRepository::get_in(&mut tx, id, owner_id)
            .await?
            .ok_or_else(|| JotterError::NotFound("folder".to_string()))?;
        tx.commit().await?;
        info!(owner_id, folder_id = id, new_parent = ?new_parent, "Folder moved");

        ActivityLog::new(self.pool)
            .record(
                owner_id,
                ActivityAction::Moved,
                ResourceType::Folder,
                id,
                &folder.name,
            )
            .await;
        Ok(moved)
    }

    /// Walk up from `target` and fail if `id` is one of its ancestors.
    async fn ensure_not_descendant(
        conn: &mut SqliteConnection,
        id: i64,
        target: i64,
        owner_id: i64,
    ) -> Result<()> {
        let mut visited = HashSet::new();
        let mut current = Some(target);

        while let Some(folder_id) = current {
            if folder_id == id {
                return Err(JotterError::InvalidMove(
                    "cannot move a folder into its own subtree".to_string(),
                ));
            }
            if !visited.insert(folder_id) || visited.len() > MAX_ANCESTOR_STEPS {
                error!(owner_id, folder_id, "Folder hierarchy contains a cycle");
                return Err(JotterError::InvalidMove(
                    "folder hierarchy is corrupt".to_string(),
                ));
            }
            current = FolderRepository::parent_of(conn, folder_id, owner_id)
                .await?
                .flatten();
        }
        Ok(())
    }

    /// Folder IDs of the subtree rooted at `root`, one level per entry.
    async fn subtree_levels(&self, root: i64, owner_id: i64) -> Result<Vec<Vec<i64>>> {
        let repo = self.folders();
        let mut seen = HashSet::from([root]);
        let mut levels = vec![vec![root]];
        let mut frontier = vec![root];

        loop {
            let next: Vec<i64> = repo
                .child_ids(owner_id, &frontier)
                .await?
                .into_iter()
                .filter(|child| seen.insert(*child))
                .collect();
            if next.is_empty() {
                break;
            }
            levels.push(next.clone());
            frontier = next;
        }
        Ok(levels)
    }

    /// Delete a folder with every descendant folder and file.
    ///
    /// Records and the quota change commit together; blobs are removed
    /// afterwards and removal failures only get logged.
    pub async fn delete_folder(&self, id: i64, owner_id: i64) -> Result<DeletedSubtree> {
        let folder = self.folders().require(id, owner_id).await?;
        let levels = self.subtree_levels(id, owner_id).await?;
        let all_ids: Vec<i64> = levels.iter().flatten().copied().collect();

        let mut tx = self.pool.begin().await?;
        let files = FileRepository::delete_in_folders(&mut tx, owner_id, &all_ids).await?;
        let bytes_freed: i64 = files.iter().map(|(size, _)| *size).sum();
        QuotaLedger::commit_in(&mut tx, owner_id, -bytes_freed).await?;

        let mut folders = 0;
        for level in levels.iter().rev() {
            folders += FolderRepository::delete_many(&mut tx, owner_id, level).await?;
        }
        tx.commit().await?;

        for path in files.iter().filter_map(|(_, path)| path.as_deref()) {
            if let Err(e) = self.blobs.delete(path) {
                error!(owner_id, blob = path, "Failed to delete blob: {}", e);
            }
        }

        let deleted = DeletedSubtree {
            folders,
            files: files.len() as u64,
            bytes_freed,
        };
        info!(
            owner_id,
            folder_id = id,
            folders = deleted.folders,
            files = deleted.files,
            bytes_freed,
            "Folder subtree deleted"
        );

        ActivityLog::new(self.pool)
            .record(
                owner_id,
                ActivityAction::Deleted,
                ResourceType::Folder,
                id,
                &folder.name,
            )
            .await;
        Ok(deleted)
    }

    /// Flip the privacy of a folder and cascade it to the whole subtree.
    ///
    /// Returns the new value. Going private requires a PIN.
    pub async fn toggle_private(&self, id: i64, owner_id: i64) -> Result<bool> {
        let folder = self.folders().require(id, owner_id).await?;
        let is_private = !folder.is_private;
        if is_private {
            require_pin(self.pool, owner_id).await?;
        }

        let ids: Vec<i64> = self
            .subtree_levels(id, owner_id)
            .await?
            .into_iter()
            .flatten()
            .collect();

        let mut tx = self.pool.begin().await?;
        let files = FolderRepository::set_private_many(&mut tx, owner_id, &ids, is_private).await?;
        tx.commit().await?;

        info!(
            owner_id,
            folder_id = id,
            is_private,
            folders = ids.len(),
            files,
            "Folder privacy changed"
        );

        ActivityLog::new(self.pool)
            .record(
                owner_id,
                ActivityAction::Updated,
                ResourceType::Folder,
                id,
                &folder.name,
            )
            .await;
        Ok(is_private)
    }

    /// Path from the root down to the folder.
    pub async fn breadcrumb(&self, id: i64, owner_id: i64) -> Result<Vec<Crumb>> {
        let repo = self.folders();
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(repo.require(id, owner_id).await?);

        while let Some(folder) = current {
            if !visited.insert(folder.id) || visited.len() > MAX_ANCESTOR_STEPS {
                error!(owner_id, folder_id = folder.id, "Folder hierarchy contains a cycle");
                break;
            }
            current = match folder.parent_id {
                Some(parent_id) => repo.get(parent_id, owner_id).await?,
                None => None,
            };
            path.push(Crumb {
                id: folder.id,
                name: folder.name,
            });
        }

        path.reverse();
        Ok(path)
    }
}
