//! Storage quota ledger.
//!
//! Tracks each user's `used_storage` against `storage_limit`. Growth is gated
//! twice: [`QuotaLedger::reserve`] is a cheap pre-check, and
//! [`QuotaLedger::commit_growth`] is the authoritative conditional increment
//! executed inside the caller's transaction. Shrinks always commit.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::db::UserRepository;
use crate::{JotterError, Result};

/// Summary of a user's storage usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSummary {
    /// Storage limit in bytes.
    pub total: i64,
    /// Bytes in use.
    pub used: i64,
    /// Bytes still available.
    pub available: i64,
    /// Usage as a percentage of the limit.
    pub percentage_used: f64,
}

/// Count and size of one category of stored items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageBucket {
    pub count: i64,
    pub size: i64,
}

/// Per-category breakdown of a user's storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageBreakdown {
    /// Folder count, and the bytes filed inside folders.
    pub folders: UsageBucket,
    pub notes: UsageBucket,
    pub images: UsageBucket,
    pub pdfs: UsageBucket,
}

/// Per-user byte accounting.
pub struct QuotaLedger<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuotaLedger<'a> {
    /// Create a new ledger over the given pool.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check whether `delta` more bytes fit under the user's limit.
    ///
    /// This is a read-then-decide check and does not lock anything.
    pub async fn reserve(&self, user_id: i64, delta: i64) -> Result<bool> {
        let user = UserRepository::new(self.pool).require(user_id).await?;
        Ok(delta <= 0 || user.used_storage + delta <= user.storage_limit)
    }

    /// Like [`reserve`](Self::reserve), but fails with `StorageLimitExceeded`.
    pub async fn ensure_room(&self, user_id: i64, delta: i64) -> Result<()> {
        let user = UserRepository::new(self.pool).require(user_id).await?;
        if delta > 0 && user.used_storage + delta > user.storage_limit {
            debug!(user_id, delta, "Quota pre-check rejected growth");
            return Err(JotterError::StorageLimitExceeded {
                requested: delta,
                available: user.available_storage(),
            });
        }
        Ok(())
    }

    /// Apply a signed delta to `used_storage`, clamping at zero.
    pub async fn commit(&self, user_id: i64, delta: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::commit_in(&mut conn, user_id, delta).await
    }

    /// Apply a signed delta on an existing connection or transaction.
    ///
    /// Never gated by the limit.
    pub async fn commit_in(conn: &mut SqliteConnection, user_id: i64, delta: i64) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET used_storage = MAX(used_storage + ?, 0) WHERE id = ?")
                .bind(delta)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(JotterError::NotFound("user".to_string()));
        }
        Ok(())
    }

    /// Atomically add `delta` bytes if they fit under the limit.
    ///
    /// Returns false when the growth was rejected, leaving the counter
    /// untouched. Non-positive deltas are committed unconditionally.
    pub async fn commit_growth(
        conn: &mut SqliteConnection,
        user_id: i64,
        delta: i64,
    ) -> Result<bool> {
        if delta <= 0 {
            Self::commit_in(conn, user_id, delta).await?;
            return Ok(true);
        }

        let result = sqlx::query(
            "UPDATE users SET used_storage = used_storage + ?
             WHERE id = ? AND used_storage + ? <= storage_limit",
        )
        .bind(delta)
        .bind(user_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(JotterError::NotFound("user".to_string())),
        }
    }

    /// [`commit_growth`](Self::commit_growth), failing with
    /// `StorageLimitExceeded` on rejection.
    pub async fn require_growth(conn: &mut SqliteConnection, user_id: i64, delta: i64) -> Result<()> {
        if Self::commit_growth(conn, user_id, delta).await? {
            return Ok(());
        }

        let (limit, used): (i64, i64) =
            sqlx::query_as("SELECT storage_limit, used_storage FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
        debug!(user_id, delta, "Quota commit rejected growth");
        Err(JotterError::StorageLimitExceeded {
            requested: delta,
            available: (limit - used).max(0),
        })
    }

    /// Storage summary for the user.
    pub async fn summary(&self, user_id: i64) -> Result<StorageSummary> {
        let user = UserRepository::new(self.pool).require(user_id).await?;

        let percentage_used = if user.storage_limit > 0 {
            user.used_storage as f64 / user.storage_limit as f64 * 100.0
        } else {
            0.0
        };

        Ok(StorageSummary {
            total: user.storage_limit,
            used: user.used_storage,
            available: user.available_storage(),
            percentage_used,
        })
    }

    /// Counts and sizes per item category.
    pub async fn breakdown(&self, user_id: i64) -> Result<StorageBreakdown> {
        UserRepository::new(self.pool).require(user_id).await?;

        let mut breakdown = StorageBreakdown::default();

        let (folder_count, folder_size): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(storage_used), 0) FROM folders WHERE owner_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        breakdown.folders = UsageBucket {
            count: folder_count,
            size: folder_size,
        };

        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*), COALESCE(SUM(file_size), 0)
             FROM files WHERE owner_id = ? GROUP BY kind",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        for (kind, count, size) in rows {
            let bucket = UsageBucket { count, size };
            match kind.as_str() {
                "note" => breakdown.notes = bucket,
                "image" => breakdown.images = bucket,
                "pdf" => breakdown.pdfs = bucket,
                _ => {}
            }
        }

        Ok(breakdown)
    }

    /// Recompute `used_storage` and the folder counters from live files.
    ///
    /// Returns the corrected `used_storage`.
    pub async fn recalculate(&self, user_id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE users SET used_storage =
                (SELECT COALESCE(SUM(file_size), 0) FROM files WHERE owner_id = users.id)
             WHERE id = ?",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(JotterError::NotFound("user".to_string()));
        }

        sqlx::query(
            "UPDATE folders SET
                total_items = (SELECT COUNT(*) FROM files WHERE folder_id = folders.id),
                storage_used = (SELECT COALESCE(SUM(file_size), 0) FROM files
                                WHERE folder_id = folders.id)
             WHERE owner_id = ?",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let (used,): (i64,) = sqlx::query_as("SELECT used_storage FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(user_id, used, "Recalculated storage usage");
        Ok(used)
    }
}
