//! User repository for Jotter.
//!
//! This module provides CRUD operations for users in the database.

use sqlx::SqlitePool;

use super::user::{NewUser, User, UserSettings};
use crate::{JotterError, Result};

const USER_COLUMNS: &str = "id, username, email, storage_limit, used_storage, pin_hash,
                            default_private, items_per_page, created_at";

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Returns the created user with the assigned ID.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        if new_user.storage_limit < 0 {
            return Err(JotterError::Validation(
                "storage limit must not be negative".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO users (username, email, storage_limit) VALUES (?, ?, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(new_user.storage_limit)
        .execute(self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| JotterError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by ID, failing with `NotFound` if absent.
    pub async fn require(&self, id: i64) -> Result<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| JotterError::NotFound("user".to_string()))
    }

    /// Store (or clear) the PIN hash.
    ///
    /// Returns false if the user does not exist.
    pub async fn set_pin_hash(&self, id: i64, pin_hash: Option<&str>) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET pin_hash = ? WHERE id = ?")
            .bind(pin_hash)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check whether a PIN is configured. A missing user counts as no PIN.
    pub async fn has_pin_set(&self, id: i64) -> Result<bool> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT pin_hash FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(matches!(row, Some((Some(_),))))
    }

    /// Change the storage limit.
    pub async fn set_storage_limit(&self, id: i64, limit: i64) -> Result<bool> {
        if limit < 0 {
            return Err(JotterError::Validation(
                "storage limit must not be negative".to_string(),
            ));
        }
        let result = sqlx::query("UPDATE users SET storage_limit = ? WHERE id = ?")
            .bind(limit)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the user's settings.
    pub async fn update_settings(&self, id: i64, settings: UserSettings) -> Result<Option<User>> {
        let settings = settings.normalized();
        let result = sqlx::query(
            "UPDATE users SET default_private = ?, items_per_page = ? WHERE id = ?",
        )
        .bind(settings.default_private)
        .bind(settings.items_per_page)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a user by ID.
    ///
    /// Returns true if a user was deleted, false if not found.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
