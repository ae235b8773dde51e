//! Activity log.
//!
//! Append-only audit trail of user mutations and views. Recording never
//! fails the calling operation: insert errors are logged and dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::{JotterError, Result};

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Viewed,
    Favorited,
    Moved,
}

impl ActivityAction {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Viewed => "viewed",
            ActivityAction::Favorited => "favorited",
            ActivityAction::Moved => "moved",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = JotterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(ActivityAction::Created),
            "updated" => Ok(ActivityAction::Updated),
            "deleted" => Ok(ActivityAction::Deleted),
            "viewed" => Ok(ActivityAction::Viewed),
            "favorited" => Ok(ActivityAction::Favorited),
            "moved" => Ok(ActivityAction::Moved),
            _ => Err(JotterError::Validation(format!("unknown action: {s}"))),
        }
    }
}

/// Kind of resource an activity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Folder,
    Note,
    Image,
    Pdf,
}

impl ResourceType {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Folder => "folder",
            ResourceType::Note => "note",
            ResourceType::Image => "image",
            ResourceType::Pdf => "pdf",
        }
    }
}

impl FromStr for ResourceType {
    type Err = JotterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "folder" => Ok(ResourceType::Folder),
            "note" => Ok(ResourceType::Note),
            "image" => Ok(ResourceType::Image),
            "pdf" => Ok(ResourceType::Pdf),
            _ => Err(JotterError::Validation(format!("unknown resource type: {s}"))),
        }
    }
}

/// A recorded activity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    pub action: ActivityAction,
    pub resource_type: ResourceType,
    pub resource_id: i64,
    pub resource_title: String,
    pub timestamp: String,
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    user_id: i64,
    action: String,
    resource_type: String,
    resource_id: i64,
    resource_title: String,
    timestamp: String,
}

impl ActivityRow {
    fn into_activity(self) -> Activity {
        Activity {
            id: self.id,
            user_id: self.user_id,
            action: self.action.parse().unwrap_or(ActivityAction::Viewed),
            resource_type: self.resource_type.parse().unwrap_or(ResourceType::Note),
            resource_id: self.resource_id,
            resource_title: self.resource_title,
            timestamp: self.timestamp,
        }
    }
}

const ACTIVITY_COLUMNS: &str =
    "id, user_id, action, resource_type, resource_id, resource_title, timestamp";

/// Owner-scoped access to the activity log.
pub struct ActivityLog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ActivityLog<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an activity. Failures are logged, never returned.
    pub async fn record(
        &self,
        user_id: i64,
        action: ActivityAction,
        resource_type: ResourceType,
        resource_id: i64,
        resource_title: &str,
    ) {
        let result = sqlx::query(
            "INSERT INTO activities (user_id, action, resource_type, resource_id, resource_title)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(action.as_str())
        .bind(resource_type.as_str())
        .bind(resource_id)
        .bind(resource_title)
        .execute(self.pool)
        .await;

        if let Err(e) = result {
            warn!(
                user_id,
                action = action.as_str(),
                resource_id,
                "Failed to record activity: {}",
                e
            );
        }
    }

    /// Most recent activities, newest first.
    pub async fn recent(&self, user_id: i64, limit: i64) -> Result<Vec<Activity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities
             WHERE user_id = ? ORDER BY timestamp DESC, id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivityRow::into_activity).collect())
    }

    /// Count of activities per action over the last `days` days.
    pub async fn stats(&self, user_id: i64, days: i64) -> Result<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT action, COUNT(*) FROM activities
             WHERE user_id = ? AND timestamp >= datetime('now', ?)
             GROUP BY action",
        )
        .bind(user_id)
        .bind(format!("-{} days", days.max(0)))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Activities on a given UTC day, newest first.
    pub async fn for_day(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Activity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities
             WHERE user_id = ? AND date(timestamp) = ?
             ORDER BY timestamp DESC, id DESC"
        ))
        .bind(user_id)
        .bind(day.format("%Y-%m-%d").to_string())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivityRow::into_activity).collect())
    }

    /// Delete activities older than `days` days. Returns the number removed.
    pub async fn clear_older_than(&self, user_id: i64, days: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM activities WHERE user_id = ? AND timestamp < datetime('now', ?)",
        )
        .bind(user_id)
        .bind(format!("-{} days", days.max(0)))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
