//! User model for Jotter.
//!
//! A user owns folders and files and carries the storage quota counters.

use serde::Serialize;

/// Default storage limit for new accounts (15 GB).
pub const DEFAULT_STORAGE_LIMIT: i64 = 15_728_640_000;

/// Allowed range for the `items_per_page` setting.
pub const ITEMS_PER_PAGE_RANGE: std::ops::RangeInclusive<i64> = 10..=100;

/// User entity representing a registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique).
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Storage limit in bytes.
    pub storage_limit: i64,
    /// Bytes currently used by live files.
    pub used_storage: i64,
    /// Argon2 hash of the private-space PIN.
    pub pin_hash: Option<String>,
    /// Whether new items default to private.
    pub default_private: bool,
    /// Preferred page size for listings.
    pub items_per_page: i64,
    /// Account creation timestamp.
    pub created_at: String,
}

impl User {
    /// Bytes still available before the limit is reached.
    pub fn available_storage(&self) -> i64 {
        (self.storage_limit - self.used_storage).max(0)
    }

    /// Whether a private-space PIN has been configured.
    pub fn has_pin(&self) -> bool {
        self.pin_hash.is_some()
    }

    /// Current user settings.
    pub fn settings(&self) -> UserSettings {
        UserSettings {
            default_private: self.default_private,
            items_per_page: self.items_per_page,
        }
    }
}

/// Per-user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserSettings {
    /// Whether new items default to private.
    pub default_private: bool,
    /// Preferred page size, clamped to 10..=100.
    pub items_per_page: i64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_private: false,
            items_per_page: 20,
        }
    }
}

impl UserSettings {
    /// Clamp the page size into the allowed range.
    pub fn normalized(mut self) -> Self {
        self.items_per_page = self
            .items_per_page
            .clamp(*ITEMS_PER_PAGE_RANGE.start(), *ITEMS_PER_PAGE_RANGE.end());
        self
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Storage limit in bytes.
    pub storage_limit: i64,
}

impl NewUser {
    /// Create a new user with the default storage limit.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            storage_limit: DEFAULT_STORAGE_LIMIT,
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the storage limit.
    pub fn with_storage_limit(mut self, limit: i64) -> Self {
        self.storage_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            email: None,
            storage_limit: 1000,
            used_storage: 900,
            pin_hash: None,
            default_private: false,
            items_per_page: 20,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_new_user_builder() {
        let user = NewUser::new("alice")
            .with_email("alice@example.com")
            .with_storage_limit(1000);

        assert_eq!(user.username, "alice");
        assert_eq!(user.email, Some("alice@example.com".to_string()));
        assert_eq!(user.storage_limit, 1000);
    }

    #[test]
    fn test_new_user_default_limit() {
        assert_eq!(NewUser::new("bob").storage_limit, DEFAULT_STORAGE_LIMIT);
    }

    #[test]
    fn test_available_storage() {
        let mut user = sample_user();
        assert_eq!(user.available_storage(), 100);

        user.used_storage = 1200;
        assert_eq!(user.available_storage(), 0);
    }

    #[test]
    fn test_has_pin() {
        let mut user = sample_user();
        assert!(!user.has_pin());
        user.pin_hash = Some("$argon2id$...".to_string());
        assert!(user.has_pin());
    }

    #[test]
    fn test_settings_normalized() {
        let s = UserSettings {
            default_private: true,
            items_per_page: 500,
        }
        .normalized();
        assert_eq!(s.items_per_page, 100);

        let s = UserSettings {
            default_private: false,
            items_per_page: 1,
        }
        .normalized();
        assert_eq!(s.items_per_page, 10);
        assert_eq!(UserSettings::default().items_per_page, 20);
    }
}
