//! Database schema and migrations for Jotter.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded. The schema_version table tracks which ones have been applied.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Users with storage accounting
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE,
    email           TEXT,
    storage_limit   INTEGER NOT NULL DEFAULT 15728640000,
    used_storage    INTEGER NOT NULL DEFAULT 0 CHECK (used_storage >= 0),
    pin_hash        TEXT,                              -- Argon2 hash, NULL when unset
    default_private INTEGER NOT NULL DEFAULT 0,
    items_per_page  INTEGER NOT NULL DEFAULT 20,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: Folder tree
    r#"
CREATE TABLE folders (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    owner_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id     INTEGER REFERENCES folders(id),      -- NULL for root folders
    is_private    INTEGER NOT NULL DEFAULT 0,
    total_items   INTEGER NOT NULL DEFAULT 0,          -- direct file children
    storage_used  INTEGER NOT NULL DEFAULT 0,          -- sum of direct file sizes
    created_at    TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_owner_id ON folders(owner_id);
CREATE INDEX idx_folders_parent_id ON folders(parent_id);
CREATE UNIQUE INDEX idx_folders_sibling_name
    ON folders(owner_id, COALESCE(parent_id, 0), name);
"#,
    // v3: File records
    r#"
CREATE TABLE files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    kind          TEXT NOT NULL CHECK (kind IN ('note', 'image', 'pdf')),
    title         TEXT NOT NULL,
    owner_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    folder_id     INTEGER REFERENCES folders(id),
    filename      TEXT,                                -- original upload name
    file_path     TEXT,                                -- stored blob name, NULL for notes
    file_size     INTEGER NOT NULL DEFAULT 0,
    is_private    INTEGER NOT NULL DEFAULT 0,
    is_favorite   INTEGER NOT NULL DEFAULT 0,
    tags          TEXT NOT NULL DEFAULT '[]',          -- JSON array
    payload       TEXT NOT NULL,                       -- JSON, tagged by kind
    created_at    TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_files_owner_id ON files(owner_id);
CREATE INDEX idx_files_folder_id ON files(folder_id);
CREATE INDEX idx_files_kind ON files(kind);
CREATE INDEX idx_files_created_at ON files(created_at);
"#,
    // v4: Activity log
    r#"
CREATE TABLE activities (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    action          TEXT NOT NULL,
    resource_type   TEXT NOT NULL,
    resource_id     INTEGER NOT NULL,
    resource_title  TEXT NOT NULL,
    timestamp       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_activities_user_timestamp ON activities(user_id, timestamp);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_valid_sql() {
        assert!(!MIGRATIONS.is_empty());
        for migration in MIGRATIONS {
            assert!(!migration.trim().is_empty());
            assert!(migration.contains("CREATE TABLE") || migration.contains("ALTER TABLE"));
        }
    }

    #[test]
    fn test_folders_migration_has_sibling_index() {
        let folders = MIGRATIONS[1];
        assert!(folders.contains("CREATE TABLE folders"));
        assert!(folders.contains("idx_folders_sibling_name"));
        assert!(folders.contains("COALESCE(parent_id, 0)"));
    }

    #[test]
    fn test_files_migration_restricts_kind() {
        let files = MIGRATIONS[2];
        assert!(files.contains("CREATE TABLE files"));
        assert!(files.contains("'note', 'image', 'pdf'"));
        assert!(files.contains("file_size"));
        assert!(files.contains("payload"));
    }
}
