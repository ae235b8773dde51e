//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use tempfile::TempDir;

use jotter::db::{NewUser, UserRepository};
use jotter::web::handlers::AppState;
use jotter::web::middleware::{JwtClaims, JwtState};
use jotter::web::router::create_router;
use jotter::{Database, FileStorage};

/// Secret shared by the server and the token helper.
pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";

/// Upload size limit used by test servers.
pub const MAX_UPLOAD_SIZE: u64 = 1024 * 1024;

/// Smallest PNG header `image_info` accepts (1x1, RGBA).
pub const PNG_1X1: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0, 0,
    1, 0, 0, 0, 1, 8, 6, 0, 0, 0,
];

/// A test server over an in-memory database and a temporary blob directory.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub storage_dir: TempDir,
}

impl TestApp {
    /// Create a test server with an in-memory database.
    pub async fn new() -> Self {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let storage_dir = TempDir::new().expect("Failed to create storage dir");
        let storage = FileStorage::new(storage_dir.path()).expect("Failed to create storage");

        let app_state = Arc::new(AppState::new(db.clone(), storage, MAX_UPLOAD_SIZE));
        let jwt_state = Arc::new(JwtState::new(JWT_SECRET));
        let router = create_router(app_state, jwt_state, &[]);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            db,
            storage_dir,
        }
    }

    /// Create a user with the given storage limit and return its ID.
    pub async fn create_user(&self, username: &str, storage_limit: i64) -> i64 {
        UserRepository::new(self.db.pool())
            .create(&NewUser::new(username).with_storage_limit(storage_limit))
            .await
            .expect("Failed to create user")
            .id
    }

    /// Number of blobs currently on disk.
    pub fn blob_count(&self) -> usize {
        count_files(self.storage_dir.path())
    }
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// Issue a bearer header value for the given user.
pub fn bearer(user_id: i64) -> String {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = JwtClaims {
        sub: user_id,
        exp: now + 3600,
        iat: now,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode token");
    format!("Bearer {token}")
}
