//! Concurrency tests for the storage quota.

use std::sync::Arc;

use tempfile::TempDir;

use jotter::db::{NewUser, UserRepository};
use jotter::file::{FilePatch, NewNote};
use jotter::{Database, FileService, FileStorage, JotterError, QuotaLedger};

async fn setup(limit: i64) -> (Database, Arc<FileStorage>, i64, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("jotter.db"), 4).await.unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().join("blobs")).unwrap());
    let user = UserRepository::new(db.pool())
        .create(&NewUser::new("alice").with_storage_limit(limit))
        .await
        .unwrap();
    (db, storage, user.id, dir)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_notes_never_exceed_limit() {
    let (db, storage, user_id, _dir) = setup(100).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let db = db.clone();
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            let note = NewNote {
                title: format!("note {i}"),
                content: "x".repeat(20),
                ..Default::default()
            };
            FileService::new(db.pool(), &*storage)
                .create_note(user_id, note)
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(JotterError::StorageLimitExceeded { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(created, 5);
    let summary = QuotaLedger::new(db.pool()).summary(user_id).await.unwrap();
    assert_eq!(summary.used, 100);
    assert_eq!(summary.available, 0);
}

async fn live_bytes(db: &Database, user_id: i64) -> i64 {
    let (sum,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(file_size), 0) FROM files WHERE owner_id = ?")
            .bind(user_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    sum
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_keep_used_storage_exact() {
    let (db, storage, user_id, _dir) = setup(100_000).await;

    for round in 0..20 {
        let note = FileService::new(db.pool(), &*storage)
            .create_note(
                user_id,
                NewNote {
                    title: format!("note {round}"),
                    content: "x".repeat(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let spawn_edit = |len: usize| {
            let db = db.clone();
            let storage = storage.clone();
            tokio::spawn(async move {
                let patch = FilePatch {
                    content: Some("y".repeat(len)),
                    ..Default::default()
                };
                FileService::new(db.pool(), &*storage)
                    .update_file(note.id, user_id, patch)
                    .await
            })
        };
        let first = spawn_edit(100);
        let second = spawn_edit(50);
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let used = QuotaLedger::new(db.pool()).summary(user_id).await.unwrap().used;
        assert_eq!(used, live_bytes(&db, user_id).await, "round {round}");
    }
}

#[tokio::test]
async fn test_used_matches_live_files_after_mixed_operations() {
    let (db, storage, user_id, _dir) = setup(1000).await;
    let service = FileService::new(db.pool(), &*storage);

    let a = service
        .create_note(
            user_id,
            NewNote {
                title: "a".to_string(),
                content: "12345".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let b = service.duplicate_file(a.id, user_id).await.unwrap();
    service.delete_file(a.id, user_id).await.unwrap();
    assert_eq!(b.file_size, 5);

    let ledger = QuotaLedger::new(db.pool());
    let before = ledger.summary(user_id).await.unwrap().used;
    let recalculated = ledger.recalculate(user_id).await.unwrap();
    assert_eq!(before, 5);
    assert_eq!(recalculated, 5);
}
