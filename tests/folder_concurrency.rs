//! Concurrency tests for folder moves.

use std::sync::Arc;

use tempfile::TempDir;

use jotter::db::{NewUser, UserRepository};
use jotter::file::NewFolder;
use jotter::{Database, FileStorage, FolderTree, JotterError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cross_moves_never_form_a_cycle() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("jotter.db"), 4).await.unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().join("blobs")).unwrap());
    let user_id = UserRepository::new(db.pool())
        .create(&NewUser::new("alice"))
        .await
        .unwrap()
        .id;

    for round in 0..20 {
        let tree = FolderTree::new(db.pool(), &*storage);
        let a = tree
            .create_folder(user_id, NewFolder::new(format!("a{round}")))
            .await
            .unwrap();
        let b = tree
            .create_folder(user_id, NewFolder::new(format!("b{round}")))
            .await
            .unwrap();

        let spawn_move = |id: i64, target: i64| {
            let db = db.clone();
            let storage = storage.clone();
            tokio::spawn(async move {
                FolderTree::new(db.pool(), &*storage)
                    .move_folder(id, user_id, Some(target))
                    .await
            })
        };
        let first = spawn_move(a.id, b.id);
        let second = spawn_move(b.id, a.id);
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert!(
            first.is_ok() != second.is_ok(),
            "round {round}: exactly one move must win"
        );
        for result in [first, second] {
            match result {
                Ok(_) | Err(JotterError::InvalidMove(_)) => {}
                Err(e) => panic!("round {round}: unexpected error: {e}"),
            }
        }

        let a = tree.get_folder(a.id, user_id).await.unwrap();
        let b = tree.get_folder(b.id, user_id).await.unwrap();
        assert!(
            !(a.parent_id == Some(b.id) && b.parent_id == Some(a.id)),
            "round {round}: folders became each other's parent"
        );
    }
}
