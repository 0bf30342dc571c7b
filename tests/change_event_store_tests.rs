use chrono::{TimeZone, Utc};
use changefeed::config::DedupPolicy;
use changefeed::events::{
    CommitMetadata, EventDescription, EventKind, EventMetadata, NewChangeEvent, event_key,
    tagged_title,
};
use changefeed::repositories::{ChangeEventRepository, StageOutcome, TargetBatch};
use sea_orm::TransactionTrait;
use serde_json::json;
use uuid::Uuid;

mod test_utils;
use test_utils::{insert_connection, setup_test_db};

fn commit_event(connection_id: Uuid, sha: &str, message: &str, hour: u32) -> NewChangeEvent {
    NewChangeEvent {
        connection_id,
        source: "github".to_string(),
        kind: EventKind::Commit,
        event_id: event_key(EventKind::Commit, "octo/app", sha),
        title: tagged_title(EventKind::Commit, message),
        description: EventDescription::new(message, Vec::new()),
        author: "mona".to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap(),
        url: format!("https://github.com/octo/app/commit/{sha}"),
        status: "committed".to_string(),
        metadata: EventMetadata::Commit(CommitMetadata {
            repository: "octo/app".to_string(),
            branch: "main".to_string(),
            sha: sha.to_string(),
            additions: 1,
            deletions: 0,
            total_changes: 1,
        }),
    }
}

#[tokio::test]
async fn duplicate_key_leaves_existing_row_untouched() {
    let db = setup_test_db().await.unwrap();
    let connection = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();
    let repo = ChangeEventRepository::new(&db);

    let first = repo
        .upsert_if_absent(&commit_event(connection.id, "aaa", "First wording", 9))
        .await
        .unwrap();
    let second = repo
        .upsert_if_absent(&commit_event(connection.id, "aaa", "Second wording", 10))
        .await
        .unwrap();

    assert!(first.inserted);
    assert!(!second.inserted);

    let rows = repo.list_for_connection(connection.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "[Commit] First wording");
}

#[tokio::test]
async fn concurrent_inserts_of_one_key_store_a_single_row() {
    let db = setup_test_db().await.unwrap();
    let connection = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();
    let repo = ChangeEventRepository::new(&db);
    let left = commit_event(connection.id, "bbb", "Left", 9);
    let right = commit_event(connection.id, "bbb", "Right", 9);

    let (a, b) = tokio::join!(repo.upsert_if_absent(&left), repo.upsert_if_absent(&right));
    let inserted = [a.unwrap().inserted, b.unwrap().inserted];

    assert_eq!(inserted.iter().filter(|i| **i).count(), 1);
    assert_eq!(repo.count_for_connection(connection.id).await.unwrap(), 1);
}

#[tokio::test]
async fn same_event_id_is_independent_per_connection() {
    let db = setup_test_db().await.unwrap();
    let one = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();
    let two = insert_connection(&db, "github", json!({"token": "u"}), true)
        .await
        .unwrap();
    let repo = ChangeEventRepository::new(&db);

    assert!(repo.upsert_if_absent(&commit_event(one.id, "ccc", "x", 9)).await.unwrap().inserted);
    assert!(repo.upsert_if_absent(&commit_event(two.id, "ccc", "x", 9)).await.unwrap().inserted);
    assert!(repo.exists(one.id, "commit-octo/app-ccc").await.unwrap());
    assert!(repo.exists(two.id, "commit-octo/app-ccc").await.unwrap());
}

#[tokio::test]
async fn events_list_newest_first() {
    let db = setup_test_db().await.unwrap();
    let connection = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();
    let repo = ChangeEventRepository::new(&db);

    for (sha, hour) in [("old", 8), ("new", 12), ("mid", 10)] {
        repo.upsert_if_absent(&commit_event(connection.id, sha, sha, hour))
            .await
            .unwrap();
    }

    let shas: Vec<String> = repo
        .list_for_connection(connection.id)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.metadata["sha"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(shas, vec!["new", "mid", "old"]);
}

#[tokio::test]
async fn rolled_back_batch_discards_rows_but_keeps_fetched() {
    let db = setup_test_db().await.unwrap();
    let connection = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();

    let txn = db.begin().await.unwrap();
    let mut batch = TargetBatch::new(txn, connection.id, DedupPolicy::InsertOnly);
    batch.record_fetched();
    batch.record_fetched();
    assert_eq!(
        batch.stage(&commit_event(connection.id, "ddd", "a", 9)).await.unwrap(),
        StageOutcome::Inserted
    );
    assert_eq!(
        batch.stage(&commit_event(connection.id, "ddd", "a", 9)).await.unwrap(),
        StageOutcome::Duplicate
    );
    assert_eq!(batch.counts().stored, 1);

    let counts = batch.rollback().await.unwrap();
    assert_eq!(counts.fetched, 2);
    assert_eq!(counts.stored, 0);

    let repo = ChangeEventRepository::new(&db);
    assert_eq!(repo.count_for_connection(connection.id).await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_policy_rewrites_mutable_fields() {
    let db = setup_test_db().await.unwrap();
    let connection = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();
    let repo = ChangeEventRepository::new(&db);
    repo.upsert_if_absent(&commit_event(connection.id, "eee", "Before", 9))
        .await
        .unwrap();
    let original_id = repo.list_for_connection(connection.id).await.unwrap()[0].id;

    let txn = db.begin().await.unwrap();
    let mut batch = TargetBatch::new(txn, connection.id, DedupPolicy::Refresh);
    assert!(batch.needs_processing("commit-octo/app-eee").await.unwrap());
    assert_eq!(
        batch.stage(&commit_event(connection.id, "eee", "After", 11)).await.unwrap(),
        StageOutcome::Refreshed
    );
    let counts = batch.commit().await.unwrap();
    assert_eq!(counts.refreshed, 1);
    assert_eq!(counts.stored, 0);

    let rows = repo.list_for_connection(connection.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, original_id);
    assert_eq!(rows[0].title, "[Commit] After");
}

#[tokio::test]
async fn insert_only_batch_skips_known_events() {
    let db = setup_test_db().await.unwrap();
    let connection = insert_connection(&db, "github", json!({"token": "t"}), true)
        .await
        .unwrap();
    ChangeEventRepository::new(&db)
        .upsert_if_absent(&commit_event(connection.id, "fff", "known", 9))
        .await
        .unwrap();

    let txn = db.begin().await.unwrap();
    let batch = TargetBatch::new(txn, connection.id, DedupPolicy::InsertOnly);
    assert!(!batch.needs_processing("commit-octo/app-fff").await.unwrap());
    assert!(batch.needs_processing("commit-octo/app-new").await.unwrap());
    batch.rollback().await.unwrap();
}
