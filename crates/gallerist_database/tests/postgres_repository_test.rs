//! Tests for the PostgreSQL media repository.
//!
//! These tests require a PostgreSQL database at DATABASE_URL. Migrations are
//! applied on first use.
//!
//! Run with: cargo test --package gallerist_database --features postgres-tests

#![cfg(feature = "postgres-tests")]

use chrono::Utc;
use gallerist_core::{GroupId, MediaId, MediaKind, MediaRecord, Metadata, UserId};
use gallerist_database::{
    MediaRepository, PostgresMediaRepository, establish_pool_from_env, run_migrations,
};
use tokio_util::sync::CancellationToken;

fn repository() -> PostgresMediaRepository {
    let _ = dotenvy::dotenv();
    let pool = establish_pool_from_env(16).expect("DATABASE_URL must point at PostgreSQL");
    run_migrations(&pool).expect("Migrations should apply");
    PostgresMediaRepository::new(pool)
}

fn photo(uploader: UserId) -> MediaRecord {
    let id = MediaId::generate();
    MediaRecord {
        id,
        uploader_id: uploader,
        created_at: Utc::now(),
        kind: MediaKind::Photo,
        filename: "harbor.png".to_string(),
        storage_path: format!("{}/{}.png", uploader, id),
        size_bytes: 100,
        mime_type: "image/png".to_string(),
        width: Some(32),
        height: Some(32),
        duration_seconds: None,
        is_public: true,
        metadata: Metadata::from_value(&serde_json::json!({ "camera": "x100" })),
    }
}

#[tokio::test]
async fn test_create_find_round_trip() {
    let repo = repository();
    let cancel = CancellationToken::new();
    let record = photo(UserId::generate());

    repo.create_media(&record, &cancel).await.unwrap();
    let found = repo.find_by_id(record.id, &cancel).await.unwrap();

    assert_eq!(found.id, record.id);
    assert_eq!(found.metadata.to_value().unwrap()["camera"], "x100");
}

#[tokio::test]
async fn test_find_missing_is_not_found() {
    let repo = repository();
    let err = repo
        .find_by_id(MediaId::generate(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_batch_with_duplicate_path_commits_nothing() {
    let repo = repository();
    let cancel = CancellationToken::new();
    let uploader = UserId::generate();
    let first = photo(uploader);
    let mut clash = photo(uploader);
    clash.storage_path = first.storage_path.clone();

    assert!(
        repo.create_multiple_media(&[first.clone(), clash], &cancel)
            .await
            .is_err()
    );
    assert!(repo.find_by_id(first.id, &cancel).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_attach_then_reattach() {
    let repo = repository();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let a = repo.create_media(&photo(owner), &cancel).await.unwrap();
    let b = repo.create_media(&photo(owner), &cancel).await.unwrap();
    let group = repo.add_media_group(owner, "album", &cancel).await.unwrap();

    repo.add_media_group_items(group.id, &[a.id, b.id], &cancel)
        .await
        .unwrap();
    let again = repo
        .add_media_group_items(group.id, &[b.id], &cancel)
        .await
        .unwrap();
    assert!(again.is_empty());

    let items = repo.get_group_items(group.id, &cancel).await.unwrap();
    let positions: Vec<_> = items.iter().map(|i| (i.media_id, i.position)).collect();
    assert_eq!(positions, vec![(a.id, 1), (b.id, 2)]);

    let members = repo.get_media_by_group_id(group.id, &cancel).await.unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_referential_rejection() {
    let repo = repository();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let a = repo.create_media(&photo(owner), &cancel).await.unwrap();
    let group = repo.add_media_group(owner, "", &cancel).await.unwrap();

    let err = repo
        .add_media_group_items(group.id, &[a.id, MediaId::generate()], &cancel)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(repo.get_group_items(group.id, &cancel).await.unwrap().is_empty());

    let err = repo
        .add_media_group_items(GroupId::generate(), &[a.id], &cancel)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attach_positions_are_a_permutation() {
    let repo = repository();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let group = repo.add_media_group(owner, "", &cancel).await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(repo.create_media(&photo(owner), &cancel).await.unwrap().id);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.add_media_group_items(group.id, &[id], &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut positions: Vec<i32> = repo
        .get_group_items(group.id, &cancel)
        .await
        .unwrap()
        .iter()
        .map(|i| i.position)
        .collect();
    positions.sort();
    assert_eq!(positions, (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let repo = repository();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let record = photo(UserId::generate());

    let err = repo.create_media(&record, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(
        repo.find_by_id(record.id, &CancellationToken::new())
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_all_images_respects_limit() {
    let repo = repository();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    repo.create_multiple_media(&[photo(owner), photo(owner)], &cancel)
        .await
        .unwrap();

    let page = repo.get_all_images(Some(1), &cancel).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.total >= 2);
}
