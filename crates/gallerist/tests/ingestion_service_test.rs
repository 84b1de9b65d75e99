//! Tests for the media ingestion service.
//!
//! These run against the in-memory repository and a temp-dir blob store, with
//! failing wrappers to exercise compensation paths.

use async_trait::async_trait;
use gallerist::{
    BlobEntry, BlobStore, BlobUpload, DatabaseError, DatabaseErrorKind, FileSystemBlobStore,
    GalleristErrorKind, GalleristResult, GroupId, InMemoryMediaRepository, MediaGroup,
    MediaGroupItem, MediaId, MediaIngestionService, MediaKind, MediaPage, MediaRecord,
    MediaRepository, MediaUpdate, ReadCacheConfig, SavedBlob, StorageError, StorageErrorKind,
    UploadInput, UserId,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Misbehaviour injected by [`FaultyRepository`].
enum Fault {
    /// Every insert fails.
    FailInserts,
    /// `create_media` cancels the caller's token before delegating.
    CancelOnCreate,
    /// The first `get_all_images` reads, then parks until released.
    StallFirstListing {
        armed: AtomicBool,
        parked: Arc<Notify>,
        release: Arc<Notify>,
    },
}

/// In-memory repository with one injected fault.
struct FaultyRepository {
    inner: InMemoryMediaRepository,
    fault: Fault,
}

impl FaultyRepository {
    fn new(fault: Fault) -> Self {
        Self {
            inner: InMemoryMediaRepository::new(),
            fault,
        }
    }
}

fn injected() -> gallerist::GalleristError {
    DatabaseError::new(DatabaseErrorKind::Query("injected failure".to_string())).into()
}

#[async_trait]
impl MediaRepository for FaultyRepository {
    async fn create_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        match self.fault {
            Fault::FailInserts => Err(injected()),
            Fault::CancelOnCreate => {
                cancel.cancel();
                self.inner.create_media(record, cancel).await
            }
            Fault::StallFirstListing { .. } => self.inner.create_media(record, cancel).await,
        }
    }

    async fn create_multiple_media(
        &self,
        records: &[MediaRecord],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        match self.fault {
            Fault::FailInserts => Err(injected()),
            _ => self.inner.create_multiple_media(records, cancel).await,
        }
    }

    async fn update_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        self.inner.update_media(record, cancel).await
    }

    async fn find_by_id(
        &self,
        id: MediaId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        self.inner.find_by_id(id, cancel).await
    }

    async fn add_media_group(
        &self,
        owner_id: UserId,
        description: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        self.inner.add_media_group(owner_id, description, cancel).await
    }

    async fn get_group(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        self.inner.get_group(group_id, cancel).await
    }

    async fn add_media_group_items(
        &self,
        group_id: GroupId,
        media_ids: &[MediaId],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        self.inner
            .add_media_group_items(group_id, media_ids, cancel)
            .await
    }

    async fn get_group_items(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        self.inner.get_group_items(group_id, cancel).await
    }

    async fn get_media_by_group_id(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        self.inner.get_media_by_group_id(group_id, cancel).await
    }

    async fn get_all_images(
        &self,
        limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaPage> {
        let page = self.inner.get_all_images(limit, cancel).await?;
        if let Fault::StallFirstListing {
            armed,
            parked,
            release,
        } = &self.fault
            && armed.swap(false, Ordering::SeqCst)
        {
            parked.notify_one();
            release.notified().await;
        }
        Ok(page)
    }

    async fn existing_storage_paths(
        &self,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> GalleristResult<HashSet<String>> {
        self.inner.existing_storage_paths(paths, cancel).await
    }
}

/// Blob store whose deletes always fail.
struct UndeletableStore {
    inner: FileSystemBlobStore,
}

#[async_trait]
impl BlobStore for UndeletableStore {
    async fn save(
        &self,
        upload: BlobUpload,
        sub_path: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<SavedBlob> {
        self.inner.save(upload, sub_path, cancel).await
    }

    async fn delete(&self, relative_path: &str) -> GalleristResult<()> {
        Err(StorageError::new(StorageErrorKind::Delete(format!(
            "{}: injected failure",
            relative_path
        )))
        .into())
    }

    async fn exists(&self, relative_path: &str) -> GalleristResult<bool> {
        self.inner.exists(relative_path).await
    }

    async fn list(&self, sub_path: &str) -> GalleristResult<Vec<BlobEntry>> {
        self.inner.list(sub_path).await
    }

    fn full_path(&self, relative_path: &str) -> PathBuf {
        self.inner.full_path(relative_path)
    }

    fn base_url(&self) -> &str {
        self.inner.base_url()
    }
}

/// Blob store that cancels `cancel` once a delete has gone through.
struct CancellingStore {
    inner: FileSystemBlobStore,
    cancel: CancellationToken,
}

#[async_trait]
impl BlobStore for CancellingStore {
    async fn save(
        &self,
        upload: BlobUpload,
        sub_path: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<SavedBlob> {
        self.inner.save(upload, sub_path, cancel).await
    }

    async fn delete(&self, relative_path: &str) -> GalleristResult<()> {
        self.inner.delete(relative_path).await?;
        self.cancel.cancel();
        Ok(())
    }

    async fn exists(&self, relative_path: &str) -> GalleristResult<bool> {
        self.inner.exists(relative_path).await
    }

    async fn list(&self, sub_path: &str) -> GalleristResult<Vec<BlobEntry>> {
        self.inner.list(sub_path).await
    }

    fn full_path(&self, relative_path: &str) -> PathBuf {
        self.inner.full_path(relative_path)
    }

    fn base_url(&self) -> &str {
        self.inner.base_url()
    }
}

struct Harness<S, R> {
    _dir: TempDir,
    store: Arc<S>,
    repository: Arc<R>,
    service: MediaIngestionService<S, R>,
}

fn temp_store() -> (TempDir, FileSystemBlobStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = FileSystemBlobStore::new(dir.path().join("media"), "https://cdn.example.com/media")
        .expect("Failed to create store");
    (dir, store)
}

fn harness() -> Harness<FileSystemBlobStore, InMemoryMediaRepository> {
    let (dir, store) = temp_store();
    build(dir, store, InMemoryMediaRepository::new())
}

fn build<S: BlobStore, R: MediaRepository>(dir: TempDir, store: S, repository: R) -> Harness<S, R> {
    let store = Arc::new(store);
    let repository = Arc::new(repository);
    let service = MediaIngestionService::new(
        Arc::clone(&store),
        Arc::clone(&repository),
        ReadCacheConfig::default(),
    );
    Harness {
        _dir: dir,
        store,
        repository,
        service,
    }
}

fn photo(uploader: UserId, name: &str) -> UploadInput {
    UploadInput::from_bytes(uploader, MediaKind::Photo, name, "image/jpeg", vec![7u8; 100])
        .with_width(640)
        .with_height(480)
        .with_is_public(true)
}

async fn blob_count<S: BlobStore>(store: &S) -> usize {
    store.list("").await.expect("Failed to list blobs").len()
}

#[tokio::test]
async fn test_upload_stores_blob_and_record() {
    let h = harness();
    let cancel = CancellationToken::new();
    let uploader = UserId::generate();

    let record = h
        .service
        .upload_media(photo(uploader, "Sunset.JPG"), &cancel)
        .await
        .unwrap();

    assert_eq!(record.filename, "Sunset.JPG");
    assert_eq!(record.size_bytes, 100);
    assert_eq!(
        record.storage_path,
        format!("{}/{}.jpg", uploader, record.id)
    );
    assert!(h.store.exists(&record.storage_path).await.unwrap());
    assert_eq!(
        h.service.get_media(record.id, &cancel).await.unwrap(),
        record
    );
}

#[tokio::test]
async fn test_zero_width_photo_is_rejected_and_blob_removed() {
    let h = harness();
    let upload = photo(UserId::generate(), "wide.jpg").with_width(0);

    let err = h
        .service
        .upload_media(upload, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(
        err.violations()
            .unwrap()
            .iter()
            .any(|v| v == "width and height must be positive values")
    );
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
    assert_eq!(h.repository.media_count().await, 0);
}

#[tokio::test]
async fn test_missing_dimensions_report_both_fields() {
    let h = harness();
    let upload = UploadInput::from_bytes(
        UserId::generate(),
        MediaKind::Photo,
        "flat.png",
        "image/png",
        vec![1u8; 10],
    );

    let err = h
        .service
        .upload_media(upload, &CancellationToken::new())
        .await
        .unwrap_err();

    let GalleristErrorKind::Validation(validation) = err.kind() else {
        panic!("expected validation error, got {}", err);
    };
    assert!(validation.mentions("width"));
    assert!(validation.mentions("height"));
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
}

#[tokio::test]
async fn test_persist_failure_removes_blob() {
    let (dir, store) = temp_store();
    let h = build(dir, store, FaultyRepository::new(Fault::FailInserts));

    let err = h
        .service
        .upload_media(photo(UserId::generate(), "a.jpg"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), GalleristErrorKind::Database(_)));
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
}

#[tokio::test]
async fn test_failed_compensation_does_not_mask_primary_error() {
    let (dir, store) = temp_store();
    let h = build(
        dir,
        UndeletableStore { inner: store },
        InMemoryMediaRepository::new(),
    );
    let upload = photo(UserId::generate(), "a.jpg").with_width(-3);

    let err = h
        .service
        .upload_media(upload, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_validation());
}

#[tokio::test]
async fn test_cancelled_upload_leaves_nothing() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .service
        .upload_media(photo(UserId::generate(), "a.jpg"), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
    assert_eq!(h.repository.media_count().await, 0);
}

#[tokio::test]
async fn test_cancel_after_blob_write_removes_blob() {
    let (dir, store) = temp_store();
    let h = build(dir, store, FaultyRepository::new(Fault::CancelOnCreate));
    let cancel = CancellationToken::new();

    let err = h
        .service
        .upload_media(photo(UserId::generate(), "a.jpg"), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(cancel.is_cancelled());
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
    assert_eq!(h.repository.inner.media_count().await, 0);
}

#[tokio::test]
async fn test_batch_with_one_invalid_file_keeps_nothing() {
    let h = harness();
    let uploader = UserId::generate();
    let batch = vec![
        photo(uploader, "1.jpg"),
        photo(uploader, "2.jpg"),
        photo(uploader, "3.jpg").with_height(0),
        photo(uploader, "4.jpg"),
    ];

    let err = h
        .service
        .upload_multiple_media(batch, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(
        err.violations()
            .unwrap()
            .iter()
            .all(|v| v.starts_with("file 3 (3.jpg)"))
    );
    assert_eq!(h.repository.media_count().await, 0);
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
}

#[tokio::test]
async fn test_batch_persist_failure_keeps_nothing() {
    let (dir, store) = temp_store();
    let h = build(dir, store, FaultyRepository::new(Fault::FailInserts));
    let uploader = UserId::generate();

    let result = h
        .service
        .upload_multiple_media(
            vec![photo(uploader, "1.jpg"), photo(uploader, "2.jpg")],
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
}

#[tokio::test]
async fn test_batch_rejects_mixed_uploaders_before_io() {
    let h = harness();
    let batch = vec![
        photo(UserId::generate(), "1.jpg"),
        photo(UserId::generate(), "2.jpg"),
    ];

    let err = h
        .service
        .upload_multiple_media(batch, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), GalleristErrorKind::Input(_)));
    assert_eq!(blob_count(h.store.as_ref()).await, 0);
}

#[tokio::test]
async fn test_successful_batch_has_no_orphan_rows() {
    let h = harness();
    let cancel = CancellationToken::new();
    let uploader = UserId::generate();
    let batch = (0..3)
        .map(|i| photo(uploader, &format!("{}.jpg", i)))
        .collect();

    let stored = h
        .service
        .upload_multiple_media(batch, &cancel)
        .await
        .unwrap();

    assert_eq!(stored.len(), 3);
    for record in h.repository.all_media().await {
        assert!(h.store.exists(&record.storage_path).await.unwrap());
    }
}

#[tokio::test]
async fn test_attach_then_reattach() {
    let h = harness();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let a = h.service.upload_media(photo(owner, "a.jpg"), &cancel).await.unwrap();
    let b = h.service.upload_media(photo(owner, "b.jpg"), &cancel).await.unwrap();
    let group = h.service.create_group(owner, "gallery", &cancel).await.unwrap();

    let inserted = h
        .service
        .attach_media_to_group(group.id, &[a.id, b.id], &cancel)
        .await
        .unwrap();
    let positions: Vec<_> = inserted.iter().map(|i| (i.media_id, i.position)).collect();
    assert_eq!(positions, vec![(a.id, 1), (b.id, 2)]);

    let again = h
        .service
        .attach_media_to_group(group.id, &[b.id], &cancel)
        .await
        .unwrap();
    assert!(again.is_empty());

    let members = h.service.list_group_media(group.id, &cancel).await.unwrap();
    assert_eq!(
        members.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![a.id, b.id]
    );
}

#[tokio::test]
async fn test_attach_nonexistent_media_is_not_found() {
    let h = harness();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let a = h.service.upload_media(photo(owner, "a.jpg"), &cancel).await.unwrap();
    let group = h.service.create_group(owner, "", &cancel).await.unwrap();
    h.service
        .attach_media_to_group(group.id, &[a.id], &cancel)
        .await
        .unwrap();

    let err = h
        .service
        .attach_media_to_group(group.id, &[MediaId::generate()], &cancel)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        h.repository
            .get_group_items(group.id, &cancel)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_attach_rejects_malformed_requests() {
    let h = harness();
    let cancel = CancellationToken::new();
    let group = h
        .service
        .create_group(UserId::generate(), "", &cancel)
        .await
        .unwrap();

    let cases = [
        h.service
            .attach_media_to_group(GroupId::nil(), &[MediaId::generate()], &cancel)
            .await,
        h.service.attach_media_to_group(group.id, &[], &cancel).await,
        h.service
            .attach_media_to_group(group.id, &[MediaId::nil()], &cancel)
            .await,
    ];
    for result in cases {
        let err = result.unwrap_err();
        assert!(matches!(err.kind(), GalleristErrorKind::Input(_)));
    }

    assert!(
        h.service
            .create_group(UserId::nil(), "", &cancel)
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attach_positions_are_a_permutation() {
    let h = harness();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let group = h.service.create_group(owner, "", &cancel).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..16 {
        let record = h
            .service
            .upload_media(photo(owner, &format!("{}.jpg", i)), &cancel)
            .await
            .unwrap();
        ids.push(record.id);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let service = h.service.clone();
            tokio::spawn(async move {
                service
                    .attach_media_to_group(group.id, &[id], &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut positions: Vec<i32> = h
        .repository
        .get_group_items(group.id, &cancel)
        .await
        .unwrap()
        .iter()
        .map(|i| i.position)
        .collect();
    positions.sort();
    assert_eq!(positions, (1..=16).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_image_listing_is_cached_until_a_write() {
    let h = harness();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    h.service.upload_media(photo(owner, "a.jpg"), &cancel).await.unwrap();

    let first = h.service.get_all_images(None, &cancel).await.unwrap();
    assert_eq!(first.total, 1);

    // A write that bypasses the service is not visible while the entry is fresh
    let mut hidden = h.repository.all_media().await[0].clone();
    hidden.id = MediaId::generate();
    hidden.storage_path = format!("{}/elsewhere.jpg", owner);
    h.repository.create_media(&hidden, &cancel).await.unwrap();
    assert_eq!(h.service.get_all_images(None, &cancel).await.unwrap().total, 1);

    // A differently bounded query has its own entry
    assert_eq!(h.service.get_all_images(Some(1), &cancel).await.unwrap().total, 2);

    // Service writes invalidate
    h.service.upload_media(photo(owner, "b.jpg"), &cancel).await.unwrap();
    let refreshed = h.service.get_all_images(None, &cancel).await.unwrap();
    assert_eq!(refreshed.total, 3);
    assert_eq!(refreshed.items.len(), 3);
}

#[tokio::test]
async fn test_listing_loaded_across_a_write_is_not_cached() {
    let parked = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (dir, store) = temp_store();
    let h = build(
        dir,
        store,
        FaultyRepository::new(Fault::StallFirstListing {
            armed: AtomicBool::new(true),
            parked: Arc::clone(&parked),
            release: Arc::clone(&release),
        }),
    );
    let cancel = CancellationToken::new();

    // The reader loads an empty page, then waits while an upload lands
    let reader = {
        let service = h.service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.get_all_images(None, &cancel).await })
    };
    parked.notified().await;
    h.service
        .upload_media(photo(UserId::generate(), "a.jpg"), &cancel)
        .await
        .unwrap();
    release.notify_one();

    let stale = reader.await.unwrap().unwrap();
    assert_eq!(stale.total, 0);

    let after = h.service.get_all_images(None, &cancel).await.unwrap();
    assert_eq!(after.total, 1);
    assert_eq!(after.items.len(), 1);
}

#[tokio::test]
async fn test_image_listing_rejects_non_positive_limit() {
    let h = harness();
    let err = h
        .service
        .get_all_images(Some(0), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), GalleristErrorKind::Input(_)));
}

#[tokio::test]
async fn test_update_media_validates_and_persists() {
    let h = harness();
    let cancel = CancellationToken::new();
    let record = h
        .service
        .upload_media(photo(UserId::generate(), "a.jpg"), &cancel)
        .await
        .unwrap();

    let updated = h
        .service
        .update_media(
            record.id,
            MediaUpdate {
                filename: Some("renamed.jpg".to_string()),
                is_public: Some(false),
                metadata: None,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(updated.filename, "renamed.jpg");
    assert!(!updated.is_public);
    assert_eq!(updated.storage_path, record.storage_path);

    let err = h
        .service
        .update_media(
            record.id,
            MediaUpdate {
                filename: Some("x".repeat(256)),
                ..MediaUpdate::default()
            },
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        h.service.get_media(record.id, &cancel).await.unwrap().filename,
        "renamed.jpg"
    );
}

#[tokio::test]
async fn test_reconcile_removes_only_old_unreferenced_blobs() {
    let h = harness();
    let cancel = CancellationToken::new();
    let owner = UserId::generate();
    let kept = h.service.upload_media(photo(owner, "a.jpg"), &cancel).await.unwrap();
    let orphan = h
        .store
        .save(
            BlobUpload::from_bytes("stray.bin", vec![0u8; 4]),
            "crashed",
            &cancel,
        )
        .await
        .unwrap();

    let recent = h
        .service
        .reconcile_orphans(Duration::from_secs(3600), &cancel)
        .await
        .unwrap();
    assert_eq!(recent.scanned, 2);
    assert_eq!(recent.too_recent, 2);
    assert!(recent.deleted.is_empty());

    let swept = h
        .service
        .reconcile_orphans(Duration::ZERO, &cancel)
        .await
        .unwrap();
    assert_eq!(swept.referenced, 1);
    assert!(!swept.cancelled);
    assert_eq!(swept.deleted, vec![orphan.relative_path.clone()]);
    assert!(!h.store.exists(&orphan.relative_path).await.unwrap());
    assert!(h.store.exists(&kept.storage_path).await.unwrap());
}

#[tokio::test]
async fn test_cancelled_reconcile_returns_partial_report() {
    let (dir, store) = temp_store();
    let cancel = CancellationToken::new();
    let h = build(
        dir,
        CancellingStore {
            inner: store,
            cancel: cancel.clone(),
        },
        InMemoryMediaRepository::new(),
    );

    let ongoing = CancellationToken::new();
    for name in ["a.bin", "b.bin", "c.bin"] {
        h.store
            .save(BlobUpload::from_bytes(name, vec![0u8; 4]), "crashed", &ongoing)
            .await
            .unwrap();
    }

    let report = h
        .service
        .reconcile_orphans(Duration::ZERO, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.scanned, 3);
    assert_eq!(report.deleted, vec!["crashed/a.bin".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(blob_count(h.store.as_ref()).await, 2);
}
