//! Media ingestion and group membership.

use crate::upload::UploadInput;
use gallerist_cache::{ReadCache, ReadCacheConfig};
use gallerist_core::{
    GroupId, MediaGroup, MediaGroupItem, MediaId, MediaPage, MediaRecord, MediaUpdate, UserId,
};
use gallerist_database::MediaRepository;
use gallerist_error::{GalleristResult, InputError, ValidationError};
use gallerist_storage::BlobStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Cache of public image listings, keyed by limit.
pub type ImageListingCache = ReadCache<Option<i64>, MediaPage>;

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Blobs examined
    pub scanned: usize,
    /// Blobs younger than the grace period, left alone
    pub too_recent: usize,
    /// Blobs referenced by a record
    pub referenced: usize,
    /// Orphans removed
    pub deleted: Vec<String>,
    /// Orphans that could not be removed
    pub failed: Vec<String>,
    /// True when the sweep stopped early on cancellation
    pub cancelled: bool,
}

/// Orchestrates uploads across the blob store and the repository.
///
/// Every upload writes its blob first, then validates and persists the
/// record. Any failure after the blob write deletes the blob before the
/// original error is returned, so files and rows never diverge. Group
/// attachment is delegated to the repository's atomic algorithm after the
/// request has been checked structurally.
///
/// # Example
///
/// ```
/// use gallerist::{
///     FileSystemBlobStore, InMemoryMediaRepository, MediaIngestionService, MediaKind,
///     ReadCacheConfig, UploadInput, UserId,
/// };
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = std::env::temp_dir().join("gallerist-doc");
/// let store = Arc::new(FileSystemBlobStore::new(&dir, "https://cdn.example.com")?);
/// let repository = Arc::new(InMemoryMediaRepository::new());
/// let service = MediaIngestionService::new(store, repository, ReadCacheConfig::default());
/// let cancel = CancellationToken::new();
///
/// let upload = UploadInput::from_bytes(
///     UserId::generate(),
///     MediaKind::Document,
///     "notes.txt",
///     "text/plain",
///     b"hello".to_vec(),
/// );
/// let record = service.upload_media(upload, &cancel).await?;
/// assert_eq!(record.size_bytes, 5);
/// # Ok(())
/// # }
/// ```
pub struct MediaIngestionService<S, R> {
    store: Arc<S>,
    repository: Arc<R>,
    cache: Arc<ImageListingCache>,
}

impl<S, R> Clone for MediaIngestionService<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S, R> std::fmt::Debug for MediaIngestionService<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaIngestionService")
            .field("cache", self.cache.config())
            .finish_non_exhaustive()
    }
}

fn require_id(is_nil: bool, what: &str) -> GalleristResult<()> {
    if is_nil {
        Err(InputError::new(format!("{} is required", what)))?
    }
    Ok(())
}

impl<S, R> MediaIngestionService<S, R>
where
    S: BlobStore,
    R: MediaRepository,
{
    /// Create a service with its own listing cache.
    pub fn new(store: Arc<S>, repository: Arc<R>, cache: ReadCacheConfig) -> Self {
        Self::with_cache(store, repository, Arc::new(ReadCache::new(cache)))
    }

    /// Create a service around an existing listing cache.
    pub fn with_cache(store: Arc<S>, repository: Arc<R>, cache: Arc<ImageListingCache>) -> Self {
        Self {
            store,
            repository,
            cache,
        }
    }

    /// The blob store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// The listing cache.
    pub fn cache(&self) -> &ImageListingCache {
        &self.cache
    }

    /// Delete blobs written by a failed operation.
    ///
    /// Failures are logged and swallowed so the primary error reaches the
    /// caller unobscured.
    async fn compensate(&self, paths: &[String]) {
        for path in paths {
            match self.store.delete(path).await {
                Ok(()) => tracing::debug!(path = %path, "Removed blob after failed upload"),
                Err(e) => tracing::warn!(
                    path = %path,
                    error = %e,
                    "Compensating delete failed; blob is orphaned"
                ),
            }
        }
    }

    async fn invalidate_listings(&self) {
        self.cache.clear().await;
    }

    /// Ingest one file.
    ///
    /// # Errors
    ///
    /// - storage errors (including cancellation) from the blob write, with
    ///   nothing left to clean up
    /// - a [`ValidationError`] listing every violated rule, after the blob
    ///   has been deleted
    /// - persistence errors, after the blob has been deleted
    #[tracing::instrument(
        skip(self, input, cancel),
        fields(uploader_id = %input.uploader_id, kind = %input.kind, filename = %input.filename)
    )]
    pub async fn upload_media(
        &self,
        input: UploadInput,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        let sub_path = input.uploader_id.to_string();
        let (draft, blob) = input.into_parts();

        let saved = self
            .store
            .save(blob, &sub_path, cancel)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Blob write failed"))?;

        let record = draft.to_record(&saved);
        if let Err(violations) = record.validate() {
            tracing::error!(error = %violations, "Upload rejected by validation");
            self.compensate(std::slice::from_ref(&saved.relative_path))
                .await;
            return Err(violations.into());
        }

        match self.repository.create_media(&record, cancel).await {
            Ok(stored) => {
                self.invalidate_listings().await;
                tracing::info!(
                    media_id = %stored.id,
                    storage_path = %stored.storage_path,
                    size_bytes = stored.size_bytes,
                    "Media uploaded"
                );
                Ok(stored)
            }
            Err(e) => {
                tracing::error!(error = %e, "Persisting media record failed");
                self.compensate(std::slice::from_ref(&saved.relative_path))
                    .await;
                Err(e)
            }
        }
    }

    /// Ingest a batch from one uploader, all-or-nothing.
    ///
    /// Mixed-uploader and empty batches are rejected before any I/O. When any
    /// record fails validation, or the batch insert fails, every file saved
    /// by this call is deleted.
    #[tracing::instrument(skip(self, inputs, cancel), fields(count = inputs.len()))]
    pub async fn upload_multiple_media(
        &self,
        inputs: Vec<UploadInput>,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        let Some(uploader_id) = inputs.first().map(|input| input.uploader_id) else {
            return Err(InputError::new("a batch upload needs at least one file").into());
        };
        if inputs.iter().any(|input| input.uploader_id != uploader_id) {
            Err(InputError::new(
                "all files in a batch upload must share one uploader",
            ))?
        }

        let (drafts, blobs): (Vec<_>, Vec<_>) =
            inputs.into_iter().map(UploadInput::into_parts).unzip();

        let saved = self
            .store
            .save_multiple(blobs, &uploader_id.to_string(), cancel)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Batch blob write failed"))?;
        let saved_paths: Vec<String> = saved.iter().map(|s| s.relative_path.clone()).collect();

        let records: Vec<MediaRecord> = drafts
            .iter()
            .zip(&saved)
            .map(|(draft, blob)| draft.to_record(blob))
            .collect();

        let violations: Vec<String> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|e| (index, record, e.violations))
            })
            .flat_map(|(index, record, violations)| {
                violations.into_iter().map(move |v| {
                    format!("file {} ({}): {}", index + 1, record.filename, v)
                })
            })
            .collect();
        if !violations.is_empty() {
            let err = ValidationError::new(violations);
            tracing::error!(error = %err, "Batch rejected by validation");
            self.compensate(&saved_paths).await;
            return Err(err.into());
        }

        match self.repository.create_multiple_media(&records, cancel).await {
            Ok(stored) => {
                self.invalidate_listings().await;
                tracing::info!(count = stored.len(), uploader_id = %uploader_id, "Batch uploaded");
                Ok(stored)
            }
            Err(e) => {
                tracing::error!(error = %e, "Persisting media batch failed");
                self.compensate(&saved_paths).await;
                Err(e)
            }
        }
    }

    /// Create a group owned by `owner_id`.
    #[tracing::instrument(skip(self, description, cancel))]
    pub async fn create_group(
        &self,
        owner_id: UserId,
        description: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        require_id(owner_id.is_nil(), "owner id")?;
        self.repository
            .add_media_group(owner_id, description, cancel)
            .await
    }

    /// Attach media to a group, returning the newly created memberships.
    ///
    /// A nil group id, an empty list or a nil media id is rejected before
    /// the repository is touched. Re-attaching an existing member is a no-op.
    #[tracing::instrument(skip(self, media_ids, cancel), fields(count = media_ids.len()))]
    pub async fn attach_media_to_group(
        &self,
        group_id: GroupId,
        media_ids: &[MediaId],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        require_id(group_id.is_nil(), "group id")?;
        if media_ids.is_empty() {
            Err(InputError::new("at least one media id is required"))?
        }
        if media_ids.iter().any(MediaId::is_nil) {
            Err(InputError::new("media ids must not be nil"))?
        }

        self.repository
            .add_media_group_items(group_id, media_ids, cancel)
            .await
            .inspect_err(|e| {
                if e.is_not_found() {
                    tracing::info!(error = %e, "Attach referenced a missing entity");
                } else {
                    tracing::error!(error = %e, "Attach failed");
                }
            })
    }

    /// Members of a group in position order.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn list_group_media(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        require_id(group_id.is_nil(), "group id")?;
        self.repository.get_media_by_group_id(group_id, cancel).await
    }

    /// Look up one record.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_media(
        &self,
        id: MediaId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        require_id(id.is_nil(), "media id")?;
        self.repository.find_by_id(id, cancel).await
    }

    /// Change filename, visibility or metadata of a record.
    ///
    /// The updated record is validated as a whole before it is written.
    #[tracing::instrument(skip(self, update, cancel))]
    pub async fn update_media(
        &self,
        id: MediaId,
        update: MediaUpdate,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        require_id(id.is_nil(), "media id")?;
        let current = self.repository.find_by_id(id, cancel).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let updated = update.apply(&current);
        updated.validate()?;

        let stored = self.repository.update_media(&updated, cancel).await?;
        self.invalidate_listings().await;
        tracing::info!(media_id = %id, "Media updated");
        Ok(stored)
    }

    /// Public photos, newest first, served from the listing cache when fresh.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_all_images(
        &self,
        limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaPage> {
        if let Some(n) = limit
            && n <= 0
        {
            Err(InputError::new(format!("limit must be positive, got {}", n)))?
        }

        if let Some(page) = self.cache.get(&limit).await {
            tracing::debug!(count = page.items.len(), "Image listing cache hit");
            return Ok(page);
        }

        tracing::debug!("Image listing cache miss");
        let generation = self.cache.generation().await;
        let page = self.repository.get_all_images(limit, cancel).await?;
        self.cache
            .insert_if_generation(limit, page.clone(), generation)
            .await;
        Ok(page)
    }

    /// Delete blobs no record references.
    ///
    /// Only blobs last modified more than `grace` ago are considered, so
    /// uploads still between blob write and commit are left alone. Failed
    /// deletes are reported, not raised. Cancellation stops the sweep between
    /// deletes and returns what was done so far.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn reconcile_orphans(
        &self,
        grace: Duration,
        cancel: &CancellationToken,
    ) -> GalleristResult<ReconcileReport> {
        let cutoff = SystemTime::now()
            .checked_sub(grace)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let blobs = self.store.list("").await?;

        let mut report = ReconcileReport {
            scanned: blobs.len(),
            ..ReconcileReport::default()
        };
        let candidates: Vec<String> = blobs
            .into_iter()
            .filter(|blob| {
                let old_enough = blob.modified <= cutoff;
                if !old_enough {
                    report.too_recent += 1;
                }
                old_enough
            })
            .map(|blob| blob.relative_path)
            .collect();

        let referenced = self
            .repository
            .existing_storage_paths(&candidates, cancel)
            .await?;
        report.referenced = referenced.len();

        for path in candidates.into_iter().filter(|p| !referenced.contains(p)) {
            if cancel.is_cancelled() {
                tracing::info!(
                    deleted = report.deleted.len(),
                    "Orphan sweep cancelled, returning partial report"
                );
                report.cancelled = true;
                return Ok(report);
            }
            match self.store.delete(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path, "Removed orphaned blob");
                    report.deleted.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to remove orphaned blob");
                    report.failed.push(path);
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Orphan sweep finished"
        );
        Ok(report)
    }
}
