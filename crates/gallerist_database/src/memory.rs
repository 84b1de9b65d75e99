//! In-memory implementation of MediaRepository.
//!
//! A single lock around all tables stands in for a database transaction, so
//! every operation is atomic and attachments are serialized. Useful for
//! service tests that must not depend on PostgreSQL.

use crate::MediaRepository;
use crate::repository::{check_limit, dedup_preserving_order};
use async_trait::async_trait;
use chrono::Utc;
use gallerist_core::{
    GroupId, MediaGroup, MediaGroupItem, MediaId, MediaKind, MediaPage, MediaRecord, UserId,
};
use gallerist_error::{DatabaseError, DatabaseErrorKind, GalleristResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// In-memory repository for media records and groups.
///
/// All data is lost when the last clone is dropped.
///
/// # Example
/// ```
/// use gallerist_database::{InMemoryMediaRepository, MediaRepository};
/// use gallerist_core::UserId;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let repo = InMemoryMediaRepository::new();
/// let cancel = CancellationToken::new();
/// let group = repo
///     .add_media_group(UserId::generate(), "holiday", &cancel)
///     .await
///     .unwrap();
/// assert!(repo.get_group_items(group.id, &cancel).await.unwrap().is_empty());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaRepository {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    media: HashMap<MediaId, MediaRecord>,
    groups: HashMap<GroupId, MediaGroup>,
    items: HashMap<GroupId, Vec<MediaGroupItem>>,
}

impl Tables {
    fn check_insertable(&self, record: &MediaRecord) -> Result<(), DatabaseError> {
        if self.media.contains_key(&record.id) {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate(format!(
                "media id {} already exists",
                record.id
            ))));
        }
        if self
            .media
            .values()
            .any(|existing| existing.storage_path == record.storage_path)
        {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate(format!(
                "storage path {} already exists",
                record.storage_path
            ))));
        }
        Ok(())
    }

    fn require_group(&self, group_id: GroupId) -> Result<(), DatabaseError> {
        if self.groups.contains_key(&group_id) {
            Ok(())
        } else {
            Err(DatabaseError::new(DatabaseErrorKind::NotFound))
        }
    }
}

fn ensure_active(cancel: &CancellationToken, operation: &str) -> Result<(), DatabaseError> {
    if cancel.is_cancelled() {
        Err(DatabaseError::new(DatabaseErrorKind::Cancelled(
            operation.to_string(),
        )))
    } else {
        Ok(())
    }
}

impl InMemoryMediaRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored media records.
    pub async fn media_count(&self) -> usize {
        self.tables.read().await.media.len()
    }

    /// All stored records, in no particular order.
    pub async fn all_media(&self) -> Vec<MediaRecord> {
        self.tables.read().await.media.values().cloned().collect()
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn create_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        ensure_active(cancel, "create_media")?;
        let mut tables = self.tables.write().await;
        tables
            .check_insertable(record)
            .map_err(|e| e.in_operation("create_media"))?;
        ensure_active(cancel, "create_media")?;

        tables.media.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn create_multiple_media(
        &self,
        records: &[MediaRecord],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        ensure_active(cancel, "create_multiple_media")?;
        let mut tables = self.tables.write().await;

        let mut batch_ids = HashSet::new();
        let mut batch_paths = HashSet::new();
        for record in records {
            tables
                .check_insertable(record)
                .map_err(|e| e.in_operation("create_multiple_media"))?;
            if !batch_ids.insert(record.id) || !batch_paths.insert(record.storage_path.as_str()) {
                return Err(DatabaseError::new(DatabaseErrorKind::Duplicate(format!(
                    "create_multiple_media: media {} repeated within batch",
                    record.id
                )))
                .into());
            }
        }
        ensure_active(cancel, "create_multiple_media")?;

        for record in records {
            tables.media.insert(record.id, record.clone());
        }
        Ok(records.to_vec())
    }

    async fn update_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        ensure_active(cancel, "update_media")?;
        let mut tables = self.tables.write().await;
        let stored = tables
            .media
            .get_mut(&record.id)
            .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::NotFound))?;
        ensure_active(cancel, "update_media")?;

        stored.filename = record.filename.clone();
        stored.is_public = record.is_public;
        stored.metadata = record.metadata.clone();
        Ok(stored.clone())
    }

    async fn find_by_id(
        &self,
        id: MediaId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        ensure_active(cancel, "find_by_id")?;
        let tables = self.tables.read().await;
        Ok(tables
            .media
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::NotFound))?)
    }

    async fn add_media_group(
        &self,
        owner_id: UserId,
        description: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        ensure_active(cancel, "add_media_group")?;
        let group = MediaGroup {
            id: GroupId::generate(),
            owner_id,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .groups
            .insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        ensure_active(cancel, "get_group")?;
        let tables = self.tables.read().await;
        Ok(tables
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::NotFound))?)
    }

    async fn add_media_group_items(
        &self,
        group_id: GroupId,
        media_ids: &[MediaId],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        ensure_active(cancel, "add_media_group_items")?;
        let mut tables = self.tables.write().await;

        if !tables.groups.contains_key(&group_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::ReferencedGroupMissing(
                group_id.to_string(),
            ))
            .into());
        }

        let ids = dedup_preserving_order(media_ids);
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !tables.media.contains_key(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatabaseError::new(DatabaseErrorKind::ReferencedMediaMissing(
                missing.join(", "),
            ))
            .into());
        }

        let members = tables.items.entry(group_id).or_default();
        let attached: HashSet<MediaId> = members.iter().map(|item| item.media_id).collect();
        let mut next = members.iter().map(|item| item.position).max().unwrap_or(0);
        let now = Utc::now();
        let inserted: Vec<MediaGroupItem> = ids
            .into_iter()
            .filter(|id| !attached.contains(id))
            .map(|media_id| {
                next += 1;
                MediaGroupItem {
                    group_id,
                    media_id,
                    position: next,
                    created_at: now,
                }
            })
            .collect();
        ensure_active(cancel, "add_media_group_items")?;

        members.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn get_group_items(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        ensure_active(cancel, "get_group_items")?;
        let tables = self.tables.read().await;
        tables.require_group(group_id)?;

        let mut items = tables.items.get(&group_id).cloned().unwrap_or_default();
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    async fn get_media_by_group_id(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        ensure_active(cancel, "get_media_by_group_id")?;
        let tables = self.tables.read().await;
        tables.require_group(group_id)?;

        let mut items: Vec<&MediaGroupItem> = tables
            .items
            .get(&group_id)
            .map(|items| items.iter().collect())
            .unwrap_or_default();
        items.sort_by_key(|item| item.position);
        Ok(items
            .into_iter()
            .filter_map(|item| tables.media.get(&item.media_id).cloned())
            .collect())
    }

    async fn get_all_images(
        &self,
        limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaPage> {
        check_limit(limit)?;
        ensure_active(cancel, "get_all_images")?;
        let tables = self.tables.read().await;

        let mut photos: Vec<MediaRecord> = tables
            .media
            .values()
            .filter(|record| record.kind == MediaKind::Photo && record.is_public)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = photos.len() as i64;
        if let Some(limit) = limit {
            photos.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(MediaPage {
            items: photos,
            total,
        })
    }

    async fn existing_storage_paths(
        &self,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> GalleristResult<HashSet<String>> {
        ensure_active(cancel, "existing_storage_paths")?;
        let wanted: HashSet<&str> = paths.iter().map(String::as_str).collect();
        let tables = self.tables.read().await;
        Ok(tables
            .media
            .values()
            .filter(|record| wanted.contains(record.storage_path.as_str()))
            .map(|record| record.storage_path.clone())
            .collect())
    }
}
