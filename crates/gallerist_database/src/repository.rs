//! Media repository trait.

use async_trait::async_trait;
use gallerist_core::{
    GroupId, MediaGroup, MediaGroupItem, MediaId, MediaPage, MediaRecord, UserId,
};
use gallerist_error::{GalleristResult, InputError};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Relational persistence for media records and group membership.
///
/// The repository is the only writer of groups and membership rows. Every
/// operation takes the originating request's cancellation token; once a
/// write has committed, cancellation no longer affects its result.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert one record and return the stored row.
    ///
    /// # Errors
    ///
    /// A record with the same id or storage path yields a `Duplicate` error.
    async fn create_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord>;

    /// Insert a batch in one transaction: every row commits or none does.
    async fn create_multiple_media(
        &self,
        records: &[MediaRecord],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>>;

    /// Persist filename, visibility and metadata of an existing record.
    ///
    /// Other fields of `record` are ignored.
    async fn update_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord>;

    /// Point lookup. A missing record is `NotFound`, distinct from transport
    /// failures.
    async fn find_by_id(
        &self,
        id: MediaId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord>;

    /// Create a group and return it with its generated id.
    async fn add_media_group(
        &self,
        owner_id: UserId,
        description: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup>;

    /// Look up a group.
    async fn get_group(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup>;

    /// Attach media to a group atomically.
    ///
    /// Inside one transaction, serialized against other attachments to the
    /// same group:
    /// 1. the group must exist (`ReferencedGroupMissing` otherwise);
    /// 2. every media id must exist (`ReferencedMediaMissing` otherwise);
    /// 3. new members get positions `max+1, max+2, …` in input order;
    /// 4. pairs that are already attached are skipped without consuming a
    ///    position.
    ///
    /// Any failure rolls back the whole call. Returns the rows that were
    /// newly inserted.
    async fn add_media_group_items(
        &self,
        group_id: GroupId,
        media_ids: &[MediaId],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>>;

    /// Membership rows of a group, ordered by position.
    async fn get_group_items(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>>;

    /// Member records of a group, ordered by position ascending.
    async fn get_media_by_group_id(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>>;

    /// Public photos, newest first, with the total count of public photos.
    async fn get_all_images(
        &self,
        limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaPage>;

    /// The subset of `paths` that some record references.
    async fn existing_storage_paths(
        &self,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> GalleristResult<HashSet<String>>;
}

/// Reject non-positive listing limits; `None` is unbounded.
pub(crate) fn check_limit(limit: Option<i64>) -> GalleristResult<()> {
    match limit {
        Some(n) if n <= 0 => {
            Err(InputError::new(format!("limit must be positive, got {}", n)).into())
        }
        _ => Ok(()),
    }
}

/// Keep the first occurrence of every id, preserving input order.
pub(crate) fn dedup_preserving_order<T: Copy + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserving_order() {
        assert_eq!(dedup_preserving_order(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(dedup_preserving_order::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_check_limit() {
        assert!(check_limit(None).is_ok());
        assert!(check_limit(Some(1)).is_ok());
        assert!(check_limit(Some(0)).is_err());
        assert!(check_limit(Some(-5)).is_err());
    }
}
