//! PostgreSQL implementation of MediaRepository.

use crate::connection::PgPool;
use crate::models::{
    MediaGroupItemRow, MediaGroupRow, MediaRow, NewMediaGroupItemRow, NewMediaGroupRow,
    UpdateMediaRow, rows_to_records,
};
use crate::repository::{check_limit, dedup_preserving_order};
use crate::schema::{media, media_group_items, media_groups};
use crate::{DatabaseResult, MediaRepository};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use gallerist_core::{
    GroupId, MediaGroup, MediaGroupItem, MediaId, MediaKind, MediaPage, MediaRecord, UserId,
};
use gallerist_error::{DatabaseError, DatabaseErrorKind, GalleristResult};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Rows per INSERT statement, keeping well under PostgreSQL's bind limit.
const INSERT_CHUNK: usize = 1000;

/// PostgreSQL media repository using Diesel over an r2d2 pool.
///
/// Diesel is synchronous, so each call checks out a pooled connection on the
/// blocking thread pool. No in-process locks are held: exclusion between
/// concurrent writers is left to PostgreSQL.
///
/// # Example
/// ```no_run
/// use gallerist_database::{establish_pool, PostgresMediaRepository};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = establish_pool("postgres://localhost/gallerist", 8)?;
/// let repo = PostgresMediaRepository::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresMediaRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresMediaRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMediaRepository")
            .field("pool", &self.pool.state())
            .finish()
    }
}

fn cancelled(operation: &str) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::Cancelled(operation.to_string()))
}

/// Abort a transaction whose request has gone away, before it commits.
fn ensure_active(cancel: &CancellationToken, operation: &str) -> DatabaseResult<()> {
    if cancel.is_cancelled() {
        Err(cancelled(operation))
    } else {
        Ok(())
    }
}

impl PostgresMediaRepository {
    /// Create a repository over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `work` on a pooled connection off the async runtime.
    ///
    /// Cancellation is honoured before a connection is taken; inside `work`
    /// transactions re-check it just before committing.
    async fn run<T, F>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        work: F,
    ) -> GalleristResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection, &CancellationToken) -> DatabaseResult<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(cancelled(operation).into());
        }

        let pool = self.pool.clone();
        let token = cancel.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn, &token)
        })
        .await
        .map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Query(format!(
                "blocking task failed: {}",
                e
            )))
        })
        .and_then(|r| r);

        result.map_err(|e| e.in_operation(operation).into())
    }
}

fn group_exists(conn: &mut PgConnection, group_id: Uuid) -> DatabaseResult<bool> {
    let found: Vec<Uuid> = media_groups::table
        .find(group_id)
        .select(media_groups::id)
        .load(conn)?;
    Ok(!found.is_empty())
}

fn insert_media_rows(conn: &mut PgConnection, rows: &[MediaRow]) -> DatabaseResult<Vec<MediaRow>> {
    let mut stored = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(INSERT_CHUNK) {
        let inserted: Vec<MediaRow> = diesel::insert_into(media::table)
            .values(chunk)
            .returning(MediaRow::as_returning())
            .get_results(conn)?;
        stored.extend(inserted);
    }
    Ok(stored)
}

fn attach_items(
    conn: &mut PgConnection,
    group_id: Uuid,
    media_ids: &[Uuid],
    cancel: &CancellationToken,
) -> DatabaseResult<Vec<MediaGroupItemRow>> {
    conn.transaction::<_, DatabaseError, _>(|conn| {
        // Row lock on the group serializes attachments to it and proves it exists.
        let locked: Vec<Uuid> = media_groups::table
            .find(group_id)
            .select(media_groups::id)
            .for_update()
            .load(conn)?;
        if locked.is_empty() {
            return Err(DatabaseError::new(DatabaseErrorKind::ReferencedGroupMissing(
                group_id.to_string(),
            )));
        }

        let found: HashSet<Uuid> = media::table
            .filter(media::id.eq_any(media_ids))
            .select(media::id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect();
        let missing: Vec<String> = media_ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatabaseError::new(DatabaseErrorKind::ReferencedMediaMissing(
                missing.join(", "),
            )));
        }

        let attached: HashSet<Uuid> = media_group_items::table
            .filter(media_group_items::group_id.eq(group_id))
            .filter(media_group_items::media_id.eq_any(media_ids))
            .select(media_group_items::media_id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect();

        let max_position: Option<i32> = media_group_items::table
            .filter(media_group_items::group_id.eq(group_id))
            .select(diesel::dsl::max(media_group_items::position))
            .first(conn)?;

        let mut next = max_position.unwrap_or(0);
        let new_rows: Vec<NewMediaGroupItemRow> = media_ids
            .iter()
            .filter(|id| !attached.contains(id))
            .map(|id| {
                next += 1;
                NewMediaGroupItemRow {
                    group_id,
                    media_id: *id,
                    position: next,
                }
            })
            .collect();

        let inserted = if new_rows.is_empty() {
            Vec::new()
        } else {
            diesel::insert_into(media_group_items::table)
                .values(&new_rows)
                .on_conflict((media_group_items::group_id, media_group_items::media_id))
                .do_nothing()
                .returning(MediaGroupItemRow::as_returning())
                .get_results(conn)?
        };

        ensure_active(cancel, "add_media_group_items")?;
        Ok(inserted)
    })
}

#[async_trait]
impl MediaRepository for PostgresMediaRepository {
    #[tracing::instrument(skip(self, record, cancel), fields(media_id = %record.id))]
    async fn create_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        let row = MediaRow::try_from(record)?;
        let stored = self
            .run("create_media", cancel, move |conn, cancel| {
                conn.transaction::<_, DatabaseError, _>(|conn| {
                    let stored: MediaRow = diesel::insert_into(media::table)
                        .values(&row)
                        .returning(MediaRow::as_returning())
                        .get_result(conn)?;
                    ensure_active(cancel, "create_media")?;
                    Ok(stored)
                })
            })
            .await?;

        tracing::info!(media_id = %stored.id, "Inserted media record");
        Ok(MediaRecord::try_from(stored)?)
    }

    #[tracing::instrument(skip(self, records, cancel), fields(count = records.len()))]
    async fn create_multiple_media(
        &self,
        records: &[MediaRecord],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let rows = records
            .iter()
            .map(MediaRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self
            .run("create_multiple_media", cancel, move |conn, cancel| {
                conn.transaction::<_, DatabaseError, _>(|conn| {
                    let stored = insert_media_rows(conn, &rows)?;
                    ensure_active(cancel, "create_multiple_media")?;
                    Ok(stored)
                })
            })
            .await?;

        tracing::info!(count = stored.len(), "Inserted media batch");
        Ok(rows_to_records(stored)?)
    }

    #[tracing::instrument(skip(self, record, cancel), fields(media_id = %record.id))]
    async fn update_media(
        &self,
        record: &MediaRecord,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        let id = record.id.as_uuid();
        let changes = UpdateMediaRow::try_from(record)?;
        let stored = self
            .run("update_media", cancel, move |conn, cancel| {
                conn.transaction::<_, DatabaseError, _>(|conn| {
                    let stored: MediaRow = diesel::update(media::table.find(id))
                        .set(&changes)
                        .returning(MediaRow::as_returning())
                        .get_result(conn)?;
                    ensure_active(cancel, "update_media")?;
                    Ok(stored)
                })
            })
            .await?;

        tracing::info!(media_id = %stored.id, "Updated media record");
        Ok(MediaRecord::try_from(stored)?)
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn find_by_id(
        &self,
        id: MediaId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaRecord> {
        let id = id.as_uuid();
        let row = self
            .run("find_by_id", cancel, move |conn, _| {
                Ok(media::table
                    .find(id)
                    .select(MediaRow::as_select())
                    .first::<MediaRow>(conn)?)
            })
            .await?;
        Ok(MediaRecord::try_from(row)?)
    }

    #[tracing::instrument(skip(self, description, cancel))]
    async fn add_media_group(
        &self,
        owner_id: UserId,
        description: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        let new_group = NewMediaGroupRow {
            id: Uuid::new_v4(),
            owner_id: owner_id.as_uuid(),
            description: description.to_string(),
        };
        let row = self
            .run("add_media_group", cancel, move |conn, _| {
                Ok(diesel::insert_into(media_groups::table)
                    .values(&new_group)
                    .returning(MediaGroupRow::as_returning())
                    .get_result::<MediaGroupRow>(conn)?)
            })
            .await?;

        tracing::info!(group_id = %row.id, "Created media group");
        Ok(row.into())
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn get_group(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaGroup> {
        let id = group_id.as_uuid();
        let row = self
            .run("get_group", cancel, move |conn, _| {
                Ok(media_groups::table
                    .find(id)
                    .select(MediaGroupRow::as_select())
                    .first::<MediaGroupRow>(conn)?)
            })
            .await?;
        Ok(row.into())
    }

    #[tracing::instrument(skip(self, media_ids, cancel), fields(count = media_ids.len()))]
    async fn add_media_group_items(
        &self,
        group_id: GroupId,
        media_ids: &[MediaId],
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        let group = group_id.as_uuid();
        let ids: Vec<Uuid> = dedup_preserving_order(media_ids)
            .into_iter()
            .map(|id| id.as_uuid())
            .collect();

        let inserted = self
            .run("add_media_group_items", cancel, move |conn, cancel| {
                attach_items(conn, group, &ids, cancel)
            })
            .await?;

        tracing::info!(
            group_id = %group_id,
            inserted = inserted.len(),
            "Attached media to group"
        );
        Ok(inserted.into_iter().map(MediaGroupItem::from).collect())
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn get_group_items(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaGroupItem>> {
        let id = group_id.as_uuid();
        let rows = self
            .run("get_group_items", cancel, move |conn, _| {
                if !group_exists(conn, id)? {
                    return Err(DatabaseError::new(DatabaseErrorKind::NotFound));
                }
                Ok(media_group_items::table
                    .filter(media_group_items::group_id.eq(id))
                    .order(media_group_items::position.asc())
                    .select(MediaGroupItemRow::as_select())
                    .load::<MediaGroupItemRow>(conn)?)
            })
            .await?;
        Ok(rows.into_iter().map(MediaGroupItem::from).collect())
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn get_media_by_group_id(
        &self,
        group_id: GroupId,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<MediaRecord>> {
        let id = group_id.as_uuid();
        let rows = self
            .run("get_media_by_group_id", cancel, move |conn, _| {
                if !group_exists(conn, id)? {
                    return Err(DatabaseError::new(DatabaseErrorKind::NotFound));
                }
                Ok(media_group_items::table
                    .inner_join(media::table)
                    .filter(media_group_items::group_id.eq(id))
                    .order(media_group_items::position.asc())
                    .select(MediaRow::as_select())
                    .load::<MediaRow>(conn)?)
            })
            .await?;
        Ok(rows_to_records(rows)?)
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn get_all_images(
        &self,
        limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> GalleristResult<MediaPage> {
        check_limit(limit)?;
        let photo = MediaKind::Photo.as_str().to_string();
        let (rows, total) = self
            .run("get_all_images", cancel, move |conn, _| {
                conn.build_transaction()
                    .read_only()
                    .repeatable_read()
                    .run::<_, DatabaseError, _>(|conn| {
                        let total: i64 = media::table
                            .filter(media::kind.eq(&photo))
                            .filter(media::is_public.eq(true))
                            .count()
                            .get_result(conn)?;

                        let mut query = media::table
                            .filter(media::kind.eq(&photo))
                            .filter(media::is_public.eq(true))
                            .order((media::created_at.desc(), media::id.asc()))
                            .select(MediaRow::as_select())
                            .into_boxed();
                        if let Some(limit) = limit {
                            query = query.limit(limit);
                        }
                        Ok((query.load::<MediaRow>(conn)?, total))
                    })
            })
            .await?;

        tracing::debug!(count = rows.len(), total, "Loaded public images");
        Ok(MediaPage {
            items: rows_to_records(rows)?,
            total,
        })
    }

    #[tracing::instrument(skip(self, paths, cancel), fields(count = paths.len()))]
    async fn existing_storage_paths(
        &self,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> GalleristResult<HashSet<String>> {
        let paths = paths.to_vec();
        self.run("existing_storage_paths", cancel, move |conn, _| {
            let mut found = HashSet::new();
            for chunk in paths.chunks(INSERT_CHUNK) {
                let hits: Vec<String> = media::table
                    .filter(media::storage_path.eq_any(chunk))
                    .select(media::storage_path)
                    .load(conn)?;
                found.extend(hits);
            }
            Ok(found)
        })
        .await
    }
}
