//! Diesel row types and their conversions to domain records.

use crate::schema::{media, media_group_items, media_groups};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use gallerist_core::{GroupId, MediaGroup, MediaGroupItem, MediaKind, MediaRecord, Metadata};
use gallerist_error::{DatabaseError, DatabaseErrorKind};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Database row for the media table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = media)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MediaRow {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub filename: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub is_public: bool,
    pub metadata: JsonValue,
}

/// Changeset for the mutable subset of a media row.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = media)]
pub struct UpdateMediaRow {
    pub filename: String,
    pub is_public: bool,
    pub metadata: JsonValue,
}

/// Database row for the media_groups table.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = media_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MediaGroupRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Insertable group; `created_at` is assigned by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = media_groups)]
pub struct NewMediaGroupRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub description: String,
}

/// Database row for the media_group_items table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = media_group_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MediaGroupItemRow {
    pub group_id: Uuid,
    pub media_id: Uuid,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Insertable membership; `created_at` is assigned by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = media_group_items)]
pub struct NewMediaGroupItemRow {
    pub group_id: Uuid,
    pub media_id: Uuid,
    pub position: i32,
}

impl TryFrom<&MediaRecord> for MediaRow {
    type Error = DatabaseError;

    fn try_from(record: &MediaRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.as_uuid(),
            uploader_id: record.uploader_id.as_uuid(),
            created_at: record.created_at,
            kind: record.kind.as_str().to_string(),
            filename: record.filename.clone(),
            storage_path: record.storage_path.clone(),
            size_bytes: record.size_bytes,
            mime_type: record.mime_type.clone(),
            width: record.width,
            height: record.height,
            duration_seconds: record.duration_seconds,
            is_public: record.is_public,
            metadata: record.metadata.to_value()?,
        })
    }
}

impl TryFrom<&MediaRecord> for UpdateMediaRow {
    type Error = DatabaseError;

    fn try_from(record: &MediaRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            filename: record.filename.clone(),
            is_public: record.is_public,
            metadata: record.metadata.to_value()?,
        })
    }
}

impl TryFrom<MediaRow> for MediaRecord {
    type Error = DatabaseError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        let kind: MediaKind = row.kind.parse().map_err(|_| {
            DatabaseError::new(DatabaseErrorKind::Serialization(format!(
                "unknown media kind '{}' on media {}",
                row.kind, row.id
            )))
        })?;

        Ok(Self {
            id: row.id.into(),
            uploader_id: row.uploader_id.into(),
            created_at: row.created_at,
            kind,
            filename: row.filename,
            storage_path: row.storage_path,
            size_bytes: row.size_bytes,
            mime_type: row.mime_type,
            width: row.width,
            height: row.height,
            duration_seconds: row.duration_seconds,
            is_public: row.is_public,
            metadata: Metadata::from_value(&row.metadata),
        })
    }
}

impl From<MediaGroupRow> for MediaGroup {
    fn from(row: MediaGroupRow) -> Self {
        Self {
            id: row.id.into(),
            owner_id: row.owner_id.into(),
            description: row.description,
            created_at: row.created_at,
        }
    }
}

impl From<MediaGroupItemRow> for MediaGroupItem {
    fn from(row: MediaGroupItemRow) -> Self {
        Self {
            group_id: GroupId::from(row.group_id),
            media_id: row.media_id.into(),
            position: row.position,
            created_at: row.created_at,
        }
    }
}

/// Convert a batch of rows, failing on the first unreadable one.
pub(crate) fn rows_to_records(rows: Vec<MediaRow>) -> Result<Vec<MediaRecord>, DatabaseError> {
    rows.into_iter().map(MediaRecord::try_from).collect()
}
