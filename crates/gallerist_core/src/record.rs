//! The media record and its mutable subset.

use crate::{MediaId, MediaKind, Metadata, UserId, validate_record};
use chrono::{DateTime, Utc};
use gallerist_error::ValidationError;
use serde::{Deserialize, Serialize};

/// Maximum original filename length, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Maximum MIME type length, in characters.
pub const MAX_MIME_TYPE_CHARS: usize = 100;

/// One uploaded file.
///
/// Created by the ingestion service after its blob has been written. Only
/// `filename`, `is_public` and `metadata` change afterwards, through
/// [`MediaUpdate`].
///
/// # Examples
///
/// ```
/// use gallerist_core::{MediaId, MediaKind, MediaRecord, Metadata, UserId};
///
/// let record = MediaRecord {
///     id: MediaId::generate(),
///     uploader_id: UserId::generate(),
///     created_at: chrono::Utc::now(),
///     kind: MediaKind::Audio,
///     filename: "interview.ogg".to_string(),
///     storage_path: "uploader/interview.ogg".to_string(),
///     size_bytes: 2048,
///     mime_type: "audio/ogg".to_string(),
///     width: None,
///     height: None,
///     duration_seconds: Some(93.5),
///     is_public: false,
///     metadata: Metadata::empty(),
/// };
///
/// assert!(record.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Record identifier
    pub id: MediaId,
    /// Who uploaded the file
    pub uploader_id: UserId,
    /// Creation time (UTC)
    pub created_at: DateTime<Utc>,
    /// Media kind
    pub kind: MediaKind,
    /// Original filename as supplied by the uploader
    pub filename: String,
    /// Blob location relative to the store's base directory
    pub storage_path: String,
    /// Size of the blob in bytes
    pub size_bytes: i64,
    /// MIME type
    pub mime_type: String,
    /// Width in pixels (photo/video)
    pub width: Option<i32>,
    /// Height in pixels (photo/video)
    pub height: Option<i32>,
    /// Duration in seconds (video, optionally audio)
    pub duration_seconds: Option<f64>,
    /// Whether the record appears in public listings
    pub is_public: bool,
    /// Free-form metadata
    pub metadata: Metadata,
}

impl MediaRecord {
    /// Check every domain rule, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_record(self)
    }
}

/// Changes permitted on an existing record.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaUpdate {
    /// New original filename
    pub filename: Option<String>,
    /// New visibility
    pub is_public: Option<bool>,
    /// Replacement metadata
    pub metadata: Option<Metadata>,
}

impl MediaUpdate {
    /// True when the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.is_public.is_none() && self.metadata.is_none()
    }

    /// Apply to a record, leaving immutable fields as they were.
    pub fn apply(&self, record: &MediaRecord) -> MediaRecord {
        let mut updated = record.clone();
        if let Some(filename) = &self.filename {
            updated.filename = filename.clone();
        }
        if let Some(is_public) = self.is_public {
            updated.is_public = is_public;
        }
        if let Some(metadata) = &self.metadata {
            updated.metadata = metadata.clone();
        }
        updated
    }
}
