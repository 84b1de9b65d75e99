//! Domain validation for media records.

use crate::{MAX_FILENAME_CHARS, MAX_METADATA_BYTES, MAX_MIME_TYPE_CHARS, MediaRecord};
use gallerist_error::ValidationError;

/// Validate a record against the media invariants.
///
/// Pure: no I/O. Collects every violation rather than stopping at the first,
/// so a caller can show the uploader the complete list.
///
/// # Examples
///
/// ```
/// use gallerist_core::{validate_record, MediaId, MediaKind, MediaRecord, Metadata, UserId};
///
/// let record = MediaRecord {
///     id: MediaId::generate(),
///     uploader_id: UserId::generate(),
///     created_at: chrono::Utc::now(),
///     kind: MediaKind::Photo,
///     filename: "cat.png".to_string(),
///     storage_path: "u/cat.png".to_string(),
///     size_bytes: 100,
///     mime_type: "image/png".to_string(),
///     width: Some(0),
///     height: Some(480),
///     duration_seconds: None,
///     is_public: true,
///     metadata: Metadata::empty(),
/// };
///
/// let err = validate_record(&record).unwrap_err();
/// assert!(err.mentions("width and height must be positive values"));
/// ```
pub fn validate_record(record: &MediaRecord) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if record.uploader_id.is_nil() {
        violations.push("uploader id is required".to_string());
    }

    if record.size_bytes <= 0 {
        violations.push("size must be greater than zero".to_string());
    }

    if record.filename.trim().is_empty() {
        violations.push("filename is required".to_string());
    } else if record.filename.chars().count() > MAX_FILENAME_CHARS {
        violations.push(format!(
            "filename must be at most {} characters",
            MAX_FILENAME_CHARS
        ));
    }

    if record.mime_type.trim().is_empty() {
        violations.push("mime type is required".to_string());
    } else if record.mime_type.chars().count() > MAX_MIME_TYPE_CHARS {
        violations.push(format!(
            "mime type must be at most {} characters",
            MAX_MIME_TYPE_CHARS
        ));
    }

    if record.storage_path.is_empty() {
        violations.push("storage path is required".to_string());
    }

    if record.metadata.serialized_len() > MAX_METADATA_BYTES {
        violations.push("metadata must not exceed 1 MiB when serialized".to_string());
    }

    if record.kind.requires_dimensions() {
        if record.width.is_none() {
            violations.push(format!("width is required for {} media", record.kind));
        }
        if record.height.is_none() {
            violations.push(format!("height is required for {} media", record.kind));
        }
        let non_positive = [record.width, record.height]
            .iter()
            .flatten()
            .any(|v| *v <= 0);
        if non_positive {
            violations.push("width and height must be positive values".to_string());
        }
    }

    if record.kind.requires_duration() && record.duration_seconds.is_none() {
        violations.push(format!("duration is required for {} media", record.kind));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}
