//! Upload requests.

use chrono::Utc;
use gallerist_core::{MediaId, MediaKind, MediaRecord, Metadata, UserId};
use gallerist_storage::{BlobReader, BlobUpload, SavedBlob};
use tokio::io::AsyncRead;

/// One file to ingest, with the attributes its record will carry.
///
/// # Example
///
/// ```
/// use gallerist::{MediaKind, UploadInput, UserId};
///
/// let upload = UploadInput::from_bytes(
///     UserId::generate(),
///     MediaKind::Photo,
///     "beach.jpg",
///     "image/jpeg",
///     vec![0u8; 100],
/// )
/// .with_width(800)
/// .with_height(600)
/// .with_is_public(true);
/// assert_eq!(upload.width, Some(800));
/// ```
#[derive(derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct UploadInput {
    /// Who is uploading
    pub uploader_id: UserId,
    /// Media kind
    pub kind: MediaKind,
    /// Original filename, kept on the record only
    #[setters(into)]
    pub filename: String,
    /// MIME type
    #[setters(into)]
    pub mime_type: String,
    /// Width in pixels
    pub width: Option<i32>,
    /// Height in pixels
    pub height: Option<i32>,
    /// Duration in seconds
    pub duration_seconds: Option<f64>,
    /// Whether the record appears in public listings
    pub is_public: bool,
    /// Free-form metadata
    pub metadata: Metadata,
    /// File content
    #[setters(skip)]
    pub content: BlobReader,
}

impl UploadInput {
    /// Upload from any async reader.
    pub fn new(
        uploader_id: UserId,
        kind: MediaKind,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            uploader_id,
            kind,
            filename: filename.into(),
            mime_type: mime_type.into(),
            width: None,
            height: None,
            duration_seconds: None,
            is_public: false,
            metadata: Metadata::empty(),
            content: Box::new(content),
        }
    }

    /// Upload from an in-memory buffer.
    pub fn from_bytes(
        uploader_id: UserId,
        kind: MediaKind,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self::new(
            uploader_id,
            kind,
            filename,
            mime_type,
            std::io::Cursor::new(bytes),
        )
    }
}

/// Record attributes fixed before the blob is written.
#[derive(Debug)]
pub(crate) struct RecordDraft {
    pub(crate) id: MediaId,
    uploader_id: UserId,
    kind: MediaKind,
    filename: String,
    mime_type: String,
    width: Option<i32>,
    height: Option<i32>,
    duration_seconds: Option<f64>,
    is_public: bool,
    metadata: Metadata,
}

impl UploadInput {
    /// Assign a fresh id and split into the record draft and the blob to
    /// write under its collision-free storage name.
    pub(crate) fn into_parts(self) -> (RecordDraft, BlobUpload) {
        let id = MediaId::generate();
        let blob = BlobUpload {
            filename: storage_filename(id, &self.filename),
            content: self.content,
        };
        let draft = RecordDraft {
            id,
            uploader_id: self.uploader_id,
            kind: self.kind,
            filename: self.filename,
            mime_type: self.mime_type,
            width: self.width,
            height: self.height,
            duration_seconds: self.duration_seconds,
            is_public: self.is_public,
            metadata: self.metadata,
        };
        (draft, blob)
    }
}

impl RecordDraft {
    /// Complete the record with where its blob landed.
    pub(crate) fn to_record(&self, saved: &SavedBlob) -> MediaRecord {
        MediaRecord {
            id: self.id,
            uploader_id: self.uploader_id,
            created_at: Utc::now(),
            kind: self.kind,
            filename: self.filename.clone(),
            storage_path: saved.relative_path.clone(),
            size_bytes: saved.size_bytes,
            mime_type: self.mime_type.clone(),
            width: self.width,
            height: self.height,
            duration_seconds: self.duration_seconds,
            is_public: self.is_public,
            metadata: self.metadata.clone(),
        }
    }
}

impl std::fmt::Debug for UploadInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadInput")
            .field("uploader_id", &self.uploader_id)
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Name a blob is stored under: `{media_id}{.ext}`.
///
/// The extension is taken from the original filename when it is short and
/// alphanumeric; anything else is dropped.
fn storage_filename(id: MediaId, original: &str) -> String {
    let extension = std::path::Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => format!("{}.{}", id, ext.to_ascii_lowercase()),
        None => id.to_string(),
    }
}
