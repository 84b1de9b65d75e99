//! Blob store trait definition.

use async_trait::async_trait;
use gallerist_error::GalleristResult;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Streaming source of blob content.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// A file to be written, with the name it will be stored under.
pub struct BlobUpload {
    /// Name of the file inside the destination subpath
    pub filename: String,
    /// Content stream
    pub content: BlobReader,
}

impl BlobUpload {
    /// Upload from any async reader.
    pub fn new(filename: impl Into<String>, content: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            filename: filename.into(),
            content: Box::new(content),
        }
    }

    /// Upload from an in-memory buffer.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(filename, std::io::Cursor::new(bytes))
    }
}

impl std::fmt::Debug for BlobUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobUpload")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Where a blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBlob {
    /// Path relative to the store root, `/`-separated
    pub relative_path: String,
    /// Bytes written
    pub size_bytes: i64,
}

/// A blob found by [`BlobStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Path relative to the store root, `/`-separated
    pub relative_path: String,
    /// Size in bytes
    pub size_bytes: i64,
    /// Last modification time
    pub modified: SystemTime,
}

/// Durable byte storage keyed by relative path.
///
/// Failure of a save cleans up that call's own partial writes. Compensating
/// for a failure further downstream (validation, database) is the caller's
/// job, via [`BlobStore::delete`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stream `upload` into `{base}/{sub_path}/{filename}`.
    ///
    /// Intermediate directories are created as needed. If `cancel` fires
    /// before or during the copy, the partial file is removed and a
    /// cancellation error is returned.
    async fn save(
        &self,
        upload: BlobUpload,
        sub_path: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<SavedBlob>;

    /// Save a batch, all-or-nothing.
    ///
    /// When any file fails, every file already saved by this call is removed
    /// before the error is returned.
    #[tracing::instrument(skip(self, uploads, cancel), fields(count = uploads.len()))]
    async fn save_multiple(
        &self,
        uploads: Vec<BlobUpload>,
        sub_path: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<Vec<SavedBlob>> {
        let mut saved: Vec<SavedBlob> = Vec::with_capacity(uploads.len());

        for upload in uploads {
            match self.save(upload, sub_path, cancel).await {
                Ok(blob) => saved.push(blob),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        rollback = saved.len(),
                        "Batch save failed, removing files saved so far"
                    );
                    for blob in &saved {
                        if let Err(cleanup) = self.delete(&blob.relative_path).await {
                            tracing::warn!(
                                path = %blob.relative_path,
                                error = %cleanup,
                                "Failed to remove file during batch rollback"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(saved)
    }

    /// Remove a previously saved blob.
    ///
    /// Takes no cancellation signal: compensating deletes must still run
    /// after the originating request has gone away.
    async fn delete(&self, relative_path: &str) -> GalleristResult<()>;

    /// Check whether a blob exists.
    async fn exists(&self, relative_path: &str) -> GalleristResult<bool>;

    /// Recursively list the blobs under `sub_path` (empty for everything).
    ///
    /// Temp files of writes still in flight are not blobs and are skipped.
    async fn list(&self, sub_path: &str) -> GalleristResult<Vec<BlobEntry>>;

    /// Absolute location of a relative path. No I/O.
    ///
    /// The result always lies under the store root, even for absolute or
    /// `..` paths.
    fn full_path(&self, relative_path: &str) -> PathBuf;

    /// Public URL prefix the store is exposed under. No I/O.
    fn base_url(&self) -> &str;

    /// Public URL of a relative path. No I/O.
    fn url_for(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url().trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}
