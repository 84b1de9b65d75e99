//! Filesystem-based blob storage implementation.

use crate::path::{
    confine, is_partial, join_relative, normal_components, partial_name, relative_to, resolve,
};
use crate::{BlobEntry, BlobStore, BlobUpload, SavedBlob};
use gallerist_error::{GalleristResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Filesystem blob store.
///
/// Stores blobs at `{base_dir}/{sub_path}/{filename}`:
///
/// ```text
/// /var/gallerist/media/
/// ├── 5f0c…(uploader id)/
/// │   ├── 9b1e…(media id).jpg
/// │   └── c47a…(media id).mp4
/// └── 81d2…(uploader id)/
///     └── 02fe…(media id).pdf
/// ```
///
/// Content is streamed into a uniquely named `.{uuid}.part` file next to its
/// destination and renamed into place once complete, so readers never see a
/// half-written blob and concurrent writers never share a temp file. The temp
/// name is independent of the destination name, so any filename the
/// filesystem accepts can be saved. [`BlobStore::list`] skips temp files.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    base_dir: PathBuf,
    base_url: String,
}

impl FileSystemBlobStore {
    /// Create a new filesystem blob store.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(base_dir, base_url))]
    pub fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> GalleristResult<Self> {
        let base_dir = base_dir.into();

        std::fs::create_dir_all(&base_dir).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_dir.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_dir.display(), "Created filesystem blob store");
        Ok(Self {
            base_dir,
            base_url: base_url.into(),
        })
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn cancelled(relative_path: &str) -> StorageError {
        StorageError::new(StorageErrorKind::Cancelled(relative_path.to_string()))
    }

    /// Best-effort removal of a temp file; the caller is already failing.
    async fn discard_partial(temp_path: &Path) {
        if let Err(e) = tokio::fs::remove_file(temp_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %temp_path.display(),
                error = %e,
                "Failed to remove partial upload"
            );
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for FileSystemBlobStore {
    #[tracing::instrument(skip(self, upload, cancel), fields(filename = %upload.filename))]
    async fn save(
        &self,
        upload: BlobUpload,
        sub_path: &str,
        cancel: &CancellationToken,
    ) -> GalleristResult<SavedBlob> {
        let relative_path = join_relative(sub_path, &upload.filename)?;
        let path = resolve(&self.base_dir, &relative_path)?;

        if cancel.is_cancelled() {
            return Err(Self::cancelled(&relative_path).into());
        }

        // Tolerates concurrent creators of the same directory
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let temp_path =
            path.with_file_name(partial_name(&Uuid::new_v4().simple().to_string()));
        let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        let mut content = upload.content;
        let copied = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = async {
                let written = tokio::io::copy(&mut content, &mut file).await?;
                file.flush().await?;
                file.sync_all().await?;
                Ok::<u64, std::io::Error>(written)
            } => Some(result),
        };
        drop(file);

        let written = match copied {
            None => {
                Self::discard_partial(&temp_path).await;
                tracing::info!(path = %relative_path, "Upload cancelled, partial file removed");
                return Err(Self::cancelled(&relative_path).into());
            }
            Some(Err(e)) => {
                Self::discard_partial(&temp_path).await;
                return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
            Some(Ok(written)) => written,
        };

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            Self::discard_partial(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
            .into());
        }

        tracing::info!(path = %relative_path, size = written, "Stored blob");

        Ok(SavedBlob {
            relative_path,
            size_bytes: i64::try_from(written).unwrap_or(i64::MAX),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, relative_path: &str) -> GalleristResult<()> {
        let path = resolve(&self.base_dir, relative_path)?;

        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(relative_path.to_string()))
            } else {
                StorageError::new(StorageErrorKind::Delete(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        tracing::info!(path = %relative_path, "Deleted blob");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, relative_path: &str) -> GalleristResult<bool> {
        let path = resolve(&self.base_dir, relative_path)?;
        tokio::fs::try_exists(&path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()
        })
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, sub_path: &str) -> GalleristResult<Vec<BlobEntry>> {
        let root = normal_components(sub_path)?
            .iter()
            .fold(self.base_dir.clone(), |acc, p| acc.join(p));

        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let read_err = |dir: &Path, e: std::io::Error| {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", dir.display(), e)))
        };

        let mut entries = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| read_err(&dir, e))?;
            while let Some(entry) = reader.next_entry().await.map_err(|e| read_err(&dir, e))? {
                let meta = entry.metadata().await.map_err(|e| read_err(&dir, e))?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                } else if is_partial(&entry.file_name().to_string_lossy()) {
                    tracing::trace!(path = %path.display(), "Skipping in-flight upload");
                } else if let Some(relative_path) = relative_to(&self.base_dir, &path) {
                    entries.push(BlobEntry {
                        relative_path,
                        size_bytes: i64::try_from(meta.len()).unwrap_or(i64::MAX),
                        modified: meta.modified().map_err(|e| read_err(&path, e))?,
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        tracing::debug!(count = entries.len(), "Listed blobs");
        Ok(entries)
    }

    fn full_path(&self, relative_path: &str) -> PathBuf {
        confine(&self.base_dir, relative_path)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
