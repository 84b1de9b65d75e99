//! Durable blob storage for Gallerist media.
//!
//! Bytes live in a blob store keyed by a path relative to the store root; the
//! relational store only ever records that relative path. Every write is
//! cancellable and never leaves a partial file behind.
//!
//! # Example
//!
//! ```rust
//! use gallerist_storage::{BlobStore, BlobUpload, FileSystemBlobStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileSystemBlobStore::new("/tmp/gallerist", "https://cdn.example.com/media")?;
//! let cancel = CancellationToken::new();
//!
//! let upload = BlobUpload::from_bytes("hello.txt", b"hello".to_vec());
//! let saved = store.save(upload, "uploader-1", &cancel).await?;
//! assert_eq!(saved.relative_path, "uploader-1/hello.txt");
//! assert_eq!(saved.size_bytes, 5);
//!
//! store.delete(&saved.relative_path).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod path;
mod store;

pub use filesystem::FileSystemBlobStore;
pub use gallerist_error::{StorageError, StorageErrorKind};
pub use path::join_relative;
pub use store::{BlobEntry, BlobReader, BlobStore, BlobUpload, SavedBlob};
