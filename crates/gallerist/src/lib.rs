//! Gallerist - media ingestion and grouping.
//!
//! Gallerist accepts uploaded files, writes them to a blob store, records
//! them in PostgreSQL and keeps ordered group membership, guaranteeing that
//! files and rows never diverge.
//!
//! # Features
//!
//! - **Compensating uploads**: any failure after the blob write deletes the blob
//! - **All-or-nothing batches**: one bad file fails the whole batch, leaving nothing behind
//! - **Ordered groups**: atomic, idempotent attachment with contiguous positions
//! - **Cached listings**: short-TTL cache in front of the public image listing
//! - **Orphan sweep**: removes blobs left by crashes between write and commit
//!
//! # Architecture
//!
//! Gallerist is organized as a workspace with focused crates:
//!
//! - `gallerist_error` - Error types
//! - `gallerist_core` - Domain records and validation
//! - `gallerist_storage` - Cancellable blob store
//! - `gallerist_database` - PostgreSQL repository and migrations
//! - `gallerist_cache` - Read cache
//!
//! This crate (`gallerist`) adds the ingestion service, configuration and
//! tracing setup, and re-exports everything for convenience.

mod config;
mod service;
mod telemetry;
mod upload;

pub use config::{DatabaseConfig, GalleristConfig, StorageConfig};
pub use service::{ImageListingCache, MediaIngestionService, ReconcileReport};
pub use telemetry::init_tracing;
pub use upload::UploadInput;

// Re-export workspace crates
pub use gallerist_cache::*;
pub use gallerist_core::*;
pub use gallerist_database::{
    InMemoryMediaRepository, MediaRepository, PgPool, PostgresMediaRepository, establish_pool,
    run_migrations,
};
pub use gallerist_error::*;
pub use gallerist_storage::{
    BlobEntry, BlobReader, BlobStore, BlobUpload, FileSystemBlobStore, SavedBlob,
};
