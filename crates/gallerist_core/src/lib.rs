//! Core data types for the Gallerist media ingestion library.
//!
//! This crate provides the domain records shared by the blob store, the
//! repository and the ingestion service, together with the pure validation
//! rules every [`MediaRecord`] must satisfy before it is persisted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod group;
mod ids;
mod kind;
mod metadata;
mod record;
mod validation;

pub use group::{MediaGroup, MediaGroupItem, MediaPage};
pub use ids::{GroupId, MediaId, UserId};
pub use kind::MediaKind;
pub use metadata::{MAX_METADATA_BYTES, Metadata};
pub use record::{MAX_FILENAME_CHARS, MAX_MIME_TYPE_CHARS, MediaRecord, MediaUpdate};
pub use validation::validate_record;
