//! Error types for the Gallerist library.
//!
//! This crate provides the error taxonomy shared by every Gallerist crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! The top-level [`GalleristError`] answers the questions callers actually ask:
//! was the client gone ([`GalleristError::is_cancelled`]), is this a 404
//! ([`GalleristError::is_not_found`]), or was the input rejected
//! ([`GalleristError::is_validation`]).
//!
//! # Examples
//!
//! ```
//! use gallerist_error::{GalleristResult, InputError};
//!
//! fn check_batch(ids: &[u32]) -> GalleristResult<()> {
//!     if ids.is_empty() {
//!         Err(InputError::new("media id list must not be empty"))?
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_batch(&[]).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod input;
mod storage;
mod validation;

pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{GalleristError, GalleristErrorKind, GalleristResult};
pub use input::InputError;
pub use storage::{StorageError, StorageErrorKind};
pub use validation::ValidationError;
