//! Top-level error wrapper types.

use crate::{
    ConfigError, DatabaseError, DatabaseErrorKind, InputError, StorageError, StorageErrorKind,
    ValidationError,
};

/// Every failure a Gallerist operation can report.
///
/// # Examples
///
/// ```
/// use gallerist_error::{GalleristError, StorageError, StorageErrorKind};
///
/// let err: GalleristError =
///     StorageError::new(StorageErrorKind::Cancelled("user/a.png".to_string())).into();
/// assert!(err.is_cancelled());
/// assert!(format!("{}", err).contains("cancelled"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum GalleristErrorKind {
    /// Blob store error
    #[from(StorageError)]
    Storage(StorageError),
    /// Relational store error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Domain rule violations
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Structurally invalid input, rejected before any I/O
    #[from(InputError)]
    Input(InputError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Gallerist error with kind discrimination.
///
/// # Examples
///
/// ```
/// use gallerist_error::{GalleristResult, InputError};
///
/// fn might_fail() -> GalleristResult<()> {
///     Err(InputError::new("group id must not be nil"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(!err.is_not_found());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Gallerist Error: {}", _0)]
pub struct GalleristError(Box<GalleristErrorKind>);

impl GalleristError {
    /// Create a new error from a kind.
    pub fn new(kind: GalleristErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &GalleristErrorKind {
        &self.0
    }

    /// True when the caller's cancellation signal fired ("client went away").
    pub fn is_cancelled(&self) -> bool {
        match self.kind() {
            GalleristErrorKind::Storage(e) => matches!(e.kind, StorageErrorKind::Cancelled(_)),
            GalleristErrorKind::Database(e) => matches!(e.kind, DatabaseErrorKind::Cancelled(_)),
            _ => false,
        }
    }

    /// True for missing records and missing attach references (404-equivalent).
    pub fn is_not_found(&self) -> bool {
        match self.kind() {
            GalleristErrorKind::Database(e) => e.kind.is_not_found(),
            GalleristErrorKind::Storage(e) => matches!(e.kind, StorageErrorKind::NotFound(_)),
            _ => false,
        }
    }

    /// True when domain validation rejected the input.
    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), GalleristErrorKind::Validation(_))
    }

    /// The aggregated violations, if this is a validation failure.
    pub fn violations(&self) -> Option<&[String]> {
        match self.kind() {
            GalleristErrorKind::Validation(e) => Some(&e.violations),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to GalleristErrorKind
impl<T> From<T> for GalleristError
where
    T: Into<GalleristErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Gallerist operations.
pub type GalleristResult<T> = std::result::Result<T, GalleristError>;
