//! Database error types.

/// Database error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum DatabaseErrorKind {
    /// Connection failed or the pool could not hand out a connection
    #[display("Database connection error: {}", _0)]
    Connection(String),
    /// Query execution failed
    #[display("Database query error: {}", _0)]
    Query(String),
    /// Serialization/deserialization error
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Migration error
    #[display("Migration error: {}", _0)]
    Migration(String),
    /// Record not found
    #[display("Record not found")]
    NotFound,
    /// A row with the same identity already exists
    #[display("Duplicate record: {}", _0)]
    Duplicate(String),
    /// The group referenced by an attach operation does not exist
    #[display("Referenced group missing: {}", _0)]
    ReferencedGroupMissing(String),
    /// One or more media ids referenced by an attach operation do not exist
    #[display("Referenced media missing: {}", _0)]
    ReferencedMediaMissing(String),
    /// The operation was cancelled before it committed
    #[display("Database operation cancelled: {}", _0)]
    Cancelled(String),
}

impl DatabaseErrorKind {
    /// Returns true for kinds a caller should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatabaseErrorKind::NotFound
                | DatabaseErrorKind::ReferencedGroupMissing(_)
                | DatabaseErrorKind::ReferencedMediaMissing(_)
        )
    }
}

/// Database error with source location tracking.
///
/// # Examples
///
/// ```
/// use gallerist_error::{DatabaseError, DatabaseErrorKind};
///
/// let err = DatabaseError::new(DatabaseErrorKind::NotFound);
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Database Error: {} at line {} in {}", kind, line, file)]
pub struct DatabaseError {
    /// The kind of error that occurred
    pub kind: DatabaseErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DatabaseError {
    /// Create a new DatabaseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Prefix the message with the operation that failed.
    ///
    /// Kinds without a message are left as they are.
    pub fn in_operation(mut self, operation: &str) -> Self {
        match &mut self.kind {
            DatabaseErrorKind::Connection(msg)
            | DatabaseErrorKind::Query(msg)
            | DatabaseErrorKind::Serialization(msg)
            | DatabaseErrorKind::Migration(msg)
            | DatabaseErrorKind::Duplicate(msg) => *msg = format!("{}: {}", operation, msg),
            _ => {}
        }
        self
    }
}

// Diesel error conversions (only available with database feature)
#[cfg(feature = "database")]
impl From<diesel::result::Error> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind as PgKind, Error};

        match err {
            Error::NotFound => DatabaseError::new(DatabaseErrorKind::NotFound),
            Error::DatabaseError(PgKind::UniqueViolation, info) => {
                DatabaseError::new(DatabaseErrorKind::Duplicate(info.message().to_string()))
            }
            Error::DatabaseError(PgKind::ClosedConnection, info) => {
                DatabaseError::new(DatabaseErrorKind::Connection(info.message().to_string()))
            }
            _ => DatabaseError::new(DatabaseErrorKind::Query(err.to_string())),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::ConnectionError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<diesel::r2d2::PoolError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::r2d2::PoolError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<serde_json::Error> for DatabaseError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::new(DatabaseErrorKind::Serialization(err.to_string()))
    }
}
