//! Structural input errors.

/// Input rejected before any storage or database work was attempted.
///
/// Distinct from [`ValidationError`](crate::ValidationError): nothing was
/// written, so there is nothing to compensate.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Invalid Input: {} at line {} in {}", message, line, file)]
pub struct InputError {
    /// What was wrong with the input
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl InputError {
    /// Create a new InputError at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
