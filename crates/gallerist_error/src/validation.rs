//! Domain validation errors.

/// Aggregated domain rule violations for a single record or batch.
///
/// Every violated rule is reported, not just the first one.
///
/// # Examples
///
/// ```
/// use gallerist_error::ValidationError;
///
/// let err = ValidationError::new(vec![
///     "width is required for photo media".to_string(),
///     "height is required for photo media".to_string(),
/// ]);
/// let text = err.to_string();
/// assert!(text.contains("width"));
/// assert!(text.contains("height"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {}", violations.join("; "))]
pub struct ValidationError {
    /// Human-readable rule violations
    pub violations: Vec<String>,
    /// Line number where the error was created
    pub line: u32,
    /// File where the error was created
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new validation error from a list of violations.
    #[track_caller]
    pub fn new(violations: Vec<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            violations,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Returns true if any violation contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.violations.iter().any(|v| v.contains(needle))
    }
}
