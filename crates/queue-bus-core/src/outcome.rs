//! Tagged operation outcome returned by every boundary operation.

use serde::Serialize;

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;

/// Result of a queue or configuration operation
///
/// Exactly one of success or failure holds: a success carries a value and a
/// human-readable message and never carries errors; a failure carries no
/// value, a summary message, and a non-empty ordered list of error strings.
/// Callers always receive one of these, never a raw error.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome<T> {
    success: bool,
    message: String,
    value: Option<T>,
    errors: Vec<String>,
}

impl<T> OperationOutcome<T> {
    /// Create a success outcome carrying a value
    pub fn success(value: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            value: Some(value),
            errors: Vec::new(),
        }
    }

    /// Create a failure outcome from a list of error strings
    ///
    /// Blank entries are dropped and the remainder trimmed; when nothing
    /// usable remains the summary message doubles as the single error so the
    /// error list is never empty.
    pub fn failure(errors: Vec<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut cleaned: Vec<String> = errors
            .into_iter()
            .map(|error| error.trim().to_string())
            .filter(|error| !error.is_empty())
            .collect();

        if cleaned.is_empty() {
            cleaned.push(message.clone());
        }

        Self {
            success: false,
            message,
            value: None,
            errors: cleaned,
        }
    }

    /// Create a failure outcome from a single error string
    pub fn failure_with(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failure(vec![error.into()], message)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consume the outcome, yielding its value if successful
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}
