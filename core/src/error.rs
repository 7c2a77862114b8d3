//! Errors raised by the domain operations layer.

use crate::model::ProjectId;

/// Error type for domain operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    /// A required text field was empty after trimming.
    #[error("{field} must not be empty")]
    Validation { field: &'static str },

    /// The owning project does not exist (or was deleted).
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Reject blank required text.
pub fn require_text(field: &'static str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation { field });
    }
    Ok(())
}
