//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Marketplace rule violations.
///
/// These errors are returned by the session lifecycle, review and ledger
/// rules. They are independent of the web/storage layers, which wrap them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Actor has no rights over the target entity
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Illegal status change
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Business precondition not met (e.g. review on an unfinished session)
    #[error("Not eligible: {0}")]
    NotEligible(String),

    /// Rating outside 1..=5 or not a whole number. Carries the value as
    /// submitted.
    #[error("Invalid rating: {0} (must be a whole number between 1 and 5)")]
    InvalidRating(String),

    /// Session times are inconsistent
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Hourly rate is negative or malformed
    #[error("Invalid hourly rate: {0}")]
    InvalidRate(String),

    /// Booking overlap or a race lost to a concurrent writer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input that is not covered by a more specific kind
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DomainError {
    /// Create a not-found error for the given entity kind
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a transition error
    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !self.is_conflict_error()
    }

    /// Check if this is a conflict error (the state moved underneath the caller)
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// `InvalidRequest` if `value` is longer than `max` characters
pub(crate) fn ensure_max_chars(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::InvalidRequest(format!(
            "{} exceeds {} characters",
            field, max
        )));
    }
    Ok(())
}
