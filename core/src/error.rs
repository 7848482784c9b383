//! Error types for ticket lifecycle operations.

use crate::types::{TicketId, TicketStatus};
use crate::validation::ValidationErrors;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, TicketError>;

/// Result type alias for record store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure reported by a record store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The operation did not finish before its deadline.
    ///
    /// Any open transaction has been dropped and rolled back.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored row could not be mapped back into a domain record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Errors returned by the lifecycle, resolution and history services.
///
/// Every variant is returned to the immediate caller. Nothing is retried and
/// any open transaction is rolled back before the error surfaces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    // ═══════════════════════════════════════════════════════════
    // Caller errors
    // ═══════════════════════════════════════════════════════════

    /// Input failed field validation or a business rule such as a due
    /// date in the past.
    #[error("Invalid input: {0}")]
    InvalidInput(ValidationErrors),

    /// Requested status is not one of the five legal values.
    #[error("Invalid ticket status: {0:?}")]
    InvalidStatus(String),

    /// Requested status equals the ticket's current status.
    #[error("Ticket is already {0}")]
    NoOpTransition(TicketStatus),

    /// Resolution attempted on a ticket that is already resolved, or that
    /// was resolved once and reopened.
    #[error("Ticket {0} is already resolved")]
    AlreadyResolved(TicketId),

    /// Referenced record does not exist (or is soft-deleted).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Identifier looked up
        id: i64,
    },

    // ═══════════════════════════════════════════════════════════
    // System errors
    // ═══════════════════════════════════════════════════════════

    /// Underlying store failed, including inside a multi-step transaction.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl TicketError {
    /// Shorthand for a missing ticket.
    #[must_use]
    pub const fn ticket_not_found(id: TicketId) -> Self {
        Self::NotFound {
            entity: "ticket",
            id: id.0,
        }
    }

    /// Returns `true` if the caller can fix this error by changing the request.
    ///
    /// # Examples
    ///
    /// ```
    /// use helpdesk_core::error::{StoreError, TicketError};
    ///
    /// assert!(TicketError::InvalidStatus("DONE".into()).is_user_error());
    /// assert!(!TicketError::Storage(StoreError::Database("down".into())).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidStatus(_)
                | Self::NoOpTransition(_)
                | Self::AlreadyResolved(_)
                | Self::NotFound { .. }
        )
    }

    /// Single-field input error.
    #[must_use]
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput(ValidationErrors::single(field, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = TicketError::ticket_not_found(TicketId(42));
        assert_eq!(err.to_string(), "ticket 42 not found");
    }

    #[test]
    fn storage_error_is_transparent() {
        let err: TicketError = StoreError::Database("connection reset".into()).into();
        assert_eq!(err.to_string(), "Database error: connection reset");
        assert!(!err.is_user_error());
    }

    #[test]
    fn timeout_display() {
        let err = StoreError::Timeout(Duration::from_secs(2));
        assert!(err.to_string().contains("2s"));
    }

    #[test]
    fn no_op_transition_names_status() {
        let err = TicketError::NoOpTransition(TicketStatus::OnHold);
        assert_eq!(err.to_string(), "Ticket is already ONHOLD");
    }

    #[test]
    fn invalid_field_display() {
        let err = TicketError::invalid_field("due_at", "due date cannot be in the past");
        assert_eq!(err.to_string(), "Invalid input: due_at: due date cannot be in the past");
        assert!(err.is_user_error());
    }
}
