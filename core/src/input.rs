//! Caller-supplied inputs for the ticket workflows.
//!
//! These are the already-bound request bodies handed over by the transport
//! layer. Each carries its own field rules via [`Validate`].

use crate::types::TicketPriority;
use crate::validation::{FieldLimits, Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for filing a new ticket.
///
/// `status` is accepted for wire compatibility but never honored: new
/// tickets always start OPEN.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicketInput {
    /// Human ticket code
    pub ticket_code: String,
    /// Project reference
    pub project_id: i64,
    /// Location reference
    pub location_id: i64,
    /// Part reference
    pub part_id: i64,
    /// Asset reference
    pub asset_id: i64,
    /// Assignee
    pub assigned_to_id: i64,
    /// Priority
    pub priority: Option<TicketPriority>,
    /// Description
    pub description: String,
    /// Attachment reference
    #[serde(default)]
    pub attachment: Option<String>,
    /// Due date; must lie in the future
    pub due_at: Option<DateTime<Utc>>,
    /// Ignored
    #[serde(default)]
    pub status: Option<String>,
}

impl Validate for CreateTicketInput {
    fn validate_fields(&self, limits: &FieldLimits, errors: &mut ValidationErrors) {
        errors.require_text("ticket_code", &self.ticket_code, limits.ticket_code);
        errors.require_id("project_id", self.project_id);
        errors.require_id("location_id", self.location_id);
        errors.require_id("part_id", self.part_id);
        errors.require_id("asset_id", self.asset_id);
        errors.require_id("assigned_to_id", self.assigned_to_id);
        errors.require_some("priority", self.priority.as_ref());
        errors.require_text("description", &self.description, limits.description);
        if let Some(attachment) = &self.attachment {
            errors.limit_text("attachment", attachment, limits.attachment);
        }
        errors.require_some("due_at", self.due_at.as_ref());
    }
}

/// Input for a status change.
///
/// The status is kept as raw text so that unknown values surface as
/// [`TicketError::InvalidStatus`](crate::error::TicketError::InvalidStatus)
/// rather than a binding failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTicketStatusInput {
    /// Requested status
    pub status: String,
}

impl UpdateTicketStatusInput {
    /// Input requesting `status`.
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

impl Validate for UpdateTicketStatusInput {
    fn validate_fields(&self, _limits: &FieldLimits, errors: &mut ValidationErrors) {
        if self.status.trim().is_empty() {
            errors.add("status", "is required");
        }
    }
}

/// Input for resolving a ticket.
///
/// The ticket itself is addressed separately, by the caller's route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResolutionInput {
    /// Root cause
    pub cause_id: i64,
    /// Applied solution
    pub solution_id: i64,
    /// Notes
    #[serde(default)]
    pub resolution_notes: String,
    /// When the work was completed; defaults to now
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    /// Attachment URL
    #[serde(default)]
    pub attachment_url: String,
}

impl Validate for CreateResolutionInput {
    fn validate_fields(&self, limits: &FieldLimits, errors: &mut ValidationErrors) {
        errors.require_id("cause_id", self.cause_id);
        errors.require_id("solution_id", self.solution_id);
        errors.limit_text("resolution_notes", &self.resolution_notes, limits.resolution_notes);
        errors.limit_text("attachment_url", &self.attachment_url, limits.attachment);
    }
}

/// Input for commenting on a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommentInput {
    /// Comment body
    pub message: String,
}

impl CreateCommentInput {
    /// Comment with the given body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validate for CreateCommentInput {
    fn validate_fields(&self, limits: &FieldLimits, errors: &mut ValidationErrors) {
        errors.require_text("message", &self.message, limits.comment);
    }
}
