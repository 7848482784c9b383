//! Domain records for tickets, their audit trail, resolutions and comments.
//!
//! Records come in two shapes: the persisted form (`Ticket`, `TicketHistory`,
//! ...) carrying a store-assigned id, and the `New*` form handed to the store
//! for insertion.

use crate::error::TicketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field name recorded in history rows for status changes.
pub const STATUS_FIELD: &str = "status";

/// Ticket identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub i64);

impl TicketId {
    /// Create a ticket ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier, always taken from the identity context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a user ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Newly filed, not yet picked up
    Open,
    /// Being worked on
    InProgress,
    /// Fixed; a resolution exists or `resolved_at` was stamped
    Resolved,
    /// Closed out by the reporter or an agent
    Closed,
    /// Waiting on something outside the helpdesk
    #[serde(rename = "ONHOLD")]
    OnHold,
}

impl TicketStatus {
    /// Every legal status value.
    pub const ALL: [Self; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Resolved,
        Self::Closed,
        Self::OnHold,
    ];

    /// Storage and wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
            Self::OnHold => "ONHOLD",
        }
    }

    /// Parse a status from its wire representation.
    ///
    /// Matching is exact; `"open"` is not a status.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidStatus`] for anything outside the five
    /// legal values.
    pub fn parse(s: &str) -> Result<Self, TicketError> {
        match s {
            "OPEN" => Ok(Self::Open),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "RESOLVED" => Ok(Self::Resolved),
            "CLOSED" => Ok(Self::Closed),
            "ONHOLD" => Ok(Self::OnHold),
            _ => Err(TicketError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ticket priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Urgent
    Urgent,
}

impl TicketPriority {
    /// Storage and wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }

    /// Parse a priority from its storage representation.
    ///
    /// Returns `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "URGENT" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action label of a history row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    /// Ticket was filed
    Created,
    /// A field was changed through a status update
    Updated,
    /// Status was forced by the resolution workflow
    UpdateStatus,
}

impl HistoryAction {
    /// Storage and wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::UpdateStatus => "UPDATE_STATUS",
        }
    }

    /// Parse an action from its storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "UPDATED" => Some(Self::Updated),
            "UPDATE_STATUS" => Some(Self::UpdateStatus),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported issue tracked through the status lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identifier
    pub id: TicketId,
    /// Human ticket code, unique
    pub ticket_code: String,
    /// Project reference
    pub project_id: i64,
    /// Location reference
    pub location_id: i64,
    /// Part reference
    pub part_id: i64,
    /// Asset reference
    pub asset_id: i64,
    /// Who filed the ticket
    pub reporter_id: UserId,
    /// Who is working it
    pub assigned_to_id: UserId,
    /// Current status
    pub status: TicketStatus,
    /// Priority
    pub priority: TicketPriority,
    /// Free-text description
    pub description: String,
    /// Attachment reference
    pub attachment: Option<String>,
    /// When the ticket is due
    pub due_at: DateTime<Utc>,
    /// When the ticket last transitioned to RESOLVED
    pub resolved_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; deleted tickets are never returned by reads
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Whether the ticket has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Ticket ready for insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTicket {
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
    /// Reporter (the acting user)
    pub reporter_id: UserId,
    /// Assignee
    pub assigned_to_id: UserId,
    /// Initial status
    pub status: TicketStatus,
    /// Priority
    pub priority: TicketPriority,
    /// Description
    pub description: String,
    /// Attachment reference
    pub attachment: Option<String>,
    /// Due date
    pub due_at: DateTime<Utc>,
    /// Creation time, also used as the first `updated_at`
    pub created_at: DateTime<Utc>,
}

/// Immutable audit row describing one field-level change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketHistory {
    /// Store-assigned identifier
    pub id: i64,
    /// Owning ticket
    pub ticket_id: TicketId,
    /// Acting user
    pub user_id: UserId,
    /// What happened
    pub action: HistoryAction,
    /// Affected field
    pub field_name: String,
    /// Value before the change
    pub old_value: Option<String>,
    /// Value after the change
    pub new_value: Option<String>,
    /// When the row was written
    pub created_at: DateTime<Utc>,
}

/// History row ready for insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTicketHistory {
    /// Owning ticket
    pub ticket_id: TicketId,
    /// Acting user
    pub user_id: UserId,
    /// What happened
    pub action: HistoryAction,
    /// Affected field
    pub field_name: String,
    /// Value before the change
    pub old_value: Option<String>,
    /// Value after the change
    pub new_value: Option<String>,
    /// When the change happened
    pub created_at: DateTime<Utc>,
}

impl NewTicketHistory {
    /// History row for a change of the `status` field.
    #[must_use]
    pub fn status_change(
        ticket_id: TicketId,
        user_id: UserId,
        action: HistoryAction,
        old: Option<TicketStatus>,
        new: TicketStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket_id,
            user_id,
            action,
            field_name: STATUS_FIELD.to_string(),
            old_value: old.map(|s| s.as_str().to_string()),
            new_value: Some(new.as_str().to_string()),
            created_at: at,
        }
    }
}

/// Root cause catalogue entry, owned by the taxonomy service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    /// Identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Part this cause applies to
    pub part_id: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Solution catalogue entry, owned by the taxonomy service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Cause this solution addresses
    pub cause_id: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Terminal record closing out a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketResolution {
    /// Store-assigned identifier
    pub id: i64,
    /// Resolved ticket
    pub ticket_id: TicketId,
    /// Cause reference
    pub cause_id: i64,
    /// Solution reference
    pub solution_id: i64,
    /// Free-text notes
    pub resolution_notes: String,
    /// When the work was completed
    pub completion_time: DateTime<Utc>,
    /// Attachment URL, empty when none
    pub attachment_url: String,
    /// When the resolution was recorded
    pub created_at: DateTime<Utc>,
    /// Referenced cause, populated on reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
    /// Referenced solution, populated on reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
}

/// Resolution ready for insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTicketResolution {
    /// Resolved ticket
    pub ticket_id: TicketId,
    /// Cause reference
    pub cause_id: i64,
    /// Solution reference
    pub solution_id: i64,
    /// Notes
    pub resolution_notes: String,
    /// Completion time
    pub completion_time: DateTime<Utc>,
    /// Attachment URL
    pub attachment_url: String,
    /// Recording time
    pub created_at: DateTime<Utc>,
}

/// Free-text comment on a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    /// Store-assigned identifier
    pub id: i64,
    /// Ticket commented on
    pub ticket_id: TicketId,
    /// Author
    pub user_id: UserId,
    /// Comment body
    pub message: String,
    /// When it was posted
    pub created_at: DateTime<Utc>,
}

/// Comment ready for insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTicketComment {
    /// Ticket commented on
    pub ticket_id: TicketId,
    /// Author
    pub user_id: UserId,
    /// Comment body
    pub message: String,
    /// Posting time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_form() {
        for status in TicketStatus::ALL {
            assert_eq!(TicketStatus::parse(status.as_str()).ok(), Some(status));
        }
    }

    #[test]
    fn status_parse_is_case_sensitive() {
        assert!(matches!(
            TicketStatus::parse("open"),
            Err(TicketError::InvalidStatus(s)) if s == "open"
        ));
        assert!(TicketStatus::parse("ON_HOLD").is_err());
        assert!(TicketStatus::parse("").is_err());
    }

    #[test]
    fn on_hold_serializes_without_underscore() {
        let json = serde_json::to_string(&TicketStatus::OnHold).unwrap();
        assert_eq!(json, "\"ONHOLD\"");
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn history_action_labels() {
        assert_eq!(HistoryAction::Created.as_str(), "CREATED");
        assert_eq!(HistoryAction::UpdateStatus.as_str(), "UPDATE_STATUS");
        assert_eq!(HistoryAction::parse("UPDATED"), Some(HistoryAction::Updated));
        assert_eq!(HistoryAction::parse("DELETED"), None);
    }

    #[test]
    fn status_change_history_row() {
        let at = Utc::now();
        let row = NewTicketHistory::status_change(
            TicketId(7),
            UserId(3),
            HistoryAction::Updated,
            Some(TicketStatus::Open),
            TicketStatus::InProgress,
            at,
        );
        assert_eq!(row.field_name, "status");
        assert_eq!(row.old_value.as_deref(), Some("OPEN"));
        assert_eq!(row.new_value.as_deref(), Some("IN_PROGRESS"));
    }

    #[test]
    fn deleted_at_is_not_serialized() {
        let now = Utc::now();
        let ticket = Ticket {
            id: TicketId(1),
            ticket_code: "TCK-1".to_string(),
            project_id: 1,
            location_id: 1,
            part_id: 1,
            asset_id: 1,
            reporter_id: UserId(1),
            assigned_to_id: UserId(2),
            status: TicketStatus::Open,
            priority: TicketPriority::High,
            description: "printer on fire".to_string(),
            attachment: None,
            due_at: now,
            resolved_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        };
        let value = serde_json::to_value(&ticket).unwrap();
        assert!(value.get("deleted_at").is_none());
        assert_eq!(value["status"], "OPEN");
        assert_eq!(value["reporter_id"], 1);
    }
}
