//! Ticket lifecycle engine.
//!
//! [`TicketService`] owns the status state machine. Every mutation of a
//! ticket's status is written together with its history row in a single
//! store transaction, so the audit trail never disagrees with the ticket.
//!
//! # Status rules
//!
//! - New tickets always start in [`TicketStatus::Open`].
//! - Any of the five statuses may follow any other; requesting the current
//!   status is rejected as a no-op.
//! - Entering [`TicketStatus::Resolved`] stamps `resolved_at`. Leaving it
//!   keeps the stamp.

use crate::config::LifecycleConfig;
use crate::environment::Clock;
use crate::error::{Result, TicketError};
use crate::input::{CreateTicketInput, UpdateTicketStatusInput};
use crate::store::{self, RecordStore};
use crate::types::{
    HistoryAction, NewTicket, NewTicketHistory, Ticket, TicketId, TicketStatus, UserId,
};
use crate::validation::{FieldValidator, Validator};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Apply a status change to a ticket in memory.
///
/// Returns the updated ticket and the status it had before.
///
/// # Errors
///
/// Returns [`TicketError::NoOpTransition`] when `to` is the current status.
pub fn apply_status_change(
    ticket: &Ticket,
    to: TicketStatus,
    at: DateTime<Utc>,
) -> Result<(Ticket, TicketStatus)> {
    let from = ticket.status;
    if from == to {
        return Err(TicketError::NoOpTransition(to));
    }

    let mut updated = ticket.clone();
    updated.status = to;
    updated.updated_at = at;
    if to == TicketStatus::Resolved {
        updated.resolved_at = Some(at);
    }
    Ok((updated, from))
}

/// Create, transition, delete and read tickets.
pub struct TicketService<S> {
    store: Arc<S>,
    validator: Arc<dyn Validator>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl<S> Clone for TicketService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: Arc::clone(&self.validator),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<S: RecordStore> TicketService<S> {
    /// Service using the default [`FieldValidator`] built from `config`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: LifecycleConfig) -> Self {
        Self {
            store,
            validator: Arc::new(FieldValidator::new(config.field_limits())),
            clock,
            config,
        }
    }

    /// Replace the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// File a ticket on behalf of `reporter_id`.
    ///
    /// The ticket starts OPEN whatever status the input carries, and is
    /// inserted together with its CREATED history row.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidInput`] on field errors or a due date that is
    ///   not in the future
    /// - [`TicketError::Storage`] if either insert fails; nothing is kept
    #[tracing::instrument(skip(self, input))]
    pub async fn create(&self, reporter_id: UserId, input: &CreateTicketInput) -> Result<Ticket> {
        self.validator.validate(input).map_err(|errors| {
            tracing::warn!(%errors, "Rejected ticket input");
            TicketError::InvalidInput(errors)
        })?;

        let now = self.clock.now();
        let Some(due_at) = input.due_at else {
            return Err(TicketError::invalid_field("due_at", "is required"));
        };
        let Some(priority) = input.priority else {
            return Err(TicketError::invalid_field("priority", "is required"));
        };
        if due_at <= now {
            tracing::warn!(%due_at, "Rejected ticket with past due date");
            return Err(TicketError::invalid_field(
                "due_at",
                "due date cannot be in the past",
            ));
        }

        let new_ticket = NewTicket {
            ticket_code: input.ticket_code.trim().to_string(),
            project_id: input.project_id,
            location_id: input.location_id,
            part_id: input.part_id,
            asset_id: input.asset_id,
            reporter_id,
            assigned_to_id: UserId(input.assigned_to_id),
            status: TicketStatus::Open,
            priority,
            description: input.description.clone(),
            attachment: input.attachment.clone(),
            due_at,
            created_at: now,
        };

        let ticket = store::with_deadline(self.config.operation_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = self.insert_with_history(&mut tx, &new_ticket).await;
            store::finish(&*self.store, tx, outcome).await
        })
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to create ticket"))?;

        tracing::info!(ticket_id = %ticket.id, ticket_code = %ticket.ticket_code, "Ticket created");
        Ok(ticket)
    }

    async fn insert_with_history(&self, tx: &mut S::Tx, new_ticket: &NewTicket) -> Result<Ticket> {
        let ticket = self.store.insert_ticket(tx, new_ticket).await?;
        let entry = NewTicketHistory::status_change(
            ticket.id,
            new_ticket.reporter_id,
            HistoryAction::Created,
            None,
            TicketStatus::Open,
            new_ticket.created_at,
        );
        self.store.insert_history(tx, &entry).await?;
        Ok(ticket)
    }

    /// Move a ticket to the requested status.
    ///
    /// The ticket is locked for the duration of the transaction; the save and
    /// its UPDATED history row commit together.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidInput`] if the status is blank
    /// - [`TicketError::InvalidStatus`] for a value outside the five statuses
    /// - [`TicketError::NotFound`] if the ticket is absent or deleted
    /// - [`TicketError::NoOpTransition`] if the ticket already has that status
    /// - [`TicketError::Storage`] on store failure; nothing is kept
    #[tracing::instrument(skip(self, input))]
    pub async fn update_status(
        &self,
        ticket_id: TicketId,
        user_id: UserId,
        input: &UpdateTicketStatusInput,
    ) -> Result<()> {
        self.validator
            .validate(input)
            .map_err(TicketError::InvalidInput)?;
        let to = TicketStatus::parse(&input.status).inspect_err(|_| {
            tracing::warn!(status = %input.status, "Rejected unknown ticket status");
        })?;

        let from = store::with_deadline(self.config.operation_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = self.transition(&mut tx, ticket_id, user_id, to).await;
            store::finish(&*self.store, tx, outcome).await
        })
        .await
        .inspect_err(|e| {
            if e.is_user_error() {
                tracing::warn!(error = %e, "Status change rejected");
            } else {
                tracing::error!(error = %e, "Failed to change ticket status");
            }
        })?;

        tracing::info!(%ticket_id, %from, %to, "Ticket status changed");
        Ok(())
    }

    async fn transition(
        &self,
        tx: &mut S::Tx,
        ticket_id: TicketId,
        user_id: UserId,
        to: TicketStatus,
    ) -> Result<TicketStatus> {
        let ticket = self
            .store
            .lock_ticket(tx, ticket_id)
            .await?
            .ok_or_else(|| TicketError::ticket_not_found(ticket_id))?;

        let now = self.clock.now();
        let (updated, from) = apply_status_change(&ticket, to, now)?;
        self.store.save_ticket(tx, &updated).await?;

        let entry = NewTicketHistory::status_change(
            ticket_id,
            user_id,
            HistoryAction::Updated,
            Some(from),
            to,
            now,
        );
        self.store.insert_history(tx, &entry).await?;
        Ok(from)
    }

    /// Soft-delete a ticket. No history row is written.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NotFound`] if the ticket is absent or already deleted
    /// - [`TicketError::Storage`] on store failure
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, ticket_id: TicketId) -> Result<()> {
        let now = self.clock.now();
        store::with_deadline(self.config.operation_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = match self.store.soft_delete_ticket(&mut tx, ticket_id, now).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(TicketError::ticket_not_found(ticket_id)),
                Err(e) => Err(e.into()),
            };
            store::finish(&*self.store, tx, outcome).await
        })
        .await
        .inspect_err(|e| {
            if e.is_user_error() {
                tracing::warn!(error = %e, "Delete rejected");
            } else {
                tracing::error!(error = %e, "Failed to delete ticket");
            }
        })?;

        tracing::info!(%ticket_id, "Ticket deleted");
        Ok(())
    }

    /// Fetch a live ticket.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NotFound`] if the ticket is absent or deleted
    /// - [`TicketError::Storage`] on store failure
    pub async fn find_by_id(&self, ticket_id: TicketId) -> Result<Ticket> {
        store::with_deadline(self.config.operation_timeout, async {
            self.store
                .find_ticket(ticket_id)
                .await?
                .ok_or_else(|| TicketError::ticket_not_found(ticket_id))
        })
        .await
    }

    /// All live tickets, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Storage`] on store failure.
    pub async fn list(&self) -> Result<Vec<Ticket>> {
        store::with_deadline(self.config.operation_timeout, async {
            Ok::<_, TicketError>(self.store.list_tickets().await?)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::types::TicketPriority;
    use chrono::Duration;
    use proptest::prelude::*;

    fn ticket(status: TicketStatus) -> Ticket {
        let at = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Ticket {
            id: TicketId(1),
            ticket_code: "TCK-1".to_string(),
            project_id: 1,
            location_id: 1,
            part_id: 1,
            asset_id: 1,
            reporter_id: UserId(1),
            assigned_to_id: UserId(2),
            status,
            priority: TicketPriority::Low,
            description: "noisy fan".to_string(),
            attachment: None,
            due_at: at + Duration::days(3),
            resolved_at: None,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    fn status() -> impl Strategy<Value = TicketStatus> {
        prop::sample::select(TicketStatus::ALL.to_vec())
    }

    #[test]
    fn same_status_is_a_no_op() {
        let result = apply_status_change(&ticket(TicketStatus::Open), TicketStatus::Open, Utc::now());
        assert_eq!(result, Err(TicketError::NoOpTransition(TicketStatus::Open)));
    }

    #[test]
    fn resolving_stamps_resolved_at() {
        let at = Utc::now();
        let (updated, from) =
            apply_status_change(&ticket(TicketStatus::InProgress), TicketStatus::Resolved, at)
                .unwrap();
        assert_eq!(from, TicketStatus::InProgress);
        assert_eq!(updated.resolved_at, Some(at));
        assert_eq!(updated.updated_at, at);
    }

    #[test]
    fn reopening_keeps_resolved_at() {
        let stamped = Utc::now() - Duration::hours(1);
        let mut resolved = ticket(TicketStatus::Resolved);
        resolved.resolved_at = Some(stamped);
        let (updated, _) = apply_status_change(&resolved, TicketStatus::Open, Utc::now()).unwrap();
        assert_eq!(updated.status, TicketStatus::Open);
        assert_eq!(updated.resolved_at, Some(stamped));
    }

    proptest! {
        #[test]
        fn any_distinct_pair_is_legal(from in status(), to in status()) {
            prop_assume!(from != to);
            let at = Utc::now();
            let (updated, previous) = apply_status_change(&ticket(from), to, at).unwrap();
            prop_assert_eq!(previous, from);
            prop_assert_eq!(updated.status, to);
            prop_assert_eq!(updated.resolved_at.is_some(), to == TicketStatus::Resolved);
        }
    }
}
