//! Resolution workflow.
//!
//! Resolving a ticket writes three rows in one transaction: the resolution
//! itself, the ticket's move to RESOLVED, and an UPDATE_STATUS history row.
//! Either all three land or none do.
//!
//! Two concurrent resolutions of the same ticket cannot both succeed. The
//! ticket is locked before its status is checked, and the status update is
//! conditional on the ticket not being RESOLVED yet; the loser reports
//! [`TicketError::AlreadyResolved`].

use crate::config::LifecycleConfig;
use crate::environment::Clock;
use crate::error::{Result, TicketError};
use crate::input::CreateResolutionInput;
use crate::store::{self, RecordStore};
use crate::types::{
    HistoryAction, NewTicketHistory, NewTicketResolution, TicketId, TicketResolution,
    TicketStatus, UserId,
};
use crate::validation::{FieldLimits, FieldValidator, Validate, ValidationErrors, Validator};
use std::sync::Arc;

/// Resolution input addressed at a ticket.
struct ResolveRequest<'a> {
    ticket_id: TicketId,
    input: &'a CreateResolutionInput,
}

impl Validate for ResolveRequest<'_> {
    fn validate_fields(&self, limits: &FieldLimits, errors: &mut ValidationErrors) {
        errors.require_id("ticket_id", self.ticket_id.get());
        self.input.validate_fields(limits, errors);
    }
}

/// Resolve tickets and read their resolutions.
pub struct ResolutionService<S> {
    store: Arc<S>,
    validator: Arc<dyn Validator>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl<S> Clone for ResolutionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: Arc::clone(&self.validator),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<S: RecordStore> ResolutionService<S> {
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

    /// Resolve a ticket on behalf of `user_id`.
    ///
    /// `completion_time` defaults to now. The ticket's `resolved_at` is
    /// stamped with the time of the call.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidInput`] on missing ticket, cause or solution ids
    /// - [`TicketError::NotFound`] if the ticket is absent or deleted
    /// - [`TicketError::AlreadyResolved`] if the ticket is RESOLVED or already
    ///   has a resolution from before it was reopened, including when a
    ///   concurrent resolution committed first
    /// - [`TicketError::Storage`] on store failure; nothing is kept
    #[tracing::instrument(skip(self, input))]
    pub async fn resolve(
        &self,
        ticket_id: TicketId,
        user_id: UserId,
        input: &CreateResolutionInput,
    ) -> Result<TicketResolution> {
        self.validator
            .validate(&ResolveRequest { ticket_id, input })
            .map_err(|errors| {
                tracing::warn!(%errors, "Rejected resolution input");
                TicketError::InvalidInput(errors)
            })?;

        let now = self.clock.now();
        let new_resolution = NewTicketResolution {
            ticket_id,
            cause_id: input.cause_id,
            solution_id: input.solution_id,
            resolution_notes: input.resolution_notes.clone(),
            completion_time: input.completion_time.unwrap_or(now),
            attachment_url: input.attachment_url.clone(),
            created_at: now,
        };

        let resolution = store::with_deadline(self.config.operation_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = self.resolve_in(&mut tx, user_id, &new_resolution).await;
            store::finish(&*self.store, tx, outcome).await
        })
        .await
        .inspect_err(|e| {
            if e.is_user_error() {
                tracing::warn!(error = %e, "Resolution rejected");
            } else {
                tracing::error!(error = %e, "Failed to resolve ticket");
            }
        })?;

        tracing::info!(
            %ticket_id,
            resolution_id = resolution.id,
            cause_id = resolution.cause_id,
            solution_id = resolution.solution_id,
            "Ticket resolved"
        );
        Ok(resolution)
    }

    async fn resolve_in(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        new_resolution: &NewTicketResolution,
    ) -> Result<TicketResolution> {
        let ticket_id = new_resolution.ticket_id;
        let ticket = self
            .store
            .lock_ticket(tx, ticket_id)
            .await?
            .ok_or_else(|| TicketError::ticket_not_found(ticket_id))?;
        if ticket.status == TicketStatus::Resolved {
            return Err(TicketError::AlreadyResolved(ticket_id));
        }
        // One resolution per ticket, even after it was reopened.
        if self.store.has_resolution(tx, ticket_id).await? {
            return Err(TicketError::AlreadyResolved(ticket_id));
        }

        let resolution = self.store.insert_resolution(tx, new_resolution).await?;

        let at = new_resolution.created_at;
        if !self.store.mark_ticket_resolved(tx, ticket_id, at).await? {
            return Err(TicketError::AlreadyResolved(ticket_id));
        }

        let entry = NewTicketHistory::status_change(
            ticket_id,
            user_id,
            HistoryAction::UpdateStatus,
            Some(ticket.status),
            TicketStatus::Resolved,
            at,
        );
        self.store.insert_history(tx, &entry).await?;
        Ok(resolution)
    }

    /// Resolution of a ticket, with its cause and solution attached.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NotFound`] if the ticket has no resolution
    /// - [`TicketError::Storage`] on store failure
    pub async fn find_by_ticket_id(&self, ticket_id: TicketId) -> Result<TicketResolution> {
        store::with_deadline(self.config.operation_timeout, async {
            self.store
                .find_resolution(ticket_id)
                .await?
                .ok_or(TicketError::NotFound {
                    entity: "ticket resolution",
                    id: ticket_id.get(),
                })
        })
        .await
    }
}
