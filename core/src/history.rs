//! Audit trail and comment log of a ticket.

use crate::config::LifecycleConfig;
use crate::environment::Clock;
use crate::error::{Result, TicketError};
use crate::input::CreateCommentInput;
use crate::store::{self, RecordStore};
use crate::types::{NewTicketComment, TicketComment, TicketHistory, TicketId, UserId};
use crate::validation::{FieldValidator, Validator};
use std::sync::Arc;

/// Read history, read and append comments.
pub struct HistoryService<S> {
    store: Arc<S>,
    validator: Arc<dyn Validator>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl<S> Clone for HistoryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: Arc::clone(&self.validator),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}

impl<S: RecordStore> HistoryService<S> {
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

    /// History rows of a ticket, most recent first. Empty if there are none.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Storage`] on store failure.
    pub async fn list_history(&self, ticket_id: TicketId) -> Result<Vec<TicketHistory>> {
        store::with_deadline(self.config.operation_timeout, async {
            Ok::<_, TicketError>(self.store.list_history(ticket_id).await?)
        })
        .await
    }

    /// Comments on a ticket, most recent first. Empty if there are none.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Storage`] on store failure.
    pub async fn list_comments(&self, ticket_id: TicketId) -> Result<Vec<TicketComment>> {
        store::with_deadline(self.config.operation_timeout, async {
            Ok::<_, TicketError>(self.store.list_comments(ticket_id).await?)
        })
        .await
    }

    /// Comment on a live ticket as `user_id`.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidInput`] if the message is blank or too long
    /// - [`TicketError::NotFound`] if the ticket is absent or deleted
    /// - [`TicketError::Storage`] on store failure
    #[tracing::instrument(skip(self, input))]
    pub async fn add_comment(
        &self,
        ticket_id: TicketId,
        user_id: UserId,
        input: &CreateCommentInput,
    ) -> Result<TicketComment> {
        self.validator
            .validate(input)
            .map_err(TicketError::InvalidInput)?;

        let comment = NewTicketComment {
            ticket_id,
            user_id,
            message: input.message.clone(),
            created_at: self.clock.now(),
        };

        let comment = store::with_deadline(self.config.operation_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome = match self.store.lock_ticket(&mut tx, ticket_id).await {
                Ok(Some(_)) => self
                    .store
                    .insert_comment(&mut tx, &comment)
                    .await
                    .map_err(TicketError::from),
                Ok(None) => Err(TicketError::ticket_not_found(ticket_id)),
                Err(e) => Err(e.into()),
            };
            store::finish(&*self.store, tx, outcome).await
        })
        .await?;

        tracing::info!(%ticket_id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }
}
