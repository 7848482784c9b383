//! Record store contract.
//!
//! The services in this crate never talk to a database directly. They are
//! generic over a store implementing the repository traits below, all of
//! which share one [`Transactional::Tx`] type so that a ticket write, its
//! history row and (for resolutions) the resolution row can be committed as
//! one unit.
//!
//! # Transactions
//!
//! A transaction is an owned capability: [`Transactional::begin`] hands it
//! out, every write borrows it mutably, and [`Transactional::commit`] or
//! [`Transactional::rollback`] consume it. Dropping a transaction without
//! committing must discard its writes. Cancelling an operation (dropping its
//! future, or hitting the deadline) therefore always rolls back.
//!
//! # Implementations
//!
//! - `helpdesk_postgres::PostgresRecordStore` (sqlx, row locks)
//! - `helpdesk_testing::InMemoryRecordStore` (serialized transactions,
//!   failure injection)

use crate::error::{Result, StoreError, StoreResult, TicketError};
use crate::types::{
    NewTicket, NewTicketComment, NewTicketHistory, NewTicketResolution, Ticket, TicketComment,
    TicketHistory, TicketId, TicketResolution,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Begin / commit / rollback of a store transaction.
pub trait Transactional: Send + Sync {
    /// Transaction capability. Dropping it uncommitted rolls it back.
    type Tx: Send;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot start a transaction.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Tx>> + Send;

    /// Make every write in `tx` durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the commit fails; nothing is persisted.
    fn commit(&self, tx: Self::Tx) -> impl Future<Output = StoreResult<()>> + Send;

    /// Discard every write in `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store reports a rollback failure.
    fn rollback(&self, tx: Self::Tx) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Ticket rows.
///
/// Soft-deleted tickets are invisible to every method here.
pub trait TicketRepository: Transactional {
    /// Fetch a ticket outside any transaction.
    fn find_ticket(&self, id: TicketId)
    -> impl Future<Output = StoreResult<Option<Ticket>>> + Send;

    /// All tickets, newest first.
    fn list_tickets(&self) -> impl Future<Output = StoreResult<Vec<Ticket>>> + Send;

    /// Fetch a ticket and hold it against concurrent writers until `tx` ends.
    fn lock_ticket(
        &self,
        tx: &mut Self::Tx,
        id: TicketId,
    ) -> impl Future<Output = StoreResult<Option<Ticket>>> + Send;

    /// Insert a ticket and return it with its assigned id.
    fn insert_ticket(
        &self,
        tx: &mut Self::Tx,
        ticket: &NewTicket,
    ) -> impl Future<Output = StoreResult<Ticket>> + Send;

    /// Overwrite the mutable columns of an existing ticket.
    fn save_ticket(
        &self,
        tx: &mut Self::Tx,
        ticket: &Ticket,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Move a ticket to RESOLVED unless it already is.
    ///
    /// Stamps `resolved_at` and `updated_at` with `at`. Returns `false` when
    /// no row changed, meaning the ticket was already resolved or is gone.
    fn mark_ticket_resolved(
        &self,
        tx: &mut Self::Tx,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Set the deletion timestamp. Returns `false` when no live ticket matched.
    fn soft_delete_ticket(
        &self,
        tx: &mut Self::Tx,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}

/// Append-only audit rows.
pub trait TicketHistoryRepository: Transactional {
    /// Append a history row.
    fn insert_history(
        &self,
        tx: &mut Self::Tx,
        entry: &NewTicketHistory,
    ) -> impl Future<Output = StoreResult<TicketHistory>> + Send;

    /// History of a ticket, most recent first (ties by id, highest first).
    fn list_history(
        &self,
        ticket_id: TicketId,
    ) -> impl Future<Output = StoreResult<Vec<TicketHistory>>> + Send;
}

/// Resolution rows.
pub trait TicketResolutionRepository: Transactional {
    /// Insert the resolution of a ticket.
    fn insert_resolution(
        &self,
        tx: &mut Self::Tx,
        resolution: &NewTicketResolution,
    ) -> impl Future<Output = StoreResult<TicketResolution>> + Send;

    /// Whether the ticket already has a resolution row, as seen by `tx`.
    fn has_resolution(
        &self,
        tx: &mut Self::Tx,
        ticket_id: TicketId,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Resolution of a ticket with its cause and solution attached.
    fn find_resolution(
        &self,
        ticket_id: TicketId,
    ) -> impl Future<Output = StoreResult<Option<TicketResolution>>> + Send;
}

/// Comment rows.
pub trait TicketCommentRepository: Transactional {
    /// Append a comment.
    fn insert_comment(
        &self,
        tx: &mut Self::Tx,
        comment: &NewTicketComment,
    ) -> impl Future<Output = StoreResult<TicketComment>> + Send;

    /// Comments on a ticket, most recent first (ties by id, highest first).
    fn list_comments(
        &self,
        ticket_id: TicketId,
    ) -> impl Future<Output = StoreResult<Vec<TicketComment>>> + Send;
}

/// Everything the helpdesk services need from a store.
pub trait RecordStore:
    TicketRepository + TicketHistoryRepository + TicketResolutionRepository + TicketCommentRepository
{
}

impl<T> RecordStore for T where
    T: TicketRepository
        + TicketHistoryRepository
        + TicketResolutionRepository
        + TicketCommentRepository
{
}

/// End a transaction according to `outcome`.
///
/// Commits on `Ok`. On `Err` the transaction is rolled back and the original
/// error is returned; a failing rollback is logged, not reported.
///
/// # Errors
///
/// Returns the error carried by `outcome`, or the commit failure.
pub async fn finish<S, T>(store: &S, tx: S::Tx, outcome: Result<T>) -> Result<T>
where
    S: Transactional + ?Sized,
{
    match outcome {
        Ok(value) => {
            store.commit(tx).await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = store.rollback(tx).await {
                tracing::error!(
                    error = %rollback_error,
                    cause = %error,
                    "Transaction rollback failed"
                );
            }
            Err(error)
        }
    }
}

/// Run `operation` under a deadline.
///
/// On expiry the operation future is dropped, which drops (and so rolls
/// back) any transaction it holds.
///
/// # Errors
///
/// Returns [`StoreError::Timeout`] on expiry, otherwise the operation's own
/// result.
pub async fn with_deadline<T, F>(timeout: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(timeout_ms = timeout.as_millis(), "Operation deadline exceeded");
            Err(TicketError::Storage(StoreError::Timeout(timeout)))
        }
    }
}
