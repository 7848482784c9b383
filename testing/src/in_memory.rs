//! In-memory record store for fast, deterministic tests.
//!
//! Transactions are fully serialized: [`Transactional::begin`] takes an
//! owned lock on the tables and works on a staged copy, `commit` writes the
//! copy back, and dropping the transaction throws it away. Reads outside a
//! transaction wait for any open transaction to finish.
//!
//! Faults can be injected at named points to exercise rollback paths.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned fault registries panic

use chrono::{DateTime, Utc};
use helpdesk_core::error::{StoreError, StoreResult};
use helpdesk_core::store::{
    TicketCommentRepository, TicketHistoryRepository, TicketRepository,
    TicketResolutionRepository, Transactional,
};
use helpdesk_core::types::{
    Cause, NewTicket, NewTicketComment, NewTicketHistory, NewTicketResolution, Solution, Ticket,
    TicketComment, TicketHistory, TicketId, TicketResolution, TicketStatus,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Store operation at which a fault can be injected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Opening a transaction
    Begin,
    /// Committing a transaction
    Commit,
    /// Locking a ticket row
    LockTicket,
    /// Inserting a ticket
    InsertTicket,
    /// Saving a ticket
    SaveTicket,
    /// Conditional move to RESOLVED
    MarkResolved,
    /// Soft-deleting a ticket
    SoftDelete,
    /// Appending a history row
    InsertHistory,
    /// Inserting a resolution
    InsertResolution,
    /// Inserting a comment
    InsertComment,
    /// Any read outside a transaction
    Read,
}

#[derive(Clone, Copy, Debug)]
enum Fault {
    Fail,
    Stall(Duration),
}

#[derive(Clone, Debug, Default)]
struct Sequences {
    ticket: i64,
    history: i64,
    resolution: i64,
    comment: i64,
}

impl Sequences {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

#[derive(Clone, Debug, Default)]
struct Tables {
    tickets: BTreeMap<i64, Ticket>,
    history: Vec<TicketHistory>,
    resolutions: Vec<TicketResolution>,
    comments: Vec<TicketComment>,
    causes: BTreeMap<i64, Cause>,
    solutions: BTreeMap<i64, Solution>,
    sequences: Sequences,
}

impl Tables {
    fn live_ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&id.get()).filter(|t| !t.is_deleted())
    }

    fn live_ticket_mut(&mut self, id: TicketId) -> Option<&mut Ticket> {
        self.tickets.get_mut(&id.get()).filter(|t| !t.is_deleted())
    }
}

/// Open transaction on an [`InMemoryRecordStore`].
///
/// Holds the table lock until committed, rolled back or dropped.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl std::fmt::Debug for InMemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTx")
            .field("tickets", &self.staged.tickets.len())
            .field("history", &self.staged.history.len())
            .finish_non_exhaustive()
    }
}

/// In-memory implementation of every repository trait.
///
/// # Example
///
/// ```
/// use helpdesk_testing::{FailPoint, InMemoryRecordStore};
///
/// let store = InMemoryRecordStore::new();
/// store.fail_on(FailPoint::InsertHistory);
/// // Any workflow that appends history now fails and rolls back.
/// store.clear_faults();
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<StdMutex<HashMap<FailPoint, Fault>>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call reaching `point` fail with a database error.
    pub fn fail_on(&self, point: FailPoint) {
        self.faults.lock().unwrap().insert(point, Fault::Fail);
    }

    /// Make every call reaching `point` sleep for `delay` before proceeding.
    pub fn stall_on(&self, point: FailPoint, delay: Duration) {
        self.faults.lock().unwrap().insert(point, Fault::Stall(delay));
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.faults.lock().unwrap().clear();
    }

    async fn hit(&self, point: FailPoint) -> StoreResult<()> {
        let fault = self.faults.lock().unwrap().get(&point).copied();
        match fault {
            None => Ok(()),
            Some(Fault::Fail) => Err(StoreError::Database(format!(
                "injected failure at {point:?}"
            ))),
            Some(Fault::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    /// Register a cause for resolutions to reference.
    pub async fn seed_cause(&self, cause: Cause) {
        self.tables.lock().await.causes.insert(cause.id, cause);
    }

    /// Register a solution for resolutions to reference.
    pub async fn seed_solution(&self, solution: Solution) {
        self.tables
            .lock()
            .await
            .solutions
            .insert(solution.id, solution);
    }

    /// Overwrite a ticket's status without writing history.
    ///
    /// Returns `false` if the ticket does not exist.
    pub async fn force_status(&self, id: TicketId, status: TicketStatus) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.tickets.get_mut(&id.get()) {
            Some(ticket) => {
                ticket.status = status;
                true
            }
            None => false,
        }
    }

    /// Every ticket row, soft-deleted ones included, in id order.
    pub async fn all_tickets(&self) -> Vec<Ticket> {
        self.tables.lock().await.tickets.values().cloned().collect()
    }

    /// Every history row in insertion order.
    pub async fn all_history(&self) -> Vec<TicketHistory> {
        self.tables.lock().await.history.clone()
    }

    /// Every resolution row in insertion order.
    pub async fn all_resolutions(&self) -> Vec<TicketResolution> {
        self.tables.lock().await.resolutions.clone()
    }

    /// Every comment row in insertion order.
    pub async fn all_comments(&self) -> Vec<TicketComment> {
        self.tables.lock().await.comments.clone()
    }
}

impl Transactional for InMemoryRecordStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        self.hit(FailPoint::Begin).await?;
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx { guard, staged })
    }

    async fn commit(&self, tx: InMemoryTx) -> StoreResult<()> {
        self.hit(FailPoint::Commit).await?;
        let InMemoryTx { mut guard, staged } = tx;
        *guard = staged;
        Ok(())
    }

    async fn rollback(&self, tx: InMemoryTx) -> StoreResult<()> {
        drop(tx);
        Ok(())
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    rows.sort_by_key(|row| Reverse(key(row)));
}

impl TicketRepository for InMemoryRecordStore {
    async fn find_ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        self.hit(FailPoint::Read).await?;
        Ok(self.tables.lock().await.live_ticket(id).cloned())
    }

    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        self.hit(FailPoint::Read).await?;
        let mut tickets: Vec<Ticket> = self
            .tables
            .lock()
            .await
            .tickets
            .values()
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect();
        newest_first(&mut tickets, |t| (t.created_at, t.id.get()));
        Ok(tickets)
    }

    async fn lock_ticket(&self, tx: &mut InMemoryTx, id: TicketId) -> StoreResult<Option<Ticket>> {
        self.hit(FailPoint::LockTicket).await?;
        Ok(tx.staged.live_ticket(id).cloned())
    }

    async fn insert_ticket(&self, tx: &mut InMemoryTx, ticket: &NewTicket) -> StoreResult<Ticket> {
        self.hit(FailPoint::InsertTicket).await?;
        let tables = &mut tx.staged;
        if tables
            .tickets
            .values()
            .any(|t| t.ticket_code == ticket.ticket_code)
        {
            return Err(StoreError::Database(format!(
                "duplicate ticket code {:?}",
                ticket.ticket_code
            )));
        }

        let id = Sequences::next(&mut tables.sequences.ticket);
        let row = Ticket {
            id: TicketId(id),
            ticket_code: ticket.ticket_code.clone(),
            project_id: ticket.project_id,
            location_id: ticket.location_id,
            part_id: ticket.part_id,
            asset_id: ticket.asset_id,
            reporter_id: ticket.reporter_id,
            assigned_to_id: ticket.assigned_to_id,
            status: ticket.status,
            priority: ticket.priority,
            description: ticket.description.clone(),
            attachment: ticket.attachment.clone(),
            due_at: ticket.due_at,
            resolved_at: None,
            created_at: ticket.created_at,
            updated_at: ticket.created_at,
            deleted_at: None,
        };
        tables.tickets.insert(id, row.clone());
        Ok(row)
    }

    async fn save_ticket(&self, tx: &mut InMemoryTx, ticket: &Ticket) -> StoreResult<()> {
        self.hit(FailPoint::SaveTicket).await?;
        let row = tx
            .staged
            .live_ticket_mut(ticket.id)
            .ok_or_else(|| StoreError::Database(format!("ticket {} vanished", ticket.id)))?;
        row.status = ticket.status;
        row.assigned_to_id = ticket.assigned_to_id;
        row.priority = ticket.priority;
        row.description.clone_from(&ticket.description);
        row.attachment.clone_from(&ticket.attachment);
        row.due_at = ticket.due_at;
        row.resolved_at = ticket.resolved_at;
        row.updated_at = ticket.updated_at;
        Ok(())
    }

    async fn mark_ticket_resolved(
        &self,
        tx: &mut InMemoryTx,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.hit(FailPoint::MarkResolved).await?;
        match tx.staged.live_ticket_mut(id) {
            Some(ticket) if ticket.status != TicketStatus::Resolved => {
                ticket.status = TicketStatus::Resolved;
                ticket.resolved_at = Some(at);
                ticket.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete_ticket(
        &self,
        tx: &mut InMemoryTx,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.hit(FailPoint::SoftDelete).await?;
        match tx.staged.live_ticket_mut(id) {
            Some(ticket) => {
                ticket.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl TicketHistoryRepository for InMemoryRecordStore {
    async fn insert_history(
        &self,
        tx: &mut InMemoryTx,
        entry: &NewTicketHistory,
    ) -> StoreResult<TicketHistory> {
        self.hit(FailPoint::InsertHistory).await?;
        let tables = &mut tx.staged;
        let row = TicketHistory {
            id: Sequences::next(&mut tables.sequences.history),
            ticket_id: entry.ticket_id,
            user_id: entry.user_id,
            action: entry.action,
            field_name: entry.field_name.clone(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
            created_at: entry.created_at,
        };
        tables.history.push(row.clone());
        Ok(row)
    }

    async fn list_history(&self, ticket_id: TicketId) -> StoreResult<Vec<TicketHistory>> {
        self.hit(FailPoint::Read).await?;
        let mut rows: Vec<TicketHistory> = self
            .tables
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.ticket_id == ticket_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |h| (h.created_at, h.id));
        Ok(rows)
    }
}

impl TicketResolutionRepository for InMemoryRecordStore {
    async fn insert_resolution(
        &self,
        tx: &mut InMemoryTx,
        resolution: &NewTicketResolution,
    ) -> StoreResult<TicketResolution> {
        self.hit(FailPoint::InsertResolution).await?;
        let tables = &mut tx.staged;
        if tables
            .resolutions
            .iter()
            .any(|r| r.ticket_id == resolution.ticket_id)
        {
            return Err(StoreError::Database(format!(
                "duplicate resolution for ticket {}",
                resolution.ticket_id
            )));
        }
        if !tables.causes.contains_key(&resolution.cause_id) {
            return Err(StoreError::Database(format!(
                "cause {} does not exist",
                resolution.cause_id
            )));
        }
        if !tables.solutions.contains_key(&resolution.solution_id) {
            return Err(StoreError::Database(format!(
                "solution {} does not exist",
                resolution.solution_id
            )));
        }

        let row = TicketResolution {
            id: Sequences::next(&mut tables.sequences.resolution),
            ticket_id: resolution.ticket_id,
            cause_id: resolution.cause_id,
            solution_id: resolution.solution_id,
            resolution_notes: resolution.resolution_notes.clone(),
            completion_time: resolution.completion_time,
            attachment_url: resolution.attachment_url.clone(),
            created_at: resolution.created_at,
            cause: None,
            solution: None,
        };
        tables.resolutions.push(row.clone());
        Ok(row)
    }

    async fn has_resolution(&self, tx: &mut InMemoryTx, ticket_id: TicketId) -> StoreResult<bool> {
        Ok(tx
            .staged
            .resolutions
            .iter()
            .any(|r| r.ticket_id == ticket_id))
    }

    async fn find_resolution(&self, ticket_id: TicketId) -> StoreResult<Option<TicketResolution>> {
        self.hit(FailPoint::Read).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .resolutions
            .iter()
            .find(|r| r.ticket_id == ticket_id)
            .map(|r| TicketResolution {
                cause: tables
                    .causes
                    .get(&r.cause_id)
                    .filter(|c| c.deleted_at.is_none())
                    .cloned(),
                solution: tables
                    .solutions
                    .get(&r.solution_id)
                    .filter(|s| s.deleted_at.is_none())
                    .cloned(),
                ..r.clone()
            }))
    }
}

impl TicketCommentRepository for InMemoryRecordStore {
    async fn insert_comment(
        &self,
        tx: &mut InMemoryTx,
        comment: &NewTicketComment,
    ) -> StoreResult<TicketComment> {
        self.hit(FailPoint::InsertComment).await?;
        let tables = &mut tx.staged;
        let row = TicketComment {
            id: Sequences::next(&mut tables.sequences.comment),
            ticket_id: comment.ticket_id,
            user_id: comment.user_id,
            message: comment.message.clone(),
            created_at: comment.created_at,
        };
        tables.comments.push(row.clone());
        Ok(row)
    }

    async fn list_comments(&self, ticket_id: TicketId) -> StoreResult<Vec<TicketComment>> {
        self.hit(FailPoint::Read).await?;
        let mut rows: Vec<TicketComment> = self
            .tables
            .lock()
            .await
            .comments
            .iter()
            .filter(|c| c.ticket_id == ticket_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |c| (c.created_at, c.id));
        Ok(rows)
    }
}
