//! `PostgreSQL` record store.

use crate::config::PostgresConfig;
use chrono::{DateTime, Utc};
use helpdesk_core::error::{StoreError, StoreResult};
use helpdesk_core::store::{
    TicketCommentRepository, TicketHistoryRepository, TicketRepository,
    TicketResolutionRepository, Transactional,
};
use helpdesk_core::types::{
    Cause, HistoryAction, NewTicket, NewTicketComment, NewTicketHistory, NewTicketResolution,
    Solution, Ticket, TicketComment, TicketHistory, TicketId, TicketPriority, TicketResolution,
    TicketStatus, UserId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

const TICKET_COLUMNS: &str = "id, ticket_code, project_id, location_id, part_id, asset_id, \
    reporter_id, assigned_to_id, status, priority, description, attachment, due_at, \
    resolved_at, created_at, updated_at, deleted_at";

const HISTORY_COLUMNS: &str =
    "id, ticket_id, user_id, action, field_name, old_value, new_value, created_at";

const RESOLUTION_COLUMNS: &str = "id, ticket_id, cause_id, solution_id, resolution_notes, \
    completion_time, attachment_url, created_at";

const COMMENT_COLUMNS: &str = "id, ticket_id, user_id, message, created_at";

/// `PostgreSQL` implementation of every repository trait.
///
/// Status changes and resolutions lock the ticket row with
/// `SELECT ... FOR UPDATE`; the move to RESOLVED is additionally guarded by
/// `status <> 'RESOLVED'`, and `ticket_resolutions.ticket_id` is unique.
///
/// # Example
///
/// ```no_run
/// use helpdesk_postgres::{PostgresConfig, PostgresRecordStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresRecordStore::connect(&PostgresConfig::from_env()).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn connect(config: &PostgresConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Run embedded database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a cause catalogue entry, keeping its id.
    ///
    /// Causes are owned by the taxonomy service; this exists for seeding.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn insert_cause(&self, cause: &Cause) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO causes (id, name, part_id, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(cause.id)
        .bind(&cause.name)
        .bind(cause.part_id)
        .bind(cause.created_at)
        .bind(cause.updated_at)
        .bind(cause.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert cause: {e}")))?;
        Ok(())
    }

    /// Insert a solution catalogue entry, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn insert_solution(&self, solution: &Solution) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO solutions (id, name, cause_id, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(solution.id)
        .bind(&solution.name)
        .bind(solution.cause_id)
        .bind(solution.created_at)
        .bind(solution.updated_at)
        .bind(solution.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert solution: {e}")))?;
        Ok(())
    }

    fn row_to_ticket(row: &PgRow) -> StoreResult<Ticket> {
        let status: String = row.get("status");
        let priority: String = row.get("priority");
        Ok(Ticket {
            id: TicketId(row.get("id")),
            ticket_code: row.get("ticket_code"),
            project_id: row.get("project_id"),
            location_id: row.get("location_id"),
            part_id: row.get("part_id"),
            asset_id: row.get("asset_id"),
            reporter_id: UserId(row.get("reporter_id")),
            assigned_to_id: UserId(row.get("assigned_to_id")),
            status: TicketStatus::parse(&status)
                .map_err(|_| StoreError::Corrupt(format!("unknown ticket status {status:?}")))?,
            priority: TicketPriority::parse(&priority)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown priority {priority:?}")))?,
            description: row.get("description"),
            attachment: row.get("attachment"),
            due_at: row.get("due_at"),
            resolved_at: row.get("resolved_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        })
    }

    fn row_to_history(row: &PgRow) -> StoreResult<TicketHistory> {
        let action: String = row.get("action");
        Ok(TicketHistory {
            id: row.get("id"),
            ticket_id: TicketId(row.get("ticket_id")),
            user_id: UserId(row.get("user_id")),
            action: HistoryAction::parse(&action)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown history action {action:?}")))?,
            field_name: row.get("field_name"),
            old_value: row.get("old_value"),
            new_value: row.get("new_value"),
            created_at: row.get("created_at"),
        })
    }

    fn row_to_resolution(row: &PgRow) -> TicketResolution {
        TicketResolution {
            id: row.get("id"),
            ticket_id: TicketId(row.get("ticket_id")),
            cause_id: row.get("cause_id"),
            solution_id: row.get("solution_id"),
            resolution_notes: row.get("resolution_notes"),
            completion_time: row.get("completion_time"),
            attachment_url: row.get("attachment_url"),
            created_at: row.get("created_at"),
            cause: None,
            solution: None,
        }
    }

    fn row_to_comment(row: &PgRow) -> TicketComment {
        TicketComment {
            id: row.get("id"),
            ticket_id: TicketId(row.get("ticket_id")),
            user_id: UserId(row.get("user_id")),
            message: row.get("message"),
            created_at: row.get("created_at"),
        }
    }

    async fn find_cause(&self, id: i64) -> StoreResult<Option<Cause>> {
        let row = sqlx::query(
            r"
            SELECT id, name, part_id, created_at, updated_at, deleted_at
            FROM causes
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to load cause: {e}")))?;

        Ok(row.map(|row| Cause {
            id: row.get("id"),
            name: row.get("name"),
            part_id: row.get("part_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        }))
    }

    async fn find_solution(&self, id: i64) -> StoreResult<Option<Solution>> {
        let row = sqlx::query(
            r"
            SELECT id, name, cause_id, created_at, updated_at, deleted_at
            FROM solutions
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to load solution: {e}")))?;

        Ok(row.map(|row| Solution {
            id: row.get("id"),
            name: row.get("name"),
            cause_id: row.get("cause_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        }))
    }
}

impl Transactional for PostgresRecordStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {e}")))?;
        metrics::counter!("helpdesk.store.transactions.committed").increment(1);
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()> {
        metrics::counter!("helpdesk.store.transactions.rolled_back").increment(1);
        tx.rollback()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to roll back transaction: {e}")))
    }
}

impl TicketRepository for PostgresRecordStore {
    async fn find_ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to load ticket: {e}")))?;

        row.as_ref().map(Self::row_to_ticket).transpose()
    }

    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to list tickets: {e}")))?;

        rows.iter().map(Self::row_to_ticket).collect()
    }

    async fn lock_ticket(&self, tx: &mut Self::Tx, id: TicketId) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to lock ticket: {e}")))?;

        row.as_ref().map(Self::row_to_ticket).transpose()
    }

    async fn insert_ticket(&self, tx: &mut Self::Tx, ticket: &NewTicket) -> StoreResult<Ticket> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO tickets (
                ticket_code, project_id, location_id, part_id, asset_id,
                reporter_id, assigned_to_id, status, priority, description,
                attachment, due_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(&ticket.ticket_code)
        .bind(ticket.project_id)
        .bind(ticket.location_id)
        .bind(ticket.part_id)
        .bind(ticket.asset_id)
        .bind(ticket.reporter_id.get())
        .bind(ticket.assigned_to_id.get())
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(&ticket.description)
        .bind(&ticket.attachment)
        .bind(ticket.due_at)
        .bind(ticket.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert ticket: {e}")))?;

        Self::row_to_ticket(&row)
    }

    async fn save_ticket(&self, tx: &mut Self::Tx, ticket: &Ticket) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE tickets
            SET status = $2, priority = $3, assigned_to_id = $4, description = $5,
                attachment = $6, due_at = $7, resolved_at = $8, updated_at = $9
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(ticket.id.get())
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(ticket.assigned_to_id.get())
        .bind(&ticket.description)
        .bind(&ticket.attachment)
        .bind(ticket.due_at)
        .bind(ticket.resolved_at)
        .bind(ticket.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to save ticket: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(format!(
                "Failed to save ticket: ticket {} no longer exists",
                ticket.id
            )));
        }
        Ok(())
    }

    async fn mark_ticket_resolved(
        &self,
        tx: &mut Self::Tx,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE tickets
            SET status = 'RESOLVED', resolved_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL AND status <> 'RESOLVED'
            ",
        )
        .bind(id.get())
        .bind(at)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to resolve ticket: {e}")))?;

        if result.rows_affected() == 0 {
            tracing::warn!(ticket_id = %id, "Conditional resolve matched no row");
            metrics::counter!("helpdesk.store.resolve_conflicts").increment(1);
            return Ok(false);
        }
        Ok(true)
    }

    async fn soft_delete_ticket(
        &self,
        tx: &mut Self::Tx,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE tickets SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.get())
        .bind(at)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to delete ticket: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

impl TicketHistoryRepository for PostgresRecordStore {
    async fn insert_history(
        &self,
        tx: &mut Self::Tx,
        entry: &NewTicketHistory,
    ) -> StoreResult<TicketHistory> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO ticket_histories (
                ticket_id, user_id, action, field_name, old_value, new_value, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {HISTORY_COLUMNS}
            "
        ))
        .bind(entry.ticket_id.get())
        .bind(entry.user_id.get())
        .bind(entry.action.as_str())
        .bind(&entry.field_name)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert history: {e}")))?;

        Self::row_to_history(&row)
    }

    async fn list_history(&self, ticket_id: TicketId) -> StoreResult<Vec<TicketHistory>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM ticket_histories WHERE ticket_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(ticket_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to list history: {e}")))?;

        rows.iter().map(Self::row_to_history).collect()
    }
}

impl TicketResolutionRepository for PostgresRecordStore {
    async fn insert_resolution(
        &self,
        tx: &mut Self::Tx,
        resolution: &NewTicketResolution,
    ) -> StoreResult<TicketResolution> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO ticket_resolutions (
                ticket_id, cause_id, solution_id, resolution_notes,
                completion_time, attachment_url, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RESOLUTION_COLUMNS}
            "
        ))
        .bind(resolution.ticket_id.get())
        .bind(resolution.cause_id)
        .bind(resolution.solution_id)
        .bind(&resolution.resolution_notes)
        .bind(resolution.completion_time)
        .bind(&resolution.attachment_url)
        .bind(resolution.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert resolution: {e}")))?;

        Ok(Self::row_to_resolution(&row))
    }

    async fn has_resolution(&self, tx: &mut Self::Tx, ticket_id: TicketId) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM ticket_resolutions WHERE ticket_id = $1)",
        )
        .bind(ticket_id.get())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to check resolution: {e}")))?;

        Ok(exists)
    }

    async fn find_resolution(&self, ticket_id: TicketId) -> StoreResult<Option<TicketResolution>> {
        let row = sqlx::query(&format!(
            "SELECT {RESOLUTION_COLUMNS} FROM ticket_resolutions WHERE ticket_id = $1"
        ))
        .bind(ticket_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to load resolution: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut resolution = Self::row_to_resolution(&row);
        resolution.cause = self.find_cause(resolution.cause_id).await?;
        resolution.solution = self.find_solution(resolution.solution_id).await?;
        Ok(Some(resolution))
    }
}

impl TicketCommentRepository for PostgresRecordStore {
    async fn insert_comment(
        &self,
        tx: &mut Self::Tx,
        comment: &NewTicketComment,
    ) -> StoreResult<TicketComment> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO ticket_comments (ticket_id, user_id, message, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "
        ))
        .bind(comment.ticket_id.get())
        .bind(comment.user_id.get())
        .bind(&comment.message)
        .bind(comment.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert comment: {e}")))?;

        Ok(Self::row_to_comment(&row))
    }

    async fn list_comments(&self, ticket_id: TicketId) -> StoreResult<Vec<TicketComment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM ticket_comments WHERE ticket_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(ticket_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to list comments: {e}")))?;

        Ok(rows.iter().map(Self::row_to_comment).collect())
    }
}
