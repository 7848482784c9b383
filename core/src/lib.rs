//! # Helpdesk Core
//!
//! Ticket lifecycle, resolution workflow and audit trail for a helpdesk
//! ticketing backend.
//!
//! ## Core Concepts
//!
//! - **Ticket**: a reported issue moving through OPEN, IN_PROGRESS, ONHOLD,
//!   RESOLVED and CLOSED
//! - **History**: an append-only audit row written with every status change
//! - **Resolution**: cause, solution and notes closing out a ticket
//! - **Record store**: the storage contract the services are generic over
//! - **Environment**: injected collaborators (clock, validator)
//!
//! ## Guarantees
//!
//! - Every status change commits together with its history row
//! - Resolving writes the resolution, the status change and the history row
//!   as one unit, and at most once per ticket
//! - Failed or cancelled operations leave no partial state behind
//!
//! ## Example
//!
//! ```ignore
//! use helpdesk_core::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(store);
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let tickets = TicketService::new(Arc::clone(&store), Arc::clone(&clock), LifecycleConfig::default());
//! let resolutions = ResolutionService::new(store, clock, LifecycleConfig::default());
//!
//! let ticket = tickets.create(reporter, &input).await?;
//! tickets
//!     .update_status(ticket.id, agent, &UpdateTicketStatusInput::new("IN_PROGRESS"))
//!     .await?;
//! let resolution = resolutions.resolve(ticket.id, agent, &resolution_input).await?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod lifecycle;
pub mod resolution;
pub mod store;
pub mod types;
pub mod validation;

/// Environment module - injected collaborators
///
/// Services never read the system time directly; they ask a [`Clock`]
/// so tests can pin "now".
///
/// [`Clock`]: environment::Clock
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use helpdesk_core::environment::{Clock, SystemClock};
    ///
    /// let before = chrono::Utc::now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Commonly used items.
pub mod prelude {
    pub use crate::config::LifecycleConfig;
    pub use crate::environment::{Clock, SystemClock};
    pub use crate::error::{Result, StoreError, StoreResult, TicketError};
    pub use crate::history::HistoryService;
    pub use crate::input::{
        CreateCommentInput, CreateResolutionInput, CreateTicketInput, UpdateTicketStatusInput,
    };
    pub use crate::lifecycle::TicketService;
    pub use crate::resolution::ResolutionService;
    pub use crate::store::{
        RecordStore, TicketCommentRepository, TicketHistoryRepository, TicketRepository,
        TicketResolutionRepository, Transactional,
    };
    pub use crate::types::{
        HistoryAction, Ticket, TicketComment, TicketHistory, TicketId, TicketPriority,
        TicketResolution, TicketStatus, UserId,
    };
    pub use crate::validation::{FieldValidator, ValidationErrors, Validator};
}
