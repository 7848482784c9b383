//! Ready-made inputs and records for tests.
//!
//! Every timestamp is relative to [`test_clock`](crate::test_clock), so a
//! service running on that clock sees due dates in the future and
//! resolutions completed "now".

use crate::mocks::test_clock;
use chrono::{DateTime, Duration, Utc};
use helpdesk_core::environment::Clock;
use helpdesk_core::input::{CreateCommentInput, CreateResolutionInput, CreateTicketInput};
use helpdesk_core::types::{Cause, NewTicket, Solution, TicketPriority, TicketStatus, UserId};
use rand::Rng;

/// Reporter used by fixtures.
pub const REPORTER: UserId = UserId(100);

/// Agent used by fixtures.
pub const AGENT: UserId = UserId(200);

/// Cause id seeded by [`cause`] in scenario tests.
pub const CAUSE_ID: i64 = 1;

/// Solution id seeded by [`solution`] in scenario tests.
pub const SOLUTION_ID: i64 = 2;

/// The fixed "now" of [`test_clock`](crate::test_clock).
#[must_use]
pub fn now() -> DateTime<Utc> {
    test_clock().now()
}

/// Ticket code with a random suffix, for stores shared between tests.
#[must_use]
pub fn unique_code(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{prefix}-{suffix:06}")
}

/// Valid ticket input due a week after [`now`].
#[must_use]
pub fn create_ticket_input(ticket_code: &str) -> CreateTicketInput {
    CreateTicketInput {
        ticket_code: ticket_code.to_string(),
        project_id: 1,
        location_id: 2,
        part_id: 3,
        asset_id: 4,
        assigned_to_id: AGENT.get(),
        priority: Some(TicketPriority::High),
        description: "Forklift hydraulic pressure drops under load".to_string(),
        attachment: None,
        due_at: Some(now() + Duration::days(7)),
        status: None,
    }
}

/// Ticket ready for direct insertion into a store.
#[must_use]
pub fn new_ticket(ticket_code: &str) -> NewTicket {
    let created_at = now();
    NewTicket {
        ticket_code: ticket_code.to_string(),
        project_id: 1,
        location_id: 2,
        part_id: 3,
        asset_id: 4,
        reporter_id: REPORTER,
        assigned_to_id: AGENT,
        status: TicketStatus::Open,
        priority: TicketPriority::Medium,
        description: "Label printer jams on every third label".to_string(),
        attachment: Some("uploads/printer.jpg".to_string()),
        due_at: created_at + Duration::days(2),
        created_at,
    }
}

/// Resolution input referencing [`CAUSE_ID`] and [`SOLUTION_ID`].
#[must_use]
pub fn resolution_input(notes: &str) -> CreateResolutionInput {
    CreateResolutionInput {
        cause_id: CAUSE_ID,
        solution_id: SOLUTION_ID,
        resolution_notes: notes.to_string(),
        completion_time: None,
        attachment_url: String::new(),
    }
}

/// Comment input.
#[must_use]
pub fn comment_input(message: &str) -> CreateCommentInput {
    CreateCommentInput::new(message)
}

/// Cause catalogue entry.
#[must_use]
pub fn cause(id: i64, part_id: i64) -> Cause {
    Cause {
        id,
        name: format!("Worn seal {id}"),
        part_id,
        created_at: now(),
        updated_at: now(),
        deleted_at: None,
    }
}

/// Solution catalogue entry.
#[must_use]
pub fn solution(id: i64, cause_id: i64) -> Solution {
    Solution {
        id,
        name: format!("Replace seal kit {id}"),
        cause_id,
        created_at: now(),
        updated_at: now(),
        deleted_at: None,
    }
}
