//! Property-based testing strategies for helpdesk types.

use crate::fixtures;
use chrono::Duration;
use helpdesk_core::input::CreateTicketInput;
use helpdesk_core::types::{TicketPriority, TicketStatus};
use proptest::prelude::*;

/// Any legal status.
pub fn status() -> impl Strategy<Value = TicketStatus> {
    prop::sample::select(TicketStatus::ALL.to_vec())
}

/// Any priority.
pub fn priority() -> impl Strategy<Value = TicketPriority> {
    prop::sample::select(vec![
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
        TicketPriority::Urgent,
    ])
}

/// Non-blank text that is not one of the five status values.
///
/// Includes near misses such as lowercase spellings.
pub fn invalid_status_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("open".to_string()),
        Just("ON_HOLD".to_string()),
        Just("Resolved".to_string()),
        Just("DONE".to_string()),
        "[A-Za-z_]{1,12}",
    ]
    .prop_filter("must not be a legal status", |s| {
        TicketStatus::parse(s).is_err()
    })
}

/// Sequence of statuses to walk a ticket through.
pub fn status_walk(max_len: usize) -> impl Strategy<Value = Vec<TicketStatus>> {
    prop::collection::vec(status(), 1..=max_len)
}

/// Valid ticket input, optionally carrying a caller-supplied status.
///
/// The due date is between one hour and sixty days after
/// [`fixtures::now`].
pub fn create_ticket_input() -> impl Strategy<Value = CreateTicketInput> {
    (
        "[A-Z]{3}-[0-9]{1,6}",
        1..1_000i64,
        1..1_000i64,
        priority(),
        "[a-zA-Z ]{1,80}",
        1..(60 * 24i64),
        prop::option::of(prop_oneof![
            status().prop_map(|s| s.as_str().to_string()),
            "[A-Z_]{1,10}",
        ]),
    )
        .prop_filter("description must not be blank", |(_, _, _, _, d, _, _)| {
            !d.trim().is_empty()
        })
        .prop_map(
            |(code, project_id, asset_id, priority, description, due_hours, status)| {
                CreateTicketInput {
                    ticket_code: code.clone(),
                    project_id,
                    asset_id,
                    priority: Some(priority),
                    description,
                    due_at: Some(fixtures::now() + Duration::hours(due_hours)),
                    status,
                    ..fixtures::create_ticket_input(&code)
                }
            },
        )
}
