//! Property tests for the lifecycle and resolution invariants.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use helpdesk_core::error::TicketError;
use helpdesk_core::input::UpdateTicketStatusInput;
use helpdesk_core::types::{HistoryAction, TicketStatus};
use helpdesk_testing::{TestHelpdesk, fixtures, strategies};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime should build")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn created_tickets_are_open_with_one_created_row(input in strategies::create_ticket_input()) {
        runtime().block_on(async {
            let helpdesk = TestHelpdesk::new();
            let ticket = helpdesk.tickets.create(fixtures::REPORTER, &input).await.unwrap();

            prop_assert_eq!(ticket.status, TicketStatus::Open);
            let history = helpdesk.history.list_history(ticket.id).await.unwrap();
            prop_assert_eq!(history.len(), 1);
            prop_assert_eq!(history[0].action, HistoryAction::Created);
            Ok(())
        })?;
    }

    #[test]
    fn invalid_status_never_mutates(status in strategies::invalid_status_text()) {
        runtime().block_on(async {
            let helpdesk = TestHelpdesk::new();
            let ticket = helpdesk
                .tickets
                .create(fixtures::REPORTER, &fixtures::create_ticket_input("TCK-P"))
                .await
                .unwrap();

            let result = helpdesk
                .tickets
                .update_status(ticket.id, fixtures::AGENT, &UpdateTicketStatusInput::new(status.clone()))
                .await;

            prop_assert_eq!(result, Err(TicketError::InvalidStatus(status)));
            prop_assert_eq!(helpdesk.tickets.find_by_id(ticket.id).await.unwrap(), ticket);
            prop_assert_eq!(helpdesk.store.all_history().await.len(), 1);
            Ok(())
        })?;
    }

    #[test]
    fn status_walk_keeps_audit_trail_in_step(walk in strategies::status_walk(12)) {
        runtime().block_on(async {
            let helpdesk = TestHelpdesk::new();
            let ticket = helpdesk
                .tickets
                .create(fixtures::REPORTER, &fixtures::create_ticket_input("TCK-WALK"))
                .await
                .unwrap();

            let mut current = TicketStatus::Open;
            let mut changes = 0;
            for next in walk {
                let result = helpdesk
                    .tickets
                    .update_status(ticket.id, fixtures::AGENT, &UpdateTicketStatusInput::new(next.as_str()))
                    .await;
                if next == current {
                    prop_assert_eq!(result, Err(TicketError::NoOpTransition(next)));
                } else {
                    prop_assert!(result.is_ok());
                    current = next;
                    changes += 1;
                }
            }

            let stored = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
            prop_assert_eq!(stored.status, current);
            let history = helpdesk.history.list_history(ticket.id).await.unwrap();
            prop_assert_eq!(history.len(), changes + 1);
            prop_assert_eq!(history[0].new_value.as_deref(), Some(current.as_str()));
            if current == TicketStatus::Resolved {
                prop_assert!(stored.resolved_at.is_some_and(|at| at >= fixtures::now()));
            }
            Ok(())
        })?;
    }

    #[test]
    fn resolve_succeeds_once_from_any_unresolved_status(start in strategies::status()) {
        runtime().block_on(async {
            let helpdesk = TestHelpdesk::new();
            helpdesk.store.seed_cause(fixtures::cause(fixtures::CAUSE_ID, 3)).await;
            helpdesk
                .store
                .seed_solution(fixtures::solution(fixtures::SOLUTION_ID, fixtures::CAUSE_ID))
                .await;
            let ticket = helpdesk
                .tickets
                .create(fixtures::REPORTER, &fixtures::create_ticket_input("TCK-ANY"))
                .await
                .unwrap();
            if start != TicketStatus::Open {
                helpdesk
                    .tickets
                    .update_status(ticket.id, fixtures::AGENT, &UpdateTicketStatusInput::new(start.as_str()))
                    .await
                    .unwrap();
            }
            let history_before = helpdesk.store.all_history().await.len();

            let result = helpdesk
                .resolutions
                .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("fixed"))
                .await;

            let resolutions = helpdesk.store.all_resolutions().await.len();
            let history_after = helpdesk.store.all_history().await.len();
            if start == TicketStatus::Resolved {
                prop_assert_eq!(result, Err(TicketError::AlreadyResolved(ticket.id)));
                prop_assert_eq!(resolutions, 0);
                prop_assert_eq!(history_after, history_before);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(resolutions, 1);
                prop_assert_eq!(history_after, history_before + 1);
                let stored = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
                prop_assert_eq!(stored.status, TicketStatus::Resolved);
            }
            Ok(())
        })?;
    }
}
