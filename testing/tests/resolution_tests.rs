//! Resolution workflow scenarios against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use helpdesk_core::error::{StoreError, TicketError};
use helpdesk_core::input::UpdateTicketStatusInput;
use helpdesk_core::types::{HistoryAction, Ticket, TicketId, TicketStatus};
use helpdesk_testing::{FailPoint, TestHelpdesk, fixtures, init_test_tracing};

async fn helpdesk_with_catalogue() -> TestHelpdesk {
    let helpdesk = TestHelpdesk::new();
    helpdesk
        .store
        .seed_cause(fixtures::cause(fixtures::CAUSE_ID, 3))
        .await;
    helpdesk
        .store
        .seed_solution(fixtures::solution(fixtures::SOLUTION_ID, fixtures::CAUSE_ID))
        .await;
    helpdesk
}

async fn open_ticket(helpdesk: &TestHelpdesk, code: &str) -> Ticket {
    helpdesk
        .tickets
        .create(fixtures::REPORTER, &fixtures::create_ticket_input(code))
        .await
        .unwrap()
}

#[tokio::test]
async fn resolving_an_open_ticket() {
    init_test_tracing();
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-E").await;

    let resolution = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("fixed"))
        .await
        .unwrap();

    assert_eq!(resolution.ticket_id, ticket.id);
    assert_eq!(resolution.cause_id, 1);
    assert_eq!(resolution.solution_id, 2);
    assert_eq!(resolution.resolution_notes, "fixed");
    assert_eq!(resolution.completion_time, fixtures::now());

    let stored = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
    assert_eq!(stored.status, TicketStatus::Resolved);
    assert_eq!(stored.resolved_at, Some(fixtures::now()));

    assert_eq!(helpdesk.store.all_resolutions().await.len(), 1);
    let history = helpdesk.history.list_history(ticket.id).await.unwrap();
    let updates: Vec<_> = history
        .iter()
        .filter(|h| h.action == HistoryAction::UpdateStatus)
        .collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].field_name, "status");
    assert_eq!(updates[0].old_value.as_deref(), Some("OPEN"));
    assert_eq!(updates[0].new_value.as_deref(), Some("RESOLVED"));
    assert_eq!(updates[0].user_id, fixtures::AGENT);
}

#[tokio::test]
async fn resolving_a_resolved_ticket_fails_without_writes() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-D").await;
    helpdesk
        .tickets
        .update_status(ticket.id, fixtures::AGENT, &UpdateTicketStatusInput::new("RESOLVED"))
        .await
        .unwrap();
    let before = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
    let history_before = helpdesk.store.all_history().await.len();

    let result = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("again"))
        .await;

    assert_eq!(result, Err(TicketError::AlreadyResolved(ticket.id)));
    assert!(helpdesk.store.all_resolutions().await.is_empty());
    assert_eq!(helpdesk.store.all_history().await.len(), history_before);
    assert_eq!(helpdesk.tickets.find_by_id(ticket.id).await.unwrap(), before);
}

#[tokio::test]
async fn second_resolution_is_rejected() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-TWICE").await;
    let input = fixtures::resolution_input("fixed");

    helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &input)
        .await
        .unwrap();
    let result = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &input)
        .await;

    assert_eq!(result, Err(TicketError::AlreadyResolved(ticket.id)));
    assert_eq!(helpdesk.store.all_resolutions().await.len(), 1);
}

#[tokio::test]
async fn status_forced_to_resolved_blocks_resolution() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-FORCED").await;
    assert!(helpdesk.store.force_status(ticket.id, TicketStatus::Resolved).await);

    let result = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("n/a"))
        .await;

    assert_eq!(result, Err(TicketError::AlreadyResolved(ticket.id)));
}

#[tokio::test]
async fn reopened_ticket_cannot_be_resolved_twice() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-REOPEN").await;
    helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("first"))
        .await
        .unwrap();
    helpdesk
        .tickets
        .update_status(ticket.id, fixtures::AGENT, &UpdateTicketStatusInput::new("OPEN"))
        .await
        .unwrap();

    let err = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("second"))
        .await
        .unwrap_err();

    assert_eq!(err, TicketError::AlreadyResolved(ticket.id));
    assert!(err.is_user_error());
    let stored = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
    assert_eq!(stored.status, TicketStatus::Open);
    let resolutions = helpdesk.store.all_resolutions().await;
    assert_eq!(resolutions.len(), 1);
    assert_eq!(resolutions[0].resolution_notes, "first");
    assert_eq!(helpdesk.history.list_history(ticket.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn missing_ticket_is_not_found() {
    let helpdesk = helpdesk_with_catalogue().await;
    let result = helpdesk
        .resolutions
        .resolve(TicketId(77), fixtures::AGENT, &fixtures::resolution_input("x"))
        .await;
    assert_eq!(result, Err(TicketError::ticket_not_found(TicketId(77))));
}

#[tokio::test]
async fn references_are_required() {
    let helpdesk = helpdesk_with_catalogue().await;
    let input = helpdesk_core::input::CreateResolutionInput {
        cause_id: 0,
        ..fixtures::resolution_input("x")
    };

    let err = helpdesk
        .resolutions
        .resolve(TicketId(0), fixtures::AGENT, &input)
        .await
        .unwrap_err();

    let TicketError::InvalidInput(errors) = err else {
        unreachable!("expected InvalidInput, got {err:?}");
    };
    assert!(errors.has_field("ticket_id"));
    assert!(errors.has_field("cause_id"));
    assert!(!errors.has_field("solution_id"));
}

#[tokio::test]
async fn explicit_completion_time_is_kept() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-TIME").await;
    let completed = fixtures::now() - Duration::hours(3);
    let input = helpdesk_core::input::CreateResolutionInput {
        completion_time: Some(completed),
        ..fixtures::resolution_input("done earlier")
    };

    let resolution = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &input)
        .await
        .unwrap();

    assert_eq!(resolution.completion_time, completed);
    assert_eq!(resolution.created_at, fixtures::now());
}

#[tokio::test]
async fn history_failure_rolls_back_resolution_and_status() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-FAIL").await;
    helpdesk.store.fail_on(FailPoint::InsertHistory);

    let result = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("fixed"))
        .await;

    assert!(matches!(
        result,
        Err(TicketError::Storage(StoreError::Database(_)))
    ));
    helpdesk.store.clear_faults();
    assert!(helpdesk.store.all_resolutions().await.is_empty());
    let stored = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
    assert_eq!(stored.status, TicketStatus::Open);
    assert!(stored.resolved_at.is_none());
}

#[tokio::test]
async fn unknown_cause_fails_as_storage_error() {
    let helpdesk = TestHelpdesk::new();
    let ticket = open_ticket(&helpdesk, "TCK-NOCAUSE").await;

    let result = helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("fixed"))
        .await;

    assert!(matches!(result, Err(TicketError::Storage(_))));
    let stored = helpdesk.tickets.find_by_id(ticket.id).await.unwrap();
    assert_eq!(stored.status, TicketStatus::Open);
}

#[tokio::test]
async fn read_side_attaches_cause_and_solution() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-READ").await;
    helpdesk
        .resolutions
        .resolve(ticket.id, fixtures::AGENT, &fixtures::resolution_input("fixed"))
        .await
        .unwrap();

    let resolution = helpdesk
        .resolutions
        .find_by_ticket_id(ticket.id)
        .await
        .unwrap();

    assert_eq!(resolution.cause.unwrap().id, fixtures::CAUSE_ID);
    assert_eq!(resolution.solution.unwrap().cause_id, fixtures::CAUSE_ID);
}

#[tokio::test]
async fn read_side_without_resolution_is_not_found() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket = open_ticket(&helpdesk, "TCK-NONE").await;

    let result = helpdesk.resolutions.find_by_ticket_id(ticket.id).await;

    assert!(matches!(
        result,
        Err(TicketError::NotFound { entity: "ticket resolution", id }) if id == ticket.id.get()
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_have_one_winner() {
    let helpdesk = helpdesk_with_catalogue().await;
    let ticket_id = open_ticket(&helpdesk, "TCK-RACE").await.id;

    let attempts = (0..8).map(|i| {
        let resolutions = helpdesk.resolutions.clone();
        tokio::spawn(async move {
            resolutions
                .resolve(
                    ticket_id,
                    fixtures::AGENT,
                    &fixtures::resolution_input(&format!("attempt {i}")),
                )
                .await
        })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("resolve task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == TicketError::AlreadyResolved(ticket_id))
    );
    assert_eq!(helpdesk.store.all_resolutions().await.len(), 1);
    let resolved_rows = helpdesk
        .store
        .all_history()
        .await
        .into_iter()
        .filter(|h| h.action == HistoryAction::UpdateStatus)
        .count();
    assert_eq!(resolved_rows, 1);
}
