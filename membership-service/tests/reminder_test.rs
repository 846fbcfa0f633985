mod common;

use std::sync::atomic::Ordering;

use chrono::Duration;
use common::{client_for, date, owner_named, InMemoryStore};

use membership_service::models::{EmailKind, EmailLogStatus};
use membership_service::services::reminder::{run_upcoming_sweep, REMINDER_LEAD_DAYS};
use membership_service::services::MockEmailSender;

#[tokio::test]
async fn sweep_reminds_exactly_the_clients_due_in_five_days() {
    let owner = owner_named("Iron Temple");
    let today = date(2024, 6, 10);
    let target = today + Duration::days(REMINDER_LEAD_DAYS);

    let mut due_ana = client_for(owner.id, "Ana", Some("ana@example.com"));
    due_ana.next_payment_date = Some(target);
    let mut due_bruno = client_for(owner.id, "Bruno", Some("bruno@example.com"));
    due_bruno.next_payment_date = Some(target);
    // Due the same day but unreachable: filtered out by the query clause.
    let mut due_no_email = client_for(owner.id, "Carla", None);
    due_no_email.next_payment_date = Some(target);
    // Reachable but due a different day.
    let mut due_later = client_for(owner.id, "Diego", Some("diego@example.com"));
    due_later.next_payment_date = Some(target + Duration::days(1));

    let store = InMemoryStore::new()
        .with_owner(&owner)
        .with_client(&due_ana)
        .with_client(&due_bruno)
        .with_client(&due_no_email)
        .with_client(&due_later);
    let sender = MockEmailSender::new(true);

    let outcome = run_upcoming_sweep(&store, &sender, today)
        .await
        .expect("sweep succeeds");

    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.sent, 2);

    let outbox = sender.outbox();
    assert_eq!(outbox.len(), 2);
    assert!(outbox.iter().all(|e| e.subject.contains("Iron Temple")));

    let logs = store.stored_email_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| {
        l.kind == EmailKind::UpcomingDue
            && l.status == EmailLogStatus::Sent
            && l.due_date == Some(target)
    }));
}

#[tokio::test]
async fn transport_failures_are_logged_per_client_and_never_abort() {
    let owner = owner_named("Iron Temple");
    let today = date(2024, 6, 10);
    let target = today + Duration::days(REMINDER_LEAD_DAYS);

    let mut ana = client_for(owner.id, "Ana", Some("ana@example.com"));
    ana.next_payment_date = Some(target);
    let mut bruno = client_for(owner.id, "Bruno", Some("bruno@example.com"));
    bruno.next_payment_date = Some(target);

    let store = InMemoryStore::new()
        .with_owner(&owner)
        .with_client(&ana)
        .with_client(&bruno);
    let sender = MockEmailSender::failing("smtp down");

    let outcome = run_upcoming_sweep(&store, &sender, today)
        .await
        .expect("sweep still succeeds");

    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.sent, 0);

    let logs = store.stored_email_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| {
        l.status == EmailLogStatus::Failed
            && l.error_message.as_deref().is_some_and(|m| m.contains("smtp down"))
    }));
}

#[tokio::test]
async fn audit_row_failures_do_not_stop_the_sweep() {
    let owner = owner_named("Iron Temple");
    let today = date(2024, 6, 10);
    let target = today + Duration::days(REMINDER_LEAD_DAYS);

    let mut ana = client_for(owner.id, "Ana", Some("ana@example.com"));
    ana.next_payment_date = Some(target);

    let store = InMemoryStore::new().with_owner(&owner).with_client(&ana);
    store.fail_email_log_insert.store(true, Ordering::SeqCst);
    let sender = MockEmailSender::new(true);

    let outcome = run_upcoming_sweep(&store, &sender, today)
        .await
        .expect("sweep succeeds despite audit failures");

    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.sent, 1);
    assert!(store.stored_email_logs().is_empty());
}

#[tokio::test]
async fn quiet_days_produce_an_empty_outcome() {
    let owner = owner_named("Iron Temple");
    let store = InMemoryStore::new().with_owner(&owner);
    let sender = MockEmailSender::new(true);

    let outcome = run_upcoming_sweep(&store, &sender, date(2024, 6, 10))
        .await
        .expect("sweep succeeds");

    assert_eq!(outcome.attempted, 0);
    assert_eq!(outcome.sent, 0);
    assert_eq!(sender.send_count(), 0);
}
