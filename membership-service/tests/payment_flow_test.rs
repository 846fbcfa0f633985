mod common;

use std::sync::atomic::Ordering;

use chrono::{TimeZone, Utc};
use common::{client_for, date, owner_named, InMemoryStore};
use uuid::Uuid;

use membership_service::models::{EmailKind, EmailLogStatus, Plan};
use membership_service::services::payments::{register_payment, PaymentSubmission};
use membership_service::services::MockEmailSender;
use service_core::error::AppError;

fn submission(client_id: Uuid) -> PaymentSubmission {
    PaymentSubmission {
        client_id,
        plan: Plan::Basic,
        amount: 5000.0,
        discount: 0.0,
        debt: 0.0,
        period_from: date(2024, 1, 1),
        period_to: date(2024, 1, 31),
    }
}

#[tokio::test]
async fn registration_persists_payment_snapshot_and_receipt() {
    let owner = owner_named("Iron Temple");
    let client = client_for(owner.id, "Ana", Some("ana@example.com"));
    let store = InMemoryStore::new().with_owner(&owner).with_client(&client);
    let sender = MockEmailSender::new(true);
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let payment = register_payment(&store, &sender, owner.id, submission(client.id), now)
        .await
        .expect("registration succeeds");

    assert_eq!(payment.client_id, client.id);
    assert_eq!(payment.next_payment_date, Some(date(2024, 1, 31)));
    assert_eq!(store.stored_payments().len(), 1);

    let stored = store.stored_client(client.id).expect("client present");
    assert_eq!(stored.current_debt, 0.0);
    assert_eq!(stored.last_payment_amount, Some(5000.0));
    assert_eq!(stored.last_payment_date, Some(date(2024, 1, 10)));
    assert_eq!(stored.next_payment_date, Some(date(2024, 1, 31)));

    let outbox = sender.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "ana@example.com");
    assert!(outbox[0].subject.contains("Iron Temple"));

    let logs = store.stored_email_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, EmailKind::PaymentReceipt);
    assert_eq!(logs[0].status, EmailLogStatus::Sent);
    assert_eq!(logs[0].due_date, Some(date(2024, 1, 31)));
}

#[tokio::test]
async fn snapshot_failure_does_not_fail_the_registration() {
    let owner = owner_named("Iron Temple");
    let client = client_for(owner.id, "Ana", Some("ana@example.com"));
    let store = InMemoryStore::new().with_owner(&owner).with_client(&client);
    store.fail_snapshot_update.store(true, Ordering::SeqCst);
    let sender = MockEmailSender::new(true);
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let result = register_payment(&store, &sender, owner.id, submission(client.id), now).await;

    assert!(result.is_ok());
    assert_eq!(store.stored_payments().len(), 1);

    // Snapshot stayed stale; the ledger is still authoritative.
    let stored = store.stored_client(client.id).expect("client present");
    assert_eq!(stored.last_payment_amount, None);

    // The receipt still went out.
    assert_eq!(sender.send_count(), 1);
}

#[tokio::test]
async fn email_failure_is_logged_but_swallowed() {
    let owner = owner_named("Iron Temple");
    let client = client_for(owner.id, "Ana", Some("ana@example.com"));
    let store = InMemoryStore::new().with_owner(&owner).with_client(&client);
    let sender = MockEmailSender::failing("smtp unavailable");
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let result = register_payment(&store, &sender, owner.id, submission(client.id), now).await;

    assert!(result.is_ok());
    assert_eq!(store.stored_payments().len(), 1);

    let logs = store.stored_email_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, EmailLogStatus::Failed);
    assert!(logs[0]
        .error_message
        .as_deref()
        .is_some_and(|msg| msg.contains("smtp unavailable")));
}

#[tokio::test]
async fn clients_without_email_get_no_receipt_attempt() {
    let owner = owner_named("Iron Temple");
    let client = client_for(owner.id, "Ana", None);
    let store = InMemoryStore::new().with_owner(&owner).with_client(&client);
    let sender = MockEmailSender::new(true);
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let result = register_payment(&store, &sender, owner.id, submission(client.id), now).await;

    assert!(result.is_ok());
    assert_eq!(sender.send_count(), 0);
    assert!(store.stored_email_logs().is_empty());
}

#[tokio::test]
async fn email_log_failure_is_swallowed_too() {
    let owner = owner_named("Iron Temple");
    let client = client_for(owner.id, "Ana", Some("ana@example.com"));
    let store = InMemoryStore::new().with_owner(&owner).with_client(&client);
    store.fail_email_log_insert.store(true, Ordering::SeqCst);
    let sender = MockEmailSender::new(true);
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let result = register_payment(&store, &sender, owner.id, submission(client.id), now).await;

    assert!(result.is_ok());
    assert_eq!(sender.send_count(), 1);
    assert!(store.stored_email_logs().is_empty());
}

#[tokio::test]
async fn insert_failure_aborts_the_whole_workflow() {
    let owner = owner_named("Iron Temple");
    let client = client_for(owner.id, "Ana", Some("ana@example.com"));
    let store = InMemoryStore::new().with_owner(&owner).with_client(&client);
    store.fail_payment_insert.store(true, Ordering::SeqCst);
    let sender = MockEmailSender::new(true);
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let result = register_payment(&store, &sender, owner.id, submission(client.id), now).await;

    assert!(matches!(result, Err(AppError::DatabaseError(_))));
    assert!(store.stored_payments().is_empty());

    // No snapshot update, no email, no audit row once the insert fails.
    let stored = store.stored_client(client.id).expect("client present");
    assert_eq!(stored.last_payment_amount, None);
    assert_eq!(sender.send_count(), 0);
    assert!(store.stored_email_logs().is_empty());
}

#[tokio::test]
async fn unknown_client_is_rejected_before_any_side_effect() {
    let owner = owner_named("Iron Temple");
    let store = InMemoryStore::new().with_owner(&owner);
    let sender = MockEmailSender::new(true);
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 11, 0, 0).unwrap();

    let result = register_payment(&store, &sender, owner.id, submission(Uuid::new_v4()), now).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(store.stored_payments().is_empty());
    assert_eq!(sender.send_count(), 0);
}
