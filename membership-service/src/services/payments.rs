//! Payment registration workflow.
//!
//! Success is defined solely by the payment insert: the snapshot write-back
//! and the receipt email are advisory and must never fail the registration.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{Client, EmailKind, EmailLog, Payment, Plan};
use crate::services::email::{payment_receipt_email, EmailSender};
use crate::services::store::{ClientSnapshot, MembershipStore};

/// A validated payment submission. Periods are required for new payments
/// even though historical rows may lack them.
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub client_id: Uuid,
    pub plan: Plan,
    pub amount: f64,
    pub discount: f64,
    pub debt: f64,
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
}

/// Register a payment for one of the owner's clients.
///
/// Sequential, deliberately not atomic: once the payment row is stored the
/// registration is a success, whatever happens to the snapshot or the
/// receipt.
pub async fn register_payment(
    store: &dyn MembershipStore,
    sender: &dyn EmailSender,
    owner_id: Uuid,
    submission: PaymentSubmission,
    now: DateTime<Utc>,
) -> Result<Payment, AppError> {
    let client = store
        .find_client(owner_id, submission.client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let payment = Payment {
        id: Uuid::new_v4(),
        client_id: submission.client_id,
        owner_id,
        amount: submission.amount,
        plan: submission.plan,
        discount: submission.discount,
        debt: submission.debt,
        period_from: Some(submission.period_from),
        period_to: Some(submission.period_to),
        next_payment_date: Some(submission.period_to),
        created_at: now,
    };

    tracing::info!(
        payment_id = %payment.id,
        client_id = %payment.client_id,
        owner_id = %owner_id,
        amount = payment.amount,
        plan = %payment.plan,
        "Registering payment"
    );

    store.insert_payment(&payment).await?;

    let snapshot = ClientSnapshot {
        current_debt: payment.debt,
        last_payment_amount: payment.amount,
        last_payment_date: now.date_naive(),
        next_payment_date: payment.period_to,
    };
    if let Err(e) = store
        .update_client_snapshot(owner_id, payment.client_id, &snapshot)
        .await
    {
        tracing::warn!(
            payment_id = %payment.id,
            client_id = %payment.client_id,
            error = %e,
            "Payment stored but client snapshot update failed"
        );
    }

    send_receipt(store, sender, &client, &payment).await;

    Ok(payment)
}

/// Best-effort receipt email plus its audit row. Every failure in here is
/// logged and swallowed.
async fn send_receipt(
    store: &dyn MembershipStore,
    sender: &dyn EmailSender,
    client: &Client,
    payment: &Payment,
) {
    let Some(to) = client.email.as_deref() else {
        return;
    };

    let owner_name = match store.find_owner(payment.owner_id).await {
        Ok(Some(owner)) => owner.name,
        Ok(None) => "your gym".to_string(),
        Err(e) => {
            tracing::warn!(
                owner_id = %payment.owner_id,
                error = %e,
                "Could not load owner for receipt email"
            );
            "your gym".to_string()
        }
    };

    let message = payment_receipt_email(
        to,
        &client.name,
        &owner_name,
        payment.amount,
        payment.plan,
        payment.period_to,
    );

    let log = match sender.send(&message).await {
        Ok(()) => EmailLog::sent(
            payment.owner_id,
            payment.client_id,
            EmailKind::PaymentReceipt,
            message.subject.clone(),
            payment.period_to,
        ),
        Err(e) => {
            tracing::warn!(
                payment_id = %payment.id,
                client_id = %payment.client_id,
                error = %e,
                "Receipt email failed"
            );
            EmailLog::failed(
                payment.owner_id,
                payment.client_id,
                EmailKind::PaymentReceipt,
                message.subject.clone(),
                payment.period_to,
                e.to_string(),
            )
        }
    };

    if let Err(e) = store.insert_email_log(&log).await {
        tracing::warn!(
            payment_id = %payment.id,
            client_id = %payment.client_id,
            error = %e,
            "Could not record receipt email log"
        );
    }
}
