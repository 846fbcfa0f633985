//! Upcoming-due reminder sweep.
//!
//! Externally triggered (a cron job hits the endpoint); per-client failures
//! never abort the sweep.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use service_core::error::AppError;

use crate::models::{EmailKind, EmailLog};
use crate::services::email::{upcoming_due_email, EmailSender};
use crate::services::store::MembershipStore;

/// How many calendar days before the due date reminders go out.
pub const REMINDER_LEAD_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub attempted: u64,
    pub sent: u64,
}

/// Send a reminder to every client whose next payment is due exactly
/// [`REMINDER_LEAD_DAYS`] days after `today`.
pub async fn run_upcoming_sweep(
    store: &dyn MembershipStore,
    sender: &dyn EmailSender,
    today: NaiveDate,
) -> Result<SweepOutcome, AppError> {
    let target = today + Duration::days(REMINDER_LEAD_DAYS);
    let due_clients = store.list_clients_due_on(target).await?;

    tracing::info!(
        due_on = %target,
        clients = due_clients.len(),
        "Running upcoming-due reminder sweep"
    );

    let mut outcome = SweepOutcome::default();
    for client in due_clients {
        let Some(to) = client.email.as_deref() else {
            continue;
        };
        outcome.attempted += 1;

        let owner_name = match store.find_owner(client.owner_id).await {
            Ok(Some(owner)) => owner.name,
            _ => "your gym".to_string(),
        };

        let message = upcoming_due_email(to, &client.name, &owner_name, target);

        let log = match sender.send(&message).await {
            Ok(()) => {
                outcome.sent += 1;
                EmailLog::sent(
                    client.owner_id,
                    client.id,
                    EmailKind::UpcomingDue,
                    message.subject.clone(),
                    Some(target),
                )
            }
            Err(e) => {
                tracing::warn!(
                    client_id = %client.id,
                    error = %e,
                    "Reminder email failed"
                );
                EmailLog::failed(
                    client.owner_id,
                    client.id,
                    EmailKind::UpcomingDue,
                    message.subject.clone(),
                    Some(target),
                    e.to_string(),
                )
            }
        };

        if let Err(e) = store.insert_email_log(&log).await {
            tracing::warn!(
                client_id = %client.id,
                error = %e,
                "Could not record reminder email log"
            );
        }
    }

    Ok(outcome)
}
