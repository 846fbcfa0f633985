//! Append-only audit trail of outbound emails.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    UpcomingDue,
    PaymentReceipt,
}

impl std::fmt::Display for EmailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailKind::UpcomingDue => write!(f, "upcoming_due"),
            EmailKind::PaymentReceipt => write!(f, "payment_receipt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailLogStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for EmailLogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailLogStatus::Sent => write!(f, "sent"),
            EmailLogStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLog {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub kind: EmailKind,
    pub subject: String,
    pub due_date: Option<NaiveDate>,
    pub status: EmailLogStatus,
    pub error_message: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub sent_at: DateTime<Utc>,
}

impl EmailLog {
    pub fn sent(
        owner_id: Uuid,
        client_id: Uuid,
        kind: EmailKind,
        subject: String,
        due_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            client_id,
            kind,
            subject,
            due_date,
            status: EmailLogStatus::Sent,
            error_message: None,
            sent_at: Utc::now(),
        }
    }

    pub fn failed(
        owner_id: Uuid,
        client_id: Uuid,
        kind: EmailKind,
        subject: String,
        due_date: Option<NaiveDate>,
        error_message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            client_id,
            kind,
            subject,
            due_date,
            status: EmailLogStatus::Failed,
            error_message: Some(error_message),
            sent_at: Utc::now(),
        }
    }
}
