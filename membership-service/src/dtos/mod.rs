//! Request/response types for the HTTP surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use service_core::error::AppError;

use crate::models::{Client, ClientStatus, EmailKind, EmailLog, EmailLogStatus, Owner, Payment, Plan};
use crate::services::payments::PaymentSubmission;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOwnerRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    #[validate(length(equal = 4, message = "PIN must be exactly 4 digits"))]
    pub pin: String,
}

impl PinRequest {
    /// The PIN must be four ASCII digits.
    pub fn checked_pin(&self) -> Result<&str, AppError> {
        if self.pin.len() == 4 && self.pin.bytes().all(|b| b.is_ascii_digit()) {
            Ok(&self.pin)
        } else {
            Err(AppError::BadRequest(anyhow::anyhow!("invalid PIN")))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<Owner> for OwnerResponse {
    fn from(owner: Owner) -> Self {
        Self {
            id: owner.id,
            name: owner.name,
            email: owner.email,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
    pub current_debt: f64,
    pub last_payment_amount: Option<f64>,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            name: client.name,
            email: client.email,
            phone: client.phone,
            address: client.address,
            address_number: client.address_number,
            current_debt: client.current_debt,
            last_payment_amount: client.last_payment_amount,
            last_payment_date: client.last_payment_date,
            next_payment_date: client.next_payment_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClientsQuery {
    pub status: Option<ClientStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientScopedQuery {
    pub client_id: Option<Uuid>,
}

impl ClientScopedQuery {
    pub fn required_client_id(&self) -> Result<Uuid, AppError> {
        self.client_id
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("clientId is required")))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPaymentRequest {
    #[validate(required(message = "clientId is required"))]
    pub client_id: Option<Uuid>,
    #[validate(required(message = "plan is required"))]
    pub plan: Option<Plan>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "amount must not be negative"))]
    pub amount: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "discount must not be negative"))]
    pub discount: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "debt must not be negative"))]
    pub debt: f64,
    #[validate(required(message = "periodFrom is required"))]
    pub period_from: Option<NaiveDate>,
    #[validate(required(message = "periodTo is required"))]
    pub period_to: Option<NaiveDate>,
}

impl RegisterPaymentRequest {
    /// Collapse the validated optionals into a typed submission.
    pub fn into_submission(self) -> Result<PaymentSubmission, AppError> {
        let (Some(client_id), Some(plan), Some(period_from), Some(period_to)) =
            (self.client_id, self.plan, self.period_from, self.period_to)
        else {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "clientId, plan, periodFrom and periodTo are required"
            )));
        };

        Ok(PaymentSubmission {
            client_id,
            plan,
            amount: self.amount,
            discount: self.discount,
            debt: self.debt,
            period_from,
            period_to,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub amount: f64,
    pub plan: Plan,
    pub discount: f64,
    pub debt: f64,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            client_id: payment.client_id,
            amount: payment.amount,
            plan: payment.plan,
            discount: payment.discount,
            debt: payment.debt,
            period_from: payment.period_from,
            period_to: payment.period_to,
            next_payment_date: payment.next_payment_date,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLogEntry {
    pub id: Uuid,
    pub kind: EmailKind,
    pub subject: String,
    pub due_date: Option<NaiveDate>,
    pub status: EmailLogStatus,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl From<EmailLog> for EmailLogEntry {
    fn from(log: EmailLog) -> Self {
        Self {
            id: log.id,
            kind: log.kind,
            subject: log.subject,
            due_date: log.due_date,
            status: log.status,
            error_message: log.error_message,
            sent_at: log.sent_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailHistoryResponse {
    pub emails: Vec<EmailLogEntry>,
}
