//! Outbound email: delivery seam, SMTP transport and message templates.
//!
//! Sends are at-most-once: a failure is reported to the caller, logged and
//! abandoned. Nothing here retries.

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::models::Plan;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Email configuration error: {0}")]
    Configuration(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

/// A fully rendered message, ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
    fn is_enabled(&self) -> bool;
}

pub struct SmtpEmailSender {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailSender {
    pub fn new(config: SmtpConfig) -> Result<Self, EmailError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                EmailError::Configuration(format!("Failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        if !self.config.enabled {
            return Err(EmailError::NotEnabled(
                "SMTP email sender is not enabled".to_string(),
            ));
        }

        let transport = self.transport.as_ref().ok_or_else(|| {
            EmailError::Configuration("SMTP transport not initialized".to_string())
        })?;

        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| EmailError::Configuration(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = email
            .to
            .parse()
            .map_err(|e| EmailError::InvalidRecipient(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.body_html.clone()),
                    ),
            )
            .map_err(|e| EmailError::SendFailed(format!("Failed to build message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(format!("Failed to send email: {}", e)))?;

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email sent successfully"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Mock email sender for development and tests. Records every message it is
/// asked to send; can be configured to fail each send with a fixed error.
pub struct MockEmailSender {
    enabled: bool,
    fail_with: Option<String>,
    send_count: AtomicU64,
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl MockEmailSender {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            fail_with: None,
            send_count: AtomicU64::new(0),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// A sender whose every send fails with `message`, for exercising the
    /// advisory-failure paths.
    pub fn failing(message: &str) -> Self {
        Self {
            enabled: true,
            fail_with: Some(message.to_string()),
            send_count: AtomicU64::new(0),
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().expect("outbox lock poisoned").clone()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        if !self.enabled {
            return Err(EmailError::NotEnabled(
                "Mock email sender is not enabled".to_string(),
            ));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_with {
            return Err(EmailError::SendFailed(message.clone()));
        }

        self.outbox
            .lock()
            .expect("outbox lock poisoned")
            .push(email.clone());

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "[MOCK] Email would be sent"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn format_day(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Receipt sent to a client right after a payment is registered.
pub fn payment_receipt_email(
    to: &str,
    client_name: &str,
    owner_name: &str,
    amount: f64,
    plan: Plan,
    due_date: Option<NaiveDate>,
) -> OutgoingEmail {
    let subject = format!("Payment receipt - {}", owner_name);
    let due_line = due_date
        .map(|d| format!("Your membership is covered until {}.", format_day(d)))
        .unwrap_or_default();

    let body_text = format!(
        "Hi {client_name},\n\n\
         We received your payment of {amount:.2} for the {plan} plan. {due_line}\n\n\
         Thanks for training with us!",
    );
    let body_html = format!(
        "<p>Hi {client_name},</p>\
         <p>We received your payment of <strong>{amount:.2}</strong> for the {plan} plan. {due_line}</p>\
         <p>Thanks for training with us!</p>",
    );

    OutgoingEmail {
        to: to.to_string(),
        subject,
        body_text,
        body_html,
    }
}

/// Reminder sent a few days ahead of a client's due date.
pub fn upcoming_due_email(
    to: &str,
    client_name: &str,
    owner_name: &str,
    due_date: NaiveDate,
) -> OutgoingEmail {
    let subject = format!("Membership payment reminder - {}", owner_name);
    let due = format_day(due_date);

    let body_text = format!(
        "Hi {client_name},\n\n\
         This is a reminder that your membership payment is due on {due}.\n\
         If you have already paid, please disregard this message.\n\n\
         Thanks for training with us!",
    );
    let body_html = format!(
        "<p>Hi {client_name},</p>\
         <p>This is a reminder that your membership payment is due on <strong>{due}</strong>.</p>\
         <p>If you have already paid, please disregard this message.</p>\
         <p>Thanks for training with us!</p>",
    );

    OutgoingEmail {
        to: to.to_string(),
        subject,
        body_text,
        body_html,
    }
}
