//! Shared test fixtures: an in-memory store double and model builders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use membership_service::models::{Client, EmailLog, Owner, Payment, Plan};
use membership_service::services::store::{
    ClientContactUpdate, ClientSnapshot, MembershipStore,
};
use service_core::error::AppError;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn owner_named(name: &str) -> Owner {
    Owner::new(
        name.to_string(),
        format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        "$argon2id$test-hash".to_string(),
    )
}

pub fn client_for(owner_id: Uuid, name: &str, email: Option<&str>) -> Client {
    Client::new(
        owner_id,
        name.to_string(),
        email.map(str::to_string),
        None,
        None,
        None,
    )
}

pub fn payment_for(client: &Client, created_at: DateTime<Utc>, amount: f64, debt: f64) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        client_id: client.id,
        owner_id: client.owner_id,
        amount,
        plan: Plan::Basic,
        discount: 0.0,
        debt,
        period_from: None,
        period_to: None,
        next_payment_date: None,
        created_at,
    }
}

pub fn payment_with_period(
    client: &Client,
    created_at: DateTime<Utc>,
    amount: f64,
    debt: f64,
    from: NaiveDate,
    to: NaiveDate,
) -> Payment {
    let mut payment = payment_for(client, created_at, amount, debt);
    payment.period_from = Some(from);
    payment.period_to = Some(to);
    payment.next_payment_date = Some(to);
    payment
}

/// In-memory [`MembershipStore`] with switchable failure injection for the
/// advisory paths.
#[derive(Default)]
pub struct InMemoryStore {
    pub owners: Mutex<Vec<Owner>>,
    pub clients: Mutex<Vec<Client>>,
    pub payments: Mutex<Vec<Payment>>,
    pub email_logs: Mutex<Vec<EmailLog>>,
    pub fail_payment_insert: AtomicBool,
    pub fail_snapshot_update: AtomicBool,
    pub fail_email_log_insert: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(self, owner: &Owner) -> Self {
        self.owners
            .lock()
            .expect("owners lock")
            .push(owner.clone());
        self
    }

    pub fn with_client(self, client: &Client) -> Self {
        self.clients
            .lock()
            .expect("clients lock")
            .push(client.clone());
        self
    }

    pub fn with_payment(self, payment: &Payment) -> Self {
        self.payments
            .lock()
            .expect("payments lock")
            .push(payment.clone());
        self
    }

    pub fn stored_payments(&self) -> Vec<Payment> {
        self.payments.lock().expect("payments lock").clone()
    }

    pub fn stored_client(&self, client_id: Uuid) -> Option<Client> {
        self.clients
            .lock()
            .expect("clients lock")
            .iter()
            .find(|c| c.id == client_id)
            .cloned()
    }

    pub fn stored_email_logs(&self) -> Vec<EmailLog> {
        self.email_logs.lock().expect("email_logs lock").clone()
    }

    fn database_error(what: &str) -> AppError {
        AppError::DatabaseError(anyhow::anyhow!("injected {what} failure"))
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_owner(&self, owner: &Owner) -> Result<(), AppError> {
        let mut owners = self.owners.lock().expect("owners lock");
        if owners.iter().any(|o| o.email == owner.email) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "an account with that email already exists"
            )));
        }
        owners.push(owner.clone());
        Ok(())
    }

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<Owner>, AppError> {
        Ok(self
            .owners
            .lock()
            .expect("owners lock")
            .iter()
            .find(|o| o.id == owner_id)
            .cloned())
    }

    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, AppError> {
        Ok(self
            .owners
            .lock()
            .expect("owners lock")
            .iter()
            .find(|o| o.email == email)
            .cloned())
    }

    async fn update_owner_pin(
        &self,
        owner_id: Uuid,
        pin_hash: Option<String>,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut owners = self.owners.lock().expect("owners lock");
        if let Some(owner) = owners.iter_mut().find(|o| o.id == owner_id) {
            if let Some(hash) = pin_hash {
                owner.pin_hash = Some(hash);
            }
            owner.pin_failed_attempts = failed_attempts;
            owner.pin_locked_until = locked_until;
        }
        Ok(())
    }

    async fn insert_client(&self, client: &Client) -> Result<(), AppError> {
        self.clients
            .lock()
            .expect("clients lock")
            .push(client.clone());
        Ok(())
    }

    async fn list_clients(&self, owner_id: Uuid) -> Result<Vec<Client>, AppError> {
        Ok(self
            .clients
            .lock()
            .expect("clients lock")
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        Ok(self
            .clients
            .lock()
            .expect("clients lock")
            .iter()
            .find(|c| c.owner_id == owner_id && c.id == client_id)
            .cloned())
    }

    async fn update_client_contact(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        contact: &ClientContactUpdate,
    ) -> Result<Option<Client>, AppError> {
        let mut clients = self.clients.lock().expect("clients lock");
        let Some(client) = clients
            .iter_mut()
            .find(|c| c.owner_id == owner_id && c.id == client_id)
        else {
            return Ok(None);
        };
        client.email = contact.email.clone();
        client.phone = contact.phone.clone();
        client.address = contact.address.clone();
        client.address_number = contact.address_number.clone();
        Ok(Some(client.clone()))
    }

    async fn delete_client(&self, owner_id: Uuid, client_id: Uuid) -> Result<bool, AppError> {
        self.payments
            .lock()
            .expect("payments lock")
            .retain(|p| !(p.owner_id == owner_id && p.client_id == client_id));

        let mut clients = self.clients.lock().expect("clients lock");
        let before = clients.len();
        clients.retain(|c| !(c.owner_id == owner_id && c.id == client_id));
        Ok(clients.len() < before)
    }

    async fn update_client_snapshot(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        snapshot: &ClientSnapshot,
    ) -> Result<(), AppError> {
        if self.fail_snapshot_update.load(Ordering::SeqCst) {
            return Err(Self::database_error("snapshot update"));
        }

        let mut clients = self.clients.lock().expect("clients lock");
        if let Some(client) = clients
            .iter_mut()
            .find(|c| c.owner_id == owner_id && c.id == client_id)
        {
            client.current_debt = snapshot.current_debt;
            client.last_payment_amount = Some(snapshot.last_payment_amount);
            client.last_payment_date = Some(snapshot.last_payment_date);
            client.next_payment_date = snapshot.next_payment_date;
        }
        Ok(())
    }

    async fn list_clients_due_on(&self, due: NaiveDate) -> Result<Vec<Client>, AppError> {
        Ok(self
            .clients
            .lock()
            .expect("clients lock")
            .iter()
            .filter(|c| c.next_payment_date == Some(due) && c.email.is_some())
            .cloned()
            .collect())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError> {
        if self.fail_payment_insert.load(Ordering::SeqCst) {
            return Err(Self::database_error("payment insert"));
        }
        self.payments
            .lock()
            .expect("payments lock")
            .push(payment.clone());
        Ok(())
    }

    async fn list_payments(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .payments
            .lock()
            .expect("payments lock")
            .iter()
            .filter(|p| p.owner_id == owner_id && p.client_id == client_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn insert_email_log(&self, log: &EmailLog) -> Result<(), AppError> {
        if self.fail_email_log_insert.load(Ordering::SeqCst) {
            return Err(Self::database_error("email log insert"));
        }
        self.email_logs
            .lock()
            .expect("email_logs lock")
            .push(log.clone());
        Ok(())
    }

    async fn list_email_logs(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<EmailLog>, AppError> {
        let mut logs: Vec<EmailLog> = self
            .email_logs
            .lock()
            .expect("email_logs lock")
            .iter()
            .filter(|l| l.owner_id == owner_id && l.client_id == client_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(logs)
    }
}
