//! Persistence contract and MongoDB implementation.
//!
//! All data access goes through [`MembershipStore`] so the workflows can be
//! exercised against an in-memory double; [`MembershipRepository`] is the
//! MongoDB implementation used at runtime. Every query is scoped to the
//! owning tenant.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{Client, EmailLog, Owner, Payment};

/// Snapshot fields written back to the client after a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSnapshot {
    pub current_debt: f64,
    pub last_payment_amount: f64,
    pub last_payment_date: NaiveDate,
    pub next_payment_date: Option<NaiveDate>,
}

/// Contact fields an owner may edit on a client. The name is immutable
/// post-creation.
#[derive(Debug, Clone, Default)]
pub struct ClientContactUpdate {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn insert_owner(&self, owner: &Owner) -> Result<(), AppError>;
    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<Owner>, AppError>;
    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, AppError>;
    async fn update_owner_pin(
        &self,
        owner_id: Uuid,
        pin_hash: Option<String>,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    async fn insert_client(&self, client: &Client) -> Result<(), AppError>;
    async fn list_clients(&self, owner_id: Uuid) -> Result<Vec<Client>, AppError>;
    async fn find_client(&self, owner_id: Uuid, client_id: Uuid)
        -> Result<Option<Client>, AppError>;
    async fn update_client_contact(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        contact: &ClientContactUpdate,
    ) -> Result<Option<Client>, AppError>;
    /// Delete a client and cascade to its payments. Returns whether a client
    /// was actually deleted.
    async fn delete_client(&self, owner_id: Uuid, client_id: Uuid) -> Result<bool, AppError>;
    async fn update_client_snapshot(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        snapshot: &ClientSnapshot,
    ) -> Result<(), AppError>;
    /// Clients with `next_payment_date == due` and a known email address.
    async fn list_clients_due_on(&self, due: NaiveDate) -> Result<Vec<Client>, AppError>;

    async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError>;
    /// Payment history for one client, newest first.
    async fn list_payments(&self, owner_id: Uuid, client_id: Uuid)
        -> Result<Vec<Payment>, AppError>;

    async fn insert_email_log(&self, log: &EmailLog) -> Result<(), AppError>;
    /// Email audit trail for one client, newest first.
    async fn list_email_logs(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<EmailLog>, AppError>;
}

#[derive(Clone)]
pub struct MembershipRepository {
    client: mongodb::Client,
    owners: Collection<Owner>,
    clients: Collection<Client>,
    payments: Collection<Payment>,
    email_logs: Collection<EmailLog>,
}

impl MembershipRepository {
    pub fn new(client: mongodb::Client, db: &Database) -> Self {
        Self {
            client,
            owners: db.collection("owners"),
            clients: db.collection("clients"),
            payments: db.collection("payments"),
            email_logs: db.collection("email_logs"),
        }
    }

    /// Initialize indexes for tenant-scoped queries and the sweep's
    /// due-date lookup.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        let owner_email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("owner_email_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.owners.create_index(owner_email_index, None).await?;

        let tenant_client_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("tenant_client_idx".to_string())
                    .build(),
            )
            .build();
        let due_date_index = IndexModel::builder()
            .keys(doc! { "next_payment_date": 1 })
            .options(
                IndexOptions::builder()
                    .name("client_due_date_idx".to_string())
                    .build(),
            )
            .build();
        self.clients
            .create_indexes([tenant_client_index, due_date_index], None)
            .await?;

        let tenant_payment_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "client_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("tenant_payment_idx".to_string())
                    .build(),
            )
            .build();
        self.payments.create_index(tenant_payment_index, None).await?;

        let tenant_email_log_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "client_id": 1, "sent_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("tenant_email_log_idx".to_string())
                    .build(),
            )
            .build();
        self.email_logs
            .create_index(tenant_email_log_index, None)
            .await?;

        tracing::info!("Membership service indexes initialized");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

#[async_trait]
impl MembershipStore for MembershipRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn insert_owner(&self, owner: &Owner) -> Result<(), AppError> {
        self.owners.insert_one(owner, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict(anyhow::anyhow!(
                    "an account with that email already exists"
                ))
            } else {
                AppError::from(e)
            }
        })?;
        Ok(())
    }

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<Owner>, AppError> {
        let owner = self
            .owners
            .find_one(doc! { "_id": owner_id.to_string() }, None)
            .await?;
        Ok(owner)
    }

    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, AppError> {
        let owner = self.owners.find_one(doc! { "email": email }, None).await?;
        Ok(owner)
    }

    async fn update_owner_pin(
        &self,
        owner_id: Uuid,
        pin_hash: Option<String>,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut set = doc! { "pin_failed_attempts": failed_attempts };
        if let Some(hash) = pin_hash {
            set.insert("pin_hash", hash);
        }
        set.insert(
            "pin_locked_until",
            match locked_until {
                Some(at) => Bson::DateTime(mongodb::bson::DateTime::from_chrono(at)),
                None => Bson::Null,
            },
        );

        self.owners
            .update_one(doc! { "_id": owner_id.to_string() }, doc! { "$set": set }, None)
            .await?;
        Ok(())
    }

    async fn insert_client(&self, client: &Client) -> Result<(), AppError> {
        self.clients.insert_one(client, None).await?;
        Ok(())
    }

    async fn list_clients(&self, owner_id: Uuid) -> Result<Vec<Client>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .clients
            .find(doc! { "owner_id": owner_id.to_string() }, options)
            .await?;
        let clients = cursor.try_collect().await?;
        Ok(clients)
    }

    async fn find_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let client = self
            .clients
            .find_one(
                doc! { "_id": client_id.to_string(), "owner_id": owner_id.to_string() },
                None,
            )
            .await?;
        Ok(client)
    }

    async fn update_client_contact(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        contact: &ClientContactUpdate,
    ) -> Result<Option<Client>, AppError> {
        let update = doc! {
            "$set": {
                "email": contact.email.clone(),
                "phone": contact.phone.clone(),
                "address": contact.address.clone(),
                "address_number": contact.address_number.clone(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let client = self
            .clients
            .find_one_and_update(
                doc! { "_id": client_id.to_string(), "owner_id": owner_id.to_string() },
                update,
                options,
            )
            .await?;
        Ok(client)
    }

    async fn delete_client(&self, owner_id: Uuid, client_id: Uuid) -> Result<bool, AppError> {
        let scope = doc! { "client_id": client_id.to_string(), "owner_id": owner_id.to_string() };
        self.payments.delete_many(scope, None).await?;

        let deleted = self
            .clients
            .delete_one(
                doc! { "_id": client_id.to_string(), "owner_id": owner_id.to_string() },
                None,
            )
            .await?;
        Ok(deleted.deleted_count > 0)
    }

    async fn update_client_snapshot(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
        snapshot: &ClientSnapshot,
    ) -> Result<(), AppError> {
        let update = doc! {
            "$set": {
                "current_debt": snapshot.current_debt,
                "last_payment_amount": snapshot.last_payment_amount,
                "last_payment_date": snapshot.last_payment_date.to_string(),
                "next_payment_date": snapshot.next_payment_date.map(|d| d.to_string()),
            }
        };
        self.clients
            .update_one(
                doc! { "_id": client_id.to_string(), "owner_id": owner_id.to_string() },
                update,
                None,
            )
            .await?;
        Ok(())
    }

    async fn list_clients_due_on(&self, due: NaiveDate) -> Result<Vec<Client>, AppError> {
        let filter = doc! {
            "next_payment_date": due.to_string(),
            "email": { "$ne": null },
        };
        let cursor = self.clients.find(filter, None).await?;
        let clients = cursor.try_collect().await?;
        Ok(clients)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError> {
        self.payments.insert_one(payment, None).await?;
        Ok(())
    }

    async fn list_payments(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .payments
            .find(
                doc! { "client_id": client_id.to_string(), "owner_id": owner_id.to_string() },
                options,
            )
            .await?;
        let payments = cursor.try_collect().await?;
        Ok(payments)
    }

    async fn insert_email_log(&self, log: &EmailLog) -> Result<(), AppError> {
        self.email_logs.insert_one(log, None).await?;
        Ok(())
    }

    async fn list_email_logs(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<EmailLog>, AppError> {
        let options = FindOptions::builder().sort(doc! { "sent_at": -1 }).build();
        let cursor = self
            .email_logs
            .find(
                doc! { "client_id": client_id.to_string(), "owner_id": owner_id.to_string() },
                options,
            )
            .await?;
        let logs = cursor.try_collect().await?;
        Ok(logs)
    }
}
