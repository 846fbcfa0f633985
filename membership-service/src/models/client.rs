//! Client (gym member) model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Computed activity classification for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientStatus::Active => write!(f, "active"),
            ClientStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// A client always belongs to exactly one owner.
///
/// The `current_debt` / `last_payment_*` / `next_payment_date` columns are a
/// denormalized snapshot of the payment ledger, refreshed best-effort after
/// each payment. Read paths that need correct numbers recompute from the
/// ledger instead of trusting these; the sweep queries `next_payment_date`
/// because it needs an indexed due-date column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
    #[serde(default)]
    pub current_debt: f64,
    pub last_payment_amount: Option<f64>,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(
        owner_id: Uuid,
        name: String,
        email: Option<String>,
        phone: Option<String>,
        address: Option<String>,
        address_number: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            email,
            phone,
            address,
            address_number,
            current_debt: 0.0,
            last_payment_amount: None,
            last_payment_date: None,
            next_payment_date: None,
            created_at: Utc::now(),
        }
    }
}
