//! Payment ledger model.
//!
//! Payments are append-only: once inserted they are never updated or deleted,
//! and `created_at` is the authoritative ordering key for everything derived
//! from the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership plan recorded on a payment.
///
/// `DebtPayment` is the sentinel plan used when a payment settles previously
/// recorded debt instead of buying a new period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    Basic,
    Fitness,
    ProFitness,
    DebtPayment,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "BASIC",
            Plan::Fitness => "FITNESS",
            Plan::ProFitness => "PRO_FITNESS",
            Plan::DebtPayment => "DEBT_PAYMENT",
        }
    }

    pub fn is_debt_payment(&self) -> bool {
        matches!(self, Plan::DebtPayment)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub client_id: Uuid,
    pub owner_id: Uuid,
    /// Amount paid at registration time.
    pub amount: f64,
    pub plan: Plan,
    pub discount: f64,
    /// Debt remaining *after* this payment, as declared by the operator.
    pub debt: f64,
    /// Inclusive date range this payment covers. Either bound may be absent.
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
