//! Billing-status and payment-ledger computation.
//!
//! Everything in this module is a pure function over a client's payment
//! history. The denormalized snapshot columns on [`Client`] are never read
//! here: the ledger is the single source of truth, so recomputing twice from
//! the same payments always yields the same row.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Client, ClientStatus, Payment, Plan};

/// Days past the later of last-payment date and due date after which a
/// client is classified inactive. Overridable via configuration.
pub const INACTIVE_AFTER_DAYS: u32 = 45;

/// Per-request read model for a client, derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRow {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
    pub current_plan: Option<Plan>,
    pub current_debt: f64,
    pub total_paid_this_month: f64,
    pub next_due: Option<NaiveDate>,
    pub is_month_fully_paid: bool,
    pub computed_status: ClientStatus,
}

/// Calendar-day classification used by the period picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayMark {
    Paid,
    Debt,
}

/// Pre-filled form state for registering a new payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPrefill {
    pub markers: BTreeMap<NaiveDate, DayMark>,
    pub plan: Option<Plan>,
    pub amount: Option<f64>,
    pub discount: Option<f64>,
    pub debt: Option<f64>,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub period_locked: bool,
}

/// The payment with the greatest `(created_at, id)`.
///
/// `created_at` (insertion time) is the authoritative ordering key; the uuid
/// breaks ties deterministically, with the lexicographically greatest id
/// winning.
pub fn latest_payment(payments: &[Payment]) -> Option<&Payment> {
    payments
        .iter()
        .max_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
}

/// Derive the full read model for one client.
///
/// `now` carries the timezone that month boundaries and day comparisons are
/// evaluated in; handlers pass the local clock.
pub fn compute_client_row<Tz: TimeZone>(
    client: &Client,
    payments: &[Payment],
    now: &DateTime<Tz>,
    inactive_after_days: u32,
) -> ClientRow {
    let tz = now.timezone();
    let today = now.date_naive();
    let (month_start, month_next) = month_bounds(today);

    let last = latest_payment(payments);
    let current_debt = last.map_or(0.0, |p| p.debt);
    let current_plan = last.map(|p| p.plan);
    let next_due = last.and_then(|p| p.period_to);

    // Month window is start-inclusive, end-exclusive at day granularity.
    let total_paid_this_month = payments
        .iter()
        .filter(|p| {
            let paid_on = p.created_at.with_timezone(&tz).date_naive();
            paid_on >= month_start && paid_on < month_next
        })
        .map(|p| p.amount)
        .sum();

    let computed_status = match last {
        None => ClientStatus::Inactive,
        Some(p) => {
            let paid_on = p.created_at.with_timezone(&tz).date_naive();
            let anchor = p.period_to.map_or(paid_on, |due| due.max(paid_on));
            if today > anchor + Duration::days(i64::from(inactive_after_days)) {
                ClientStatus::Inactive
            } else {
                ClientStatus::Active
            }
        }
    };

    ClientRow {
        id: client.id,
        name: client.name.clone(),
        email: client.email.clone(),
        phone: client.phone.clone(),
        address: client.address.clone(),
        address_number: client.address_number.clone(),
        current_plan,
        current_debt,
        total_paid_this_month,
        next_due,
        is_month_fully_paid: current_debt <= 0.0,
        computed_status,
    }
}

/// Map every day covered by a payment period to `paid` or `debt`.
///
/// Payments are applied in `(created_at, id)` ascending order so the most
/// recently recorded payment wins overlapping days. Rows missing either
/// period bound contribute nothing. A settled client (`current_debt == 0`)
/// forces every marked day to `paid`, correcting markers left behind by
/// payments that carried debt at the time.
pub fn day_markers(payments: &[Payment], current_debt: f64) -> BTreeMap<NaiveDate, DayMark> {
    let mut ordered: Vec<&Payment> = payments.iter().collect();
    ordered.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let mut markers = BTreeMap::new();
    for payment in ordered {
        let (Some(from), Some(to)) = (payment.period_from, payment.period_to) else {
            continue;
        };
        let mark = if payment.debt > 0.0 {
            DayMark::Debt
        } else {
            DayMark::Paid
        };
        let mut day = from;
        while day <= to {
            markers.insert(day, mark);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    if current_debt == 0.0 {
        for mark in markers.values_mut() {
            *mark = DayMark::Paid;
        }
    }

    markers
}

/// Build the pre-filled form state for a new payment.
///
/// A client with outstanding debt gets the debt-repayment plan pre-selected
/// with `amount` seeded to the full debt, and the period locked to the most
/// recently recorded debt-carrying payment's range when one exists.
pub fn payment_prefill(payments: &[Payment], current_debt: f64) -> PaymentPrefill {
    let markers = day_markers(payments, current_debt);

    if current_debt > 0.0 {
        let open_period = payments
            .iter()
            .filter(|p| p.debt > 0.0 && p.period_from.is_some() && p.period_to.is_some())
            .max_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        let (period_from, period_to) = match open_period {
            Some(p) => (p.period_from, p.period_to),
            None => (None, None),
        };

        return PaymentPrefill {
            markers,
            plan: Some(Plan::DebtPayment),
            amount: Some(current_debt),
            discount: Some(0.0),
            debt: Some(0.0),
            period_from,
            period_to,
            period_locked: open_period.is_some(),
        };
    }

    PaymentPrefill {
        markers,
        plan: None,
        amount: None,
        discount: None,
        debt: None,
        period_from: None,
        period_to: None,
        period_locked: false,
    }
}

/// Amount auto-computed for a debt-repayment entry: the full outstanding
/// debt minus any discount, clamped at zero.
pub fn debt_payment_amount(base_debt: f64, discount: f64) -> f64 {
    (base_debt - discount).max(0.0)
}

/// Debt remaining after a debt-repayment entry, clamped at zero. Together
/// with [`debt_payment_amount`] this keeps `amount + debt + discount`
/// equal to the debt the form was opened with.
pub fn remaining_after_debt_payment(base_debt: f64, amount: f64, discount: f64) -> f64 {
    (base_debt - amount - discount).max(0.0)
}

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let next = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    }
    .unwrap_or(start);
    (start, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn payment(id: u128, created_at: DateTime<Utc>, debt: f64) -> Payment {
        Payment {
            id: Uuid::from_u128(id),
            client_id: Uuid::from_u128(1),
            owner_id: Uuid::from_u128(2),
            amount: 100.0,
            plan: Plan::Basic,
            discount: 0.0,
            debt,
            period_from: None,
            period_to: None,
            next_payment_date: None,
            created_at,
        }
    }

    #[test]
    fn latest_payment_breaks_created_at_ties_by_id() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let payments = vec![payment(9, at, 500.0), payment(4, at, 200.0)];

        let last = latest_payment(&payments).expect("payments present");
        assert_eq!(last.id, Uuid::from_u128(9));
        assert_eq!(last.debt, 500.0);
    }

    #[test]
    fn markers_apply_in_recording_order() {
        let mut first = payment(1, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 300.0);
        first.period_from = Some(date(2024, 1, 1));
        first.period_to = Some(date(2024, 1, 10));

        let mut second = payment(2, Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(), 0.0);
        second.period_from = Some(date(2024, 1, 8));
        second.period_to = Some(date(2024, 1, 12));

        // Listed out of order on purpose: recording order must win, not
        // list order.
        let markers = day_markers(&[second.clone(), first.clone()], 300.0);

        assert_eq!(markers.get(&date(2024, 1, 7)), Some(&DayMark::Debt));
        assert_eq!(markers.get(&date(2024, 1, 8)), Some(&DayMark::Paid));
        assert_eq!(markers.get(&date(2024, 1, 12)), Some(&DayMark::Paid));
        assert_eq!(markers.get(&date(2024, 1, 13)), None);
    }

    #[test]
    fn markers_skip_payments_without_a_full_period() {
        let mut p = payment(1, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 0.0);
        p.period_from = Some(date(2024, 1, 1));
        p.period_to = None;

        assert!(day_markers(&[p], 0.0).is_empty());
    }
}
