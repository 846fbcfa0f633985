//! Owner (tenant) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::opt_chrono_datetime_as_bson_datetime;

/// Consecutive failed PIN attempts allowed before the PIN locks.
pub const MAX_PIN_ATTEMPTS: i32 = 5;
/// How long a locked PIN stays locked.
pub const PIN_LOCK_MINUTES: i64 = 10;

/// A business owner. Owns a set of clients; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub pin_hash: Option<String>,
    #[serde(default)]
    pub pin_failed_attempts: i32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub pin_locked_until: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            pin_hash: None,
            pin_failed_attempts: 0,
            pin_locked_until: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the PIN lockout window is still open at `now`.
    pub fn is_pin_locked(&self, now: DateTime<Utc>) -> bool {
        self.pin_locked_until.is_some_and(|until| until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn owner() -> Owner {
        Owner::new(
            "Iron Temple".to_string(),
            "owner@example.com".to_string(),
            "$argon2id$fake".to_string(),
        )
    }

    #[test]
    fn unlocked_by_default() {
        assert!(!owner().is_pin_locked(Utc::now()));
    }

    #[test]
    fn locked_until_future_instant() {
        let now = Utc::now();
        let mut o = owner();
        o.pin_locked_until = Some(now + Duration::minutes(PIN_LOCK_MINUTES));

        assert!(o.is_pin_locked(now));
        assert!(!o.is_pin_locked(now + Duration::minutes(PIN_LOCK_MINUTES + 1)));
    }
}
