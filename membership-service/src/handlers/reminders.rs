//! Externally triggered reminder sweep.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Local;
use secrecy::ExposeSecret;

use service_core::error::AppError;

use crate::services::reminder::{run_upcoming_sweep, SweepOutcome};
use crate::startup::AppState;

pub const SWEEP_SECRET_HEADER: &str = "x-sweep-secret";

/// Send reminders to every client due in five days.
///
/// Meant to be hit by a cron job; when a sweep secret is configured the
/// caller must present it.
#[tracing::instrument(skip(state, headers))]
pub async fn send_upcoming_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepOutcome>, AppError> {
    if let Some(secret) = &state.config.sweep.secret {
        let provided = headers
            .get(SWEEP_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(secret.expose_secret().as_str()) {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid sweep secret"
            )));
        }
    }

    let outcome = run_upcoming_sweep(
        state.store.as_ref(),
        state.email.as_ref(),
        Local::now().date_naive(),
    )
    .await?;

    tracing::info!(
        attempted = outcome.attempted,
        sent = outcome.sent,
        "Reminder sweep finished"
    );

    Ok(Json(outcome))
}
