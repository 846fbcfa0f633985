//! Owner registration, login and PIN gate.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde_json::json;
use validator::Validate;

use service_core::error::AppError;

use crate::dtos::{LoginRequest, OwnerResponse, PinRequest, RegisterOwnerRequest};
use crate::middleware::session::{
    clear_session_cookie, issue_session_token, session_cookie, OwnerSession,
};
use crate::models::owner::{Owner, MAX_PIN_ATTEMPTS, PIN_LOCK_MINUTES};
use crate::startup::AppState;
use crate::utils::password::{hash_secret, verify_secret};

/// Create a new owner account and start a session.
#[tracing::instrument(skip(state, jar, request))]
pub async fn register_owner(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterOwnerRequest>,
) -> Result<(StatusCode, CookieJar, Json<OwnerResponse>), AppError> {
    request.validate()?;

    let password_hash = hash_secret(&request.password)?;
    let owner = Owner::new(request.name, request.email, password_hash);

    state.store.insert_owner(&owner).await?;

    tracing::info!(owner_id = %owner.id, "Owner registered");

    let token = issue_session_token(&state.config, owner.id, &owner.email, Utc::now())?;
    let jar = jar.add(session_cookie(&state.config, token));

    Ok((StatusCode::CREATED, jar, Json(owner.into())))
}

#[tracing::instrument(skip(state, jar, request))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<OwnerResponse>), AppError> {
    request.validate()?;

    let owner = state
        .store
        .find_owner_by_email(&request.email)
        .await?
        .filter(|owner| verify_secret(&request.password, &owner.password_hash))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid credentials")))?;

    let token = issue_session_token(&state.config, owner.id, &owner.email, Utc::now())?;
    let jar = jar.add(session_cookie(&state.config, token));

    Ok((jar, Json(owner.into())))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    (jar.add(clear_session_cookie()), Json(json!({ "ok": true })))
}

pub async fn me(
    State(state): State<AppState>,
    session: OwnerSession,
) -> Result<Json<OwnerResponse>, AppError> {
    let owner = state
        .store
        .find_owner(session.owner_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unknown session owner")))?;

    Ok(Json(owner.into()))
}

/// Set (or replace) the owner's dashboard PIN.
pub async fn set_pin(
    State(state): State<AppState>,
    session: OwnerSession,
    Json(request): Json<PinRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let pin = request.checked_pin()?;
    let pin_hash = hash_secret(pin)?;

    state
        .store
        .update_owner_pin(session.owner_id, Some(pin_hash), 0, None)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// Verify the dashboard PIN. Five consecutive failures lock the PIN for ten
/// minutes.
#[tracing::instrument(skip(state, request))]
pub async fn unlock_pin(
    State(state): State<AppState>,
    session: OwnerSession,
    Json(request): Json<PinRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let pin = request.checked_pin()?;

    let owner = state
        .store
        .find_owner(session.owner_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unknown session owner")))?;

    let Some(pin_hash) = owner.pin_hash.as_deref() else {
        return Err(AppError::BadRequest(anyhow::anyhow!("PIN not configured")));
    };

    let now = Utc::now();
    if owner.is_pin_locked(now) {
        let retry_after = owner
            .pin_locked_until
            .map(|until| (until - now).num_seconds().max(0) as u64);
        return Err(AppError::TooManyRequests(
            "PIN locked. Try again later.".to_string(),
            retry_after,
        ));
    }

    if !verify_secret(pin, pin_hash) {
        let attempts = owner.pin_failed_attempts + 1;

        if attempts >= MAX_PIN_ATTEMPTS {
            let until = now + Duration::minutes(PIN_LOCK_MINUTES);
            state
                .store
                .update_owner_pin(session.owner_id, None, 0, Some(until))
                .await?;

            tracing::warn!(owner_id = %session.owner_id, "PIN locked after repeated failures");
            return Err(AppError::TooManyRequests(
                "PIN locked. Try again later.".to_string(),
                Some((PIN_LOCK_MINUTES * 60) as u64),
            ));
        }

        state
            .store
            .update_owner_pin(session.owner_id, None, attempts, None)
            .await?;
        return Err(AppError::Unauthorized(anyhow::anyhow!("Incorrect PIN")));
    }

    state
        .store
        .update_owner_pin(session.owner_id, None, 0, None)
        .await?;

    Ok(Json(json!({ "ok": true })))
}
