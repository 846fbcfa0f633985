//! Payment history, registration and form prefill.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use validator::Validate;

use service_core::error::AppError;

use crate::dtos::{ClientScopedQuery, PaymentResponse, RegisterPaymentRequest};
use crate::middleware::OwnerSession;
use crate::services::billing::{latest_payment, payment_prefill, PaymentPrefill};
use crate::services::payments::register_payment as run_registration;
use crate::startup::AppState;

/// Payment history for one client, newest first.
pub async fn list_payments(
    State(state): State<AppState>,
    session: OwnerSession,
    Query(query): Query<ClientScopedQuery>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let client_id = query.required_client_id()?;

    let payments = state
        .store
        .list_payments(session.owner_id, client_id)
        .await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

/// Register a new payment for one of the owner's clients.
#[tracing::instrument(skip(state, request))]
pub async fn register_payment(
    State(state): State<AppState>,
    session: OwnerSession,
    Json(request): Json<RegisterPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    request.validate()?;
    let submission = request.into_submission()?;

    let payment = run_registration(
        state.store.as_ref(),
        state.email.as_ref(),
        session.owner_id,
        submission,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// Day markers and pre-filled form state for registering a new payment.
pub async fn prefill(
    State(state): State<AppState>,
    session: OwnerSession,
    Query(query): Query<ClientScopedQuery>,
) -> Result<Json<PaymentPrefill>, AppError> {
    let client_id = query.required_client_id()?;

    state
        .store
        .find_client(session.owner_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let payments = state
        .store
        .list_payments(session.owner_id, client_id)
        .await?;
    let current_debt = latest_payment(&payments).map_or(0.0, |p| p.debt);

    Ok(Json(payment_prefill(&payments, current_debt)))
}
