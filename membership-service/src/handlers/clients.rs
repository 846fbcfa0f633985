//! Client management and the computed list view.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use service_core::error::AppError;

use crate::dtos::{
    ClientResponse, CreateClientRequest, EmailHistoryResponse, ListClientsQuery,
    UpdateClientRequest,
};
use crate::middleware::OwnerSession;
use crate::models::Client;
use crate::services::billing::{compute_client_row, ClientRow};
use crate::services::store::ClientContactUpdate;
use crate::startup::AppState;

/// List the owner's clients with their computed billing rows.
///
/// Rows are recomputed from the payment ledger on every call; the stored
/// snapshot fields play no part here.
#[tracing::instrument(skip(state))]
pub async fn list_clients(
    State(state): State<AppState>,
    session: OwnerSession,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Vec<ClientRow>>, AppError> {
    let now = Local::now();
    let inactive_after_days = state.config.billing.inactive_after_days;

    let clients = state.store.list_clients(session.owner_id).await?;

    let mut rows = Vec::with_capacity(clients.len());
    for client in clients {
        let payments = state
            .store
            .list_payments(session.owner_id, client.id)
            .await?;
        rows.push(compute_client_row(
            &client,
            &payments,
            &now,
            inactive_after_days,
        ));
    }

    if let Some(status) = query.status {
        rows.retain(|row| row.computed_status == status);
    }

    Ok(Json(rows))
}

pub async fn create_client(
    State(state): State<AppState>,
    session: OwnerSession,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    request.validate()?;

    let client = Client::new(
        session.owner_id,
        request.name,
        request.email,
        request.phone,
        request.address,
        request.address_number,
    );

    state.store.insert_client(&client).await?;

    tracing::info!(client_id = %client.id, owner_id = %session.owner_id, "Client created");

    Ok((StatusCode::CREATED, Json(client.into())))
}

/// Edit a client's contact fields. The name is immutable.
pub async fn update_client(
    State(state): State<AppState>,
    session: OwnerSession,
    Path(client_id): Path<Uuid>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<ClientResponse>, AppError> {
    request.validate()?;

    let contact = ClientContactUpdate {
        email: request.email,
        phone: request.phone,
        address: request.address,
        address_number: request.address_number,
    };

    let client = state
        .store
        .update_client_contact(session.owner_id, client_id, &contact)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client.into()))
}

/// Delete a client and its payment history.
pub async fn delete_client(
    State(state): State<AppState>,
    session: OwnerSession,
    Path(client_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state
        .store
        .delete_client(session.owner_id, client_id)
        .await?;

    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
    }

    tracing::info!(client_id = %client_id, owner_id = %session.owner_id, "Client deleted");

    Ok(Json(json!({ "ok": true })))
}

/// The email audit trail for one client, newest first.
pub async fn client_email_history(
    State(state): State<AppState>,
    session: OwnerSession,
    Path(client_id): Path<Uuid>,
) -> Result<Json<EmailHistoryResponse>, AppError> {
    state
        .store
        .find_client(session.owner_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let logs = state
        .store
        .list_email_logs(session.owner_id, client_id)
        .await?;

    Ok(Json(EmailHistoryResponse {
        emails: logs.into_iter().map(Into::into).collect(),
    }))
}
