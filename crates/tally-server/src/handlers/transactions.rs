//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use tally_core::models::{Transaction, TransactionInput, TransactionUpdate};
use tally_core::Clock;

use crate::{current_user_id, AppError, AppState, MAX_BODY_SIZE};

#[derive(Serialize)]
pub struct DeleteResponse {
    pub id: i64,
}

async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// GET /api/transactions - List the caller's transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let user = current_user_id(request.headers());
    let transactions = state.db.list_transactions(&user)?;
    Ok(Json(transactions))
}

/// POST /api/transactions - Record a transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let user = current_user_id(request.headers());
    let input: TransactionInput = read_json(request).await?;

    let new = input.into_new(state.clock.today())?;
    let tx = state.db.create_transaction(&user, &new)?;

    info!(
        user = %user,
        id = tx.id,
        recurrence = %tx.schedule.recurrence(),
        "Transaction created"
    );

    Ok((StatusCode::CREATED, Json(tx)))
}

/// PATCH /api/transactions/:id - Edit a transaction
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let user = current_user_id(request.headers());
    let update: TransactionUpdate = read_json(request).await?;

    let tx = state.db.update_transaction(&user, id, update)?;
    info!(user = %user, id, "Transaction updated");

    Ok(Json(tx))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<DeleteResponse>, AppError> {
    let user = current_user_id(request.headers());

    state.db.delete_transaction(&user, id)?;
    info!(user = %user, id, "Transaction deleted");

    Ok(Json(DeleteResponse { id }))
}
