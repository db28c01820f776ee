//! Transaction HTTP surface, including the ingest pipeline:
//! validate, persist, audit, enqueue.

use axum::{
    Json,
    extract::{Path, Query, State},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::models::{
    ACTION_TRANSACTION_CREATED, AuditRecord, QueueMessage, Transaction, TransactionStatus,
};
use crate::validation;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub from_account: String,
    pub to_account: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub transaction: Transaction,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TransactionEnvelope {
    pub transaction: Transaction,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub transactions: Vec<Transaction>,
    pub limit: i64,
    pub offset: i64,
}

/// POST /transactions. Persist is the only step allowed to fail the request:
/// the audit write and queue publish that follow it are best-effort, logged
/// on failure and never surfaced.
pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload
        .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?;

    validation::validate_required("from_account", &req.from_account)?;
    validation::validate_required("to_account", &req.to_account)?;
    let amount = validation::parse_positive_amount(&req.amount)?;

    let tx = Transaction::new(
        state.region.clone(),
        amount,
        req.from_account,
        req.to_account,
    );

    let created = state.store.create(&tx).await.map_err(|e| {
        error!(
            transaction_id = %tx.id,
            region = %state.region,
            path = "/transactions",
            error = %e,
            "failed to persist transaction"
        );
        e
    })?;

    let audit = AuditRecord::new(
        created.id,
        state.region.clone(),
        ACTION_TRANSACTION_CREATED,
        "Transaction created via API",
    );
    let audit_json = serde_json::to_string(&audit).unwrap_or_default();

    // The row is already durable; the audit record is reconstructible from
    // the store, so its failure does not fail the request.
    if let Err(e) = state.audit.write(&audit.key(), audit_json.clone().into_bytes()).await {
        warn!(
            transaction_id = %created.id,
            region = %state.region,
            error = %e,
            "failed to write audit record"
        );
    }

    let message = QueueMessage {
        transaction_id: created.id,
        region: state.region.clone(),
        action: ACTION_TRANSACTION_CREATED.to_string(),
        timestamp: Utc::now(),
        data: audit_json,
    };
    if let Err(e) = state.queue.publish(&message).await {
        warn!(
            transaction_id = %created.id,
            region = %state.region,
            error = %e,
            "failed to publish queue message"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            transaction: created,
            message: "Transaction created successfully",
        }),
    ))
}

/// GET /transactions/{id}.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("invalid transaction id".to_string()))?;

    let transaction = state.store.get_by_id(id).await?;

    Ok(Json(TransactionEnvelope { transaction }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    limit: Option<String>,
    offset: Option<String>,
}

impl ListParams {
    // Pagination never rejects: out-of-range or unparseable values silently
    // revert to the defaults.
    fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|v| (1..=MAX_LIMIT).contains(v))
            .unwrap_or(DEFAULT_LIMIT)
    }

    fn offset(&self) -> i64 {
        self.offset
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(0)
    }
}

/// GET /transactions.
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit();
    let offset = params.offset();

    let transactions = state.store.list(limit, offset).await.map_err(|e| {
        error!(
            region = %state.region,
            path = "/transactions",
            error = %e,
            "failed to list transactions"
        );
        e
    })?;

    Ok(Json(ListResponse {
        transactions,
        limit,
        offset,
    }))
}

/// GET /stats.
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = state.store.stats().await.map_err(|e| {
        error!(
            region = %state.region,
            path = "/stats",
            error = %e,
            "failed to aggregate transaction stats"
        );
        e
    })?;

    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// PATCH /transactions/{id}/status. Transitions are forward-only; terminal
/// states never move again.
pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("invalid transaction id".to_string()))?;
    let Json(req) = payload
        .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?;

    let next: TransactionStatus = req
        .status
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid status: {}", req.status)))?;

    let current = state.store.get_by_id(id).await?;
    if !current.status.can_transition_to(next) {
        return Err(AppError::Validation(format!(
            "invalid status transition: {} -> {}",
            current.status, next
        )));
    }

    state.store.update_status(id, next).await.map_err(|e| {
        error!(
            transaction_id = %id,
            region = %state.region,
            path = "/transactions/{id}/status",
            error = %e,
            "failed to update transaction status"
        );
        e
    })?;

    let transaction = state.store.get_by_id(id).await?;

    Ok(Json(TransactionEnvelope { transaction }))
}
