//! Ledger handlers: add, spend, transfer, reverse, and history.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::Authenticated;
use crate::api::dto::{
    HistoryParams, LedgerResponse, MoneyRequest, TransactionDto, TransactionListResponse,
    TransferRequest, TransferResponse, parse_currency,
};
use crate::app_state::AppState;
use crate::domain::TransactionId;
use crate::error::{EconomyError, ErrorResponse};

/// `POST /transactions/add`: Credit the caller's wallet.
///
/// # Errors
///
/// Returns [`EconomyError`] on validation failure, a missing wallet, or a
/// locked wallet.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/add",
    tag = "Transactions",
    summary = "Add money",
    description = "Records a completed `earn` entry and credits the balance atomically.",
    security(("api_key" = []), ("bearer" = [])),
    request_body = MoneyRequest,
    responses(
        (status = 200, description = "Money added", body = LedgerResponse),
        (status = 400, description = "Invalid currency or amount", body = ErrorResponse),
        (status = 403, description = "Wallet locked", body = ErrorResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn add_money(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<MoneyRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let (currency, amount, details) = req.into_parts()?;
    let outcome = state
        .economy_service
        .add_money(caller.user.id, currency, amount, details)
        .await?;
    Ok(Json(LedgerResponse::new("money added", outcome)))
}

/// `POST /transactions/spend`: Debit the caller's wallet.
///
/// # Errors
///
/// Returns [`EconomyError`] on validation failure, insufficient balance,
/// a missing wallet, or a locked wallet.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/spend",
    tag = "Transactions",
    summary = "Spend money",
    description = "Records a completed `spend` entry and debits the balance atomically. The balance never goes negative.",
    security(("api_key" = []), ("bearer" = [])),
    request_body = MoneyRequest,
    responses(
        (status = 200, description = "Money spent", body = LedgerResponse),
        (status = 400, description = "Invalid input or insufficient balance", body = ErrorResponse),
        (status = 403, description = "Wallet locked", body = ErrorResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn spend_money(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<MoneyRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let (currency, amount, details) = req.into_parts()?;
    let outcome = state
        .economy_service
        .spend_money(caller.user.id, currency, amount, details)
        .await?;
    Ok(Json(LedgerResponse::new("money spent", outcome)))
}

/// `POST /transactions/transfer`: Move money to another user.
///
/// # Errors
///
/// Returns [`EconomyError`] on self-transfer, validation failure,
/// insufficient balance, a missing wallet on either side, or a locked
/// wallet on either side.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/transfer",
    tag = "Transactions",
    summary = "Transfer money",
    description = "Debits the caller and credits the recipient in one atomic unit. Both legs share a `transfer:<uuid>` reference.",
    security(("api_key" = []), ("bearer" = [])),
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer completed", body = TransferResponse),
        (status = 400, description = "Invalid input, self-transfer, or insufficient balance", body = ErrorResponse),
        (status = 403, description = "Source or destination wallet locked", body = ErrorResponse),
        (status = 404, description = "Source or destination wallet not found", body = ErrorResponse),
    )
)]
pub async fn transfer_money(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let currency = parse_currency(&req.currency)?;
    let outcome = state
        .economy_service
        .transfer_money(
            caller.user.id,
            req.to_user_id,
            currency,
            req.amount,
            req.description,
        )
        .await?;
    Ok(Json(TransferResponse::from(outcome)))
}

/// `GET /transactions/history`: Filtered ledger page, newest first.
///
/// # Errors
///
/// Returns [`EconomyError`] for an unknown filter value or a missing
/// wallet.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/history",
    tag = "Transactions",
    summary = "Transaction history",
    description = "Filters by `type`, `currency`, and `status`. Out-of-range paging values fall back to the defaults.",
    security(("api_key" = []), ("bearer" = [])),
    params(HistoryParams),
    responses(
        (status = 200, description = "Ledger page", body = TransactionListResponse),
        (status = 400, description = "Unknown filter value", body = ErrorResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, EconomyError> {
    let filter = params.to_filter()?;
    let (entries, total) = state
        .economy_service
        .history(caller.user.id, &filter)
        .await?;
    Ok(Json(TransactionListResponse::new(
        entries,
        total,
        filter.limit,
        filter.offset,
    )))
}

/// `GET /transactions/{id}`: One entry from the caller's wallet.
///
/// # Errors
///
/// Returns [`EconomyError::TransactionNotFound`] for unknown entries and
/// entries of other wallets.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    tag = "Transactions",
    summary = "Get transaction",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Ledger entry", body = TransactionDto),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<TransactionId>,
) -> Result<impl IntoResponse, EconomyError> {
    let entry = state
        .economy_service
        .get_transaction(caller.user.id, id)
        .await?;
    Ok(Json(TransactionDto::from(entry)))
}

/// `POST /transactions/{id}/reverse`: Undo a completed entry.
///
/// # Errors
///
/// Returns [`EconomyError::NotReversible`] for transfer legs, pending or
/// already-reversed entries, and [`EconomyError::InsufficientBalance`]
/// when a reversed credit has already been spent.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/reverse",
    tag = "Transactions",
    summary = "Reverse transaction",
    description = "Applies the inverse amount as a new `refund` or `penalty` entry and marks the original `reversed`.",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction reversed", body = LedgerResponse),
        (status = 400, description = "Insufficient balance", body = ErrorResponse),
        (status = 403, description = "Wallet locked", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 409, description = "Transaction not reversible", body = ErrorResponse),
    )
)]
pub async fn reverse_transaction(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<TransactionId>,
) -> Result<impl IntoResponse, EconomyError> {
    let outcome = state
        .economy_service
        .reverse_transaction(caller.user.id, id)
        .await?;
    Ok(Json(LedgerResponse::new("transaction reversed", outcome)))
}

/// Transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions/add", post(add_money))
        .route("/transactions/spend", post(spend_money))
        .route("/transactions/transfer", post(transfer_money))
        .route("/transactions/history", get(history))
        .route("/transactions/{id}", get(get_transaction))
        .route("/transactions/{id}/reverse", post(reverse_transaction))
}
