//! Wallet handlers: create, read, balances, lock control, history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::Authenticated;
use crate::api::dto::{
    BalanceResponse, BalancesResponse, LockWalletRequest, PageParams, TransactionListResponse,
    WalletDto, WalletStatusResponse, parse_currency,
};
use crate::app_state::AppState;
use crate::error::{EconomyError, ErrorResponse};

/// `POST /wallet`: Create the wallet for the caller's game profile.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`] without a profile, or
/// [`EconomyError::AlreadyExists`] if the wallet exists.
#[utoipa::path(
    post,
    path = "/api/v1/wallet",
    tag = "Wallet",
    summary = "Create wallet",
    description = "Creates an unlocked wallet with zero balances in every currency.",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 201, description = "Wallet created", body = WalletDto),
        (status = 404, description = "Game profile not found", body = ErrorResponse),
        (status = 409, description = "Wallet already exists", body = ErrorResponse),
    )
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let wallet = state.wallet_service.create(caller.user.id).await?;
    Ok((StatusCode::CREATED, Json(WalletDto::from(wallet))))
}

/// `GET /wallet`: The caller's wallet.
///
/// # Errors
///
/// Returns a not-found error for a missing profile or wallet.
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "Wallet",
    summary = "Get wallet",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Wallet", body = WalletDto),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let wallet = state.wallet_service.get(caller.user.id).await?;
    Ok(Json(WalletDto::from(wallet)))
}

/// `GET /wallet/balance/{currency}`: Balance of one currency.
///
/// # Errors
///
/// Returns [`EconomyError::InvalidCurrency`] or a not-found error.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance/{currency}",
    tag = "Wallet",
    summary = "Get balance",
    security(("api_key" = []), ("bearer" = [])),
    params(("currency" = String, Path, description = "coins, gems, or tokens")),
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 400, description = "Unknown currency", body = ErrorResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(currency): Path<String>,
) -> Result<impl IntoResponse, EconomyError> {
    let currency = parse_currency(&currency)?;
    let balance = state
        .wallet_service
        .balance(caller.user.id, currency)
        .await?;
    Ok(Json(BalanceResponse { currency, balance }))
}

/// `GET /wallet/balances`: Every balance plus total value.
///
/// # Errors
///
/// Returns a not-found error for a missing profile or wallet.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balances",
    tag = "Wallet",
    summary = "Get all balances",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Balances", body = BalancesResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn get_balances(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let wallet = state.wallet_service.get(caller.user.id).await?;
    Ok(Json(BalancesResponse::from(&wallet)))
}

/// `POST /wallet/lock`: Block every balance-affecting operation.
///
/// # Errors
///
/// Returns [`EconomyError::InvalidRequest`] for a blank reason or a
/// not-found error.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/lock",
    tag = "Wallet",
    summary = "Lock wallet",
    security(("api_key" = []), ("bearer" = [])),
    request_body = LockWalletRequest,
    responses(
        (status = 200, description = "Wallet locked", body = WalletStatusResponse),
        (status = 400, description = "Blank reason", body = ErrorResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn lock_wallet(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<LockWalletRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let wallet = state
        .wallet_service
        .lock(caller.user.id, &req.reason)
        .await?;
    Ok(Json(WalletStatusResponse::from(wallet)))
}

/// `POST /wallet/unlock`: Clear the lock.
///
/// # Errors
///
/// Returns a not-found error for a missing profile or wallet.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/unlock",
    tag = "Wallet",
    summary = "Unlock wallet",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Wallet unlocked", body = WalletStatusResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn unlock_wallet(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let wallet = state.wallet_service.unlock(caller.user.id).await?;
    Ok(Json(WalletStatusResponse::from(wallet)))
}

/// `GET /wallet/status`: Lock state and total value.
///
/// # Errors
///
/// Returns a not-found error for a missing profile or wallet.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/status",
    tag = "Wallet",
    summary = "Get wallet status",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Wallet status", body = WalletStatusResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn wallet_status(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let wallet = state.wallet_service.get(caller.user.id).await?;
    Ok(Json(WalletStatusResponse::from(wallet)))
}

/// `GET /wallet/history`: Unfiltered ledger page, newest first.
///
/// # Errors
///
/// Returns a not-found error for a missing profile or wallet.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/history",
    tag = "Wallet",
    summary = "Wallet history",
    security(("api_key" = []), ("bearer" = [])),
    params(PageParams),
    responses(
        (status = 200, description = "Ledger page", body = TransactionListResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
    )
)]
pub async fn wallet_history(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(page): Query<PageParams>,
) -> Result<impl IntoResponse, EconomyError> {
    let (limit, offset) = (page.limit(), page.offset());
    let (entries, total) = state
        .wallet_service
        .history(caller.user.id, limit, offset)
        .await?;
    Ok(Json(TransactionListResponse::new(entries, total, limit, offset)))
}

/// Wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallet", post(create_wallet).get(get_wallet))
        .route("/wallet/balance/{currency}", get(get_balance))
        .route("/wallet/balances", get(get_balances))
        .route("/wallet/lock", post(lock_wallet))
        .route("/wallet/unlock", post(unlock_wallet))
        .route("/wallet/status", get(wallet_status))
        .route("/wallet/history", get(wallet_history))
}
