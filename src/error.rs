//! Service error types with HTTP status code mapping.
//!
//! [`EconomyError`] is the central error type for the service. Each variant
//! maps to a stable [`ErrorKind`], a numeric code, and an HTTP status, and
//! renders as a structured JSON error response.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ApiKeyId, CurrencyType, SessionId, TransactionId, TransactionStatus, UserId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4003,
///     "kind": "forbidden",
///     "message": "wallet is locked: chargeback under review"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code, kind, and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`EconomyError`]).
    pub code: u32,
    /// Stable error category.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Stable error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or semantically invalid input.
    InvalidArgument,
    /// The referenced entity does not exist (or is soft-deleted).
    NotFound,
    /// The operation clashes with existing state.
    Conflict,
    /// The caller may not perform the operation (e.g. locked wallet).
    Forbidden,
    /// Missing or invalid credentials.
    Unauthorized,
    /// The caller exceeded its request budget.
    RateLimited,
    /// Server-side failure.
    Internal,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category                 | HTTP Status                  |
/// |-----------|--------------------------|------------------------------|
/// | 1000–1999 | Validation               | 400 Bad Request              |
/// | 2000–2999 | Not Found / Conflict     | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server                   | 500 Internal Server Error    |
/// | 4000–4999 | Authorization / Throttle | 401 / 403 / 429              |
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Currency string outside the closed currency set.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// Amount was zero or negative where a positive amount is required.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// Source and destination of a transfer are the same user.
    #[error("cannot transfer to yourself")]
    SelfTransfer,

    /// Wallet balance does not cover the requested debit.
    #[error("insufficient {currency} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Currency of the attempted debit.
        currency: CurrencyType,
        /// Balance at the time of the check.
        available: i64,
        /// Requested debit.
        requested: i64,
    },

    /// User with the given ID was not found.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The user has no game profile.
    #[error("game profile not found")]
    ProfileNotFound,

    /// The user's game profile has no wallet.
    #[error("wallet not found")]
    WalletNotFound,

    /// The transfer recipient has no profile or wallet.
    #[error("destination wallet not found")]
    RecipientWalletNotFound,

    /// Ledger entry not found in the caller's wallet.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// API key not found for the caller.
    #[error("api key not found: {0}")]
    ApiKeyNotFound(ApiKeyId),

    /// Play session not found for the caller's profile.
    #[error("game session not found: {0}")]
    SessionNotFound(SessionId),

    /// Refresh token unknown.
    #[error("refresh token not found")]
    RefreshTokenNotFound,

    /// A uniquely-keyed record already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A ledger entry status change outside the allowed state machine.
    #[error("invalid transaction status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: TransactionStatus,
        /// Requested status.
        to: TransactionStatus,
    },

    /// The ledger entry is not eligible for reversal.
    #[error("transaction {0} cannot be reversed")]
    NotReversible(TransactionId),

    /// The play session has already ended or timed out.
    #[error("game session {0} is not active")]
    SessionNotActive(SessionId),

    /// The caller's wallet is locked.
    #[error("wallet is locked: {reason}")]
    WalletLocked {
        /// Lock reason recorded when the wallet was locked.
        reason: String,
    },

    /// The transfer recipient's wallet is locked.
    #[error("destination wallet is locked")]
    RecipientWalletLocked,

    /// Missing, unknown, inactive, or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Client exceeded rate limit.
    #[error("rate limit exceeded; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the client may retry.
        retry_after_ms: u64,
    },

    /// Persistence layer failure. The message is logged, never returned.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EconomyError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidCurrency(_) => 1002,
            Self::InvalidAmount(_) => 1003,
            Self::SelfTransfer => 1004,
            Self::InsufficientBalance { .. } => 1005,
            Self::UserNotFound(_) => 2001,
            Self::ProfileNotFound => 2002,
            Self::WalletNotFound => 2003,
            Self::RecipientWalletNotFound => 2004,
            Self::TransactionNotFound(_) => 2005,
            Self::ApiKeyNotFound(_) => 2006,
            Self::SessionNotFound(_) => 2007,
            Self::RefreshTokenNotFound => 2008,
            Self::AlreadyExists(_) => 2101,
            Self::InvalidTransition { .. } => 2102,
            Self::NotReversible(_) => 2103,
            Self::SessionNotActive(_) => 2104,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Unauthorized(_) => 4001,
            Self::WalletLocked { .. } => 4003,
            Self::RecipientWalletLocked => 4004,
            Self::RateLimited { .. } => 4029,
        }
    }

    /// Returns the stable error category for this variant.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidCurrency(_)
            | Self::InvalidAmount(_)
            | Self::SelfTransfer
            | Self::InsufficientBalance { .. } => ErrorKind::InvalidArgument,
            Self::UserNotFound(_)
            | Self::ProfileNotFound
            | Self::WalletNotFound
            | Self::RecipientWalletNotFound
            | Self::TransactionNotFound(_)
            | Self::ApiKeyNotFound(_)
            | Self::SessionNotFound(_)
            | Self::RefreshTokenNotFound => ErrorKind::NotFound,
            Self::AlreadyExists(_)
            | Self::InvalidTransition { .. }
            | Self::NotReversible(_)
            | Self::SessionNotActive(_) => ErrorKind::Conflict,
            Self::WalletLocked { .. } | Self::RecipientWalletLocked => ErrorKind::Forbidden,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::PersistenceError(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to callers. Internal failures are replaced
    /// by a generic text so that no database detail leaks.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for EconomyError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            let constraint = db_err.constraint().unwrap_or("unique key").to_string();
            return Self::AlreadyExists(constraint);
        }
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for EconomyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, "request failed");
        }
        let retry_after_secs = match &self {
            Self::RateLimited { retry_after_ms } => Some(retry_after_ms.div_ceil(1000).max(1)),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                kind: self.kind(),
                message: self.public_message(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        if let Some(secs) = retry_after_secs
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}
