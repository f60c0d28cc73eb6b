//! Ledger entry, money movement, and history DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PageMeta, PageParams, parse_currency, parse_filter};
use crate::domain::{
    CurrencyType, EntryDetails, JsonBag, Transaction, TransactionId, TransactionStatus,
    TransactionType, UserId, WalletId,
};
use crate::error::EconomyError;
use crate::persistence::HistoryFilter;
use crate::service::{LedgerOutcome, TransferOutcome};

/// Full view of a ledger entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionDto {
    /// Entry identifier.
    pub id: TransactionId,
    /// Wallet the entry belongs to.
    pub wallet_id: WalletId,
    /// Entry type.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// Currency moved.
    pub currency: CurrencyType,
    /// Signed amount; negative for debits.
    pub amount: i64,
    /// Balance before the entry was applied.
    pub balance_before: i64,
    /// Balance after the entry was applied.
    pub balance_after: i64,
    /// Free text.
    pub description: String,
    /// Grouping label.
    pub category: String,
    /// External or linking reference.
    pub reference: String,
    /// Open-schema metadata.
    #[schema(value_type = Object)]
    pub metadata: JsonBag,
    /// Counterpart wallet of a transfer leg.
    pub to_wallet_id: Option<WalletId>,
    /// Entry that reversed this one.
    pub reversed_by: Option<TransactionId>,
    /// Entry this one reverses.
    pub reverses: Option<TransactionId>,
    /// When the entry reached a final status.
    pub processed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionDto {
    fn from(entry: Transaction) -> Self {
        Self {
            id: entry.id,
            wallet_id: entry.wallet_id,
            kind: entry.kind,
            status: entry.status,
            currency: entry.currency,
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            description: entry.description,
            category: entry.category,
            reference: entry.reference,
            metadata: entry.metadata,
            to_wallet_id: entry.to_wallet_id,
            reversed_by: entry.reversed_by,
            reverses: entry.reverses,
            processed_at: entry.processed_at,
            created_at: entry.created_at,
        }
    }
}

/// Request body for `POST /transactions/add` and `POST /transactions/spend`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoneyRequest {
    /// `coins`, `gems`, or `tokens`.
    pub currency: String,
    /// Positive amount.
    pub amount: i64,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Grouping label.
    #[serde(default)]
    pub category: String,
    /// External reference.
    #[serde(default)]
    pub reference: String,
    /// Open-schema metadata stored with the entry.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: JsonBag,
}

impl MoneyRequest {
    /// Splits the request into the parsed currency, amount, and entry
    /// details.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidCurrency`] for an unknown currency.
    pub fn into_parts(self) -> Result<(CurrencyType, i64, EntryDetails), EconomyError> {
        let currency = parse_currency(&self.currency)?;
        let details = EntryDetails {
            description: self.description,
            category: self.category,
            reference: self.reference,
            metadata: self.metadata,
        };
        Ok((currency, self.amount, details))
    }
}

/// Request body for `POST /transactions/transfer`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    /// Recipient user.
    pub to_user_id: UserId,
    /// `coins`, `gems`, or `tokens`.
    pub currency: String,
    /// Positive amount.
    pub amount: i64,
    /// Free text copied to both legs.
    #[serde(default)]
    pub description: String,
}

/// Response body for single-entry ledger operations.
#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerResponse {
    /// Human-readable outcome.
    pub message: String,
    /// The completed entry.
    pub transaction: TransactionDto,
    /// Balance in the entry's currency after commit.
    pub new_balance: i64,
}

impl LedgerResponse {
    /// Wraps a service outcome with a message.
    #[must_use]
    pub fn new(message: impl Into<String>, outcome: LedgerOutcome) -> Self {
        Self {
            message: message.into(),
            transaction: outcome.transaction.into(),
            new_balance: outcome.new_balance,
        }
    }
}

/// Response body for `POST /transactions/transfer`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Debit leg on the sender's wallet.
    pub transaction: TransactionDto,
    /// Credit leg on the recipient's wallet.
    pub counterpart: TransactionDto,
    /// Sender's balance after commit.
    pub new_balance: i64,
}

impl From<TransferOutcome> for TransferResponse {
    fn from(outcome: TransferOutcome) -> Self {
        Self {
            message: "transfer completed".to_string(),
            transaction: outcome.outgoing.into(),
            counterpart: outcome.incoming.into(),
            new_balance: outcome.new_balance,
        }
    }
}

/// Query parameters for `GET /transactions/history`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Page size, 1–100. Defaults to 20.
    pub limit: Option<i64>,
    /// Entries to skip. Defaults to 0.
    pub offset: Option<i64>,
    /// Only entries of this type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Only entries in this currency.
    pub currency: Option<String>,
    /// Only entries with this status.
    pub status: Option<String>,
}

impl HistoryParams {
    /// Builds a validated history filter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown type, currency, or
    /// status value.
    pub fn to_filter(&self) -> Result<HistoryFilter, EconomyError> {
        let page = PageParams {
            limit: self.limit,
            offset: self.offset,
        };
        Ok(HistoryFilter {
            kind: parse_filter(self.kind.as_deref())?,
            currency: parse_filter(self.currency.as_deref())?,
            status: parse_filter(self.status.as_deref())?,
            limit: page.limit(),
            offset: page.offset(),
        })
    }
}

/// Response body for ledger listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Entries on this page, newest first.
    pub data: Vec<TransactionDto>,
    /// Paging metadata.
    pub pagination: PageMeta,
}

impl TransactionListResponse {
    /// Builds a page from the store result.
    #[must_use]
    pub fn new(entries: Vec<Transaction>, total: u64, limit: u32, offset: u64) -> Self {
        Self {
            data: entries.into_iter().map(TransactionDto::from).collect(),
            pagination: PageMeta {
                limit,
                offset,
                total,
            },
        }
    }
}
