//! Ledger entries: one auditable record per balance-affecting operation.
//!
//! An entry captures the balance before and after its amount is applied,
//! so `balance_after - balance_before == amount` holds for every entry.
//! Apart from soft deletion, only the status and the reversal links ever
//! change after creation.
//!
//! ```text
//! pending ──► completed ──► reversed
//!    │
//!    ├──────► failed
//!    └──────► cancelled
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::JsonBag;
use super::currency::CurrencyType;
use super::ids::{TransactionId, WalletId};
use super::wallet::Wallet;
use crate::error::EconomyError;

/// Kind of economic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Currency earned through play.
    Earn,
    /// Currency spent.
    Spend,
    /// One leg of a user-to-user transfer.
    Transfer,
    /// System-granted reward.
    Reward,
    /// System-imposed penalty.
    Penalty,
    /// Refund of an earlier debit.
    Refund,
}

impl TransactionType {
    /// Storage / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Spend => "spend",
            Self::Transfer => "transfer",
            Self::Reward => "reward",
            Self::Penalty => "penalty",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earn" => Ok(Self::Earn),
            "spend" => Ok(Self::Spend),
            "transfer" => Ok(Self::Transfer),
            "reward" => Ok(Self::Reward),
            "penalty" => Ok(Self::Penalty),
            "refund" => Ok(Self::Refund),
            other => Err(EconomyError::InvalidRequest(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, not yet applied.
    Pending,
    /// Applied to the wallet.
    Completed,
    /// Terminal failure.
    Failed,
    /// Terminal cancellation.
    Cancelled,
    /// Completed, then undone by a reversing entry.
    Reversed,
}

impl TransactionStatus {
    /// Storage / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Reversed => "reversed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed | Self::Failed | Self::Cancelled)
                | (Self::Completed, Self::Reversed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "reversed" => Ok(Self::Reversed),
            other => Err(EconomyError::InvalidRequest(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

/// Free-text and open-schema annotations attached to a new entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDetails {
    /// Human-readable description.
    pub description: String,
    /// Caller-defined category (e.g. `"shop"`, `"transfer_out"`).
    pub category: String,
    /// External reference (purchase id, quest id, transfer correlation).
    pub reference: String,
    /// Open-schema metadata; unknown keys are kept as-is.
    pub metadata: JsonBag,
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Entry identifier.
    pub id: TransactionId,
    /// Wallet whose balance this entry changes.
    pub wallet_id: WalletId,
    /// Kind of event.
    pub kind: TransactionType,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// Affected currency.
    pub currency: CurrencyType,
    /// Signed amount; negative for debits.
    pub amount: i64,
    /// Wallet balance for `currency` before the entry was applied.
    pub balance_before: i64,
    /// Wallet balance for `currency` after the entry was applied.
    pub balance_after: i64,
    /// Human-readable description.
    pub description: String,
    /// Caller-defined category.
    pub category: String,
    /// External reference.
    pub reference: String,
    /// Open-schema metadata.
    pub metadata: JsonBag,
    /// Counterpart wallet for transfer legs.
    pub to_wallet_id: Option<WalletId>,
    /// Entry that reversed this one.
    pub reversed_by: Option<TransactionId>,
    /// Entry this one reverses.
    pub reverses: Option<TransactionId>,
    /// When the entry reached a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status or link change.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Creates a pending entry against `wallet`, snapshotting its current
    /// balance. Must be called before the wallet is mutated.
    #[must_use]
    pub fn pending(
        wallet: &Wallet,
        kind: TransactionType,
        currency: CurrencyType,
        amount: i64,
        details: EntryDetails,
    ) -> Self {
        let now = Utc::now();
        let balance_before = wallet.get_balance(currency);
        Self {
            id: TransactionId::new(),
            wallet_id: wallet.id,
            kind,
            status: TransactionStatus::Pending,
            currency,
            amount,
            balance_before,
            balance_after: balance_before.saturating_add(amount),
            description: details.description,
            category: details.category,
            reference: details.reference,
            metadata: details.metadata,
            to_wallet_id: None,
            reversed_by: None,
            reverses: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Sets the counterpart wallet of a transfer leg.
    #[must_use]
    pub fn with_counterpart(mut self, wallet_id: WalletId) -> Self {
        self.to_wallet_id = Some(wallet_id);
        self
    }

    /// Marks this entry as the reversal of `original`.
    #[must_use]
    pub fn reversing(mut self, original: TransactionId) -> Self {
        self.reverses = Some(original);
        self
    }

    /// Whether the entry has been applied.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Whether the entry is still pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Completed and not yet reversed. An entry can be reversed once.
    #[must_use]
    pub fn can_be_reversed(&self) -> bool {
        self.is_completed() && self.reversed_by.is_none()
    }

    /// Whether this entry is a transfer leg with a counterpart wallet.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        self.kind == TransactionType::Transfer && self.to_wallet_id.is_some()
    }

    /// Magnitude of the amount.
    #[must_use]
    pub fn absolute_amount(&self) -> i64 {
        self.amount.saturating_abs()
    }

    /// Moves a pending entry to completed.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidTransition`] unless the entry is pending.
    pub fn complete(&mut self) -> Result<(), EconomyError> {
        self.finish(TransactionStatus::Completed)
    }

    /// Moves a pending entry to failed.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidTransition`] unless the entry is pending.
    pub fn fail(&mut self) -> Result<(), EconomyError> {
        self.finish(TransactionStatus::Failed)
    }

    /// Moves a pending entry to cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidTransition`] unless the entry is pending.
    pub fn cancel(&mut self) -> Result<(), EconomyError> {
        self.finish(TransactionStatus::Cancelled)
    }

    /// Marks this entry reversed by `reversal`.
    ///
    /// Only the status and link are updated here; computing the inverse
    /// amount and re-applying it to the wallet is the engine's job.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::NotReversible`] if the entry is not completed,
    /// was already reversed, or `reversal` does not point back at it.
    pub fn reverse(&mut self, reversal: &Self) -> Result<(), EconomyError> {
        if !self.can_be_reversed() || reversal.reverses != Some(self.id) {
            return Err(EconomyError::NotReversible(self.id));
        }
        self.status = TransactionStatus::Reversed;
        self.reversed_by = Some(reversal.id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Sets a metadata value, keeping every other key.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    fn finish(&mut self, next: TransactionStatus) -> Result<(), EconomyError> {
        if !self.status.can_transition_to(next) {
            return Err(EconomyError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ProfileId;

    fn wallet_with_coins(coins: i64) -> Wallet {
        let mut wallet = Wallet::new(ProfileId::new());
        wallet.set_balance(CurrencyType::Coins, coins);
        wallet
    }

    fn earn(wallet: &Wallet, amount: i64) -> Transaction {
        Transaction::pending(
            wallet,
            TransactionType::Earn,
            CurrencyType::Coins,
            amount,
            EntryDetails::default(),
        )
    }

    #[test]
    fn pending_snapshots_balances() {
        let wallet = wallet_with_coins(1000);
        let entry = Transaction::pending(
            &wallet,
            TransactionType::Spend,
            CurrencyType::Coins,
            -400,
            EntryDetails::default(),
        );
        assert!(entry.is_pending());
        assert_eq!(entry.balance_before, 1000);
        assert_eq!(entry.balance_after, 600);
        assert_eq!(entry.balance_after - entry.balance_before, entry.amount);
        assert_eq!(entry.absolute_amount(), 400);
        assert!(entry.processed_at.is_none());
    }

    #[test]
    fn complete_sets_processed_at() {
        let mut entry = earn(&wallet_with_coins(0), 10);
        assert!(entry.complete().is_ok());
        assert!(entry.is_completed());
        assert!(entry.processed_at.is_some());
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut failed = earn(&wallet_with_coins(0), 10);
        assert!(failed.fail().is_ok());
        assert!(matches!(
            failed.complete(),
            Err(EconomyError::InvalidTransition {
                from: TransactionStatus::Failed,
                to: TransactionStatus::Completed
            })
        ));

        let mut cancelled = earn(&wallet_with_coins(0), 10);
        assert!(cancelled.cancel().is_ok());
        assert!(cancelled.fail().is_err());
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    }

    #[test]
    fn only_completed_can_be_reversed() {
        let wallet = wallet_with_coins(0);
        let mut entry = earn(&wallet, 50);
        assert!(!entry.can_be_reversed());

        let reversal = earn(&wallet, -50).reversing(entry.id);
        assert!(matches!(
            entry.reverse(&reversal),
            Err(EconomyError::NotReversible(_))
        ));
    }

    #[test]
    fn reverse_links_once() {
        let wallet = wallet_with_coins(0);
        let mut entry = earn(&wallet, 50);
        let Ok(()) = entry.complete() else {
            panic!("complete failed");
        };
        assert!(entry.can_be_reversed());

        let reversal = earn(&wallet, -50).reversing(entry.id);
        assert!(entry.reverse(&reversal).is_ok());
        assert_eq!(entry.status, TransactionStatus::Reversed);
        assert_eq!(entry.reversed_by, Some(reversal.id));
        assert!(!entry.can_be_reversed());

        let second = earn(&wallet, -50).reversing(entry.id);
        assert!(entry.reverse(&second).is_err());
        assert_eq!(entry.reversed_by, Some(reversal.id));
    }

    #[test]
    fn reverse_requires_back_pointer() {
        let wallet = wallet_with_coins(0);
        let mut entry = earn(&wallet, 50);
        let Ok(()) = entry.complete() else {
            panic!("complete failed");
        };
        let unrelated = earn(&wallet, -50);
        assert!(entry.reverse(&unrelated).is_err());
        assert!(entry.is_completed());
    }

    #[test]
    fn is_transfer_needs_counterpart() {
        let wallet = wallet_with_coins(100);
        let leg = Transaction::pending(
            &wallet,
            TransactionType::Transfer,
            CurrencyType::Coins,
            -10,
            EntryDetails::default(),
        );
        assert!(!leg.is_transfer());
        assert!(leg.with_counterpart(WalletId::new()).is_transfer());
    }

    #[test]
    fn metadata_keeps_unknown_keys() {
        let mut metadata = JsonBag::new();
        metadata.insert("quest".to_string(), serde_json::json!({"id": 7}));
        let wallet = wallet_with_coins(0);
        let mut entry = Transaction::pending(
            &wallet,
            TransactionType::Reward,
            CurrencyType::Gems,
            3,
            EntryDetails {
                metadata,
                ..EntryDetails::default()
            },
        );
        entry.set_metadata("source", serde_json::json!("daily"));
        assert_eq!(
            entry.metadata_value("quest"),
            Some(&serde_json::json!({"id": 7}))
        );
        assert_eq!(entry.metadata.len(), 2);
    }

    #[test]
    fn status_and_type_parse_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
            TransactionStatus::Reversed,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>().ok(), Some(status));
        }
        assert!("refund".parse::<TransactionType>().is_ok());
        assert!("bribe".parse::<TransactionType>().is_err());
    }
}
