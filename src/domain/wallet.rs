//! Multi-currency wallet owned by a game profile.

use chrono::{DateTime, Utc};

use super::currency::{Balances, CurrencyType};
use super::ids::{ProfileId, WalletId};

/// Per-profile wallet holding one non-negative balance per currency.
///
/// Balance mutation goes through [`crate::service::EconomyService`], which
/// pairs every change with a ledger entry. The methods here only do the
/// arithmetic and the lock bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    /// Wallet identifier.
    pub id: WalletId,
    /// Owning game profile (unique: one wallet per profile).
    pub profile_id: ProfileId,
    pub(crate) balances: Balances,
    /// Whether the wallet is locked. A locked wallet accepts no earn,
    /// spend, or transfer.
    pub is_locked: bool,
    /// Free-text lock reason; empty when unlocked.
    pub lock_reason: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Wallet {
    /// Creates an unlocked wallet with zero balances.
    #[must_use]
    pub fn new(profile_id: ProfileId) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::new(),
            profile_id,
            balances: Balances::default(),
            is_locked: false,
            lock_reason: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns the full balance table.
    #[must_use]
    pub const fn balances(&self) -> &Balances {
        &self.balances
    }

    /// Current balance for `currency`.
    #[must_use]
    pub fn get_balance(&self, currency: CurrencyType) -> i64 {
        self.balances.get(currency)
    }

    /// Overwrites the balance for `currency` without validation.
    pub fn set_balance(&mut self, currency: CurrencyType, amount: i64) {
        self.balances.set(currency, amount);
        self.updated_at = Utc::now();
    }

    /// Adds a signed `delta` and returns the resulting balance.
    ///
    /// A result below zero is clamped to zero rather than rejected, so an
    /// overdrawing debit is silently truncated. Callers must check
    /// [`Self::can_spend`] first.
    pub fn add_balance(&mut self, currency: CurrencyType, delta: i64) -> i64 {
        let new_balance = self.get_balance(currency).saturating_add(delta).max(0);
        self.set_balance(currency, new_balance);
        new_balance
    }

    /// Whether the balance for `currency` covers `amount`.
    #[must_use]
    pub fn has_sufficient_balance(&self, currency: CurrencyType, amount: i64) -> bool {
        self.get_balance(currency) >= amount
    }

    /// Whether `amount` of `currency` may be debited right now.
    #[must_use]
    pub fn can_spend(&self, currency: CurrencyType, amount: i64) -> bool {
        !self.is_locked && self.has_sufficient_balance(currency, amount)
    }

    /// Locks the wallet, recording `reason`.
    pub fn lock(&mut self, reason: impl Into<String>) {
        self.is_locked = true;
        self.lock_reason = reason.into();
        self.updated_at = Utc::now();
    }

    /// Unlocks the wallet and clears the lock reason.
    pub fn unlock(&mut self) {
        self.is_locked = false;
        self.lock_reason.clear();
        self.updated_at = Utc::now();
    }

    /// Total value in coins (1 gem = 100 coins, 1 token = 10 coins).
    ///
    /// Used for ranking and reporting only.
    #[must_use]
    pub fn get_total_value(&self) -> i64 {
        self.balances
            .iter()
            .map(|(currency, balance)| balance.saturating_mul(currency.coin_value()))
            .fold(0_i64, i64::saturating_add)
    }
}
