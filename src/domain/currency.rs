//! Currency types and per-currency balance storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EconomyError;

/// In-game currency. Closed set; unknown strings are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyType {
    /// Main soft currency.
    Coins,
    /// Premium currency.
    Gems,
    /// Event / special currency.
    Tokens,
}

impl CurrencyType {
    /// Number of currencies.
    pub const COUNT: usize = 3;

    /// All currencies in ordinal order.
    pub const ALL: [Self; Self::COUNT] = [Self::Coins, Self::Gems, Self::Tokens];

    /// Ordinal used to index balance storage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Coins => 0,
            Self::Gems => 1,
            Self::Tokens => 2,
        }
    }

    /// Storage / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coins => "coins",
            Self::Gems => "gems",
            Self::Tokens => "tokens",
        }
    }

    /// Value of one unit expressed in coins, for ranking and reporting.
    #[must_use]
    pub const fn coin_value(self) -> i64 {
        match self {
            Self::Coins => 1,
            Self::Gems => 100,
            Self::Tokens => 10,
        }
    }
}

impl fmt::Display for CurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyType {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coins" => Ok(Self::Coins),
            "gems" => Ok(Self::Gems),
            "tokens" => Ok(Self::Tokens),
            other => Err(EconomyError::InvalidCurrency(other.to_string())),
        }
    }
}

/// Fixed-size balance table indexed by [`CurrencyType::index`].
///
/// Arithmetic here is raw; the non-negative invariant is enforced by
/// [`super::Wallet::add_balance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balances([i64; CurrencyType::COUNT]);

impl Balances {
    /// Builds a table from explicit coin, gem, and token balances.
    #[must_use]
    pub const fn new(coins: i64, gems: i64, tokens: i64) -> Self {
        Self([coins, gems, tokens])
    }

    /// Returns the balance for `currency`.
    #[must_use]
    pub fn get(&self, currency: CurrencyType) -> i64 {
        self.0.get(currency.index()).copied().unwrap_or(0)
    }

    /// Overwrites the balance for `currency`.
    pub fn set(&mut self, currency: CurrencyType, amount: i64) {
        if let Some(slot) = self.0.get_mut(currency.index()) {
            *slot = amount;
        }
    }

    /// Iterates `(currency, balance)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (CurrencyType, i64)> + '_ {
        CurrencyType::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}
