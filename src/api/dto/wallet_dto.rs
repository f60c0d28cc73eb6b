//! Wallet DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CurrencyType, ProfileId, Wallet, WalletId};

/// Full view of a wallet.
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletDto {
    /// Wallet identifier.
    pub id: WalletId,
    /// Owning game profile.
    pub game_profile_id: ProfileId,
    /// Coins balance.
    pub coins_balance: i64,
    /// Gems balance.
    pub gems_balance: i64,
    /// Tokens balance.
    pub tokens_balance: i64,
    /// Sum of balances weighted by coin value.
    pub total_value: i64,
    /// Whether operations are blocked.
    pub is_locked: bool,
    /// Lock reason; empty when unlocked.
    pub lock_reason: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletDto {
    fn from(wallet: Wallet) -> Self {
        Self {
            coins_balance: wallet.get_balance(CurrencyType::Coins),
            gems_balance: wallet.get_balance(CurrencyType::Gems),
            tokens_balance: wallet.get_balance(CurrencyType::Tokens),
            total_value: wallet.get_total_value(),
            id: wallet.id,
            game_profile_id: wallet.profile_id,
            is_locked: wallet.is_locked,
            lock_reason: wallet.lock_reason,
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        }
    }
}

/// Response body for `GET /wallet/balance/{currency}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Requested currency.
    pub currency: CurrencyType,
    /// Current balance.
    pub balance: i64,
}

/// Response body for `GET /wallet/balances`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalancesResponse {
    /// Coins balance.
    pub coins: i64,
    /// Gems balance.
    pub gems: i64,
    /// Tokens balance.
    pub tokens: i64,
    /// Sum of balances weighted by coin value.
    pub total_value: i64,
    /// Whether operations are blocked.
    pub is_locked: bool,
}

impl From<&Wallet> for BalancesResponse {
    fn from(wallet: &Wallet) -> Self {
        Self {
            coins: wallet.get_balance(CurrencyType::Coins),
            gems: wallet.get_balance(CurrencyType::Gems),
            tokens: wallet.get_balance(CurrencyType::Tokens),
            total_value: wallet.get_total_value(),
            is_locked: wallet.is_locked,
        }
    }
}

/// Request body for `POST /wallet/lock`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LockWalletRequest {
    /// Why the wallet is locked. Must not be blank.
    pub reason: String,
}

/// Response body for `GET /wallet/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletStatusResponse {
    /// Whether operations are blocked.
    pub is_locked: bool,
    /// Lock reason; empty when unlocked.
    pub lock_reason: String,
    /// Sum of balances weighted by coin value.
    pub total_value: i64,
}

impl From<Wallet> for WalletStatusResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            total_value: wallet.get_total_value(),
            is_locked: wallet.is_locked,
            lock_reason: wallet.lock_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_dto_flattens_balances() {
        let mut wallet = Wallet::new(ProfileId::new());
        wallet.set_balance(CurrencyType::Coins, 150);
        wallet.set_balance(CurrencyType::Gems, 2);

        let dto = WalletDto::from(wallet.clone());
        assert_eq!(dto.coins_balance, 150);
        assert_eq!(dto.gems_balance, 2);
        assert_eq!(dto.tokens_balance, 0);
        assert_eq!(dto.total_value, wallet.get_total_value());

        let balances = BalancesResponse::from(&wallet);
        assert_eq!(balances.coins, 150);
        assert_eq!(balances.total_value, dto.total_value);
    }
}
