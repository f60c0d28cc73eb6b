//! Wallet service: wallet lifecycle, balance views, and lock control.

use crate::domain::{CurrencyType, Transaction, UserId, Wallet};
use crate::error::EconomyError;
use crate::persistence::{HistoryFilter, Store};

use super::EconomyService;

/// Coordinates wallet creation, reads, and lock-state changes.
///
/// Balance changes never go through here; see [`EconomyService`].
#[derive(Debug, Clone)]
pub struct WalletService {
    store: Store,
    economy: EconomyService,
}

impl WalletService {
    /// Creates a new `WalletService`.
    #[must_use]
    pub fn new(store: Store, economy: EconomyService) -> Self {
        Self { store, economy }
    }

    /// Creates a zero-balance wallet for the user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ProfileNotFound`],
    /// [`EconomyError::AlreadyExists`] if the profile already has a wallet,
    /// or a persistence error.
    pub async fn create(&self, user_id: UserId) -> Result<Wallet, EconomyError> {
        let profile = self
            .store
            .find_profile_by_user(user_id)
            .await?
            .ok_or(EconomyError::ProfileNotFound)?;
        let wallet = Wallet::new(profile.id);
        self.store
            .insert_wallet(&wallet)
            .await
            .map_err(|err| match err {
                EconomyError::AlreadyExists(_) => EconomyError::AlreadyExists("wallet".to_string()),
                other => other,
            })?;
        tracing::info!(%user_id, wallet_id = %wallet.id, "wallet created");
        Ok(wallet)
    }

    /// Loads the user's wallet.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for a missing profile or wallet, or a
    /// persistence error.
    pub async fn get(&self, user_id: UserId) -> Result<Wallet, EconomyError> {
        self.economy.wallet_for_user(user_id).await
    }

    /// Balance of one currency.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn balance(
        &self,
        user_id: UserId,
        currency: CurrencyType,
    ) -> Result<i64, EconomyError> {
        Ok(self.get(user_id).await?.get_balance(currency))
    }

    /// Locks the wallet with a non-empty reason.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for a blank reason, a
    /// not-found error, or a persistence error.
    pub async fn lock(&self, user_id: UserId, reason: &str) -> Result<Wallet, EconomyError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EconomyError::InvalidRequest(
                "lock reason must not be empty".to_string(),
            ));
        }
        let wallet = self
            .modify(user_id, |wallet| wallet.lock(reason))
            .await?;
        tracing::warn!(%user_id, wallet_id = %wallet.id, reason, "wallet locked");
        Ok(wallet)
    }

    /// Unlocks the wallet and clears the reason.
    ///
    /// # Errors
    ///
    /// Returns a not-found error or a persistence error.
    pub async fn unlock(&self, user_id: UserId) -> Result<Wallet, EconomyError> {
        let wallet = self.modify(user_id, Wallet::unlock).await?;
        tracing::info!(%user_id, wallet_id = %wallet.id, "wallet unlocked");
        Ok(wallet)
    }

    /// One unfiltered page of the wallet's ledger.
    ///
    /// # Errors
    ///
    /// Returns a not-found error or a persistence error.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Transaction>, u64), EconomyError> {
        self.economy
            .history(user_id, &HistoryFilter::page(limit, offset))
            .await
    }

    async fn modify<F>(&self, user_id: UserId, change: F) -> Result<Wallet, EconomyError>
    where
        F: FnOnce(&mut Wallet),
    {
        let current = self.get(user_id).await?;
        let mut unit = self.store.begin().await?;
        let mut wallet = unit
            .wallet_for_update(current.id)
            .await?
            .ok_or(EconomyError::WalletNotFound)?;
        change(&mut wallet);
        unit.save_wallet(&wallet).await?;
        unit.commit().await?;
        Ok(wallet)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EntryDetails;
    use crate::persistence::MemoryStore;
    use crate::service::ProfileService;
    use tokio_test::{assert_err, assert_ok};

    async fn setup() -> (WalletService, EconomyService, UserId) {
        let store = Store::Memory(MemoryStore::new());
        let economy = EconomyService::new(store.clone());
        let profiles = ProfileService::new(store.clone());
        let wallets = WalletService::new(store, economy.clone());
        let user = UserId::new();
        let Ok(_) = profiles.create(user).await else {
            panic!("profile create failed");
        };
        (wallets, economy, user)
    }

    #[tokio::test]
    async fn create_requires_profile() {
        let store = Store::Memory(MemoryStore::new());
        let wallets = WalletService::new(store.clone(), EconomyService::new(store));
        assert!(matches!(
            wallets.create(UserId::new()).await,
            Err(EconomyError::ProfileNotFound)
        ));
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let (wallets, _, user) = setup().await;
        let Ok(wallet) = wallets.create(user).await else {
            panic!("create failed");
        };
        assert_eq!(wallet.get_total_value(), 0);
        assert!(matches!(
            wallets.create(user).await,
            Err(EconomyError::AlreadyExists(ref what)) if what == "wallet"
        ));
    }

    #[tokio::test]
    async fn lock_and_unlock_round_trip() {
        let (wallets, economy, user) = setup().await;
        let Ok(_) = wallets.create(user).await else {
            panic!("create failed");
        };

        assert!(matches!(
            wallets.lock(user, "   ").await,
            Err(EconomyError::InvalidRequest(_))
        ));

        let Ok(locked) = wallets.lock(user, "fraud review").await else {
            panic!("lock failed");
        };
        assert!(locked.is_locked);
        assert_eq!(locked.lock_reason, "fraud review");
        assert_err!(
            economy
                .add_money(user, CurrencyType::Coins, 5, EntryDetails::default())
                .await
        );

        let unlocked = assert_ok!(wallets.unlock(user).await);
        assert!(!unlocked.is_locked);
        assert!(unlocked.lock_reason.is_empty());
        assert_ok!(
            economy
                .add_money(user, CurrencyType::Coins, 5, EntryDetails::default())
                .await
        );
        assert_eq!(assert_ok!(wallets.balance(user, CurrencyType::Coins).await), 5);
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let (wallets, economy, user) = setup().await;
        let Ok(_) = wallets.create(user).await else {
            panic!("create failed");
        };
        for amount in 1..=5 {
            let Ok(_) = economy
                .add_money(user, CurrencyType::Gems, amount, EntryDetails::default())
                .await
            else {
                panic!("earn failed");
            };
        }

        let Ok((page, total)) = wallets.history(user, 2, 1).await else {
            panic!("history failed");
        };
        assert_eq!(total, 5);
        let amounts: Vec<i64> = page.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![4, 3]);
    }
}
