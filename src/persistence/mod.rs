//! Persistence layer: PostgreSQL and in-memory stores.
//!
//! [`Store`] serves single-statement reads and writes. Anything that must
//! change several rows together goes through a [`UnitOfWork`] obtained
//! from [`Store::begin`]: row locks are taken as rows are loaded, writes
//! become visible only on [`UnitOfWork::commit`], and dropping a unit
//! without committing discards every write made through it.

pub mod memory;
pub mod models;
pub mod postgres;

use chrono::{DateTime, Utc};

pub use memory::{MemoryStore, MemoryUnit};
pub use postgres::{PostgresStore, PostgresUnit};

use crate::domain::{
    ApiKey, ApiKeyId, CurrencyType, GameProfile, GameSession, ProfileId, RefreshToken, SessionId,
    Transaction, TransactionId, TransactionStatus, TransactionType, User, UserId, Wallet, WalletId,
};
use crate::error::EconomyError;

/// Filters and paging for ledger history queries.
///
/// Results are ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Only entries of this type.
    pub kind: Option<TransactionType>,
    /// Only entries in this currency.
    pub currency: Option<CurrencyType>,
    /// Only entries with this status.
    pub status: Option<TransactionStatus>,
    /// Page size.
    pub limit: u32,
    /// Entries to skip.
    pub offset: u64,
}

impl HistoryFilter {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 20;
    /// Largest accepted page size.
    pub const MAX_LIMIT: u32 = 100;

    /// Unfiltered first page.
    #[must_use]
    pub const fn page(limit: u32, offset: u64) -> Self {
        Self {
            kind: None,
            currency: None,
            status: None,
            limit,
            offset,
        }
    }

    /// Whether `entry` passes the type, currency, and status filters.
    #[must_use]
    pub fn matches(&self, entry: &Transaction) -> bool {
        self.kind.is_none_or(|k| entry.kind == k)
            && self.currency.is_none_or(|c| entry.currency == c)
            && self.status.is_none_or(|s| entry.status == s)
    }
}

/// Leaderboard row: an active profile and its owner's username.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// The ranked profile.
    pub profile: GameProfile,
    /// Owner's username.
    pub username: String,
}

macro_rules! dispatch {
    ($value:expr, $inner:ident => $call:expr) => {
        match $value {
            Self::Postgres($inner) => $call,
            Self::Memory($inner) => $call,
        }
    };
}

/// Storage backend selected at startup.
#[derive(Debug, Clone)]
pub enum Store {
    /// PostgreSQL via `sqlx`.
    Postgres(PostgresStore),
    /// Process-local store for tests and local runs.
    Memory(MemoryStore),
}

impl Store {
    /// Opens a unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] if no connection can be
    /// acquired.
    pub async fn begin(&self) -> Result<UnitOfWork, EconomyError> {
        match self {
            Self::Postgres(store) => store.begin().await.map(UnitOfWork::Postgres),
            Self::Memory(store) => Ok(UnitOfWork::Memory(store.begin().await)),
        }
    }

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] if the database does not
    /// answer.
    pub async fn ping(&self) -> Result<(), EconomyError> {
        dispatch!(self, s => s.ping().await)
    }

    /// Loads a user that is not soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_user(&self, id: UserId) -> Result<Option<User>, EconomyError> {
        dispatch!(self, s => s.find_user(id).await)
    }

    /// Loads a user that is not soft-deleted by login name.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, EconomyError> {
        dispatch!(self, s => s.find_user_by_username(username).await)
    }

    /// Persists changed user fields.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::AlreadyExists`] if the new e-mail is taken,
    /// or [`EconomyError::PersistenceError`] on database failure.
    pub async fn update_user(&self, user: &User) -> Result<(), EconomyError> {
        dispatch!(self, s => s.update_user(user).await)
    }

    /// Finds a key record by the digest of its key material.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_api_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, EconomyError> {
        dispatch!(self, s => s.find_api_key_by_hash(hash).await)
    }

    /// Lists a user's keys that are not soft-deleted, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn list_api_keys(&self, user_id: UserId) -> Result<Vec<ApiKey>, EconomyError> {
        dispatch!(self, s => s.list_api_keys(user_id).await)
    }

    /// Loads one of a user's keys.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_api_key(
        &self,
        user_id: UserId,
        id: ApiKeyId,
    ) -> Result<Option<ApiKey>, EconomyError> {
        dispatch!(self, s => s.find_api_key(user_id, id).await)
    }

    /// Persists changed key fields, including soft deletion.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn update_api_key(&self, key: &ApiKey) -> Result<(), EconomyError> {
        dispatch!(self, s => s.update_api_key(key).await)
    }

    /// Records a successful authentication.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn touch_api_key(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), EconomyError> {
        dispatch!(self, s => s.touch_api_key(id, at).await)
    }

    /// Inserts a new profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::AlreadyExists`] if the user already has one,
    /// or [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_profile(&self, profile: &GameProfile) -> Result<(), EconomyError> {
        dispatch!(self, s => s.insert_profile(profile).await)
    }

    /// Loads the user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_profile_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<GameProfile>, EconomyError> {
        dispatch!(self, s => s.find_profile_by_user(user_id).await)
    }

    /// Active profiles ordered by level then XP, highest first.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        dispatch!(self, s => s.leaderboard(limit).await)
    }

    /// Inserts a new wallet.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::AlreadyExists`] if the profile already has
    /// one, or [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_wallet(&self, wallet: &Wallet) -> Result<(), EconomyError> {
        dispatch!(self, s => s.insert_wallet(wallet).await)
    }

    /// Loads the profile's wallet.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_wallet_by_profile(
        &self,
        profile_id: ProfileId,
    ) -> Result<Option<Wallet>, EconomyError> {
        dispatch!(self, s => s.find_wallet_by_profile(profile_id).await)
    }

    /// One page of a wallet's ledger plus the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: &HistoryFilter,
    ) -> Result<(Vec<Transaction>, u64), EconomyError> {
        dispatch!(self, s => s.list_transactions(wallet_id, filter).await)
    }

    /// Loads one ledger entry belonging to `wallet_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_transaction(
        &self,
        wallet_id: WalletId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, EconomyError> {
        dispatch!(self, s => s.find_transaction(wallet_id, id).await)
    }

    /// Loads one of a profile's sessions.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn find_session(
        &self,
        profile_id: ProfileId,
        id: SessionId,
    ) -> Result<Option<GameSession>, EconomyError> {
        dispatch!(self, s => s.find_session(profile_id, id).await)
    }

    /// One page of a profile's sessions, newest first, plus the total.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn list_sessions(
        &self,
        profile_id: ProfileId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<GameSession>, u64), EconomyError> {
        dispatch!(self, s => s.list_sessions(profile_id, limit, offset).await)
    }
}

/// An open atomic unit of work.
#[derive(Debug)]
pub enum UnitOfWork {
    /// A PostgreSQL transaction.
    Postgres(PostgresUnit),
    /// An in-memory working copy.
    Memory(MemoryUnit),
}

impl UnitOfWork {
    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::AlreadyExists`] on a duplicate username or
    /// e-mail, or [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_user(&mut self, user: &User) -> Result<(), EconomyError> {
        dispatch!(self, u => u.insert_user(user).await)
    }

    /// Inserts an API key record.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_api_key(&mut self, key: &ApiKey) -> Result<(), EconomyError> {
        dispatch!(self, u => u.insert_api_key(key).await)
    }

    /// Inserts a refresh token record.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<(), EconomyError> {
        dispatch!(self, u => u.insert_refresh_token(token).await)
    }

    /// Loads and row-locks a refresh token by the digest of its value.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn refresh_token_for_update(
        &mut self,
        hash: &str,
    ) -> Result<Option<RefreshToken>, EconomyError> {
        dispatch!(self, u => u.refresh_token_for_update(hash).await)
    }

    /// Writes back a refresh token's revocation.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn save_refresh_token(&mut self, token: &RefreshToken) -> Result<(), EconomyError> {
        dispatch!(self, u => u.save_refresh_token(token).await)
    }

    /// Loads and row-locks the user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn profile_for_update(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<GameProfile>, EconomyError> {
        dispatch!(self, u => u.profile_for_update(user_id).await)
    }

    /// Writes back a profile loaded through this unit.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn save_profile(&mut self, profile: &GameProfile) -> Result<(), EconomyError> {
        dispatch!(self, u => u.save_profile(profile).await)
    }

    /// Loads and row-locks a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn wallet_for_update(
        &mut self,
        id: WalletId,
    ) -> Result<Option<Wallet>, EconomyError> {
        dispatch!(self, u => u.wallet_for_update(id).await)
    }

    /// Writes back a wallet's balances and lock state.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), EconomyError> {
        dispatch!(self, u => u.save_wallet(wallet).await)
    }

    /// Inserts a ledger entry.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_transaction(&mut self, entry: &Transaction) -> Result<(), EconomyError> {
        dispatch!(self, u => u.insert_transaction(entry).await)
    }

    /// Writes back an entry's status, links, and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn update_transaction(&mut self, entry: &Transaction) -> Result<(), EconomyError> {
        dispatch!(self, u => u.update_transaction(entry).await)
    }

    /// Loads and row-locks one of a wallet's ledger entries.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn transaction_for_update(
        &mut self,
        wallet_id: WalletId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, EconomyError> {
        dispatch!(self, u => u.transaction_for_update(wallet_id, id).await)
    }

    /// Inserts a session.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn insert_session(&mut self, session: &GameSession) -> Result<(), EconomyError> {
        dispatch!(self, u => u.insert_session(session).await)
    }

    /// Loads and row-locks every active session of a profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn active_sessions_for_update(
        &mut self,
        profile_id: ProfileId,
    ) -> Result<Vec<GameSession>, EconomyError> {
        dispatch!(self, u => u.active_sessions_for_update(profile_id).await)
    }

    /// Loads and row-locks one of a profile's sessions.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn session_for_update(
        &mut self,
        profile_id: ProfileId,
        id: SessionId,
    ) -> Result<Option<GameSession>, EconomyError> {
        dispatch!(self, u => u.session_for_update(profile_id, id).await)
    }

    /// Writes back a session's state, counters, and data.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] on database failure.
    pub async fn save_session(&mut self, session: &GameSession) -> Result<(), EconomyError> {
        dispatch!(self, u => u.save_session(session).await)
    }

    /// Makes every write of this unit visible at once.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::PersistenceError`] if the commit fails; in
    /// that case nothing was applied.
    pub async fn commit(self) -> Result<(), EconomyError> {
        dispatch!(self, u => u.commit().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryDetails, ProfileId};

    #[test]
    fn filter_matches_all_fields() {
        let wallet = Wallet::new(ProfileId::new());
        let entry = Transaction::pending(
            &wallet,
            TransactionType::Earn,
            CurrencyType::Gems,
            5,
            EntryDetails::default(),
        );

        let mut filter = HistoryFilter::page(20, 0);
        assert!(filter.matches(&entry));

        filter.currency = Some(CurrencyType::Gems);
        filter.status = Some(TransactionStatus::Pending);
        assert!(filter.matches(&entry));

        filter.kind = Some(TransactionType::Spend);
        assert!(!filter.matches(&entry));
    }
}
