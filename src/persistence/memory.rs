//! Process-local store with serializable units of work.
//!
//! All state sits behind one [`tokio::sync::Mutex`]. A [`MemoryUnit`] holds
//! the lock for its whole lifetime and works on a copy of the state that
//! replaces the original only on commit, so units are fully serialized and
//! a dropped unit leaves no trace.
//!
//! A task holding a unit must not call [`MemoryStore`] read methods: they
//! wait on the same lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{HistoryFilter, LeaderboardEntry};
use crate::domain::{
    ApiKey, ApiKeyId, GameProfile, GameSession, ProfileId, RefreshToken, RefreshTokenId,
    SessionId, SessionStatus, Transaction, TransactionId, User, UserId, Wallet, WalletId,
};
use crate::error::EconomyError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    api_keys: HashMap<ApiKeyId, ApiKey>,
    refresh_tokens: HashMap<RefreshTokenId, RefreshToken>,
    profiles: HashMap<ProfileId, GameProfile>,
    wallets: HashMap<WalletId, Wallet>,
    // Insertion order doubles as creation order.
    transactions: Vec<Transaction>,
    sessions: HashMap<SessionId, GameSession>,
}

impl MemoryState {
    fn check_user_unique(&self, user: &User) -> Result<(), EconomyError> {
        let clash = self.users.values().find(|u| {
            u.id != user.id
                && u.deleted_at.is_none()
                && (u.username == user.username || u.email == user.email)
        });
        match clash {
            Some(u) if u.username == user.username => {
                Err(EconomyError::AlreadyExists("users_username_key".to_string()))
            }
            Some(_) => Err(EconomyError::AlreadyExists("users_email_key".to_string())),
            None => Ok(()),
        }
    }

    fn live_profile_by_user(&self, user_id: UserId) -> Option<&GameProfile> {
        self.profiles
            .values()
            .find(|p| p.user_id == user_id && p.deleted_at.is_none())
    }

    fn live_session(&self, profile_id: ProfileId, id: SessionId) -> Option<&GameSession> {
        self.sessions
            .get(&id)
            .filter(|s| s.profile_id == profile_id && s.deleted_at.is_none())
    }

    fn live_transaction(&self, wallet_id: WalletId, id: TransactionId) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.id == id && t.wallet_id == wallet_id && t.deleted_at.is_none())
    }
}

/// In-memory [`super::Store`] backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    #[cfg(test)]
    fail_ledger_updates: Arc<AtomicBool>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent ledger-entry update fail, to exercise
    /// rollback paths.
    #[cfg(test)]
    pub(crate) fn fail_ledger_updates(&self, on: bool) {
        self.fail_ledger_updates.store(on, Ordering::SeqCst);
    }

    pub(crate) async fn begin(&self) -> MemoryUnit {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        MemoryUnit {
            guard,
            working,
            #[cfg(test)]
            fail_ledger_updates: self.fail_ledger_updates.load(Ordering::SeqCst),
        }
    }

    pub(crate) async fn ping(&self) -> Result<(), EconomyError> {
        Ok(())
    }

    pub(crate) async fn find_user(&self, id: UserId) -> Result<Option<User>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username && u.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn update_user(&self, user: &User) -> Result<(), EconomyError> {
        let mut state = self.state.lock().await;
        state.check_user_unique(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    pub(crate) async fn find_api_key_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<ApiKey>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state
            .api_keys
            .values()
            .find(|k| k.key_hash == hash && k.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn list_api_keys(&self, user_id: UserId) -> Result<Vec<ApiKey>, EconomyError> {
        let state = self.state.lock().await;
        let mut keys: Vec<ApiKey> = state
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id && k.deleted_at.is_none())
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    pub(crate) async fn find_api_key(
        &self,
        user_id: UserId,
        id: ApiKeyId,
    ) -> Result<Option<ApiKey>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state
            .api_keys
            .get(&id)
            .filter(|k| k.user_id == user_id && k.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn update_api_key(&self, key: &ApiKey) -> Result<(), EconomyError> {
        let mut state = self.state.lock().await;
        state.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    pub(crate) async fn touch_api_key(
        &self,
        id: ApiKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), EconomyError> {
        let mut state = self.state.lock().await;
        if let Some(key) = state.api_keys.get_mut(&id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    pub(crate) async fn insert_profile(&self, profile: &GameProfile) -> Result<(), EconomyError> {
        let mut state = self.state.lock().await;
        if state.live_profile_by_user(profile.user_id).is_some() {
            return Err(EconomyError::AlreadyExists(
                "game_profiles_user_id_key".to_string(),
            ));
        }
        state.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    pub(crate) async fn find_profile_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<GameProfile>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state.live_profile_by_user(user_id).cloned())
    }

    pub(crate) async fn leaderboard(
        &self,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        let state = self.state.lock().await;
        let mut ranked: Vec<LeaderboardEntry> = state
            .profiles
            .values()
            .filter(|p| p.is_active && p.deleted_at.is_none())
            .filter_map(|p| {
                state
                    .users
                    .get(&p.user_id)
                    .filter(|u| u.deleted_at.is_none())
                    .map(|u| LeaderboardEntry {
                        profile: p.clone(),
                        username: u.username.clone(),
                    })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.profile
                .level
                .cmp(&a.profile.level)
                .then(b.profile.xp.cmp(&a.profile.xp))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    pub(crate) async fn insert_wallet(&self, wallet: &Wallet) -> Result<(), EconomyError> {
        let mut state = self.state.lock().await;
        let exists = state
            .wallets
            .values()
            .any(|w| w.profile_id == wallet.profile_id && w.deleted_at.is_none());
        if exists {
            return Err(EconomyError::AlreadyExists(
                "wallets_game_profile_id_key".to_string(),
            ));
        }
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    pub(crate) async fn find_wallet_by_profile(
        &self,
        profile_id: ProfileId,
    ) -> Result<Option<Wallet>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .values()
            .find(|w| w.profile_id == profile_id && w.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: &HistoryFilter,
    ) -> Result<(Vec<Transaction>, u64), EconomyError> {
        let state = self.state.lock().await;
        let matching: Vec<&Transaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.wallet_id == wallet_id && t.deleted_at.is_none() && filter.matches(t))
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    pub(crate) async fn find_transaction(
        &self,
        wallet_id: WalletId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state.live_transaction(wallet_id, id).cloned())
    }

    pub(crate) async fn find_session(
        &self,
        profile_id: ProfileId,
        id: SessionId,
    ) -> Result<Option<GameSession>, EconomyError> {
        let state = self.state.lock().await;
        Ok(state.live_session(profile_id, id).cloned())
    }

    pub(crate) async fn list_sessions(
        &self,
        profile_id: ProfileId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<GameSession>, u64), EconomyError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&GameSession> = state
            .sessions
            .values()
            .filter(|s| s.profile_id == profile_id && s.deleted_at.is_none())
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

/// Unit of work over a [`MemoryStore`].
pub struct MemoryUnit {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    #[cfg(test)]
    fail_ledger_updates: bool,
}

impl fmt::Debug for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUnit").finish_non_exhaustive()
    }
}

impl MemoryUnit {
    pub(crate) async fn insert_user(&mut self, user: &User) -> Result<(), EconomyError> {
        self.working.check_user_unique(user)?;
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    pub(crate) async fn insert_api_key(&mut self, key: &ApiKey) -> Result<(), EconomyError> {
        if self.working.api_keys.values().any(|k| k.key_hash == key.key_hash) {
            return Err(EconomyError::AlreadyExists("api_keys_key_hash_key".to_string()));
        }
        self.working.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    pub(crate) async fn insert_refresh_token(
        &mut self,
        token: &RefreshToken,
    ) -> Result<(), EconomyError> {
        if self
            .working
            .refresh_tokens
            .values()
            .any(|t| t.token_hash == token.token_hash)
        {
            return Err(EconomyError::AlreadyExists(
                "refresh_tokens_token_hash_key".to_string(),
            ));
        }
        self.working.refresh_tokens.insert(token.id, token.clone());
        Ok(())
    }

    pub(crate) async fn refresh_token_for_update(
        &mut self,
        hash: &str,
    ) -> Result<Option<RefreshToken>, EconomyError> {
        Ok(self
            .working
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == hash && t.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn save_refresh_token(
        &mut self,
        token: &RefreshToken,
    ) -> Result<(), EconomyError> {
        self.working.refresh_tokens.insert(token.id, token.clone());
        Ok(())
    }

    pub(crate) async fn profile_for_update(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<GameProfile>, EconomyError> {
        Ok(self.working.live_profile_by_user(user_id).cloned())
    }

    pub(crate) async fn save_profile(&mut self, profile: &GameProfile) -> Result<(), EconomyError> {
        self.working.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    pub(crate) async fn wallet_for_update(
        &mut self,
        id: WalletId,
    ) -> Result<Option<Wallet>, EconomyError> {
        Ok(self
            .working
            .wallets
            .get(&id)
            .filter(|w| w.deleted_at.is_none())
            .cloned())
    }

    pub(crate) async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), EconomyError> {
        self.working.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    pub(crate) async fn insert_transaction(
        &mut self,
        entry: &Transaction,
    ) -> Result<(), EconomyError> {
        self.working.transactions.push(entry.clone());
        Ok(())
    }

    pub(crate) async fn update_transaction(
        &mut self,
        entry: &Transaction,
    ) -> Result<(), EconomyError> {
        #[cfg(test)]
        if self.fail_ledger_updates {
            return Err(EconomyError::PersistenceError(
                "injected ledger update failure".to_string(),
            ));
        }
        match self.working.transactions.iter_mut().find(|t| t.id == entry.id) {
            Some(slot) => {
                *slot = entry.clone();
                Ok(())
            }
            None => Err(EconomyError::PersistenceError(format!(
                "transaction {} does not exist",
                entry.id
            ))),
        }
    }

    pub(crate) async fn transaction_for_update(
        &mut self,
        wallet_id: WalletId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, EconomyError> {
        Ok(self.working.live_transaction(wallet_id, id).cloned())
    }

    pub(crate) async fn insert_session(&mut self, session: &GameSession) -> Result<(), EconomyError> {
        self.working.sessions.insert(session.id, session.clone());
        Ok(())
    }

    pub(crate) async fn active_sessions_for_update(
        &mut self,
        profile_id: ProfileId,
    ) -> Result<Vec<GameSession>, EconomyError> {
        Ok(self
            .working
            .sessions
            .values()
            .filter(|s| {
                s.profile_id == profile_id
                    && s.status == SessionStatus::Active
                    && s.deleted_at.is_none()
            })
            .cloned()
            .collect())
    }

    pub(crate) async fn session_for_update(
        &mut self,
        profile_id: ProfileId,
        id: SessionId,
    ) -> Result<Option<GameSession>, EconomyError> {
        Ok(self.working.live_session(profile_id, id).cloned())
    }

    pub(crate) async fn save_session(&mut self, session: &GameSession) -> Result<(), EconomyError> {
        self.working.sessions.insert(session.id, session.clone());
        Ok(())
    }

    pub(crate) async fn commit(self) -> Result<(), EconomyError> {
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ClientInfo, CurrencyType};

    #[tokio::test]
    async fn dropped_unit_discards_writes() {
        let store = MemoryStore::new();
        let wallet = Wallet::new(ProfileId::new());
        let Ok(()) = store.insert_wallet(&wallet).await else {
            panic!("insert failed");
        };

        {
            let mut unit = store.begin().await;
            let Ok(Some(mut locked)) = unit.wallet_for_update(wallet.id).await else {
                panic!("wallet missing");
            };
            locked.add_balance(CurrencyType::Coins, 500);
            let Ok(()) = unit.save_wallet(&locked).await else {
                panic!("save failed");
            };
        }

        let Ok(Some(reloaded)) = store.find_wallet_by_profile(wallet.profile_id).await else {
            panic!("wallet missing");
        };
        assert_eq!(reloaded.get_balance(CurrencyType::Coins), 0);
    }

    #[tokio::test]
    async fn committed_unit_is_visible() {
        let store = MemoryStore::new();
        let wallet = Wallet::new(ProfileId::new());
        let Ok(()) = store.insert_wallet(&wallet).await else {
            panic!("insert failed");
        };

        let mut unit = store.begin().await;
        let Ok(Some(mut locked)) = unit.wallet_for_update(wallet.id).await else {
            panic!("wallet missing");
        };
        locked.add_balance(CurrencyType::Gems, 3);
        let Ok(()) = unit.save_wallet(&locked).await else {
            panic!("save failed");
        };
        let Ok(()) = unit.commit().await else {
            panic!("commit failed");
        };

        let Ok(Some(reloaded)) = store.find_wallet_by_profile(wallet.profile_id).await else {
            panic!("wallet missing");
        };
        assert_eq!(reloaded.get_balance(CurrencyType::Gems), 3);
    }

    #[tokio::test]
    async fn duplicate_wallet_for_profile_is_rejected() {
        let store = MemoryStore::new();
        let profile_id = ProfileId::new();
        assert!(store.insert_wallet(&Wallet::new(profile_id)).await.is_ok());
        assert!(matches!(
            store.insert_wallet(&Wallet::new(profile_id)).await,
            Err(EconomyError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await;
        let first = User::new(
            "ana".into(),
            "Ana".into(),
            "ana@example.com".into(),
            "$argon2id$stub".into(),
        );
        let second = User::new(
            "ana".into(),
            "Other".into(),
            "other@example.com".into(),
            "$argon2id$stub".into(),
        );
        assert!(unit.insert_user(&first).await.is_ok());
        assert!(matches!(
            unit.insert_user(&second).await,
            Err(EconomyError::AlreadyExists(ref c)) if c == "users_username_key"
        ));
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_found_revoked() {
        let store = MemoryStore::new();
        let (token, _) = RefreshToken::issue(UserId::new(), chrono::Duration::days(7));
        let mut unit = store.begin().await;
        let Ok(()) = unit.insert_refresh_token(&token).await else {
            panic!("insert failed");
        };
        let Ok(Some(mut locked)) = unit.refresh_token_for_update(&token.token_hash).await else {
            panic!("token missing");
        };
        locked.revoke(Utc::now());
        let Ok(()) = unit.save_refresh_token(&locked).await else {
            panic!("save failed");
        };
        let Ok(()) = unit.commit().await else {
            panic!("commit failed");
        };

        let mut unit = store.begin().await;
        let Ok(Some(reloaded)) = unit.refresh_token_for_update(&token.token_hash).await else {
            panic!("token missing");
        };
        assert!(reloaded.revoked_at.is_some());
        assert!(unit.refresh_token_for_update("unknown").await.ok().flatten().is_none());
    }

    #[tokio::test]
    async fn sessions_list_newest_first_per_profile() {
        let store = MemoryStore::new();
        let profile_id = ProfileId::new();
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(2);
        let older = GameSession::start(profile_id, ClientInfo::default(), earlier);
        let newer = GameSession::start(profile_id, ClientInfo::default(), now);
        let foreign = GameSession::start(ProfileId::new(), ClientInfo::default(), now);

        let mut unit = store.begin().await;
        for session in [&older, &newer, &foreign] {
            let Ok(()) = unit.insert_session(session).await else {
                panic!("insert failed");
            };
        }
        let Ok(active) = unit.active_sessions_for_update(profile_id).await else {
            panic!("lookup failed");
        };
        assert_eq!(active.len(), 2);
        let Ok(()) = unit.commit().await else {
            panic!("commit failed");
        };

        let Ok((page, total)) = store.list_sessions(profile_id, 1, 0).await else {
            panic!("list failed");
        };
        assert_eq!(total, 2);
        assert_eq!(page.first().map(|s| s.id), Some(newer.id));
        assert!(store.find_session(profile_id, foreign.id).await.ok().flatten().is_none());
    }
}
