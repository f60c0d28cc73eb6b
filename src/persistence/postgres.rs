//! PostgreSQL implementation of the persistence layer.
//!
//! Soft-deleted rows are invisible to every query. Units of work wrap a
//! `sqlx` transaction and take row locks with `SELECT ... FOR UPDATE`.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};

use super::models::{
    bag_to_json, ApiKeyRow, GameSessionRow, LeaderboardRow, ProfileRow, RefreshTokenRow,
    TransactionRow, UserRow, WalletRow,
};
use super::{HistoryFilter, LeaderboardEntry};
use crate::domain::{
    ApiKey, ApiKeyId, CurrencyType, GameProfile, GameSession, ProfileId, RefreshToken, SessionId,
    Transaction, TransactionId, User, UserId, Wallet, WalletId,
};
use crate::error::EconomyError;

const USER_COLUMNS: &str = "id, username, display_name, email, password_hash, created_at, \
     updated_at, deleted_at";

const API_KEY_COLUMNS: &str = "id, user_id, name, key_hash, key_prefix, expires_at, last_used_at, \
     rate_limit, is_active, created_at, updated_at, deleted_at";

const REFRESH_TOKEN_COLUMNS: &str =
    "id, user_id, token_hash, expires_at, revoked_at, created_at, updated_at, deleted_at";

const PROFILE_COLUMNS: &str = "id, user_id, level, xp, is_active, last_login, stats, settings, \
     created_at, updated_at, deleted_at";

const WALLET_COLUMNS: &str = "id, game_profile_id, coins_balance, gems_balance, tokens_balance, \
     is_locked, lock_reason, created_at, updated_at, deleted_at";

const TRANSACTION_COLUMNS: &str = "id, wallet_id, type, status, currency, amount, balance_before, \
     balance_after, description, reference, category, metadata, to_wallet_id, reversed_by_id, \
     reverses_id, processed_at, created_at, updated_at, deleted_at";

const SESSION_COLUMNS: &str = "id, game_profile_id, status, started_at, last_activity, ended_at, \
     duration_secs, ip_address, user_agent, platform, actions_count, session_data, is_valid, \
     invalid_reason, created_at, updated_at, deleted_at";

// Shared by the page and count queries; $1 is the wallet, $2..$4 the filters.
const HISTORY_PREDICATE: &str = "wallet_id = $1 AND deleted_at IS NULL \
     AND ($2::text IS NULL OR type = $2) \
     AND ($3::text IS NULL OR currency = $3) \
     AND ($4::text IS NULL OR status = $4)";

fn rate_limit_column(key: &ApiKey) -> i32 {
    i32::try_from(key.rate_limit).unwrap_or(i32::MAX)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// PostgreSQL-backed [`super::Store`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<PostgresUnit, EconomyError> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnit { tx })
    }

    pub(crate) async fn ping(&self) -> Result<(), EconomyError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn find_user(&self, id: UserId) -> Result<Option<User>, EconomyError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    pub(crate) async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, EconomyError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    pub(crate) async fn update_user(&self, user: &User) -> Result<(), EconomyError> {
        sqlx::query(
            "UPDATE users SET display_name = $2, email = $3, updated_at = $4 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user.id.as_uuid())
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) async fn find_api_key_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<ApiKey>, EconomyError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1 AND deleted_at IS NULL"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApiKey::try_from).transpose()
    }

    pub(crate) async fn list_api_keys(&self, user_id: UserId) -> Result<Vec<ApiKey>, EconomyError> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ApiKey::try_from).collect()
    }

    pub(crate) async fn find_api_key(
        &self,
        user_id: UserId,
        id: ApiKeyId,
    ) -> Result<Option<ApiKey>, EconomyError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApiKey::try_from).transpose()
    }

    pub(crate) async fn update_api_key(&self, key: &ApiKey) -> Result<(), EconomyError> {
        sqlx::query(
            "UPDATE api_keys SET name = $2, rate_limit = $3, is_active = $4, expires_at = $5, \
             updated_at = $6, deleted_at = $7 WHERE id = $1",
        )
        .bind(key.id.as_uuid())
        .bind(&key.name)
        .bind(rate_limit_column(key))
        .bind(key.is_active)
        .bind(key.expires_at)
        .bind(key.updated_at)
        .bind(key.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) async fn touch_api_key(
        &self,
        id: ApiKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), EconomyError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn insert_profile(&self, profile: &GameProfile) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO game_profiles ({PROFILE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(profile.id.as_uuid())
        .bind(profile.user_id.as_uuid())
        .bind(profile.level)
        .bind(profile.xp)
        .bind(profile.is_active)
        .bind(profile.last_login)
        .bind(bag_to_json(&profile.stats))
        .bind(bag_to_json(&profile.settings))
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .bind(profile.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) async fn find_profile_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<GameProfile>, EconomyError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM game_profiles \
             WHERE user_id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(GameProfile::from))
    }

    pub(crate) async fn leaderboard(
        &self,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT p.id, p.user_id, p.level, p.xp, p.is_active, p.last_login, p.stats, \
             p.settings, p.created_at, p.updated_at, p.deleted_at, u.username \
             FROM game_profiles p JOIN users u ON u.id = p.user_id \
             WHERE p.is_active AND p.deleted_at IS NULL AND u.deleted_at IS NULL \
             ORDER BY p.level DESC, p.xp DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| LeaderboardEntry {
                profile: row.profile.into(),
                username: row.username,
            })
            .collect())
    }

    pub(crate) async fn insert_wallet(&self, wallet: &Wallet) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO wallets ({WALLET_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(wallet.id.as_uuid())
        .bind(wallet.profile_id.as_uuid())
        .bind(wallet.get_balance(CurrencyType::Coins))
        .bind(wallet.get_balance(CurrencyType::Gems))
        .bind(wallet.get_balance(CurrencyType::Tokens))
        .bind(wallet.is_locked)
        .bind(&wallet.lock_reason)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .bind(wallet.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) async fn find_wallet_by_profile(
        &self,
        profile_id: ProfileId,
    ) -> Result<Option<Wallet>, EconomyError> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets \
             WHERE game_profile_id = $1 AND deleted_at IS NULL"
        ))
        .bind(profile_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Wallet::from))
    }

    pub(crate) async fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: &HistoryFilter,
    ) -> Result<(Vec<Transaction>, u64), EconomyError> {
        let kind = filter.kind.map(|k| k.as_str());
        let currency = filter.currency.map(|c| c.as_str());
        let status = filter.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM transactions WHERE {HISTORY_PREDICATE}"
        ))
        .bind(wallet_id.as_uuid())
        .bind(kind)
        .bind(currency)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE {HISTORY_PREDICATE} \
             ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
        ))
        .bind(wallet_id.as_uuid())
        .bind(kind)
        .bind(currency)
        .bind(status)
        .bind(i64::from(filter.limit))
        .bind(to_i64(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        let page = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((page, to_u64(total)))
    }

    pub(crate) async fn find_transaction(
        &self,
        wallet_id: WalletId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, EconomyError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE id = $1 AND wallet_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .bind(wallet_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Transaction::try_from).transpose()
    }

    pub(crate) async fn find_session(
        &self,
        profile_id: ProfileId,
        id: SessionId,
    ) -> Result<Option<GameSession>, EconomyError> {
        let row = sqlx::query_as::<_, GameSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions \
             WHERE id = $1 AND game_profile_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .bind(profile_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(GameSession::try_from).transpose()
    }

    pub(crate) async fn list_sessions(
        &self,
        profile_id: ProfileId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<GameSession>, u64), EconomyError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM game_sessions WHERE game_profile_id = $1 AND deleted_at IS NULL",
        )
        .bind(profile_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, GameSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions \
             WHERE game_profile_id = $1 AND deleted_at IS NULL \
             ORDER BY started_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(profile_id.as_uuid())
        .bind(i64::from(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        let page = rows
            .into_iter()
            .map(GameSession::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((page, to_u64(total)))
    }
}

/// Unit of work over a PostgreSQL transaction.
///
/// Dropping the unit without [`PostgresUnit::commit`] rolls back.
pub struct PostgresUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl fmt::Debug for PostgresUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresUnit").finish_non_exhaustive()
    }
}

impl PostgresUnit {
    pub(crate) async fn insert_user(&mut self, user: &User) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn insert_api_key(&mut self, key: &ApiKey) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO api_keys ({API_KEY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(key.id.as_uuid())
        .bind(key.user_id.as_uuid())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(key.expires_at)
        .bind(key.last_used_at)
        .bind(rate_limit_column(key))
        .bind(key.is_active)
        .bind(key.created_at)
        .bind(key.updated_at)
        .bind(key.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn insert_refresh_token(
        &mut self,
        token: &RefreshToken,
    ) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO refresh_tokens ({REFRESH_TOKEN_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(token.created_at)
        .bind(token.updated_at)
        .bind(token.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn refresh_token_for_update(
        &mut self,
        hash: &str,
    ) -> Result<Option<RefreshToken>, EconomyError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            "SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE token_hash = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(hash)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(RefreshToken::from))
    }

    pub(crate) async fn save_refresh_token(
        &mut self,
        token: &RefreshToken,
    ) -> Result<(), EconomyError> {
        sqlx::query("UPDATE refresh_tokens SET revoked_at = $2, updated_at = $3 WHERE id = $1")
            .bind(token.id.as_uuid())
            .bind(token.revoked_at)
            .bind(token.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub(crate) async fn profile_for_update(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<GameProfile>, EconomyError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM game_profiles \
             WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(GameProfile::from))
    }

    pub(crate) async fn save_profile(&mut self, profile: &GameProfile) -> Result<(), EconomyError> {
        sqlx::query(
            "UPDATE game_profiles SET level = $2, xp = $3, is_active = $4, last_login = $5, \
             stats = $6, settings = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(profile.id.as_uuid())
        .bind(profile.level)
        .bind(profile.xp)
        .bind(profile.is_active)
        .bind(profile.last_login)
        .bind(bag_to_json(&profile.stats))
        .bind(bag_to_json(&profile.settings))
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn wallet_for_update(
        &mut self,
        id: WalletId,
    ) -> Result<Option<Wallet>, EconomyError> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Wallet::from))
    }

    pub(crate) async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), EconomyError> {
        sqlx::query(
            "UPDATE wallets SET coins_balance = $2, gems_balance = $3, tokens_balance = $4, \
             is_locked = $5, lock_reason = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(wallet.id.as_uuid())
        .bind(wallet.get_balance(CurrencyType::Coins))
        .bind(wallet.get_balance(CurrencyType::Gems))
        .bind(wallet.get_balance(CurrencyType::Tokens))
        .bind(wallet.is_locked)
        .bind(&wallet.lock_reason)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn insert_transaction(
        &mut self,
        entry: &Transaction,
    ) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        ))
        .bind(entry.id.as_uuid())
        .bind(entry.wallet_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.status.as_str())
        .bind(entry.currency.as_str())
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(&entry.description)
        .bind(&entry.reference)
        .bind(&entry.category)
        .bind(bag_to_json(&entry.metadata))
        .bind(entry.to_wallet_id.map(|w| *w.as_uuid()))
        .bind(entry.reversed_by.map(|t| *t.as_uuid()))
        .bind(entry.reverses.map(|t| *t.as_uuid()))
        .bind(entry.processed_at)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn update_transaction(
        &mut self,
        entry: &Transaction,
    ) -> Result<(), EconomyError> {
        let result = sqlx::query(
            "UPDATE transactions SET status = $2, balance_before = $3, balance_after = $4, \
             metadata = $5, reversed_by_id = $6, processed_at = $7, updated_at = $8 \
             WHERE id = $1",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(bag_to_json(&entry.metadata))
        .bind(entry.reversed_by.map(|t| *t.as_uuid()))
        .bind(entry.processed_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EconomyError::PersistenceError(format!(
                "transaction {} does not exist",
                entry.id
            )));
        }
        Ok(())
    }

    pub(crate) async fn transaction_for_update(
        &mut self,
        wallet_id: WalletId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, EconomyError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE id = $1 AND wallet_id = $2 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(wallet_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Transaction::try_from).transpose()
    }

    pub(crate) async fn insert_session(&mut self, session: &GameSession) -> Result<(), EconomyError> {
        sqlx::query(&format!(
            "INSERT INTO game_sessions ({SESSION_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(session.id.as_uuid())
        .bind(session.profile_id.as_uuid())
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(session.last_activity)
        .bind(session.ended_at)
        .bind(session.duration_secs)
        .bind(&session.client.ip_address)
        .bind(&session.client.user_agent)
        .bind(&session.client.platform)
        .bind(session.actions_count)
        .bind(bag_to_json(&session.session_data))
        .bind(session.is_valid)
        .bind(&session.invalid_reason)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.deleted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn active_sessions_for_update(
        &mut self,
        profile_id: ProfileId,
    ) -> Result<Vec<GameSession>, EconomyError> {
        let rows = sqlx::query_as::<_, GameSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions \
             WHERE game_profile_id = $1 AND status = 'active' AND deleted_at IS NULL \
             FOR UPDATE"
        ))
        .bind(profile_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(GameSession::try_from).collect()
    }

    pub(crate) async fn session_for_update(
        &mut self,
        profile_id: ProfileId,
        id: SessionId,
    ) -> Result<Option<GameSession>, EconomyError> {
        let row = sqlx::query_as::<_, GameSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions \
             WHERE id = $1 AND game_profile_id = $2 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(profile_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(GameSession::try_from).transpose()
    }

    pub(crate) async fn save_session(&mut self, session: &GameSession) -> Result<(), EconomyError> {
        sqlx::query(
            "UPDATE game_sessions SET status = $2, last_activity = $3, ended_at = $4, \
             duration_secs = $5, actions_count = $6, session_data = $7, is_valid = $8, \
             invalid_reason = $9, updated_at = $10 WHERE id = $1",
        )
        .bind(session.id.as_uuid())
        .bind(session.status.as_str())
        .bind(session.last_activity)
        .bind(session.ended_at)
        .bind(session.duration_secs)
        .bind(session.actions_count)
        .bind(bag_to_json(&session.session_data))
        .bind(session.is_valid)
        .bind(&session.invalid_reason)
        .bind(session.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn commit(self) -> Result<(), EconomyError> {
        self.tx.commit().await?;
        Ok(())
    }
}
