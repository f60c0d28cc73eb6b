//! Database row types and their conversion into domain types.
//!
//! Enumerations are stored as short strings and JSON bags as `JSONB`;
//! a row that fails to decode is reported as a persistence error.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ApiKey, Balances, ClientInfo, GameProfile, GameSession, JsonBag, RefreshToken, Transaction,
    User, Wallet,
};
use crate::error::EconomyError;

/// Converts a `JSONB` value into a bag; `NULL` or non-objects become empty.
pub(crate) fn bag_from_json(value: serde_json::Value) -> JsonBag {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonBag::new(),
    }
}

/// Wraps a bag for binding as `JSONB`.
pub(crate) fn bag_to_json(bag: &JsonBag) -> serde_json::Value {
    serde_json::Value::Object(bag.clone())
}

fn corrupt(table: &str, detail: impl std::fmt::Display) -> EconomyError {
    EconomyError::PersistenceError(format!("corrupt {table} row: {detail}"))
}

/// A row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// Primary key.
    pub id: Uuid,
    /// Unique login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Unique e-mail.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            username: row.username,
            display_name: row.display_name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// A row of the `api_keys` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Label.
    pub name: String,
    /// SHA-256 hex digest of the key material.
    pub key_hash: String,
    /// Display prefix.
    pub key_prefix: String,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
    /// Last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Requests per window.
    pub rate_limit: i32,
    /// Active flag.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApiKeyRow> for ApiKey {
    type Error = EconomyError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let rate_limit = u32::try_from(row.rate_limit)
            .map_err(|_| corrupt("api_keys", format!("rate_limit {}", row.rate_limit)))?;
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            name: row.name,
            key_hash: row.key_hash,
            key_prefix: row.key_prefix,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
            rate_limit,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// A row of the `refresh_tokens` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// SHA-256 hex digest of the token.
    pub token_hash: String,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
    /// Revocation instant.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// A row of the `game_profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Level.
    pub level: i32,
    /// Cumulative XP.
    pub xp: i64,
    /// Active flag.
    pub is_active: bool,
    /// Last login.
    pub last_login: Option<DateTime<Utc>>,
    /// Stats bag.
    pub stats: serde_json::Value,
    /// Settings bag.
    pub settings: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for GameProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            level: row.level,
            xp: row.xp,
            is_active: row.is_active,
            last_login: row.last_login,
            stats: bag_from_json(row.stats),
            settings: bag_from_json(row.settings),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Leaderboard query row: profile columns plus the owner's username.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaderboardRow {
    /// Profile columns.
    #[sqlx(flatten)]
    pub profile: ProfileRow,
    /// Owner's username.
    pub username: String,
}

/// A row of the `wallets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning profile.
    pub game_profile_id: Uuid,
    /// Coins balance.
    pub coins_balance: i64,
    /// Gems balance.
    pub gems_balance: i64,
    /// Tokens balance.
    pub tokens_balance: i64,
    /// Lock flag.
    pub is_locked: bool,
    /// Lock reason.
    pub lock_reason: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            id: row.id.into(),
            profile_id: row.game_profile_id.into(),
            balances: Balances::new(row.coins_balance, row.gems_balance, row.tokens_balance),
            is_locked: row.is_locked,
            lock_reason: row.lock_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// A row of the `transactions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning wallet.
    pub wallet_id: Uuid,
    /// Type discriminator (e.g. `"earn"`).
    #[sqlx(rename = "type")]
    pub kind: String,
    /// Status discriminator (e.g. `"completed"`).
    pub status: String,
    /// Currency discriminator (e.g. `"coins"`).
    pub currency: String,
    /// Signed amount.
    pub amount: i64,
    /// Balance before.
    pub balance_before: i64,
    /// Balance after.
    pub balance_after: i64,
    /// Description.
    pub description: String,
    /// Reference.
    pub reference: String,
    /// Category.
    pub category: String,
    /// Metadata bag.
    pub metadata: serde_json::Value,
    /// Counterpart wallet of a transfer leg.
    pub to_wallet_id: Option<Uuid>,
    /// Reversing entry.
    pub reversed_by_id: Option<Uuid>,
    /// Reversed entry.
    pub reverses_id: Option<Uuid>,
    /// Terminal-status timestamp.
    pub processed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = EconomyError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            wallet_id: row.wallet_id.into(),
            kind: row.kind.parse().map_err(|e| corrupt("transactions", e))?,
            status: row.status.parse().map_err(|e| corrupt("transactions", e))?,
            currency: row.currency.parse().map_err(|e| corrupt("transactions", e))?,
            amount: row.amount,
            balance_before: row.balance_before,
            balance_after: row.balance_after,
            description: row.description,
            category: row.category,
            reference: row.reference,
            metadata: bag_from_json(row.metadata),
            to_wallet_id: row.to_wallet_id.map(Into::into),
            reversed_by: row.reversed_by_id.map(Into::into),
            reverses: row.reverses_id.map(Into::into),
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// A row of the `game_sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameSessionRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning profile.
    pub game_profile_id: Uuid,
    /// Status discriminator (e.g. `"active"`).
    pub status: String,
    /// Start instant.
    pub started_at: DateTime<Utc>,
    /// Last recorded activity.
    pub last_activity: DateTime<Utc>,
    /// End instant.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds played.
    pub duration_secs: i64,
    /// Client address.
    pub ip_address: String,
    /// Client user agent.
    pub user_agent: String,
    /// Platform label.
    pub platform: String,
    /// Recorded activities.
    pub actions_count: i32,
    /// Session data bag.
    pub session_data: serde_json::Value,
    /// Validity flag.
    pub is_valid: bool,
    /// Termination reason.
    pub invalid_reason: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<GameSessionRow> for GameSession {
    type Error = EconomyError;

    fn try_from(row: GameSessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            profile_id: row.game_profile_id.into(),
            status: row.status.parse().map_err(|e| corrupt("game_sessions", e))?,
            started_at: row.started_at,
            last_activity: row.last_activity,
            ended_at: row.ended_at,
            duration_secs: row.duration_secs,
            client: ClientInfo {
                ip_address: row.ip_address,
                user_agent: row.user_agent,
                platform: row.platform,
            },
            actions_count: row.actions_count,
            session_data: bag_from_json(row.session_data),
            is_valid: row.is_valid,
            invalid_reason: row.invalid_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CurrencyType, TransactionStatus, TransactionType};

    fn row(kind: &str) -> TransactionRow {
        let now = Utc::now();
        TransactionRow {
            id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            kind: kind.to_string(),
            status: "completed".to_string(),
            currency: "gems".to_string(),
            amount: -5,
            balance_before: 10,
            balance_after: 5,
            description: String::new(),
            reference: String::new(),
            category: "shop".to_string(),
            metadata: serde_json::json!({"sku": "sword"}),
            to_wallet_id: None,
            reversed_by_id: None,
            reverses_id: None,
            processed_at: Some(now),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn transaction_row_decodes_enumerations() {
        let Ok(entry) = Transaction::try_from(row("spend")) else {
            panic!("decode failed");
        };
        assert_eq!(entry.kind, TransactionType::Spend);
        assert_eq!(entry.status, TransactionStatus::Completed);
        assert_eq!(entry.currency, CurrencyType::Gems);
        assert_eq!(entry.metadata_value("sku"), Some(&serde_json::json!("sword")));
    }

    #[test]
    fn unknown_type_is_a_persistence_error() {
        assert!(matches!(
            Transaction::try_from(row("loan")),
            Err(EconomyError::PersistenceError(_))
        ));
    }

    #[test]
    fn unknown_session_status_is_a_persistence_error() {
        let now = Utc::now();
        let row = GameSessionRow {
            id: Uuid::new_v4(),
            game_profile_id: Uuid::new_v4(),
            status: "paused".to_string(),
            started_at: now,
            last_activity: now,
            ended_at: None,
            duration_secs: 0,
            ip_address: String::new(),
            user_agent: String::new(),
            platform: "pc".to_string(),
            actions_count: 0,
            session_data: serde_json::Value::Null,
            is_valid: true,
            invalid_reason: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(matches!(
            GameSession::try_from(row),
            Err(EconomyError::PersistenceError(_))
        ));
    }

    #[test]
    fn null_bag_becomes_empty() {
        assert!(bag_from_json(serde_json::Value::Null).is_empty());
    }
}
