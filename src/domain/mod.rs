//! Domain layer: currencies, wallets, ledger entries, profiles, accounts,
//! and play sessions.
//!
//! Everything here is plain data plus the arithmetic and state-machine
//! rules that belong to it. Persistence and atomicity live in
//! [`crate::persistence`] and [`crate::service`].

pub mod account;
pub mod currency;
pub mod ids;
pub mod profile;
pub mod session;
pub mod transaction;
pub mod wallet;

pub use account::{ApiKey, RefreshToken, User};
pub use currency::{Balances, CurrencyType};
pub use ids::{ApiKeyId, ProfileId, RefreshTokenId, SessionId, TransactionId, UserId, WalletId};
pub use profile::GameProfile;
pub use session::{ActivityStatus, ClientInfo, GameSession, SessionStatus};
pub use transaction::{EntryDetails, Transaction, TransactionStatus, TransactionType};
pub use wallet::Wallet;

/// Open-schema JSON object used for stats, settings, and metadata.
///
/// Insertion-ordered; keys the service does not know about pass through
/// unchanged.
pub type JsonBag = serde_json::Map<String, serde_json::Value>;
