//! # economy-gateway
//!
//! REST gateway for game accounts, player progression, and a
//! multi-currency wallet ledger.
//!
//! Every balance change is paired with a ledger entry inside one storage
//! unit of work, so a wallet balance always equals the sum of its
//! completed entries. Wallet rows are locked for the duration of a
//! change; transfers lock both wallets in ascending id order.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, X-API-Key or Bearer token)
//!     │
//!     ├── REST Handlers + Authenticated extractor (api/)
//!     │
//!     ├── AccountService / ProfileService / WalletService / SessionService (service/)
//!     ├── EconomyService: ledger engine (service/)
//!     │
//!     ├── Domain: Wallet, Transaction, GameProfile, GameSession, ApiKey (domain/)
//!     │
//!     └── Store: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod openapi;
pub mod persistence;
pub mod rate_limit;
pub mod service;
pub mod token;
