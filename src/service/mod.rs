//! Service layer: business logic orchestration.
//!
//! [`EconomyService`] owns every balance change and its ledger entry.
//! [`WalletService`] and [`ProfileService`] manage wallet and profile
//! lifecycles, [`SessionService`] tracks play sessions, and
//! [`AccountService`] handles users, API keys, password login, and request
//! authentication.

pub mod account_service;
pub mod economy_service;
pub mod profile_service;
pub mod session_service;
pub mod wallet_service;

pub use account_service::{
    AccountService, ApiKeyChanges, Caller, Credential, IssuedKey, Registration, TokenPair,
};
pub use economy_service::{EconomyService, LedgerOutcome, TransferOutcome};
pub use profile_service::{ProfileService, XpOutcome};
pub use session_service::SessionService;
pub use wallet_service::WalletService;
