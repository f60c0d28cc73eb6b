//! Data Transfer Objects for REST request/response serialization.
//!
//! Currencies, transaction types, and statuses travel as lowercase
//! strings; amounts are signed 64-bit integers in the currency's smallest
//! unit.

pub mod account_dto;
pub mod common_dto;
pub mod profile_dto;
pub mod session_dto;
pub mod transaction_dto;
pub mod wallet_dto;

pub use account_dto::*;
pub use common_dto::*;
pub use profile_dto::*;
pub use session_dto::*;
pub use transaction_dto::*;
pub use wallet_dto::*;
