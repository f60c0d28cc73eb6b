//! Type-safe entity identifiers.
//!
//! Every persisted entity is keyed by a UUID v4 wrapped in its own newtype
//! so that, for example, a [`WalletId`] can never be passed where a
//! [`ProfileId`] is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wraps an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user.
    UserId
);

entity_id!(
    /// Identifier of an API key record (not the key material itself).
    ApiKeyId
);

entity_id!(
    /// Identifier of a game profile. One profile per user.
    ProfileId
);

entity_id!(
    /// Identifier of a wallet. One wallet per game profile.
    WalletId
);

entity_id!(
    /// Identifier of a ledger entry.
    TransactionId
);

entity_id!(
    /// Identifier of a stored refresh token (not the token itself).
    RefreshTokenId
);

entity_id!(
    /// Identifier of a play session.
    SessionId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(WalletId::new(), WalletId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = format!("{}", TransactionId::new());
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let uuid = uuid::Uuid::new_v4();
        let id = UserId::from_uuid(uuid);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn ordering_follows_uuid_ordering() {
        let low = WalletId::from_uuid(uuid::Uuid::nil());
        let high = WalletId::from_uuid(uuid::Uuid::from_u128(u128::MAX));
        assert!(low < high);
        assert_eq!(uuid::Uuid::from(high), uuid::Uuid::from_u128(u128::MAX));
    }
}
