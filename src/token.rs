//! HS256 access tokens.
//!
//! Access tokens are short-lived JWTs whose `sub` claim is the user id.
//! They are never stored; revoking access means revoking the refresh
//! token and waiting out the access token lifetime.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::EconomyError;

/// Token type reported to clients.
pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: uuid::Uuid,
    iat: i64,
    exp: i64,
}

/// A signed access token and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Compact JWT.
    pub token: String,
    /// Seconds until expiry, counted from issuance.
    pub expires_in: i64,
}

/// Signs and verifies access tokens with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Creates a signer over `secret`.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Creates a signer over a fresh random secret.
    #[must_use]
    pub fn ephemeral(ttl: Duration) -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret, ttl)
    }

    /// Issues a token for `user_id` now.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Internal`] if signing fails.
    pub fn issue(&self, user_id: UserId) -> Result<AccessToken, EconomyError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issues a token for `user_id` as if it were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Internal`] if signing fails.
    pub fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<AccessToken, EconomyError> {
        let claims = Claims {
            sub: *user_id.as_uuid(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| EconomyError::Internal(format!("token signing failed: {err}")))?;
        Ok(AccessToken {
            token,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Verifies signature and expiry and returns the subject.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Unauthorized`] for malformed, tampered, or
    /// expired tokens.
    pub fn verify(&self, token: &str) -> Result<UserId, EconomyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| UserId::from_uuid(data.claims.sub))
            .map_err(|err| {
                tracing::debug!(error = %err, "access token rejected");
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        EconomyError::Unauthorized("access token expired".to_string())
                    }
                    _ => EconomyError::Unauthorized("invalid access token".to_string()),
                }
            })
    }
}
