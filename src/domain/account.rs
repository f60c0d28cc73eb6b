//! User, API key, and refresh token records.
//!
//! API keys and refresh tokens are shown to the owner once, at creation.
//! Only the SHA-256 digest of the secret is stored; lookups hash the
//! presented value. Passwords are stored as Argon2id PHC strings.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::ids::{ApiKeyId, RefreshTokenId, UserId};
use crate::error::EconomyError;

/// Prefix marking key material issued by this service.
pub const API_KEY_PREFIX: &str = "gek_";

/// Prefix marking refresh tokens issued by this service.
pub const REFRESH_TOKEN_PREFIX: &str = "grt_";

/// Number of leading characters kept in clear for display.
const DISPLAY_PREFIX_LEN: usize = 12;

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Longest accepted password.
pub const MAX_PASSWORD_LEN: usize = 100;
const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Name shown to other players.
    pub display_name: String,
    /// Unique e-mail address.
    pub email: String,
    /// Argon2id PHC string of the password.
    pub password_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a new user record.
    #[must_use]
    pub fn new(
        username: String,
        display_name: String,
        email: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username,
            display_name,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Stored API key (digest only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    /// Record identifier.
    pub id: ApiKeyId,
    /// Owning user.
    pub user_id: UserId,
    /// Owner-chosen label.
    pub name: String,
    /// Hex-encoded SHA-256 of the key material.
    pub key_hash: String,
    /// First characters of the key material, for display.
    pub key_prefix: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Allowed requests per rate-limit window.
    pub rate_limit: u32,
    /// Whether the key may authenticate.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Issues a new key for `user_id`, returning the record and the
    /// plaintext key material.
    #[must_use]
    pub fn issue(
        user_id: UserId,
        name: String,
        rate_limit: u32,
        expires_at: DateTime<Utc>,
    ) -> (Self, String) {
        let secret = generate_key_material();
        let now = Utc::now();
        let key = Self {
            id: ApiKeyId::new(),
            user_id,
            name,
            key_hash: hash_key(&secret),
            key_prefix: secret.chars().take(DISPLAY_PREFIX_LEN).collect(),
            expires_at,
            last_used_at: None,
            rate_limit,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        (key, secret)
    }

    /// Whether the key has passed its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the key may authenticate at `now`.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.deleted_at.is_none() && !self.is_expired(now)
    }
}

/// Stored refresh token (digest only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    /// Record identifier.
    pub id: RefreshTokenId,
    /// Owning user.
    pub user_id: UserId,
    /// Hex-encoded SHA-256 of the token.
    pub token_hash: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Set once the token is rotated or logged out.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    /// Issues a token for `user_id` valid for `ttl`, returning the record
    /// and the plaintext token.
    #[must_use]
    pub fn issue(user_id: UserId, ttl: Duration) -> (Self, String) {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = format!("{REFRESH_TOKEN_PREFIX}{}", hex::encode(bytes));
        let now = Utc::now();
        let token = Self {
            id: RefreshTokenId::new(),
            user_id,
            token_hash: hash_key(&secret),
            expires_at: now + ttl,
            revoked_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        (token, secret)
    }

    /// Whether the token may be exchanged at `now`.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.deleted_at.is_none() && now < self.expires_at
    }

    /// Marks the token revoked. Revoking twice keeps the first instant.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(now);
            self.updated_at = now;
        }
    }
}

/// Hex-encoded SHA-256 digest of `key`.
#[must_use]
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn generate_key_material() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

/// Checks length and character classes: at least one digit, one upper-
/// and one lower-case letter, and one symbol from `!@#$%^&*()_+-=[]{}|;:,.<>?`.
///
/// # Errors
///
/// Returns [`EconomyError::InvalidRequest`] naming the first rule broken.
pub fn validate_password(password: &str) -> Result<(), EconomyError> {
    let len = password.chars().count();
    let rule = if len < MIN_PASSWORD_LEN {
        Some(format!("password must be at least {MIN_PASSWORD_LEN} characters"))
    } else if len > MAX_PASSWORD_LEN {
        Some(format!("password must be at most {MAX_PASSWORD_LEN} characters"))
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("password must contain a digit".to_string())
    } else if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        Some("password must contain a special character".to_string())
    } else if !password.chars().any(|c| c.is_ascii_uppercase()) {
        Some("password must contain an upper-case letter".to_string())
    } else if !password.chars().any(|c| c.is_ascii_lowercase()) {
        Some("password must contain a lower-case letter".to_string())
    } else {
        None
    };
    rule.map_or(Ok(()), |message| Err(EconomyError::InvalidRequest(message)))
}

/// Hashes `password` with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns [`EconomyError::Internal`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, EconomyError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EconomyError::Internal(format!("password hashing failed: {err}")))
}

/// Whether `password` matches the stored PHC string. A malformed stored
/// hash never matches.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_stores_digest_not_secret() {
        let (key, secret) = ApiKey::issue(
            UserId::new(),
            "launcher".to_string(),
            60,
            Utc::now() + Duration::days(1),
        );
        assert!(secret.starts_with(API_KEY_PREFIX));
        assert_eq!(secret.len(), API_KEY_PREFIX.len() + 64);
        assert_ne!(key.key_hash, secret);
        assert_eq!(key.key_hash, hash_key(&secret));
        assert!(secret.starts_with(&key.key_prefix));
    }

    #[test]
    fn issued_keys_are_unique() {
        let expires = Utc::now() + Duration::days(1);
        let (_, a) = ApiKey::issue(UserId::new(), "a".to_string(), 60, expires);
        let (_, b) = ApiKey::issue(UserId::new(), "b".to_string(), 60, expires);
        assert_ne!(a, b);
    }

    #[test]
    fn usability_checks_active_deleted_and_expiry() {
        let now = Utc::now();
        let (mut key, _) = ApiKey::issue(UserId::new(), "k".to_string(), 60, now + Duration::hours(1));
        assert!(key.is_usable(now));
        assert!(!key.is_usable(now + Duration::hours(2)));

        key.is_active = false;
        assert!(!key.is_usable(now));

        key.is_active = true;
        key.deleted_at = Some(now);
        assert!(!key.is_usable(now));
    }

    #[test]
    fn password_round_trip() {
        let Ok(stored) = hash_password("Sup3r!secret") else {
            panic!("hashing failed");
        };
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("Sup3r!secret", &stored));
        assert!(!verify_password("Sup3r!secreT", &stored));
        assert!(!verify_password("Sup3r!secret", "not-a-phc-string"));
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("Sup3r!secret").is_ok());
        for weak in ["S3!a", "supersecret1!", "SUPERSECRET1!", "Supersecret!", "Supersecret1"] {
            assert!(
                matches!(validate_password(weak), Err(EconomyError::InvalidRequest(_))),
                "{weak} must be rejected"
            );
        }
    }

    #[test]
    fn refresh_token_revocation() {
        let now = Utc::now();
        let (mut token, secret) = RefreshToken::issue(UserId::new(), Duration::days(7));
        assert!(secret.starts_with(REFRESH_TOKEN_PREFIX));
        assert_eq!(token.token_hash, hash_key(&secret));
        assert!(token.is_usable(now));
        assert!(!token.is_usable(now + Duration::days(8)));

        token.revoke(now);
        let first = token.revoked_at;
        token.revoke(now + Duration::seconds(5));
        assert_eq!(token.revoked_at, first);
        assert!(!token.is_usable(now));
    }
}
