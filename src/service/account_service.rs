//! Account service: registration, user profile, API keys, password login,
//! and authentication.
//!
//! Two credentials are accepted. API keys are long-lived and carry their
//! own request budget. Access tokens come from a password login, live for
//! an hour by default, and share the configured default budget per user.
//! Each refresh token can be exchanged once; exchanging it revokes it and
//! issues a replacement.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::account::{hash_key, hash_password, validate_password, verify_password};
use crate::domain::{ApiKey, ApiKeyId, RefreshToken, User, UserId};
use crate::error::EconomyError;
use crate::persistence::Store;
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::token::{TOKEN_TYPE, TokenSigner};

const MAX_USERNAME_LEN: usize = 50;
const MAX_NAME_LEN: usize = 100;
const FIRST_KEY_NAME: &str = "default";

/// Input for [`AccountService::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Unique login name.
    pub username: String,
    /// Display name; the username is used when empty.
    pub display_name: String,
    /// Unique e-mail.
    pub email: String,
    /// Plaintext password; only its Argon2id hash is stored.
    pub password: String,
}

/// Changes accepted by [`AccountService::update_api_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeyChanges {
    /// New label.
    pub name: Option<String>,
    /// New per-window request budget.
    pub rate_limit: Option<u32>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
    /// New expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A freshly issued key: the stored record plus the one-time plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKey {
    /// Stored record.
    pub key: ApiKey,
    /// Plaintext key material. Not recoverable later.
    pub secret: String,
}

/// How a request proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// An `X-API-Key` header.
    ApiKey(ApiKeyId),
    /// A bearer access token.
    AccessToken,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// The owning user.
    pub user: User,
    /// The credential the request was made with.
    pub credential: Credential,
}

/// Result of a login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,
    /// Opaque single-use refresh token.
    pub refresh_token: String,
    /// Always `"Bearer"`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Account and credential management.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: Store,
    limiter: Arc<dyn RateLimiter>,
    default_rate_limit: u32,
    key_ttl: Duration,
    tokens: TokenSigner,
    refresh_ttl: Duration,
}

impl AccountService {
    /// Creates a new `AccountService`.
    #[must_use]
    pub fn new(
        store: Store,
        limiter: Arc<dyn RateLimiter>,
        default_rate_limit: u32,
        key_ttl: Duration,
        tokens: TokenSigner,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            limiter,
            default_rate_limit,
            key_ttl,
            tokens,
            refresh_ttl,
        }
    }

    /// Registers a user and issues their first API key.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for a blank or overlong
    /// username, a malformed e-mail, or a weak password,
    /// [`EconomyError::AlreadyExists`] when the username or e-mail is
    /// taken, or a persistence error.
    pub async fn register(&self, registration: Registration) -> Result<(User, IssuedKey), EconomyError> {
        let username = registration.username.trim().to_string();
        validate_username(&username)?;
        let email = normalize_email(&registration.email)?;
        let display_name = match registration.display_name.trim() {
            "" => username.clone(),
            name => name.to_string(),
        };
        validate_len("display_name", &display_name, MAX_NAME_LEN)?;
        validate_password(&registration.password)?;
        let password_hash = blocking(move || hash_password(&registration.password)).await??;

        let user = User::new(username, display_name, email, password_hash);
        let (key, secret) = ApiKey::issue(
            user.id,
            FIRST_KEY_NAME.to_string(),
            self.default_rate_limit,
            Utc::now() + self.key_ttl,
        );

        let mut unit = self.store.begin().await?;
        unit.insert_user(&user).await.map_err(describe_conflict)?;
        unit.insert_api_key(&key).await?;
        unit.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok((user, IssuedKey { key, secret }))
    }

    /// Loads the user.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::UserNotFound`] or a persistence error.
    pub async fn me(&self, user_id: UserId) -> Result<User, EconomyError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(EconomyError::UserNotFound(user_id))
    }

    /// Updates display name and/or e-mail.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for invalid values,
    /// [`EconomyError::AlreadyExists`] for a taken e-mail,
    /// [`EconomyError::UserNotFound`], or a persistence error.
    pub async fn update_me(
        &self,
        user_id: UserId,
        display_name: Option<String>,
        email: Option<String>,
    ) -> Result<User, EconomyError> {
        let mut user = self.me(user_id).await?;
        if let Some(name) = display_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(EconomyError::InvalidRequest(
                    "display_name must not be empty".to_string(),
                ));
            }
            validate_len("display_name", &name, MAX_NAME_LEN)?;
            user.display_name = name;
        }
        if let Some(email) = email {
            user.email = normalize_email(&email)?;
        }
        user.updated_at = Utc::now();
        self.store
            .update_user(&user)
            .await
            .map_err(describe_conflict)?;
        Ok(user)
    }

    /// Issues an additional key.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for a blank name, a zero
    /// rate limit, or an expiry in the past, or a persistence error.
    pub async fn create_api_key(
        &self,
        user_id: UserId,
        name: &str,
        rate_limit: Option<u32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedKey, EconomyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EconomyError::InvalidRequest("name must not be empty".to_string()));
        }
        validate_len("name", name, MAX_NAME_LEN)?;
        let rate_limit = rate_limit.unwrap_or(self.default_rate_limit);
        validate_rate_limit(rate_limit)?;
        let now = Utc::now();
        let expires_at = expires_at.unwrap_or(now + self.key_ttl);
        if expires_at <= now {
            return Err(EconomyError::InvalidRequest(
                "expires_at must be in the future".to_string(),
            ));
        }

        let (key, secret) = ApiKey::issue(user_id, name.to_string(), rate_limit, expires_at);
        let mut unit = self.store.begin().await?;
        unit.insert_api_key(&key).await?;
        unit.commit().await?;

        tracing::info!(%user_id, api_key_id = %key.id, prefix = %key.key_prefix, "api key created");
        Ok(IssuedKey { key, secret })
    }

    /// The user's keys, newest first.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn list_api_keys(&self, user_id: UserId) -> Result<Vec<ApiKey>, EconomyError> {
        self.store.list_api_keys(user_id).await
    }

    /// Applies `changes` to one of the user's keys.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ApiKeyNotFound`],
    /// [`EconomyError::InvalidRequest`] for invalid values, or a
    /// persistence error.
    pub async fn update_api_key(
        &self,
        user_id: UserId,
        id: ApiKeyId,
        changes: ApiKeyChanges,
    ) -> Result<ApiKey, EconomyError> {
        let mut key = self
            .store
            .find_api_key(user_id, id)
            .await?
            .ok_or(EconomyError::ApiKeyNotFound(id))?;
        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(EconomyError::InvalidRequest("name must not be empty".to_string()));
            }
            validate_len("name", &name, MAX_NAME_LEN)?;
            key.name = name;
        }
        if let Some(rate_limit) = changes.rate_limit {
            validate_rate_limit(rate_limit)?;
            key.rate_limit = rate_limit;
        }
        if let Some(active) = changes.is_active {
            key.is_active = active;
        }
        if let Some(expires_at) = changes.expires_at {
            key.expires_at = expires_at;
        }
        key.updated_at = Utc::now();
        self.store.update_api_key(&key).await?;
        Ok(key)
    }

    /// Soft-deletes one of the user's keys; it stops authenticating at
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ApiKeyNotFound`] or a persistence error.
    pub async fn delete_api_key(&self, user_id: UserId, id: ApiKeyId) -> Result<(), EconomyError> {
        let mut key = self
            .store
            .find_api_key(user_id, id)
            .await?
            .ok_or(EconomyError::ApiKeyNotFound(id))?;
        let now = Utc::now();
        key.is_active = false;
        key.deleted_at = Some(now);
        key.updated_at = now;
        self.store.update_api_key(&key).await?;
        tracing::info!(%user_id, api_key_id = %id, "api key deleted");
        Ok(())
    }

    /// Resolves presented key material to a caller.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Unauthorized`] for unknown, inactive,
    /// deleted, or expired keys and for keys whose owner is gone,
    /// [`EconomyError::RateLimited`] when the key's budget for the current
    /// window is spent, or a persistence error.
    pub async fn authenticate(&self, presented: &str) -> Result<Caller, EconomyError> {
        let presented = presented.trim();
        if presented.is_empty() {
            return Err(EconomyError::Unauthorized("missing api key".to_string()));
        }
        let Some(key) = self.store.find_api_key_by_hash(&hash_key(presented)).await? else {
            return Err(EconomyError::Unauthorized("invalid api key".to_string()));
        };
        let now = Utc::now();
        if key.is_expired(now) {
            return Err(EconomyError::Unauthorized("api key expired".to_string()));
        }
        if !key.is_usable(now) {
            return Err(EconomyError::Unauthorized("api key inactive".to_string()));
        }

        if let RateDecision::Limited { retry_after } =
            self.limiter.check(&key.id.to_string(), key.rate_limit)
        {
            tracing::warn!(api_key_id = %key.id, "rate limit exceeded");
            return Err(EconomyError::RateLimited {
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            });
        }

        self.store.touch_api_key(key.id, now).await?;
        let user = self
            .store
            .find_user(key.user_id)
            .await?
            .ok_or_else(|| EconomyError::Unauthorized("api key owner no longer exists".to_string()))?;
        Ok(Caller {
            user,
            credential: Credential::ApiKey(key.id),
        })
    }

    /// Checks a username and password and issues a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Unauthorized`] for an unknown user or a wrong
    /// password, without saying which, or a persistence error.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, EconomyError> {
        let user = self.store.find_user_by_username(username.trim()).await?;
        let Some(user) = user else {
            tracing::info!(username = %username.trim(), "login for unknown user");
            return Err(invalid_credentials());
        };
        let (password, stored) = (password.to_string(), user.password_hash.clone());
        if !blocking(move || verify_password(&password, &stored)).await? {
            tracing::info!(user_id = %user.id, "login with wrong password");
            return Err(invalid_credentials());
        }

        let (refresh, secret) = RefreshToken::issue(user.id, self.refresh_ttl);
        let mut unit = self.store.begin().await?;
        unit.insert_refresh_token(&refresh).await?;
        unit.commit().await?;

        tracing::info!(user_id = %user.id, "user logged in");
        self.pair(user.id, secret)
    }

    /// Exchanges a refresh token for a new pair and revokes it.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Unauthorized`] for unknown, revoked, or
    /// expired tokens and for tokens whose owner is gone, or a persistence
    /// error.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, EconomyError> {
        let presented = presented.trim();
        if presented.is_empty() {
            return Err(EconomyError::Unauthorized("missing refresh token".to_string()));
        }
        let mut unit = self.store.begin().await?;
        let Some(mut current) = unit.refresh_token_for_update(&hash_key(presented)).await? else {
            return Err(EconomyError::Unauthorized("invalid refresh token".to_string()));
        };
        let now = Utc::now();
        if !current.is_usable(now) {
            tracing::warn!(user_id = %current.user_id, "unusable refresh token presented");
            return Err(EconomyError::Unauthorized(
                "refresh token expired or revoked".to_string(),
            ));
        }
        current.revoke(now);
        unit.save_refresh_token(&current).await?;
        let (next, secret) = RefreshToken::issue(current.user_id, self.refresh_ttl);
        unit.insert_refresh_token(&next).await?;
        unit.commit().await?;

        let user_id = current.user_id;
        if self.store.find_user(user_id).await?.is_none() {
            return Err(EconomyError::Unauthorized(
                "refresh token owner no longer exists".to_string(),
            ));
        }
        tracing::debug!(%user_id, "refresh token rotated");
        self.pair(user_id, secret)
    }

    /// Revokes a refresh token. Revoking an already revoked token succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::RefreshTokenNotFound`] for an unknown token,
    /// or a persistence error.
    pub async fn logout(&self, presented: &str) -> Result<(), EconomyError> {
        let mut unit = self.store.begin().await?;
        let Some(mut token) = unit.refresh_token_for_update(&hash_key(presented.trim())).await?
        else {
            return Err(EconomyError::RefreshTokenNotFound);
        };
        token.revoke(Utc::now());
        unit.save_refresh_token(&token).await?;
        unit.commit().await?;
        tracing::info!(user_id = %token.user_id, "user logged out");
        Ok(())
    }

    /// Resolves a bearer access token to a caller.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Unauthorized`] for invalid or expired tokens
    /// and for users that are gone, [`EconomyError::RateLimited`] when the
    /// user's budget for the current window is spent, or a persistence
    /// error.
    pub async fn authenticate_bearer(&self, token: &str) -> Result<Caller, EconomyError> {
        let user_id = self.tokens.verify(token.trim())?;
        if let RateDecision::Limited { retry_after } =
            self.limiter.check(&format!("user:{user_id}"), self.default_rate_limit)
        {
            tracing::warn!(%user_id, "rate limit exceeded");
            return Err(EconomyError::RateLimited {
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            });
        }
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| EconomyError::Unauthorized("token owner no longer exists".to_string()))?;
        Ok(Caller {
            user,
            credential: Credential::AccessToken,
        })
    }

    fn pair(&self, user_id: UserId, refresh_token: String) -> Result<TokenPair, EconomyError> {
        let access = self.tokens.issue(user_id)?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            token_type: TOKEN_TYPE,
            expires_in: access.expires_in,
        })
    }
}

/// Runs CPU-heavy password work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, EconomyError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| EconomyError::Internal(format!("password task failed: {err}")))
}

fn invalid_credentials() -> EconomyError {
    EconomyError::Unauthorized("invalid credentials".to_string())
}

fn validate_username(username: &str) -> Result<(), EconomyError> {
    if username.is_empty() {
        return Err(EconomyError::InvalidRequest("username must not be empty".to_string()));
    }
    validate_len("username", username, MAX_USERNAME_LEN)?;
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(EconomyError::InvalidRequest(
            "username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_len(field: &str, value: &str, max: usize) -> Result<(), EconomyError> {
    if value.chars().count() > max {
        return Err(EconomyError::InvalidRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn validate_rate_limit(rate_limit: u32) -> Result<(), EconomyError> {
    if rate_limit == 0 || i32::try_from(rate_limit).is_err() {
        return Err(EconomyError::InvalidRequest(
            "rate_limit must be a positive 32-bit integer".to_string(),
        ));
    }
    Ok(())
}

/// Trims and lower-cases an e-mail after a structural check.
fn normalize_email(email: &str) -> Result<String, EconomyError> {
    let email = email.trim().to_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    });
    if !valid || email.len() > 255 {
        return Err(EconomyError::InvalidRequest(format!("invalid email: {email}")));
    }
    Ok(email)
}

fn describe_conflict(err: EconomyError) -> EconomyError {
    match err {
        EconomyError::AlreadyExists(constraint) if constraint.contains("email") => {
            EconomyError::AlreadyExists("email".to_string())
        }
        EconomyError::AlreadyExists(constraint) if constraint.contains("username") => {
            EconomyError::AlreadyExists("username".to_string())
        }
        other => other,
    }
}
