//! Registration, login, user, and API key DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ApiKey, ApiKeyId, User, UserId};
use crate::service::{IssuedKey, TokenPair};

/// Request body for `POST /register`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Unique login name (letters, digits, `.`, `_`, `-`; at most 50).
    pub username: String,
    /// Name shown to other players. Defaults to the username.
    #[serde(default)]
    pub display_name: String,
    /// Unique e-mail address.
    pub email: String,
    /// 8 to 100 characters with a digit, a symbol, and upper- and
    /// lower-case letters.
    pub password: String,
}

/// Request body for `POST /login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Request body for `POST /refresh` and `POST /logout`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Refresh token from a previous login or refresh.
    pub refresh_token: String,
}

/// Response body for `POST /login` and `POST /refresh`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// Access token for the `Authorization: Bearer` header.
    pub access_token: String,
    /// Single-use refresh token.
    pub refresh_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type.to_string(),
            expires_in: pair.expires_in,
        }
    }
}

/// Public view of a user.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDto {
    /// User identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// E-mail address.
    pub email: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Response body for `POST /register`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    /// The new user.
    pub user: UserDto,
    /// First API key, with its one-time secret.
    pub api_key: CreatedApiKeyDto,
}

/// Request body for `PUT /profile`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    /// New display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// New e-mail address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Stored API key as shown to its owner (no key material).
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeyDto {
    /// Key identifier.
    pub id: ApiKeyId,
    /// Owner-chosen label.
    pub name: String,
    /// First characters of the key material.
    pub key_prefix: String,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
    /// Last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Requests allowed per rate-limit window.
    pub rate_limit: u32,
    /// Whether the key may authenticate.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyDto {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            key_prefix: key.key_prefix,
            expires_at: key.expires_at,
            last_used_at: key.last_used_at,
            rate_limit: key.rate_limit,
            is_active: key.is_active,
            created_at: key.created_at,
        }
    }
}

/// A freshly issued key. `key` is shown only in this response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedApiKeyDto {
    /// Plaintext key material for the `X-API-Key` header.
    pub key: String,
    /// Stored record.
    #[serde(flatten)]
    pub record: ApiKeyDto,
}

impl From<IssuedKey> for CreatedApiKeyDto {
    fn from(issued: IssuedKey) -> Self {
        Self {
            key: issued.secret,
            record: issued.key.into(),
        }
    }
}

/// Request body for `POST /api-keys`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    /// Label.
    pub name: String,
    /// Requests per window. Defaults to the service default.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    /// Expiry. Defaults to the service key lifetime.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for `PUT /api-keys/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateApiKeyRequest {
    /// New label.
    #[serde(default)]
    pub name: Option<String>,
    /// New requests per window.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    /// Activate or deactivate.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// New expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response body for `GET /api-keys`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeyListResponse {
    /// The caller's keys, newest first.
    pub data: Vec<ApiKeyDto>,
}
