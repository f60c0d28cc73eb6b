//! Account handlers: registration, password login and token refresh, the
//! caller's user record, API keys.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::auth::Authenticated;
use crate::api::dto::{
    ApiKeyDto, ApiKeyListResponse, CreateApiKeyRequest, CreatedApiKeyDto, LoginRequest,
    MessageResponse, RefreshRequest, RegisterRequest, RegisterResponse, TokenResponse,
    UpdateApiKeyRequest, UpdateUserRequest, UserDto,
};
use crate::app_state::AppState;
use crate::domain::ApiKeyId;
use crate::error::{EconomyError, ErrorResponse};
use crate::service::{ApiKeyChanges, Registration};

/// `POST /register`: Create a user and its first API key.
///
/// # Errors
///
/// Returns [`EconomyError`] on invalid input or a taken username/e-mail.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Accounts",
    summary = "Register a user",
    description = "Creates a user and issues a first API key. The plaintext key is returned only in this response.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid username, e-mail, or password", body = ErrorResponse),
        (status = 409, description = "Username or e-mail already taken", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let (user, issued) = state
        .account_service
        .register(Registration {
            username: req.username,
            display_name: req.display_name,
            email: req.email,
            password: req.password,
        })
        .await?;

    let response = RegisterResponse {
        user: user.into(),
        api_key: issued.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /login`: Exchange a username and password for tokens.
///
/// # Errors
///
/// Returns [`EconomyError::Unauthorized`] for an unknown user or a wrong
/// password.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Accounts",
    summary = "Log in",
    description = "Returns a one-hour access token for `Authorization: Bearer` and a single-use refresh token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let pair = state
        .account_service
        .login(&req.username, &req.password)
        .await?;
    Ok(Json(TokenResponse::from(pair)))
}

/// `POST /refresh`: Trade a refresh token for a new pair.
///
/// # Errors
///
/// Returns [`EconomyError::Unauthorized`] for an unknown, revoked, or
/// expired refresh token.
#[utoipa::path(
    post,
    path = "/api/v1/refresh",
    tag = "Accounts",
    summary = "Refresh tokens",
    description = "Revokes the presented refresh token and issues a new access and refresh token.",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New tokens", body = TokenResponse),
        (status = 401, description = "Refresh token unusable", body = ErrorResponse),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let pair = state.account_service.refresh(&req.refresh_token).await?;
    Ok(Json(TokenResponse::from(pair)))
}

/// `POST /logout`: Revoke a refresh token.
///
/// # Errors
///
/// Returns [`EconomyError::RefreshTokenNotFound`] for an unknown token.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    tag = "Accounts",
    summary = "Log out",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 404, description = "Unknown refresh token", body = ErrorResponse),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    state.account_service.logout(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /profile`: The caller's user record.
///
/// # Errors
///
/// Returns [`EconomyError`] on authentication failure.
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    tag = "Accounts",
    summary = "Get the caller's user",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "User record", body = UserDto),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let user = state.account_service.me(caller.user.id).await?;
    Ok(Json(UserDto::from(user)))
}

/// `PUT /profile`: Change display name or e-mail.
///
/// # Errors
///
/// Returns [`EconomyError`] on invalid input or a taken e-mail.
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    tag = "Accounts",
    summary = "Update the caller's user",
    security(("api_key" = []), ("bearer" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user record", body = UserDto),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "E-mail already taken", body = ErrorResponse),
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let user = state
        .account_service
        .update_me(caller.user.id, req.display_name, req.email)
        .await?;
    Ok(Json(UserDto::from(user)))
}

/// `POST /api-keys`: Issue an additional API key.
///
/// # Errors
///
/// Returns [`EconomyError`] on invalid input.
#[utoipa::path(
    post,
    path = "/api/v1/api-keys",
    tag = "Accounts",
    summary = "Create an API key",
    description = "Issues a new key for the caller. The plaintext key is returned only in this response.",
    security(("api_key" = []), ("bearer" = [])),
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key issued", body = CreatedApiKeyDto),
        (status = 400, description = "Invalid input", body = ErrorResponse),
    )
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let issued = state
        .account_service
        .create_api_key(caller.user.id, &req.name, req.rate_limit, req.expires_at)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedApiKeyDto::from(issued))))
}

/// `GET /api-keys`: List the caller's keys.
///
/// # Errors
///
/// Returns [`EconomyError`] on authentication or storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/api-keys",
    tag = "Accounts",
    summary = "List API keys",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "The caller's keys", body = ApiKeyListResponse),
    )
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let keys = state.account_service.list_api_keys(caller.user.id).await?;
    Ok(Json(ApiKeyListResponse {
        data: keys.into_iter().map(ApiKeyDto::from).collect(),
    }))
}

/// `PUT /api-keys/{id}`: Rename, re-limit, deactivate, or re-date a key.
///
/// # Errors
///
/// Returns [`EconomyError::ApiKeyNotFound`] if the key is not the caller's.
#[utoipa::path(
    put,
    path = "/api/v1/api-keys/{id}",
    tag = "Accounts",
    summary = "Update an API key",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = ApiKeyId, Path, description = "API key ID")),
    request_body = UpdateApiKeyRequest,
    responses(
        (status = 200, description = "Updated key", body = ApiKeyDto),
        (status = 404, description = "Key not found", body = ErrorResponse),
    )
)]
pub async fn update_api_key(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<ApiKeyId>,
    Json(req): Json<UpdateApiKeyRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let changes = ApiKeyChanges {
        name: req.name,
        rate_limit: req.rate_limit,
        is_active: req.is_active,
        expires_at: req.expires_at,
    };
    let key = state
        .account_service
        .update_api_key(caller.user.id, id, changes)
        .await?;
    Ok(Json(ApiKeyDto::from(key)))
}

/// `DELETE /api-keys/{id}`: Revoke a key.
///
/// # Errors
///
/// Returns [`EconomyError::ApiKeyNotFound`] if the key is not the caller's.
#[utoipa::path(
    delete,
    path = "/api/v1/api-keys/{id}",
    tag = "Accounts",
    summary = "Revoke an API key",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = ApiKeyId, Path, description = "API key ID")),
    responses(
        (status = 200, description = "Key revoked", body = MessageResponse),
        (status = 404, description = "Key not found", body = ErrorResponse),
    )
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<ApiKeyId>,
) -> Result<impl IntoResponse, EconomyError> {
    state
        .account_service
        .delete_api_key(caller.user.id, id)
        .await?;
    Ok(Json(MessageResponse::new("api key revoked")))
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/profile", get(get_me).put(update_me))
        .route("/api-keys", post(create_api_key).get(list_api_keys))
        .route("/api-keys/{id}", put(update_api_key).delete(delete_api_key))
}
