//! OpenAPI document for every REST endpoint.
//!
//! Served as JSON at `/api-docs/openapi.json`; with the `swagger-ui`
//! feature an interactive explorer is mounted at `/swagger-ui`.

use axum::Router;
#[cfg(not(feature = "swagger-ui"))]
use axum::{Json, routing::get};
use utoipa::openapi::security::{
    ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme,
};
use utoipa::{Modify, OpenApi};

use crate::api::dto::{
    AddXpRequest, AddXpResponse, ApiKeyDto, ApiKeyListResponse, BalanceResponse,
    BalancesResponse, CreateApiKeyRequest, CreatedApiKeyDto, LeaderboardEntryDto,
    LeaderboardResponse, LedgerResponse, LockWalletRequest, LoginRequest, MessageResponse,
    MoneyRequest, PageMeta, ProfileDto, RefreshRequest, RegisterRequest, RegisterResponse,
    SessionDto, SessionListResponse, StartSessionRequest, StatsResponse, TerminateSessionRequest,
    TokenResponse, TransactionDto, TransactionListResponse, TransferRequest, TransferResponse,
    UpdateApiKeyRequest, UpdateSettingsRequest, UpdateUserRequest, UserDto, WalletDto,
    WalletStatusResponse,
};
use crate::api::handlers::{account, game_profile, game_session, system, transaction, wallet};
use crate::app_state::AppState;
use crate::domain::{
    ActivityStatus, CurrencyType, SessionStatus, TransactionStatus, TransactionType,
};
use crate::error::{ErrorBody, ErrorKind, ErrorResponse};

/// Path of the generated document.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// The service's OpenAPI description.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "economy-gateway",
        description = "Game accounts, progression, and a multi-currency wallet ledger."
    ),
    paths(
        account::register,
        account::login,
        account::refresh,
        account::logout,
        account::get_me,
        account::update_me,
        account::create_api_key,
        account::list_api_keys,
        account::update_api_key,
        account::delete_api_key,
        game_profile::create_profile,
        game_profile::get_profile,
        game_profile::update_settings,
        game_profile::add_xp,
        game_profile::get_stats,
        game_profile::touch_last_login,
        game_profile::leaderboard,
        game_session::start_session,
        game_session::list_sessions,
        game_session::get_session,
        game_session::record_activity,
        game_session::end_session,
        game_session::terminate_session,
        wallet::create_wallet,
        wallet::get_wallet,
        wallet::get_balance,
        wallet::get_balances,
        wallet::lock_wallet,
        wallet::unlock_wallet,
        wallet::wallet_status,
        wallet::wallet_history,
        transaction::add_money,
        transaction::spend_money,
        transaction::transfer_money,
        transaction::history,
        transaction::get_transaction,
        transaction::reverse_transaction,
        system::health_handler,
        system::ready_handler,
        system::live_handler,
    ),
    components(schemas(
        ActivityStatus,
        AddXpRequest,
        AddXpResponse,
        ApiKeyDto,
        ApiKeyListResponse,
        BalanceResponse,
        BalancesResponse,
        CreateApiKeyRequest,
        CreatedApiKeyDto,
        CurrencyType,
        ErrorBody,
        ErrorKind,
        ErrorResponse,
        LeaderboardEntryDto,
        LeaderboardResponse,
        LedgerResponse,
        LockWalletRequest,
        LoginRequest,
        MessageResponse,
        MoneyRequest,
        PageMeta,
        ProfileDto,
        RefreshRequest,
        RegisterRequest,
        RegisterResponse,
        SessionDto,
        SessionListResponse,
        SessionStatus,
        StartSessionRequest,
        StatsResponse,
        TerminateSessionRequest,
        TokenResponse,
        TransactionDto,
        TransactionListResponse,
        TransactionStatus,
        TransactionType,
        TransferRequest,
        TransferResponse,
        UpdateApiKeyRequest,
        UpdateSettingsRequest,
        UpdateUserRequest,
        UserDto,
        WalletDto,
        WalletStatusResponse,
    )),
    modifiers(&CredentialSchemes),
    tags(
        (name = "Accounts", description = "Registration, login, user record, and API keys"),
        (name = "Game Profile", description = "Levels, XP, settings, and the leaderboard"),
        (name = "Game Sessions", description = "Play session lifecycle and presence"),
        (name = "Wallet", description = "Wallet lifecycle, balances, and lock control"),
        (name = "Transactions", description = "Ledger operations and history"),
        (name = "System", description = "Health checks"),
    )
)]
pub struct ApiDoc;

/// Registers the `X-API-Key` and bearer token schemes referenced by
/// protected paths.
#[derive(Debug)]
struct CredentialSchemes;

impl Modify for CredentialSchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Routes serving the document as JSON and through Swagger UI.
#[cfg(feature = "swagger-ui")]
pub fn routes() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_JSON_PATH, ApiDoc::openapi()),
    )
}

/// Routes serving the document as JSON.
#[cfg(not(feature = "swagger-ui"))]
pub fn routes() -> Router<AppState> {
    Router::new().route(OPENAPI_JSON_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_ledger_paths_and_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/transactions/transfer"));
        assert!(doc.paths.paths.contains_key("/api/v1/wallet/balance/{currency}"));
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/api/v1/login"));
        assert!(doc.paths.paths.contains_key("/api/v1/game-sessions/{id}/terminate"));
        let has_schemes = doc.components.as_ref().is_some_and(|c| {
            c.security_schemes.contains_key("api_key") && c.security_schemes.contains_key("bearer")
        });
        assert!(has_schemes);
    }
}
