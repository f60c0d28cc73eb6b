//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::EconomyConfig;
use crate::persistence::Store;
use crate::rate_limit::{RateLimiter, SlidingWindowLimiter};
use crate::service::{
    AccountService, EconomyService, ProfileService, SessionService, WalletService,
};
use crate::token::TokenSigner;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Users, API keys, and authentication.
    pub account_service: Arc<AccountService>,
    /// Game profiles and XP.
    pub profile_service: Arc<ProfileService>,
    /// Play sessions.
    pub session_service: Arc<SessionService>,
    /// Wallet lifecycle and lock control.
    pub wallet_service: Arc<WalletService>,
    /// Balance-affecting operations and the ledger.
    pub economy_service: Arc<EconomyService>,
    /// Backend handle, used by the readiness check.
    pub store: Store,
}

impl AppState {
    /// Wires every service over `store`, with a sliding-window rate
    /// limiter sized from `config`.
    #[must_use]
    pub fn new(store: Store, config: &EconomyConfig) -> Self {
        let limiter: Arc<dyn RateLimiter> =
            Arc::new(SlidingWindowLimiter::new(config.rate_limit_window()));
        Self::with_limiter(store, config, limiter)
    }

    /// Same as [`Self::new`] with a caller-supplied rate limiter.
    ///
    /// Without a configured `JWT_SECRET`, access tokens are signed with a
    /// random per-process secret and stop verifying on restart.
    #[must_use]
    pub fn with_limiter(
        store: Store,
        config: &EconomyConfig,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let economy = EconomyService::new(store.clone());
        let tokens = match config.jwt_secret.as_deref() {
            Some(secret) => TokenSigner::new(secret.as_bytes(), config.access_token_ttl()),
            None => {
                tracing::warn!("JWT_SECRET not set; access tokens will not survive a restart");
                TokenSigner::ephemeral(config.access_token_ttl())
            }
        };
        Self {
            account_service: Arc::new(AccountService::new(
                store.clone(),
                limiter,
                config.api_key_default_rate_limit,
                config.api_key_ttl(),
                tokens,
                config.refresh_token_ttl(),
            )),
            profile_service: Arc::new(ProfileService::new(store.clone())),
            session_service: Arc::new(SessionService::new(store.clone())),
            wallet_service: Arc::new(WalletService::new(store.clone(), economy.clone())),
            economy_service: Arc::new(economy),
            store,
        }
    }
}
