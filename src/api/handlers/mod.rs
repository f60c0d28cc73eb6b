//! REST endpoint handlers organized by resource.

pub mod account;
pub mod game_profile;
pub mod game_session;
pub mod system;
pub mod transaction;
pub mod wallet;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(account::routes())
        .merge(game_profile::routes())
        .merge(game_session::routes())
        .merge(wallet::routes())
        .merge(transaction::routes())
}
