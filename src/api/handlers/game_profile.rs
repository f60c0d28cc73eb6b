//! Game profile handlers: create, read, settings, XP, stats, login, and
//! the public leaderboard.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::auth::Authenticated;
use crate::api::dto::{
    AddXpRequest, AddXpResponse, LeaderboardParams, LeaderboardResponse, ProfileDto,
    StatsResponse, UpdateSettingsRequest,
};
use crate::app_state::AppState;
use crate::error::{EconomyError, ErrorResponse};

/// `POST /game-profile`: Create the caller's game profile.
///
/// # Errors
///
/// Returns [`EconomyError::AlreadyExists`] if the caller already has one.
#[utoipa::path(
    post,
    path = "/api/v1/game-profile",
    tag = "Game Profile",
    summary = "Create game profile",
    description = "Creates a level 1 profile with zero XP and empty stats and settings.",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 201, description = "Profile created", body = ProfileDto),
        (status = 409, description = "Profile already exists", body = ErrorResponse),
    )
)]
pub async fn create_profile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let profile = state.profile_service.create(caller.user.id).await?;
    Ok((StatusCode::CREATED, Json(ProfileDto::from(profile))))
}

/// `GET /game-profile`: The caller's game profile.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/game-profile",
    tag = "Game Profile",
    summary = "Get game profile",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileDto),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let profile = state.profile_service.get(caller.user.id).await?;
    Ok(Json(ProfileDto::from(profile)))
}

/// `PUT /game-profile`: Replace the settings bag.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`].
#[utoipa::path(
    put,
    path = "/api/v1/game-profile",
    tag = "Game Profile",
    summary = "Update settings",
    security(("api_key" = []), ("bearer" = [])),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileDto),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let profile = state
        .profile_service
        .update_settings(caller.user.id, req.settings)
        .await?;
    Ok(Json(ProfileDto::from(profile)))
}

/// `POST /game-profile/xp`: Grant XP.
///
/// # Errors
///
/// Returns [`EconomyError::InvalidAmount`] for a non-positive amount or
/// [`EconomyError::ProfileNotFound`].
#[utoipa::path(
    post,
    path = "/api/v1/game-profile/xp",
    tag = "Game Profile",
    summary = "Add XP",
    description = "Adds XP and applies every level-up the new total reaches.",
    security(("api_key" = []), ("bearer" = [])),
    request_body = AddXpRequest,
    responses(
        (status = 200, description = "XP granted", body = AddXpResponse),
        (status = 400, description = "Non-positive amount", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn add_xp(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<AddXpRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let outcome = state
        .profile_service
        .add_xp(caller.user.id, req.amount, req.reason.as_deref())
        .await?;
    Ok(Json(AddXpResponse::from(outcome)))
}

/// `GET /game-profile/stats`: Level, XP progress, and stats.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/game-profile/stats",
    tag = "Game Profile",
    summary = "Get stats",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Profile stats", body = StatsResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let profile = state.profile_service.get(caller.user.id).await?;
    Ok(Json(StatsResponse::from(profile)))
}

/// `PUT /game-profile/last-login`: Record a login now.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`].
#[utoipa::path(
    put,
    path = "/api/v1/game-profile/last-login",
    tag = "Game Profile",
    summary = "Record login",
    security(("api_key" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Updated profile", body = ProfileDto),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn touch_last_login(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<impl IntoResponse, EconomyError> {
    let profile = state
        .profile_service
        .touch_last_login(caller.user.id)
        .await?;
    Ok(Json(ProfileDto::from(profile)))
}

/// `GET /leaderboard`: Top active profiles by level, then XP.
///
/// # Errors
///
/// Returns [`EconomyError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/leaderboard",
    tag = "Game Profile",
    summary = "Leaderboard",
    description = "Public ranking of active profiles. `limit` outside 1–100 falls back to 10.",
    params(LeaderboardParams),
    responses(
        (status = 200, description = "Ranked profiles", body = LeaderboardResponse),
    )
)]
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, EconomyError> {
    let limit = params.limit.and_then(|l| u32::try_from(l).ok());
    let entries = state.profile_service.leaderboard(limit).await?;
    Ok(Json(LeaderboardResponse::from(entries)))
}

/// Game profile routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/game-profile",
            post(create_profile).get(get_profile).put(update_settings),
        )
        .route("/game-profile/xp", post(add_xp))
        .route("/game-profile/stats", get(get_stats))
        .route("/game-profile/last-login", put(touch_last_login))
        .route("/leaderboard", get(leaderboard))
}
