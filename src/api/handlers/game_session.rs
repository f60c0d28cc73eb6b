//! Play session handlers: start, list, read, activity, end, terminate.

use axum::extract::{Path, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::Authenticated;
use crate::api::dto::{
    PageParams, SessionDto, SessionListResponse, StartSessionRequest, TerminateSessionRequest,
};
use crate::app_state::AppState;
use crate::domain::{ClientInfo, SessionId};
use crate::error::{EconomyError, ErrorResponse};

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &'static str| headers.get(name).and_then(|v| v.to_str().ok());
    header("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .or_else(|| header("x-real-ip"))
        .map(|ip| ip.trim().chars().take(45).collect())
        .unwrap_or_default()
}

/// `POST /game-sessions`: Start a session.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`] or a validation error.
#[utoipa::path(
    post,
    path = "/api/v1/game-sessions",
    tag = "Game Sessions",
    summary = "Start a session",
    description = "Starts a session for the caller's profile. Any session still active is closed first.",
    security(("api_key" = []), ("bearer" = [])),
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionDto),
        (status = 400, description = "Invalid platform", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn start_session(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    headers: HeaderMap,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let client = ClientInfo {
        ip_address: client_ip(&headers),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        platform: req.platform,
    };
    let session = state
        .session_service
        .start(caller.user.id, client, req.session_data)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionDto::from(session))))
}

/// `GET /game-sessions`: The caller's sessions, newest first.
///
/// # Errors
///
/// Returns [`EconomyError::ProfileNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/game-sessions",
    tag = "Game Sessions",
    summary = "List sessions",
    security(("api_key" = []), ("bearer" = [])),
    params(PageParams),
    responses(
        (status = 200, description = "One page of sessions", body = SessionListResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, EconomyError> {
    let (limit, offset) = (params.limit(), params.offset());
    let (sessions, total) = state
        .session_service
        .list(caller.user.id, Some(limit), offset)
        .await?;
    Ok(Json(SessionListResponse::new(sessions, total, limit, offset)))
}

/// `GET /game-sessions/{id}`: One session with its presence.
///
/// # Errors
///
/// Returns [`EconomyError::SessionNotFound`] if it is not the caller's.
#[utoipa::path(
    get,
    path = "/api/v1/game-sessions/{id}",
    tag = "Game Sessions",
    summary = "Get a session",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = SessionId, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session", body = SessionDto),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<SessionId>,
) -> Result<impl IntoResponse, EconomyError> {
    let session = state.session_service.get(caller.user.id, id).await?;
    Ok(Json(SessionDto::from(session)))
}

/// `POST /game-sessions/{id}/activity`: Record one activity.
///
/// # Errors
///
/// Returns [`EconomyError::SessionNotActive`] for a closed or idle-expired
/// session.
#[utoipa::path(
    post,
    path = "/api/v1/game-sessions/{id}/activity",
    tag = "Game Sessions",
    summary = "Record activity",
    description = "Resets the idle clock. A session idle for more than 30 minutes is expired instead.",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = SessionId, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Updated session", body = SessionDto),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session not active", body = ErrorResponse),
    )
)]
pub async fn record_activity(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<SessionId>,
) -> Result<impl IntoResponse, EconomyError> {
    let session = state
        .session_service
        .record_activity(caller.user.id, id)
        .await?;
    Ok(Json(SessionDto::from(session)))
}

/// `POST /game-sessions/{id}/end`: End a session.
///
/// # Errors
///
/// Returns [`EconomyError::SessionNotActive`] if it is already closed.
#[utoipa::path(
    post,
    path = "/api/v1/game-sessions/{id}/end",
    tag = "Game Sessions",
    summary = "End a session",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = SessionId, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Ended session", body = SessionDto),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session not active", body = ErrorResponse),
    )
)]
pub async fn end_session(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<SessionId>,
) -> Result<impl IntoResponse, EconomyError> {
    let session = state.session_service.end(caller.user.id, id).await?;
    Ok(Json(SessionDto::from(session)))
}

/// `POST /game-sessions/{id}/terminate`: Forcibly close a session.
///
/// # Errors
///
/// Returns [`EconomyError::SessionNotActive`] if it is already closed.
#[utoipa::path(
    post,
    path = "/api/v1/game-sessions/{id}/terminate",
    tag = "Game Sessions",
    summary = "Terminate a session",
    security(("api_key" = []), ("bearer" = [])),
    params(("id" = SessionId, Path, description = "Session ID")),
    request_body = TerminateSessionRequest,
    responses(
        (status = 200, description = "Terminated session", body = SessionDto),
        (status = 400, description = "Missing reason", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session not active", body = ErrorResponse),
    )
)]
pub async fn terminate_session(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<SessionId>,
    Json(req): Json<TerminateSessionRequest>,
) -> Result<impl IntoResponse, EconomyError> {
    let session = state
        .session_service
        .terminate(caller.user.id, id, &req.reason)
        .await?;
    Ok(Json(SessionDto::from(session)))
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/game-sessions", post(start_session).get(list_sessions))
        .route("/game-sessions/{id}", get(get_session))
        .route("/game-sessions/{id}/activity", post(record_activity))
        .route("/game-sessions/{id}/end", post(end_session))
        .route("/game-sessions/{id}/terminate", post(terminate_session))
}
