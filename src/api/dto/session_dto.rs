//! Play session DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ActivityStatus, GameSession, JsonBag, ProfileId, SessionId, SessionStatus};

use super::common_dto::PageMeta;

/// Request body for `POST /game-sessions`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// Platform label, e.g. `"pc"` or `"android"`.
    pub platform: String,
    /// Initial game-defined session data.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub session_data: JsonBag,
}

/// Request body for `POST /game-sessions/{id}/terminate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TerminateSessionRequest {
    /// Why the session is being closed.
    pub reason: String,
}

/// A session with presence derived at response time.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDto {
    /// Session identifier.
    pub id: SessionId,
    /// Owning profile.
    pub profile_id: ProfileId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Presence from the time since the last activity.
    pub activity_status: ActivityStatus,
    /// Whether activity may still be recorded.
    pub can_perform_action: bool,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Last recorded activity.
    pub last_activity: DateTime<Utc>,
    /// End time, once closed.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole minutes played so far.
    pub duration_minutes: i64,
    /// Client address.
    pub ip_address: String,
    /// Client user agent.
    pub user_agent: String,
    /// Platform label.
    pub platform: String,
    /// Recorded activities.
    pub actions_count: i32,
    /// Game-defined session data.
    #[schema(value_type = Object)]
    pub session_data: JsonBag,
    /// Cleared by termination.
    pub is_valid: bool,
    /// Termination reason.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub invalid_reason: String,
}

impl From<GameSession> for SessionDto {
    fn from(session: GameSession) -> Self {
        let now = Utc::now();
        Self {
            activity_status: session.activity_status(now),
            can_perform_action: session.can_perform_action(now),
            duration_minutes: session.duration_minutes(now),
            id: session.id,
            profile_id: session.profile_id,
            status: session.status,
            started_at: session.started_at,
            last_activity: session.last_activity,
            ended_at: session.ended_at,
            ip_address: session.client.ip_address,
            user_agent: session.client.user_agent,
            platform: session.client.platform,
            actions_count: session.actions_count,
            session_data: session.session_data,
            is_valid: session.is_valid,
            invalid_reason: session.invalid_reason,
        }
    }
}

/// Response body for `GET /game-sessions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListResponse {
    /// Sessions, newest first.
    pub data: Vec<SessionDto>,
    /// Paging metadata.
    pub pagination: PageMeta,
}

impl SessionListResponse {
    /// Builds a page from the store result.
    #[must_use]
    pub fn new(sessions: Vec<GameSession>, total: u64, limit: u32, offset: u64) -> Self {
        Self {
            data: sessions.into_iter().map(SessionDto::from).collect(),
            pagination: PageMeta {
                limit,
                offset,
                total,
            },
        }
    }
}
