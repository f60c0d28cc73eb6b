//! Play sessions.
//!
//! A session starts `active` and ends exactly once: `inactive` when the
//! player ends it, `expired` after 30 minutes without activity, or
//! `terminated` when it is forcibly closed. Terminated sessions are also
//! marked invalid with a reason.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::JsonBag;
use super::ids::{ProfileId, SessionId};
use crate::error::EconomyError;

/// Inactivity after which an active session counts as expired.
pub const SESSION_IDLE_TIMEOUT_MINUTES: i64 = 30;
const ONLINE_WITHIN_MINUTES: i64 = 5;
const AWAY_WITHIN_MINUTES: i64 = 15;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Running.
    Active,
    /// Ended by the player.
    Inactive,
    /// Closed after the idle timeout.
    Expired,
    /// Forcibly closed.
    Terminated,
}

impl SessionStatus {
    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "expired" => Ok(Self::Expired),
            "terminated" => Ok(Self::Terminated),
            other => Err(EconomyError::InvalidRequest(format!(
                "unknown session status: {other}"
            ))),
        }
    }
}

/// Presence derived from the time since the last activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Active within the last 5 minutes.
    Online,
    /// Active within the last 15 minutes.
    Away,
    /// Still open but quiet for longer.
    Idle,
    /// Not an active, valid session.
    Offline,
}

/// Client details recorded when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client address as reported by the edge.
    pub ip_address: String,
    /// `User-Agent` of the starting request.
    pub user_agent: String,
    /// Game platform label (e.g. `"pc"`).
    pub platform: String,
}

/// One play session of a game profile.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    /// Session identifier.
    pub id: SessionId,
    /// Owning profile.
    pub profile_id: ProfileId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Start instant.
    pub started_at: DateTime<Utc>,
    /// Last recorded activity.
    pub last_activity: DateTime<Utc>,
    /// End instant, once the session is no longer active.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and end; zero while active.
    pub duration_secs: i64,
    /// Client details.
    pub client: ClientInfo,
    /// Number of recorded activities.
    pub actions_count: i32,
    /// Game-defined session data.
    pub session_data: JsonBag,
    /// Cleared when the session is terminated.
    pub is_valid: bool,
    /// Termination reason.
    pub invalid_reason: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// Starts an active session at `now`.
    #[must_use]
    pub fn start(profile_id: ProfileId, client: ClientInfo, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            profile_id,
            status: SessionStatus::Active,
            started_at: now,
            last_activity: now,
            ended_at: None,
            duration_secs: 0,
            client,
            actions_count: 0,
            session_data: JsonBag::new(),
            is_valid: true,
            invalid_reason: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Active and not invalidated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active && self.is_valid
    }

    /// Not active, or idle for longer than the timeout at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status != SessionStatus::Active
            || now - self.last_activity > Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES)
    }

    /// Whether the session may record activity at `now`.
    #[must_use]
    pub fn can_perform_action(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && !self.is_expired(now)
    }

    /// Records one activity.
    pub fn update_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.actions_count = self.actions_count.saturating_add(1);
        self.updated_at = now;
    }

    /// Ends the session normally.
    pub fn end(&mut self, now: DateTime<Utc>) {
        self.close(SessionStatus::Inactive, now);
    }

    /// Closes the session after the idle timeout.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.close(SessionStatus::Expired, now);
    }

    /// Forcibly closes the session and invalidates it.
    pub fn terminate(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.close(SessionStatus::Terminated, now);
        self.is_valid = false;
        self.invalid_reason = reason.into();
    }

    fn close(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.ended_at = Some(now);
        self.duration_secs = (now - self.started_at).num_seconds().max(0);
        self.updated_at = now;
    }

    /// Whole minutes played: the recorded duration once ended, the running
    /// time otherwise.
    #[must_use]
    pub fn duration_minutes(&self, now: DateTime<Utc>) -> i64 {
        if self.ended_at.is_some() {
            self.duration_secs / 60
        } else {
            (now - self.started_at).num_minutes().max(0)
        }
    }

    /// Presence at `now`.
    #[must_use]
    pub fn activity_status(&self, now: DateTime<Utc>) -> ActivityStatus {
        if !self.is_active() {
            return ActivityStatus::Offline;
        }
        let quiet = now - self.last_activity;
        if quiet < Duration::minutes(ONLINE_WITHIN_MINUTES) {
            ActivityStatus::Online
        } else if quiet < Duration::minutes(AWAY_WITHIN_MINUTES) {
            ActivityStatus::Away
        } else {
            ActivityStatus::Idle
        }
    }

    /// Returns a session data value.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&serde_json::Value> {
        self.session_data.get(key)
    }

    /// Sets a session data value, keeping every other key.
    pub fn set_data(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.session_data.insert(key.into(), value);
        self.updated_at = Utc::now();
    }
}
