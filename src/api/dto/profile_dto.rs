//! Game profile, XP, and leaderboard DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{GameProfile, JsonBag, ProfileId, UserId};
use crate::persistence::LeaderboardEntry;
use crate::service::XpOutcome;

/// Full view of a game profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileDto {
    /// Profile identifier.
    pub id: ProfileId,
    /// Owning user.
    pub user_id: UserId,
    /// Current level.
    pub level: i32,
    /// Cumulative XP.
    pub xp: i64,
    /// Cumulative XP needed for the next level.
    pub xp_for_next_level: i64,
    /// Progress through the current level band, 0–100.
    pub xp_progress: f64,
    /// Whether the profile is listed on the leaderboard.
    pub is_active: bool,
    /// Last recorded login.
    pub last_login: Option<DateTime<Utc>>,
    /// Open-schema statistics.
    #[schema(value_type = Object)]
    pub stats: JsonBag,
    /// Open-schema settings.
    #[schema(value_type = Object)]
    pub settings: JsonBag,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<GameProfile> for ProfileDto {
    fn from(profile: GameProfile) -> Self {
        Self {
            xp_for_next_level: profile.xp_for_next_level(),
            xp_progress: profile.xp_progress(),
            id: profile.id,
            user_id: profile.user_id,
            level: profile.level,
            xp: profile.xp,
            is_active: profile.is_active,
            last_login: profile.last_login,
            stats: profile.stats,
            settings: profile.settings,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Request body for `PUT /game-profile`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    /// Replacement settings bag. Unknown keys are kept as sent.
    #[schema(value_type = Object)]
    pub settings: JsonBag,
}

/// Request body for `POST /game-profile/xp`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddXpRequest {
    /// XP to grant; must be positive.
    pub amount: i64,
    /// Free-text reason, logged only.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response body for `POST /game-profile/xp`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddXpResponse {
    /// Level before the grant.
    pub old_level: i32,
    /// Level after the grant.
    pub new_level: i32,
    /// XP before the grant.
    pub old_xp: i64,
    /// XP after the grant.
    pub new_xp: i64,
    /// Whether at least one level was gained.
    pub level_up: bool,
    /// Cumulative XP needed for the next level.
    pub xp_for_next_level: i64,
    /// Progress through the current level band, 0–100.
    pub xp_progress: f64,
}

impl From<XpOutcome> for AddXpResponse {
    fn from(outcome: XpOutcome) -> Self {
        Self {
            old_level: outcome.old_level,
            new_level: outcome.new_level,
            old_xp: outcome.old_xp,
            new_xp: outcome.new_xp,
            level_up: outcome.level_up,
            xp_for_next_level: outcome.xp_for_next_level,
            xp_progress: outcome.xp_progress,
        }
    }
}

/// Response body for `GET /game-profile/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Current level.
    pub level: i32,
    /// Cumulative XP.
    pub xp: i64,
    /// Cumulative XP needed for the next level.
    pub xp_for_next_level: i64,
    /// Progress through the current level band, 0–100.
    pub xp_progress: f64,
    /// Open-schema statistics.
    #[schema(value_type = Object)]
    pub stats: JsonBag,
    /// Last recorded login.
    pub last_login: Option<DateTime<Utc>>,
}

impl From<GameProfile> for StatsResponse {
    fn from(profile: GameProfile) -> Self {
        Self {
            xp_for_next_level: profile.xp_for_next_level(),
            xp_progress: profile.xp_progress(),
            level: profile.level,
            xp: profile.xp,
            stats: profile.stats,
            last_login: profile.last_login,
        }
    }
}

/// Query parameters for `GET /leaderboard`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardParams {
    /// Number of entries, 1–100. Defaults to 10.
    pub limit: Option<i64>,
}

/// One leaderboard row.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntryDto {
    /// 1-based position.
    pub rank: usize,
    /// Owner's username.
    pub username: String,
    /// Profile identifier.
    pub profile_id: ProfileId,
    /// Level.
    pub level: i32,
    /// Cumulative XP.
    pub xp: i64,
}

/// Response body for `GET /leaderboard`.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Ranked entries, best first.
    pub data: Vec<LeaderboardEntryDto>,
}

impl From<Vec<LeaderboardEntry>> for LeaderboardResponse {
    fn from(entries: Vec<LeaderboardEntry>) -> Self {
        let data = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| LeaderboardEntryDto {
                rank: i + 1,
                username: entry.username,
                profile_id: entry.profile.id,
                level: entry.profile.level,
                xp: entry.profile.xp,
            })
            .collect();
        Self { data }
    }
}
