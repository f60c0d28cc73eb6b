//! Game profile: level, XP, and open-schema stats and settings.

use chrono::{DateTime, Utc};

use super::JsonBag;
use super::ids::{ProfileId, UserId};

/// XP width of one level band.
pub const XP_PER_LEVEL: i64 = 1000;

/// Level reached with `xp` cumulative XP: `xp / 1000 + 1`.
///
/// `None` for negative XP or a level beyond `i32`.
#[must_use]
pub fn level_for_xp(xp: i64) -> Option<i32> {
    if xp < 0 {
        return None;
    }
    i32::try_from(xp / XP_PER_LEVEL + 1).ok()
}

/// Per-user game profile. Owns the wallet (one-to-one).
#[derive(Debug, Clone, PartialEq)]
pub struct GameProfile {
    /// Profile identifier.
    pub id: ProfileId,
    /// Owning user (unique).
    pub user_id: UserId,
    /// Current level, starting at 1.
    pub level: i32,
    /// Cumulative XP.
    pub xp: i64,
    /// Whether the profile appears on leaderboards.
    pub is_active: bool,
    /// Last recorded login.
    pub last_login: Option<DateTime<Utc>>,
    /// Game-defined statistics.
    pub stats: JsonBag,
    /// Player settings.
    pub settings: JsonBag,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl GameProfile {
    /// Creates an active level-1 profile with empty bags.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ProfileId::new(),
            user_id,
            level: 1,
            xp: 0,
            is_active: true,
            last_login: None,
            stats: JsonBag::new(),
            settings: JsonBag::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Cumulative XP at which the next level is reached (`level × 1000`).
    #[must_use]
    pub fn xp_for_next_level(&self) -> i64 {
        i64::from(self.level).saturating_mul(XP_PER_LEVEL)
    }

    /// Percentage (0–100) of the current level band already earned.
    #[must_use]
    pub fn xp_progress(&self) -> f64 {
        if self.level == 1 && self.xp == 0 {
            return 0.0;
        }
        let band_start = i64::from(self.level - 1).saturating_mul(XP_PER_LEVEL);
        let band_width = self.xp_for_next_level() - band_start;
        let earned = self.xp - band_start;
        if earned <= 0 || band_width <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = earned as f64 / band_width as f64 * 100.0;
        pct.min(100.0)
    }

    /// Adds XP and moves the level to the band the new total falls in.
    ///
    /// Returns `Some(true)` if at least one level was gained, and `None`
    /// (leaving the profile untouched) when the new total or its level
    /// does not fit the stored types. Non-positive amounts are ignored.
    pub fn add_xp(&mut self, amount: i64) -> Option<bool> {
        let xp = self.xp.checked_add(amount.max(0))?;
        let level = level_for_xp(xp)?;
        let start_level = self.level;
        self.xp = xp;
        self.level = level.max(start_level);
        self.updated_at = Utc::now();
        Some(self.level > start_level)
    }

    /// Records a login at `at`.
    pub fn touch_login(&mut self, at: DateTime<Utc>) {
        self.last_login = Some(at);
        self.updated_at = at;
    }

    /// Returns a stat value.
    #[must_use]
    pub fn stat(&self, key: &str) -> Option<&serde_json::Value> {
        self.stats.get(key)
    }

    /// Sets a stat value, keeping every other key.
    pub fn set_stat(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.stats.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    /// Returns a setting value.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }

    /// Sets a setting value, keeping every other key.
    pub fn set_setting(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.settings.insert(key.into(), value);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> GameProfile {
        GameProfile::new(UserId::new())
    }

    #[test]
    fn new_profile_starts_at_level_one() {
        let p = profile();
        assert_eq!(p.level, 1);
        assert_eq!(p.xp, 0);
        assert!(p.is_active);
        assert_eq!(p.xp_for_next_level(), 1000);
        assert!(p.xp_progress().abs() < f64::EPSILON);
    }

    #[test]
    fn add_xp_below_threshold_keeps_level() {
        let mut p = profile();
        assert_eq!(p.add_xp(999), Some(false));
        assert_eq!(p.level, 1);
        assert!((p.xp_progress() - 99.9).abs() < 1e-9);
    }

    #[test]
    fn add_xp_exact_threshold_levels_up() {
        let mut p = profile();
        assert_eq!(p.add_xp(1000), Some(true));
        assert_eq!(p.level, 2);
        assert!(p.xp_progress().abs() < f64::EPSILON);
    }

    #[test]
    fn add_xp_handles_multi_level_jump() {
        let mut p = profile();
        assert_eq!(p.add_xp(2500), Some(true));
        assert_eq!(p.level, 3);
        assert_eq!(p.xp, 2500);
        assert_eq!(p.xp_for_next_level(), 3000);
        assert!((p.xp_progress() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn add_xp_accumulates_across_calls() {
        let mut p = profile();
        assert_eq!(p.add_xp(600), Some(false));
        assert_eq!(p.add_xp(600), Some(true));
        assert_eq!(p.level, 2);
        assert_eq!(p.xp, 1200);
    }

    #[test]
    fn negative_xp_is_ignored() {
        let mut p = profile();
        let _ = p.add_xp(500);
        assert_eq!(p.add_xp(-200), Some(false));
        assert_eq!(p.xp, 500);
    }

    #[test]
    fn huge_grant_reaches_last_level_in_one_step() {
        let mut p = profile();
        let top = (i64::from(i32::MAX) - 1) * XP_PER_LEVEL;
        assert_eq!(p.add_xp(top), Some(true));
        assert_eq!(p.level, i32::MAX);
        assert_eq!(p.xp, top);
    }

    #[test]
    fn unrepresentable_grant_leaves_profile_untouched() {
        let mut p = profile();
        let _ = p.add_xp(1500);
        assert_eq!(p.add_xp(3_000_000_000_000), None);
        assert_eq!(p.add_xp(i64::MAX), None);
        assert_eq!(p.level, 2);
        assert_eq!(p.xp, 1500);
    }

    #[test]
    fn level_for_xp_bands() {
        assert_eq!(level_for_xp(0), Some(1));
        assert_eq!(level_for_xp(999), Some(1));
        assert_eq!(level_for_xp(1000), Some(2));
        assert_eq!(level_for_xp(-1), None);
        assert_eq!(level_for_xp(i64::MAX), None);
    }

    #[test]
    fn bags_keep_unknown_keys() {
        let mut p = profile();
        p.set_stat("kills", serde_json::json!(12));
        p.set_setting("theme", serde_json::json!("dark"));
        p.set_stat("kills", serde_json::json!(13));
        assert_eq!(p.stat("kills"), Some(&serde_json::json!(13)));
        assert_eq!(p.setting("theme"), Some(&serde_json::json!("dark")));
        assert!(p.stat("deaths").is_none());
    }
}
