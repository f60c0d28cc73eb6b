//! Profile service: game profile lifecycle, XP, and the leaderboard.

use chrono::Utc;

use crate::domain::{GameProfile, JsonBag, UserId};
use crate::error::EconomyError;
use crate::persistence::{LeaderboardEntry, Store};

/// Default leaderboard size.
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
/// Largest accepted leaderboard size.
pub const MAX_LEADERBOARD_LIMIT: u32 = 100;

/// Result of an XP grant.
#[derive(Debug, Clone, PartialEq)]
pub struct XpOutcome {
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

/// Coordinates profile reads and row-locked profile updates.
#[derive(Debug, Clone)]
pub struct ProfileService {
    store: Store,
}

impl ProfileService {
    /// Creates a new `ProfileService`.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates the user's profile at level 1.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::AlreadyExists`] if the user already has a
    /// profile, or a persistence error.
    pub async fn create(&self, user_id: UserId) -> Result<GameProfile, EconomyError> {
        let profile = GameProfile::new(user_id);
        self.store
            .insert_profile(&profile)
            .await
            .map_err(|err| match err {
                EconomyError::AlreadyExists(_) => {
                    EconomyError::AlreadyExists("game profile".to_string())
                }
                other => other,
            })?;
        tracing::info!(%user_id, profile_id = %profile.id, "game profile created");
        Ok(profile)
    }

    /// Loads the user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ProfileNotFound`] or a persistence error.
    pub async fn get(&self, user_id: UserId) -> Result<GameProfile, EconomyError> {
        self.store
            .find_profile_by_user(user_id)
            .await?
            .ok_or(EconomyError::ProfileNotFound)
    }

    /// Replaces the settings bag.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ProfileNotFound`] or a persistence error.
    pub async fn update_settings(
        &self,
        user_id: UserId,
        settings: JsonBag,
    ) -> Result<GameProfile, EconomyError> {
        self.modify(user_id, |profile| {
            profile.settings = settings;
            profile.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    /// Grants XP, levelling up as often as the new total allows.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidAmount`] unless `amount > 0` and the
    /// new total stays within the level range,
    /// [`EconomyError::ProfileNotFound`], or a persistence error.
    pub async fn add_xp(
        &self,
        user_id: UserId,
        amount: i64,
        reason: Option<&str>,
    ) -> Result<XpOutcome, EconomyError> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }

        let mut old = (0, 0);
        let mut level_up = false;
        let profile = self
            .modify(user_id, |profile| {
                old = (profile.level, profile.xp);
                level_up = profile
                    .add_xp(amount)
                    .ok_or(EconomyError::InvalidAmount(amount))?;
                Ok(())
            })
            .await?;

        if level_up {
            tracing::info!(
                %user_id,
                old_level = old.0,
                new_level = profile.level,
                reason = reason.unwrap_or(""),
                "level up"
            );
        }
        Ok(XpOutcome {
            old_level: old.0,
            new_level: profile.level,
            old_xp: old.1,
            new_xp: profile.xp,
            level_up,
            xp_for_next_level: profile.xp_for_next_level(),
            xp_progress: profile.xp_progress(),
        })
    }

    /// Records a login now.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ProfileNotFound`] or a persistence error.
    pub async fn touch_last_login(&self, user_id: UserId) -> Result<GameProfile, EconomyError> {
        self.modify(user_id, |profile| {
            profile.touch_login(Utc::now());
            Ok(())
        })
        .await
    }

    /// Active profiles by level then XP, highest first.
    ///
    /// A `limit` outside `1..=100` falls back to the default of 10.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn leaderboard(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<LeaderboardEntry>, EconomyError> {
        let limit = limit
            .filter(|l| (1..=MAX_LEADERBOARD_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
        self.store.leaderboard(limit).await
    }

    async fn modify<F>(&self, user_id: UserId, change: F) -> Result<GameProfile, EconomyError>
    where
        F: FnOnce(&mut GameProfile) -> Result<(), EconomyError>,
    {
        let mut unit = self.store.begin().await?;
        let mut profile = unit
            .profile_for_update(user_id)
            .await?
            .ok_or(EconomyError::ProfileNotFound)?;
        change(&mut profile)?;
        unit.save_profile(&profile).await?;
        unit.commit().await?;
        Ok(profile)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::User;
    use crate::persistence::MemoryStore;

    fn make_service() -> ProfileService {
        ProfileService::new(Store::Memory(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let service = make_service();
        let user = UserId::new();
        let Ok(profile) = service.create(user).await else {
            panic!("create failed");
        };
        assert_eq!(profile.level, 1);
        assert_eq!(profile.xp, 0);
        assert!(matches!(
            service.create(user).await,
            Err(EconomyError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn add_xp_levels_up() {
        let service = make_service();
        let user = UserId::new();
        let Ok(_) = service.create(user).await else {
            panic!("create failed");
        };

        let Ok(outcome) = service.add_xp(user, 2500, Some("quest")).await else {
            panic!("add_xp failed");
        };
        assert_eq!(outcome.old_level, 1);
        assert_eq!(outcome.new_level, 3);
        assert!(outcome.level_up);
        assert_eq!(outcome.new_xp, 2500);
        assert_eq!(outcome.xp_for_next_level, 3000);

        let Ok(profile) = service.get(user).await else {
            panic!("get failed");
        };
        assert_eq!(profile.level, 3);
    }

    #[tokio::test]
    async fn add_xp_rejects_non_positive() {
        let service = make_service();
        let user = UserId::new();
        let Ok(_) = service.create(user).await else {
            panic!("create failed");
        };
        assert!(matches!(
            service.add_xp(user, 0, None).await,
            Err(EconomyError::InvalidAmount(0))
        ));
    }

    #[tokio::test]
    async fn oversized_xp_grant_is_rejected_without_change() {
        let service = make_service();
        let user = UserId::new();
        let Ok(_) = service.create(user).await else {
            panic!("create failed");
        };
        let Ok(_) = service.add_xp(user, 1500, None).await else {
            panic!("add_xp failed");
        };

        assert!(matches!(
            service.add_xp(user, 3_000_000_000_000, Some("exploit")).await,
            Err(EconomyError::InvalidAmount(3_000_000_000_000))
        ));
        let Ok(profile) = service.get(user).await else {
            panic!("get failed");
        };
        assert_eq!(profile.level, 2);
        assert_eq!(profile.xp, 1500);
    }

    #[tokio::test]
    async fn settings_are_replaced() {
        let service = make_service();
        let user = UserId::new();
        let Ok(_) = service.create(user).await else {
            panic!("create failed");
        };
        let mut settings = JsonBag::new();
        settings.insert("volume".to_string(), serde_json::json!(7));
        settings.insert("custom_flag".to_string(), serde_json::json!({"a": [1, 2]}));

        let Ok(profile) = service.update_settings(user, settings).await else {
            panic!("update failed");
        };
        assert_eq!(profile.setting("volume"), Some(&serde_json::json!(7)));
        assert_eq!(
            profile.setting("custom_flag"),
            Some(&serde_json::json!({"a": [1, 2]}))
        );
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let service = make_service();
        assert!(matches!(
            service.touch_last_login(UserId::new()).await,
            Err(EconomyError::ProfileNotFound)
        ));
    }

    #[tokio::test]
    async fn leaderboard_orders_by_level_then_xp() {
        let memory = MemoryStore::new();
        let store = Store::Memory(memory);
        let service = ProfileService::new(store.clone());

        let mut ids = Vec::new();
        for (name, xp) in [("low", 100), ("high", 5000), ("mid", 1500), ("mid2", 1900)] {
            let user = User::new(
                name.to_string(),
                name.to_string(),
                format!("{name}@example.com"),
                "$argon2id$stub".to_string(),
            );
            let Ok(mut unit) = store.begin().await else {
                panic!("begin failed");
            };
            let Ok(()) = unit.insert_user(&user).await else {
                panic!("insert failed");
            };
            let Ok(()) = unit.commit().await else {
                panic!("commit failed");
            };
            let Ok(_) = service.create(user.id).await else {
                panic!("create failed");
            };
            let Ok(_) = service.add_xp(user.id, xp, None).await else {
                panic!("add_xp failed");
            };
            ids.push(user.id);
        }

        let Ok(board) = service.leaderboard(Some(3)).await else {
            panic!("leaderboard failed");
        };
        let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["high", "mid2", "mid"]);

        let Ok(board) = service.leaderboard(Some(0)).await else {
            panic!("leaderboard failed");
        };
        assert_eq!(board.len(), ids.len());
    }
}
