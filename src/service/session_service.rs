//! Session service: play session lifecycle for the caller's profile.
//!
//! A profile has at most one active session. Starting a new one closes
//! the others: idle ones as expired, the rest as ended.

use chrono::Utc;

use crate::domain::{ClientInfo, GameProfile, GameSession, JsonBag, SessionId, UserId};
use crate::error::EconomyError;
use crate::persistence::Store;

/// Default session page size.
pub const DEFAULT_SESSION_PAGE: u32 = 20;
/// Largest accepted session page size.
pub const MAX_SESSION_PAGE: u32 = 100;

const MAX_PLATFORM_LEN: usize = 50;
const MAX_REASON_LEN: usize = 255;

/// Starts, tracks, and closes play sessions.
#[derive(Debug, Clone)]
pub struct SessionService {
    store: Store,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Starts a session, closing any session still active.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for a blank or overlong
    /// platform, [`EconomyError::ProfileNotFound`], or a persistence error.
    pub async fn start(
        &self,
        user_id: UserId,
        client: ClientInfo,
        session_data: JsonBag,
    ) -> Result<GameSession, EconomyError> {
        let platform = client.platform.trim();
        if platform.is_empty() || platform.chars().count() > MAX_PLATFORM_LEN {
            return Err(EconomyError::InvalidRequest(format!(
                "platform must be 1 to {MAX_PLATFORM_LEN} characters"
            )));
        }
        let client = ClientInfo {
            platform: platform.to_string(),
            ..client
        };
        let profile = self.profile(user_id).await?;
        let now = Utc::now();

        let mut unit = self.store.begin().await?;
        for mut previous in unit.active_sessions_for_update(profile.id).await? {
            if previous.is_expired(now) {
                previous.expire(now);
            } else {
                previous.end(now);
            }
            unit.save_session(&previous).await?;
            tracing::debug!(
                session_id = %previous.id,
                status = %previous.status,
                "previous session closed"
            );
        }
        let mut session = GameSession::start(profile.id, client, now);
        session.session_data = session_data;
        unit.insert_session(&session).await?;
        unit.commit().await?;

        tracing::info!(
            %user_id,
            session_id = %session.id,
            platform = %session.client.platform,
            "session started"
        );
        Ok(session)
    }

    /// Loads one of the caller's sessions.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::SessionNotFound`],
    /// [`EconomyError::ProfileNotFound`], or a persistence error.
    pub async fn get(&self, user_id: UserId, id: SessionId) -> Result<GameSession, EconomyError> {
        let profile = self.profile(user_id).await?;
        self.store
            .find_session(profile.id, id)
            .await?
            .ok_or(EconomyError::SessionNotFound(id))
    }

    /// One page of the caller's sessions, newest first, plus the total.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for a limit outside
    /// `1..=100`, [`EconomyError::ProfileNotFound`], or a persistence
    /// error.
    pub async fn list(
        &self,
        user_id: UserId,
        limit: Option<u32>,
        offset: u64,
    ) -> Result<(Vec<GameSession>, u64), EconomyError> {
        let limit = limit.unwrap_or(DEFAULT_SESSION_PAGE);
        if !(1..=MAX_SESSION_PAGE).contains(&limit) {
            return Err(EconomyError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_SESSION_PAGE}"
            )));
        }
        let profile = self.profile(user_id).await?;
        self.store.list_sessions(profile.id, limit, offset).await
    }

    /// Records one activity. A session found idle past the timeout is
    /// closed as expired instead.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::SessionNotActive`] when the session is
    /// closed or has just expired, [`EconomyError::SessionNotFound`],
    /// [`EconomyError::ProfileNotFound`], or a persistence error.
    pub async fn record_activity(
        &self,
        user_id: UserId,
        id: SessionId,
    ) -> Result<GameSession, EconomyError> {
        let profile = self.profile(user_id).await?;
        let mut unit = self.store.begin().await?;
        let mut session = unit
            .session_for_update(profile.id, id)
            .await?
            .ok_or(EconomyError::SessionNotFound(id))?;
        let now = Utc::now();
        if session.can_perform_action(now) {
            session.update_activity(now);
            unit.save_session(&session).await?;
            unit.commit().await?;
            return Ok(session);
        }
        if session.is_active() {
            session.expire(now);
            unit.save_session(&session).await?;
            unit.commit().await?;
            tracing::info!(%user_id, session_id = %id, "idle session expired");
        }
        Err(EconomyError::SessionNotActive(id))
    }

    /// Ends an active session.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::SessionNotActive`] if it is already closed,
    /// [`EconomyError::SessionNotFound`], [`EconomyError::ProfileNotFound`],
    /// or a persistence error.
    pub async fn end(&self, user_id: UserId, id: SessionId) -> Result<GameSession, EconomyError> {
        self.close(user_id, id, |session, now| session.end(now)).await
    }

    /// Forcibly closes an active session and marks it invalid.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidRequest`] for a blank or overlong
    /// reason, [`EconomyError::SessionNotActive`] if it is already closed,
    /// [`EconomyError::SessionNotFound`], [`EconomyError::ProfileNotFound`],
    /// or a persistence error.
    pub async fn terminate(
        &self,
        user_id: UserId,
        id: SessionId,
        reason: &str,
    ) -> Result<GameSession, EconomyError> {
        let reason = reason.trim();
        if reason.is_empty() || reason.chars().count() > MAX_REASON_LEN {
            return Err(EconomyError::InvalidRequest(format!(
                "reason must be 1 to {MAX_REASON_LEN} characters"
            )));
        }
        let session = self
            .close(user_id, id, |session, now| session.terminate(reason, now))
            .await?;
        tracing::warn!(%user_id, session_id = %id, reason, "session terminated");
        Ok(session)
    }

    async fn close<F>(
        &self,
        user_id: UserId,
        id: SessionId,
        apply: F,
    ) -> Result<GameSession, EconomyError>
    where
        F: FnOnce(&mut GameSession, chrono::DateTime<Utc>),
    {
        let profile = self.profile(user_id).await?;
        let mut unit = self.store.begin().await?;
        let mut session = unit
            .session_for_update(profile.id, id)
            .await?
            .ok_or(EconomyError::SessionNotFound(id))?;
        if !session.is_active() {
            return Err(EconomyError::SessionNotActive(id));
        }
        apply(&mut session, Utc::now());
        unit.save_session(&session).await?;
        unit.commit().await?;
        tracing::info!(
            %user_id,
            session_id = %id,
            status = %session.status,
            duration_secs = session.duration_secs,
            "session closed"
        );
        Ok(session)
    }

    async fn profile(&self, user_id: UserId) -> Result<GameProfile, EconomyError> {
        self.store
            .find_profile_by_user(user_id)
            .await?
            .ok_or(EconomyError::ProfileNotFound)
    }
}
