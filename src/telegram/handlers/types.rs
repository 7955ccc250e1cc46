//! Handler types, dependencies, and session helpers

use std::sync::Arc;

use teloxide::types::{Message, User as TelegramUser};

use crate::browse::{BrowseController, SessionStore, UserBrowseSession};
use crate::core::rate_limiter::RateLimiter;
use crate::core::AppResult;
use crate::storage::db::{self, run_blocking};
use crate::telegram::leaderboard::Leaderboard;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<db::DbPool>,
    pub sessions: Arc<SessionStore>,
    pub browse: Arc<BrowseController>,
    pub rate_limiter: Arc<RateLimiter>,
    pub leaderboard: Arc<Leaderboard>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        db_pool: Arc<db::DbPool>,
        sessions: Arc<SessionStore>,
        browse: Arc<BrowseController>,
        rate_limiter: Arc<RateLimiter>,
        leaderboard: Arc<Leaderboard>,
    ) -> Self {
        Self {
            db_pool,
            sessions,
            browse,
            rate_limiter,
            leaderboard,
        }
    }

    /// Returns the user's session, loading the stored profile on first contact.
    pub async fn session_for(&self, user_id: i64) -> AppResult<Arc<UserBrowseSession>> {
        if let Some(session) = self.sessions.get(user_id) {
            return Ok(session);
        }

        let stored = run_blocking(&self.db_pool, move |conn| db::get_user(conn, user_id)).await?;
        let profile = stored.map(|user| user.profile()).unwrap_or_default();
        Ok(self.sessions.get_or_insert_with(user_id, || profile))
    }

    /// Records the sender as a known user (target of broadcasts).
    pub async fn remember_user(&self, user: &TelegramUser) {
        let user_id = user_id_of(user);
        let username = user.username.clone();
        let result = run_blocking(&self.db_pool, move |conn| {
            db::ensure_user(conn, user_id, username.as_deref())
        })
        .await;
        if let Err(e) = result {
            log::error!("Failed to record user {}: {}", user_id, e);
        }
    }
}

pub fn user_id_of(user: &TelegramUser) -> i64 {
    i64::try_from(user.id.0).unwrap_or_default()
}

/// Sender of a message; channel posts have none.
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(user_id_of)
}
