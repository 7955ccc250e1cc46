use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Per-user cooldown between browse commands.
///
/// A user who issued a browse command is blocked until the cooldown elapses.
/// A rejected request never extends the window.
#[derive(Clone)]
pub struct RateLimiter {
    /// Instant until which each user is limited
    limits: Arc<Mutex<HashMap<i64, Instant>>>,
    cooldown: Duration,
}

impl RateLimiter {
    /// Creates a rate limiter with the given cooldown.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            limits: Arc::new(Mutex::new(HashMap::new())),
            cooldown,
        }
    }

    /// Checks and, if allowed, stamps in one step.
    ///
    /// Returns `Err(remaining)` when the user is still limited.
    pub async fn try_acquire(&self, user_id: i64) -> Result<(), Duration> {
        let mut limits = self.limits.lock().await;
        let now = Instant::now();
        if let Some(&until) = limits.get(&user_id) {
            if now < until {
                return Err(until - now);
            }
        }
        limits.retain(|_, until| *until > now);
        limits.insert(user_id, now + self.cooldown);
        Ok(())
    }

    /// Removes the limit for the user (used by /reset).
    pub async fn remove_rate_limit(&self, user_id: i64) {
        let mut limits = self.limits.lock().await;
        limits.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_blocks_within_cooldown() {
        let limiter = RateLimiter::new(Duration::from_secs(3));

        assert!(limiter.try_acquire(1).await.is_ok());
        let remaining = limiter.try_acquire(1).await.unwrap_err();
        assert!(remaining <= Duration::from_secs(3));

        // Other users are unaffected
        assert!(limiter.try_acquire(2).await.is_ok());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(limiter.try_acquire(1).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_rate_limit() {
        let limiter = RateLimiter::new(Duration::from_secs(30));
        limiter.try_acquire(7).await.unwrap();
        assert!(limiter.try_acquire(7).await.is_err());

        limiter.remove_rate_limit(7).await;
        assert!(limiter.try_acquire(7).await.is_ok());
    }
}
