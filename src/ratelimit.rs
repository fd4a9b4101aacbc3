use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{FollowGraphError, Result};
use crate::model::UserId;

/// Throttles follow-graph writes per user
pub trait RateLimiter: Send + Sync {
    fn check(&self, user: &UserId, action: &str) -> Result<()>;
}

/// Lets everything through
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _user: &UserId, _action: &str) -> Result<()> {
        Ok(())
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed per-user windows, held in a bounded LRU so idle users fall out
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<LruCache<UserId, Window>>,
}

impl FixedWindowRateLimiter {
    /// `limit` actions per user per `window`, tracking at most `capacity` users
    pub fn new(limit: u32, window: Duration, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            limit,
            window,
            windows: Mutex::new(LruCache::new(cap)),
        }
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, user: &UserId, action: &str) -> Result<()> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.get_or_insert_mut(user.clone(), || Window { started: now, count: 0 });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.limit {
            log::debug!("rate limited {} on {}", user, action);
            return Err(FollowGraphError::RateLimited(format!(
                "too many follow actions, limit is {} per {}s",
                self.limit,
                self.window.as_secs()
            )));
        }
        window.count += 1;
        Ok(())
    }
}

/// Build the limiter named in the config
pub fn from_config(config: &Config) -> Arc<dyn RateLimiter> {
    if config.rate_limit.actions_per_minute == 0 {
        Arc::new(NoopRateLimiter)
    } else {
        Arc::new(FixedWindowRateLimiter::new(
            config.rate_limit.actions_per_minute,
            Duration::from_secs(60),
            config.rate_limit.tracked_users,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_enforced_per_user() {
        let limiter = FixedWindowRateLimiter::new(2, Duration::from_secs(60), 10);
        let alice = UserId::parse("alice").unwrap();
        let bob = UserId::parse("bob").unwrap();

        assert!(limiter.check(&alice, "follow").is_ok());
        assert!(limiter.check(&alice, "unfollow").is_ok());
        let err = limiter.check(&alice, "follow").unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert!(limiter.check(&bob, "follow").is_ok());
    }

    #[test]
    fn test_window_resets() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_millis(20), 10);
        let alice = UserId::parse("alice").unwrap();
        assert!(limiter.check(&alice, "follow").is_ok());
        assert!(limiter.check(&alice, "follow").is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check(&alice, "follow").is_ok());
    }

    #[test]
    fn test_noop_never_limits() {
        let alice = UserId::parse("alice").unwrap();
        for _ in 0..1000 {
            assert!(NoopRateLimiter.check(&alice, "follow").is_ok());
        }
    }
}
