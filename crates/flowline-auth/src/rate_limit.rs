use std::time::Duration;

use dashmap::DashMap;
use flowline_core::window::Window;

use crate::error::{AuthError, Result};

/// Fixed-window request counter, keyed by whatever scope the caller chooses
/// (business id for admin writes, platform+sender for message ingress, a
/// constant key for the global daily cap).
///
/// No rate-limiting crate exists anywhere in the retrieval pack this was
/// built from, so this rolls its own over the shared `Window` type rather
/// than reaching for an unfamiliar dependency.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    limit: usize,
    period: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, period: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            period,
        }
    }

    /// Records one event for `key` and returns `Ok(())` if still under the
    /// limit, `Err(RateLimited)` otherwise.
    pub fn check(&self, key: &str) -> Result<()> {
        let mut window = self.windows.entry(key.to_string()).or_default();
        let count = window.record(self.period);
        if count > self.limit {
            return Err(AuthError::RateLimited {
                retry_after_secs: self.period.as_secs(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
    }
}
