//! Per-business circuit breaker over response-generation failures, sharing
//! the `Window` helper the `flowline-auth` rate limiter also uses.

use std::time::Duration;

use dashmap::DashMap;
use flowline_core::ids::BusinessId;
use flowline_core::window::Window;

pub struct CircuitBreaker {
    windows: DashMap<BusinessId, Window>,
    threshold: u32,
    window: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, window_secs: u64) -> Self {
        Self {
            windows: DashMap::new(),
            threshold,
            window: Duration::from_secs(window_secs),
        }
    }

    /// True when the business has tripped the breaker — callers should
    /// short-circuit Phase 3 straight to the fallback reply.
    pub fn is_tripped(&self, business_id: &BusinessId) -> bool {
        let mut entry = self.windows.entry(business_id.clone()).or_default();
        entry.count(self.window) as u32 >= self.threshold
    }

    /// Records one Phase-3 failure for `business_id`.
    pub fn record_failure(&self, business_id: &BusinessId) {
        let mut entry = self.windows.entry(business_id.clone()).or_default();
        entry.record(self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        let business_id = BusinessId::new();
        assert!(!breaker.is_tripped(&business_id));

        breaker.record_failure(&business_id);
        breaker.record_failure(&business_id);
        assert!(!breaker.is_tripped(&business_id));

        breaker.record_failure(&business_id);
        assert!(breaker.is_tripped(&business_id));
    }

    #[test]
    fn businesses_are_isolated() {
        let breaker = CircuitBreaker::new(1, 60);
        let a = BusinessId::new();
        let b = BusinessId::new();
        breaker.record_failure(&a);
        assert!(breaker.is_tripped(&a));
        assert!(!breaker.is_tripped(&b));
    }
}
