//! Per-origin rate limiter (spec.md §4.3). Scheduler-owned; never shared by
//! address with workers.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

pub struct RateLimiter {
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            next_allowed: Mutex::new(HashMap::new()),
        }
    }

    /// `wait = max(now, nextAllowed[origin])`; `nextAllowed[origin] = wait +
    /// delay`. `delay_ms == 0` is a no-op that always returns `now`.
    pub async fn compute_wait(&self, origin: &str, delay_ms: u64) -> Instant {
        let now = Instant::now();
        if delay_ms == 0 {
            return now;
        }
        let delay = Duration::from_millis(delay_ms);
        let mut table = self.next_allowed.lock().await;
        let wait = match table.get(origin) {
            Some(next) => now.max(*next),
            None => now,
        };
        table.insert(origin.to_string(), wait + delay);
        wait
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successive_deadlines_are_nondecreasing_and_spaced() {
        let limiter = RateLimiter::new();
        let d1 = limiter.compute_wait("https://x.com", 50).await;
        let d2 = limiter.compute_wait("https://x.com", 50).await;
        let d3 = limiter.compute_wait("https://x.com", 50).await;
        assert!(d2 >= d1);
        assert!(d3 >= d2);
        assert!(d2.duration_since(d1) >= Duration::from_millis(50));
        assert!(d3.duration_since(d2) >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn zero_delay_is_a_no_op() {
        let limiter = RateLimiter::new();
        let before = Instant::now();
        let d1 = limiter.compute_wait("https://x.com", 0).await;
        let d2 = limiter.compute_wait("https://x.com", 0).await;
        assert!(d1 >= before);
        assert!(d2 >= before);
        // no state persisted: a subsequent nonzero-delay call starts fresh from "now".
    }

    #[tokio::test]
    async fn different_origins_do_not_interfere() {
        let limiter = RateLimiter::new();
        limiter.compute_wait("https://a.com", 10_000).await;
        let start = Instant::now();
        let wait_b = limiter.compute_wait("https://b.com", 0).await;
        assert!(wait_b <= start + Duration::from_millis(5));
    }
}
