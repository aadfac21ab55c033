use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::clock::{SharedClock, SystemClock};
use crate::log_rate_limit;

pub const WINDOW_SECONDS: i64 = 60;
/// Counters for buckets older than this many minutes are dropped
pub const RETAINED_BUCKETS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub retry_after_seconds: u64,
    pub remaining: u32,
    pub limit: u32,
}

/// Fixed one-minute window admission control keyed by client identifier.
///
/// State lives in process memory only; restarts forget all counters and
/// separate processes do not coordinate.
#[derive(Clone)]
pub struct RateLimiter {
    ceiling: u32,
    clock: SharedClock,
    counters: Arc<Mutex<HashMap<(String, i64), u32>>>,
}

impl RateLimiter {
    pub fn new(ceiling: u32) -> Self {
        Self::with_clock(ceiling, Arc::new(SystemClock))
    }

    pub fn with_clock(ceiling: u32, clock: SharedClock) -> Self {
        Self {
            ceiling,
            clock,
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub async fn admit(&self, client_id: &str) -> Admission {
        let now = self.clock.now().timestamp();
        let bucket = now.div_euclid(WINDOW_SECONDS);
        let key = (client_id.to_string(), bucket);

        let mut counters = self.counters.lock().await;

        let Some(count) = counters.get_mut(&key) else {
            counters.insert(key, 1);
            let before = counters.len();
            counters.retain(|(_, b), _| *b >= bucket - RETAINED_BUCKETS);
            let dropped = before - counters.len();
            if dropped > 0 {
                log_rate_limit!(cleanup, removed = dropped);
            }
            return self.allowed(1);
        };

        if *count < self.ceiling {
            *count += 1;
            let used = *count;
            return self.allowed(used);
        }

        let retry_after_seconds = (WINDOW_SECONDS - now.rem_euclid(WINDOW_SECONDS)) as u64;
        log_rate_limit!(denied, client_id = client_id, retry_after = retry_after_seconds);
        Admission {
            allowed: false,
            retry_after_seconds,
            remaining: 0,
            limit: self.ceiling,
        }
    }

    /// Number of live (client, minute) counters
    pub async fn tracked_windows(&self) -> usize {
        self.counters.lock().await.len()
    }

    fn allowed(&self, used: u32) -> Admission {
        Admission {
            allowed: true,
            retry_after_seconds: 0,
            remaining: self.ceiling.saturating_sub(used),
            limit: self.ceiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn limiter(ceiling: u32) -> (RateLimiter, ManualClock) {
        // 20 seconds into a minute
        let clock = ManualClock::at_timestamp(1_700_000_000 - 1_700_000_000 % 60 + 20);
        (RateLimiter::with_clock(ceiling, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_fourth_request_is_denied_with_ceiling_three() {
        let (limiter, _clock) = limiter(3);

        for expected_remaining in [2, 1, 0] {
            let admission = limiter.admit("10.0.0.1").await;
            assert!(admission.allowed);
            assert_eq!(admission.remaining, expected_remaining);
        }

        let denied = limiter.admit("10.0.0.1").await;
        assert!(!denied.allowed);
        assert!(denied.retry_after_seconds > 0);
        assert_eq!(denied.retry_after_seconds, 40);
    }

    #[tokio::test]
    async fn test_clients_are_tracked_independently() {
        let (limiter, _clock) = limiter(1);
        assert!(limiter.admit("alice").await.allowed);
        assert!(!limiter.admit("alice").await.allowed);
        assert!(limiter.admit("bob").await.allowed);
    }

    #[tokio::test]
    async fn test_new_minute_resets_the_count() {
        let (limiter, clock) = limiter(2);
        assert!(limiter.admit("c").await.allowed);
        assert!(limiter.admit("c").await.allowed);
        assert!(!limiter.admit("c").await.allowed);

        clock.advance(Duration::seconds(40));
        assert!(limiter.admit("c").await.allowed);
    }

    #[tokio::test]
    async fn test_old_buckets_are_cleaned_up() {
        let (limiter, clock) = limiter(10);
        limiter.admit("old-client").await;
        assert_eq!(limiter.tracked_windows().await, 1);

        clock.advance(Duration::minutes(3));
        limiter.admit("other").await;
        assert_eq!(limiter.tracked_windows().await, 2);

        clock.advance(Duration::minutes(4));
        limiter.admit("fresh").await;
        // buckets more than five minutes old are gone
        assert_eq!(limiter.tracked_windows().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_exceed_ceiling() {
        let (limiter, _clock) = limiter(25);
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit("burst").await.allowed })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 25);
    }
}
