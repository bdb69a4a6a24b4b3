//! Fixed-window request quotas keyed by client
//!
//! Each [`QuotaGuard`] owns one policy; the gateway keeps one guard for
//! generation and one for compilation. A window is created or reset lazily on
//! the first request after it expires, inside the key's `DashMap` entry, so
//! read-reset-increment is a single critical section per key.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Share of calls that also sweep expired windows
const PURGE_PROBABILITY: f64 = 0.01;

/// Requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl QuotaPolicy {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// 5 generations per minute
    pub fn generation() -> Self {
        Self::new(5, 60)
    }

    /// 30 compilations per minute
    pub fn compilation() -> Self {
        Self::new(30, 60)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Outcome of one quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl QuotaDecision {
    /// Whole seconds until the window resets, at least 1
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let wait = self.reset_at.saturating_duration_since(now);
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        secs.max(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct QuotaWindow {
    count: u32,
    reset_at: Instant,
}

/// Per-client request counter
#[derive(Debug)]
pub struct QuotaGuard {
    policy: QuotaPolicy,
    windows: DashMap<String, QuotaWindow>,
}

impl QuotaGuard {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
        }
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    /// Count a request from `client_key` now
    pub fn admit(&self, client_key: &str) -> QuotaDecision {
        self.admit_at(client_key, Instant::now())
    }

    /// Count a request from `client_key` at `now`
    pub fn admit_at(&self, client_key: &str, now: Instant) -> QuotaDecision {
        // sweep before taking the entry lock; retain locks every shard
        if rand::thread_rng().gen_bool(PURGE_PROBABILITY) {
            self.purge_expired(now);
        }

        let window = self.policy.window();
        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert_with(|| QuotaWindow {
                count: 0,
                reset_at: now + window,
            });

        if now >= entry.reset_at {
            *entry = QuotaWindow {
                count: 0,
                reset_at: now + window,
            };
        }
        entry.count = entry.count.saturating_add(1);

        QuotaDecision {
            allowed: entry.count <= self.policy.max_requests,
            remaining: self.policy.max_requests.saturating_sub(entry.count),
            reset_at: entry.reset_at,
        }
    }

    /// Drop every window that has expired at `now`
    pub fn purge_expired(&self, now: Instant) {
        self.windows.retain(|_, w| now < w.reset_at);
    }

    /// Tracked clients
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixth_request_denied_within_window() {
        let guard = QuotaGuard::new(QuotaPolicy::generation());
        let start = Instant::now();

        for expected_remaining in (0..5).rev() {
            let decision = guard.admit_at("10.0.0.1", start);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let denied = guard.admit_at("10.0.0.1", start + Duration::from_secs(30));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after_secs(start + Duration::from_secs(30)), 30);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let guard = QuotaGuard::new(QuotaPolicy::generation());
        let start = Instant::now();
        for _ in 0..6 {
            guard.admit_at("10.0.0.1", start);
        }

        let later = start + Duration::from_secs(61);
        let decision = guard.admit_at("10.0.0.1", later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_at, later + Duration::from_secs(60));
    }

    #[test]
    fn test_clients_are_independent() {
        let guard = QuotaGuard::new(QuotaPolicy::new(1, 60));
        let now = Instant::now();
        assert!(guard.admit_at("a", now).allowed);
        assert!(!guard.admit_at("a", now).allowed);
        assert!(guard.admit_at("b", now).allowed);
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_purge_only_drops_expired_windows() {
        let guard = QuotaGuard::new(QuotaPolicy::new(3, 60));
        let start = Instant::now();
        guard.admit_at("old", start);
        guard.admit_at("fresh", start + Duration::from_secs(45));

        guard.purge_expired(start + Duration::from_secs(70));
        assert_eq!(guard.len(), 1);
        assert!(guard.admit_at("fresh", start + Duration::from_secs(70)).allowed);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Instant::now();
        let decision = QuotaDecision {
            allowed: false,
            remaining: 0,
            reset_at: now + Duration::from_millis(1500),
        };
        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + Duration::from_secs(5)), 1);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_limit() {
        let guard = std::sync::Arc::new(QuotaGuard::new(QuotaPolicy::new(50, 60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || {
                    (0..25).filter(|_| guard.admit("shared").allowed).count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
