//! Per-agent admission state
//!
//! One `AdmissionState` exists per registered agent and holds everything
//! the admission decision and the drain routine mutate: the sliding-window
//! timestamp deque, the running-execution counter, and the priority queue.
//! All of it is serialized under a single per-agent mutex owned by the
//! registry entry; a concurrent "slot freed" drain and an incoming
//! admission check can never interleave.

use crate::agent::definition::RateLimit;
use crate::dispatch::queue::DispatchQueue;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Mutable admission-control state for one agent
#[derive(Debug, Default)]
pub(crate) struct AdmissionState {
    /// Admission timestamps inside the trailing rate-limit window
    window: VecDeque<Instant>,

    /// Currently-executing request count
    pub running: usize,

    /// Requests admitted past the rate limit but waiting for a slot
    pub queue: DispatchQueue,

    /// Set at unregistration; blocks all further admissions
    pub closed: bool,
}

impl AdmissionState {
    /// Drop window timestamps older than the trailing window
    fn evict_expired(&mut self, limit: &RateLimit, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) >= limit.window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the trailing window has room for one more admission.
    /// Evicts expired timestamps but records nothing; the caller records
    /// the admission only when the request actually proceeds to execution.
    pub fn rate_has_room(&mut self, limit: Option<&RateLimit>, now: Instant) -> bool {
        match limit {
            None => true,
            Some(limit) => {
                self.evict_expired(limit, now);
                self.window.len() < limit.max_requests
            }
        }
    }

    /// Record one admission timestamp
    pub fn record_admission(&mut self, limit: Option<&RateLimit>, now: Instant) {
        if limit.is_some() {
            self.window.push_back(now);
        }
    }

    /// Whether a concurrency slot is free
    pub fn slot_available(&self, max_concurrent: Option<usize>) -> bool {
        match max_concurrent {
            None => true,
            Some(max) => self.running < max,
        }
    }

    #[cfg(test)]
    fn window_len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limit(max_requests: usize, window_ms: u64) -> RateLimit {
        RateLimit {
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_fills_and_rejects() {
        let mut state = AdmissionState::default();
        let limit = limit(2, 1000);

        for _ in 0..2 {
            let now = Instant::now();
            assert!(state.rate_has_room(Some(&limit), now));
            state.record_admission(Some(&limit), now);
        }

        assert!(!state.rate_has_room(Some(&limit), Instant::now()));
        assert_eq!(state.window_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let mut state = AdmissionState::default();
        let limit = limit(2, 1000);

        let now = Instant::now();
        state.record_admission(Some(&limit), now);
        state.record_admission(Some(&limit), now);
        assert!(!state.rate_has_room(Some(&limit), Instant::now()));

        // Past the window, both timestamps expire
        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(state.rate_has_room(Some(&limit), Instant::now()));
        assert_eq!(state.window_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_expiry() {
        let mut state = AdmissionState::default();
        let limit = limit(2, 1000);

        state.record_admission(Some(&limit), Instant::now());
        tokio::time::advance(Duration::from_millis(600)).await;
        state.record_admission(Some(&limit), Instant::now());
        assert!(!state.rate_has_room(Some(&limit), Instant::now()));

        // First timestamp expires, second is still inside the window
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(state.rate_has_room(Some(&limit), Instant::now()));
        assert_eq!(state.window_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_limit_always_has_room() {
        let mut state = AdmissionState::default();
        for _ in 0..100 {
            let now = Instant::now();
            assert!(state.rate_has_room(None, now));
            state.record_admission(None, now);
        }
        // Nothing recorded without a configured limit
        assert_eq!(state.window_len(), 0);
    }

    #[test]
    fn test_slot_accounting() {
        let mut state = AdmissionState::default();
        assert!(state.slot_available(Some(2)));
        state.running = 2;
        assert!(!state.slot_available(Some(2)));
        assert!(state.slot_available(None));
    }
}
