//! Sliding-window rate limiter for remote calls
//!
//! Enforces two joint constraints on every remote request: at most
//! `max_per_window` grants in any trailing window, and at least `min_spacing`
//! between consecutive grants.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Rolling request budget shared by all remote calls of a coordinator
///
/// Callers of [`acquire`](Self::acquire) line up on a fair async mutex and are
/// granted one at a time in arrival order. The grant ledger has its own short
/// lock that is never held across a wait, so introspection stays immediate.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    min_spacing: Duration,
    queue: tokio::sync::Mutex<()>,
    ledger: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_per_window: usize, window: Duration, min_spacing: Duration) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            window,
            min_spacing,
            queue: tokio::sync::Mutex::new(()),
            ledger: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a rate limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_per_window,
            config.window(),
            config.min_spacing(),
        )
    }

    /// Wait until a request is permitted, then record the grant
    ///
    /// Dropping the returned future before it completes records nothing.
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;

        loop {
            let wait = {
                let mut ledger = self.ledger();
                let now = Instant::now();
                prune(&mut ledger, now, self.window);

                match self.wait_needed(&ledger, now) {
                    Some(wait) => {
                        debug!(
                            wait_ms = wait.as_millis() as u64,
                            in_window = ledger.len(),
                            "Waiting for rate limit"
                        );
                        wait
                    }
                    None => {
                        ledger.push_back(now);
                        return;
                    }
                }
            };

            tokio::time::sleep(wait).await;
        }
    }

    /// Number of grants in the trailing window
    pub fn current_count(&self) -> usize {
        let mut ledger = self.ledger();
        prune(&mut ledger, Instant::now(), self.window);
        ledger.len()
    }

    /// How long an `acquire()` issued now would have to wait
    ///
    /// Ignores callers already queued on the limiter.
    pub fn time_until_available(&self) -> Duration {
        let mut ledger = self.ledger();
        let now = Instant::now();
        prune(&mut ledger, now, self.window);
        let spacing = self.spacing_wait(&ledger, now).unwrap_or_default();
        let window = self.window_wait(&ledger, now).unwrap_or_default();
        spacing.max(window)
    }

    fn ledger(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_needed(&self, ledger: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        self.spacing_wait(ledger, now)
            .or_else(|| self.window_wait(ledger, now))
    }

    fn spacing_wait(&self, ledger: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        let last = ledger.back()?;
        let elapsed = now.saturating_duration_since(*last);
        (elapsed < self.min_spacing).then(|| self.min_spacing - elapsed)
    }

    fn window_wait(&self, ledger: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        if ledger.len() < self.max_per_window {
            return None;
        }
        let oldest = ledger.front()?;
        Some((*oldest + self.window).saturating_duration_since(now))
    }
}

/// Drop grants that have left the trailing window
fn prune(ledger: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while ledger
        .front()
        .map_or(false, |t| now.saturating_duration_since(*t) >= window)
    {
        ledger.pop_front();
    }
}
