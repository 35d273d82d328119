//! Per-client sliding-window rate limiting with permanent escalation.
//!
//! # State machine per client
//! ```text
//! Unseen ──first request──▶ Active ──count > 2 × max_requests──▶ Blocked
//!                             ▲  │
//!                             └──┘ window slides, log pruned lazily
//! ```
//!
//! Every request outside the block list is logged, including the ones that
//! are limited. Sustained over-limit traffic therefore keeps growing the log
//! until it crosses twice the limit, at which point the client is blocked for
//! the rest of the process lifetime.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::observability::metrics;

/// Source of "now" in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by.as_secs_f64();
        }
    }

    pub fn set(&self, to: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|n| *n).unwrap_or_default()
    }
}

/// Limit attached to an endpoint at startup.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RateLimitPolicy {
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Window length in minutes.
    pub window_minutes: f64,
}

impl RateLimitPolicy {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window_minutes: 1.0,
        }
    }

    pub fn window_secs(&self) -> f64 {
        self.window_minutes * 60.0
    }

    /// Wait hint returned to limited clients.
    pub fn retry_after_secs(&self) -> u64 {
        self.window_secs().ceil() as u64
    }

    /// Log size past which a client is blocked.
    fn escalation_threshold(&self) -> usize {
        self.max_requests as usize * 2
    }
}

/// Admission decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited { retry_after_secs: u64 },
    /// Permanently denied; no retry hint.
    Blocked,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Admission::Limited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Shared rate-limit state. Construct one per process (or per test) and hand
/// it around behind an `Arc`.
pub struct RateLimiter {
    logs: DashMap<String, Vec<f64>>,
    blocked: DashSet<String>,
    clock: Box<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            logs: DashMap::new(),
            blocked: DashSet::new(),
            clock: Box::new(clock),
        }
    }

    /// Decide whether `client` may proceed under `policy`.
    ///
    /// The prune-count-append sequence runs under the map's per-key guard, so
    /// two concurrent requests from one client cannot both take the last slot.
    pub fn admit(&self, client: &str, policy: &RateLimitPolicy) -> Admission {
        if self.blocked.contains(client) {
            return Admission::Blocked;
        }

        let now = self.clock.now();
        let window_start = now - policy.window_secs();

        let escalate = {
            let mut log = self.logs.entry(client.to_string()).or_default();
            log.retain(|t| *t >= window_start);

            let count = log.len();
            if count < policy.max_requests as usize {
                log.push(now);
                return Admission::Allowed;
            }

            log.push(now);
            count > policy.escalation_threshold()
        };

        if escalate {
            self.block(client, policy);
        }

        Admission::Limited {
            retry_after_secs: policy.retry_after_secs(),
        }
    }

    fn block(&self, client: &str, policy: &RateLimitPolicy) {
        if self.blocked.insert(client.to_string()) {
            self.logs.remove(client);
            metrics::record_client_blocked();
            tracing::warn!(
                target: "security",
                client = %client,
                max_requests = policy.max_requests,
                window_minutes = policy.window_minutes,
                "Client blocked after sustained rate limit violations"
            );
        }
    }

    pub fn is_blocked(&self, client: &str) -> bool {
        self.blocked.contains(client)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// Clients with a timestamp log (blocked clients excluded).
    pub fn tracked_clients(&self) -> usize {
        self.logs.len()
    }

    /// Logged timestamps for `client`, unpruned.
    pub fn logged_requests(&self, client: &str) -> usize {
        self.logs.get(client).map(|log| log.len()).unwrap_or(0)
    }

    /// Drop logs whose newest entry is older than `max_window`.
    ///
    /// `max_window` must be at least the longest window in use; such logs
    /// would be pruned to nothing on their next access anyway.
    pub fn sweep(&self, max_window: Duration) -> usize {
        let cutoff = self.clock.now() - max_window.as_secs_f64();
        let before = self.logs.len();
        self.logs
            .retain(|_, log| log.last().is_some_and(|newest| *newest >= cutoff));
        before.saturating_sub(self.logs.len())
    }
}

/// Periodically [`sweep`](RateLimiter::sweep) idle logs until `shutdown`
/// fires.
pub async fn run_sweeper(
    limiter: Arc<RateLimiter>,
    every: Duration,
    max_window: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep(max_window);
                if removed > 0 {
                    tracing::debug!(
                        removed,
                        tracked = limiter.tracked_clients(),
                        "Swept idle rate-limit logs"
                    );
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate-limit sweeper stopping");
                break;
            }
        }
    }
}
