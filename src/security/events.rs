//! Security event log.
//!
//! Append-only record of rejections and suspicious input, kept in memory
//! (bounded, oldest evicted first) and mirrored to `tracing` under the
//! `security` target. Recording never fails and never blocks on a poisoned
//! lock; a lost entry is preferable to a failed request.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::observability::metrics;

/// Longest detail string kept per event.
pub const MAX_DETAIL_CHARS: usize = 200;

/// Longest raw value echoed inside a detail string.
pub const MAX_ECHOED_VALUE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    RateLimited,
    ClientBlocked,
    MissingField,
    SuspiciousInput,
    InvalidSymbol,
    ApiError,
    AnalysisError,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::RateLimited => "RATE_LIMITED",
            SecurityEventKind::ClientBlocked => "CLIENT_BLOCKED",
            SecurityEventKind::MissingField => "MISSING_FIELD",
            SecurityEventKind::SuspiciousInput => "SUSPICIOUS_INPUT",
            SecurityEventKind::InvalidSymbol => "INVALID_SYMBOL",
            SecurityEventKind::ApiError => "API_ERROR",
            SecurityEventKind::AnalysisError => "ANALYSIS_ERROR",
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SecurityEventKind,
    pub client: String,
    pub detail: String,
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub struct SecurityEventLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl SecurityEventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, kind: SecurityEventKind, client: &str, detail: &str) {
        let event = SecurityEvent {
            timestamp: Utc::now(),
            kind,
            client: client.to_string(),
            detail: truncate_chars(detail, MAX_DETAIL_CHARS),
        };

        tracing::warn!(
            target: "security",
            kind = %event.kind,
            client = %event.client,
            detail = %event.detail,
            "Security event"
        );
        metrics::record_security_event(kind.as_str());

        if self.capacity == 0 {
            return;
        }
        if let Ok(mut events) = self.events.lock() {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }

    /// Snapshot of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count_of(&self, kind: SecurityEventKind) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.kind == kind).count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SecurityEventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}
