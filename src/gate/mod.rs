//! Per-endpoint request gate.
//!
//! # Data Flow
//! ```text
//! Request
//!     → resolve ClientId
//!     → admit(): blocked? → rate window                    (no body read)
//!     → validate(): required fields → pattern scan → sanitize → symbol shape
//!     → handler sees the sanitized body and a ClientId extension
//! ```
//!
//! # Design Decisions
//! - One `RequestGate` per route, built once at router construction
//! - The checks themselves are synchronous; `middleware.rs` adapts them to axum
//! - Rate limiting runs before any input is read, so abusive clients cost
//!   nothing beyond a map lookup
//! - Every rejection is written to the security event log

mod middleware;

pub use middleware::gate_middleware;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{GatewayError, InvalidInput};
use crate::observability::metrics;
use crate::security::events::{truncate_chars, MAX_ECHOED_VALUE_CHARS};
use crate::security::{
    is_valid_symbol, sanitize_str, scan, Admission, ClientId, RateLimitPolicy, RateLimiter, Scan,
    SecurityEventKind, SecurityEventLog,
};

/// A body field the endpoint requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    pub name: String,
    pub max_length: usize,
    pub allow_special_chars: bool,
}

impl FieldPolicy {
    pub fn new(name: impl Into<String>, max_length: usize, allow_special_chars: bool) -> Self {
        Self {
            name: name.into(),
            max_length,
            allow_special_chars,
        }
    }
}

/// Where the ticker symbol to validate lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSource {
    Path(String),
    Body(String),
}

impl SymbolSource {
    pub fn path(name: impl Into<String>) -> Self {
        SymbolSource::Path(name.into())
    }

    pub fn body(name: impl Into<String>) -> Self {
        SymbolSource::Body(name.into())
    }
}

/// The parts of a request the gate inspects. `body` is rewritten in place
/// with sanitized values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateInput {
    pub path_params: Vec<(String, String)>,
    pub body: Map<String, Value>,
}

impl GateInput {
    fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub struct RequestGate {
    endpoint: &'static str,
    rate_limit: Option<RateLimitPolicy>,
    fields: Vec<FieldPolicy>,
    symbol: Option<SymbolSource>,
    trust_forwarded_for: bool,
    limiter: Arc<RateLimiter>,
    events: Arc<SecurityEventLog>,
}

pub struct RequestGateBuilder {
    gate: RequestGate,
}

impl RequestGateBuilder {
    /// `None` disables rate limiting for this endpoint.
    pub fn rate_limit(mut self, policy: impl Into<Option<RateLimitPolicy>>) -> Self {
        self.gate.rate_limit = policy.into();
        self
    }

    pub fn require_field(mut self, field: FieldPolicy) -> Self {
        self.gate.fields.push(field);
        self
    }

    pub fn validate_symbol(mut self, source: SymbolSource) -> Self {
        self.gate.symbol = Some(source);
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.gate.trust_forwarded_for = trust;
        self
    }

    pub fn build(self) -> RequestGate {
        self.gate
    }
}

impl RequestGate {
    pub fn builder(
        endpoint: &'static str,
        limiter: Arc<RateLimiter>,
        events: Arc<SecurityEventLog>,
    ) -> RequestGateBuilder {
        RequestGateBuilder {
            gate: RequestGate {
                endpoint,
                rate_limit: None,
                fields: Vec::new(),
                symbol: None,
                trust_forwarded_for: true,
                limiter,
                events,
            },
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    /// Whether [`validate`](Self::validate) looks at the request body.
    pub fn needs_body(&self) -> bool {
        !self.fields.is_empty() || matches!(self.symbol, Some(SymbolSource::Body(_)))
    }

    pub fn needs_path(&self) -> bool {
        matches!(self.symbol, Some(SymbolSource::Path(_)))
    }

    /// Block list and rate window. Runs before anything is read from the
    /// request.
    pub fn admit(&self, client: &ClientId) -> Result<(), GatewayError> {
        let Some(policy) = &self.rate_limit else {
            return Ok(());
        };

        match self.limiter.admit(client.as_str(), policy) {
            Admission::Allowed => Ok(()),
            Admission::Limited { retry_after_secs } => {
                metrics::record_rate_limited(self.endpoint);
                self.events.record(
                    SecurityEventKind::RateLimited,
                    client.as_str(),
                    &format!("Endpoint: {}, retry after {}s", self.endpoint, retry_after_secs),
                );
                Err(GatewayError::RateLimited {
                    retry_after: retry_after_secs,
                })
            }
            Admission::Blocked => {
                self.events.record(
                    SecurityEventKind::ClientBlocked,
                    client.as_str(),
                    &format!("Endpoint: {}", self.endpoint),
                );
                Err(GatewayError::Blocked)
            }
        }
    }

    /// Field presence, pattern scan, sanitization and symbol shape, in that
    /// order. On success `input.body` holds the sanitized values.
    pub fn validate(&self, client: &ClientId, input: &mut GateInput) -> Result<(), GatewayError> {
        for field in &self.fields {
            let raw = match input.body.get(&field.name) {
                None | Some(Value::Null) => {
                    self.events.record(
                        SecurityEventKind::MissingField,
                        client.as_str(),
                        &format!("Missing required field: {}", field.name),
                    );
                    return Err(InvalidInput::MissingField(field.name.clone()).into());
                }
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };

            if let Scan::Suspicious { pattern } = scan(&raw) {
                self.events.record(
                    SecurityEventKind::SuspiciousInput,
                    client.as_str(),
                    &format!(
                        "Field: {}, Reason: Suspicious pattern detected: {}, Value: {}",
                        field.name,
                        pattern,
                        truncate_chars(&raw, MAX_ECHOED_VALUE_CHARS)
                    ),
                );
                return Err(InvalidInput::Suspicious.into());
            }

            let clean = sanitize_str(&raw, field.max_length, field.allow_special_chars);
            input.body.insert(field.name.clone(), Value::String(clean));
        }

        if let Some(source) = &self.symbol {
            let symbol = match source {
                SymbolSource::Path(name) => input.path_param(name),
                SymbolSource::Body(name) => input.body.get(name).and_then(Value::as_str),
            }
            .unwrap_or_default();

            if !is_valid_symbol(symbol) {
                self.events.record(
                    SecurityEventKind::InvalidSymbol,
                    client.as_str(),
                    &format!(
                        "Invalid symbol format: {}",
                        truncate_chars(symbol, MAX_ECHOED_VALUE_CHARS)
                    ),
                );
                return Err(InvalidInput::BadSymbol.into());
            }
        }

        Ok(())
    }

    /// [`admit`](Self::admit) then [`validate`](Self::validate).
    pub fn check(&self, client: &ClientId, input: &mut GateInput) -> Result<(), GatewayError> {
        self.admit(client)?;
        self.validate(client, input)
    }
}
