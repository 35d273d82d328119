//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. Every problem is reported, not
//! just the first, so an operator can fix a config file in one pass.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// One week. Longer windows only delay escalation and overflow timers.
pub const MAX_WINDOW_MINUTES: f64 = 7.0 * 24.0 * 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let timeouts = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.market_data_secs", config.timeouts.market_data_secs),
        ("timeouts.news_secs", config.timeouts.news_secs),
        ("timeouts.llm_secs", config.timeouts.llm_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    for (name, policy) in config.rate_limit.endpoints.iter() {
        if policy.max_requests == 0 {
            errors.push(ValidationError::new(
                format!("rate_limit.endpoints.{name}.max_requests"),
                "must be greater than 0",
            ));
        }
        if !(policy.window_minutes.is_finite() && policy.window_minutes > 0.0) {
            errors.push(ValidationError::new(
                format!("rate_limit.endpoints.{name}.window_minutes"),
                "must be a positive number",
            ));
        } else if policy.window_minutes > MAX_WINDOW_MINUTES {
            errors.push(ValidationError::new(
                format!("rate_limit.endpoints.{name}.window_minutes"),
                format!("must be at most {MAX_WINDOW_MINUTES}"),
            ));
        }
    }

    let urls = [
        ("providers.fmp_base_url", &config.providers.fmp_base_url),
        ("providers.alpha_vantage_base_url", &config.providers.alpha_vantage_base_url),
        ("llm.base_url", &config.llm.base_url),
    ];
    for (field, raw) in urls {
        if let Err(e) = Url::parse(raw) {
            errors.push(ValidationError::new(field, format!("'{raw}' is not a URL: {e}")));
        }
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        errors.push(ValidationError::new("llm.temperature", "must be between 0 and 2"));
    }

    if config.llm.model.trim().is_empty() {
        errors.push(ValidationError::new("llm.model", "must not be empty"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
