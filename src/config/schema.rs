//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::RateLimitPolicy;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Upstream financial data providers.
    pub providers: ProvidersConfig,

    /// Text-completion model used by `/analyze-company`.
    pub llm: LlmConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Timeout configuration, all in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline enforced at the router.
    pub request_secs: u64,

    /// Financial Modeling Prep calls.
    pub market_data_secs: u64,

    /// Alpha Vantage calls.
    pub news_secs: u64,

    /// Text-completion calls.
    pub llm_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 90,
            market_data_secs: 10,
            news_secs: 15,
            llm_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Key clients on `X-Forwarded-For` / `X-Real-IP` when present.
    pub trust_forwarded_for: bool,

    /// Interval of the idle-log sweep. 0 disables it.
    pub sweep_interval_secs: u64,

    /// Per-endpoint policies.
    pub endpoints: EndpointLimits,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_forwarded_for: true,
            sweep_interval_secs: 60,
            endpoints: EndpointLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointLimits {
    pub search_company: RateLimitPolicy,
    pub company_profile: RateLimitPolicy,
    pub financial_statements: RateLimitPolicy,
    pub market_news: RateLimitPolicy,
    pub analyze_company: RateLimitPolicy,
}

impl EndpointLimits {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &RateLimitPolicy)> {
        [
            ("search_company", &self.search_company),
            ("company_profile", &self.company_profile),
            ("financial_statements", &self.financial_statements),
            ("market_news", &self.market_news),
            ("analyze_company", &self.analyze_company),
        ]
        .into_iter()
    }

    /// Longest window across all endpoints, in seconds.
    pub fn longest_window_secs(&self) -> f64 {
        self.iter()
            .map(|(_, p)| p.window_secs())
            .fold(0.0, f64::max)
    }
}

impl Default for EndpointLimits {
    fn default() -> Self {
        Self {
            search_company: RateLimitPolicy::per_minute(20),
            company_profile: RateLimitPolicy::per_minute(30),
            financial_statements: RateLimitPolicy::per_minute(20),
            market_news: RateLimitPolicy::per_minute(15),
            analyze_company: RateLimitPolicy::per_minute(5),
        }
    }
}

/// Upstream provider configuration. Keys are usually supplied through the
/// environment rather than the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub fmp_base_url: String,
    pub fmp_api_key: Option<String>,
    pub alpha_vantage_base_url: String,
    pub alpha_vantage_api_key: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            fmp_base_url: "https://financialmodelingprep.com/api/v3".to_string(),
            fmp_api_key: None,
            alpha_vantage_base_url: "https://www.alphavantage.co/query".to_string(),
            alpha_vantage_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            temperature: 0.6,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Attach hardening headers to every response.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Security events retained in memory.
    pub event_log_capacity: usize,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 64 * 1024,
            event_log_capacity: 1024,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "diligence_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
