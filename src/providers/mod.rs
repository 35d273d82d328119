//! Upstream providers.
//!
//! # Data Flow
//! ```text
//! handler
//!     → credential check (security::credentials)
//!     → fmp.rs / alpha_vantage.rs / gemini.rs (HTTP call with timeout)
//!     → reshape.rs (project + sanitize before echoing to the caller)
//! ```
//!
//! # Design Decisions
//! - Each provider sits behind a trait so handlers can be exercised with fakes
//! - Every provider client owns its own timeout
//! - Provider errors never reach the caller verbatim

pub mod alpha_vantage;
pub mod fmp;
pub mod gemini;
pub mod reshape;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::{validate_api_key, CredentialError};

pub use alpha_vantage::AlphaVantageClient;
pub use fmp::FmpClient;
pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("empty completion")]
    EmptyCompletion,
}

/// A provider authenticated by an API key.
pub trait Credentialed: Send + Sync {
    /// Human-readable name used in error messages.
    fn service_name(&self) -> &'static str;

    fn api_key(&self) -> Option<&str>;

    fn check_credential(&self) -> Result<(), CredentialError> {
        validate_api_key(self.api_key(), self.service_name())
    }
}

/// Financial statement families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Income,
    BalanceSheet,
    CashFlow,
}

impl Statement {
    pub fn path(&self) -> &'static str {
        match self {
            Statement::Income => "income-statement",
            Statement::BalanceSheet => "balance-sheet-statement",
            Statement::CashFlow => "cash-flow-statement",
        }
    }
}

/// Company search, profiles and statements.
#[async_trait]
pub trait MarketData: Credentialed {
    async fn search(&self, query: &str) -> Result<Value, UpstreamError>;

    async fn profile(&self, symbol: &str) -> Result<Value, UpstreamError>;

    async fn statement(&self, symbol: &str, kind: Statement, limit: u32) -> Result<Value, UpstreamError>;
}

/// Market news with sentiment.
#[async_trait]
pub trait NewsFeed: Credentialed {
    async fn news_sentiment(&self, symbol: &str) -> Result<Value, UpstreamError>;
}

/// Opaque text completion.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, UpstreamError>;
}

/// Everything the handlers call out to.
#[derive(Clone)]
pub struct Upstreams {
    pub market: Arc<dyn MarketData>,
    pub news: Arc<dyn NewsFeed>,
    /// `None` when no usable model credential is configured.
    pub llm: Option<Arc<dyn TextCompletion>>,
}

impl Upstreams {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let market = FmpClient::new(&config.providers, &config.timeouts)?;
        let news = AlphaVantageClient::new(&config.providers, &config.timeouts)?;

        let llm: Option<Arc<dyn TextCompletion>> =
            match validate_api_key(config.llm.api_key.as_deref(), gemini::SERVICE_NAME) {
                Ok(()) => Some(Arc::new(GeminiClient::new(&config.llm, &config.timeouts)?)),
                Err(e) => {
                    tracing::warn!(error = %e, "Text completion disabled");
                    None
                }
            };

        Ok(Self {
            market: Arc::new(market),
            news: Arc::new(news),
            llm,
        })
    }

    /// Log, without failing, every provider whose credential looks wrong.
    pub fn report_credentials(&self) {
        let checks = [
            (self.market.service_name(), self.market.check_credential()),
            (self.news.service_name(), self.news.check_credential()),
        ];
        for (service, check) in checks {
            match check {
                Ok(()) => tracing::info!(service, "Credential configured"),
                Err(e) => tracing::warn!(service, error = %e, "Credential misconfigured"),
            }
        }
    }
}

/// Turn a non-success status into [`UpstreamError::Status`].
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(UpstreamError::Status(status.as_u16()))
    }
}

/// Count the outcome of a provider call.
pub(crate) fn observe<T>(provider: &'static str, result: Result<T, UpstreamError>) -> Result<T, UpstreamError> {
    match &result {
        Ok(_) => metrics::record_upstream(provider, "ok"),
        Err(e) => {
            metrics::record_upstream(provider, "error");
            tracing::debug!(provider, error = %e, "Upstream call failed");
        }
    }
    result
}
