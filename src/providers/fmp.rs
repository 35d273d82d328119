//! Financial Modeling Prep client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{ProvidersConfig, TimeoutConfig};
use crate::providers::{check_status, observe, Credentialed, MarketData, Statement, UpstreamError};

pub const SERVICE_NAME: &str = "Financial Modeling Prep";

#[derive(Clone)]
pub struct FmpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FmpClient {
    pub fn new(providers: &ProvidersConfig, timeouts: &TimeoutConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeouts.market_data_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: providers.fmp_base_url.trim_end_matches('/').to_string(),
            api_key: providers.fmp_api_key.clone(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, UpstreamError> {
        let key = self.api_key.as_deref().unwrap_or_default();
        let result = async {
            let response = self
                .client
                .get(format!("{}/{}", self.base_url, path))
                .query(query)
                .query(&[("apikey", key)])
                .send()
                .await?;
            let response = check_status(response)?;
            Ok::<_, UpstreamError>(response.json::<Value>().await?)
        }
        .await;
        observe("fmp", result)
    }
}

impl Credentialed for FmpClient {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[async_trait]
impl MarketData for FmpClient {
    async fn search(&self, query: &str) -> Result<Value, UpstreamError> {
        self.get_json("search", &[("query", query)]).await
    }

    async fn profile(&self, symbol: &str) -> Result<Value, UpstreamError> {
        self.get_json(&format!("profile/{symbol}"), &[]).await
    }

    async fn statement(&self, symbol: &str, kind: Statement, limit: u32) -> Result<Value, UpstreamError> {
        let limit = limit.to_string();
        self.get_json(&format!("{}/{symbol}", kind.path()), &[("limit", limit.as_str())])
            .await
    }
}
