//! Alpha Vantage news-sentiment client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{ProvidersConfig, TimeoutConfig};
use crate::providers::{check_status, observe, Credentialed, NewsFeed, UpstreamError};

pub const SERVICE_NAME: &str = "Alpha Vantage";

#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageClient {
    pub fn new(providers: &ProvidersConfig, timeouts: &TimeoutConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeouts.news_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: providers.alpha_vantage_base_url.clone(),
            api_key: providers.alpha_vantage_api_key.clone(),
        })
    }
}

impl Credentialed for AlphaVantageClient {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[async_trait]
impl NewsFeed for AlphaVantageClient {
    async fn news_sentiment(&self, symbol: &str) -> Result<Value, UpstreamError> {
        let key = self.api_key.as_deref().unwrap_or_default();
        let result = async {
            let response = self
                .client
                .get(&self.base_url)
                .query(&[("function", "NEWS_SENTIMENT"), ("tickers", symbol), ("apikey", key)])
                .send()
                .await?;
            let response = check_status(response)?;
            Ok::<_, UpstreamError>(response.json::<Value>().await?)
        }
        .await;
        observe("alpha_vantage", result)
    }
}
