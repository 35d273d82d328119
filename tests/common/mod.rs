//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use diligence_gateway::config::GatewayConfig;
use diligence_gateway::providers::{
    Credentialed, MarketData, NewsFeed, Statement, TextCompletion, UpstreamError, Upstreams,
};

pub const GOOD_KEY: &str = "test-key-0123456789";

/// A request seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub body: String,
}

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives each request and returns `(status, body)`. Every request is
/// also appended to the returned log.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<Recorded>>>)
where
    F: Fn(Recorded) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let seen = log.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        seen.lock().unwrap().push(request.clone());

                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log)
}

/// Start a mock backend that always answers `200` with `body`.
pub async fn start_mock_backend(body: &'static str) -> (SocketAddr, Arc<Mutex<Vec<Recorded>>>) {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(Recorded { method, target, body })
}

/// Fake market-data provider. `None` responses fail with status 500.
pub struct FakeMarket {
    pub api_key: Option<String>,
    pub search: Option<Value>,
    pub profile: Option<Value>,
    pub income: Option<Value>,
    pub balance_sheet: Option<Value>,
    pub cash_flow: Option<Value>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeMarket {
    fn default() -> Self {
        Self {
            api_key: Some(GOOD_KEY.to_string()),
            search: Some(json!([
                {
                    "symbol": "AAPL",
                    "name": "Apple Inc.",
                    "currency": "USD",
                    "stockExchange": "NASDAQ Global Select",
                    "exchangeShortName": "NASDAQ"
                }
            ])),
            profile: Some(json!([
                {
                    "symbol": "AAPL",
                    "companyName": "Apple Inc.",
                    "sector": "Technology",
                    "industry": "Consumer Electronics",
                    "description": "Designs iPhone & Mac (<b>consumer</b>).\u{0007}",
                    "mktCap": 3000000000000u64,
                    "price": 189.5,
                    "fullTimeEmployees": "164000",
                    "website": "https://www.apple.com",
                    "country": "US",
                    "currency": "USD"
                }
            ])),
            income: Some(json!([{ "date": "2024-09-28", "revenue": 391035000000u64 }])),
            balance_sheet: Some(json!([{ "date": "2024-09-28", "totalAssets": 364980000000u64 }])),
            cash_flow: Some(json!([{ "date": "2024-09-28", "freeCashFlow": 108807000000u64 }])),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMarket {
    fn answer(&self, call: String, value: &Option<Value>) -> Result<Value, UpstreamError> {
        self.calls.lock().unwrap().push(call);
        value.clone().ok_or(UpstreamError::Status(500))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Credentialed for FakeMarket {
    fn service_name(&self) -> &'static str {
        "Financial Modeling Prep"
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn search(&self, query: &str) -> Result<Value, UpstreamError> {
        self.answer(format!("search:{query}"), &self.search)
    }

    async fn profile(&self, symbol: &str) -> Result<Value, UpstreamError> {
        self.answer(format!("profile:{symbol}"), &self.profile)
    }

    async fn statement(&self, symbol: &str, kind: Statement, limit: u32) -> Result<Value, UpstreamError> {
        let value = match kind {
            Statement::Income => &self.income,
            Statement::BalanceSheet => &self.balance_sheet,
            Statement::CashFlow => &self.cash_flow,
        };
        self.answer(format!("{}:{symbol}:{limit}", kind.path()), value)
    }
}

pub struct FakeNews {
    pub api_key: Option<String>,
    pub response: Option<Value>,
}

impl Default for FakeNews {
    fn default() -> Self {
        Self {
            api_key: Some(GOOD_KEY.to_string()),
            response: Some(json!({ "items": "1", "feed": [{ "title": "Apple beats estimates" }] })),
        }
    }
}

impl Credentialed for FakeNews {
    fn service_name(&self) -> &'static str {
        "Alpha Vantage"
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[async_trait]
impl NewsFeed for FakeNews {
    async fn news_sentiment(&self, _symbol: &str) -> Result<Value, UpstreamError> {
        self.response.clone().ok_or(UpstreamError::Status(503))
    }
}

/// Fake model that records its prompts.
#[derive(Default)]
pub struct FakeLlm {
    pub reply: Option<String>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletion for FakeLlm {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, UpstreamError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.reply.clone().ok_or(UpstreamError::EmptyCompletion)
    }
}

/// Fakes wired into an [`Upstreams`], keeping handles for assertions.
pub struct Fakes {
    pub market: Arc<FakeMarket>,
    pub news: Arc<FakeNews>,
    pub llm: Option<Arc<FakeLlm>>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            market: Arc::new(FakeMarket::default()),
            news: Arc::new(FakeNews::default()),
            llm: Some(Arc::new(FakeLlm::replying("Solid <b>fundamentals</b>."))),
        }
    }
}

impl Fakes {
    pub fn upstreams(&self) -> Upstreams {
        Upstreams {
            market: self.market.clone(),
            news: self.news.clone(),
            llm: self
                .llm
                .clone()
                .map(|llm| llm as Arc<dyn TextCompletion>),
        }
    }
}

/// Default config with metrics off and fast timeouts.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.timeouts.request_secs = 5;
    config.rate_limit.sweep_interval_secs = 0;
    config
}

/// A parsed response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    TestResponse { status, headers, body }
}

pub fn get(uri: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, client_ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_raw(uri: &str, client_ip: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
