//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build one `RequestGate` per endpoint from the rate-limit config
//! - Create the axum Router with handlers and their gates
//! - Wire up middleware (security headers, CORS, tracing, request ID,
//!   body limit, timeout, metrics)
//! - Serve with graceful shutdown and run the rate-limiter sweeper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{GatewayConfig, SecurityConfig};
use crate::gate::{gate_middleware, FieldPolicy, RequestGate, SymbolSource};
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::observability::metrics;
use crate::providers::{MarketData, NewsFeed, TextCompletion, UpstreamError, Upstreams};
use crate::security::headers::security_header_layers;
use crate::security::rate_limit::run_sweeper;
use crate::security::{RateLimitPolicy, RateLimiter, SecurityEventLog};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: GatewayConfig,
    limiter: Arc<RateLimiter>,
    events: Arc<SecurityEventLog>,
    upstreams: Upstreams,
}

impl AppState {
    pub fn new(config: GatewayConfig, upstreams: Upstreams, limiter: Arc<RateLimiter>) -> Self {
        let events = Arc::new(SecurityEventLog::new(config.security.event_log_capacity));
        Self {
            inner: Arc::new(InnerState {
                config,
                limiter,
                events,
                upstreams,
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    pub fn events(&self) -> &Arc<SecurityEventLog> {
        &self.inner.events
    }

    pub fn market(&self) -> &Arc<dyn MarketData> {
        &self.inner.upstreams.market
    }

    pub fn news(&self) -> &Arc<dyn NewsFeed> {
        &self.inner.upstreams.news
    }

    pub fn llm(&self) -> Option<&Arc<dyn TextCompletion>> {
        self.inner.upstreams.llm.as_ref()
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server talking to the real providers.
    pub fn new(config: GatewayConfig) -> Result<Self, UpstreamError> {
        let upstreams = Upstreams::from_config(&config)?;
        Ok(Self::with_upstreams(config, upstreams))
    }

    pub fn with_upstreams(config: GatewayConfig, upstreams: Upstreams) -> Self {
        Self::with_parts(config, upstreams, Arc::new(RateLimiter::new()))
    }

    /// Full control over the collaborators, mostly for tests that need a
    /// manual clock.
    pub fn with_parts(config: GatewayConfig, upstreams: Upstreams, limiter: Arc<RateLimiter>) -> Self {
        let state = AppState::new(config, upstreams, limiter);
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatewayConfig {
        self.state.config()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let rate_limit = &self.state.config().rate_limit;
        if rate_limit.enabled && rate_limit.sweep_interval_secs > 0 {
            match Duration::try_from_secs_f64(rate_limit.endpoints.longest_window_secs()) {
                Ok(max_window) => {
                    tokio::spawn(run_sweeper(
                        self.state.limiter().clone(),
                        Duration::from_secs(rate_limit.sweep_interval_secs),
                        max_window,
                        shutdown.resubscribe(),
                    ));
                }
                Err(e) => tracing::warn!(error = %e, "Rate-limit window out of range, sweeper disabled"),
            }
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with every endpoint, its gate and the shared layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config().clone();
    let limits = &config.rate_limit.endpoints;

    let gate = |endpoint: &'static str, policy: RateLimitPolicy| {
        RequestGate::builder(endpoint, state.limiter().clone(), state.events().clone())
            .rate_limit(config.rate_limit.enabled.then_some(policy))
            .trust_forwarded_for(config.rate_limit.trust_forwarded_for)
    };
    let search = Arc::new(
        gate("search_company", limits.search_company)
            .require_field(FieldPolicy::new("query", 100, false))
            .build(),
    );
    let profile = Arc::new(
        gate("company_profile", limits.company_profile)
            .validate_symbol(SymbolSource::path("symbol"))
            .build(),
    );
    let statements = Arc::new(
        gate("financial_statements", limits.financial_statements)
            .validate_symbol(SymbolSource::path("symbol"))
            .build(),
    );
    let news = Arc::new(
        gate("market_news", limits.market_news)
            .validate_symbol(SymbolSource::path("symbol"))
            .build(),
    );
    let analyze = Arc::new(
        gate("analyze_company", limits.analyze_company)
            .require_field(FieldPolicy::new("symbol", 10, false))
            .validate_symbol(SymbolSource::body("symbol"))
            .build(),
    );

    let mut router = Router::new()
        .route(
            "/search-company",
            post(handlers::search_company).route_layer(from_fn_with_state(search, gate_middleware)),
        )
        .route(
            "/company-profile/{symbol}",
            get(handlers::company_profile).route_layer(from_fn_with_state(profile, gate_middleware)),
        )
        .route(
            "/financial-statements/{symbol}",
            get(handlers::financial_statements).route_layer(from_fn_with_state(statements, gate_middleware)),
        )
        .route(
            "/market-news/{symbol}",
            get(handlers::market_news).route_layer(from_fn_with_state(news, gate_middleware)),
        )
        .route(
            "/analyze-company",
            post(handlers::analyze_company).route_layer(from_fn_with_state(analyze, gate_middleware)),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(middleware::from_fn(track_metrics))
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(cors_layer(&config.security))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

    if config.security.enable_headers {
        for layer in security_header_layers() {
            router = router.layer(layer);
        }
    }

    router
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = request_id(request).unwrap_or("-"),
            )
        }))
        .layer(set_request_id_layer())
}

/// Permissive by default. An explicit origin list narrows it.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origin = if security.cors_allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = security
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), &route, start);
    response
}
