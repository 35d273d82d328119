//! Startup orchestration.
//!
//! Order: metrics exporter, provider clients (with a credential report),
//! listener bind, then serve until a termination signal. Any failure before
//! serving is fatal.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::providers::{UpstreamError, Upstreams};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address {address}: {source}")]
    MetricsAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to initialize provider clients: {0}")]
    Providers(#[from] UpstreamError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start the gateway and block until it has shut down.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let observability = &config.observability;
    if observability.metrics_enabled {
        let addr: SocketAddr =
            observability
                .metrics_address
                .parse()
                .map_err(|source| StartupError::MetricsAddress {
                    address: observability.metrics_address.clone(),
                    source,
                })?;
        metrics::init_metrics(addr);
    }

    let upstreams = Upstreams::from_config(&config)?;
    upstreams.report_credentials();
    if upstreams.llm.is_none() {
        tracing::warn!("No model key configured, analysis falls back to the rule-based report");
    }

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    tracing::info!(
        address = %address,
        rate_limiting = config.rate_limit.enabled,
        security_headers = config.security.enable_headers,
        "Gateway ready"
    );

    let server = HttpServer::with_upstreams(config, upstreams);
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, rx).await.map_err(StartupError::Serve)
}
