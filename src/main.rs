//! Due-diligence API gateway.
//!
//! ```text
//!     Client ──▶ security headers / CORS / trace / request id
//!                    │
//!                    ▼
//!               RequestGate (per route)
//!                 rate limit → fields → pattern scan → sanitize → symbol
//!                    │
//!                    ▼
//!               handler ──▶ FMP | Alpha Vantage | Gemini
//! ```

use std::path::PathBuf;

use clap::Parser;

use diligence_gateway::config::loader::{load_config, load_from_env};
use diligence_gateway::lifecycle::startup;
use diligence_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "diligence-gateway")]
#[command(about = "Rate-limited, input-hardened gateway for due-diligence data", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus environment overrides when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "diligence-gateway starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
