use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the due-diligence gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Sent as X-Forwarded-For, useful to exercise per-client limits.
    #[arg(long)]
    client_ip: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Analysis {
    General,
    Financial,
    Risk,
}

impl Analysis {
    fn as_str(&self) -> &'static str {
        match self {
            Analysis::General => "general",
            Analysis::Financial => "financial",
            Analysis::Risk => "risk",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Search companies by name or ticker
    Search { query: String },
    /// Company profile
    Profile { symbol: String },
    /// Income, balance-sheet and cash-flow statements
    Statements { symbol: String },
    /// News with sentiment
    News { symbol: String },
    /// LLM due-diligence analysis
    Analyze {
        symbol: String,
        #[arg(short, long, value_enum, default_value = "general")]
        kind: Analysis,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(ip) = &cli.client_ip {
        headers.insert("x-forwarded-for", HeaderValue::from_str(ip)?);
    }

    let request = match &cli.command {
        Commands::Health => client.get(format!("{base}/health")),
        Commands::Search { query } => client
            .post(format!("{base}/search-company"))
            .json(&json!({ "query": query })),
        Commands::Profile { symbol } => client.get(format!("{base}/company-profile/{symbol}")),
        Commands::Statements { symbol } => client.get(format!("{base}/financial-statements/{symbol}")),
        Commands::News { symbol } => client.get(format!("{base}/market-news/{symbol}")),
        Commands::Analyze { symbol, kind } => client
            .post(format!("{base}/analyze-company"))
            .json(&json!({ "symbol": symbol, "analysis_type": kind.as_str() })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let retry_after = res
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if !status.is_success() {
        eprintln!("Error: gateway returned status {status}");
        if let Some(secs) = retry_after {
            eprintln!("Retry after: {secs}s");
        }
        if let Some(id) = request_id {
            eprintln!("Request ID: {id}");
        }
        eprintln!("{body}");
        return Ok(());
    }

    println!("{body}");
    Ok(())
}
