//! Endpoint handlers.
//!
//! Handlers run behind their route's [`RequestGate`](crate::gate::RequestGate),
//! so bodies are already sanitized and path symbols already have ticker
//! shape by the time they get here.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analysis::{self, AnalysisType, CompanyData};
use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::providers::{reshape, MarketData, Statement, UpstreamError};
use crate::security::{sanitize_str, ClientId, SecurityEventKind};

type HandlerResult = Result<Json<Value>, GatewayError>;

/// Periods returned per statement.
const STATEMENT_PERIODS: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Value,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub symbol: String,
    #[serde(default)]
    pub analysis_type: Option<Value>,
}

fn client_of(client: Option<Extension<ClientId>>) -> ClientId {
    client.map(|Extension(c)| c).unwrap_or_else(ClientId::unknown)
}

fn api_error(state: &AppState, client: &ClientId, what: &str, error: &UpstreamError) {
    state
        .events()
        .record(SecurityEventKind::ApiError, client.as_str(), &format!("{what}: {error}"));
}

pub async fn search_company(
    State(state): State<AppState>,
    client: Option<Extension<ClientId>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult {
    let client = client_of(client);
    let query = match payload {
        Ok(Json(SearchRequest { query: Value::String(q) })) => q,
        _ => String::new(),
    };
    let query = query.trim();
    if query.is_empty() {
        return Err(GatewayError::rejected("Query parameter is required"));
    }

    let market = state.market();
    market.check_credential()?;

    let payload = market.search(query).await.map_err(|e| {
        api_error(&state, &client, "FMP search failed", &e);
        GatewayError::upstream("External API temporarily unavailable")
    })?;

    Ok(Json(json!({ "companies": reshape::search_results(&payload) })))
}

pub async fn company_profile(
    State(state): State<AppState>,
    client: Option<Extension<ClientId>>,
    Path(symbol): Path<String>,
) -> HandlerResult {
    let client = client_of(client);
    let market = state.market();
    market.check_credential()?;

    let payload = market.profile(&symbol).await.map_err(|e| {
        api_error(&state, &client, "FMP profile failed", &e);
        GatewayError::upstream("External API temporarily unavailable")
    })?;

    let record = reshape::first_record(&payload).ok_or_else(|| GatewayError::not_found("Company not found"))?;
    Ok(Json(json!({ "profile": reshape::company_profile(record) })))
}

pub async fn financial_statements(
    State(state): State<AppState>,
    client: Option<Extension<ClientId>>,
    Path(symbol): Path<String>,
) -> HandlerResult {
    let client = client_of(client);
    let market = state.market();
    market.check_credential()?;

    let (income, balance, cash_flow) = tokio::join!(
        market.statement(&symbol, Statement::Income, STATEMENT_PERIODS),
        market.statement(&symbol, Statement::BalanceSheet, STATEMENT_PERIODS),
        market.statement(&symbol, Statement::CashFlow, STATEMENT_PERIODS),
    );

    let or_empty = |kind: Statement, result: Result<Value, UpstreamError>| {
        result.unwrap_or_else(|e| {
            api_error(&state, &client, &format!("FMP {} failed", kind.path()), &e);
            json!([])
        })
    };

    Ok(Json(json!({
        "financial_statements": {
            "income_statement": or_empty(Statement::Income, income),
            "balance_sheet": or_empty(Statement::BalanceSheet, balance),
            "cash_flow": or_empty(Statement::CashFlow, cash_flow),
        }
    })))
}

pub async fn market_news(
    State(state): State<AppState>,
    client: Option<Extension<ClientId>>,
    Path(symbol): Path<String>,
) -> HandlerResult {
    let client = client_of(client);
    let news = state.news();
    news.check_credential()?;

    let payload = news.news_sentiment(&symbol).await.map_err(|e| {
        api_error(&state, &client, "Alpha Vantage news failed", &e);
        GatewayError::upstream("News service temporarily unavailable")
    })?;

    Ok(Json(json!({ "news": payload })))
}

/// Model-backed analysis when a model is configured, otherwise a rule-based
/// report carrying a `note` that says so.
pub async fn analyze_company(
    State(state): State<AppState>,
    client: Option<Extension<ClientId>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> HandlerResult {
    let client = client_of(client);

    // The gate has already required and shape-checked `symbol`.
    let Json(request) = payload.map_err(|_| GatewayError::rejected("Invalid request body"))?;

    let raw_type = match &request.analysis_type {
        None | Some(Value::Null) => AnalysisType::default().to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let analysis_type: AnalysisType = sanitize_str(&raw_type, 20, false)
        .parse()
        .map_err(|_| GatewayError::rejected("Invalid analysis type"))?;

    let market = state.market();
    market.check_credential()?;

    let company_data = gather_company_data(market.as_ref(), &request.symbol).await;
    if company_data.is_empty() {
        return Err(GatewayError::not_found("Unable to fetch company data"));
    }

    let Some(llm) = state.llm() else {
        tracing::info!(
            symbol = %request.symbol,
            analysis_type = %analysis_type,
            client = %client,
            "Basic analysis generated without a model"
        );
        return Ok(Json(json!({
            "analysis": analysis::basic_analysis(&request.symbol, &company_data, analysis_type),
            "company_data": company_data,
            "analysis_type": analysis_type,
            "note": analysis::BASIC_ANALYSIS_NOTE,
        })));
    };

    let prompt = analysis::build_prompt(&request.symbol, &company_data);
    let analysis = llm
        .complete(analysis_type.system_prompt(), &prompt)
        .await
        .map_err(|e| {
            state.events().record(
                SecurityEventKind::AnalysisError,
                client.as_str(),
                &format!("Analysis failed: {e}"),
            );
            GatewayError::upstream("AI analysis service temporarily unavailable")
        })?;

    tracing::info!(
        symbol = %request.symbol,
        analysis_type = %analysis_type,
        client = %client,
        "Analysis generated"
    );

    Ok(Json(json!({
        "analysis": sanitize_str(&analysis, 10_000, true),
        "company_data": company_data,
        "analysis_type": analysis_type,
    })))
}

/// Profile and the two latest income statements. Either may be missing.
async fn gather_company_data(market: &dyn MarketData, symbol: &str) -> CompanyData {
    let (profile, income) = tokio::join!(
        market.profile(symbol),
        market.statement(symbol, Statement::Income, analysis::SUMMARY_STATEMENTS as u32),
    );

    CompanyData {
        profile: profile.ok().as_ref().and_then(reshape::first_record).cloned(),
        income_statement: income
            .ok()
            .filter(|v| v.as_array().is_some_and(|rows| !rows.is_empty())),
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "due-diligence-api",
        "security": "enabled",
    }))
}

pub async fn not_found() -> GatewayError {
    GatewayError::not_found("Not found")
}
