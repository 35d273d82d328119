//! End-to-end tests of the router with fake providers.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use diligence_gateway::http::HttpServer;
use diligence_gateway::security::SecurityEventKind;

mod common;
use common::{get, post_json, post_raw, send, test_config, FakeLlm, FakeMarket, FakeNews, Fakes};

fn server_with(fakes: &Fakes) -> HttpServer {
    HttpServer::with_upstreams(test_config(), fakes.upstreams())
}

#[tokio::test]
async fn health_reports_status_with_hardening_headers() {
    let server = server_with(&Fakes::default());
    let res = send(&server.router(), get("/health", "10.1.0.1")).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body,
        json!({ "status": "healthy", "service": "due-diligence-api", "security": "enabled" })
    );
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert_eq!(res.headers["x-frame-options"], "DENY");
    assert_eq!(res.headers["x-xss-protection"], "1; mode=block");
    assert_eq!(
        res.headers["strict-transport-security"],
        "max-age=31536000; includeSubDomains"
    );
    assert!(res.headers.contains_key("content-security-policy"));
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn caller_request_id_is_propagated() {
    let server = server_with(&Fakes::default());
    let mut request = get("/health", "10.1.0.2");
    request
        .headers_mut()
        .insert("x-request-id", "trace-me-123".parse().unwrap());

    let res = send(&server.router(), request).await;
    assert_eq!(res.headers["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn search_forwards_the_sanitized_query() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json("/search-company", "10.1.1.1", json!({ "query": "  apple  " })),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(fakes.market.calls(), vec!["search:apple".to_string()]);
    assert_eq!(res.body["companies"][0]["symbol"], "AAPL");
    assert_eq!(res.body["companies"][0]["exchangeShortName"], "NASDAQ");
}

#[tokio::test]
async fn search_rejects_missing_and_empty_queries() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);
    let router = server.router();

    let res = send(&router, post_json("/search-company", "10.1.2.1", json!({}))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Missing required field: query" }));

    // Sanitizes to nothing.
    let res = send(&router, post_json("/search-company", "10.1.2.1", json!({ "query": "<>" }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Query parameter is required" }));

    // Not JSON at all is treated as an empty object.
    let res = send(&router, post_raw("/search-company", "10.1.2.1", "query=apple")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Missing required field: query" }));

    assert!(fakes.market.calls().is_empty());
    assert_eq!(
        server.state().events().count_of(SecurityEventKind::MissingField),
        2
    );
}

#[tokio::test]
async fn suspicious_query_is_rejected_and_logged() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json(
            "/search-company",
            "10.1.3.1",
            json!({ "query": "apple' UNION SELECT password FROM users" }),
        ),
    )
    .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Invalid input detected" }));
    assert_eq!(res.headers["x-frame-options"], "DENY");
    assert!(fakes.market.calls().is_empty());

    let events = server.state().events().snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SecurityEventKind::SuspiciousInput);
    assert_eq!(events[0].client, "10.1.3.1");
}

#[tokio::test]
async fn twenty_first_search_in_a_minute_is_limited() {
    let server = server_with(&Fakes::default());
    let router = server.router();

    for i in 0..20 {
        let res = send(&router, post_json("/search-company", "10.1.4.1", json!({ "query": "apple" }))).await;
        assert_eq!(res.status, StatusCode::OK, "request {} should pass", i + 1);
    }

    let res = send(&router, post_json("/search-company", "10.1.4.1", json!({ "query": "apple" }))).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body, json!({ "error": "Rate limit exceeded", "retry_after": 60 }));
    assert_eq!(res.headers["retry-after"], "60");
    assert_eq!(res.headers["x-content-type-options"], "nosniff");

    // Another client is unaffected.
    let res = send(&router, post_json("/search-company", "10.1.4.2", json!({ "query": "apple" }))).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn sustained_abuse_blocks_the_client_everywhere() {
    let server = server_with(&Fakes::default());
    let router = server.router();
    let analyze = || post_json("/analyze-company", "10.1.5.1", json!({ "symbol": "AAPL" }));

    for _ in 0..5 {
        assert_eq!(send(&router, analyze()).await.status, StatusCode::OK);
    }
    // Requests 6 through 12 are limited; the 12th escalates.
    for _ in 6..=12 {
        let res = send(&router, analyze()).await;
        assert_eq!(res.body["error"], "Rate limit exceeded");
    }

    let res = send(&router, analyze()).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body, json!({ "error": "IP blocked due to abuse" }));
    assert!(res.headers.get("retry-after").is_none());

    let res = send(&router, get("/company-profile/AAPL", "10.1.5.1")).await;
    assert_eq!(res.body, json!({ "error": "IP blocked due to abuse" }));

    assert!(server.state().limiter().is_blocked("10.1.5.1"));
}

#[tokio::test]
async fn rate_limiting_can_be_disabled() {
    let fakes = Fakes::default();
    let mut config = test_config();
    config.rate_limit.enabled = false;
    let server = HttpServer::with_upstreams(config, fakes.upstreams());
    let router = server.router();

    for _ in 0..40 {
        let res = send(&router, get("/company-profile/AAPL", "10.1.6.1")).await;
        assert_eq!(res.status, StatusCode::OK);
    }
    assert_eq!(server.state().limiter().tracked_clients(), 0);
}

#[tokio::test]
async fn encoded_markup_in_path_symbol_is_rejected() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(&server.router(), get("/company-profile/AAPL%3Cscript%3E", "10.1.7.1")).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Invalid symbol format" }));
    assert!(fakes.market.calls().is_empty());
    assert_eq!(
        server.state().events().count_of(SecurityEventKind::InvalidSymbol),
        1
    );
}

#[tokio::test]
async fn profile_is_projected_and_sanitized() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(&server.router(), get("/company-profile/AAPL", "10.1.8.1")).await;

    assert_eq!(res.status, StatusCode::OK);
    let profile = &res.body["profile"];
    assert_eq!(profile["companyName"], "Apple Inc.");
    assert_eq!(profile["description"], "Designs iPhone & Mac (<b>consumer</b>).");
    assert_eq!(profile["mktCap"], 3_000_000_000_000u64);
    assert!(profile["fullTimeEmployees"].is_null());
    assert_eq!(fakes.market.calls(), vec!["profile:AAPL".to_string()]);
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let fakes = Fakes {
        market: Arc::new(FakeMarket {
            profile: Some(json!([])),
            ..FakeMarket::default()
        }),
        ..Fakes::default()
    };
    let server = server_with(&fakes);

    let res = send(&server.router(), get("/company-profile/ZZZZ", "10.1.9.1")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({ "error": "Company not found" }));
}

#[tokio::test]
async fn upstream_failure_is_service_unavailable() {
    let fakes = Fakes {
        market: Arc::new(FakeMarket {
            search: None,
            ..FakeMarket::default()
        }),
        ..Fakes::default()
    };
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json("/search-company", "10.1.10.1", json!({ "query": "apple" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body, json!({ "error": "External API temporarily unavailable" }));
    assert_eq!(server.state().events().count_of(SecurityEventKind::ApiError), 1);
}

#[tokio::test]
async fn misconfigured_key_is_reported_without_calling_upstream() {
    let fakes = Fakes {
        market: Arc::new(FakeMarket {
            api_key: Some("your_fmp_api_key_here".into()),
            ..FakeMarket::default()
        }),
        news: Arc::new(FakeNews {
            api_key: Some("short".into()),
            ..FakeNews::default()
        }),
        ..Fakes::default()
    };
    let server = server_with(&fakes);
    let router = server.router();

    let res = send(&router, get("/company-profile/AAPL", "10.1.11.1")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.body,
        json!({ "error": "Please configure a valid Financial Modeling Prep API key" })
    );
    assert!(fakes.market.calls().is_empty());

    let res = send(&router, get("/market-news/AAPL", "10.1.11.1")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body, json!({ "error": "Invalid Alpha Vantage API key format" }));
}

#[tokio::test]
async fn statements_degrade_per_statement() {
    let fakes = Fakes {
        market: Arc::new(FakeMarket {
            balance_sheet: None,
            ..FakeMarket::default()
        }),
        ..Fakes::default()
    };
    let server = server_with(&fakes);

    let res = send(&server.router(), get("/financial-statements/AAPL", "10.1.12.1")).await;

    assert_eq!(res.status, StatusCode::OK);
    let statements = &res.body["financial_statements"];
    assert_eq!(statements["income_statement"][0]["date"], "2024-09-28");
    assert_eq!(statements["balance_sheet"], json!([]));
    assert_eq!(statements["cash_flow"][0]["freeCashFlow"], 108_807_000_000u64);

    let mut calls = fakes.market.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            "balance-sheet-statement:AAPL:5".to_string(),
            "cash-flow-statement:AAPL:5".to_string(),
            "income-statement:AAPL:5".to_string(),
        ]
    );
}

#[tokio::test]
async fn news_passthrough_and_failure() {
    let server = server_with(&Fakes::default());
    let res = send(&server.router(), get("/market-news/AAPL", "10.1.13.1")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["news"]["feed"][0]["title"], "Apple beats estimates");

    let failing = Fakes {
        news: Arc::new(FakeNews {
            response: None,
            ..FakeNews::default()
        }),
        ..Fakes::default()
    };
    let server = server_with(&failing);
    let res = send(&server.router(), get("/market-news/AAPL", "10.1.13.1")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body, json!({ "error": "News service temporarily unavailable" }));
}

#[tokio::test]
async fn analyze_builds_prompt_from_gathered_data() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json(
            "/analyze-company",
            "10.1.14.1",
            json!({ "symbol": "AAPL", "analysis_type": "risk" }),
        ),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["analysis_type"], "risk");
    assert_eq!(res.body["analysis"], "Solid <b>fundamentals</b>.");
    assert_eq!(res.body["company_data"]["profile"]["symbol"], "AAPL");
    assert_eq!(res.body["company_data"]["income_statement"][0]["date"], "2024-09-28");

    let llm = fakes.llm.as_ref().unwrap();
    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    let (system, user) = &prompts[0];
    assert!(system.starts_with("You are a risk analyst"));
    assert!(user.contains("Company: Apple Inc.\n"));
    assert!(user.contains("Market Cap: $3,000,000,000,000\n"));
    assert!(fakes.market.calls().contains(&"income-statement:AAPL:2".to_string()));
}

#[tokio::test]
async fn analyze_defaults_to_general() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json("/analyze-company", "10.1.15.1", json!({ "symbol": "msft" })),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["analysis_type"], "general");
    let (system, _) = &fakes.llm.as_ref().unwrap().prompts()[0];
    assert!(system.starts_with("You are a senior M&A analyst"));
}

#[tokio::test]
async fn analyze_rejects_bad_input() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);
    let router = server.router();

    let res = send(
        &router,
        post_json(
            "/analyze-company",
            "10.1.16.1",
            json!({ "symbol": "AAPL", "analysis_type": "valuation" }),
        ),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Invalid analysis type" }));

    let res = send(&router, post_json("/analyze-company", "10.1.16.1", json!({ "symbol": "AA PL" }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "Invalid symbol format" }));

    let res = send(&router, post_json("/analyze-company", "10.1.16.1", json!({ "symbol": "<script>" }))).await;
    assert_eq!(res.body, json!({ "error": "Invalid input detected" }));

    assert!(fakes.llm.as_ref().unwrap().prompts().is_empty());
}

#[tokio::test]
async fn analyze_without_model_returns_basic_report() {
    let fakes = Fakes {
        market: Arc::new(FakeMarket {
            income: Some(json!([
                { "date": "2024-09-28", "revenue": 120_000, "netIncome": 30_000, "grossProfit": 55_000 },
                { "date": "2023-09-30", "revenue": 100_000, "netIncome": 25_000, "grossProfit": 45_000 },
            ])),
            ..FakeMarket::default()
        }),
        llm: None,
        ..Fakes::default()
    };
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json(
            "/analyze-company",
            "10.1.17.1",
            json!({ "symbol": "AAPL", "analysis_type": "risk" }),
        ),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["analysis_type"], "risk");
    assert_eq!(
        res.body["note"],
        "This is a basic analysis. For AI-powered insights, configure the Gemini API key."
    );
    let analysis = res.body["analysis"].as_str().unwrap();
    assert!(analysis.starts_with("Due Diligence Analysis for Apple Inc.\n"));
    assert!(analysis.contains("- Market Cap: $3,000,000,000,000\n"));
    assert!(analysis.contains("- Revenue Growth: 20.0%\n"));
    assert!(analysis.contains("- Net Income: $30,000\n"));
    assert!(analysis.contains("RISK ASSESSMENT:"));
    assert_eq!(res.body["company_data"]["income_statement"][1]["date"], "2023-09-30");
}

#[tokio::test]
async fn analyze_with_model_has_no_note() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json("/analyze-company", "10.1.17.2", json!({ "symbol": "AAPL" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.get("note").is_none());
}

#[tokio::test]
async fn analyze_without_any_company_data_is_not_found() {
    let fakes = Fakes {
        market: Arc::new(FakeMarket {
            profile: None,
            income: None,
            ..FakeMarket::default()
        }),
        ..Fakes::default()
    };
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json("/analyze-company", "10.1.18.1", json!({ "symbol": "AAPL" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({ "error": "Unable to fetch company data" }));
}

#[tokio::test]
async fn analyze_model_failure_is_unavailable_and_logged() {
    let fakes = Fakes {
        llm: Some(Arc::new(FakeLlm::default())),
        ..Fakes::default()
    };
    let server = server_with(&fakes);

    let res = send(
        &server.router(),
        post_json("/analyze-company", "10.1.19.1", json!({ "symbol": "AAPL" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body, json!({ "error": "AI analysis service temporarily unavailable" }));
    assert_eq!(
        server.state().events().count_of(SecurityEventKind::AnalysisError),
        1
    );
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let server = server_with(&Fakes::default());
    let query = "a".repeat(128 * 1024);

    let res = send(
        &server.router(),
        post_json("/search-company", "10.1.20.1", json!({ "query": query })),
    )
    .await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn wrong_method_is_not_charged_to_the_rate_limit() {
    let fakes = Fakes::default();
    let server = server_with(&fakes);
    let router = server.router();

    for _ in 0..3 {
        let res = send(&router, post_json("/company-profile/AAPL", "10.1.22.1", json!({}))).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    }
    let res = send(&router, get("/search-company", "10.1.22.1")).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);

    assert_eq!(server.state().limiter().logged_requests("10.1.22.1"), 0);
    assert!(fakes.market.calls().is_empty());
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let server = server_with(&Fakes::default());
    let res = send(&server.router(), get("/admin", "10.1.21.1")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({ "error": "Not found" }));
    assert_eq!(res.headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn security_headers_can_be_disabled() {
    let fakes = Fakes::default();
    let mut config = test_config();
    config.security.enable_headers = false;
    let server = HttpServer::with_upstreams(config, fakes.upstreams());

    let res = send(&server.router(), get("/health", "10.1.22.1")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.headers.get("x-frame-options").is_none());
    assert!(res.headers.contains_key("x-request-id"));
}
