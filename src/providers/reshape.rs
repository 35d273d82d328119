//! Projection of upstream payloads into the gateway's response shapes.
//!
//! Only a fixed set of fields is copied and every text field passes through
//! the sanitizer. Identifier-like fields (symbol, currency, exchange code,
//! country) also lose special characters; free text keeps them.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::security::sanitize_str;

/// Search results returned to the caller.
pub const SEARCH_RESULT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub symbol: String,
    pub name: String,
    pub currency: String,
    pub stock_exchange: String,
    pub exchange_short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub industry: String,
    pub description: String,
    pub mkt_cap: Option<Number>,
    pub price: Option<Number>,
    pub full_time_employees: Option<Number>,
    pub website: String,
    pub country: String,
    pub currency: String,
}

fn text(record: &Value, key: &str, max_length: usize, allow_special_chars: bool) -> String {
    match record.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => sanitize_str(s, max_length, allow_special_chars),
        Some(other) => sanitize_str(&other.to_string(), max_length, allow_special_chars),
    }
}

fn number(record: &Value, key: &str) -> Option<Number> {
    match record.get(key) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    }
}

/// Project the first [`SEARCH_RESULT_LIMIT`] entries of a search payload.
/// Anything other than an array yields no results.
pub fn search_results(payload: &Value) -> Vec<CompanySummary> {
    payload
        .as_array()
        .map(|items| {
            items
                .iter()
                .take(SEARCH_RESULT_LIMIT)
                .map(|item| CompanySummary {
                    symbol: text(item, "symbol", 10, false),
                    name: text(item, "name", 200, true),
                    currency: text(item, "currency", 10, false),
                    stock_exchange: text(item, "stockExchange", 50, true),
                    exchange_short_name: text(item, "exchangeShortName", 20, false),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// First record of a profile payload, if there is one.
pub fn first_record(payload: &Value) -> Option<&Value> {
    payload.as_array().and_then(|items| items.first())
}

pub fn company_profile(record: &Value) -> CompanyProfile {
    CompanyProfile {
        symbol: text(record, "symbol", 10, false),
        company_name: text(record, "companyName", 200, true),
        sector: text(record, "sector", 100, true),
        industry: text(record, "industry", 100, true),
        description: text(record, "description", 2000, true),
        mkt_cap: number(record, "mktCap"),
        price: number(record, "price"),
        full_time_employees: number(record, "fullTimeEmployees"),
        website: text(record, "website", 200, true),
        country: text(record, "country", 50, false),
        currency: text(record, "currency", 10, false),
    }
}
