//! Company analysis: analysis types, their prompts, the data summary the
//! model is asked to analyze, and the rule-based report used when no model
//! is configured.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::security::sanitize_str;

/// Income statements included in the summary.
pub const SUMMARY_STATEMENTS: usize = 2;

/// Analyses the gateway knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    #[default]
    General,
    Financial,
    Risk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAnalysisType(pub String);

impl FromStr for AnalysisType {
    type Err = UnknownAnalysisType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(AnalysisType::General),
            "financial" => Ok(AnalysisType::Financial),
            "risk" => Ok(AnalysisType::Risk),
            other => Err(UnknownAnalysisType(other.to_string())),
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisType::General => "general",
            AnalysisType::Financial => "financial",
            AnalysisType::Risk => "risk",
        })
    }
}

impl AnalysisType {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            AnalysisType::Financial => FINANCIAL_PROMPT,
            AnalysisType::Risk => RISK_PROMPT,
            AnalysisType::General => GENERAL_PROMPT,
        }
    }
}

const FINANCIAL_PROMPT: &str = "You are a financial analyst conducting due diligence for a potential acquisition.
Analyze the provided company data and provide insights on:
1. Financial health and performance trends
2. Revenue growth and profitability
3. Key financial ratios and metrics
4. Potential financial risks
5. Investment attractiveness

Provide a structured analysis with clear sections and actionable insights. Keep the analysis professional and objective.";

const RISK_PROMPT: &str = "You are a risk analyst conducting due diligence for a potential acquisition.
Analyze the provided company data and identify:
1. Business and operational risks
2. Financial risks and red flags
3. Market and competitive risks
4. Regulatory and compliance risks
5. Risk mitigation recommendations

Provide a comprehensive risk assessment with severity levels. Be thorough but concise.";

const GENERAL_PROMPT: &str = "You are a senior M&A analyst conducting comprehensive due diligence.
Analyze the provided company data and provide:
1. Executive summary of the company
2. Key strengths and competitive advantages
3. Areas of concern or weakness
4. Market position and growth prospects
5. Overall acquisition recommendation

Provide a balanced and thorough analysis suitable for investment decision-making. Be professional and objective.";

/// Upstream data gathered for one analysis. Absent parts are omitted from
/// the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income_statement: Option<Value>,
}

impl CompanyData {
    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.income_statement.is_none()
    }
}

/// Render the user message sent alongside the system prompt.
pub fn build_prompt(symbol: &str, data: &CompanyData) -> String {
    let empty = Map::new();
    let profile = data
        .profile
        .as_ref()
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let market_cap = profile
        .get("mktCap")
        .and_then(format_dollars)
        .unwrap_or_else(|| "N/A".to_string());

    let financials = data
        .income_statement
        .as_ref()
        .and_then(Value::as_array)
        .filter(|rows| !rows.is_empty())
        .and_then(|rows| {
            let recent: Vec<&Value> = rows.iter().take(SUMMARY_STATEMENTS).collect();
            serde_json::to_string_pretty(&recent).ok()
        })
        .unwrap_or_else(|| "No financial data available".to_string());

    format!(
        "Please analyze the following company data:\n\n\
         Company: {company}\n\
         Sector: {sector}\n\
         Industry: {industry}\n\
         Market Cap: {market_cap}\n\
         Description: {description}...\n\n\
         Recent Financial Data:\n{financials}\n",
        company = profile_text(profile, "companyName", symbol, 200),
        sector = profile_text(profile, "sector", "N/A", 100),
        industry = profile_text(profile, "industry", "N/A", 100),
        description = profile_text(profile, "description", "N/A", 500),
    )
}

fn profile_text(profile: &Map<String, Value>, key: &str, fallback: &str, max_length: usize) -> String {
    match profile.get(key) {
        Some(Value::String(s)) => sanitize_str(s, max_length, true),
        Some(Value::Null) | None => sanitize_str(fallback, max_length, true),
        Some(other) => sanitize_str(&other.to_string(), max_length, true),
    }
}

/// Attached to every rule-based report.
pub const BASIC_ANALYSIS_NOTE: &str =
    "This is a basic analysis. For AI-powered insights, configure the Gemini API key.";

const CONFIGURE_MODEL_HINT: &str = "Note: For detailed AI-powered analysis, please configure the Gemini API key.";

const RISK_SECTION: &str = "RISK ASSESSMENT:
- Market Risk: Evaluate sector volatility and competitive position
- Financial Risk: Review debt levels and cash flow stability
- Operational Risk: Assess business model sustainability
- Regulatory Risk: Consider industry-specific regulations";

const FINANCIAL_SECTION: &str = "FINANCIAL ANALYSIS:
- Review revenue trends and growth patterns
- Analyze profitability margins and efficiency ratios
- Evaluate balance sheet strength and liquidity
- Assess cash flow generation and capital allocation";

const GENERAL_SECTION: &str = "GENERAL ASSESSMENT:
- Review market position within the sector
- Check for consistent revenue growth and profitability
- Weigh brand strength and customer base
- Consider competitive landscape and future growth prospects";

/// Rule-based report built from the gathered data alone.
///
/// Revenue growth is only reported when two income statements are present
/// and the earlier revenue is positive. Non-numeric figures render as `N/A`.
pub fn basic_analysis(symbol: &str, data: &CompanyData, analysis_type: AnalysisType) -> String {
    let empty = Map::new();
    let profile = data
        .profile
        .as_ref()
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut report = format!(
        "Due Diligence Analysis for {company}\n\n\
         COMPANY OVERVIEW:\n\
         - Symbol: {symbol}\n\
         - Sector: {sector}\n\
         - Industry: {industry}\n\
         - Market Cap: {market_cap}\n\
         - Employees: {employees}\n\n\
         FINANCIAL HIGHLIGHTS:\n",
        company = profile_text(profile, "companyName", symbol, 200),
        sector = profile_text(profile, "sector", "N/A", 100),
        industry = profile_text(profile, "industry", "N/A", 100),
        market_cap = or_na(profile.get("mktCap").and_then(format_dollars)),
        employees = or_na(profile.get("fullTimeEmployees").and_then(format_count)),
    );

    let statements = data
        .income_statement
        .as_ref()
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if let [latest, previous, ..] = statements {
        let revenue = |row: &Value| row.get("revenue").and_then(Value::as_f64);
        if let (Some(now), Some(before)) = (revenue(latest), revenue(previous)) {
            if before > 0.0 {
                let growth = (now - before) / before * 100.0;
                report.push_str(&format!("- Revenue Growth: {growth:.1}%\n"));
            }
        }
        for (label, key) in [
            ("Latest Revenue", "revenue"),
            ("Net Income", "netIncome"),
            ("Gross Profit", "grossProfit"),
        ] {
            let figure = or_na(latest.get(key).and_then(format_dollars));
            report.push_str(&format!("- {label}: {figure}\n"));
        }
    }

    let section = match analysis_type {
        AnalysisType::Risk => RISK_SECTION,
        AnalysisType::Financial => FINANCIAL_SECTION,
        AnalysisType::General => GENERAL_SECTION,
    };
    report.push_str(&format!("\n{section}\n\n{CONFIGURE_MODEL_HINT}\n"));
    report
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| "N/A".to_string())
}

fn whole_number(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Some(i128::from(i)),
            (None, Some(u), _) => Some(i128::from(u)),
            (None, None, Some(f)) if f.is_finite() => Some(f.round() as i128),
            _ => None,
        },
        _ => None,
    }
}

/// `$1,234,567` for numeric amounts. Fractions are rounded.
fn format_dollars(value: &Value) -> Option<String> {
    whole_number(value).map(|n| format!("${}", group_thousands(n)))
}

fn format_count(value: &Value) -> Option<String> {
    whole_number(value).map(group_thousands)
}

fn group_thousands(n: i128) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
