//! Claude client for email classification and metric extraction.
//!
//! Talks to the Anthropic Messages API over reqwest. One call per message
//! for classification, one call per text source for metrics; no batching.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Analyzer, ClassifyRequest, LlmError, MetricsRequest};
use crate::models::{Confidence, MetricSet, UpdateVerdict};

/// Prompt for deciding whether an email is a company update.
/// Placeholders: {companies}, {subject}, {sender}, {date}, {body}.
pub const CLASSIFY_PROMPT: &str = r#"You are analyzing an email forwarded by a venture fund partner to determine if it contains a company update.

KNOWN PORTFOLIO COMPANIES (be flexible with name variations - "VALIDIC" matches "Validic", "Equity Shift Inc." matches "Equity Shift"):
{companies}

EMAIL TO ANALYZE:
Subject: {subject}
From: {sender}
Date: {date}

Body:
{body}

INSTRUCTIONS:
1. Decide whether this email contains an update from ANY company (portfolio or not): investor updates, monthly reports, quarterly updates, funding news.
2. If the company matches one in the list above, set is_portfolio_company to true and use the exact name from the list.
3. If it is a legitimate company update from a company NOT in the list, set is_portfolio_company to false and use the name as it appears in the email.
4. Identify the email address of the actual company sender inside the forward when possible.

Respond with ONLY a JSON object:
{
    "is_update": true/false,
    "company_name": "name or null",
    "is_portfolio_company": true/false,
    "confidence": "high/medium/low",
    "update_type": "monthly/quarterly/special/funding/other",
    "original_sender": "address or null",
    "key_topics": ["main", "topics"],
    "summary": "one sentence summary"
}"#;

/// Prompt for extracting the fixed financial metric schema from one
/// source. Placeholders: {company}, {source}, {content}.
pub const METRICS_PROMPT: &str = r#"You are a financial analyst extracting key metrics from portfolio company updates.

Company: {company}
Source: {source}

Analyze the following content and return ONLY a JSON object with this structure:

{
    "reporting_period": "Q1 2025" or "May 2025" or "2024 Annual",
    "reporting_date": "2025-05-01" (best estimate, YYYY-MM-DD),
    "mrr": "Monthly Recurring Revenue (e.g. '$112K') or 'N/A'",
    "arr": "Annual Recurring Revenue (e.g. '$8.022M', '~$8.000M') or 'N/A'",
    "qrr": "Quarterly Recurring Revenue or 'N/A'",
    "total_revenue": "Total revenue for period or 'N/A'",
    "gross_revenue": "Gross revenue or 'N/A'",
    "net_revenue": "Net revenue or 'N/A'",
    "mrr_growth": "MRR growth rate (e.g. '+15%') or 'N/A'",
    "arr_growth": "ARR growth rate or 'N/A'",
    "revenue_growth_yoy": "Year over year growth or 'N/A'",
    "revenue_growth_mom": "Month over month growth or 'N/A'",
    "cash_balance": "Current cash balance (e.g. '$2.8M') or 'N/A'",
    "net_burn": "Monthly net burn rate or 'N/A'",
    "gross_burn": "Monthly gross burn rate or 'N/A'",
    "runway_months": "Cash runway (e.g. '24+ months') or 'N/A'",
    "gross_margin": "Gross margin percentage or 'N/A'",
    "ebitda": "EBITDA or 'N/A'",
    "ebitda_margin": "EBITDA margin or 'N/A'",
    "net_income": "Net income/loss or 'N/A'",
    "customer_count": "Total customers or 'N/A'",
    "new_customers": "New customers in period or 'N/A'",
    "churn_rate": "Customer churn rate or 'N/A'",
    "ltv": "Lifetime value or 'N/A'",
    "cac": "Customer acquisition cost or 'N/A'",
    "team_size": "Number of employees or 'N/A'",
    "bookings": "New bookings/contracts or 'N/A'",
    "pipeline": "Sales pipeline value or 'N/A'",
    "key_highlights": "Key achievements mentioned",
    "key_challenges": "Challenges and concerns mentioned",
    "funding_status": "Current funding status or 'N/A'",
    "extraction_confidence": "high/medium/low based on clarity of data"
}

Guidelines:
- Preserve original formatting exactly (e.g. "$1.2M", "~$8.000M", "24+ months")
- Use "N/A" for metrics not mentioned or unclear
- Be conservative with confidence

Content to analyze:
{content}"#;

/// Configuration for the Claude client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API endpoint base.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum characters of content sent per call.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Bounded retries for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_content_chars() -> usize {
    8000
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Successfully parsed (possibly partially) metric extraction output.
#[derive(Debug, Clone)]
pub struct MetricsOutcome {
    pub payload: MetricsPayload,
    /// Raw model output, kept verbatim for the audit trail.
    pub raw_response: String,
    /// Output was malformed and only some fields could be salvaged.
    pub partial: bool,
}

/// Deserialized metric-extraction response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsPayload {
    #[serde(default)]
    pub reporting_period: Option<String>,
    /// Best-estimate reporting date, YYYY-MM-DD.
    #[serde(default)]
    pub reporting_date: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricSet,
    #[serde(default)]
    pub extraction_confidence: Option<Confidence>,
}

/// Claude client for email analysis.
pub struct ClaudeClient {
    config: LlmConfig,
    api_key: String,
    client: Client,
}

/// Messages API request format.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

/// Messages API response format.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeClient {
    /// Create a client, reading the API key from ANTHROPIC_API_KEY.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(config: LlmConfig, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            api_key,
            client,
        }
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Truncate content to the configured maximum (UTF-8 safe).
    fn truncate_content<'a>(&self, text: &'a str) -> &'a str {
        truncate_at_boundary(text, self.config.max_content_chars)
    }

    /// Call the Messages API with a prompt, returning the text output.
    async fn call_claude(&self, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let url = format!("{}/v1/messages", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(body));
        }
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Connection(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| LlmError::Parse {
            message: e.to_string(),
            raw: String::new(),
        })?;

        Ok(parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl Analyzer for ClaudeClient {
    async fn classify(&self, req: &ClassifyRequest<'_>) -> Result<UpdateVerdict, LlmError> {
        let companies = format_company_list(req.known_companies);
        let prompt = CLASSIFY_PROMPT
            .replace("{companies}", &companies)
            .replace("{subject}", req.subject)
            .replace("{sender}", req.sender)
            .replace("{date}", &req.date.to_rfc3339())
            .replace("{body}", self.truncate_content(req.body));

        debug!("classifying message: {}", req.subject);
        let response = self.call_claude(&prompt).await?;
        parse_verdict_response(&response)
    }

    async fn extract_metrics(
        &self,
        req: &MetricsRequest<'_>,
    ) -> Result<MetricsOutcome, LlmError> {
        let prompt = METRICS_PROMPT
            .replace("{company}", req.company_name)
            .replace("{source}", req.source_label)
            .replace("{content}", self.truncate_content(req.content));

        debug!("extracting metrics from {}", req.source_label);
        let response = self.call_claude(&prompt).await?;
        parse_metrics_response(&response)
    }
}

/// Known-company list for the classification prompt.
fn format_company_list(companies: &[crate::models::Company]) -> String {
    if companies.is_empty() {
        return "- (none known yet)".to_string();
    }
    companies
        .iter()
        .map(|c| format!("- {}", c.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate at a char boundary at or before `max` bytes.
fn truncate_at_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Strip markdown fences and surrounding prose, leaving the JSON object.
fn clean_json_block(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

/// Parse a classification response.
pub fn parse_verdict_response(response: &str) -> Result<UpdateVerdict, LlmError> {
    let cleaned = clean_json_block(response).ok_or_else(|| LlmError::Parse {
        message: "no JSON object in response".to_string(),
        raw: response.to_string(),
    })?;

    serde_json::from_str(cleaned).map_err(|e| LlmError::Parse {
        message: e.to_string(),
        raw: response.to_string(),
    })
}

/// Parse a metric-extraction response.
///
/// Strict parsing first; if the payload shape is off (wrong value types,
/// bad enum values) but the response is still a JSON object, salvage the
/// string-convertible fields and mark the outcome partial. No JSON object
/// at all is a permanent parse failure.
pub fn parse_metrics_response(response: &str) -> Result<MetricsOutcome, LlmError> {
    let cleaned = clean_json_block(response).ok_or_else(|| LlmError::Parse {
        message: "no JSON object in response".to_string(),
        raw: response.to_string(),
    })?;

    match serde_json::from_str::<MetricsPayload>(cleaned) {
        Ok(payload) => Ok(MetricsOutcome {
            payload,
            raw_response: response.to_string(),
            partial: false,
        }),
        Err(strict_err) => match serde_json::from_str::<Value>(cleaned) {
            Ok(Value::Object(map)) => Ok(MetricsOutcome {
                payload: salvage_payload(&map),
                raw_response: response.to_string(),
                partial: true,
            }),
            _ => Err(LlmError::Parse {
                message: strict_err.to_string(),
                raw: response.to_string(),
            }),
        },
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rebuild a payload field-by-field from a loosely-typed JSON object.
fn salvage_payload(map: &serde_json::Map<String, Value>) -> MetricsPayload {
    let get = |key: &str| map.get(key).and_then(value_to_string);

    let metrics = MetricSet {
        mrr: get("mrr"),
        arr: get("arr"),
        qrr: get("qrr"),
        total_revenue: get("total_revenue"),
        gross_revenue: get("gross_revenue"),
        net_revenue: get("net_revenue"),
        mrr_growth: get("mrr_growth"),
        arr_growth: get("arr_growth"),
        revenue_growth_yoy: get("revenue_growth_yoy"),
        revenue_growth_mom: get("revenue_growth_mom"),
        cash_balance: get("cash_balance"),
        net_burn: get("net_burn"),
        gross_burn: get("gross_burn"),
        runway_months: get("runway_months"),
        gross_margin: get("gross_margin"),
        ebitda: get("ebitda"),
        ebitda_margin: get("ebitda_margin"),
        net_income: get("net_income"),
        customer_count: get("customer_count"),
        new_customers: get("new_customers"),
        churn_rate: get("churn_rate"),
        ltv: get("ltv"),
        cac: get("cac"),
        team_size: get("team_size"),
        bookings: get("bookings"),
        pipeline: get("pipeline"),
        key_highlights: get("key_highlights"),
        key_challenges: get("key_challenges"),
        funding_status: get("funding_status"),
    };

    MetricsPayload {
        reporting_period: get("reporting_period"),
        reporting_date: get("reporting_date"),
        metrics,
        extraction_confidence: get("extraction_confidence")
            .as_deref()
            .and_then(Confidence::from_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert!(config.model.contains("claude"));
        assert_eq!(config.max_content_chars, 8000);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_truncate_at_boundary() {
        let text = "aaé";
        // byte 3 is mid-é
        assert_eq!(truncate_at_boundary(text, 3), "aa");
        assert_eq!(truncate_at_boundary(text, 10), "aaé");
    }

    #[test]
    fn test_clean_json_block_strips_fences() {
        let raw = "```json\n{\"is_update\": true}\n```";
        assert_eq!(clean_json_block(raw), Some("{\"is_update\": true}"));

        let raw = "Here is my analysis: {\"a\": 1} hope that helps";
        assert_eq!(clean_json_block(raw), Some("{\"a\": 1}"));

        assert_eq!(clean_json_block("no json here"), None);
    }

    #[test]
    fn test_parse_verdict_response() {
        let raw = r#"```json
        {"is_update": true, "company_name": "Natryx", "is_portfolio_company": true,
         "confidence": "high", "update_type": "monthly", "key_topics": ["revenue"]}
        ```"#;
        let verdict = parse_verdict_response(raw).unwrap();
        assert!(verdict.is_update);
        assert_eq!(verdict.reported_company(), Some("Natryx"));
        assert_eq!(verdict.confidence, Confidence::High);
        assert_eq!(verdict.key_topics, vec!["revenue"]);
    }

    #[test]
    fn test_parse_verdict_no_json_is_parse_error() {
        let err = parse_verdict_response("I cannot analyze this").unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.raw_response(), Some("I cannot analyze this"));
    }

    #[test]
    fn test_parse_metrics_strict() {
        let raw = r#"{"reporting_period": "May 2025", "arr": "~$8.000M", "mrr": "N/A",
                      "runway_months": "14 months", "extraction_confidence": "high"}"#;
        let outcome = parse_metrics_response(raw).unwrap();
        assert!(!outcome.partial);
        assert_eq!(outcome.payload.metrics.arr.as_deref(), Some("~$8.000M"));
        assert_eq!(
            outcome.payload.metrics.runway_months.as_deref(),
            Some("14 months")
        );
        assert_eq!(
            outcome.payload.extraction_confidence,
            Some(Confidence::High)
        );
        assert_eq!(outcome.raw_response, raw);
    }

    #[test]
    fn test_parse_metrics_salvages_wrong_types() {
        // team_size as a bare number breaks strict parsing
        let raw = r#"{"arr": "$1.2M", "team_size": 12, "extraction_confidence": "medium"}"#;
        let outcome = parse_metrics_response(raw).unwrap();
        assert!(outcome.partial);
        assert_eq!(outcome.payload.metrics.arr.as_deref(), Some("$1.2M"));
        assert_eq!(outcome.payload.metrics.team_size.as_deref(), Some("12"));
    }

    #[test]
    fn test_parse_metrics_no_json_fails() {
        let err = parse_metrics_response("sorry, no metrics found").unwrap_err();
        match err {
            LlmError::Parse { ref raw, .. } => assert!(raw.contains("sorry")),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_retryability() {
        assert!(LlmError::Connection("x".into()).is_retryable());
        assert!(LlmError::RateLimited("x".into()).is_retryable());
        assert!(!LlmError::Api("x".into()).is_retryable());
        assert!(!LlmError::Parse {
            message: "x".into(),
            raw: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_format_company_list() {
        use crate::models::Company;
        let companies = vec![
            Company::new("Validic".to_string(), true),
            Company::new("Natryx".to_string(), true),
        ];
        let list = format_company_list(&companies);
        assert_eq!(list, "- Validic\n- Natryx");
        assert_eq!(format_company_list(&[]), "- (none known yet)");
    }
}
