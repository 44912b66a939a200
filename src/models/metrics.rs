//! Financial metric records and extraction audit rows.
//!
//! Metric values are kept as the original formatted strings the source
//! reported ("$1.2M", "~$8.000M", "24+ months"). Parsing to numbers is a
//! consumer concern; the collector never coerces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::verdict::Confidence;

/// The fixed set of financial metric fields.
///
/// This struct is the single source of truth for what the metric
/// extraction prompt asks for; every field is optional and holds the
/// verbatim formatted value from the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    // Revenue
    #[serde(default)]
    pub mrr: Option<String>,
    #[serde(default)]
    pub arr: Option<String>,
    #[serde(default)]
    pub qrr: Option<String>,
    #[serde(default)]
    pub total_revenue: Option<String>,
    #[serde(default)]
    pub gross_revenue: Option<String>,
    #[serde(default)]
    pub net_revenue: Option<String>,

    // Growth
    #[serde(default)]
    pub mrr_growth: Option<String>,
    #[serde(default)]
    pub arr_growth: Option<String>,
    #[serde(default)]
    pub revenue_growth_yoy: Option<String>,
    #[serde(default)]
    pub revenue_growth_mom: Option<String>,

    // Financial health
    #[serde(default)]
    pub cash_balance: Option<String>,
    #[serde(default)]
    pub net_burn: Option<String>,
    #[serde(default)]
    pub gross_burn: Option<String>,
    #[serde(default)]
    pub runway_months: Option<String>,

    // Profitability
    #[serde(default)]
    pub gross_margin: Option<String>,
    #[serde(default)]
    pub ebitda: Option<String>,
    #[serde(default)]
    pub ebitda_margin: Option<String>,
    #[serde(default)]
    pub net_income: Option<String>,

    // Customers
    #[serde(default)]
    pub customer_count: Option<String>,
    #[serde(default)]
    pub new_customers: Option<String>,
    #[serde(default)]
    pub churn_rate: Option<String>,
    #[serde(default)]
    pub ltv: Option<String>,
    #[serde(default)]
    pub cac: Option<String>,

    // Operational
    #[serde(default)]
    pub team_size: Option<String>,
    #[serde(default)]
    pub bookings: Option<String>,
    #[serde(default)]
    pub pipeline: Option<String>,

    // Narrative
    #[serde(default)]
    pub key_highlights: Option<String>,
    #[serde(default)]
    pub key_challenges: Option<String>,
    #[serde(default)]
    pub funding_status: Option<String>,
}

fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
}

impl MetricSet {
    /// Drop placeholder values ("N/A", "null", empty) the model uses for
    /// metrics it did not find. Real values pass through untouched.
    pub fn cleaned(mut self) -> Self {
        let fields = [
            &mut self.mrr,
            &mut self.arr,
            &mut self.qrr,
            &mut self.total_revenue,
            &mut self.gross_revenue,
            &mut self.net_revenue,
            &mut self.mrr_growth,
            &mut self.arr_growth,
            &mut self.revenue_growth_yoy,
            &mut self.revenue_growth_mom,
            &mut self.cash_balance,
            &mut self.net_burn,
            &mut self.gross_burn,
            &mut self.runway_months,
            &mut self.gross_margin,
            &mut self.ebitda,
            &mut self.ebitda_margin,
            &mut self.net_income,
            &mut self.customer_count,
            &mut self.new_customers,
            &mut self.churn_rate,
            &mut self.ltv,
            &mut self.cac,
            &mut self.team_size,
            &mut self.bookings,
            &mut self.pipeline,
            &mut self.key_highlights,
            &mut self.key_challenges,
            &mut self.funding_status,
        ];
        for field in fields {
            if field.as_deref().map(is_placeholder).unwrap_or(false) {
                *field = None;
            }
        }
        self
    }

    /// Whether any metric or narrative field carries a value.
    pub fn has_values(&self) -> bool {
        self != &MetricSet::default()
    }
}

/// Provenance of a metrics extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSource {
    /// Extracted from the email body.
    EmailBody,
    /// Extracted from a named attachment.
    Attachment { filename: String },
}

impl MetricSource {
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::EmailBody => "email",
            Self::Attachment { .. } => "attachment",
        }
    }

    pub fn source_file(&self) -> Option<&str> {
        match self {
            Self::EmailBody => None,
            Self::Attachment { filename } => Some(filename),
        }
    }

    pub fn from_columns(source_type: &str, source_file: Option<String>) -> Self {
        match (source_type, source_file) {
            ("attachment", Some(filename)) => Self::Attachment { filename },
            _ => Self::EmailBody,
        }
    }
}

/// One persisted metrics record: one extraction pass over one source.
#[derive(Debug, Clone)]
pub struct FinancialMetrics {
    /// Database row ID.
    pub id: i64,
    pub company_id: i64,
    pub email_update_id: i64,
    /// Reporting period label, e.g. "Q1 2025" or "May 2025".
    pub reporting_period: Option<String>,
    /// Best-estimate date the metrics are for.
    pub reporting_date: Option<DateTime<Utc>>,
    /// When the extraction ran.
    pub extracted_at: DateTime<Utc>,
    pub metrics: MetricSet,
    pub source: MetricSource,
    pub extraction_confidence: Confidence,
    pub extraction_notes: Option<String>,
}

/// Pipeline stage an extraction attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Classify,
    Metrics,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Metrics => "metrics",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "classify" => Some(Self::Classify),
            "metrics" => Some(Self::Metrics),
            _ => None,
        }
    }
}

/// Outcome of an extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Success,
    Partial,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Audit row for one extraction attempt, recorded whether or not it
/// produced metrics. Keeps the raw model output so operators can inspect
/// every attempt after the fact.
#[derive(Debug, Clone)]
pub struct MetricExtraction {
    /// Database row ID.
    pub id: i64,
    pub email_update_id: i64,
    /// Attachment the attempt ran over, if not the body.
    pub attachment_id: Option<i64>,
    pub stage: ExtractionStage,
    pub status: ExtractionStatus,
    /// Raw model output, unmodified.
    pub raw_response: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub extracted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_drops_placeholders() {
        let set = MetricSet {
            arr: Some("~$8.000M".to_string()),
            mrr: Some("N/A".to_string()),
            cash_balance: Some("".to_string()),
            runway_months: Some("24+ months".to_string()),
            ..Default::default()
        };
        let cleaned = set.cleaned();
        assert_eq!(cleaned.arr.as_deref(), Some("~$8.000M"));
        assert_eq!(cleaned.mrr, None);
        assert_eq!(cleaned.cash_balance, None);
        assert_eq!(cleaned.runway_months.as_deref(), Some("24+ months"));
    }

    #[test]
    fn test_cleaned_preserves_formatting() {
        let set = MetricSet {
            arr: Some("~$8.000M".to_string()),
            ..Default::default()
        };
        // No numeric coercion: value passes through byte-for-byte
        assert_eq!(set.cleaned().arr.as_deref(), Some("~$8.000M"));
    }

    #[test]
    fn test_has_values() {
        assert!(!MetricSet::default().has_values());
        let set = MetricSet {
            team_size: Some("12".to_string()),
            ..Default::default()
        };
        assert!(set.has_values());
    }

    #[test]
    fn test_source_columns_roundtrip() {
        let src = MetricSource::Attachment {
            filename: "deck.pdf".to_string(),
        };
        assert_eq!(src.source_type(), "attachment");
        assert_eq!(src.source_file(), Some("deck.pdf"));

        let back =
            MetricSource::from_columns("attachment", Some("deck.pdf".to_string()));
        assert_eq!(back, src);
        assert_eq!(
            MetricSource::from_columns("email", None),
            MetricSource::EmailBody
        );
    }

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(
            ExtractionStatus::from_str("partial"),
            Some(ExtractionStatus::Partial)
        );
        assert_eq!(ExtractionStage::Classify.as_str(), "classify");
    }
}
