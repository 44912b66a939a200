//! Classifier verdicts.

use serde::{Deserialize, Serialize};

/// Confidence rating attached to classifications and extractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::Low
    }
}

/// Structured classifier output for one message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVerdict {
    /// Whether the message is a company update at all.
    #[serde(default)]
    pub is_update: bool,
    /// Company the update concerns, as reported by the model.
    #[serde(default)]
    pub company_name: Option<String>,
    /// Whether the company is in the known portfolio.
    #[serde(default)]
    pub is_portfolio_company: bool,
    #[serde(default)]
    pub confidence: Confidence,
    /// monthly/quarterly/special/funding/other.
    #[serde(default)]
    pub update_type: Option<String>,
    /// Email address of the actual company sender, if identifiable.
    #[serde(default)]
    pub original_sender: Option<String>,
    #[serde(default)]
    pub key_topics: Vec<String>,
    /// Brief summary of the update content.
    #[serde(default)]
    pub summary: Option<String>,
}

impl UpdateVerdict {
    /// Company name with placeholder values ("N/A", "null", "") removed.
    pub fn reported_company(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|name| {
                !name.is_empty()
                    && !name.eq_ignore_ascii_case("n/a")
                    && !name.eq_ignore_ascii_case("null")
                    && !name.eq_ignore_ascii_case("unknown")
            })
    }
}
