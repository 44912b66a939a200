//! LLM integration: message classification and metric extraction.
//!
//! The collector consumes the [`Analyzer`] capability; [`ClaudeClient`] is
//! the production implementation over the Anthropic Messages API. Tests
//! substitute stubs.

mod client;

pub use client::{ClaudeClient, LlmConfig, MetricsOutcome, MetricsPayload};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Company, UpdateVerdict};

/// Errors from LLM calls.
///
/// Retryability is explicit so the orchestrator can run a bounded retry
/// loop instead of treating raised errors as control flow.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to reach the model service (or it returned a 5xx).
    #[error("connection error: {0}")]
    Connection(String),

    /// The model service asked us to back off.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The API rejected the request.
    #[error("API error: {0}")]
    Api(String),

    /// The model answered, but not with parseable output.
    #[error("parse error: {message}")]
    Parse {
        message: String,
        /// Raw model output, kept for the audit trail.
        raw: String,
    },

    /// ANTHROPIC_API_KEY is not set.
    #[error("ANTHROPIC_API_KEY not set")]
    MissingApiKey,
}

impl LlmError {
    /// Whether a bounded retry might help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::RateLimited(_))
    }

    /// Raw model output attached to this error, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Input to a classification call.
#[derive(Debug)]
pub struct ClassifyRequest<'a> {
    pub sender: &'a str,
    pub subject: &'a str,
    pub date: DateTime<Utc>,
    pub body: &'a str,
    /// Known companies, listed in the prompt for flexible name matching.
    pub known_companies: &'a [Company],
}

/// Input to a metric-extraction call over one source.
#[derive(Debug)]
pub struct MetricsRequest<'a> {
    pub company_name: &'a str,
    /// Human-readable provenance, e.g. `Email: <subject>` or
    /// `Attachment: <filename>`.
    pub source_label: &'a str,
    pub content: &'a str,
}

/// The AI model capability the collector depends on.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Decide whether the message is a company update and for which company.
    async fn classify(&self, req: &ClassifyRequest<'_>) -> Result<UpdateVerdict, LlmError>;

    /// Extract the fixed metric schema from one text source.
    async fn extract_metrics(&self, req: &MetricsRequest<'_>)
        -> Result<MetricsOutcome, LlmError>;
}
