//! Collector orchestrator: drives one collection run end-to-end.
//!
//! Per-message state machine:
//! fetched -> fingerprinted -> {already seen -> skip} |
//! {new -> extracted -> classified -> (if confident) metric-extracted -> persisted}
//!
//! Messages are processed sequentially, one fully before the next; a
//! failure on one message is caught here and never stops the batch.
//! Mailbox failures, by contrast, fail the whole run fast.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::extract;
use crate::llm::{Analyzer, ClassifyRequest, MetricsOutcome, MetricsRequest};
use crate::mailbox::{MailSource, RawMessage};
use crate::models::{
    match_company, Company, Confidence, EmailContent, ExtractionStage, ExtractionStatus,
    MetricSource, UpdateVerdict,
};
use crate::repository::{
    AuditEntry, CompanyLink, DbContext, MessagePersistRequest, NewMetricsEntry,
    PersistOutcome, StoredAttachment,
};
use crate::storage;

/// Bounds on the operator-supplied lookback window.
pub const MIN_LOOKBACK_DAYS: u32 = 1;
pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// Counts reported at the end of a collection run. This is the contract
/// monitoring relies on; failures surface here, not just in logs.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub messages_found: usize,
    pub duplicates_skipped: usize,
    /// Fetched messages the classifier judged not to be company updates.
    pub not_updates: usize,
    pub new_companies: usize,
    pub new_updates: usize,
    pub new_attachments: usize,
    pub new_metric_rows: usize,
    /// Messages that failed processing entirely.
    pub failures: usize,
    pub dry_run: bool,
}

/// The batch collector.
///
/// All collaborators are injected: tests run against stub mailboxes and
/// analyzers and a throwaway database.
pub struct Collector {
    mail: Arc<dyn MailSource>,
    analyzer: Arc<dyn Analyzer>,
    db: DbContext,
    attachments_dir: PathBuf,
    dry_run: bool,
    max_retries: u32,
}

impl Collector {
    pub fn new(
        mail: Arc<dyn MailSource>,
        analyzer: Arc<dyn Analyzer>,
        db: DbContext,
        attachments_dir: PathBuf,
        dry_run: bool,
        max_retries: u32,
    ) -> Self {
        Self {
            mail,
            analyzer,
            db,
            attachments_dir,
            dry_run,
            max_retries,
        }
    }

    /// Run one collection pass over the lookback window.
    pub async fn run(&self, days: u32) -> anyhow::Result<RunSummary> {
        if !(MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS).contains(&days) {
            anyhow::bail!(
                "lookback days must be between {} and {}",
                MIN_LOOKBACK_DAYS,
                MAX_LOOKBACK_DAYS
            );
        }

        // A mailbox failure is run-fatal: connectivity will not fix itself
        // mid-run.
        let messages = self.mail.fetch_recent(days).await?;

        let mut summary = RunSummary {
            messages_found: messages.len(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        let mut known = self.db.companies().get_all().await?;
        let mut seen_fingerprints: HashSet<String> = HashSet::new();

        for (index, message) in messages.iter().enumerate() {
            match self
                .process_message(message, &mut known, &mut seen_fingerprints, &mut summary)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    warn!("message {}/{} failed: {:#}", index + 1, messages.len(), e);
                    summary.failures += 1;
                }
            }
        }

        info!(
            "run complete: {} found, {} new, {} duplicates, {} failures",
            summary.messages_found,
            summary.new_updates,
            summary.duplicates_skipped,
            summary.failures
        );
        Ok(summary)
    }

    /// Process a single message end-to-end.
    async fn process_message(
        &self,
        message: &RawMessage,
        known: &mut Vec<Company>,
        seen: &mut HashSet<String>,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        let content = extract::parse_message(&message.raw)
            .map_err(|e| anyhow::anyhow!("content extraction failed: {}", e))?;

        // Deduplicate before any AI call; this is the idempotence
        // guarantee for overlapping daily windows.
        let fingerprint = content.fingerprint();
        if seen.contains(&fingerprint)
            || self.db.emails().fingerprint_exists(&fingerprint).await?
        {
            debug!("skipping already-seen message: {}", content.subject);
            summary.duplicates_skipped += 1;
            return Ok(());
        }
        seen.insert(fingerprint.clone());

        info!("analyzing: {} (from {})", content.subject, message.forwarder);

        // Classify, with bounded retry on transient failures.
        let (verdict, classify_retries) = {
            let request = ClassifyRequest {
                sender: &content.sender,
                subject: &content.subject,
                date: content.date,
                body: &content.body,
                known_companies: known,
            };
            let mut attempt = 0u32;
            loop {
                match self.analyzer.classify(&request).await {
                    Ok(verdict) => break (Ok(verdict), attempt),
                    Err(e) if e.is_retryable() && attempt < self.max_retries => {
                        warn!("classification retry {}: {}", attempt + 1, e);
                        tokio::time::sleep(backoff(attempt)).await;
                        attempt += 1;
                    }
                    Err(e) => break (Err(e), attempt),
                }
            }
        };

        let verdict = match verdict {
            Ok(verdict) => verdict,
            Err(e) => {
                // Record the failed attempt and keep the message row so the
                // batch moves on; the audit trail holds the raw output.
                let audit = AuditEntry {
                    source: None,
                    stage: ExtractionStage::Classify,
                    status: ExtractionStatus::Failed,
                    raw_response: e.raw_response().map(|s| s.to_string()),
                    error_message: Some(e.to_string()),
                    retry_count: classify_retries as i32,
                };
                self.persist(
                    &content,
                    &fingerprint,
                    None,
                    None,
                    Vec::new(),
                    Vec::new(),
                    vec![audit],
                    summary,
                )
                .await?;
                summary.failures += 1;
                return Ok(());
            }
        };

        if !verdict.is_update {
            debug!("not a company update: {}", content.subject);
            summary.not_updates += 1;
            self.persist(
                &content,
                &fingerprint,
                None,
                Some(&verdict),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                summary,
            )
            .await?;
            return Ok(());
        }

        // Resolve the reported name against the known set. An unmatched
        // name only creates a company when confidence clears the gate, and
        // never with portfolio status granted automatically.
        let reported = verdict.reported_company().map(|s| s.to_string());
        let matched = reported
            .as_deref()
            .and_then(|name| match_company(name, known))
            .map(|c| (c.id, c.is_portfolio));

        let gate_open = metrics_gate(&verdict, matched.is_some());
        if !gate_open {
            debug!(
                "low confidence and no company match, skipping extraction: {}",
                content.subject
            );
        }

        let link = match (gate_open, matched, reported.as_deref()) {
            (true, Some((id, is_portfolio)), _) => Some(CompanyLink {
                id,
                make_portfolio: verdict.is_portfolio_company && !is_portfolio,
            }),
            (true, None, Some(name)) => {
                // First sighting: create the company row up front so
                // attachment files land in its final bucket.
                info!("creating new company record: {}", name);
                let id = if self.dry_run {
                    0
                } else {
                    let (company, _created) =
                        self.db.companies().find_or_create_observed(name).await?;
                    company.id
                };
                summary.new_companies += 1;
                let mut company = Company::new(name.to_string(), false);
                company.id = id;
                known.push(company);
                Some(CompanyLink {
                    id,
                    make_portfolio: false,
                })
            }
            _ => None,
        };

        // Metric extraction runs only behind the confidence gate.
        let mut metrics_entries = Vec::new();
        let mut audits = Vec::new();
        if link.is_some() {
            if let Some(company_name) = reported.as_deref() {
                self.extract_all_metrics(&content, company_name, &mut metrics_entries, &mut audits)
                    .await;
            }
        }

        // Classification is done, so attachments go straight to their
        // final company bucket.
        let stored = match link {
            Some(link) => self.store_attachments(&content, link.id)?,
            None => Vec::new(),
        };

        self.persist(
            &content,
            &fingerprint,
            link,
            Some(&verdict),
            stored,
            metrics_entries,
            audits,
            summary,
        )
        .await?;

        Ok(())
    }

    /// Run metric extraction over every source: the body, then each
    /// extractable attachment independently.
    async fn extract_all_metrics(
        &self,
        content: &EmailContent,
        company_name: &str,
        entries: &mut Vec<NewMetricsEntry>,
        audits: &mut Vec<AuditEntry>,
    ) {
        let mut sources: Vec<(MetricSource, String, String)> = Vec::new();

        if !content.body.trim().is_empty() {
            sources.push((
                MetricSource::EmailBody,
                format!("Email: {}", content.subject),
                content.body.clone(),
            ));
        }

        for attachment in &content.attachments {
            match extract::extract_attachment_text(attachment) {
                Ok(text) if !text.trim().is_empty() => {
                    sources.push((
                        MetricSource::Attachment {
                            filename: attachment.filename.clone(),
                        },
                        format!("Attachment: {}", attachment.filename),
                        text,
                    ));
                }
                Ok(_) => {
                    debug!("no text in attachment {}", attachment.filename);
                }
                Err(e) if e.is_unsupported() => {
                    debug!("skipping unsupported attachment {}", attachment.filename);
                }
                Err(e) => {
                    // One broken attachment never aborts the message.
                    warn!("extraction failed for {}: {}", attachment.filename, e);
                    audits.push(AuditEntry {
                        source: Some(MetricSource::Attachment {
                            filename: attachment.filename.clone(),
                        }),
                        stage: ExtractionStage::Metrics,
                        status: ExtractionStatus::Failed,
                        raw_response: None,
                        error_message: Some(e.to_string()),
                        retry_count: 0,
                    });
                }
            }
        }

        for (source, label, text) in sources {
            let (result, retries) = {
                let request = MetricsRequest {
                    company_name,
                    source_label: &label,
                    content: &text,
                };
                let mut attempt = 0u32;
                loop {
                    match self.analyzer.extract_metrics(&request).await {
                        Ok(outcome) => break (Ok(outcome), attempt),
                        Err(e) if e.is_retryable() && attempt < self.max_retries => {
                            warn!("metrics retry {} for {}: {}", attempt + 1, label, e);
                            tokio::time::sleep(backoff(attempt)).await;
                            attempt += 1;
                        }
                        Err(e) => break (Err(e), attempt),
                    }
                }
            };

            match result {
                Ok(outcome) => {
                    let status = if outcome.partial {
                        ExtractionStatus::Partial
                    } else {
                        ExtractionStatus::Success
                    };
                    audits.push(AuditEntry {
                        source: Some(source.clone()),
                        stage: ExtractionStage::Metrics,
                        status,
                        raw_response: Some(outcome.raw_response.clone()),
                        error_message: None,
                        retry_count: retries as i32,
                    });
                    entries.push(metrics_entry(source, &label, outcome));
                }
                Err(e) => {
                    warn!("metrics extraction failed for {}: {}", label, e);
                    audits.push(AuditEntry {
                        source: Some(source),
                        stage: ExtractionStage::Metrics,
                        status: ExtractionStatus::Failed,
                        raw_response: e.raw_response().map(|s| s.to_string()),
                        error_message: Some(e.to_string()),
                        retry_count: retries as i32,
                    });
                }
            }
        }
    }

    /// Write attachment files to their final company bucket. Suppressed in
    /// dry-run mode.
    fn store_attachments(
        &self,
        content: &EmailContent,
        company_id: i64,
    ) -> anyhow::Result<Vec<StoredAttachment>> {
        let mut stored = Vec::new();
        for attachment in &content.attachments {
            if self.dry_run {
                stored.push(StoredAttachment {
                    filename: attachment.filename.clone(),
                    stored_path: String::new(),
                    file_size: attachment.size(),
                    category: attachment.category,
                });
                continue;
            }
            let path = storage::save_attachment(
                &self.attachments_dir,
                company_id,
                content.date,
                &attachment.filename,
                &attachment.data,
            )?;
            info!(
                "saved attachment {} ({} bytes)",
                attachment.filename,
                attachment.size()
            );
            stored.push(StoredAttachment {
                filename: attachment.filename.clone(),
                stored_path: path.display().to_string(),
                file_size: attachment.size(),
                category: attachment.category,
            });
        }
        Ok(stored)
    }

    /// Persist one message (or account for it in dry-run mode) and fold
    /// the outcome into the summary.
    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        content: &EmailContent,
        fingerprint: &str,
        company: Option<CompanyLink>,
        verdict: Option<&UpdateVerdict>,
        stored: Vec<StoredAttachment>,
        metrics: Vec<NewMetricsEntry>,
        audits: Vec<AuditEntry>,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        if self.dry_run {
            summary.new_updates += 1;
            summary.new_attachments += stored.len();
            summary.new_metric_rows += metrics.len();
            return Ok(());
        }

        let request = MessagePersistRequest {
            content,
            fingerprint,
            company,
            verdict,
            attachments: stored,
            metrics,
            audits,
        };
        let outcome: PersistOutcome = self.db.emails().persist_message(&request).await?;

        if outcome.duplicate_skipped {
            summary.duplicates_skipped += 1;
            return Ok(());
        }

        summary.new_updates += 1;
        summary.new_attachments += outcome.attachments_inserted;
        summary.new_metric_rows += outcome.metrics_inserted;

        Ok(())
    }
}

/// Resource-saving policy: skip metric extraction when the classifier is
/// unsure and the company is unknown.
fn metrics_gate(verdict: &UpdateVerdict, matched: bool) -> bool {
    verdict.is_update && !(verdict.confidence == Confidence::Low && !matched)
}

/// Exponential backoff for retryable AI failures: 1s, 2s, 4s...
fn backoff(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_secs(1u64 << attempt.min(4))
}

/// Build a metrics entry from one successful extraction pass.
fn metrics_entry(
    source: MetricSource,
    label: &str,
    outcome: MetricsOutcome,
) -> NewMetricsEntry {
    NewMetricsEntry {
        source,
        reporting_period: outcome
            .payload
            .reporting_period
            .filter(|p| !p.trim().is_empty() && !p.eq_ignore_ascii_case("n/a")),
        reporting_date: parse_reporting_date(outcome.payload.reporting_date.as_deref()),
        confidence: outcome
            .payload
            .extraction_confidence
            .unwrap_or(Confidence::Medium),
        metrics: outcome.payload.metrics.cleaned(),
        notes: Some(format!("Extracted from {}", label)),
    }
}

/// Parse the model's YYYY-MM-DD reporting date estimate.
fn parse_reporting_date(date: Option<&str>) -> Option<DateTime<Utc>> {
    let date = date?.trim();
    if date.is_empty() || date.eq_ignore_ascii_case("n/a") {
        return None;
    }
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        naive.and_time(NaiveTime::MIN),
        Utc,
    ))
}
