//! End-to-end collector tests over stub mailbox and analyzer
//! implementations and a throwaway SQLite database.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use foliomail::collector::Collector;
use foliomail::llm::{
    Analyzer, ClassifyRequest, LlmError, MetricsOutcome, MetricsPayload, MetricsRequest,
};
use foliomail::mailbox::{MailSource, MailboxError, RawMessage};
use foliomail::models::{Company, Confidence, MetricSource, UpdateVerdict};
use foliomail::repository::DbContext;

/// Mailbox stub returning canned raw messages.
struct StubMailbox {
    messages: Vec<Vec<u8>>,
}

#[async_trait]
impl MailSource for StubMailbox {
    async fn fetch_recent(&self, _days: u32) -> Result<Vec<RawMessage>, MailboxError> {
        Ok(self
            .messages
            .iter()
            .map(|raw| RawMessage {
                raw: raw.clone(),
                forwarder: "partner@fund.example".to_string(),
            })
            .collect())
    }
}

/// Analyzer stub driven by subject conventions:
/// - subject "Fwd: <Name> update ..." classifies as an update for <Name>
/// - "(low)" in the subject -> low confidence
/// - "newsletter" in the subject -> not an update
/// Metric extraction echoes formatted values found in the content.
struct StubAnalyzer {
    classify_calls: AtomicUsize,
    metrics_calls: AtomicUsize,
}

impl StubAnalyzer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            classify_calls: AtomicUsize::new(0),
            metrics_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn classify(&self, req: &ClassifyRequest<'_>) -> Result<UpdateVerdict, LlmError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);

        if req.subject.contains("newsletter") {
            return Ok(UpdateVerdict {
                is_update: false,
                confidence: Confidence::High,
                ..Default::default()
            });
        }

        let company = req
            .subject
            .split_whitespace()
            .nth(1)
            .map(|s| s.to_string());
        let confidence = if req.subject.contains("(low)") {
            Confidence::Low
        } else {
            Confidence::High
        };
        let is_portfolio = req
            .known_companies
            .iter()
            .any(|c: &Company| company.as_deref() == Some(c.name.as_str()));

        Ok(UpdateVerdict {
            is_update: true,
            company_name: company,
            is_portfolio_company: is_portfolio,
            confidence,
            update_type: Some("monthly".to_string()),
            key_topics: vec!["revenue".to_string()],
            ..Default::default()
        })
    }

    async fn extract_metrics(
        &self,
        req: &MetricsRequest<'_>,
    ) -> Result<MetricsOutcome, LlmError> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);

        let arr = if req.content.contains("~$8.000M") {
            "~$8.000M"
        } else {
            "$1.2M"
        };
        let mut payload = MetricsPayload::default();
        payload.reporting_period = Some("May 2025".to_string());
        payload.metrics.arr = Some(arr.to_string());
        payload.metrics.runway_months = Some("14 months".to_string());
        payload.metrics.mrr = Some("N/A".to_string());
        payload.extraction_confidence = Some(Confidence::High);

        Ok(MetricsOutcome {
            payload,
            raw_response: format!("{{\"arr\": \"{}\"}}", arr),
            partial: false,
        })
    }
}

/// Build a simple RFC822 message, optionally with one plain attachment.
fn message(
    subject: &str,
    body: &str,
    msg_id: &str,
    attachment: Option<(&str, &str, &str)>,
) -> Vec<u8> {
    let mut raw = String::new();
    raw.push_str("From: Scot Partner <partner@fund.example>\r\n");
    raw.push_str("To: updates@fund.example\r\n");
    raw.push_str(&format!("Subject: {}\r\n", subject));
    raw.push_str(&format!("Message-ID: <{}>\r\n", msg_id));
    raw.push_str("Date: Sat, 3 May 2025 12:30:00 +0000\r\n");
    raw.push_str("MIME-Version: 1.0\r\n");

    match attachment {
        None => {
            raw.push_str("Content-Type: text/plain; charset=utf-8\r\n");
            raw.push_str("\r\n");
            raw.push_str(body);
            raw.push_str("\r\n");
        }
        Some((filename, mime, content)) => {
            raw.push_str("Content-Type: multipart/mixed; boundary=\"SEP\"\r\n");
            raw.push_str("\r\n");
            if !body.is_empty() {
                raw.push_str("--SEP\r\n");
                raw.push_str("Content-Type: text/plain; charset=utf-8\r\n");
                raw.push_str("\r\n");
                raw.push_str(body);
                raw.push_str("\r\n");
            }
            raw.push_str("--SEP\r\n");
            raw.push_str(&format!(
                "Content-Type: {}; name=\"{}\"\r\n",
                mime, filename
            ));
            raw.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{}\"\r\n",
                filename
            ));
            raw.push_str("\r\n");
            raw.push_str(content);
            raw.push_str("\r\n");
            raw.push_str("--SEP--\r\n");
        }
    }
    raw.into_bytes()
}

async fn test_context(dir: &Path) -> DbContext {
    let ctx = DbContext::new(&dir.join("test.db"));
    ctx.init_schema().await.unwrap();
    ctx
}

fn collector(
    ctx: &DbContext,
    dir: &Path,
    messages: Vec<Vec<u8>>,
    analyzer: Arc<StubAnalyzer>,
    dry_run: bool,
) -> Collector {
    Collector::new(
        Arc::new(StubMailbox { messages }),
        analyzer,
        ctx.clone(),
        dir.join("attachments"),
        dry_run,
        2,
    )
}

fn standard_messages() -> Vec<Vec<u8>> {
    vec![
        message(
            "Fwd: Natryx May update",
            "ARR: $1.2M, Runway: 14 months",
            "m1@mail.example",
            Some(("metrics.csv", "text/csv", "metric,value\nARR,$1.2M\n")),
        ),
        message(
            "Fwd: Validic investor update",
            "MRR grew 15% this month.",
            "m2@mail.example",
            None,
        ),
    ]
}

#[tokio::test]
async fn idempotence_second_run_creates_no_new_rows() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let analyzer = StubAnalyzer::new();
    let first = collector(&ctx, dir.path(), standard_messages(), analyzer.clone(), false)
        .run(7)
        .await
        .unwrap();
    assert_eq!(first.messages_found, 2);
    assert_eq!(first.new_updates, 2);
    assert_eq!(first.new_companies, 2);
    assert_eq!(first.failures, 0);

    let stats_before = ctx.stats().await.unwrap();
    assert_eq!(stats_before.email_updates, 2);

    // Same window, no new mail: everything is skipped before any AI call.
    let classify_before = analyzer.classify_calls.load(Ordering::SeqCst);
    let second = collector(&ctx, dir.path(), standard_messages(), analyzer.clone(), false)
        .run(7)
        .await
        .unwrap();
    assert_eq!(second.duplicates_skipped, 2);
    assert_eq!(second.new_updates, 0);
    assert_eq!(second.new_companies, 0);
    assert_eq!(second.new_metric_rows, 0);
    assert_eq!(
        analyzer.classify_calls.load(Ordering::SeqCst),
        classify_before
    );

    let stats_after = ctx.stats().await.unwrap();
    assert_eq!(stats_after.email_updates, stats_before.email_updates);
    assert_eq!(stats_after.metrics_rows, stats_before.metrics_rows);
    assert_eq!(stats_after.total_companies(), stats_before.total_companies());
}

#[tokio::test]
async fn confidence_gating_skips_metric_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    // Low confidence + unknown company: no metric extraction call.
    let analyzer = StubAnalyzer::new();
    let messages = vec![message(
        "Fwd: Mysterio update (low)",
        "Maybe revenue went up?",
        "gate1@mail.example",
        None,
    )];
    let summary = collector(&ctx, dir.path(), messages, analyzer.clone(), false)
        .run(7)
        .await
        .unwrap();
    assert_eq!(analyzer.classify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(analyzer.metrics_calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.new_companies, 0);
    assert_eq!(summary.new_metric_rows, 0);
    // The message row still exists (unclassified) so it is never re-analyzed
    let stats = ctx.stats().await.unwrap();
    assert_eq!(stats.email_updates, 1);
    assert_eq!(stats.total_companies(), 0);

    // Low confidence but a known company: extraction runs.
    let known = Company::new("Validic".to_string(), true);
    ctx.companies().insert(&known).await.unwrap();
    let analyzer2 = StubAnalyzer::new();
    let messages = vec![message(
        "Fwd: Validic update (low)",
        "MRR is $112K.",
        "gate2@mail.example",
        None,
    )];
    collector(&ctx, dir.path(), messages, analyzer2.clone(), false)
        .run(7)
        .await
        .unwrap();
    assert_eq!(analyzer2.metrics_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn metric_formatting_is_preserved_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let analyzer = StubAnalyzer::new();
    let messages = vec![message(
        "Fwd: Natryx annual letter",
        "We closed the year at ~$8.000M ARR.",
        "fmt@mail.example",
        None,
    )];
    collector(&ctx, dir.path(), messages, analyzer, false)
        .run(7)
        .await
        .unwrap();

    let (update, _) = ctx
        .emails()
        .recent_with_company(1)
        .await
        .unwrap()
        .pop()
        .unwrap();
    let rows = ctx.metrics().for_email_update(update.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    // No numeric coercion or rounding anywhere in the pipeline
    assert_eq!(rows[0].metrics.arr.as_deref(), Some("~$8.000M"));
    // "N/A" placeholders are dropped, not stored
    assert_eq!(rows[0].metrics.mrr, None);
}

#[tokio::test]
async fn partial_failure_is_isolated_to_one_message() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let mut messages = standard_messages();
    // Message 3 is unparseable; 4 and 5 are fine.
    messages.push(Vec::new());
    messages.push(message(
        "Fwd: Trayecto monthly update",
        "Cash balance $2.8M.",
        "p4@mail.example",
        None,
    ));
    messages.push(message(
        "Fwd: Initech quarterly update",
        "EBITDA positive.",
        "p5@mail.example",
        None,
    ));

    let analyzer = StubAnalyzer::new();
    let summary = collector(&ctx, dir.path(), messages, analyzer, false)
        .run(7)
        .await
        .unwrap();

    assert_eq!(summary.messages_found, 5);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.new_updates, 4);

    let stats = ctx.stats().await.unwrap();
    assert_eq!(stats.email_updates, 4);
}

#[tokio::test]
async fn company_name_variants_resolve_to_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let messages = vec![
        message("Fwd: validic update", "body one", "v1@mail.example", None),
        message("Fwd: Validic update", "body two", "v2@mail.example", None),
        message("Fwd: VALIDIC update", "body three", "v3@mail.example", None),
    ];
    let analyzer = StubAnalyzer::new();
    let summary = collector(&ctx, dir.path(), messages, analyzer, false)
        .run(7)
        .await
        .unwrap();

    assert_eq!(summary.new_updates, 3);
    assert_eq!(summary.new_companies, 1);
    let stats = ctx.stats().await.unwrap();
    assert_eq!(stats.total_companies(), 1);
}

#[tokio::test]
async fn dry_run_writes_nothing_but_reports_same_counts() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let analyzer = StubAnalyzer::new();
    let dry = collector(&ctx, dir.path(), standard_messages(), analyzer, true)
        .run(7)
        .await
        .unwrap();
    assert!(dry.dry_run);

    // Zero writes anywhere
    let stats = ctx.stats().await.unwrap();
    assert_eq!(stats.email_updates, 0);
    assert_eq!(stats.total_companies(), 0);
    assert_eq!(stats.metrics_rows, 0);
    assert!(!dir.path().join("attachments").exists());

    // A real run over the same input reports the same counts
    let analyzer2 = StubAnalyzer::new();
    let real = collector(&ctx, dir.path(), standard_messages(), analyzer2, false)
        .run(7)
        .await
        .unwrap();
    assert_eq!(dry.messages_found, real.messages_found);
    assert_eq!(dry.new_companies, real.new_companies);
    assert_eq!(dry.new_updates, real.new_updates);
    assert_eq!(dry.new_attachments, real.new_attachments);
    assert_eq!(dry.new_metric_rows, real.new_metric_rows);
    assert_eq!(dry.failures, real.failures);
}

#[tokio::test]
async fn known_company_with_attachment_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let natryx = Company::new("Natryx".to_string(), true);
    let natryx_id = ctx.companies().insert(&natryx).await.unwrap();

    // Attachment-only message: the single metrics row is attributed to the
    // attachment source.
    let messages = vec![message(
        "Fwd: Natryx May report",
        "",
        "scenario@mail.example",
        Some((
            "may-report.csv",
            "text/csv",
            "metric,value\nARR,$1.2M\nRunway,14 months\n",
        )),
    )];
    let analyzer = StubAnalyzer::new();
    let summary = collector(&ctx, dir.path(), messages, analyzer, false)
        .run(7)
        .await
        .unwrap();

    assert_eq!(summary.new_updates, 1);
    assert_eq!(summary.new_companies, 0);
    assert_eq!(summary.new_attachments, 1);
    assert_eq!(summary.new_metric_rows, 1);

    let (update, company_name) = ctx
        .emails()
        .recent_with_company(1)
        .await
        .unwrap()
        .pop()
        .unwrap();
    assert_eq!(company_name.as_deref(), Some("Natryx"));
    assert_eq!(update.company_id, Some(natryx_id));
    assert!(update.has_attachments);

    let rows = ctx.metrics().for_email_update(update.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].metrics.arr.as_deref(), Some("$1.2M"));
    assert_eq!(rows[0].metrics.runway_months.as_deref(), Some("14 months"));
    assert_eq!(
        rows[0].source,
        MetricSource::Attachment {
            filename: "may-report.csv".to_string()
        }
    );

    // The file landed in the company's bucket with a timestamped name
    let bucket = dir.path().join("attachments").join(natryx_id.to_string());
    let entries: Vec<_> = std::fs::read_dir(&bucket).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].as_ref().unwrap().file_name();
    assert!(name.to_string_lossy().ends_with("may-report.csv"));

    // The company's escalation signal was bumped to the message date
    let refreshed = ctx.companies().get(natryx_id).await.unwrap().unwrap();
    assert_eq!(
        refreshed.last_update_date.unwrap().to_rfc3339(),
        "2025-05-03T12:30:00+00:00"
    );
}

#[tokio::test]
async fn non_updates_are_recorded_but_not_classified() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let messages = vec![message(
        "Fwd: industry newsletter digest",
        "Top 10 trends this week",
        "news@mail.example",
        None,
    )];
    let analyzer = StubAnalyzer::new();
    let summary = collector(&ctx, dir.path(), messages, analyzer.clone(), false)
        .run(7)
        .await
        .unwrap();

    assert_eq!(summary.not_updates, 1);
    assert_eq!(summary.new_updates, 1);
    assert_eq!(analyzer.metrics_calls.load(Ordering::SeqCst), 0);

    let (update, company_name) = ctx
        .emails()
        .recent_with_company(1)
        .await
        .unwrap()
        .pop()
        .unwrap();
    assert_eq!(company_name, None);
    assert_eq!(update.company_id, None);
}

#[tokio::test]
async fn lookback_window_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path()).await;

    let analyzer = StubAnalyzer::new();
    let c = collector(&ctx, dir.path(), Vec::new(), analyzer, false);
    assert!(c.run(0).await.is_err());
    assert!(c.run(366).await.is_err());
    assert!(c.run(365).await.is_ok());
}
