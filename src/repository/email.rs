//! Email update repository.
//!
//! Owns the per-message transactional write: company resolution, the
//! email_updates row, attachment rows, financial metrics and extraction
//! audit rows all commit or roll back together, so a mid-message failure
//! never leaves an update without its metrics.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use std::collections::HashMap;

use super::pool::{last_insert_rowid, AsyncSqlitePool, DieselError};
use super::records::{
    EmailUpdateRecord, NewAttachment, NewEmailUpdate, NewFinancialMetrics,
    NewMetricExtraction,
};
use super::parse_datetime;
use crate::models::{
    AttachmentCategory, Confidence, EmailContent, EmailUpdate, ExtractionStage,
    ExtractionStatus, MetricSet, MetricSource, UpdateVerdict,
};
use crate::schema::{attachments, companies, email_updates, financial_metrics, metric_extractions};

/// Link from a classified message to its (already resolved) company row.
#[derive(Debug, Clone, Copy)]
pub struct CompanyLink {
    pub id: i64,
    /// Classifier says this is a portfolio company but the record doesn't;
    /// portfolio status is granted, never revoked.
    pub make_portfolio: bool,
}

/// An attachment already written to its final storage path.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub filename: String,
    pub stored_path: String,
    pub file_size: u64,
    pub category: AttachmentCategory,
}

/// One metrics row to persist, attributed to its source.
#[derive(Debug, Clone)]
pub struct NewMetricsEntry {
    pub source: MetricSource,
    pub reporting_period: Option<String>,
    pub reporting_date: Option<DateTime<Utc>>,
    pub confidence: Confidence,
    pub metrics: MetricSet,
    pub notes: Option<String>,
}

/// One extraction-attempt audit row to persist.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Source the attempt ran over; None for message-level classification.
    pub source: Option<MetricSource>,
    pub stage: ExtractionStage,
    pub status: ExtractionStatus,
    pub raw_response: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
}

/// Everything the collector wants written for one message.
#[derive(Debug)]
pub struct MessagePersistRequest<'a> {
    pub content: &'a EmailContent,
    pub fingerprint: &'a str,
    /// None when the message was not confidently classified.
    pub company: Option<CompanyLink>,
    pub verdict: Option<&'a UpdateVerdict>,
    pub attachments: Vec<StoredAttachment>,
    pub metrics: Vec<NewMetricsEntry>,
    pub audits: Vec<AuditEntry>,
}

/// What the transaction actually did.
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub email_update_id: i64,
    pub company_id: Option<i64>,
    pub attachments_inserted: usize,
    pub metrics_inserted: usize,
    /// The fingerprint was already present; nothing was written.
    pub duplicate_skipped: bool,
}

/// Repository for email update records and the per-message write.
#[derive(Clone)]
pub struct EmailUpdateRepository {
    pool: AsyncSqlitePool,
}

impl EmailUpdateRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Count all email updates.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = email_updates::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Count updates received after the cutoff.
    pub async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = email_updates::table
            .filter(email_updates::received_at.ge(cutoff.to_rfc3339()))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Count updates that carried attachments.
    pub async fn count_with_attachments(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = email_updates::table
            .filter(email_updates::has_attachments.eq(true))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Whether a message with this fingerprint was already persisted.
    ///
    /// This check runs before any LLM call; it is the primary idempotence
    /// guarantee for overlapping collection windows.
    pub async fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = email_updates::table
            .filter(email_updates::fingerprint.eq(fingerprint))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count > 0)
    }

    /// Most recent updates with their company names, newest first.
    pub async fn recent_with_company(
        &self,
        limit: u32,
    ) -> Result<Vec<(EmailUpdate, Option<String>)>, DieselError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(EmailUpdateRecord, Option<String>)> = email_updates::table
            .left_join(companies::table)
            .select((
                EmailUpdateRecord::as_select(),
                companies::name.nullable(),
            ))
            .order(email_updates::received_at.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(record, name)| (record_to_email_update(record), name))
            .collect())
    }

    /// Persist one fully processed message in a single transaction.
    pub async fn persist_message(
        &self,
        req: &MessagePersistRequest<'_>,
    ) -> Result<PersistOutcome, DieselError> {
        let mut conn = self.pool.get().await?;

        let received_at = req.content.date.to_rfc3339();
        let now = Utc::now().to_rfc3339();
        let key_topics = req
            .verdict
            .map(|v| serde_json::to_string(&v.key_topics).unwrap_or_else(|_| "[]".to_string()))
            .unwrap_or_else(|| "[]".to_string());

        conn.transaction(|conn| {
            Box::pin(async move {
                // Idempotence backstop; the collector checks before any AI
                // call, this guards the write itself.
                use diesel::dsl::count_star;
                let existing: i64 = email_updates::table
                    .filter(email_updates::fingerprint.eq(req.fingerprint))
                    .select(count_star())
                    .first(conn)
                    .await?;
                if existing > 0 {
                    return Ok(PersistOutcome {
                        duplicate_skipped: true,
                        ..Default::default()
                    });
                }

                let company_id = match &req.company {
                    None => None,
                    Some(CompanyLink { id, make_portfolio }) => {
                        if *make_portfolio {
                            diesel::update(companies::table.find(*id))
                                .set(companies::is_portfolio.eq(true))
                                .execute(conn)
                                .await?;
                        }
                        Some(*id)
                    }
                };

                let update_record = NewEmailUpdate {
                    company_id,
                    fingerprint: req.fingerprint,
                    sender: &req.content.sender,
                    original_sender: req
                        .verdict
                        .and_then(|v| v.original_sender.as_deref()),
                    subject: &req.content.subject,
                    body: &req.content.body,
                    received_at: &received_at,
                    has_attachments: req.content.has_attachments(),
                    update_type: req.verdict.and_then(|v| v.update_type.as_deref()),
                    key_topics: &key_topics,
                    processed_at: &now,
                };
                diesel::insert_into(email_updates::table)
                    .values(&update_record)
                    .execute(conn)
                    .await?;
                let email_update_id = last_insert_rowid(conn).await?;

                // Attachment rows only exist for classified messages (they
                // are stored under the company's directory).
                let mut attachment_ids: HashMap<String, i64> = HashMap::new();
                if let Some(company_id) = company_id {
                    for stored in &req.attachments {
                        let record = NewAttachment {
                            email_update_id,
                            company_id,
                            filename: &stored.filename,
                            stored_path: &stored.stored_path,
                            file_size: stored.file_size as i64,
                            category: stored.category.as_str(),
                        };
                        diesel::insert_into(attachments::table)
                            .values(&record)
                            .execute(conn)
                            .await?;
                        let id = last_insert_rowid(conn).await?;
                        attachment_ids.insert(stored.filename.clone(), id);
                    }
                }

                let mut metrics_inserted = 0;
                if let Some(company_id) = company_id {
                    for entry in &req.metrics {
                        let reporting_date =
                            entry.reporting_date.map(|d| d.to_rfc3339());
                        let m = &entry.metrics;
                        let record = NewFinancialMetrics {
                            company_id,
                            email_update_id,
                            reporting_period: entry.reporting_period.as_deref(),
                            reporting_date: reporting_date.as_deref(),
                            extracted_at: &now,
                            mrr: m.mrr.as_deref(),
                            arr: m.arr.as_deref(),
                            qrr: m.qrr.as_deref(),
                            total_revenue: m.total_revenue.as_deref(),
                            gross_revenue: m.gross_revenue.as_deref(),
                            net_revenue: m.net_revenue.as_deref(),
                            mrr_growth: m.mrr_growth.as_deref(),
                            arr_growth: m.arr_growth.as_deref(),
                            revenue_growth_yoy: m.revenue_growth_yoy.as_deref(),
                            revenue_growth_mom: m.revenue_growth_mom.as_deref(),
                            cash_balance: m.cash_balance.as_deref(),
                            net_burn: m.net_burn.as_deref(),
                            gross_burn: m.gross_burn.as_deref(),
                            runway_months: m.runway_months.as_deref(),
                            gross_margin: m.gross_margin.as_deref(),
                            ebitda: m.ebitda.as_deref(),
                            ebitda_margin: m.ebitda_margin.as_deref(),
                            net_income: m.net_income.as_deref(),
                            customer_count: m.customer_count.as_deref(),
                            new_customers: m.new_customers.as_deref(),
                            churn_rate: m.churn_rate.as_deref(),
                            ltv: m.ltv.as_deref(),
                            cac: m.cac.as_deref(),
                            team_size: m.team_size.as_deref(),
                            bookings: m.bookings.as_deref(),
                            pipeline: m.pipeline.as_deref(),
                            key_highlights: m.key_highlights.as_deref(),
                            key_challenges: m.key_challenges.as_deref(),
                            funding_status: m.funding_status.as_deref(),
                            source_type: entry.source.source_type(),
                            source_file: entry.source.source_file(),
                            extraction_confidence: entry.confidence.as_str(),
                            extraction_notes: entry.notes.as_deref(),
                        };
                        diesel::insert_into(financial_metrics::table)
                            .values(&record)
                            .execute(conn)
                            .await?;
                        metrics_inserted += 1;
                    }
                }

                for audit in &req.audits {
                    let attachment_id = audit
                        .source
                        .as_ref()
                        .and_then(|s| s.source_file())
                        .and_then(|f| attachment_ids.get(f))
                        .copied();
                    let record = NewMetricExtraction {
                        email_update_id,
                        attachment_id,
                        stage: audit.stage.as_str(),
                        status: audit.status.as_str(),
                        raw_response: audit.raw_response.as_deref(),
                        error_message: audit.error_message.as_deref(),
                        retry_count: audit.retry_count,
                        extracted_at: &now,
                    };
                    diesel::insert_into(metric_extractions::table)
                        .values(&record)
                        .execute(conn)
                        .await?;
                }

                // Keep the escalation signal accurate: bump the company's
                // last update date, never backwards.
                if let Some(company_id) = company_id {
                    diesel::update(
                        companies::table.find(company_id).filter(
                            companies::last_update_date
                                .is_null()
                                .or(companies::last_update_date.lt(&received_at)),
                        ),
                    )
                    .set(companies::last_update_date.eq(&received_at))
                    .execute(conn)
                    .await?;
                }

                Ok(PersistOutcome {
                    email_update_id,
                    company_id,
                    attachments_inserted: attachment_ids.len(),
                    metrics_inserted,
                    duplicate_skipped: false,
                })
            })
        })
        .await
    }
}

/// Convert a database record to the domain model.
pub(crate) fn record_to_email_update(record: EmailUpdateRecord) -> EmailUpdate {
    let key_topics: Vec<String> =
        serde_json::from_str(&record.key_topics).unwrap_or_default();
    EmailUpdate {
        id: record.id,
        company_id: record.company_id,
        fingerprint: record.fingerprint,
        sender: record.sender,
        original_sender: record.original_sender,
        subject: record.subject,
        body: record.body,
        received_at: parse_datetime(&record.received_at),
        has_attachments: record.has_attachments,
        update_type: record.update_type,
        key_topics,
        processed_at: parse_datetime(&record.processed_at),
    }
}
