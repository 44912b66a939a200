//! Financial metrics repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{FinancialMetricsRecord, MetricExtractionRecord};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{
    Confidence, ExtractionStage, ExtractionStatus, FinancialMetrics, MetricExtraction,
    MetricSet, MetricSource,
};
use crate::schema::{financial_metrics, metric_extractions};

/// Repository for extracted metrics and their audit trail.
#[derive(Clone)]
pub struct MetricsRepository {
    pool: AsyncSqlitePool,
}

impl MetricsRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Count all metrics rows.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = financial_metrics::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Count audit rows with the given status.
    pub async fn count_extractions_by_status(
        &self,
        status: ExtractionStatus,
    ) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = metric_extractions::table
            .filter(metric_extractions::status.eq(status.as_str()))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// All metrics rows for one email update, in insertion order.
    pub async fn for_email_update(
        &self,
        email_update_id: i64,
    ) -> Result<Vec<FinancialMetrics>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<FinancialMetricsRecord> = financial_metrics::table
            .filter(financial_metrics::email_update_id.eq(email_update_id))
            .order(financial_metrics::id.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(record_to_metrics).collect())
    }

    /// All audit rows for one email update, in insertion order.
    pub async fn extractions_for_email_update(
        &self,
        email_update_id: i64,
    ) -> Result<Vec<MetricExtraction>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<MetricExtractionRecord> = metric_extractions::table
            .filter(metric_extractions::email_update_id.eq(email_update_id))
            .order(metric_extractions::id.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(record_to_extraction).collect())
    }
}

fn record_to_metrics(record: FinancialMetricsRecord) -> FinancialMetrics {
    let source = MetricSource::from_columns(&record.source_type, record.source_file.clone());
    FinancialMetrics {
        id: record.id,
        company_id: record.company_id,
        email_update_id: record.email_update_id,
        reporting_period: record.reporting_period,
        reporting_date: parse_datetime_opt(record.reporting_date),
        extracted_at: parse_datetime(&record.extracted_at),
        metrics: MetricSet {
            mrr: record.mrr,
            arr: record.arr,
            qrr: record.qrr,
            total_revenue: record.total_revenue,
            gross_revenue: record.gross_revenue,
            net_revenue: record.net_revenue,
            mrr_growth: record.mrr_growth,
            arr_growth: record.arr_growth,
            revenue_growth_yoy: record.revenue_growth_yoy,
            revenue_growth_mom: record.revenue_growth_mom,
            cash_balance: record.cash_balance,
            net_burn: record.net_burn,
            gross_burn: record.gross_burn,
            runway_months: record.runway_months,
            gross_margin: record.gross_margin,
            ebitda: record.ebitda,
            ebitda_margin: record.ebitda_margin,
            net_income: record.net_income,
            customer_count: record.customer_count,
            new_customers: record.new_customers,
            churn_rate: record.churn_rate,
            ltv: record.ltv,
            cac: record.cac,
            team_size: record.team_size,
            bookings: record.bookings,
            pipeline: record.pipeline,
            key_highlights: record.key_highlights,
            key_challenges: record.key_challenges,
            funding_status: record.funding_status,
        },
        source,
        extraction_confidence: Confidence::from_str(&record.extraction_confidence)
            .unwrap_or(Confidence::Medium),
        extraction_notes: record.extraction_notes,
    }
}

fn record_to_extraction(record: MetricExtractionRecord) -> MetricExtraction {
    MetricExtraction {
        id: record.id,
        email_update_id: record.email_update_id,
        attachment_id: record.attachment_id,
        stage: ExtractionStage::from_str(&record.stage).unwrap_or(ExtractionStage::Metrics),
        status: ExtractionStatus::from_str(&record.status).unwrap_or(ExtractionStatus::Failed),
        raw_response: record.raw_response,
        error_message: record.error_message,
        retry_count: record.retry_count,
        extracted_at: parse_datetime(&record.extracted_at),
    }
}
