//! Diesel ORM models for database tables.
//!
//! These records provide compile-time type checking for database
//! operations; conversion to domain types happens in the repositories.

use diesel::prelude::*;

use crate::schema;

/// Company record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::companies)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CompanyRecord {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub legal_name: Option<String>,
    pub website: Option<String>,
    pub fund: Option<String>,
    pub description: Option<String>,
    pub is_portfolio: bool,
    pub last_update_date: Option<String>,
    pub created_at: String,
}

/// New company for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::companies)]
pub struct NewCompany<'a> {
    pub name: &'a str,
    pub normalized_name: &'a str,
    pub legal_name: Option<&'a str>,
    pub website: Option<&'a str>,
    pub fund: Option<&'a str>,
    pub description: Option<&'a str>,
    pub is_portfolio: bool,
    pub last_update_date: Option<&'a str>,
    pub created_at: &'a str,
}

/// Contact record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::contacts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContactRecord {
    pub id: i64,
    pub company_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub job_title: Option<String>,
    pub is_primary: bool,
    pub email_bounced: bool,
}

/// New contact for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::contacts)]
pub struct NewContact<'a> {
    pub company_id: i64,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: &'a str,
    pub job_title: Option<&'a str>,
    pub is_primary: bool,
    pub email_bounced: bool,
}

/// Email update record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::email_updates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EmailUpdateRecord {
    pub id: i64,
    pub company_id: Option<i64>,
    pub fingerprint: String,
    pub sender: String,
    pub original_sender: Option<String>,
    pub subject: String,
    pub body: String,
    pub received_at: String,
    pub has_attachments: bool,
    pub update_type: Option<String>,
    pub key_topics: String,
    pub processed_at: String,
}

/// New email update for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::email_updates)]
pub struct NewEmailUpdate<'a> {
    pub company_id: Option<i64>,
    pub fingerprint: &'a str,
    pub sender: &'a str,
    pub original_sender: Option<&'a str>,
    pub subject: &'a str,
    pub body: &'a str,
    pub received_at: &'a str,
    pub has_attachments: bool,
    pub update_type: Option<&'a str>,
    pub key_topics: &'a str,
    pub processed_at: &'a str,
}

/// Attachment record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::attachments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttachmentRecord {
    pub id: i64,
    pub email_update_id: i64,
    pub company_id: i64,
    pub filename: String,
    pub stored_path: String,
    pub file_size: i64,
    pub category: String,
}

/// New attachment for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::attachments)]
pub struct NewAttachment<'a> {
    pub email_update_id: i64,
    pub company_id: i64,
    pub filename: &'a str,
    pub stored_path: &'a str,
    pub file_size: i64,
    pub category: &'a str,
}

/// Financial metrics record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::financial_metrics)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FinancialMetricsRecord {
    pub id: i64,
    pub company_id: i64,
    pub email_update_id: i64,
    pub reporting_period: Option<String>,
    pub reporting_date: Option<String>,
    pub extracted_at: String,
    pub mrr: Option<String>,
    pub arr: Option<String>,
    pub qrr: Option<String>,
    pub total_revenue: Option<String>,
    pub gross_revenue: Option<String>,
    pub net_revenue: Option<String>,
    pub mrr_growth: Option<String>,
    pub arr_growth: Option<String>,
    pub revenue_growth_yoy: Option<String>,
    pub revenue_growth_mom: Option<String>,
    pub cash_balance: Option<String>,
    pub net_burn: Option<String>,
    pub gross_burn: Option<String>,
    pub runway_months: Option<String>,
    pub gross_margin: Option<String>,
    pub ebitda: Option<String>,
    pub ebitda_margin: Option<String>,
    pub net_income: Option<String>,
    pub customer_count: Option<String>,
    pub new_customers: Option<String>,
    pub churn_rate: Option<String>,
    pub ltv: Option<String>,
    pub cac: Option<String>,
    pub team_size: Option<String>,
    pub bookings: Option<String>,
    pub pipeline: Option<String>,
    pub key_highlights: Option<String>,
    pub key_challenges: Option<String>,
    pub funding_status: Option<String>,
    pub source_type: String,
    pub source_file: Option<String>,
    pub extraction_confidence: String,
    pub extraction_notes: Option<String>,
}

/// New financial metrics row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::financial_metrics)]
pub struct NewFinancialMetrics<'a> {
    pub company_id: i64,
    pub email_update_id: i64,
    pub reporting_period: Option<&'a str>,
    pub reporting_date: Option<&'a str>,
    pub extracted_at: &'a str,
    pub mrr: Option<&'a str>,
    pub arr: Option<&'a str>,
    pub qrr: Option<&'a str>,
    pub total_revenue: Option<&'a str>,
    pub gross_revenue: Option<&'a str>,
    pub net_revenue: Option<&'a str>,
    pub mrr_growth: Option<&'a str>,
    pub arr_growth: Option<&'a str>,
    pub revenue_growth_yoy: Option<&'a str>,
    pub revenue_growth_mom: Option<&'a str>,
    pub cash_balance: Option<&'a str>,
    pub net_burn: Option<&'a str>,
    pub gross_burn: Option<&'a str>,
    pub runway_months: Option<&'a str>,
    pub gross_margin: Option<&'a str>,
    pub ebitda: Option<&'a str>,
    pub ebitda_margin: Option<&'a str>,
    pub net_income: Option<&'a str>,
    pub customer_count: Option<&'a str>,
    pub new_customers: Option<&'a str>,
    pub churn_rate: Option<&'a str>,
    pub ltv: Option<&'a str>,
    pub cac: Option<&'a str>,
    pub team_size: Option<&'a str>,
    pub bookings: Option<&'a str>,
    pub pipeline: Option<&'a str>,
    pub key_highlights: Option<&'a str>,
    pub key_challenges: Option<&'a str>,
    pub funding_status: Option<&'a str>,
    pub source_type: &'a str,
    pub source_file: Option<&'a str>,
    pub extraction_confidence: &'a str,
    pub extraction_notes: Option<&'a str>,
}

/// Extraction audit record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::metric_extractions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetricExtractionRecord {
    pub id: i64,
    pub email_update_id: i64,
    pub attachment_id: Option<i64>,
    pub stage: String,
    pub status: String,
    pub raw_response: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub extracted_at: String,
}

/// New extraction audit row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::metric_extractions)]
pub struct NewMetricExtraction<'a> {
    pub email_update_id: i64,
    pub attachment_id: Option<i64>,
    pub stage: &'a str,
    pub status: &'a str,
    pub raw_response: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub retry_count: i32,
    pub extracted_at: &'a str,
}
