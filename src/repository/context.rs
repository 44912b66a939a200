//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and provides access to all
//! repositories; callers pass it explicitly instead of relying on any
//! global session state.

use std::path::Path;

use chrono::{Duration, Utc};
use diesel_async::SimpleAsyncConnection;

use super::company::CompanyRepository;
use super::contact::ContactRepository;
use super::email::EmailUpdateRepository;
use super::metrics::MetricsRepository;
use super::pool::{AsyncSqlitePool, DieselError};
use crate::models::ExtractionStatus;

/// Aggregate database counts for the stats command.
#[derive(Debug, Clone, Default)]
pub struct DbStats {
    pub portfolio_companies: u64,
    pub observed_companies: u64,
    pub contacts: u64,
    pub email_updates: u64,
    pub emails_with_attachments: u64,
    pub metrics_rows: u64,
    pub failed_extractions: u64,
    pub recent_emails_7d: u64,
}

impl DbStats {
    pub fn total_companies(&self) -> u64 {
        self.portfolio_companies + self.observed_companies
    }

    /// Share of updates that carried attachments, as a percentage.
    pub fn attachment_rate(&self) -> f64 {
        if self.email_updates == 0 {
            0.0
        } else {
            self.emails_with_attachments as f64 / self.email_updates as f64 * 100.0
        }
    }
}

/// Database context holding the connection factory.
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL (`sqlite:...` or a bare path).
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(url),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Get a company repository.
    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository::new(self.pool.clone())
    }

    /// Get a contact repository.
    pub fn contacts(&self) -> ContactRepository {
        ContactRepository::new(self.pool.clone())
    }

    /// Get an email update repository.
    pub fn emails(&self) -> EmailUpdateRepository {
        EmailUpdateRepository::new(self.pool.clone())
    }

    /// Get a metrics repository.
    pub fn metrics(&self) -> MetricsRepository {
        MetricsRepository::new(self.pool.clone())
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(include_str!("schema_sqlite.sql")).await
    }

    /// Read aggregate counts across all tables.
    pub async fn stats(&self) -> Result<DbStats, DieselError> {
        let companies = self.companies();
        let emails = self.emails();
        let metrics = self.metrics();
        let week_ago = Utc::now() - Duration::days(7);

        Ok(DbStats {
            portfolio_companies: companies.count_by_portfolio(true).await?,
            observed_companies: companies.count_by_portfolio(false).await?,
            contacts: self.contacts().count().await?,
            email_updates: emails.count().await?,
            emails_with_attachments: emails.count_with_attachments().await?,
            metrics_rows: metrics.count().await?,
            failed_extractions: metrics
                .count_extractions_by_status(ExtractionStatus::Failed)
                .await?,
            recent_emails_7d: emails.count_since(week_ago).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_schema_and_empty_stats() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        // Schema creation is idempotent
        ctx.init_schema().await.unwrap();

        let stats = ctx.stats().await.unwrap();
        assert_eq!(stats.total_companies(), 0);
        assert_eq!(stats.email_updates, 0);
        assert_eq!(stats.attachment_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_company_insert_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();

        let repo = ctx.companies();
        let company = crate::models::Company::new("Validic".to_string(), true);
        let id = repo.insert(&company).await.unwrap();
        assert!(id > 0);

        let found = repo.find_by_normalized("VALIDIC  Inc.").await.unwrap();
        assert_eq!(found.unwrap().name, "Validic");
        assert_eq!(repo.count_by_portfolio(true).await.unwrap(), 1);
    }
}
