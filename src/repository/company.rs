//! Company repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{last_insert_rowid, AsyncSqlitePool, DieselError};
use super::records::{CompanyRecord, NewCompany};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{normalize_name, Company};
use crate::schema::companies;

/// Repository for company identity records.
#[derive(Clone)]
pub struct CompanyRepository {
    pool: AsyncSqlitePool,
}

impl CompanyRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Count all companies.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = companies::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Count companies by portfolio flag.
    pub async fn count_by_portfolio(&self, is_portfolio: bool) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = companies::table
            .filter(companies::is_portfolio.eq(is_portfolio))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Load all companies, ordered by name.
    pub async fn get_all(&self) -> Result<Vec<Company>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<CompanyRecord> = companies::table
            .order(companies::name.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(record_to_company).collect())
    }

    /// Look up a company by its normalized name.
    pub async fn find_by_normalized(&self, name: &str) -> Result<Option<Company>, DieselError> {
        let mut conn = self.pool.get().await?;
        let normalized = normalize_name(name);

        let record: Option<CompanyRecord> = companies::table
            .filter(companies::normalized_name.eq(&normalized))
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(record_to_company))
    }

    /// Get a company by ID.
    pub async fn get(&self, id: i64) -> Result<Option<Company>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<CompanyRecord> = companies::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(record_to_company))
    }

    /// Insert a company, returning its new ID.
    pub async fn insert(&self, company: &Company) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        let normalized = company.normalized_name();
        let created_at = company.created_at.to_rfc3339();
        let last_update = company.last_update_date.map(|d| d.to_rfc3339());
        let record = NewCompany {
            name: &company.name,
            normalized_name: &normalized,
            legal_name: company.legal_name.as_deref(),
            website: company.website.as_deref(),
            fund: company.fund.as_deref(),
            description: company.description.as_deref(),
            is_portfolio: company.is_portfolio,
            last_update_date: last_update.as_deref(),
            created_at: &created_at,
        };

        diesel::insert_into(companies::table)
            .values(&record)
            .execute(&mut conn)
            .await?;
        last_insert_rowid(&mut conn).await
    }

    /// Find a company by normalized name, creating an observed
    /// (non-portfolio) record on first sighting. Returns the company and
    /// whether it was created.
    pub async fn find_or_create_observed(
        &self,
        name: &str,
    ) -> Result<(Company, bool), DieselError> {
        if let Some(existing) = self.find_by_normalized(name).await? {
            return Ok((existing, false));
        }
        let mut company = Company::new(name.to_string(), false);
        company.id = self.insert(&company).await?;
        Ok((company, true))
    }

    /// Portfolio companies whose last update is older than the cutoff
    /// (or who have never sent one), for escalation review.
    pub async fn stale_portfolio_companies(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Company>, DieselError> {
        let mut conn = self.pool.get().await?;
        let cutoff_str = cutoff.to_rfc3339();

        let records: Vec<CompanyRecord> = companies::table
            .filter(companies::is_portfolio.eq(true))
            .filter(
                companies::last_update_date
                    .is_null()
                    .or(companies::last_update_date.lt(cutoff_str)),
            )
            .order(companies::last_update_date.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(record_to_company).collect())
    }
}

/// Convert a database record to the domain model.
pub(crate) fn record_to_company(record: CompanyRecord) -> Company {
    Company {
        id: record.id,
        name: record.name,
        legal_name: record.legal_name,
        website: record.website,
        fund: record.fund,
        description: record.description,
        is_portfolio: record.is_portfolio,
        last_update_date: parse_datetime_opt(record.last_update_date),
        created_at: parse_datetime(&record.created_at),
    }
}
