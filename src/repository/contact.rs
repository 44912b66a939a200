//! Contact repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{last_insert_rowid, AsyncSqlitePool, DieselError};
use super::records::{ContactRecord, NewContact};
use crate::models::Contact;
use crate::schema::contacts;

/// Repository for company contacts.
#[derive(Clone)]
pub struct ContactRepository {
    pool: AsyncSqlitePool,
}

impl ContactRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Count all contacts.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = contacts::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }

    /// Contacts for a company, primary contacts first.
    pub async fn for_company(&self, company_id: i64) -> Result<Vec<Contact>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<ContactRecord> = contacts::table
            .filter(contacts::company_id.eq(company_id))
            .order(contacts::is_primary.desc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(record_to_contact).collect())
    }

    /// Insert a contact unless the same address already exists for the
    /// company. Returns the row ID, or None when skipped.
    pub async fn insert_unique(&self, contact: &Contact) -> Result<Option<i64>, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let existing: i64 = contacts::table
            .filter(contacts::company_id.eq(contact.company_id))
            .filter(contacts::email.eq(&contact.email))
            .select(count_star())
            .first(&mut conn)
            .await?;
        if existing > 0 {
            return Ok(None);
        }

        let record = NewContact {
            company_id: contact.company_id,
            first_name: contact.first_name.as_deref(),
            last_name: contact.last_name.as_deref(),
            email: &contact.email,
            job_title: contact.job_title.as_deref(),
            is_primary: contact.is_primary,
            email_bounced: contact.email_bounced,
        };
        diesel::insert_into(contacts::table)
            .values(&record)
            .execute(&mut conn)
            .await?;
        Ok(Some(last_insert_rowid(&mut conn).await?))
    }
}

fn record_to_contact(record: ContactRecord) -> Contact {
    Contact {
        id: record.id,
        company_id: record.company_id,
        first_name: record.first_name,
        last_name: record.last_name,
        email: record.email,
        job_title: record.job_title,
        is_primary: record.is_primary,
        email_bounced: record.email_bounced,
    }
}
