//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against SQLite. Repositories take an [`AsyncSqlitePool`] handle; there
//! is no global connection state, so tests run against throwaway
//! databases.

pub mod company;
pub mod contact;
pub mod context;
pub mod email;
pub mod metrics;
pub mod pool;
pub mod records;
pub mod util;

pub use company::CompanyRepository;
pub use contact::ContactRepository;
pub use context::{DbContext, DbStats};
pub use email::{
    AuditEntry, CompanyLink, EmailUpdateRepository, MessagePersistRequest,
    NewMetricsEntry, PersistOutcome, StoredAttachment,
};
pub use metrics::MetricsRepository;
pub use pool::{AsyncSqlitePool, DieselError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_roundtrip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_datetime_invalid_defaults_to_epoch() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_datetime_opt() {
        assert_eq!(parse_datetime_opt(None), None);
        assert_eq!(parse_datetime_opt(Some("garbage".to_string())), None);
        assert!(parse_datetime_opt(Some(Utc::now().to_rfc3339())).is_some());
    }
}
