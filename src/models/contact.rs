//! Contacts associated with companies, used for alert addressing.

use serde::{Deserialize, Serialize};

/// A person at a company (founder/CEO), targeted by escalation alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Database row ID.
    pub id: i64,
    /// Owning company.
    pub company_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Email address (required).
    pub email: String,
    pub job_title: Option<String>,
    /// Primary contact for the company.
    pub is_primary: bool,
    /// Set when mail to this address has bounced.
    pub email_bounced: bool,
}

impl Contact {
    /// Display name, falling back to the email address.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}
