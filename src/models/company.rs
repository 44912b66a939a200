//! Company identity records and name matching.
//!
//! Companies are keyed by a normalized form of their name so that variants
//! like "VALIDIC", "Validic" and "Validic Inc." resolve to one record.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A portfolio or observed company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Database row ID.
    pub id: i64,
    /// Canonical display name.
    pub name: String,
    /// Registered legal name, if known.
    pub legal_name: Option<String>,
    /// Company website.
    pub website: Option<String>,
    /// Fund the investment was made from.
    pub fund: Option<String>,
    /// Short description.
    pub description: Option<String>,
    /// Whether this is an invested portfolio company (false = merely observed).
    pub is_portfolio: bool,
    /// When we last received a classified update for this company.
    pub last_update_date: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Create a new observed company, not yet persisted (id 0).
    pub fn new(name: String, is_portfolio: bool) -> Self {
        Self {
            id: 0,
            name,
            legal_name: None,
            website: None,
            fund: None,
            description: None,
            is_portfolio,
            last_update_date: None,
            created_at: Utc::now(),
        }
    }

    /// Normalized form of this company's name.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

fn suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(inc|llc|corp|corporation|ltd|co)\b\.?").unwrap())
}

/// Normalize a company name for matching.
///
/// Lowercases, strips corporate suffixes (Inc, LLC, Corp, ...), removes
/// punctuation and collapses whitespace. "Equity Shift Inc." and
/// "equity shift" normalize to the same string.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let without_suffix = suffix_regex().replace_all(&lowered, " ");
    let cleaned: String = without_suffix
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a classifier-reported name against the known company set.
///
/// Tries normalized equality first, then normalized substring containment
/// in either direction (so "Trayecto Letter" still resolves to "Trayecto").
pub fn match_company<'a>(name: &str, companies: &'a [Company]) -> Option<&'a Company> {
    let target = normalize_name(name);
    if target.is_empty() {
        return None;
    }

    companies
        .iter()
        .find(|c| c.normalized_name() == target)
        .or_else(|| {
            companies.iter().find(|c| {
                let known = c.normalized_name();
                !known.is_empty() && (target.contains(&known) || known.contains(&target))
            })
        })
}
