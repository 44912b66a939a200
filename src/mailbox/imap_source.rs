//! IMAP mailbox source.
//!
//! Uses the blocking imap client over TLS inside spawn_blocking, with an
//! outer timeout so a hung server cannot stall a collection run
//! indefinitely. Messages are fetched with BODY.PEEK so flags are never
//! mutated.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::{MailSource, MailboxError, RawMessage};
use crate::config::MailboxConfig;

/// IMAP-backed mail source.
pub struct ImapMailbox {
    config: MailboxConfig,
}

impl ImapMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapMailbox {
    async fn fetch_recent(&self, days: u32) -> Result<Vec<RawMessage>, MailboxError> {
        let username = self.config.resolve_username().ok_or_else(|| {
            MailboxError::MissingCredentials("IMAP_USERNAME not set".to_string())
        })?;
        let password = self.config.resolve_password().ok_or_else(|| {
            MailboxError::MissingCredentials("IMAP_PASSWORD not set".to_string())
        })?;
        if self.config.forwarders.is_empty() {
            return Err(MailboxError::MissingCredentials(
                "no forwarder addresses configured".to_string(),
            ));
        }

        let config = self.config.clone();
        let timeout_secs = config.timeout_secs;
        let handle = tokio::task::spawn_blocking(move || {
            fetch_blocking(&config, &username, &password, days)
        });

        match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), handle).await {
            Err(_) => Err(MailboxError::Timeout(timeout_secs)),
            Ok(Err(join_err)) => Err(MailboxError::Fetch(join_err.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

/// Blocking IMAP fetch: one TLS session, one FROM+SINCE search per
/// forwarder, full message bodies fetched by UID.
fn fetch_blocking(
    config: &MailboxConfig,
    username: &str,
    password: &str,
    days: u32,
) -> Result<Vec<RawMessage>, MailboxError> {
    let tls = native_tls::TlsConnector::builder()
        .build()
        .map_err(|e| MailboxError::Connection(format!("build TLS connector: {}", e)))?;

    let client = imap::connect(
        (config.host.as_str(), config.port),
        config.host.as_str(),
        &tls,
    )
    .map_err(|e| MailboxError::Connection(e.to_string()))?;

    let mut session = client
        .login(username, password)
        .map_err(|(e, _client)| MailboxError::Auth(e.to_string()))?;

    session
        .select(&config.folder)
        .map_err(|e| MailboxError::Fetch(format!("select {}: {}", config.folder, e)))?;

    let since = (Utc::now() - Duration::days(days as i64))
        .format("%d-%b-%Y")
        .to_string();

    let mut messages = Vec::new();
    for forwarder in &config.forwarders {
        let query = format!("FROM \"{}\" SINCE {}", forwarder, since);
        let uids = match session.uid_search(&query) {
            Ok(uids) => uids,
            Err(e) => {
                warn!("search failed for {}: {}", forwarder, e);
                continue;
            }
        };

        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        if !uids.is_empty() {
            info!("found {} messages from {}", uids.len(), forwarder);
        }

        for uid in uids {
            let fetches = match session.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])") {
                Ok(fetches) => fetches,
                Err(e) => {
                    warn!("fetch failed for uid {}: {}", uid, e);
                    continue;
                }
            };

            for fetch in fetches.iter() {
                if let Some(body) = fetch.body() {
                    messages.push(RawMessage {
                        raw: body.to_vec(),
                        forwarder: forwarder.clone(),
                    });
                }
            }
        }
    }

    let _ = session.logout();

    info!("fetched {} candidate messages", messages.len());
    Ok(messages)
}
