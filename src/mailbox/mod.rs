//! Mailbox access: listing and fetching candidate messages.
//!
//! The collector consumes the [`MailSource`] capability; [`ImapMailbox`]
//! is the production implementation. Credential setup (app passwords,
//! OAuth) is an external concern - this module only reads what the
//! environment provides.

mod imap_source;

pub use imap_source::ImapMailbox;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from mailbox operations. All of these are run-fatal: a
/// connectivity or credential problem will not resolve mid-run.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("mailbox fetch timed out after {0}s")]
    Timeout(u64),
}

/// One raw message as fetched from the mailbox.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Complete RFC822 bytes.
    pub raw: Vec<u8>,
    /// Forwarder address whose search surfaced this message.
    pub forwarder: String,
}

/// Capability to list and fetch recent messages from the monitored inbox.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetch messages from the configured forwarders within the lookback
    /// window, in mailbox order.
    async fn fetch_recent(&self, days: u32) -> Result<Vec<RawMessage>, MailboxError>;
}
