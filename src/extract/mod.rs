//! Content extraction: raw messages and attachments to plain text.
//!
//! `message` turns an RFC822 message into an [`EmailContent`] with decoded
//! attachments; `formats` turns attachment bytes (PDF, spreadsheets,
//! presentations, CSV) into text blocks suitable for LLM prompting.
//!
//! [`EmailContent`]: crate::models::EmailContent

mod formats;
mod message;

pub use formats::{extract_attachment_text, is_extractable};
pub use message::{categorize_part, parse_message};

use thiserror::Error;

/// Errors that can occur during content extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to parse message")]
    ParseFailed,

    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Unsupported formats are skipped quietly; everything else is a
    /// per-attachment failure worth surfacing.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
