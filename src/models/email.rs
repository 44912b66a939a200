//! Inbound message content and persisted email update records.
//!
//! Messages are identified by a fingerprint so that re-processing the same
//! message across overlapping collection windows never creates a duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category of an attachment, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCategory {
    Documents,
    Spreadsheets,
    Presentations,
    Images,
    Data,
    Archives,
    Other,
}

impl AttachmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Spreadsheets => "spreadsheets",
            Self::Presentations => "presentations",
            Self::Images => "images",
            Self::Data => "data",
            Self::Archives => "archives",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "documents" => Some(Self::Documents),
            "spreadsheets" => Some(Self::Spreadsheets),
            "presentations" => Some(Self::Presentations),
            "images" => Some(Self::Images),
            "data" => Some(Self::Data),
            "archives" => Some(Self::Archives),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// An attachment pulled out of a message, with its decoded bytes.
#[derive(Debug, Clone)]
pub struct AttachmentData {
    /// Original filename (synthesized if the part carried none).
    pub filename: String,
    /// MIME type as reported (or sniffed).
    pub mime_type: String,
    /// Detected category.
    pub category: AttachmentCategory,
    /// Decoded content bytes.
    pub data: Vec<u8>,
}

impl AttachmentData {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Parsed content of one inbound message, ready for classification.
#[derive(Debug, Clone)]
pub struct EmailContent {
    /// RFC Message-ID header, when present.
    pub message_id: Option<String>,
    /// Forwarder address the message arrived from.
    pub sender: String,
    pub subject: String,
    /// Date the message was sent.
    pub date: DateTime<Utc>,
    /// Plain-text body.
    pub body: String,
    pub attachments: Vec<AttachmentData>,
}

impl EmailContent {
    /// Stable fingerprint for duplicate detection.
    ///
    /// Uses the Message-ID when the server supplied one; otherwise hashes
    /// sender, subject, date and a body prefix.
    pub fn fingerprint(&self) -> String {
        if let Some(id) = &self.message_id {
            let trimmed = id.trim().trim_matches('<').trim_matches('>');
            if !trimmed.is_empty() {
                return trimmed.to_ascii_lowercase();
            }
        }

        let body_prefix: String = self.body.chars().take(512).collect();
        let mut hasher = Sha256::new();
        hasher.update(self.sender.as_bytes());
        hasher.update(b"|");
        hasher.update(self.subject.as_bytes());
        hasher.update(b"|");
        hasher.update(self.date.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(body_prefix.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// A persisted email update record.
///
/// One row per physically distinct inbound message. `company_id` stays
/// `None` for messages that were fetched but not confidently classified;
/// the row still exists so the message is never re-analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailUpdate {
    /// Database row ID.
    pub id: i64,
    /// Classified company, if any.
    pub company_id: Option<i64>,
    /// Unique message fingerprint.
    pub fingerprint: String,
    /// Forwarder the message arrived from.
    pub sender: String,
    /// Actual company sender inside the forward, when identifiable.
    pub original_sender: Option<String>,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub has_attachments: bool,
    /// monthly/quarterly/special/funding/other.
    pub update_type: Option<String>,
    /// Main topics extracted by the classifier.
    pub key_topics: Vec<String>,
    /// When the collector processed this message.
    pub processed_at: DateTime<Utc>,
}

/// A persisted attachment record. The file itself lives on disk under
/// `attachments/{company_id}/`; the database stores only the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Database row ID.
    pub id: i64,
    /// Owning email update.
    pub email_update_id: i64,
    /// Owning company (denormalized for path organization).
    pub company_id: i64,
    /// Original filename from the message.
    pub filename: String,
    /// Path of the stored file.
    pub stored_path: String,
    /// Size in bytes.
    pub file_size: u64,
    pub category: AttachmentCategory,
}
