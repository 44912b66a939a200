//! Data models for foliomail.

mod company;
mod contact;
mod email;
mod metrics;
mod verdict;

pub use company::{match_company, normalize_name, Company};
pub use contact::Contact;
pub use email::{
    Attachment, AttachmentCategory, AttachmentData, EmailContent, EmailUpdate,
};
pub use metrics::{
    ExtractionStage, ExtractionStatus, FinancialMetrics, MetricExtraction, MetricSet,
    MetricSource,
};
pub use verdict::{Confidence, UpdateVerdict};
