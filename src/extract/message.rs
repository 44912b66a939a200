//! RFC822 message parsing with layered attachment detection.
//!
//! Mail servers disagree about which signal marks a part as an attachment:
//! some set the disposition, some only a filename, some ship documents as
//! base64 octet-streams. Detection therefore checks several signals in
//! order rather than trusting any single one; under-detection silently
//! drops financial documents.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use regex::Regex;

use super::ExtractError;
use crate::models::{AttachmentCategory, AttachmentData, EmailContent};

/// Maximum characters of body text carried forward.
const BODY_CHAR_LIMIT: usize = 10_000;

/// Content types that mark a part as an attachment even without a
/// disposition or filename.
const ATTACHMENT_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/zip",
    "application/x-zip-compressed",
    "application/octet-stream",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/tiff",
    "text/csv",
];

/// Extract MIME type from a content type, defaulting to octet-stream.
fn mime_type_from_content_type(ct: Option<&mail_parser::ContentType>) -> String {
    ct.map(|ct| {
        if let Some(subtype) = ct.subtype() {
            format!("{}/{}", ct.ctype(), subtype)
        } else {
            ct.ctype().to_string()
        }
    })
    .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// File extension for a synthesized attachment filename.
fn ext_for_mime(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => ".pdf",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.ms-powerpoint" => ".ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "text/csv" => ".csv",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        _ => ".bin",
    }
}

/// Layered attachment detection over one MIME part.
///
/// Checks, in order: explicit attachment disposition; "attachment"
/// anywhere in the disposition value; a non-empty filename (which also
/// covers inline parts with document names); recognized attachment content
/// types; and finally content sniffing for generic `application/*` parts
/// whose bytes identify as a known document format.
pub fn is_attachment_part(
    disposition: Option<&str>,
    filename: Option<&str>,
    mime: &str,
    data: &[u8],
) -> bool {
    if let Some(disp) = disposition {
        if disp.eq_ignore_ascii_case("attachment")
            || disp.to_ascii_lowercase().contains("attachment")
        {
            return true;
        }
    }

    if filename.map(|f| !f.trim().is_empty()).unwrap_or(false) {
        return true;
    }

    if ATTACHMENT_CONTENT_TYPES.contains(&mime) {
        return true;
    }

    if mime.starts_with("application/") {
        if let Some(kind) = infer::get(data) {
            return is_document_mime(kind.mime_type());
        }
    }

    false
}

fn is_document_mime(mime: &str) -> bool {
    ATTACHMENT_CONTENT_TYPES.contains(&mime)
        || mime.contains("spreadsheet")
        || mime.contains("presentation")
        || mime.contains("word")
}

/// Categorize an attachment from its MIME type, with filename-extension
/// and content-sniffing fallbacks for ambiguous types.
pub fn categorize_part(mime: &str, filename: &str, data: &[u8]) -> AttachmentCategory {
    // Resolve generic types by sniffing the bytes
    let resolved = if mime.is_empty() || mime == "application/octet-stream" {
        infer::get(data)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| mime.to_string())
    } else {
        mime.to_string()
    };

    let m = resolved.to_lowercase();
    if m == "application/pdf"
        || m.contains("word")
        || m == "application/msword"
        || m.contains("rfc822")
        || m == "text/plain"
    {
        return AttachmentCategory::Documents;
    }
    if m.contains("spreadsheet") || m.contains("excel") {
        return AttachmentCategory::Spreadsheets;
    }
    if m.contains("presentation") || m.contains("powerpoint") {
        return AttachmentCategory::Presentations;
    }
    if m.starts_with("image/") {
        return AttachmentCategory::Images;
    }
    if m == "text/csv" || m == "application/json" || m == "application/xml" {
        return AttachmentCategory::Data;
    }
    if m.contains("zip") || m == "application/gzip" || m == "application/x-tar" {
        return AttachmentCategory::Archives;
    }

    // Extension fallback for generic content types
    let lower = filename.to_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or("");
    match ext {
        "pdf" | "doc" | "docx" | "txt" => AttachmentCategory::Documents,
        "xls" | "xlsx" | "xlsm" | "ods" => AttachmentCategory::Spreadsheets,
        "ppt" | "pptx" => AttachmentCategory::Presentations,
        "png" | "jpg" | "jpeg" | "gif" | "tiff" => AttachmentCategory::Images,
        "csv" | "json" | "xml" => AttachmentCategory::Data,
        "zip" | "gz" => AttachmentCategory::Archives,
        _ => AttachmentCategory::Other,
    }
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]+?>").unwrap())
}

/// Basic HTML to text conversion for messages without a plain-text part.
fn strip_html(html: &str) -> String {
    let with_breaks = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p>", "\n");
    tag_regex().replace_all(&with_breaks, "").to_string()
}

/// Truncate to a character limit on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

/// Parse a raw RFC822 message into collector-ready content.
pub fn parse_message(raw: &[u8]) -> Result<EmailContent, ExtractError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(ExtractError::ParseFailed)?;

    let subject = message.subject().unwrap_or("(no subject)").to_string();

    let sender = message
        .from()
        .and_then(|addrs| {
            addrs.first().map(|addr| {
                if let Some(name) = addr.name() {
                    format!("{} <{}>", name, addr.address().unwrap_or_default())
                } else {
                    addr.address().unwrap_or_default().to_string()
                }
            })
        })
        .unwrap_or_default();

    let message_id = message.message_id().map(|s| s.to_string());

    let date = message
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let body = message
        .body_text(0)
        .map(|s| s.to_string())
        .or_else(|| message.body_html(0).map(|h| strip_html(&h)))
        .unwrap_or_default();
    let body = truncate_chars(body.trim(), BODY_CHAR_LIMIT);

    let mut attachments = Vec::new();
    for part in message.attachments() {
        let mime = mime_type_from_content_type(part.content_type());
        let disposition = part.content_disposition().map(|d| d.ctype());
        let filename = part.attachment_name();
        let data = part.contents();

        if !is_attachment_part(disposition, filename, &mime, data) {
            continue;
        }

        let filename = filename
            .map(|f| f.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| {
                format!("attachment_{}{}", attachments.len() + 1, ext_for_mime(&mime))
            });
        let category = categorize_part(&mime, &filename, data);

        attachments.push(AttachmentData {
            filename,
            mime_type: mime,
            category,
            data: data.to_vec(),
        });
    }

    Ok(EmailContent {
        message_id,
        sender,
        subject,
        date,
        body,
        attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF_MAGIC: &[u8] = b"%PDF-1.4 fake";

    fn sample_message() -> Vec<u8> {
        let mut raw = String::new();
        raw.push_str("From: Scot Partner <partner@fund.example>\r\n");
        raw.push_str("To: updates@fund.example\r\n");
        raw.push_str("Subject: Fwd: Natryx May Update\r\n");
        raw.push_str("Message-ID: <msg-1@mail.example>\r\n");
        raw.push_str("Date: Sat, 3 May 2025 12:30:00 +0000\r\n");
        raw.push_str("MIME-Version: 1.0\r\n");
        raw.push_str("Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n");
        raw.push_str("\r\n");
        raw.push_str("--XYZ\r\n");
        raw.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        raw.push_str("\r\n");
        raw.push_str("ARR is now $1.2M with 14 months of runway.\r\n");
        raw.push_str("--XYZ\r\n");
        raw.push_str("Content-Type: application/pdf; name=\"may-deck.pdf\"\r\n");
        raw.push_str("Content-Disposition: attachment; filename=\"may-deck.pdf\"\r\n");
        raw.push_str("Content-Transfer-Encoding: base64\r\n");
        raw.push_str("\r\n");
        raw.push_str("JVBERi0xLjQgZmFrZQ==\r\n");
        raw.push_str("--XYZ--\r\n");
        raw.into_bytes()
    }

    #[test]
    fn test_parse_message_headers_and_body() {
        let content = parse_message(&sample_message()).unwrap();
        assert_eq!(content.subject, "Fwd: Natryx May Update");
        assert_eq!(content.sender, "Scot Partner <partner@fund.example>");
        assert_eq!(content.message_id.as_deref(), Some("msg-1@mail.example"));
        assert!(content.body.contains("ARR is now $1.2M"));
        assert_eq!(content.date.to_rfc3339(), "2025-05-03T12:30:00+00:00");
    }

    #[test]
    fn test_parse_message_detects_attachment() {
        let content = parse_message(&sample_message()).unwrap();
        assert_eq!(content.attachments.len(), 1);
        let att = &content.attachments[0];
        assert_eq!(att.filename, "may-deck.pdf");
        assert_eq!(att.mime_type, "application/pdf");
        assert_eq!(att.category, AttachmentCategory::Documents);
        assert_eq!(att.data, PDF_MAGIC);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_message(b"").is_err());
    }

    #[test]
    fn test_detection_explicit_disposition() {
        assert!(is_attachment_part(
            Some("attachment"),
            None,
            "text/plain",
            b""
        ));
    }

    #[test]
    fn test_detection_filename_only() {
        assert!(is_attachment_part(None, Some("report.pdf"), "text/plain", b""));
        assert!(!is_attachment_part(None, Some("   "), "text/plain", b""));
    }

    #[test]
    fn test_detection_recognized_content_type() {
        assert!(is_attachment_part(None, None, "application/pdf", b""));
        assert!(is_attachment_part(None, None, "text/csv", b""));
        assert!(!is_attachment_part(None, None, "text/plain", b""));
    }

    #[test]
    fn test_detection_sniffs_generic_application_parts() {
        // PDF magic bytes under a bogus application type
        assert!(is_attachment_part(
            None,
            None,
            "application/x-unknown",
            b"%PDF-1.4\n"
        ));
        assert!(!is_attachment_part(
            None,
            None,
            "application/x-unknown",
            b"hello world"
        ));
    }

    #[test]
    fn test_categorize_by_mime() {
        assert_eq!(
            categorize_part("application/pdf", "x", b""),
            AttachmentCategory::Documents
        );
        assert_eq!(
            categorize_part(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "x",
                b""
            ),
            AttachmentCategory::Spreadsheets
        );
        assert_eq!(
            categorize_part("image/png", "x", b""),
            AttachmentCategory::Images
        );
    }

    #[test]
    fn test_categorize_extension_fallback() {
        assert_eq!(
            categorize_part("application/x-mystery", "deck.pptx", b""),
            AttachmentCategory::Presentations
        );
        assert_eq!(
            categorize_part("application/x-mystery", "data.csv", b""),
            AttachmentCategory::Data
        );
        assert_eq!(
            categorize_part("application/x-mystery", "blob", b""),
            AttachmentCategory::Other
        );
    }

    #[test]
    fn test_categorize_sniffs_octet_stream() {
        assert_eq!(
            categorize_part("application/octet-stream", "unnamed", b"%PDF-1.4\n"),
            AttachmentCategory::Documents
        );
    }

    #[test]
    fn test_strip_html() {
        let text = strip_html("<p>Hello<br>world</p><div>more</div>");
        assert!(text.contains("Hello\nworld"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_truncate_chars_boundary() {
        let s = "aé中".repeat(10);
        let out = truncate_chars(&s, 5);
        assert_eq!(out.chars().count(), 5);
    }
}
