//! Storage helpers for attachment files on disk.
//!
//! Attachments are organized per company, with a timestamp prefix so two
//! files with the same name never collide:
//! `{attachments_dir}/{company_id}/{YYYYmmdd_HHMMSS}_{filename}`.
//! The database stores only paths, never blobs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Sanitize a filename for safe storage.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Trim and limit length
    let trimmed = sanitized.trim().trim_matches('_');
    if trimmed.len() > 100 {
        trimmed[..100].to_string()
    } else if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Construct the storage path for an attachment.
pub fn attachment_storage_path(
    attachments_dir: &Path,
    company_id: i64,
    received_at: DateTime<Utc>,
    filename: &str,
) -> PathBuf {
    let stamped = format!(
        "{}_{}",
        received_at.format("%Y%m%d_%H%M%S"),
        sanitize_filename(filename)
    );
    attachments_dir.join(company_id.to_string()).join(stamped)
}

/// Write attachment content to its final storage path.
///
/// Returns the path the file was written to.
pub fn save_attachment(
    attachments_dir: &Path,
    company_id: i64,
    received_at: DateTime<Utc>,
    filename: &str,
    content: &[u8],
) -> std::io::Result<PathBuf> {
    let path = attachment_storage_path(attachments_dir, company_id, received_at, filename);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("a/b\\c:d.pdf"), "a_b_c_d.pdf");
        assert_eq!(sanitize_filename(""), "attachment");
        assert_eq!(sanitize_filename("///"), "attachment");
    }

    #[test]
    fn test_attachment_storage_path() {
        let date = Utc.with_ymd_and_hms(2025, 5, 3, 14, 30, 5).unwrap();
        let path = attachment_storage_path(Path::new("/data/attachments"), 7, date, "May Deck.pdf");
        assert_eq!(
            path,
            PathBuf::from("/data/attachments/7/20250503_143005_May Deck.pdf")
        );
    }

    #[test]
    fn test_save_attachment_writes_content() {
        let dir = tempfile::tempdir().unwrap();
        let date = Utc.with_ymd_and_hms(2025, 5, 3, 14, 30, 5).unwrap();

        let path = save_attachment(dir.path(), 3, date, "deck.pdf", b"pdf bytes").unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"pdf bytes");

        // Same name, different timestamp: no collision
        let later = Utc.with_ymd_and_hms(2025, 5, 3, 15, 0, 0).unwrap();
        let other = save_attachment(dir.path(), 3, later, "deck.pdf", b"other").unwrap();
        assert_ne!(path, other);
    }
}
