//! Per-format text extraction from attachment bytes.
//!
//! Converts PDF, spreadsheet, presentation and CSV attachments into plain
//! text blocks for metric extraction. Unrecognized formats are reported as
//! unsupported and skipped upstream; the email body alone still gets
//! processed.

use std::io::{BufReader, Cursor, Read};

use super::ExtractError;
use crate::models::AttachmentData;

/// Maximum rows serialized per spreadsheet sheet.
const MAX_SHEET_ROWS: usize = 50;

/// Supported attachment formats, detected by file extension with the MIME
/// type as fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Spreadsheet,
    Presentation,
    PlainText,
    Unsupported,
}

fn detect_format(filename: &str, mime: &str) -> Format {
    let lower = filename.to_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or("");
    match ext {
        "pdf" => return Format::Pdf,
        "xlsx" | "xls" | "xlsm" | "ods" => return Format::Spreadsheet,
        "pptx" => return Format::Presentation,
        "csv" | "txt" | "tsv" => return Format::PlainText,
        _ => {}
    }

    let mime = mime.to_lowercase();
    if mime == "application/pdf" {
        Format::Pdf
    } else if mime.contains("spreadsheet") || mime.contains("excel") {
        Format::Spreadsheet
    } else if mime.contains("presentation") || mime.contains("powerpoint") {
        Format::Presentation
    } else if mime == "text/csv" || mime == "text/plain" {
        Format::PlainText
    } else {
        Format::Unsupported
    }
}

/// Whether text can be extracted from this attachment.
pub fn is_extractable(att: &AttachmentData) -> bool {
    detect_format(&att.filename, &att.mime_type) != Format::Unsupported
}

/// Extract a plain-text block from an attachment.
pub fn extract_attachment_text(att: &AttachmentData) -> Result<String, ExtractError> {
    match detect_format(&att.filename, &att.mime_type) {
        Format::Pdf => extract_pdf(&att.data),
        Format::Spreadsheet => extract_spreadsheet(&att.data),
        Format::Presentation => extract_pptx(&att.data),
        Format::PlainText => Ok(String::from_utf8_lossy(&att.data).into_owned()),
        Format::Unsupported => {
            Err(ExtractError::Unsupported(att.filename.clone()))
        }
    }
}

/// Extract concatenated page text from a PDF.
fn extract_pdf(data: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract can panic on malformed PDFs, so isolate it
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::ExtractionFailed(format!("PDF: {}", e))),
        Err(_) => Err(ExtractError::ExtractionFailed(
            "PDF extraction panicked (malformed file)".to_string(),
        )),
    }
}

/// Serialize every sheet of a workbook as a text block, sheet name as a
/// heading and rows joined with pipes.
fn extract_spreadsheet(data: &[u8]) -> Result<String, ExtractError> {
    use calamine::{open_workbook_auto_from_rs, Data, Reader};

    let cursor = Cursor::new(data.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| ExtractError::ExtractionFailed(format!("spreadsheet: {}", e)))?;

    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Int(n) => n.to_string(),
            Data::Float(f) => format!("{}", f),
            Data::Bool(b) => b.to_string(),
            Data::Error(e) => format!("#ERR({:?})", e),
            Data::DateTime(dt) => format!("{}", dt),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
        }
    }

    let mut output = String::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        if let Ok(range) = workbook.worksheet_range(&sheet_name) {
            if !output.is_empty() {
                output.push_str("\n\n");
            }
            output.push_str(&format!("Sheet: {}\n", sheet_name));
            for row in range.rows().take(MAX_SHEET_ROWS) {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                output.push_str(&cells.join(" | "));
                output.push('\n');
            }
        }
    }

    Ok(output)
}

/// Gather slide text runs from a PPTX archive, slide number as heading.
fn extract_pptx(data: &[u8]) -> Result<String, ExtractError> {
    let cursor = Cursor::new(data.to_vec());
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| ExtractError::ExtractionFailed(format!("pptx zip: {}", e)))?;

    // Collect slide file names and sort them
    let mut slide_names: Vec<String> = (0..archive.len())
        .filter_map(|i| {
            let name = archive.by_index(i).ok()?.name().to_string();
            if name.starts_with("ppt/slides/slide") && name.ends_with(".xml") {
                Some(name)
            } else {
                None
            }
        })
        .collect();
    slide_names.sort();

    let mut text = String::new();
    for (idx, slide_name) in slide_names.iter().enumerate() {
        let slide = archive.by_name(slide_name).map_err(|e| {
            ExtractError::ExtractionFailed(format!("pptx slide {}: {}", slide_name, e))
        })?;

        if idx > 0 {
            text.push('\n');
        }
        text.push_str(&format!("Slide {}:\n", idx + 1));
        text.push_str(&slide_text_runs(slide));
        text.push('\n');
    }

    Ok(text)
}

/// Pull `<a:t>` text runs out of one slide's XML.
fn slide_text_runs(reader: impl Read) -> String {
    let mut xml = quick_xml::Reader::from_reader(BufReader::new(reader));
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text_tag = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_tag = true;
                }
            }
            Ok(quick_xml::events::Event::End(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_tag = false;
                }
            }
            Ok(quick_xml::events::Event::Text(ref e)) => {
                if in_text_tag {
                    if let Ok(s) = e.unescape() {
                        text.push_str(&s);
                        text.push(' ');
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttachmentCategory;
    use std::io::Write;

    fn attachment(filename: &str, mime: &str, data: &[u8]) -> AttachmentData {
        AttachmentData {
            filename: filename.to_string(),
            mime_type: mime.to_string(),
            category: AttachmentCategory::Other,
            data: data.to_vec(),
        }
    }

    /// Build a minimal PPTX-shaped zip with two slides.
    fn fake_pptx() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options: zip::write::SimpleFileOptions = Default::default();

            writer.start_file("ppt/slides/slide1.xml", options).unwrap();
            writer
                .write_all(
                    br#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:t>Revenue Update</a:t><a:t>ARR: $1.2M</a:t></p:sld>"#,
                )
                .unwrap();

            writer.start_file("ppt/slides/slide2.xml", options).unwrap();
            writer
                .write_all(br#"<p:sld xmlns:a="x"><a:t>Runway: 14 months</a:t></p:sld>"#)
                .unwrap();

            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_detect_format_by_extension() {
        assert_eq!(detect_format("deck.PDF", ""), Format::Pdf);
        assert_eq!(detect_format("model.xlsx", ""), Format::Spreadsheet);
        assert_eq!(detect_format("deck.pptx", ""), Format::Presentation);
        assert_eq!(detect_format("metrics.csv", ""), Format::PlainText);
        assert_eq!(detect_format("photo.jpg", "image/jpeg"), Format::Unsupported);
    }

    #[test]
    fn test_detect_format_by_mime_fallback() {
        assert_eq!(detect_format("blob", "application/pdf"), Format::Pdf);
        assert_eq!(
            detect_format("blob", "application/vnd.ms-excel"),
            Format::Spreadsheet
        );
    }

    #[test]
    fn test_plaintext_passthrough() {
        let att = attachment("metrics.csv", "text/csv", b"arr,runway\n$1.2M,14 months\n");
        let text = extract_attachment_text(&att).unwrap();
        assert!(text.contains("$1.2M"));
    }

    #[test]
    fn test_unsupported_is_reported() {
        let att = attachment("photo.jpg", "image/jpeg", b"\xff\xd8\xff");
        let err = extract_attachment_text(&att).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_malformed_pdf_is_extraction_failure() {
        let att = attachment("broken.pdf", "application/pdf", b"not a pdf at all");
        let err = extract_attachment_text(&att).unwrap_err();
        assert!(!err.is_unsupported());
    }

    #[test]
    fn test_pptx_slide_text() {
        let att = attachment(
            "deck.pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            &fake_pptx(),
        );
        let text = extract_attachment_text(&att).unwrap();
        assert!(text.contains("Slide 1:"));
        assert!(text.contains("ARR: $1.2M"));
        assert!(text.contains("Slide 2:"));
        assert!(text.contains("Runway: 14 months"));
    }

    #[test]
    fn test_malformed_spreadsheet_is_extraction_failure() {
        let att = attachment(
            "model.xlsx",
            "application/vnd.ms-excel",
            b"definitely not a workbook",
        );
        assert!(extract_attachment_text(&att).is_err());
    }
}
