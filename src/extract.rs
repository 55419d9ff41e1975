//! Text extraction for uploaded files (PDF, DOCX, plain text, Markdown).
//!
//! The format is chosen from the file extension; callers pass raw bytes
//! and get back plain UTF-8 text.

use std::io::Read;

use pulldown_cmark::{Event, Options, Parser, TagEnd};
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: .{0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("file is not valid UTF-8 text: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// Lowercased extension of `filename` without the dot, or `""`.
pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Extract plain text from `bytes`, dispatching on `extension` (no dot).
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    match extension.to_lowercase().as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "txt" => Ok(String::from_utf8(bytes.to_vec())?),
        "md" => extract_markdown(bytes),
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map(|text| text.trim().to_string())
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    paragraphs_from_document_xml(&doc_xml)
}

/// Collect `w:t` runs, one output line per `w:p` paragraph. Inside a run,
/// `w:tab` becomes a tab and `w:br` / `w:cr` a newline.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event as XmlEvent;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_run = false;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            Ok(XmlEvent::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(XmlEvent::End(e)) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            // Tab stops in paragraph properties are also `w:tab`; only
            // run-level ones are content.
            Ok(XmlEvent::Empty(e)) => match e.local_name().as_ref() {
                b"p" => out.push('\n'),
                b"tab" if in_run => out.push('\t'),
                b"br" | b"cr" if in_run => out.push('\n'),
                _ => {}
            },
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim().to_string())
}

/// Render Markdown to plain text: markup is dropped, block ends become
/// newlines, and table cells are tab-separated.
fn extract_markdown(bytes: &[u8]) -> Result<String, ExtractError> {
    let source = String::from_utf8(bytes.to_vec())?;
    let mut out = String::new();
    for event in Parser::new_ext(&source, Options::ENABLE_TABLES) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push('\t'),
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                if out.ends_with('\t') {
                    out.pop();
                }
                out.push('\n');
            }
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => out.push('\n'),
            Event::Rule => out.push('\n'),
            _ => {}
        }
    }
    Ok(out)
}
