//! Document loading: turns uploaded bytes into logical text units.

use std::path::Path;

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Picks the kind from the file extension, ignoring case.
    pub fn from_filename(filename: &str) -> Result<Self, ApiError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Ok(DocumentKind::Pdf),
            Some("txt") => Ok(DocumentKind::Text),
            Some(other) => Err(ApiError::UnsupportedFormat(format!(
                "{}: .{} files are not supported (expected .pdf or .txt)",
                filename, other
            ))),
            None => Err(ApiError::UnsupportedFormat(format!(
                "{}: file has no extension (expected .pdf or .txt)",
                filename
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Text => "TXT",
        }
    }
}

/// One independently chunked span of text: a PDF page or a whole text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub text: String,
    pub page: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Base file name, used as the citation source.
    pub source: String,
    pub kind: DocumentKind,
    pub total_pages: Option<usize>,
    /// Non-blank units in document order.
    pub units: Vec<TextUnit>,
}

/// Extracts text from an uploaded document.
///
/// This is CPU-bound for PDFs; async callers should run it on a blocking thread.
pub fn extract(filename: &str, bytes: &[u8]) -> Result<ExtractedDocument, ApiError> {
    let kind = DocumentKind::from_filename(filename)?;
    let source = source_name(filename);

    let (units, total_pages) = match kind {
        DocumentKind::Pdf => extract_pdf(&source, bytes)?,
        DocumentKind::Text => (extract_text(&source, bytes)?, None),
    };

    Ok(ExtractedDocument {
        source,
        kind,
        total_pages,
        units,
    })
}

fn extract_pdf(source: &str, bytes: &[u8]) -> Result<(Vec<TextUnit>, Option<usize>), ApiError> {
    // The PDF parser panics on some malformed inputs.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ApiError::Extraction(format!("{}: PDF parser failed", source)))?
        .map_err(|e| ApiError::Extraction(format!("{}: could not read PDF: {}", source, e)))?;

    let total_pages = pages.len();
    let units: Vec<TextUnit> = pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| TextUnit {
            text,
            page: Some(index + 1),
        })
        .collect();

    if units.is_empty() {
        return Err(ApiError::Extraction(format!(
            "{}: no extractable text in {} page(s)",
            source, total_pages
        )));
    }

    Ok((units, Some(total_pages)))
}

fn extract_text(source: &str, bytes: &[u8]) -> Result<Vec<TextUnit>, ApiError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ApiError::Extraction(format!("{}: not valid UTF-8 text: {}", source, e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    if text.trim().is_empty() {
        return Err(ApiError::Extraction(format!("{}: file is empty", source)));
    }

    Ok(vec![TextUnit {
        text: text.to_string(),
        page: None,
    }])
}

fn source_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
        .to_string()
}
