//! Text extraction
//!
//! Raw uploads are turned into plain UTF-8 text by a format-specific
//! adapter. Adapters are selected by MIME type; the upload gate resolves the
//! MIME by magic-byte sniffing with an extension fallback, so by the time a
//! file reaches the registry its type is already known.
//!
//! Adapters delegate the actual parsing to format libraries; this module is
//! dispatch plus glue.

pub mod delimited;
pub mod docx;
pub mod pdf;
pub mod sheet;
pub mod text;

pub use delimited::CsvExtractor;
pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use sheet::SpreadsheetExtractor;
pub use text::PlainTextExtractor;

use crate::error::{Error, Result};
use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TXT: &str = "text/plain";
pub const MIME_JSON: &str = "application/json";
pub const MIME_XML: &str = "application/xml";
pub const MIME_XML_TEXT: &str = "text/xml";

/// MIME type for a filename extension, for files whose leading bytes are not
/// distinctive (all the text-based formats) or when sniffing fails.
pub fn mime_for_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())?;
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "doc" => Some(MIME_DOC),
        "xlsx" => Some(MIME_XLSX),
        "xls" => Some(MIME_XLS),
        "csv" => Some(MIME_CSV),
        "txt" => Some(MIME_TXT),
        "json" => Some(MIME_JSON),
        "xml" => Some(MIME_XML),
        _ => None,
    }
}

/// A format-specific text extractor.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// MIME types this adapter claims.
    fn mime_types(&self) -> &'static [&'static str];

    /// Extract the file's text content as UTF-8.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Registry of extractors, picks an adapter by detected MIME type.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(PdfExtractor),
                Box::new(DocxExtractor),
                Box::new(SpreadsheetExtractor),
                Box::new(CsvExtractor),
                Box::new(PlainTextExtractor),
            ],
        }
    }

    /// All MIME types the registry can handle. This doubles as the upload
    /// allow-list.
    pub fn supported_mime_types(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .flat_map(|e| e.mime_types().iter().copied())
            .collect()
    }

    pub fn supports(&self, mime: &str) -> bool {
        self.extractors.iter().any(|e| e.mime_types().contains(&mime))
    }

    /// Extract text from `path`, dispatching on the MIME type.
    pub fn extract(&self, mime: &str, path: &Path) -> Result<String> {
        let extractor = self
            .extractors
            .iter()
            .find(|e| e.mime_types().contains(&mime))
            .ok_or_else(|| Error::UnsupportedType(mime.to_string()))?;
        extractor.extract(path)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(mime_for_extension("report.pdf"), Some(MIME_PDF));
        assert_eq!(mime_for_extension("notes.TXT"), Some(MIME_TXT));
        assert_eq!(mime_for_extension("data.csv"), Some(MIME_CSV));
        assert_eq!(mime_for_extension("archive.rar"), None);
        assert_eq!(mime_for_extension("no_extension"), None);
    }

    #[test]
    fn test_registry_covers_all_supported_formats() {
        let registry = ExtractorRegistry::new();
        for mime in [
            MIME_PDF, MIME_DOCX, MIME_DOC, MIME_XLSX, MIME_XLS, MIME_CSV, MIME_TXT, MIME_JSON,
            MIME_XML, MIME_XML_TEXT,
        ] {
            assert!(registry.supports(mime), "registry should support {}", mime);
        }
        assert!(!registry.supports("image/png"));
    }

    #[test]
    fn test_unknown_mime_is_unsupported() {
        let registry = ExtractorRegistry::new();
        let err = registry
            .extract("application/zip", Path::new("x.zip"))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }
}
