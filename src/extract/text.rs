//! Pass-through extractor for text-based formats
//!
//! TXT, JSON, and XML files are already text; the only work is a byte copy
//! with UTF-8 validation.

use super::{Extractor, MIME_JSON, MIME_TXT, MIME_XML, MIME_XML_TEXT};
use crate::error::{Error, Result};
use std::path::Path;

pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[MIME_TXT, MIME_JSON, MIME_XML, MIME_XML_TEXT]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        String::from_utf8(bytes).map_err(|e| Error::ExtractionFailed {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {}", e),
        })
    }
}
