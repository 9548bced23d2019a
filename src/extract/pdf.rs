//! PDF extractor
//!
//! Delegates to `pdf-extract` for the actual text recovery.

use super::{Extractor, MIME_PDF};
use crate::error::{Error, Result};
use std::path::Path;

pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[MIME_PDF]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        pdf_extract::extract_text(path).map_err(|e| Error::ExtractionFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
