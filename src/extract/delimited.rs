//! CSV extractor
//!
//! Rows are serialized one per line with cells joined by single spaces,
//! which keeps numeric columns readable in the extracted text.

use super::{Extractor, MIME_CSV};
use crate::error::{Error, Result};
use std::path::Path;

pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[MIME_CSV]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut out = String::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let line = record.iter().collect::<Vec<_>>().join(" ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        Ok(out)
    }
}
