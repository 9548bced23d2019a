//! Spreadsheet extractor
//!
//! XLSX and legacy XLS workbooks are read via `calamine`; every sheet is
//! serialized row by row with cells tab-joined, sheets separated by a blank
//! line.

use super::{Extractor, MIME_XLS, MIME_XLSX};
use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Reader};
use std::path::Path;

pub struct SpreadsheetExtractor;

impl Extractor for SpreadsheetExtractor {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[MIME_XLSX, MIME_XLS]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let mut workbook = open_workbook_auto(path).map_err(|e| Error::ExtractionFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut out = String::new();
        let sheet_names = workbook.sheet_names().to_owned();
        for name in sheet_names {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| Error::ExtractionFailed {
                    path: path.to_path_buf(),
                    reason: format!("sheet {}: {}", name, e),
                })?;

            for row in range.rows() {
                let line = row
                    .iter()
                    .map(|cell| cell.to_string())
                    .collect::<Vec<_>>()
                    .join("\t");
                out.push_str(line.trim_end());
                out.push('\n');
            }
            out.push('\n');
        }
        Ok(out)
    }
}
