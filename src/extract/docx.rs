//! DOCX extractor
//!
//! A .docx file is a zip archive; the text lives in `word/document.xml` as
//! `<w:t>` runs grouped into `<w:p>` paragraphs. The adapter walks the XML
//! events and emits one line per paragraph.
//!
//! Legacy binary `.doc` (OLE compound files) shares a MIME binding here but
//! is not a zip archive; it fails with a clear message.

use super::{Extractor, MIME_DOC, MIME_DOCX};
use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

pub struct DocxExtractor;

impl DocxExtractor {
    fn document_xml(path: &Path) -> Result<String> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::ExtractionFailed {
            path: path.to_path_buf(),
            reason: format!("not a DOCX archive (legacy .doc is not supported): {}", e),
        })?;
        let mut entry =
            archive
                .by_name("word/document.xml")
                .map_err(|e| Error::ExtractionFailed {
                    path: path.to_path_buf(),
                    reason: format!("missing word/document.xml: {}", e),
                })?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: format!("document.xml is not UTF-8: {}", e),
            })?;
        Ok(xml)
    }

    fn text_from_xml(xml: &str, path: &Path) -> Result<String> {
        let mut reader = Reader::from_str(xml);
        let mut out = String::new();
        let mut in_run_text = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
                Ok(Event::End(e)) if e.name().as_ref() == b"w:t" => in_run_text = false,
                Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => out.push('\n'),
                Ok(Event::Empty(e)) if e.name().as_ref() == b"w:tab" => out.push('\t'),
                Ok(Event::Empty(e)) if e.name().as_ref() == b"w:br" => out.push('\n'),
                Ok(Event::Text(t)) if in_run_text => {
                    let text = t.unescape().map_err(|e| Error::ExtractionFailed {
                        path: path.to_path_buf(),
                        reason: format!("malformed text run: {}", e),
                    })?;
                    out.push_str(&text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::ExtractionFailed {
                        path: path.to_path_buf(),
                        reason: format!("malformed document.xml: {}", e),
                    })
                }
            }
        }
        Ok(out)
    }
}

impl Extractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[MIME_DOCX, MIME_DOC]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        let xml = Self::document_xml(path)?;
        Self::text_from_xml(&xml, path)
    }
}
