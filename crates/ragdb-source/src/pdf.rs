//! PDF text extraction using lopdf.
use std::fmt::Write as _;
use std::path::Path;

use lopdf::Document;
use tracing::{info, instrument, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::text::normalize;
use ragdb_core::traits::DocumentSource;

/// Extracts each page's text behind a `[PAGE n]` marker so chunks keep
/// their page of origin.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfSource;

impl PdfSource {
    pub fn new() -> Self { Self }

    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<String> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::Extraction(format!("failed to load PDF: {e}")))?;
        page_tagged_text(&doc)
    }

    pub fn page_count(&self, path: &Path) -> Result<usize> {
        let doc = load(path)?;
        Ok(doc.get_pages().len())
    }
}

impl DocumentSource for PdfSource {
    fn name(&self) -> &'static str { "pdf" }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn extract(&self, path: &Path) -> Result<String> {
        let doc = load(path)?;
        let text = page_tagged_text(&doc)?;
        info!(chars = text.chars().count(), "extracted PDF text");
        Ok(text)
    }
}

fn load(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|e| Error::Extraction(format!("failed to load PDF {}: {e}", path.display())))
}

fn page_tagged_text(doc: &Document) -> Result<String> {
    let mut raw = String::new();
    // BTreeMap keyed by 1-based page number, already in order.
    for page_num in doc.get_pages().keys().copied() {
        match doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => {
                let _ = write!(raw, "\n[PAGE {page_num}]\n{text}\n");
            }
            Ok(_) => {}
            Err(e) => warn!(page = page_num, error = %e, "failed to extract page text"),
        }
    }

    if raw.trim().is_empty() {
        return Err(Error::Extraction("no text content found in PDF; it may be scanned".to_string()));
    }
    Ok(normalize(&raw))
}
