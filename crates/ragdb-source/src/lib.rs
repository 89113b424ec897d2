//! ragdb-source
//!
//! Turns files on disk into normalized, page-tagged text for the chunker:
//! PDF extraction through `lopdf`, plain-text reading, and the file-level
//! helpers the ingest path needs (validation, filename sanitizing, listing).
pub mod files;
pub mod pdf;
pub mod plain;

use std::path::Path;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::DocumentSource;

pub use files::{list_documents, sanitize_filename, validate_pdf_file};
pub use pdf::PdfSource;
pub use plain::TextSource;

/// Extensions `source_for` knows how to read, lower-case.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// Pick a source by file extension.
pub fn source_for(path: &Path) -> Result<Box<dyn DocumentSource>> {
    match extension(path).as_deref() {
        Some("pdf") => Ok(Box::new(PdfSource::new())),
        Some("txt") => Ok(Box::new(TextSource::new())),
        _ => Err(Error::Extraction(format!("unsupported file type: {}", path.display()))),
    }
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_chosen_by_extension() {
        assert_eq!(source_for(Path::new("a/b/Manual.PDF")).map(|s| s.name()).ok(), Some("pdf"));
        assert_eq!(source_for(Path::new("notes.txt")).map(|s| s.name()).ok(), Some("text"));
        assert!(matches!(source_for(Path::new("image.png")), Err(Error::Extraction(_))));
        assert!(source_for(Path::new("no_extension")).is_err());
    }
}
