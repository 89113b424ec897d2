//! File-level helpers for the ingest path.
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use ragdb_core::error::{Error, Result};

use crate::{extension, SUPPORTED_EXTENSIONS};

pub const MAX_PDF_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_FILENAME_CHARS: usize = 100;
const PDF_SIGNATURE: &[u8] = b"%PDF-";
const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Cheap checks before handing a file to the PDF parser: it exists, has a
/// `.pdf` extension, is at most 50 MiB and starts with the PDF signature.
/// Any I/O failure counts as invalid.
pub fn validate_pdf_file(path: &Path) -> bool {
    if extension(path).as_deref() != Some("pdf") {
        return false;
    }
    let Ok(meta) = fs::metadata(path) else { return false };
    if !meta.is_file() || meta.len() > MAX_PDF_BYTES {
        return false;
    }
    let mut header = [0u8; 5];
    File::open(path).and_then(|mut f| f.read_exact(&mut header)).is_ok() && header == PDF_SIGNATURE
}

/// Make a user-supplied filename safe to store and display.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name.chars().map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c }).collect();
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "untitled".to_string();
    }
    if trimmed.chars().count() <= MAX_FILENAME_CHARS {
        return trimmed.to_string();
    }

    let (stem, ext) = match trimmed.rfind('.') {
        Some(dot) if dot > 0 => trimmed.split_at(dot),
        _ => (trimmed, ""),
    };
    let stem: String = stem.chars().take(MAX_FILENAME_CHARS - 5).collect();
    format!("{stem}{ext}")
}

/// Every supported document under `root`, sorted by path. A file path is
/// returned as-is when its extension is supported.
pub fn list_documents(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::NotFound(root.display().to_string()));
    }
    if root.is_file() {
        return Ok(if is_supported(root) { vec![root.to_path_buf()] } else { Vec::new() });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_supported(entry.path()) => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable entry"),
        }
    }
    files.sort();
    debug!(root = %root.display(), count = files.len(), "listed documents");
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}
