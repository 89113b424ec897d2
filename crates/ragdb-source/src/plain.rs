use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use ragdb_core::error::{Error, Result};
use ragdb_core::text::normalize;
use ragdb_core::traits::DocumentSource;

/// Plain-text files. Invalid UTF-8 is replaced rather than rejected. Text may
/// carry its own `[PAGE n]` markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSource;

impl TextSource {
    pub fn new() -> Self { Self }
}

impl DocumentSource for TextSource {
    fn name(&self) -> &'static str { "text" }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::Extraction(format!("failed to read {}: {e}", path.display())))?;
        let text = normalize(&String::from_utf8_lossy(&bytes));
        debug!(chars = text.chars().count(), "read text file");
        Ok(text)
    }
}
