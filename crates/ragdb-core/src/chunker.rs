//! Sentence-respecting chunker with page provenance and controlled overlap.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::text::{char_len, split_sentences, tail_chars};
use crate::types::{Chunk, PageRef};

const PAGE_MARKER_OPEN: &str = "[PAGE ";

/// Sizes are measured in characters.
///
/// `chunk_size` is a soft target: a sentence is never cut, so one sentence
/// longer than the target becomes a chunk of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 100, min_chunk_chars: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

struct PageRegion<'a> {
    page: PageRef,
    text: &'a str,
}

struct PageMarker {
    start: usize,
    end: usize,
    page: PageRef,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Split normalized document text into chunks tagged with `filename` and
    /// the page region each chunk came from.
    ///
    /// Output follows input order. Chunks whose trimmed length does not
    /// exceed `min_chunk_chars` are dropped.
    pub fn chunk(&self, text: &str, filename: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for region in split_pages(text) {
            for content in self.split_region(region.text) {
                if char_len(&content) > self.config.min_chunk_chars {
                    chunks.push(Chunk::new(content, filename, region.page));
                }
            }
        }
        debug!(filename, chunks = chunks.len(), "chunked document");
        chunks
    }

    fn split_region(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut buffer = String::new();
        for sentence in split_sentences(text) {
            let would_be = char_len(&buffer) + 1 + char_len(sentence);
            if !buffer.is_empty() && would_be > self.config.chunk_size {
                let emitted = buffer.trim().to_string();
                let seed = self.overlap_tail(&emitted);
                buffer = if seed.is_empty() { sentence.to_string() } else { format!("{seed} {sentence}") };
                pieces.push(emitted);
            } else {
                if !buffer.is_empty() { buffer.push(' '); }
                buffer.push_str(sentence);
            }
        }
        let rest = buffer.trim();
        if !rest.is_empty() { pieces.push(rest.to_string()); }
        pieces
    }

    /// Tail of an emitted chunk that seeds the next one: a whole trailing
    /// sentence when one starts inside the overlap window, else the raw
    /// character suffix.
    fn overlap_tail<'a>(&self, chunk: &'a str) -> &'a str {
        let overlap = self.config.chunk_overlap;
        if overlap == 0 { return ""; }
        if char_len(chunk) <= overlap { return chunk; }
        let window = tail_chars(chunk, overlap);
        let sentences = split_sentences(window);
        match sentences.last() {
            Some(last) if sentences.len() > 1 => last,
            _ => window.trim_start(),
        }
    }
}

/// Without markers the whole text is a single `Unknown` region. Non-blank
/// text before the first marker also becomes an `Unknown` region.
fn split_pages(text: &str) -> Vec<PageRegion<'_>> {
    let markers = find_page_markers(text);
    let Some(first) = markers.first() else {
        return vec![PageRegion { page: PageRef::Unknown, text }];
    };
    let mut regions = Vec::with_capacity(markers.len() + 1);
    let preamble = &text[..first.start];
    if !preamble.trim().is_empty() {
        regions.push(PageRegion { page: PageRef::Unknown, text: preamble });
    }
    for (i, marker) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map_or(text.len(), |next| next.start);
        regions.push(PageRegion { page: marker.page, text: &text[marker.end..end] });
    }
    regions
}

fn find_page_markers(text: &str) -> Vec<PageMarker> {
    let mut markers = Vec::new();
    let mut pos = 0;
    while let Some(found) = text[pos..].find(PAGE_MARKER_OPEN) {
        let start = pos + found;
        let digits_start = start + PAGE_MARKER_OPEN.len();
        let digits_len = text[digits_start..].bytes().take_while(u8::is_ascii_digit).count();
        let close = digits_start + digits_len;
        pos = digits_start;
        if digits_len == 0 || !text[close..].starts_with(']') { continue; }
        let Ok(number) = text[digits_start..close].parse::<u32>() else { continue };
        let page = if number > 0 { PageRef::Number(number) } else { PageRef::Unknown };
        markers.push(PageMarker { start, end: close + 1, page });
        pos = close + 1;
    }
    markers
}
