//! Domain types shared by the chunker, the lexical index and the facade.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::text::tokenize;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Page provenance of a chunk.
///
/// Serialized as a JSON number for known pages and as `"N/A"` when the
/// source text carried no page markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "PageRepr", from = "PageRepr")]
pub enum PageRef {
    Number(u32),
    Unknown,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PageRepr {
    Number(u32),
    Label(String),
}

impl From<PageRef> for PageRepr {
    fn from(page: PageRef) -> Self {
        match page {
            PageRef::Number(n) => PageRepr::Number(n),
            PageRef::Unknown => PageRepr::Label(PageRef::UNKNOWN_LABEL.to_string()),
        }
    }
}

impl From<PageRepr> for PageRef {
    fn from(repr: PageRepr) -> Self {
        match repr {
            PageRepr::Number(n) if n > 0 => PageRef::Number(n),
            PageRepr::Number(_) => PageRef::Unknown,
            PageRepr::Label(label) => label.trim().parse::<u32>().ok().filter(|n| *n > 0).map_or(PageRef::Unknown, PageRef::Number),
        }
    }
}

impl PageRef {
    pub const UNKNOWN_LABEL: &'static str = "N/A";
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{n}"),
            PageRef::Unknown => f.write_str(Self::UNKNOWN_LABEL),
        }
    }
}

/// Provenance attached to every chunk.
///
/// - `filename`: source document identifier
/// - `page`: originating page, or `Unknown`
/// - `chunk_length`: character length of the chunk content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub page: PageRef,
    #[serde(default)]
    pub chunk_length: usize,
}

impl ChunkMetadata {
    /// String rendering of a metadata field, used for exact-match filters.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "filename" => Some(self.filename.clone()),
            "page" => Some(self.page.to_string()),
            "chunk_length" => Some(self.chunk_length.to_string()),
            _ => None,
        }
    }

    /// True when every `(field, value)` pair in `filter` matches exactly.
    /// Unknown field names never match.
    pub fn matches(&self, filter: &Meta) -> bool {
        filter.iter().all(|(key, expected)| self.field(key).as_deref() == Some(expected.as_str()))
    }
}

/// A chunk produced by the chunker, not yet admitted to an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>, filename: impl Into<String>, page: PageRef) -> Self {
        let content = content.into();
        let chunk_length = content.chars().count();
        Self { content, metadata: ChunkMetadata { filename: filename.into(), page, chunk_length } }
    }
}

/// A chunk owned by an index.
///
/// The id is assigned once on admission. `tokens` is always derived from
/// `content`; there is no way to set one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    id: ChunkId,
    content: String,
    metadata: ChunkMetadata,
    #[serde(default)]
    tokens: Vec<String>,
}

impl StoredChunk {
    /// Admit a chunk under a fresh, never reused identifier.
    pub fn admit(chunk: Chunk) -> Self {
        let tokens = tokenize(&chunk.content);
        Self { id: uuid::Uuid::new_v4().to_string(), content: chunk.content, metadata: chunk.metadata, tokens }
    }

    /// Re-derive tokens from content, e.g. after deserializing a snapshot.
    pub fn refresh_tokens(&mut self) {
        self.tokens = tokenize(&self.content);
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn content(&self) -> &str { &self.content }
    pub fn metadata(&self) -> &ChunkMetadata { &self.metadata }
    pub fn tokens(&self) -> &[String] { &self.tokens }
}

/// Indicates how a match was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchKind {
    Similarity,
    Metadata,
}

/// A stored chunk with its relevance.
///
/// `score` is a cosine similarity in `(0, 1]` for ranked results and the
/// synthetic maximum `1.0` for metadata matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f64,
    pub kind: MatchKind,
}

impl ScoredChunk {
    pub const METADATA_SCORE: f64 = 1.0;
}

/// Input handed to an answer generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    pub context: String,
    pub system_prompt: String,
}

/// Citation returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub filename: String,
    pub page: PageRef,
    pub preview: String,
    pub score: f64,
}

/// How inverse document frequency is derived from document counts.
///
/// `Plain` is `ln(N / df)`; a term present in every chunk weighs zero, so a
/// single-chunk corpus can never match anything. `Smoothed` is
/// `ln(1 + N / df)`, which keeps the ordering of `Plain` while staying
/// positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdfScheme {
    Plain,
    #[default]
    Smoothed,
}

impl IdfScheme {
    pub fn weight(self, total_documents: usize, document_frequency: usize) -> f64 {
        let ratio = total_documents as f64 / document_frequency as f64;
        match self {
            IdfScheme::Plain => ratio.ln(),
            IdfScheme::Smoothed => ratio.ln_1p(),
        }
    }
}
