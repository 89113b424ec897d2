use std::path::Path;

use crate::error::Result;
use crate::types::{AnswerRequest, Chunk, Meta, ScoredChunk};

/// Lazy, finite, forward-only sequence of answer fragments. Concatenating
/// every `Ok` fragment yields the full answer.
pub type AnswerStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Produces normalized, page-tagged text for one document.
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, path: &Path) -> Result<String>;
}

pub trait CorpusIndex: Send + Sync {
    /// Admit a batch; returns how many chunks were stored.
    fn insert_batch(&self, chunks: Vec<Chunk>) -> Result<usize>;
    fn clear(&self) -> Result<()>;
    fn size(&self) -> usize;
    /// Ranked retrieval, best first, at most `k` results.
    fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk>;
    fn find_by_metadata(&self, filter: &Meta, limit: usize) -> Vec<ScoredChunk>;
}

pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_ready(&self) -> bool;
    fn generate(&self, request: &AnswerRequest) -> Result<String>;
    fn generate_stream(&self, request: &AnswerRequest) -> Result<AnswerStream>;
}
