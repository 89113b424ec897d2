use std::path::Path;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use ragdb_core::chunker::Chunker;
use ragdb_core::config::Settings;
use ragdb_core::error::{Error, Result};
use ragdb_core::text::{clean_for_display, truncate_chars};
use ragdb_core::traits::{AnswerGenerator, AnswerStream, CorpusIndex};
use ragdb_core::types::{AnswerRequest, Meta, ScoredChunk, SourceRef};
use ragdb_generate::default_generator;
use ragdb_text::LexicalIndex;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that answers questions using the provided document excerpts.

Guidelines for responses:
1. Be accurate and professional
2. If the information is not available in the provided context, clearly state that
3. Cite the specific documents and pages you rely on
4. For safety-related questions, emphasize following proper protocols

Base your answers strictly on the provided context.";

pub const DEFAULT_PREVIEW_CHARS: usize = 300;
const CONTEXT_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Sources are known up front; the answer arrives as fragments.
pub struct RagStream {
    pub sources: Vec<SourceRef>,
    pub fragments: AnswerStream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub total_chunks: usize,
    pub index_ready: bool,
    pub generator: &'static str,
    pub generator_ready: bool,
}

pub struct RagEngine<I> where I: CorpusIndex {
    index: I,
    chunker: Chunker,
    generator: Box<dyn AnswerGenerator>,
    system_prompt: String,
    preview_chars: usize,
}

impl RagEngine<LexicalIndex> {
    /// Wire the lexical index, chunker and generator from settings. Relative
    /// data directories resolve against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        settings.validate()?;
        let index = LexicalIndex::open(&settings.index.storage_dir(base), &settings.index.collection, settings.index.idf);
        let chunker = Chunker::new(settings.chunking.clone())?;
        let generator = default_generator(&settings.generator)?;
        let mut engine = Self::new(index, chunker, generator).with_preview_chars(settings.retrieval.preview_chars);
        if let Some(prompt) = settings.generator.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            engine = engine.with_system_prompt(prompt);
        }
        Ok(engine)
    }
}

impl<I> RagEngine<I> where I: CorpusIndex {
    pub fn new(index: I, chunker: Chunker, generator: Box<dyn AnswerGenerator>) -> Self {
        Self { index, chunker, generator, system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(), preview_chars: DEFAULT_PREVIEW_CHARS }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    pub fn index(&self) -> &I { &self.index }
    pub fn system_prompt(&self) -> &str { &self.system_prompt }

    /// Chunk `raw_text` and insert every retained chunk in one batch. Returns
    /// the number of chunks stored; nothing is stored on error.
    #[instrument(skip(self, raw_text), fields(chars = raw_text.len()))]
    pub fn add_document(&self, raw_text: &str, filename: &str) -> Result<usize> {
        if raw_text.trim().is_empty() {
            warn!("no text to index");
            return Err(Error::EmptyInput(format!("no text extracted from {filename}")));
        }
        let chunks = self.chunker.chunk(raw_text, filename);
        if chunks.is_empty() {
            warn!("no chunks retained");
            return Err(Error::NoValidChunks);
        }
        let added = self.index.insert_batch(chunks).inspect_err(|e| error!(error = %e, "failed to index document"))?;
        info!(added, total = self.index.size(), "document indexed");
        Ok(added)
    }

    /// Retrieve the `top_k` best chunks and ask the generator. No matching
    /// chunk is `Error::NoResults`; a failed or blank answer is
    /// `Error::Generator`.
    #[instrument(skip(self, question), fields(question = %truncate_chars(question, 100)))]
    pub fn query(&self, question: &str, top_k: usize) -> Result<RagAnswer> {
        let (request, sources) = self.prepare(question, top_k)?;
        let answer = self.generator.generate(&request).inspect_err(|e| error!(error = %e, "answer generation failed"))?;
        if answer.trim().is_empty() {
            error!("generator returned an empty answer");
            return Err(Error::Generator("empty answer".to_string()));
        }
        Ok(RagAnswer { answer, sources })
    }

    /// Same retrieval as [`RagEngine::query`], answer streamed as fragments.
    /// A stream that ends without any non-blank fragment yields a final
    /// `Error::Generator`, matching the blank-answer rule of `query`.
    #[instrument(skip(self, question), fields(question = %truncate_chars(question, 100)))]
    pub fn query_stream(&self, question: &str, top_k: usize) -> Result<RagStream> {
        let (request, sources) = self.prepare(question, top_k)?;
        let fragments = self.generator.generate_stream(&request).inspect_err(|e| error!(error = %e, "answer stream failed"))?;
        Ok(RagStream { sources, fragments: Box::new(RequireContent::new(fragments)) })
    }

    pub fn stats(&self) -> EngineStats {
        let total_chunks = self.index.size();
        EngineStats {
            total_chunks,
            index_ready: total_chunks > 0,
            generator: self.generator.name(),
            generator_ready: self.generator.is_ready(),
        }
    }

    pub fn find(&self, filter: &Meta, limit: usize) -> Vec<ScoredChunk> {
        self.index.find_by_metadata(filter, limit)
    }

    pub fn clear(&self) -> Result<()> {
        self.index.clear()
    }

    fn prepare(&self, question: &str, top_k: usize) -> Result<(AnswerRequest, Vec<SourceRef>)> {
        let results = self.index.search(question, top_k);
        if results.is_empty() {
            warn!("no relevant documents found");
            return Err(Error::NoResults);
        }
        info!(results = results.len(), top_score = results[0].score, "retrieved context");

        let request = AnswerRequest {
            question: question.to_string(),
            context: build_context(&results),
            system_prompt: self.system_prompt.clone(),
        };
        let sources = results.iter().map(|r| self.source_ref(r)).collect();
        Ok((request, sources))
    }

    fn source_ref(&self, result: &ScoredChunk) -> SourceRef {
        let meta = result.chunk.metadata();
        SourceRef {
            filename: meta.filename.clone(),
            page: meta.page,
            preview: truncate_chars(&clean_for_display(result.chunk.content()), self.preview_chars).to_string(),
            score: result.score,
        }
    }
}

struct RequireContent {
    inner: AnswerStream,
    has_content: bool,
    finished: bool,
}

impl RequireContent {
    fn new(inner: AnswerStream) -> Self {
        Self { inner, has_content: false, finished: false }
    }
}

impl Iterator for RequireContent {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(Ok(fragment)) => {
                self.has_content |= !fragment.trim().is_empty();
                Some(Ok(fragment))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                if self.has_content {
                    return None;
                }
                error!("answer stream ended without content");
                Some(Err(Error::Generator("empty answer".to_string())))
            }
        }
    }
}

/// `[Document i: file, Page p]` blocks in ranked order, separated by `---`.
pub fn build_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let meta = r.chunk.metadata();
            format!("[Document {}: {}, Page {}]\n{}\n", i + 1, meta.filename, meta.page, clean_for_display(r.chunk.content()))
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
