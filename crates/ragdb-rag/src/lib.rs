//! ragdb-rag
//!
//! Retrieval façade: chunks documents into a `CorpusIndex`, ranks chunks for
//! a question, and hands the assembled context to an `AnswerGenerator`.
pub mod citations;
pub mod engine;

pub use citations::{format_sources, format_with_citations};
pub use engine::{build_context, EngineStats, RagAnswer, RagEngine, RagStream, DEFAULT_SYSTEM_PROMPT};
