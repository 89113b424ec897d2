//! ragdb-text
//!
//! TF-IDF lexical index over chunk text, persisted as one JSON snapshot per
//! collection, with cosine-similarity ranking. See `index`, `search` and
//! `snapshot`.
pub mod index;
pub mod search;
pub mod snapshot;

pub use index::LexicalIndex;
pub use search::Ranker;
pub use snapshot::IndexState;
