use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use ragdb_core::text::tokenize;
use ragdb_core::types::{MatchKind, ScoredChunk};

use crate::snapshot::IndexState;

/// Sparse TF-IDF vector. Ordered so that sums are evaluated in the same
/// order on every call.
pub type TfIdfVector<'a> = BTreeMap<&'a str, f64>;

pub const DEFAULT_TOP_K: usize = 5;

/// Scores every stored chunk against a query by cosine similarity of TF-IDF
/// vectors. Document vectors are computed from the state passed in, so a
/// ranking always reflects the latest insert or clear.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    top_k: usize,
}

impl Default for Ranker {
    fn default() -> Self { Self { top_k: DEFAULT_TOP_K } }
}

impl Ranker {
    pub fn new(top_k: usize) -> Self { Self { top_k } }

    /// Best matches first, at most `top_k`. Chunks with similarity 0 are not
    /// results; equal scores keep insertion order.
    pub fn rank(&self, query: &str, state: &IndexState) -> Vec<ScoredChunk> {
        if query.trim().is_empty() {
            debug!("empty query");
            return Vec::new();
        }
        if state.is_empty() {
            debug!("no documents in the index");
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            debug!("no valid tokens in query");
            return Vec::new();
        }

        let query_vector = tfidf_vector(&query_tokens, &state.idf_scores);
        let mut scored: Vec<(usize, f64)> = state
            .documents
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                let similarity = cosine_similarity(&query_vector, &tfidf_vector(doc.tokens(), &state.idf_scores));
                (similarity > 0.0).then_some((i, similarity))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(self.top_k);

        debug!(results = scored.len(), "ranked query");
        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk { chunk: state.documents[i].clone(), score, kind: MatchKind::Similarity })
            .collect()
    }
}

/// Token count over total token count.
pub fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let total = tokens.len() as f64;
    counts.into_iter().map(|(term, count)| (term, count as f64 / total)).collect()
}

/// Terms missing from `idf_scores` carry no weight and are left out.
pub fn tfidf_vector<'a>(tokens: &'a [String], idf_scores: &BTreeMap<String, f64>) -> TfIdfVector<'a> {
    term_frequencies(tokens)
        .into_iter()
        .filter_map(|(term, tf)| idf_scores.get(term).map(|idf| (term, tf * idf)))
        .collect()
}

/// Dot product over magnitudes; 0 when either vector has no magnitude.
pub fn cosine_similarity(a: &TfIdfVector<'_>, b: &TfIdfVector<'_>) -> f64 {
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().filter_map(|(term, w)| b.get(term).map(|v| w * v)).sum();
    (dot / (magnitude_a * magnitude_b)).min(1.0)
}

fn magnitude(v: &TfIdfVector<'_>) -> f64 {
    v.values().map(|w| w * w).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::{Chunk, IdfScheme, PageRef, StoredChunk};

    fn state(texts: &[&str]) -> IndexState {
        let mut state = IndexState {
            documents: texts.iter().map(|t| StoredChunk::admit(Chunk::new(*t, "a.pdf", PageRef::Unknown))).collect(),
            ..Default::default()
        };
        state.rebuild(IdfScheme::Smoothed);
        state
    }

    fn tokens(text: &str) -> Vec<String> { tokenize(text) }

    #[test]
    fn term_frequency_is_normalized_by_length() {
        let t = tokens("safety safety gear rules");
        let tf = term_frequencies(&t);
        assert_eq!(tf["safety"], 0.5);
        assert_eq!(tf["gear"], 0.25);
    }

    #[test]
    fn unknown_terms_have_no_weight() {
        let s = state(&["safety gear"]);
        let t = tokens("safety unicorn");
        let v = tfidf_vector(&t, &s.idf_scores);
        assert!(v.contains_key("safety"));
        assert!(!v.contains_key("unicorn"));
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let s = state(&["alpha bravo", "charlie delta"]);
        let t = tokens("alpha bravo");
        let v = tfidf_vector(&t, &s.idf_scores);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let s = state(&["alpha bravo"]);
        let t = tokens("alpha");
        let v = tfidf_vector(&t, &s.idf_scores);
        assert_eq!(cosine_similarity(&v, &TfIdfVector::new()), 0.0);
        assert_eq!(cosine_similarity(&TfIdfVector::new(), &TfIdfVector::new()), 0.0);
    }

    #[test]
    fn blank_and_tokenless_queries_return_nothing() {
        let s = state(&["alpha bravo charlie"]);
        assert!(Ranker::default().rank("   ", &s).is_empty());
        assert!(Ranker::default().rank("a an of 42", &s).is_empty());
        assert!(Ranker::default().rank("anything", &IndexState::default()).is_empty());
    }

    #[test]
    fn results_are_sorted_truncated_and_stable() {
        let s = state(&["pump valve", "pump pump valve", "pump valve", "fence post"]);
        let results = Ranker::new(3).rank("pump", &s);
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].chunk.id(), s.documents[1].id());
        assert_eq!(results[1].chunk.id(), s.documents[0].id(), "ties keep insertion order");
        assert_eq!(results[2].chunk.id(), s.documents[2].id());
        assert!(Ranker::new(0).rank("pump", &s).is_empty());
    }
}
