//! Durable snapshot of a collection: documents, vocabulary and IDF table.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::{IdfScheme, StoredChunk};

/// In-memory state of one collection and, verbatim, its snapshot format.
///
/// `vocabulary` and `idf_scores` are always derived from `documents` via
/// [`IndexState::rebuild`]; nothing patches them incrementally.
/// `idf_scores` hold weights under the collection's configured
/// [`IdfScheme`] (`smoothed` by default), not necessarily plain `ln(N/df)`;
/// loading recomputes them under the scheme of the opening index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexState {
    pub documents: Vec<StoredChunk>,
    pub vocabulary: BTreeSet<String>,
    pub idf_scores: BTreeMap<String, f64>,
}

impl IndexState {
    /// Recompute vocabulary and IDF over the full current corpus.
    pub fn rebuild(&mut self, scheme: IdfScheme) {
        self.vocabulary = self.documents.iter().flat_map(|d| d.tokens().iter().cloned()).collect();
        self.idf_scores = compute_idf(&self.documents, scheme);
    }

    pub fn len(&self) -> usize { self.documents.len() }
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
}

/// `idf(term)` from the number of documents containing `term` at least once.
pub fn compute_idf(documents: &[StoredChunk], scheme: IdfScheme) -> BTreeMap<String, f64> {
    let total = documents.len();
    let mut document_counts: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        let unique: HashSet<&str> = doc.tokens().iter().map(String::as_str).collect();
        for term in unique {
            *document_counts.entry(term).or_insert(0) += 1;
        }
    }
    document_counts
        .into_iter()
        .map(|(term, count)| (term.to_string(), scheme.weight(total, count)))
        .collect()
}

/// `Ok(None)` when no snapshot exists yet.
pub fn load(path: &Path) -> Result<Option<IndexState>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persistence(path, &e)),
    };
    let state = serde_json::from_reader(BufReader::new(file)).map_err(|e| persistence(path, &e))?;
    Ok(Some(state))
}

/// Write the snapshot atomically: a temp file in the same directory is
/// renamed over `path` only once fully written.
pub fn save(path: &Path, state: &IndexState) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| persistence(dir, &e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| persistence(dir, &e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, state).map_err(|e| persistence(path, &e))?;
        writer.flush().map_err(|e| persistence(path, &e))?;
    }
    tmp.as_file().sync_all().map_err(|e| persistence(path, &e))?;
    tmp.persist(path).map_err(|e| persistence(path, &e.error))?;
    Ok(())
}

/// Remove the snapshot; a missing file is not an error.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence(path, &e)),
    }
}

fn persistence(path: &Path, e: &dyn std::fmt::Display) -> Error {
    Error::Persistence(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::{Chunk, PageRef};

    fn doc(text: &str) -> StoredChunk {
        StoredChunk::admit(Chunk::new(text, "a.pdf", PageRef::Unknown))
    }

    #[test]
    fn idf_counts_documents_not_occurrences() {
        let docs = vec![doc("safety safety safety gear"), doc("safety rules")];
        let idf = compute_idf(&docs, IdfScheme::Plain);
        assert_eq!(idf["safety"], 0.0);
        assert!((idf["gear"] - 2f64.ln()).abs() < 1e-12);
        assert!((idf["rules"] - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn rebuild_derives_vocabulary_from_documents() {
        let mut state = IndexState { documents: vec![doc("alpha bravo"), doc("bravo charlie")], ..Default::default() };
        state.rebuild(IdfScheme::Smoothed);
        let vocab: Vec<&str> = state.vocabulary.iter().map(String::as_str).collect();
        assert_eq!(vocab, vec!["alpha", "bravo", "charlie"]);
        assert_eq!(state.idf_scores.len(), 3);
        assert!(state.idf_scores["alpha"] > state.idf_scores["bravo"]);
    }

    #[test]
    fn idf_scores_follow_the_configured_scheme() {
        let docs = vec![doc("alpha bravo"), doc("bravo charlie")];
        let mut plain = IndexState { documents: docs.clone(), ..Default::default() };
        plain.rebuild(IdfScheme::Plain);
        let mut smoothed = IndexState { documents: docs, ..Default::default() };
        smoothed.rebuild(IdfScheme::Smoothed);

        assert!((plain.idf_scores["alpha"] - 2f64.ln()).abs() < 1e-12);
        assert!((smoothed.idf_scores["alpha"] - 3f64.ln()).abs() < 1e-12);
        assert_eq!(plain.idf_scores["bravo"], 0.0);
        assert!((smoothed.idf_scores["bravo"] - 2f64.ln()).abs() < 1e-12);
        assert_eq!(plain.vocabulary, smoothed.vocabulary);
    }

    #[test]
    fn empty_corpus_has_empty_tables() {
        let mut state = IndexState::default();
        state.rebuild(IdfScheme::Plain);
        assert!(state.vocabulary.is_empty());
        assert!(state.idf_scores.is_empty());
    }

    #[test]
    fn missing_snapshot_loads_as_none() {
        let tmp = tempfile::tempdir().expect("tmp");
        assert!(load(&tmp.path().join("nope.json")).expect("load").is_none());
        assert!(remove(&tmp.path().join("nope.json")).is_ok());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(load(&path), Err(Error::Persistence(_))));
    }

    #[test]
    fn save_creates_missing_directories() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("nested/dir/c.json");
        let mut state = IndexState { documents: vec![doc("alpha bravo charlie")], ..Default::default() };
        state.rebuild(IdfScheme::Smoothed);
        save(&path, &state).expect("save");
        assert_eq!(load(&path).expect("load"), Some(state));
    }
}
