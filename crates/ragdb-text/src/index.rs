use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, instrument, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::CorpusIndex;
use ragdb_core::types::{Chunk, IdfScheme, MatchKind, Meta, ScoredChunk, StoredChunk};

use crate::search::Ranker;
use crate::snapshot::{self, IndexState};

/// TF-IDF index for one named collection, backed by `<dir>/<collection>.json`.
///
/// Mutations take a lock shared by every index opened on the same snapshot
/// file, reload the snapshot, apply the change and persist it before the new
/// state is swapped in; on failure the previous state is untouched. Queries
/// hold the read lock for the whole scoring pass, so they always see
/// documents and IDF from the same version.
pub struct LexicalIndex {
    collection: String,
    snapshot_path: PathBuf,
    scheme: IdfScheme,
    collection_lock: Arc<Mutex<()>>,
    state: RwLock<IndexState>,
    version: AtomicU64,
}

type LockRegistry = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

/// The mutation lock for a snapshot file, shared process-wide.
fn collection_lock(snapshot_path: &Path) -> Arc<Mutex<()>> {
    static REGISTRY: OnceLock<LockRegistry> = OnceLock::new();
    let key = lock_key(snapshot_path);
    let mut registry = REGISTRY.get_or_init(Default::default).lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(registry.entry(key).or_default())
}

// Canonical directory when it exists, so aliases of one directory share a
// lock; otherwise the absolute path.
fn lock_key(snapshot_path: &Path) -> PathBuf {
    let (Some(dir), Some(file)) = (snapshot_path.parent(), snapshot_path.file_name()) else {
        return snapshot_path.to_path_buf();
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    fs::canonicalize(dir)
        .or_else(|_| std::path::absolute(dir))
        .map_or_else(|_| snapshot_path.to_path_buf(), |dir| dir.join(file))
}

impl LexicalIndex {
    /// Open a collection, loading its snapshot when one exists. A missing or
    /// unreadable snapshot starts an empty index.
    pub fn open(storage_dir: &Path, collection: &str, scheme: IdfScheme) -> Self {
        let snapshot_path = storage_dir.join(format!("{collection}.json"));
        let state = load_state(&snapshot_path, scheme);
        info!(collection, documents = state.len(), path = %snapshot_path.display(), "opened lexical index");
        Self {
            collection: collection.to_string(),
            collection_lock: collection_lock(&snapshot_path),
            snapshot_path,
            scheme,
            state: RwLock::new(state),
            version: AtomicU64::new(0),
        }
    }

    pub fn collection(&self) -> &str { &self.collection }
    pub fn snapshot_path(&self) -> &Path { &self.snapshot_path }
    pub fn scheme(&self) -> IdfScheme { self.scheme }

    /// Incremented on every successful mutation.
    pub fn version(&self) -> u64 { self.version.load(Ordering::Acquire) }

    /// A consistent copy of the current state.
    pub fn snapshot(&self) -> IndexState { self.read().clone() }

    /// Append all non-blank chunks, rebuild vocabulary and IDF over the full
    /// corpus, persist, then publish. Fails without mutating on an empty
    /// batch, an all-blank batch, or a persistence error.
    #[instrument(skip_all, fields(collection = %self.collection, batch = chunks.len()))]
    pub fn insert_batch(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            warn!("no documents provided to add");
            return Err(Error::EmptyBatch);
        }
        let admitted: Vec<StoredChunk> = chunks
            .into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .map(StoredChunk::admit)
            .collect();
        if admitted.is_empty() {
            warn!("no valid documents to add");
            return Err(Error::NoValidChunks);
        }
        let added = admitted.len();

        let total = self.commit(|state| state.documents.extend(admitted))?;
        info!(added, total, "added chunks to index");
        Ok(added)
    }

    /// Drop every chunk and persist the empty state.
    pub fn clear(&self) -> Result<()> {
        self.commit(|state| *state = IndexState::default())?;
        info!(collection = %self.collection, "cleared collection");
        Ok(())
    }

    /// Remove the snapshot file and empty the in-memory state.
    pub fn delete(&self) -> Result<()> {
        let _collection = self.lock_collection();
        let mut guard = self.write();
        snapshot::remove(&self.snapshot_path).inspect_err(|e| error!(error = %e, "failed to delete collection"))?;
        *guard = IndexState::default();
        self.version.fetch_add(1, Ordering::AcqRel);
        info!(collection = %self.collection, "deleted collection");
        Ok(())
    }

    pub fn size(&self) -> usize { self.read().len() }

    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        let guard = self.read();
        let results = Ranker::new(k).rank(query, &guard);
        info!(results = results.len(), "retrieved similar documents for query");
        results
    }

    /// Exact-match filter over chunk metadata, in insertion order, with the
    /// synthetic maximal score. No ranking is applied.
    pub fn find_by_metadata(&self, filter: &Meta, limit: usize) -> Vec<ScoredChunk> {
        let guard = self.read();
        let matches: Vec<ScoredChunk> = guard
            .documents
            .iter()
            .filter(|doc| doc.metadata().matches(filter))
            .take(limit)
            .map(|doc| ScoredChunk { chunk: doc.clone(), score: ScoredChunk::METADATA_SCORE, kind: MatchKind::Metadata })
            .collect();
        info!(matches = matches.len(), "found documents matching metadata filter");
        matches
    }

    /// Apply `mutate` to the latest persisted state, so changes committed by
    /// other indexes on the same collection are kept.
    fn commit(&self, mutate: impl FnOnce(&mut IndexState)) -> Result<usize> {
        let _collection = self.lock_collection();
        let mut guard = self.write();
        let mut next = match snapshot::load(&self.snapshot_path) {
            Ok(Some(mut on_disk)) => {
                for doc in &mut on_disk.documents {
                    doc.refresh_tokens();
                }
                on_disk
            }
            Ok(None) => IndexState::default(),
            Err(e) => {
                warn!(error = %e, "snapshot unreadable; committing over in-memory state");
                guard.clone()
            }
        };
        mutate(&mut next);
        next.rebuild(self.scheme);
        snapshot::save(&self.snapshot_path, &next).inspect_err(|e| error!(error = %e, "failed to persist index"))?;
        *guard = next;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(guard.len())
    }

    fn lock_collection(&self) -> MutexGuard<'_, ()> {
        self.collection_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The state is only ever replaced wholesale, so a poisoned lock still
    // guards a consistent value.
    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_state(path: &Path, scheme: IdfScheme) -> IndexState {
    match snapshot::load(path) {
        Ok(Some(mut state)) => {
            let stored_idf = std::mem::take(&mut state.idf_scores);
            for doc in &mut state.documents {
                doc.refresh_tokens();
            }
            state.rebuild(scheme);
            if stored_idf != state.idf_scores {
                warn!(path = %path.display(), "snapshot IDF table was stale; recomputed");
            }
            state
        }
        Ok(None) => {
            debug!(path = %path.display(), "no snapshot yet; starting empty");
            IndexState::default()
        }
        Err(e) => {
            error!(error = %e, "error loading snapshot; starting empty");
            IndexState::default()
        }
    }
}

impl CorpusIndex for LexicalIndex {
    fn insert_batch(&self, chunks: Vec<Chunk>) -> Result<usize> { Self::insert_batch(self, chunks) }
    fn clear(&self) -> Result<()> { Self::clear(self) }
    fn size(&self) -> usize { Self::size(self) }
    fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> { Self::search(self, query, k) }
    fn find_by_metadata(&self, filter: &Meta, limit: usize) -> Vec<ScoredChunk> { Self::find_by_metadata(self, filter, limit) }
}
