use crate::crawler::ExtractedDocument;
use crate::storage::text::{keyword_score, rank, split_text, tokenize};
use crate::storage::traits::{
    DocumentStore, SearchHit, StorageError, StorageResult, StoreOutcome, StoreProvider,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Entry {
    document: ExtractedDocument,
    chunks: Vec<String>,
}

/// In-process [`DocumentStore`]
///
/// Used by tests and dry runs. Keeps documents in insertion order and
/// counts `close` calls.
pub struct MemoryDocumentStore {
    entries: Mutex<Vec<Entry>>,
    chunk_size: usize,
    chunk_overlap: usize,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            chunk_size,
            chunk_overlap,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every stored document
    pub fn documents(&self) -> Vec<ExtractedDocument> {
        self.lock().iter().map(|e| e.document.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of times `close` was called
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Acquire)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_CHUNK_SIZE,
            crate::config::DEFAULT_CHUNK_OVERLAP,
        )
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn store(&self, document: &ExtractedDocument) -> StorageResult<StoreOutcome> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }

        let chunks = split_text(&document.content, self.chunk_size, self.chunk_overlap);
        let mut entries = self.lock();
        match entries.iter_mut().find(|e| e.document.url == document.url) {
            Some(entry) if entry.document.content_hash == document.content_hash => {
                Ok(StoreOutcome::Unchanged)
            }
            Some(entry) => {
                entry.document = document.clone();
                entry.chunks = chunks;
                Ok(StoreOutcome::Updated)
            }
            None => {
                entries.push(Entry {
                    document: document.clone(),
                    chunks,
                });
                Ok(StoreOutcome::Inserted)
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: Option<f64>,
    ) -> StorageResult<Vec<SearchHit>> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }

        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let terms = &terms;
        let scored: Vec<(f64, SearchHit)> = self
            .lock()
            .iter()
            .flat_map(|entry| {
                entry.chunks.iter().map(move |chunk| {
                    (
                        keyword_score(terms, chunk),
                        SearchHit {
                            text: chunk.clone(),
                            url: entry.document.url.clone(),
                            title: entry.document.title.clone(),
                            score: 0.0,
                        },
                    )
                })
            })
            .collect();

        Ok(rank(scored, top_k, min_score)
            .into_iter()
            .map(|(score, hit)| SearchHit { score, ..hit })
            .collect())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::AcqRel);
        self.closed.store(true, Ordering::Release);
    }
}

/// Hands out one [`MemoryDocumentStore`] per collection
///
/// A collection whose store was closed gets a fresh store on the next
/// `open`. The most recent store of each collection stays inspectable.
#[derive(Default)]
pub struct MemoryStoreProvider {
    stores: Mutex<HashMap<String, Arc<MemoryDocumentStore>>>,
}

impl MemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current store of a collection, if one was opened
    pub fn store(&self, collection: &str) -> Option<Arc<MemoryDocumentStore>> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
    }
}

impl StoreProvider for MemoryStoreProvider {
    fn open(&self, collection: &str) -> StorageResult<Arc<dyn DocumentStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let store = match stores.get(collection) {
            Some(store) if !store.is_closed() => Arc::clone(store),
            _ => {
                let store = Arc::new(MemoryDocumentStore::default());
                stores.insert(collection.to_string(), Arc::clone(&store));
                store
            }
        };
        Ok(store)
    }
}
