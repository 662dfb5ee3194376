//! SQLite document store
//!
//! Documents and their chunks live in one database file; each site uses its
//! own collection inside it.

use crate::crawler::ExtractedDocument;
use crate::storage::schema::initialize_schema;
use crate::storage::text::{keyword_score, rank, split_text, tokenize};
use crate::storage::traits::{
    DocumentStore, SearchHit, StorageError, StorageResult, StoreOutcome, StoreProvider,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// SQLite-backed [`DocumentStore`] for one collection
///
/// Database work runs on tokio's blocking pool so crawl units are never
/// stalled on disk I/O.
pub struct SqliteDocumentStore {
    inner: Arc<Collection>,
}

struct Collection {
    conn: Mutex<Option<Connection>>,
    name: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the database at `path`
    pub fn open(
        path: &Path,
        collection: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;
        debug!("Opened document store {:?} for collection {}", path, collection);

        Ok(Self::with_connection(conn, collection, chunk_size, chunk_overlap))
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory(
        collection: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::with_connection(conn, collection, chunk_size, chunk_overlap))
    }

    fn with_connection(
        conn: Connection,
        collection: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Collection {
                conn: Mutex::new(Some(conn)),
                name: collection.to_string(),
                chunk_size,
                chunk_overlap,
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.inner.name
    }

    /// Number of documents stored in this collection
    pub fn document_count(&self) -> StorageResult<u64> {
        let guard = self.inner.lock();
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![self.inner.name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl Collection {
    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, document: &ExtractedDocument) -> StorageResult<StoreOutcome> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, content_hash FROM documents WHERE collection = ?1 AND url = ?2",
                params![self.name, document.url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let scraped_at = document.scraped_at.to_rfc3339();
        let (document_id, outcome) = match existing {
            Some((_, hash)) if hash == document.content_hash => {
                return Ok(StoreOutcome::Unchanged);
            }
            Some((id, _)) => {
                tx.execute(
                    "UPDATE documents
                     SET title = ?1, content = ?2, content_hash = ?3, last_modified = ?4, scraped_at = ?5
                     WHERE id = ?6",
                    params![
                        document.title,
                        document.content,
                        document.content_hash,
                        document.last_modified,
                        scraped_at,
                        id
                    ],
                )?;
                tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![id])?;
                (id, StoreOutcome::Updated)
            }
            None => {
                tx.execute(
                    "INSERT INTO documents
                     (collection, url, title, content, content_hash, last_modified, scraped_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        self.name,
                        document.url,
                        document.title,
                        document.content,
                        document.content_hash,
                        document.last_modified,
                        scraped_at
                    ],
                )?;
                (tx.last_insert_rowid(), StoreOutcome::Inserted)
            }
        };

        for (position, chunk) in split_text(&document.content, self.chunk_size, self.chunk_overlap)
            .iter()
            .enumerate()
        {
            tx.execute(
                "INSERT INTO chunks (document_id, position, text) VALUES (?1, ?2, ?3)",
                params![document_id, position as i64, chunk],
            )?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn search(&self, query: &str, top_k: usize, min_score: Option<f64>) -> StorageResult<Vec<SearchHit>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self.lock();
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;

        let mut stmt = conn.prepare(
            "SELECT c.text, d.url, d.title
             FROM chunks c JOIN documents d ON d.id = c.document_id
             WHERE d.collection = ?1
             ORDER BY d.id, c.position",
        )?;
        let rows = stmt.query_map(params![self.name], |row| {
            Ok(SearchHit {
                text: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
                score: 0.0,
            })
        })?;

        let mut scored = Vec::new();
        for hit in rows {
            let hit = hit?;
            scored.push((keyword_score(&terms, &hit.text), hit));
        }

        Ok(rank(scored, top_k, min_score)
            .into_iter()
            .map(|(score, hit)| SearchHit { score, ..hit })
            .collect())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn store(&self, document: &ExtractedDocument) -> StorageResult<StoreOutcome> {
        let inner = Arc::clone(&self.inner);
        let document = document.clone();
        tokio::task::spawn_blocking(move || inner.store(&document)).await?
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: Option<f64>,
    ) -> StorageResult<Vec<SearchHit>> {
        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || inner.search(&query, top_k, min_score)).await?
    }

    async fn close(&self) {
        if self.inner.lock().take().is_some() {
            info!("Closed document store for {}", self.inner.name);
        }
    }
}

/// Opens [`SqliteDocumentStore`]s on one database file
#[derive(Debug, Clone)]
pub struct SqliteStoreProvider {
    path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SqliteStoreProvider {
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            path: path.into(),
            chunk_size,
            chunk_overlap,
        }
    }
}

impl StoreProvider for SqliteStoreProvider {
    fn open(&self, collection: &str) -> StorageResult<Arc<dyn DocumentStore>> {
        let store =
            SqliteDocumentStore::open(&self.path, collection, self.chunk_size, self.chunk_overlap)?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::content_hash;
    use chrono::Utc;
    use tempfile::TempDir;

    fn doc(url: &str, content: &str) -> ExtractedDocument {
        ExtractedDocument {
            url: url.to_string(),
            title: "Title".to_string(),
            content: content.to_string(),
            content_hash: content_hash(content),
            last_modified: None,
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_update_unchanged() {
        let store = SqliteDocumentStore::open_in_memory("site.com", 1000, 200).unwrap();

        let first = doc("https://site.com/a", "first version");
        assert_eq!(store.store(&first).await.unwrap(), StoreOutcome::Inserted);
        assert_eq!(store.store(&first).await.unwrap(), StoreOutcome::Unchanged);

        let second = doc("https://site.com/a", "second version");
        assert_eq!(store.store(&second).await.unwrap(), StoreOutcome::Updated);
        assert_eq!(store.document_count().unwrap(), 1);

        let hits = store.search("second", 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.search("first", 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs.db");

        let a = SqliteDocumentStore::open(&path, "a.com", 1000, 200).unwrap();
        let b = SqliteDocumentStore::open(&path, "b.com", 1000, 200).unwrap();

        a.store(&doc("https://a.com/", "rust crawler")).await.unwrap();
        b.store(&doc("https://b.com/", "rust crawler")).await.unwrap();

        let hits = a.search("rust", 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://a.com/");
    }

    #[tokio::test]
    async fn test_search_ranking() {
        let store = SqliteDocumentStore::open_in_memory("site.com", 1000, 200).unwrap();
        store
            .store(&doc("https://site.com/install", "install rust with rustup"))
            .await
            .unwrap();
        store
            .store(&doc("https://site.com/python", "install python with pip"))
            .await
            .unwrap();

        let hits = store.search("install rust", 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://site.com/install");
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].score, 0.5);

        assert!(store.search("", 5, None).await.unwrap().is_empty());
        assert_eq!(store.search("install", 0, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_min_score() {
        let store = SqliteDocumentStore::open_in_memory("site.com", 1000, 200).unwrap();
        store
            .store(&doc("https://site.com/install", "install rust with rustup"))
            .await
            .unwrap();
        store
            .store(&doc("https://site.com/python", "install python with pip"))
            .await
            .unwrap();

        let hits = store.search("install rust", 5, Some(1.0)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://site.com/install");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteDocumentStore::open(&dir.path().join("docs.db"), "site.com", 1000, 200).unwrap(),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                let url = format!("https://site.com/p{}", i);
                store.store(&doc(&url, &format!("page number {}", i))).await
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap(), StoreOutcome::Inserted);
        }

        assert_eq!(store.document_count().unwrap(), 16);
        assert_eq!(store.search("page", 20, None).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = SqliteDocumentStore::open_in_memory("site.com", 1000, 200).unwrap();
        store.close().await;
        store.close().await;

        let result = store.store(&doc("https://site.com/", "x")).await;
        assert!(matches!(result, Err(StorageError::Closed)));
        assert!(matches!(
            store.search("x", 5, None).await,
            Err(StorageError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let provider = SqliteStoreProvider::new(dir.path().join("docs.db"), 100, 10);

        let store = provider.open("site.com").unwrap();
        store
            .store(&doc("https://site.com/", "persistent content"))
            .await
            .unwrap();
        store.close().await;

        let reopened = provider.open("site.com").unwrap();
        let hits = reopened.search("persistent", 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Title");
    }
}
