//! Storage traits and error types
//!
//! This module defines the document store interface the crawler feeds and
//! the provider that opens one store per site.

use crate::crawler::ExtractedDocument;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Document store is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What `store` did with a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreOutcome {
    /// First time this URL was stored
    Inserted,
    /// The URL was known with a different content hash
    Updated,
    /// Same URL, same content hash; nothing re-indexed
    Unchanged,
}

/// One retrieval result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub url: String,
    pub title: String,
    pub score: f64,
}

/// Sink for extracted documents, with keyword retrieval over their chunks
///
/// Implementations must be safe to share across concurrent crawl units.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Indexes a document, skipping it if its content hash is unchanged
    async fn store(&self, document: &ExtractedDocument) -> StorageResult<StoreOutcome>;

    /// Returns the `top_k` best-scoring chunks for `query`
    ///
    /// An empty query yields no hits; `top_k == 0` means the default of 5.
    /// Chunks scoring below `min_score` are left out.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: Option<f64>,
    ) -> StorageResult<Vec<SearchHit>>;

    /// Releases the store's resources; idempotent
    async fn close(&self);
}

/// Opens document stores by collection name (the site identifier)
pub trait StoreProvider: Send + Sync {
    fn open(&self, collection: &str) -> StorageResult<Arc<dyn DocumentStore>>;
}
