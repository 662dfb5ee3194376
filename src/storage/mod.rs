//! Storage module for extracted documents
//!
//! This module handles everything downstream of extraction:
//! - the `DocumentStore` interface the crawler feeds
//! - content-hash dedup so unchanged pages are not re-indexed
//! - chunking and keyword retrieval
//! - SQLite and in-memory backends

mod memory;
mod schema;
mod sqlite;
mod text;
mod traits;

pub use memory::{MemoryDocumentStore, MemoryStoreProvider};
pub use sqlite::{SqliteDocumentStore, SqliteStoreProvider};
pub use text::{split_text, DEFAULT_TOP_K};
pub use traits::{
    DocumentStore, SearchHit, StorageError, StorageResult, StoreOutcome, StoreProvider,
};
