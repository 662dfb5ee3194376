//! Database schema definitions
//!
//! One database holds every site's collection; rows are keyed by
//! `(collection, url)`.

/// SQL schema for the document database
pub const SCHEMA_SQL: &str = r#"
-- One row per indexed page
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    last_modified TEXT,
    scraped_at TEXT NOT NULL,
    UNIQUE(collection, url)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

-- Retrieval units
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
