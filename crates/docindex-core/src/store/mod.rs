//! Storage abstraction for docindex.
//!
//! The [`Store`] trait covers every persistence operation the indexer and
//! the search path need: documents, chunks, embeddings, and the single
//! active vocabulary. Backends are pluggable (SQLite in the app crate,
//! [`memory::InMemoryStore`] here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Chunk, ContentType, Document, Embedding};
use crate::vocabulary::Vocabulary;

/// An embedding joined with the chunk it belongs to and the parent
/// document's filename.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub embedding: Embedding,
    pub chunk: Chunk,
    pub filename: String,
}

/// Criteria for [`Store::find_documents`]. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub content_type: Option<ContentType>,
    /// Case-insensitive substring of the filename.
    pub filename_contains: Option<String>,
    pub limit: Option<usize>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(ct) = self.content_type {
            if doc.content_type != ct {
                return false;
            }
        }
        if let Some(needle) = &self.filename_contains {
            if !doc
                .filename
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    pub embeddings: usize,
    pub vocabulary_size: usize,
    /// Sum of the source file sizes of all indexed documents.
    pub total_bytes: u64,
    pub avg_chunks_per_document: f64,
}

impl StoreStats {
    pub fn new(
        documents: usize,
        chunks: usize,
        embeddings: usize,
        vocabulary_size: usize,
        total_bytes: u64,
    ) -> Self {
        let avg_chunks_per_document = if documents == 0 {
            0.0
        } else {
            chunks as f64 / documents as f64
        };
        Self {
            documents,
            chunks,
            embeddings,
            vocabulary_size,
            total_bytes,
            avg_chunks_per_document,
        }
    }
}

/// Full contents of a store, used by the JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stats: StoreStats,
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Embedding>,
    pub vocabulary: Option<Vocabulary>,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_document`](Store::put_document) | Insert or replace a document row |
/// | [`put_chunks`](Store::put_chunks) | Replace a document's chunks, update its `chunk_count` |
/// | [`put_embeddings`](Store::put_embeddings) | Upsert embeddings by chunk id |
/// | [`put_vocabulary`](Store::put_vocabulary) | Replace the active vocabulary |
/// | [`put_indexed_document`](Store::put_indexed_document) | All three document writes as one unit |
/// | [`all_embeddings`](Store::all_embeddings) | Every embedding with its chunk and filename |
/// | [`get_chunks`](Store::get_chunks) | One document's chunks in index order |
/// | [`count_stale`](Store::count_stale) | Embeddings stamped with a different vocabulary epoch |
/// | [`delete_document`](Store::delete_document) | Remove a document, its chunks and embeddings |
///
/// Record order from the bulk reads is deterministic: by document id, then
/// chunk index.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put_document(&self, doc: &Document) -> Result<()>;

    /// Replace every chunk of `document_id` (dropping their embeddings).
    async fn put_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()>;

    async fn put_embeddings(&self, embeddings: &[Embedding]) -> Result<()>;

    /// Clear the previous vocabulary and write `vocab` in its place.
    async fn put_vocabulary(&self, vocab: &Vocabulary) -> Result<()>;

    /// Write a document with its chunks and embeddings. Backends with
    /// transactions override this so the three writes commit together.
    async fn put_indexed_document(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<()> {
        self.put_document(doc).await?;
        self.put_chunks(&doc.id, chunks).await?;
        self.put_embeddings(embeddings).await
    }

    async fn get_vocabulary(&self) -> Result<Option<Vocabulary>>;

    async fn all_embeddings(&self) -> Result<Vec<EmbeddingRecord>>;

    async fn all_chunks(&self) -> Result<Vec<Chunk>>;

    /// Chunks of `document_id` ordered by chunk index; empty when unknown.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Number of embeddings whose epoch is not `epoch`.
    async fn count_stale(&self, epoch: &str) -> Result<usize>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Documents matching `filter`, most recently indexed first.
    async fn find_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;

    /// Returns `false` when no document had this id.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<StoreStats>;

    async fn snapshot(&self) -> Result<Snapshot>;
}
