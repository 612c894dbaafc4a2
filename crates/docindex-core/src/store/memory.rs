//! In-memory [`Store`] implementation for tests and embedding in other hosts.
//!
//! All tables live in one [`State`] behind a `std::sync::RwLock`, so every
//! trait call observes and mutates a consistent view. Deleting a document
//! cascades to its chunks and their embeddings.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{IndexError, Result};
use crate::models::{Chunk, Document, Embedding};
use crate::vocabulary::Vocabulary;

use super::{DocumentFilter, EmbeddingRecord, Snapshot, Store, StoreStats};

#[derive(Default)]
struct State {
    documents: HashMap<String, Document>,
    /// Keyed by document id; each list is in chunk-index order.
    chunks: BTreeMap<String, Vec<Chunk>>,
    chunk_ids: HashSet<String>,
    embeddings: HashMap<String, Embedding>,
    vocabulary: Option<Vocabulary>,
}

impl State {
    fn ordered_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values().flatten()
    }

    fn stats(&self) -> StoreStats {
        StoreStats::new(
            self.documents.len(),
            self.chunks.values().map(Vec::len).sum(),
            self.embeddings.len(),
            self.vocabulary.as_ref().map_or(0, Vocabulary::size),
            self.documents.values().map(|d| d.size_bytes).sum(),
        )
    }

    fn drop_chunks(&mut self, document_id: &str) {
        if let Some(old) = self.chunks.remove(document_id) {
            for chunk in old {
                self.chunk_ids.remove(&chunk.id);
                self.embeddings.remove(&chunk.id);
            }
        }
    }
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| IndexError::StorageReadFailed(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| IndexError::StorageWriteFailed(e.to_string()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_document(&self, doc: &Document) -> Result<()> {
        self.write()?.documents.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn put_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.write()?;
        let doc = state.documents.get_mut(document_id).ok_or_else(|| {
            IndexError::StorageWriteFailed(format!("unknown document {}", document_id))
        })?;
        doc.chunk_count = chunks.len();
        state.drop_chunks(document_id);
        let mut ordered = chunks.to_vec();
        ordered.sort_by_key(|c| c.chunk_index);
        state
            .chunk_ids
            .extend(ordered.iter().map(|c| c.id.clone()));
        state.chunks.insert(document_id.to_string(), ordered);
        Ok(())
    }

    async fn put_embeddings(&self, embeddings: &[Embedding]) -> Result<()> {
        let mut state = self.write()?;
        for e in embeddings {
            if !state.chunk_ids.contains(&e.chunk_id) {
                return Err(IndexError::StorageWriteFailed(format!(
                    "embedding for unknown chunk {}",
                    e.chunk_id
                )));
            }
            state.embeddings.insert(e.chunk_id.clone(), e.clone());
        }
        Ok(())
    }

    async fn put_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        self.write()?.vocabulary = Some(vocab.clone());
        Ok(())
    }

    async fn get_vocabulary(&self) -> Result<Option<Vocabulary>> {
        Ok(self.read()?.vocabulary.clone())
    }

    async fn all_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let state = self.read()?;
        Ok(state
            .ordered_chunks()
            .filter_map(|chunk| {
                let embedding = state.embeddings.get(&chunk.id)?;
                let filename = state
                    .documents
                    .get(&chunk.document_id)
                    .map(|d| d.filename.clone())
                    .unwrap_or_default();
                Some(EmbeddingRecord {
                    embedding: embedding.clone(),
                    chunk: chunk.clone(),
                    filename,
                })
            })
            .collect())
    }

    async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        Ok(self.read()?.ordered_chunks().cloned().collect())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .read()?
            .chunks
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_stale(&self, epoch: &str) -> Result<usize> {
        Ok(self
            .read()?
            .embeddings
            .values()
            .filter(|e| e.vocabulary_epoch != epoch)
            .count())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn find_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let state = self.read()?;
        let mut docs: Vec<Document> = state
            .documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut state = self.write()?;
        if state.documents.remove(id).is_none() {
            return Ok(false);
        }
        state.drop_chunks(id);
        Ok(true)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(self.read()?.stats())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let state = self.read()?;
        let mut documents: Vec<Document> = state.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        let chunks: Vec<Chunk> = state.ordered_chunks().cloned().collect();
        let embeddings = chunks
            .iter()
            .filter_map(|c| state.embeddings.get(&c.id).cloned())
            .collect();
        Ok(Snapshot {
            stats: state.stats(),
            documents,
            chunks,
            embeddings,
            vocabulary: state.vocabulary.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_text, ChunkOptions};
    use crate::embedding::Embedder;
    use crate::models::{document_id_for_path, ContentType, DocumentMetadata};
    use chrono::Utc;

    fn document(path: &str, ct: ContentType) -> Document {
        Document {
            id: document_id_for_path(path),
            filename: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            content_type: ct,
            size_bytes: 42,
            content_hash: "hash".to_string(),
            metadata: DocumentMetadata {
                extension: None,
                modified_at: None,
                preview: String::new(),
            },
            indexed_at: Utc::now(),
            chunk_count: 0,
        }
    }

    fn chunks_for(doc: &Document, text: &str) -> Vec<Chunk> {
        let opts = ChunkOptions {
            chunk_size: 40,
            overlap: 0,
            min_chunk_size: 1,
            max_chunk_size: 80,
            content_type: Some(ContentType::Text),
        };
        chunk_text(text, &opts)
            .unwrap()
            .into_iter()
            .map(|d| Chunk::from_draft(&doc.id, d))
            .collect()
    }

    async fn seeded() -> (InMemoryStore, Document) {
        let store = InMemoryStore::new();
        let doc = document("/notes/rust.txt", ContentType::Text);
        let chunks = chunks_for(&doc, "Ownership rules matter.\n\nBorrowing is checked statically.");
        let vocab = Vocabulary::build(chunks.iter().map(|c| c.content.as_str()), 300);
        let embedder = Embedder::default();
        let embeddings: Vec<Embedding> =
            chunks.iter().map(|c| embedder.embed_chunk(&vocab, c)).collect();
        store
            .put_indexed_document(&doc, &chunks, &embeddings)
            .await
            .unwrap();
        store.put_vocabulary(&vocab).await.unwrap();
        (store, doc)
    }

    #[tokio::test]
    async fn test_put_and_read_back() {
        let (store, doc) = seeded().await;
        let stored = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(stored.chunk_count, 2);

        let records = store.all_embeddings().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "rust.txt");
        assert_eq!(records[0].chunk.chunk_index, 0);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.embeddings, 2);
        assert!(stats.vocabulary_size > 0);
        assert_eq!(stats.total_bytes, 42);
        assert!((stats.avg_chunks_per_document - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (store, doc) = seeded().await;
        assert!(store.delete_document(&doc.id).await.unwrap());
        assert!(!store.delete_document(&doc.id).await.unwrap());
        assert!(store.all_chunks().await.unwrap().is_empty());
        assert!(store.all_embeddings().await.unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap().embeddings, 0);
    }

    #[tokio::test]
    async fn test_replacing_chunks_drops_old_embeddings() {
        let (store, doc) = seeded().await;
        let replacement = chunks_for(&doc, "Completely new content here.");
        store.put_chunks(&doc.id, &replacement).await.unwrap();
        assert_eq!(store.all_chunks().await.unwrap().len(), 1);
        assert!(store.all_embeddings().await.unwrap().is_empty());
        let stored = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(stored.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_vocabulary_replaced() {
        let (store, _) = seeded().await;
        let next = Vocabulary::build(["fresh terms only"], 300);
        store.put_vocabulary(&next).await.unwrap();
        let loaded = store.get_vocabulary().await.unwrap().unwrap();
        assert_eq!(loaded.epoch, next.epoch);
        assert_eq!(loaded.size(), next.size());
    }

    #[tokio::test]
    async fn test_find_documents_filter() {
        let store = InMemoryStore::new();
        store
            .put_document(&document("/a/guide.md", ContentType::Markdown))
            .await
            .unwrap();
        store
            .put_document(&document("/a/main.rs", ContentType::Code))
            .await
            .unwrap();

        let code = store
            .find_documents(&DocumentFilter {
                content_type: Some(ContentType::Code),
                ..DocumentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].filename, "main.rs");

        let by_name = store
            .find_documents(&DocumentFilter {
                filename_contains: Some("GUIDE".to_string()),
                ..DocumentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);

        let limited = store
            .find_documents(&DocumentFilter {
                limit: Some(1),
                ..DocumentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_chunks_for_unknown_document_rejected() {
        let store = InMemoryStore::new();
        let doc = document("/x.txt", ContentType::Text);
        let chunks = chunks_for(&doc, "Some text that becomes a chunk.");
        let err = store.put_chunks(&doc.id, &chunks).await.unwrap_err();
        assert!(matches!(err, IndexError::StorageWriteFailed(_)));
    }

    #[tokio::test]
    async fn test_embedding_for_replaced_chunk_rejected() {
        let (store, doc) = seeded().await;
        let vocab = store.get_vocabulary().await.unwrap().unwrap();
        let old = store.get_chunks(&doc.id).await.unwrap();
        let stale = Embedder::default().embed_chunk(&vocab, &old[1]);

        let replacement = chunks_for(&doc, "Completely new content here.");
        store.put_chunks(&doc.id, &replacement).await.unwrap();
        let err = store.put_embeddings(&[stale]).await.unwrap_err();
        assert!(matches!(err, IndexError::StorageWriteFailed(_)));

        let fresh = Embedder::default().embed_chunk(&vocab, &replacement[0]);
        store.put_embeddings(&[fresh]).await.unwrap();
        assert_eq!(store.stats().await.unwrap().embeddings, 1);
    }

    #[tokio::test]
    async fn test_get_chunks_by_document() {
        let (store, doc) = seeded().await;
        let chunks = store.get_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.document_id == doc.id));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert!(store.get_chunks("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_stale() {
        let (store, _) = seeded().await;
        let vocab = store.get_vocabulary().await.unwrap().unwrap();
        assert_eq!(store.count_stale(&vocab.epoch).await.unwrap(), 0);
        assert_eq!(store.count_stale("some-other-epoch").await.unwrap(), 2);
    }
}
