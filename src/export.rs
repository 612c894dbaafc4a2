//! JSON export of the whole index.
//!
//! Writes a pretty-printed snapshot to `index-YYYYMMDD-HHMMSS.json` and
//! refreshes `index-current.json` next to it, so tooling can always read
//! the latest export from a fixed path.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use docindex_core::store::{Snapshot, Store};

use crate::config::Config;
use crate::{db, migrate};
use crate::sqlite_store::SqliteStore;

/// Name of the rolling copy of the latest export.
pub const CURRENT_EXPORT: &str = "index-current.json";

#[derive(Serialize)]
struct ExportFile<'a> {
    exported_at: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

/// Snapshot `store` into `dir`. Returns the path of the timestamped file.
pub async fn export_snapshot<S: Store + ?Sized>(store: &S, dir: &Path) -> Result<PathBuf> {
    let snapshot = store.snapshot().await?;
    let exported_at = Utc::now();

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let json = serde_json::to_string_pretty(&ExportFile {
        exported_at,
        snapshot: &snapshot,
    })?;

    let path = dir.join(format!("index-{}.json", exported_at.format("%Y%m%d-%H%M%S")));
    std::fs::write(&path, &json)
        .with_context(|| format!("Failed to write export: {}", path.display()))?;
    let current = dir.join(CURRENT_EXPORT);
    std::fs::write(&current, &json)
        .with_context(|| format!("Failed to write export: {}", current.display()))?;

    info!(
        path = %path.display(),
        documents = snapshot.stats.documents,
        chunks = snapshot.stats.chunks,
        "exported index"
    );
    Ok(path)
}

/// Snapshot the configured database into `dir`, or the configured export
/// directory when `dir` is `None`.
pub async fn export_configured(config: &Config, dir: Option<&Path>) -> Result<PathBuf> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteStore::new(pool);
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(|| config.export_dir());

    let path = export_snapshot(&store, &dir).await;
    store.pool().close().await;
    path
}

/// `docidx export`.
pub async fn run_export(config: &Config, dir: Option<&Path>) -> Result<()> {
    let path = export_configured(config, dir).await?;
    println!("Exported index to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docindex_core::embedding::Embedder;
    use docindex_core::models::{
        Chunk, ChunkKind, ChunkMetadata, ContentType, Document, DocumentMetadata,
    };
    use docindex_core::store::memory::InMemoryStore;

    fn document() -> (Document, Chunk) {
        let doc = Document {
            id: "doc_0123456789abcdef".to_string(),
            filename: "notes.txt".to_string(),
            path: "/tmp/notes.txt".to_string(),
            content_type: ContentType::Text,
            size_bytes: 42,
            content_hash: "abc".to_string(),
            metadata: DocumentMetadata {
                extension: Some("txt".to_string()),
                modified_at: None,
                preview: "ownership borrowing lifetimes".to_string(),
            },
            indexed_at: Utc::now(),
            chunk_count: 1,
        };
        let chunk = Chunk {
            id: "c1".to_string(),
            document_id: doc.id.clone(),
            content: "ownership borrowing lifetimes".to_string(),
            kind: ChunkKind::TextBlock,
            chunk_index: 0,
            start: 0,
            end: 29,
            metadata: ChunkMetadata {
                length: 29,
                word_count: 3,
                overlap_words: 0,
                content_type: ContentType::Text,
                language: None,
                created_at: Utc::now(),
            },
        };
        (doc, chunk)
    }

    #[tokio::test]
    async fn test_export_writes_timestamped_and_current() {
        let store = InMemoryStore::new();
        let (doc, chunk) = document();
        let embedder = Embedder::default();
        let vocab = embedder.build_vocabulary([chunk.content.as_str()]);
        let embedding = embedder.embed_chunk(&vocab, &chunk);
        store
            .put_indexed_document(&doc, &[chunk], &[embedding])
            .await
            .unwrap();
        store.put_vocabulary(&vocab).await.unwrap();

        let tmp = tempfile::TempDir::new().unwrap();
        let path = export_snapshot(&store, &tmp.path().join("exports"))
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("index-") && name.ends_with(".json"));
        assert_eq!(name.len(), "index-20260101-120000.json".len());

        let current = std::fs::read_to_string(path.with_file_name(CURRENT_EXPORT)).unwrap();
        assert_eq!(current, std::fs::read_to_string(&path).unwrap());

        let value: serde_json::Value = serde_json::from_str(&current).unwrap();
        for key in ["exported_at", "stats", "documents", "chunks", "embeddings", "vocabulary"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["stats"]["documents"], 1);
        assert_eq!(value["chunks"][0]["kind"]["type"], "text_block");
    }

    #[tokio::test]
    async fn test_export_empty_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = export_snapshot(&InMemoryStore::new(), tmp.path())
            .await
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["documents"].as_array().unwrap().len(), 0);
        assert!(value["vocabulary"].is_null());
    }
}
