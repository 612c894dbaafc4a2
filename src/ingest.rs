//! Indexing orchestration.
//!
//! [`Indexer`] ties the chunker, the TF‑IDF embedder, and a [`Store`]
//! together. Single documents are embedded against the resident vocabulary
//! (one is built from the document itself when none exists yet). Directory
//! batches use a two-pass protocol so every vector in the batch shares one
//! vocabulary:
//!
//! ```text
//! pass 1   read + chunk      RawDocument -> ChunkedDocument
//! pass 2a  build vocabulary  over every chunk of the batch
//! pass 2b  embed             ChunkedDocument -> EmbeddedDocument
//! pass 3   persist           one transaction per document, then the vocabulary
//! ```
//!
//! Files skipped as unchanged still contribute their stored chunks to the
//! batch vocabulary and are re-embedded with it, so a directory stays
//! searchable after a partial re-index.
//!
//! Mutating operations hold a single writer lock. The resident vocabulary
//! sits behind an `RwLock` as an `Arc` snapshot so concurrent searches see
//! a stable value.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use docindex_core::chunk::{ChunkOptions, Chunker};
use docindex_core::embedding::{Embedder, EmbeddingOptions};
use docindex_core::error::{IndexError, Result};
use docindex_core::models::{
    document_id_for_path, preview, sha256_hex, Chunk, ContentType, Document, DocumentMetadata,
    Embedding,
};
use docindex_core::search::{self, SearchHit, SearchOptions};
use docindex_core::store::{DocumentFilter, Store, StoreStats};
use docindex_core::vocabulary::Vocabulary;

use crate::config::Config;
use crate::connector_fs::{self, DiscoveryOptions};
use crate::sqlite_store::SqliteStore;
use crate::{db, export, migrate};

/// Per-document indexing options.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Re-index even when the content hash is unchanged.
    pub force: bool,
    /// Overrides extension mapping and content sniffing.
    pub content_type: Option<ContentType>,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryOptions {
    pub discovery: DiscoveryOptions,
    pub index: IndexOptions,
}

/// A document that was written to the store.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub chunks: Vec<Chunk>,
    pub vocabulary_epoch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub path: String,
    pub error: String,
}

/// Outcome of a directory batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryReport {
    pub total: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: Vec<FileError>,
    /// Epoch of the vocabulary built for this batch, if any.
    pub vocabulary_epoch: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub chunks: usize,
    pub vocabulary_size: usize,
    pub vocabulary_epoch: Option<String>,
}

/// File contents plus what the filesystem says about it.
struct RawDocument {
    path: String,
    filename: String,
    extension: Option<String>,
    modified_at: Option<DateTime<Utc>>,
    size_bytes: u64,
    content_hash: String,
    text: String,
}

struct ChunkedDocument {
    document: Document,
    chunks: Vec<Chunk>,
}

struct EmbeddedDocument {
    document: Document,
    chunks: Vec<Chunk>,
    embeddings: Vec<Embedding>,
}

impl RawDocument {
    fn read(path: &Path) -> Result<Self> {
        let fail = |reason: String| IndexError::FileReadFailed {
            path: path.display().to_string(),
            reason,
        };

        if !connector_fs::is_supported(path) {
            return Err(IndexError::UnsupportedFileType(path.display().to_string()));
        }
        let canonical = std::fs::canonicalize(path).map_err(|e| fail(e.to_string()))?;
        let bytes = std::fs::read(&canonical).map_err(|e| fail(e.to_string()))?;
        let modified_at = std::fs::metadata(&canonical)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let content_hash = sha256_hex(&bytes);
        let size_bytes = bytes.len() as u64;
        let text = String::from_utf8(bytes).map_err(|_| fail("not valid UTF-8".to_string()))?;

        Ok(Self {
            filename: canonical
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            extension: connector_fs::extension_of(&canonical),
            path: canonical.display().to_string(),
            modified_at,
            size_bytes,
            content_hash,
            text,
        })
    }

    fn from_content(name: &str, content: &str) -> Self {
        Self {
            path: name.to_string(),
            filename: Path::new(name)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| name.to_string()),
            extension: connector_fs::extension_of(Path::new(name)),
            modified_at: None,
            size_bytes: content.len() as u64,
            content_hash: sha256_hex(content.as_bytes()),
            text: content.to_string(),
        }
    }
}

/// Why pass 1 did not produce a document.
enum Skip {
    Empty,
    /// Stored content hash matches; carries the document id.
    Unchanged(String),
}

pub struct Indexer<S: Store> {
    store: S,
    chunker: Chunker,
    embedder: Embedder,
    vocabulary: RwLock<Option<Arc<Vocabulary>>>,
    writer: Mutex<()>,
}

impl<S: Store> Indexer<S> {
    pub fn new(store: S, chunking: ChunkOptions, embedding: EmbeddingOptions) -> Result<Self> {
        Ok(Self {
            store,
            chunker: Chunker::new(chunking)?,
            embedder: Embedder::new(embedding),
            vocabulary: RwLock::new(None),
            writer: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active vocabulary, loading it from the store on first use.
    pub async fn vocabulary(&self) -> Result<Option<Arc<Vocabulary>>> {
        if let Some(v) = self.vocabulary.read().await.as_ref() {
            return Ok(Some(Arc::clone(v)));
        }
        let loaded = self.store.get_vocabulary().await?.map(Arc::new);
        if let Some(v) = &loaded {
            debug!(epoch = %v.epoch, terms = v.size(), "loaded vocabulary from store");
            *self.vocabulary.write().await = Some(Arc::clone(v));
        }
        Ok(loaded)
    }

    async fn activate(&self, vocab: Arc<Vocabulary>) -> Result<()> {
        self.store.put_vocabulary(&vocab).await?;
        *self.vocabulary.write().await = Some(vocab);
        Ok(())
    }

    /// Change detection and chunking.
    async fn prepare(
        &self,
        raw: RawDocument,
        opts: &IndexOptions,
    ) -> Result<std::result::Result<ChunkedDocument, Skip>> {
        if raw.text.trim().is_empty() {
            return Ok(Err(Skip::Empty));
        }

        let id = document_id_for_path(&raw.path);
        if !opts.force {
            if let Some(existing) = self.store.get_document(&id).await? {
                if existing.content_hash == raw.content_hash {
                    return Ok(Err(Skip::Unchanged(id)));
                }
            }
        }

        let content_type = opts
            .content_type
            .or_else(|| raw.extension.as_deref().and_then(ContentType::from_extension))
            .unwrap_or_else(|| self.chunker.resolve_content_type(&raw.text));

        let chunks: Vec<Chunk> = self
            .chunker
            .chunk_as(&raw.text, content_type)
            .into_iter()
            .map(|draft| Chunk::from_draft(&id, draft))
            .collect();
        if chunks.is_empty() {
            return Err(IndexError::NoChunksGenerated(raw.path));
        }

        debug!(path = %raw.path, content_type = %content_type, chunks = chunks.len(), "chunked");

        let document = Document {
            id,
            filename: raw.filename,
            path: raw.path,
            content_type,
            size_bytes: raw.size_bytes,
            content_hash: raw.content_hash,
            metadata: DocumentMetadata {
                extension: raw.extension,
                modified_at: raw.modified_at,
                preview: preview(&raw.text),
            },
            indexed_at: Utc::now(),
            chunk_count: chunks.len(),
        };
        Ok(Ok(ChunkedDocument { document, chunks }))
    }

    fn embed(&self, vocab: &Vocabulary, doc: ChunkedDocument) -> EmbeddedDocument {
        let embeddings = doc
            .chunks
            .iter()
            .map(|c| self.embedder.embed_chunk(vocab, c))
            .collect();
        EmbeddedDocument {
            document: doc.document,
            chunks: doc.chunks,
            embeddings,
        }
    }

    /// Embed one chunked document against the resident vocabulary (built
    /// from this document when none exists) and persist it.
    async fn commit_single(&self, doc: ChunkedDocument) -> Result<IndexedDocument> {
        let (vocab, fresh) = match self.vocabulary().await? {
            Some(v) => (v, false),
            None => {
                let built = self
                    .embedder
                    .build_vocabulary(doc.chunks.iter().map(|c| c.content.as_str()));
                (Arc::new(built), true)
            }
        };

        let embedded = self.embed(&vocab, doc);
        self.store
            .put_indexed_document(&embedded.document, &embedded.chunks, &embedded.embeddings)
            .await?;
        if fresh {
            self.activate(Arc::clone(&vocab)).await?;
        }

        info!(
            path = %embedded.document.path,
            id = %embedded.document.id,
            chunks = embedded.chunks.len(),
            "indexed document"
        );
        Ok(IndexedDocument {
            document: embedded.document,
            chunks: embedded.chunks,
            vocabulary_epoch: vocab.epoch.clone(),
        })
    }

    /// Index one file. Unsupported, empty, or unchanged files return
    /// `Ok(None)`.
    pub async fn index_document(
        &self,
        path: &Path,
        opts: &IndexOptions,
    ) -> Result<Option<IndexedDocument>> {
        let _guard = self.writer.lock().await;

        let raw = match RawDocument::read(path) {
            Ok(raw) => raw,
            Err(IndexError::UnsupportedFileType(p)) => {
                info!(path = %p, "skipping unsupported file type");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let shown = raw.path.clone();

        match self.prepare(raw, opts).await? {
            Ok(doc) => self.commit_single(doc).await.map(Some),
            Err(Skip::Empty) => {
                info!(path = %shown, "skipping empty file");
                Ok(None)
            }
            Err(Skip::Unchanged(_)) => {
                info!(path = %shown, "unchanged, skipping");
                Ok(None)
            }
        }
    }

    /// Index in-memory content under `name`, which stands in for the path.
    pub async fn index_content(
        &self,
        name: &str,
        content: &str,
        opts: &IndexOptions,
    ) -> Result<Option<IndexedDocument>> {
        if content.trim().is_empty() {
            return Err(IndexError::EmptyContent(name.to_string()));
        }
        let _guard = self.writer.lock().await;

        match self.prepare(RawDocument::from_content(name, content), opts).await? {
            Ok(doc) => self.commit_single(doc).await.map(Some),
            Err(Skip::Empty) => Err(IndexError::EmptyContent(name.to_string())),
            Err(Skip::Unchanged(_)) => {
                info!(name, "unchanged, skipping");
                Ok(None)
            }
        }
    }

    /// Index every supported file under `root` with one shared vocabulary.
    /// Per-file failures are collected into the report.
    pub async fn index_directory(
        &self,
        root: &Path,
        opts: &DirectoryOptions,
    ) -> Result<DirectoryReport> {
        let _guard = self.writer.lock().await;

        let files = connector_fs::discover_files(root, &opts.discovery).map_err(|e| {
            IndexError::FileReadFailed {
                path: root.display().to_string(),
                reason: format!("{:#}", e),
            }
        })?;

        let mut report = DirectoryReport {
            total: files.len(),
            ..DirectoryReport::default()
        };
        info!(root = %root.display(), files = files.len(), "indexing directory");

        // Pass 1: read and chunk. Unchanged files keep their stored chunks,
        // which are re-embedded under the batch vocabulary.
        let mut chunked: Vec<ChunkedDocument> = Vec::new();
        let mut carried: Vec<Chunk> = Vec::new();
        for path in &files {
            let outcome = match RawDocument::read(path) {
                Ok(raw) => self.prepare(raw, &opts.index).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(Ok(doc)) => chunked.push(doc),
                Ok(Err(Skip::Empty)) => {
                    debug!(path = %path.display(), "empty, skipping");
                    report.skipped += 1;
                }
                Ok(Err(Skip::Unchanged(id))) => {
                    debug!(path = %path.display(), "unchanged, skipping");
                    report.skipped += 1;
                    match self.store.get_chunks(&id).await {
                        Ok(chunks) => carried.extend(chunks),
                        Err(e) => record_failure(&mut report, path, &e),
                    }
                }
                Err(IndexError::NoChunksGenerated(_)) => {
                    debug!(path = %path.display(), "too short to chunk, skipping");
                    report.skipped += 1;
                }
                Err(e) => record_failure(&mut report, path, &e),
            }
        }

        if chunked.is_empty() {
            info!(
                total = report.total,
                skipped = report.skipped,
                errors = report.errors.len(),
                "nothing new to index"
            );
            return Ok(report);
        }

        // Pass 2a: one vocabulary over the whole batch.
        let vocab = Arc::new(
            self.embedder.build_vocabulary(
                chunked
                    .iter()
                    .flat_map(|d| d.chunks.iter())
                    .chain(carried.iter())
                    .map(|c| c.content.as_str()),
            ),
        );
        info!(
            epoch = %vocab.epoch,
            terms = vocab.size(),
            chunks = vocab.document_count,
            carried = carried.len(),
            "built batch vocabulary"
        );

        // Pass 2b: embed.
        let embedded: Vec<EmbeddedDocument> = chunked
            .into_iter()
            .map(|doc| self.embed(&vocab, doc))
            .collect();
        let refreshed: Vec<Embedding> = carried
            .iter()
            .map(|c| self.embedder.embed_chunk(&vocab, c))
            .collect();

        // Pass 3: persist each document, the refreshed embeddings, then the
        // vocabulary.
        for doc in &embedded {
            match self
                .store
                .put_indexed_document(&doc.document, &doc.chunks, &doc.embeddings)
                .await
            {
                Ok(()) => {
                    info!(
                        path = %doc.document.path,
                        chunks = doc.chunks.len(),
                        "indexed document"
                    );
                    report.indexed += 1;
                }
                Err(e) => record_failure(&mut report, Path::new(&doc.document.path), &e),
            }
        }

        if report.indexed > 0 {
            if !refreshed.is_empty() {
                self.store.put_embeddings(&refreshed).await?;
                debug!(chunks = refreshed.len(), "re-embedded unchanged files");
            }
            self.activate(Arc::clone(&vocab)).await?;
            report.vocabulary_epoch = Some(vocab.epoch.clone());
            self.warn_if_stale(&vocab).await?;
        }

        info!(
            total = report.total,
            indexed = report.indexed,
            skipped = report.skipped,
            errors = report.errors.len(),
            "directory indexed"
        );
        Ok(report)
    }

    async fn warn_if_stale(&self, vocab: &Vocabulary) -> Result<()> {
        let stale = self.store.count_stale(&vocab.epoch).await?;
        if stale > 0 {
            warn!(
                stale,
                "embeddings from an older vocabulary remain; run `docidx rebuild` to re-embed them"
            );
        }
        Ok(())
    }

    /// Build one vocabulary over every stored chunk and re-embed all of them.
    pub async fn rebuild_embeddings(&self) -> Result<RebuildReport> {
        let _guard = self.writer.lock().await;

        let chunks = self.store.all_chunks().await?;
        if chunks.is_empty() {
            info!("no chunks stored, nothing to rebuild");
            return Ok(RebuildReport {
                chunks: 0,
                vocabulary_size: 0,
                vocabulary_epoch: None,
            });
        }

        let vocab = Arc::new(
            self.embedder
                .build_vocabulary(chunks.iter().map(|c| c.content.as_str())),
        );
        let embeddings: Vec<Embedding> = chunks
            .iter()
            .map(|c| self.embedder.embed_chunk(&vocab, c))
            .collect();
        self.store.put_embeddings(&embeddings).await?;
        self.activate(Arc::clone(&vocab)).await?;

        info!(
            chunks = chunks.len(),
            terms = vocab.size(),
            epoch = %vocab.epoch,
            "rebuilt embeddings"
        );
        Ok(RebuildReport {
            chunks: chunks.len(),
            vocabulary_size: vocab.size(),
            vocabulary_epoch: Some(vocab.epoch.clone()),
        })
    }

    /// Rank stored chunks against `query`.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchHit>> {
        let vocab = self
            .vocabulary()
            .await?
            .ok_or(IndexError::VocabularyNotLoaded)?;
        search::search(&self.store, &vocab, &self.embedder, query, opts).await
    }

    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let deleted = self.store.delete_document(id).await?;
        if deleted {
            info!(id, "deleted document");
        }
        Ok(deleted)
    }

    pub async fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        self.store.find_documents(filter).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }
}

/// Connect to the configured database, apply the schema, and build an
/// indexer over it.
pub async fn open_indexer(config: &Config) -> anyhow::Result<Indexer<SqliteStore>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let indexer = Indexer::new(
        SqliteStore::new(pool),
        config.chunking.clone(),
        config.embedding.clone(),
    )
    .context("Invalid chunking options")?;
    Ok(indexer)
}

/// Command-line overrides for `docidx index`.
#[derive(Debug, Clone, Default)]
pub struct IndexArgs {
    pub force: bool,
    pub no_recursive: bool,
    pub max_files: Option<usize>,
    pub pattern: Option<String>,
}

impl IndexArgs {
    fn discovery(&self, config: &Config) -> anyhow::Result<DiscoveryOptions> {
        let pattern = match self.pattern.as_ref().or(config.indexing.pattern.as_ref()) {
            Some(p) => Some(
                regex::Regex::new(p).with_context(|| format!("Invalid --pattern regex: {}", p))?,
            ),
            None => None,
        };
        Ok(DiscoveryOptions {
            recursive: config.indexing.recursive && !self.no_recursive,
            max_files: self.max_files.unwrap_or(config.indexing.max_files),
            pattern,
        })
    }
}

/// `docidx index <path>`: a single file or a whole directory.
pub async fn run_index(config: &Config, path: &Path, args: &IndexArgs) -> anyhow::Result<()> {
    let indexer = open_indexer(config).await?;
    let index = IndexOptions {
        force: args.force,
        content_type: config.chunking.content_type,
    };

    if path.is_dir() {
        let opts = DirectoryOptions {
            discovery: args.discovery(config)?,
            index,
        };
        let report = indexer.index_directory(path, &opts).await?;

        println!("Indexed {}", path.display());
        println!("  files found:    {}", report.total);
        println!("  indexed:        {}", report.indexed);
        println!("  skipped:        {}", report.skipped);
        println!("  errors:         {}", report.errors.len());
        for e in &report.errors {
            println!("    {}: {}", e.path, e.error);
        }
        if let Some(epoch) = &report.vocabulary_epoch {
            println!("  vocabulary:     {}", epoch);
        }

        if config.export.after_batch && report.indexed > 0 {
            export::export_snapshot(indexer.store(), &config.export_dir()).await?;
        }
    } else {
        match indexer.index_document(path, &index).await? {
            Some(indexed) => {
                println!(
                    "Indexed {} ({} chunks, {})",
                    indexed.document.path,
                    indexed.chunks.len(),
                    indexed.document.content_type
                );
                println!("  id: {}", indexed.document.id);
            }
            None => println!("Skipped {} (unsupported, empty, or unchanged)", path.display()),
        }
    }

    indexer.store().pool().close().await;
    Ok(())
}

/// `docidx rebuild`: re-embed every stored chunk under one fresh vocabulary.
pub async fn run_rebuild(config: &Config) -> anyhow::Result<()> {
    let indexer = open_indexer(config).await?;
    let report = indexer.rebuild_embeddings().await?;

    match &report.vocabulary_epoch {
        Some(epoch) => println!(
            "Rebuilt {} embeddings ({} terms, epoch {})",
            report.chunks, report.vocabulary_size, epoch
        ),
        None => println!("Nothing to rebuild."),
    }

    indexer.store().pool().close().await;
    Ok(())
}

fn record_failure(report: &mut DirectoryReport, path: &Path, err: &IndexError) {
    warn!(path = %path.display(), error = %err, "failed to index file");
    report.errors.push(FileError {
        path: path.display().to_string(),
        error: err.to_string(),
    });
}
