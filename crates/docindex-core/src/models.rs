//! Core data models shared by the chunker, embedder, store, and indexer.
//!
//! These types represent the documents, chunks, and embeddings that flow
//! through the ingestion and retrieval pipeline. The vocabulary lives in
//! [`crate::vocabulary`] next to the code that builds it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::IndexError;

/// Number of content characters folded into a chunk id.
const CHUNK_ID_PREFIX_CHARS: usize = 64;

/// Number of characters kept as a document preview.
const PREVIEW_CHARS: usize = 200;

/// How a document's text is structured. Selects the chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Markdown,
    Code,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Markdown => "markdown",
            ContentType::Code => "code",
        }
    }

    /// Map a file extension (without the dot) to a content type.
    ///
    /// Returns `None` for extensions that carry no structural hint, in which
    /// case the chunker falls back to content sniffing.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "mdx" => Some(ContentType::Markdown),
            "txt" | "text" | "rst" => Some(ContentType::Text),
            "rs" | "py" | "js" | "jsx" | "ts" | "tsx" | "go" | "java" | "c" | "h" | "cpp"
            | "hpp" | "cs" | "rb" | "php" | "swift" | "kt" | "scala" | "sh" | "sql" => {
                Some(ContentType::Code)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "markdown" => Ok(ContentType::Markdown),
            "code" => Ok(ContentType::Code),
            other => Err(IndexError::InvalidOptions(format!(
                "unknown content type '{}': expected text, markdown, or code",
                other
            ))),
        }
    }
}

/// The unit a chunk was cut at, with the structural label it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkKind {
    /// A whole markdown section that fit within the target size.
    Section { header: Option<String> },
    /// Paragraphs of a markdown section too large for one chunk.
    PartialSection { header: Option<String> },
    /// Sentences packed from a paragraph too large for one chunk.
    SentenceGroup,
    /// Words packed from a sentence too large for one chunk.
    WordGroup,
    /// Code cut at a brace-depth-zero line boundary.
    CodeBlock { function: Option<String> },
    /// Code cut mid-block because `max_chunk_size` was exceeded.
    CodeBlockForced { function: Option<String> },
    /// Paragraphs packed from plain text.
    TextBlock,
}

impl ChunkKind {
    /// Stable snake_case tag, matching the serialized `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            ChunkKind::Section { .. } => "section",
            ChunkKind::PartialSection { .. } => "partial_section",
            ChunkKind::SentenceGroup => "sentence_group",
            ChunkKind::WordGroup => "word_group",
            ChunkKind::CodeBlock { .. } => "code_block",
            ChunkKind::CodeBlockForced { .. } => "code_block_forced",
            ChunkKind::TextBlock => "text_block",
        }
    }

    /// Markdown header this chunk belongs to, if any.
    pub fn header(&self) -> Option<&str> {
        match self {
            ChunkKind::Section { header } | ChunkKind::PartialSection { header } => {
                header.as_deref()
            }
            _ => None,
        }
    }

    /// Function or type name that opens this code chunk, if any.
    pub fn function(&self) -> Option<&str> {
        match self {
            ChunkKind::CodeBlock { function } | ChunkKind::CodeBlockForced { function } => {
                function.as_deref()
            }
            _ => None,
        }
    }
}

/// Per-chunk metadata attached during post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Length of `content` in characters.
    pub length: usize,
    pub word_count: usize,
    /// Words copied from the previous chunk's tail (0 when no overlap).
    pub overlap_words: usize,
    pub content_type: ContentType,
    /// Advisory language guess for code chunks.
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chunk as produced by the chunker, before it belongs to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDraft {
    /// Deterministic id derived from the chunk index and a content prefix.
    pub id: String,
    pub content: String,
    pub kind: ChunkKind,
    pub chunk_index: usize,
    /// Byte offset of the chunk body in the normalized text (overlap excluded).
    pub start: usize,
    pub end: usize,
    pub metadata: ChunkMetadata,
}

/// A stored chunk of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub kind: ChunkKind,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Attach a chunker draft to its owning document.
    ///
    /// The stored id also folds in the document id so identical openings in
    /// two files never collide on the primary key.
    pub fn from_draft(document_id: &str, draft: ChunkDraft) -> Self {
        Chunk {
            id: sha256_hex(format!("{}:{}", document_id, draft.id).as_bytes())[..32].to_string(),
            document_id: document_id.to_string(),
            content: draft.content,
            kind: draft.kind,
            chunk_index: draft.chunk_index,
            start: draft.start,
            end: draft.end,
            metadata: draft.metadata,
        }
    }
}

/// Descriptive metadata captured when a document is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub extension: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub preview: String,
}

/// One ingested file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub content_type: ContentType,
    pub size_bytes: u64,
    pub content_hash: String,
    pub metadata: DocumentMetadata,
    pub indexed_at: DateTime<Utc>,
    pub chunk_count: usize,
}

/// Tag recording how a vector was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingMethod {
    #[serde(rename = "tfidf")]
    TfIdf,
    #[serde(rename = "tfidf_enhanced")]
    TfIdfEnhanced,
}

impl EmbeddingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingMethod::TfIdf => "tfidf",
            EmbeddingMethod::TfIdfEnhanced => "tfidf_enhanced",
        }
    }
}

impl FromStr for EmbeddingMethod {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tfidf" => Ok(EmbeddingMethod::TfIdf),
            "tfidf_enhanced" => Ok(EmbeddingMethod::TfIdfEnhanced),
            other => Err(IndexError::StorageReadFailed(format!(
                "unknown embedding method '{}'",
                other
            ))),
        }
    }
}

/// A chunk's vector, tied to the vocabulary epoch that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub magnitude: f32,
    pub dimensions: usize,
    pub method: EmbeddingMethod,
    pub non_zero_count: usize,
    pub vocabulary_epoch: String,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Stable document id for a path: independent of the file's content.
pub fn document_id_for_path(path: &str) -> String {
    format!("doc_{}", &sha256_hex(path.as_bytes())[..16])
}

/// Deterministic chunk id from its index and the start of its content.
pub fn chunk_id(chunk_index: usize, content: &str) -> String {
    let prefix: String = content.chars().take(CHUNK_ID_PREFIX_CHARS).collect();
    let digest = sha256_hex(format!("{}:{}", chunk_index, prefix).as_bytes());
    format!("chunk_{}", &digest[..16])
}

/// First [`PREVIEW_CHARS`] characters of `text` with whitespace collapsed.
pub fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_path_derived() {
        let a = document_id_for_path("/notes/a.md");
        assert_eq!(a, document_id_for_path("/notes/a.md"));
        assert_ne!(a, document_id_for_path("/notes/b.md"));
        assert!(a.starts_with("doc_"));
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn test_chunk_id_deterministic() {
        assert_eq!(chunk_id(0, "hello world"), chunk_id(0, "hello world"));
        assert_ne!(chunk_id(0, "hello world"), chunk_id(1, "hello world"));
    }

    #[test]
    fn test_stored_chunk_ids_differ_across_documents() {
        let draft = ChunkDraft {
            id: chunk_id(0, "same opening"),
            content: "same opening".to_string(),
            kind: ChunkKind::TextBlock,
            chunk_index: 0,
            start: 0,
            end: 12,
            metadata: ChunkMetadata {
                length: 12,
                word_count: 2,
                overlap_words: 0,
                content_type: ContentType::Text,
                language: None,
                created_at: Utc::now(),
            },
        };
        let a = Chunk::from_draft("doc_a", draft.clone());
        let b = Chunk::from_draft("doc_b", draft);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_content_type_roundtrip_and_extension() {
        for ct in [ContentType::Text, ContentType::Markdown, ContentType::Code] {
            assert_eq!(ct.as_str().parse::<ContentType>().unwrap(), ct);
        }
        assert_eq!(ContentType::from_extension("MD"), Some(ContentType::Markdown));
        assert_eq!(ContentType::from_extension("rs"), Some(ContentType::Code));
        assert_eq!(ContentType::from_extension("yaml"), None);
        assert!("pdf".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_chunk_kind_serializes_as_tagged() {
        let kind = ChunkKind::Section {
            header: Some("Intro".to_string()),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "section");
        assert_eq!(json["header"], "Intro");
        assert_eq!(kind.tag(), "section");
        assert_eq!(kind.header(), Some("Intro"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "word ".repeat(100);
        assert_eq!(preview(&long).chars().count(), 200);
        assert_eq!(preview("a\n\nb"), "a b");
    }
}
