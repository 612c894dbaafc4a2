//! Content-aware text chunker.
//!
//! Splits document text into [`ChunkDraft`]s whose size is bounded by a
//! [`ChunkOptions`] policy. The strategy depends on the content type:
//!
//! | Content | Strategy | Kinds produced |
//! |---------|----------|----------------|
//! | markdown | header sections, then paragraph → sentence → word | `section`, `partial_section`, `sentence_group`, `word_group` |
//! | code | line accumulation, cut at brace depth zero | `code_block`, `code_block_forced` |
//! | text | paragraph packing, then sentence → word; word overlap | `text_block`, `sentence_group`, `word_group` |
//!
//! # Algorithm
//!
//! 1. Normalize line endings, drop zero-width marker characters, collapse
//!    blank-line runs to a single blank line.
//! 2. Resolve the content type (explicit override or [`detect_content_type`]).
//! 3. Run the strategy. All pieces are contiguous slices of the normalized
//!    text, so headers, fenced blocks, and signatures are never cut inside.
//! 4. Drop pieces shorter than `min_chunk_size` characters.
//! 5. Plain text only: prefix each surviving chunk after the first with the
//!    trailing `overlap` words of its surviving predecessor.
//! 6. Attach metadata and number the chunks from 0.
//!
//! # Example
//!
//! ```rust
//! use docindex_core::chunk::{chunk_text, ChunkOptions};
//! use docindex_core::models::ContentType;
//!
//! let options = ChunkOptions {
//!     min_chunk_size: 1,
//!     ..ChunkOptions::default()
//! };
//! let chunks = chunk_text("# Title\n\nPara one.\n\n# Section 2\n\nPara two.", &options).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].kind.header(), Some("Section 2"));
//! assert_eq!(chunks[0].metadata.content_type, ContentType::Markdown);
//! ```

mod code;
mod markdown;
mod split;
mod text;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::models::{chunk_id, ChunkDraft, ChunkMetadata, ContentType};

/// Zero-width and byte-order-mark characters treated as invisible markers.
const MARKER_CHARS: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Line prefixes that suggest source code when sniffing content.
const CODE_PREFIXES: &[&str] = &[
    "fn ", "pub fn ", "pub struct ", "async fn ", "impl ", "use ", "def ", "class ", "import ",
    "from ", "function ", "const ", "let ", "var ", "func ", "package ", "#include", "public ",
    "private ", "export ", "return ",
];

/// Size and overlap policy for [`Chunker`].
///
/// Sizes are measured in characters; `overlap` is measured in words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Target chunk size.
    pub chunk_size: usize,
    /// Trailing words of the previous chunk prefixed to the next (plain text).
    pub overlap: usize,
    /// Chunks shorter than this are dropped.
    pub min_chunk_size: usize,
    /// Soft ceiling; code is force-cut past it, single oversized words are kept.
    pub max_chunk_size: usize,
    /// Skip sniffing and use this strategy.
    pub content_type: Option<ContentType>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            min_chunk_size: 100,
            max_chunk_size: 1000,
            content_type: None,
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IndexError::InvalidOptions(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(IndexError::InvalidOptions(format!(
                "min_chunk_size ({}) must be <= chunk_size ({})",
                self.min_chunk_size, self.chunk_size
            )));
        }
        if self.chunk_size > self.max_chunk_size {
            return Err(IndexError::InvalidOptions(format!(
                "chunk_size ({}) must be <= max_chunk_size ({})",
                self.chunk_size, self.max_chunk_size
            )));
        }
        if self.overlap >= self.chunk_size {
            return Err(IndexError::InvalidOptions(format!(
                "overlap ({}) must be < chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A validated chunking policy.
#[derive(Debug, Clone)]
pub struct Chunker {
    options: ChunkOptions,
}

impl Chunker {
    /// Validate `options` once; chunking itself cannot fail afterwards.
    pub fn new(options: ChunkOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ChunkOptions {
        &self.options
    }

    /// The content type [`chunk`](Chunker::chunk) would use for `text`.
    pub fn resolve_content_type(&self, text: &str) -> ContentType {
        self.options
            .content_type
            .unwrap_or_else(|| detect_content_type(text))
    }

    /// Chunk `text` using the configured override or sniffed content type.
    pub fn chunk(&self, text: &str) -> Vec<ChunkDraft> {
        self.chunk_as(text, self.resolve_content_type(text))
    }

    /// Chunk `text` with an explicit content type.
    pub fn chunk_as(&self, text: &str, content_type: ContentType) -> Vec<ChunkDraft> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let opts = &self.options;
        let pieces = match content_type {
            ContentType::Markdown => markdown::chunk_markdown(&normalized, opts.chunk_size),
            ContentType::Code => {
                code::chunk_code(&normalized, opts.chunk_size, opts.max_chunk_size)
            }
            ContentType::Text => text::chunk_plain(&normalized, opts.chunk_size),
        };

        // Minimum size applies to a piece's own text, before overlap.
        let generated = pieces.len();
        let pieces: Vec<_> = pieces
            .into_iter()
            .filter(|p| {
                strip_markers(&normalized[p.span.start..p.span.end])
                    .chars()
                    .count()
                    >= opts.min_chunk_size
            })
            .collect();

        let contents: Vec<(String, usize)> = match content_type {
            ContentType::Text => text::apply_overlap(&normalized, &pieces, opts.overlap),
            _ => pieces
                .iter()
                .map(|p| (normalized[p.span.start..p.span.end].to_string(), 0))
                .collect(),
        };

        let language = match content_type {
            ContentType::Code => code::detect_language(&normalized),
            _ => None,
        };

        let now = Utc::now();
        let mut drafts = Vec::with_capacity(generated);

        for (piece, (raw, overlap_words)) in pieces.into_iter().zip(contents) {
            let content = strip_markers(&raw);
            let length = content.chars().count();
            let chunk_index = drafts.len();
            drafts.push(ChunkDraft {
                id: chunk_id(chunk_index, &content),
                kind: piece.kind,
                chunk_index,
                start: piece.span.start,
                end: piece.span.end,
                metadata: ChunkMetadata {
                    length,
                    word_count: content.split_whitespace().count(),
                    overlap_words,
                    content_type,
                    language: language.clone(),
                    created_at: now,
                },
                content,
            });
        }

        debug!(
            content_type = content_type.as_str(),
            generated,
            kept = drafts.len(),
            "chunked text"
        );
        drafts
    }
}

/// Validate `options` and chunk `text` in one call.
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Result<Vec<ChunkDraft>> {
    Ok(Chunker::new(options.clone())?.chunk(text))
}

/// Guess the content type from markdown and code markers.
pub fn detect_content_type(text: &str) -> ContentType {
    let mut markdown_score = 0usize;
    let mut code_score = 0usize;

    for line in text.lines() {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        if markdown::header_text(t).is_some() {
            markdown_score += 2;
        }
        if split::is_fence(t) {
            markdown_score += 2;
        }
        if t.contains("](") {
            markdown_score += 1;
        }
        if CODE_PREFIXES.iter().any(|p| t.starts_with(p)) {
            code_score += 2;
        }
        if t.ends_with('{') || t.starts_with('}') {
            code_score += 1;
        }
        if t.ends_with(';') {
            code_score += 1;
        }
    }

    if code_score >= 3 && code_score > markdown_score {
        ContentType::Code
    } else if markdown_score > 0 {
        ContentType::Markdown
    } else {
        ContentType::Text
    }
}

/// Normalize line endings, drop marker characters, trim trailing
/// whitespace per line, and collapse runs of blank lines to one.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;

    for line in unified.split('\n') {
        let line = strip_markers(line);
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(line.trim_end());
    }
    out
}

fn strip_markers(text: &str) -> String {
    text.chars().filter(|c| !MARKER_CHARS.contains(c)).collect()
}
