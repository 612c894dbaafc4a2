//! TF‑IDF vectorization, cosine similarity, and BLOB helpers.
//!
//! Vectors are positional against a [`Vocabulary`]: `v[index(term)] =
//! tf(term) * idf(term)` where `tf` is the term count over the chunk's total
//! token count (stop words and short tokens included in the denominator).
//!
//! The enhanced method appends a fixed block of [`FEATURE_COUNT`] structural
//! features. Its vectors are longer than plain ones, so mixing the two in
//! one comparison fails with [`IndexError::DimensionMismatch`].

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::models::{Chunk, ContentType, Embedding, EmbeddingMethod};
use crate::vocabulary::Vocabulary;

/// Hard ceiling on vocabulary size regardless of configuration.
pub const MAX_VOCABULARY_TERMS: usize = 10_000;

/// Width of the structural feature block used by the enhanced method.
pub const FEATURE_COUNT: usize = 15;

/// Fixed English stop-word set.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "if", "in", "into", "is", "it", "its", "itself",
    "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on",
    "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercase, turn non-word characters into separators, split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Whether a token may enter the vocabulary.
pub fn is_qualifying(token: &str) -> bool {
    token.chars().count() > 2 && !STOP_WORDS.contains(&token)
}

/// Tokens of `text` that may enter the vocabulary, in order, with repeats.
pub fn qualifying_terms(text: &str) -> impl Iterator<Item = String> {
    tokenize(text).into_iter().filter(|t| is_qualifying(t))
}

/// Vectorization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingOptions {
    /// Requested vocabulary size; clamped to [`MAX_VOCABULARY_TERMS`].
    pub dimensions: usize,
    /// L2-normalize vectors.
    pub normalize: bool,
    /// Append the structural feature block.
    pub enhanced: bool,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            dimensions: 300,
            normalize: true,
            enhanced: false,
        }
    }
}

impl EmbeddingOptions {
    /// The vocabulary cap actually applied.
    pub fn max_terms(&self) -> usize {
        self.dimensions.min(MAX_VOCABULARY_TERMS)
    }

    pub fn method(&self) -> EmbeddingMethod {
        if self.enhanced {
            EmbeddingMethod::TfIdfEnhanced
        } else {
            EmbeddingMethod::TfIdf
        }
    }
}

/// Turns text into vectors against a vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Embedder {
    options: EmbeddingOptions,
}

impl Embedder {
    pub fn new(options: EmbeddingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EmbeddingOptions {
        &self.options
    }

    /// Build a vocabulary over chunk texts using this embedder's cap.
    pub fn build_vocabulary<I, S>(&self, texts: I) -> Vocabulary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Vocabulary::build(texts, self.options.max_terms())
    }

    /// Plain TF‑IDF vector of length `vocab.size()`.
    pub fn embed(&self, vocab: &Vocabulary, text: &str) -> Vec<f32> {
        let mut vector = tfidf(vocab, text);
        if self.options.normalize {
            l2_normalize(&mut vector);
        }
        vector
    }

    /// TF‑IDF vector followed by the [`FEATURE_COUNT`] feature block,
    /// normalized together.
    pub fn embed_enhanced(
        &self,
        vocab: &Vocabulary,
        text: &str,
        content_type: ContentType,
    ) -> Vec<f32> {
        let mut vector = tfidf(vocab, text);
        vector.extend_from_slice(&structural_features(text, content_type));
        if self.options.normalize {
            l2_normalize(&mut vector);
        }
        vector
    }

    /// Embed a query with the configured method. Never builds a vocabulary.
    pub fn embed_query(&self, vocab: Option<&Vocabulary>, query: &str) -> Result<Vec<f32>> {
        let vocab = vocab.ok_or(IndexError::VocabularyNotLoaded)?;
        Ok(if self.options.enhanced {
            self.embed_enhanced(vocab, query, ContentType::Text)
        } else {
            self.embed(vocab, query)
        })
    }

    /// Embed a stored chunk and stamp it with the vocabulary epoch.
    pub fn embed_chunk(&self, vocab: &Vocabulary, chunk: &Chunk) -> Embedding {
        let vector = if self.options.enhanced {
            self.embed_enhanced(vocab, &chunk.content, chunk.metadata.content_type)
        } else {
            self.embed(vocab, &chunk.content)
        };
        Embedding {
            chunk_id: chunk.id.clone(),
            magnitude: magnitude(&vector),
            dimensions: vector.len(),
            non_zero_count: vector.iter().filter(|v| **v != 0.0).count(),
            method: self.options.method(),
            vocabulary_epoch: vocab.epoch.clone(),
            created_at: Utc::now(),
            vector,
        }
    }
}

fn tfidf(vocab: &Vocabulary, text: &str) -> Vec<f32> {
    let tokens = tokenize(text);
    let mut vector = vec![0.0f32; vocab.size()];
    if tokens.is_empty() {
        return vector;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens.iter().filter(|t| is_qualifying(t)) {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let total = tokens.len() as f32;
    for (term, count) in counts {
        if let Some(index) = vocab.index_of(term) {
            vector[index] = (count as f32 / total) * vocab.terms()[index].idf;
        }
    }
    vector
}

/// Length, structure, and content-type signals, each roughly in `[0, 1]`.
fn structural_features(text: &str, content_type: ContentType) -> [f32; FEATURE_COUNT] {
    let chars = text.chars().count().max(1) as f32;
    let tokens = tokenize(text);
    let words = tokens.len() as f32;
    let lines: Vec<&str> = text.lines().collect();
    let unique: HashSet<&String> = tokens.iter().collect();
    let ratio = |pred: fn(&char) -> bool| text.chars().filter(pred).count() as f32 / chars;
    let any_line = |pred: &dyn Fn(&str) -> bool| {
        if lines.iter().any(|l| pred(l.trim_start())) {
            1.0
        } else {
            0.0
        }
    };
    let avg_word = if tokens.is_empty() {
        0.0
    } else {
        tokens.iter().map(|t| t.chars().count()).sum::<usize>() as f32 / words
    };
    let one_hot = |ct: ContentType| if content_type == ct { 1.0 } else { 0.0 };

    [
        (chars.ln_1p() / 10.0).min(1.0),
        (words.ln_1p() / 8.0).min(1.0),
        (avg_word / 12.0).min(1.0),
        ((lines.len() as f32).ln_1p() / 6.0).min(1.0),
        ratio(char::is_ascii_uppercase),
        ratio(char::is_ascii_digit),
        ratio(char::is_ascii_punctuation),
        ratio(|c| c.is_whitespace()),
        any_line(&|l| l.starts_with('#')),
        any_line(&|l| l.starts_with("```") || l.starts_with("~~~")),
        any_line(&|l| l.starts_with("- ") || l.starts_with("* ")),
        if words > 0.0 { unique.len() as f32 / words } else { 0.0 },
        one_hot(ContentType::Text),
        one_hot(ContentType::Markdown),
        one_hot(ContentType::Code),
    ]
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = magnitude(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value clamped to `[-1.0, 1.0]`, or `0.0` when either vector is
/// all-zero. Vectors of different length are an error, never a silent zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docindex_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
