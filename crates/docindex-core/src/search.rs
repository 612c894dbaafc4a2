//! Similarity search over stored embeddings.
//!
//! The search algorithm operates entirely through the [`Store`] trait. The
//! caller supplies the active [`Vocabulary`] and an [`Embedder`] configured
//! the same way the stored vectors were produced.
//!
//! # Algorithm
//!
//! 1. Embed the query against the vocabulary.
//! 2. Fetch every stored embedding with its chunk.
//! 3. Reject (or, with `skip_stale`, skip) embeddings from another epoch.
//! 4. Score by cosine similarity, drop scores below `min_similarity`.
//! 5. Stable sort descending, truncate to `top_k`.
//! 6. Attach each hit's parent document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{IndexError, Result};
use crate::models::{Chunk, Document};
use crate::store::Store;
use crate::vocabulary::Vocabulary;

/// Query-time parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_similarity: f32,
    /// Skip embeddings from an older vocabulary instead of failing.
    pub skip_stale: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_similarity: 0.1,
            skip_stale: false,
        }
    }
}

/// One scored candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub similarity: f32,
}

/// A search result: the matching chunk and its document.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub similarity: f32,
    pub chunk: Chunk,
    pub document: Document,
}

/// Score `candidates` against `query` and keep the best `top_k` whose
/// similarity is at least `min_similarity`. Ties keep input order.
pub fn rank<'a, T, I>(
    query: &[f32],
    candidates: I,
    top_k: usize,
    min_similarity: f32,
) -> Result<Vec<Ranked<T>>>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
{
    let mut ranked = Vec::new();
    for (item, vector) in candidates {
        let similarity = cosine_similarity(query, vector)?;
        if similarity >= min_similarity {
            ranked.push(Ranked { item, similarity });
        }
    }
    ranked.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);
    Ok(ranked)
}

/// Run a query against `store` using the active `vocab`.
pub async fn search<S: Store + ?Sized>(
    store: &S,
    vocab: &Vocabulary,
    embedder: &Embedder,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() || opts.top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed_query(Some(vocab), query)?;
    let records = store.all_embeddings().await?;
    let total = records.len();

    let mut current = Vec::with_capacity(total);
    let mut stale = 0usize;
    for record in records {
        if record.embedding.vocabulary_epoch != vocab.epoch {
            if opts.skip_stale {
                stale += 1;
                continue;
            }
            return Err(IndexError::EpochMismatch {
                active: vocab.epoch.clone(),
                found: record.embedding.vocabulary_epoch,
            });
        }
        current.push(record);
    }
    if stale > 0 {
        warn!(
            stale,
            "skipped embeddings from an older vocabulary; run `docidx rebuild`"
        );
    }

    let ranked = rank(
        &query_vec,
        current
            .iter()
            .map(|r| (&r.chunk, r.embedding.vector.as_slice())),
        opts.top_k,
        opts.min_similarity,
    )?;

    let mut documents: HashMap<String, Option<Document>> = HashMap::new();
    let mut hits = Vec::with_capacity(ranked.len());
    for Ranked { item: chunk, similarity } in ranked {
        if !documents.contains_key(&chunk.document_id) {
            let doc = store.get_document(&chunk.document_id).await?;
            documents.insert(chunk.document_id.clone(), doc);
        }
        let Some(Some(document)) = documents.get(&chunk.document_id) else {
            continue;
        };
        hits.push(SearchHit {
            similarity,
            chunk: chunk.clone(),
            document: document.clone(),
        });
    }

    debug!(
        query,
        candidates = total,
        stale,
        hits = hits.len(),
        "search complete"
    );
    Ok(hits)
}
