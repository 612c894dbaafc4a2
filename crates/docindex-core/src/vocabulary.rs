//! TF‑IDF vocabulary: term → dense index, with inverse document frequency.
//!
//! A vocabulary is built once over a batch of chunk texts and is immutable
//! afterwards. The chunk is the IDF unit: `document_count` is the number of
//! chunks the vocabulary was built from, and `idf = ln(N / df)`.
//!
//! When more qualifying terms exist than `max_terms`, the highest-IDF terms
//! survive (ties go to the term seen first) and keep their original
//! relative order, so dense indices stay stable across identical builds.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::qualifying_terms;

/// One vocabulary term with its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTerm {
    pub term: String,
    pub index: usize,
    pub idf: f32,
    pub document_frequency: usize,
}

/// An immutable term index shared by every embedding of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<VocabularyTerm>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    pub document_count: usize,
    pub max_terms: usize,
    /// Identifies this build; embeddings record it so vectors from
    /// different builds are never compared.
    pub epoch: String,
    pub created_at: DateTime<Utc>,
}

impl Vocabulary {
    /// Build over `texts` (one entry per chunk), capped at `max_terms`.
    pub fn build<I, S>(texts: I, max_terms: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut document_count = 0usize;

        for text in texts {
            document_count += 1;
            let mut seen: HashSet<String> = HashSet::new();
            for term in qualifying_terms(text.as_ref()) {
                if !seen.insert(term.clone()) {
                    continue;
                }
                match df.get_mut(&term) {
                    Some(count) => *count += 1,
                    None => {
                        df.insert(term.clone(), 1);
                        order.push(term);
                    }
                }
            }
        }

        let n = document_count.max(1) as f32;
        let mut terms: Vec<VocabularyTerm> = order
            .into_iter()
            .enumerate()
            .map(|(index, term)| {
                let document_frequency = df.get(&term).copied().unwrap_or(1);
                VocabularyTerm {
                    idf: (n / document_frequency as f32).ln(),
                    term,
                    index,
                    document_frequency,
                }
            })
            .collect();

        let total = terms.len();
        if total > max_terms {
            let mut ranked: Vec<usize> = (0..total).collect();
            // Stable sort: equal IDF keeps the earlier index first.
            ranked.sort_by(|&a, &b| {
                terms[b]
                    .idf
                    .partial_cmp(&terms[a].idf)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let keep: HashSet<usize> = ranked.into_iter().take(max_terms).collect();
            terms.retain(|t| keep.contains(&t.index));
            for (i, t) in terms.iter_mut().enumerate() {
                t.index = i;
            }
        }

        debug!(
            chunks = document_count,
            candidates = total,
            kept = terms.len(),
            max_terms,
            "built vocabulary"
        );

        Self::from_parts(
            terms,
            document_count,
            max_terms,
            uuid::Uuid::new_v4().to_string(),
            Utc::now(),
        )
    }

    /// Reassemble a persisted vocabulary. `terms` may arrive in any order.
    pub fn from_parts(
        mut terms: Vec<VocabularyTerm>,
        document_count: usize,
        max_terms: usize,
        epoch: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        terms.sort_by_key(|t| t.index);
        let index = terms
            .iter()
            .map(|t| (t.term.clone(), t.index))
            .collect();
        Self {
            terms,
            index,
            document_count,
            max_terms,
            epoch,
            created_at,
        }
    }

    /// Number of terms, which is also the plain TF‑IDF vector length.
    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        match self.index.get(term) {
            Some(i) => Some(*i),
            // Deserialized values skip the map; fall back to a scan.
            None if self.index.is_empty() => {
                self.terms.iter().find(|t| t.term == term).map(|t| t.index)
            }
            None => None,
        }
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.index_of(term).map(|i| self.terms[i].idf)
    }

    pub fn terms(&self) -> &[VocabularyTerm] {
        &self.terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_scenario() {
        let vocab = Vocabulary::build(["the cat sat", "the dog ran"], 300);
        let idf = vocab.idf("cat").unwrap();
        assert!((idf - 2f32.ln()).abs() < 1e-6);
        assert_eq!(vocab.idf("the"), None);
        assert_eq!(vocab.document_count, 2);
        assert_eq!(vocab.size(), 4);
    }

    #[test]
    fn test_short_tokens_excluded() {
        let vocab = Vocabulary::build(["an ox is big"], 300);
        assert_eq!(vocab.index_of("ox"), None);
        assert_eq!(vocab.index_of("big"), Some(0));
    }

    #[test]
    fn test_first_seen_order() {
        let vocab = Vocabulary::build(["zebra apple", "mango zebra"], 300);
        let terms: Vec<&str> = vocab.terms().iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["zebra", "apple", "mango"]);
        assert_eq!(vocab.terms()[0].document_frequency, 2);
    }

    #[test]
    fn test_pruning_keeps_highest_idf_in_original_order() {
        // "common" appears everywhere (idf 0); the rest appear once.
        let texts = ["common alpha", "common bravo", "common charlie"];
        let vocab = Vocabulary::build(texts, 2);
        let terms: Vec<&str> = vocab.terms().iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["alpha", "bravo"]);
        assert_eq!(vocab.index_of("bravo"), Some(1));
        assert_eq!(vocab.max_terms, 2);
    }

    #[test]
    fn test_epochs_differ_per_build() {
        let a = Vocabulary::build(["same text here"], 10);
        let b = Vocabulary::build(["same text here"], 10);
        assert_ne!(a.epoch, b.epoch);
        assert_eq!(a.terms(), b.terms());
    }

    #[test]
    fn test_from_parts_restores_lookup() {
        let built = Vocabulary::build(["gamma delta", "delta epsilon"], 10);
        let mut terms = built.terms().to_vec();
        terms.reverse();
        let restored = Vocabulary::from_parts(
            terms,
            built.document_count,
            built.max_terms,
            built.epoch.clone(),
            built.created_at,
        );
        assert_eq!(restored.index_of("epsilon"), built.index_of("epsilon"));
        assert_eq!(restored.terms(), built.terms());
    }
}
