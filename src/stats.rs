//! Index statistics.
//!
//! `docidx stats` prints document, chunk and embedding counts, the active
//! vocabulary, and a per-content-type breakdown. Embeddings left over from
//! an older vocabulary are counted so the user knows when to `rebuild`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use docindex_core::models::Document;
use docindex_core::store::{DocumentFilter, Store};

use crate::config::Config;
use crate::ingest;

/// Per-content-type document and chunk counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeStats {
    pub content_type: String,
    pub documents: usize,
    pub chunks: usize,
    pub bytes: u64,
}

/// Group documents by content type, largest group first.
pub fn breakdown(documents: &[Document]) -> Vec<TypeStats> {
    let mut groups: BTreeMap<&'static str, TypeStats> = BTreeMap::new();
    for doc in documents {
        let key = doc.content_type.as_str();
        let entry = groups.entry(key).or_insert_with(|| TypeStats {
            content_type: key.to_string(),
            documents: 0,
            chunks: 0,
            bytes: 0,
        });
        entry.documents += 1;
        entry.chunks += doc.chunk_count;
        entry.bytes += doc.size_bytes;
    }
    let mut out: Vec<TypeStats> = groups.into_values().collect();
    out.sort_by(|a, b| b.documents.cmp(&a.documents));
    out
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let indexer = ingest::open_indexer(config).await?;
    let store = indexer.store();

    let stats = store.stats().await?;
    let vocabulary = store.get_vocabulary().await?;
    let documents = store.find_documents(&DocumentFilter::default()).await?;
    let stale = match &vocabulary {
        Some(v) => store.count_stale(&v.epoch).await?,
        None => 0,
    };

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docidx index stats");
    println!("==================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {} ({})", stats.documents, format_bytes(stats.total_bytes));
    println!(
        "  Chunks:      {} ({:.1} per document)",
        stats.chunks, stats.avg_chunks_per_document
    );
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.embeddings,
        stats.chunks,
        if stats.chunks > 0 {
            (stats.embeddings * 100) / stats.chunks
        } else {
            0
        }
    );
    match &vocabulary {
        Some(v) => {
            println!(
                "  Vocabulary:  {} terms over {} chunks, built {}",
                v.size(),
                v.document_count,
                format_relative(v.created_at)
            );
            println!("  Epoch:       {}", v.epoch);
        }
        None => println!("  Vocabulary:  none"),
    }
    if stale > 0 {
        println!(
            "  Stale:       {} embeddings from an older vocabulary (run `docidx rebuild`)",
            stale
        );
    }

    let groups = breakdown(&documents);
    if !groups.is_empty() {
        println!();
        println!("  By content type:");
        println!("  {:<12} {:>6} {:>8} {:>10}", "TYPE", "DOCS", "CHUNKS", "SIZE");
        println!("  {}", "-".repeat(40));
        for g in &groups {
            println!(
                "  {:<12} {:>6} {:>8} {:>10}",
                g.content_type,
                g.documents,
                g.chunks,
                format_bytes(g.bytes)
            );
        }
    }
    println!();

    indexer.store().pool().close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_relative(at: DateTime<Utc>) -> String {
    let delta = (Utc::now() - at).num_seconds();
    if delta < 0 {
        return at.format("%Y-%m-%d %H:%M").to_string();
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docindex_core::models::{ContentType, DocumentMetadata};

    fn doc(id: &str, content_type: ContentType, chunks: usize, size: u64) -> Document {
        Document {
            id: id.to_string(),
            filename: format!("{}.x", id),
            path: format!("/tmp/{}.x", id),
            content_type,
            size_bytes: size,
            content_hash: String::new(),
            metadata: DocumentMetadata {
                extension: None,
                modified_at: None,
                preview: String::new(),
            },
            indexed_at: Utc::now(),
            chunk_count: chunks,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_relative() {
        assert_eq!(format_relative(Utc::now()), "just now");
        assert_eq!(format_relative(Utc::now() - Duration::hours(1)), "1 hour ago");
        assert_eq!(format_relative(Utc::now() - Duration::days(3)), "3 days ago");
    }

    #[test]
    fn test_breakdown_groups_by_type() {
        let docs = vec![
            doc("a", ContentType::Markdown, 3, 100),
            doc("b", ContentType::Code, 5, 200),
            doc("c", ContentType::Markdown, 2, 50),
        ];
        let groups = breakdown(&docs);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[0],
            TypeStats {
                content_type: "markdown".to_string(),
                documents: 2,
                chunks: 5,
                bytes: 150,
            }
        );
        assert_eq!(groups[1].content_type, "code");
    }
}
