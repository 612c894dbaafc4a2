//! Document listing and deletion (`docidx list`, `docidx delete`).

use anyhow::{bail, Result};

use docindex_core::models::{ContentType, Document};
use docindex_core::store::DocumentFilter;

use crate::config::Config;
use crate::ingest;

pub async fn run_list(
    config: &Config,
    content_type: Option<ContentType>,
    name: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let indexer = ingest::open_indexer(config).await?;
    let filter = DocumentFilter {
        content_type,
        filename_contains: name,
        limit,
    };
    let docs = indexer.list_documents(&filter).await;
    indexer.store().pool().close().await;
    let docs = docs?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<21} {:<9} {:>6} {:>10}  {:<16}  {}",
        "ID", "TYPE", "CHUNKS", "SIZE", "INDEXED", "PATH"
    );
    for doc in &docs {
        println!("{}", list_row(doc));
    }
    Ok(())
}

fn list_row(doc: &Document) -> String {
    format!(
        "{:<21} {:<9} {:>6} {:>10}  {:<16}  {}",
        doc.id,
        doc.content_type.as_str(),
        doc.chunk_count,
        crate::stats::format_bytes(doc.size_bytes),
        doc.indexed_at.format("%Y-%m-%d %H:%M"),
        doc.path
    )
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let indexer = ingest::open_indexer(config).await?;
    let deleted = indexer.delete_document(id).await;
    indexer.store().pool().close().await;

    if !deleted? {
        bail!("document not found: {}", id);
    }
    println!("Deleted {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docindex_core::models::DocumentMetadata;

    #[test]
    fn test_list_row() {
        let doc = Document {
            id: "doc_0123456789abcdef".to_string(),
            filename: "guide.md".to_string(),
            path: "/srv/docs/guide.md".to_string(),
            content_type: ContentType::Markdown,
            size_bytes: 2048,
            content_hash: String::new(),
            metadata: DocumentMetadata {
                extension: Some("md".to_string()),
                modified_at: None,
                preview: String::new(),
            },
            indexed_at: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            chunk_count: 4,
        };
        let row = list_row(&doc);
        assert!(row.starts_with("doc_0123456789abcdef  markdown"));
        assert!(row.contains("2.0 KB"));
        assert!(row.contains("2026-03-01 09:30"));
        assert!(row.ends_with("/srv/docs/guide.md"));
    }
}
