//! Ranked chunk output for `docidx search`.

use anyhow::Result;

use docindex_core::search::{SearchHit, SearchOptions};

use crate::config::Config;
use crate::ingest;

/// Command-line overrides for `docidx search`.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub skip_stale: bool,
}

impl SearchArgs {
    pub fn options(&self, config: &Config) -> SearchOptions {
        SearchOptions {
            top_k: self.top_k.unwrap_or(config.search.top_k),
            min_similarity: self.min_similarity.unwrap_or(config.search.min_similarity),
            skip_stale: self.skip_stale || config.search.skip_stale,
        }
    }
}

pub async fn run_search(config: &Config, query: &str, args: &SearchArgs) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let indexer = ingest::open_indexer(config).await?;
    let hits = indexer.search(query, &args.options(config)).await;
    indexer.store().pool().close().await;
    let hits = hits?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit);
    }
    Ok(())
}

fn print_hit(rank: usize, hit: &SearchHit) {
    let label = match (hit.chunk.kind.header(), hit.chunk.kind.function()) {
        (Some(header), _) => format!(" § {}", header),
        (None, Some(function)) => format!(" fn {}", function),
        _ => String::new(),
    };
    println!(
        "{}. [{:.3}] {}{}",
        rank, hit.similarity, hit.document.filename, label
    );
    println!("    path: {}", hit.document.path);
    println!(
        "    chunk: {} ({})",
        hit.chunk.chunk_index,
        hit.chunk.kind.tag()
    );
    println!("    excerpt: \"{}\"", excerpt(&hit.chunk.content, 160));
    println!("    id: {}", hit.document.id);
    println!();
}

/// First `max_chars` characters on one line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\n  b\tc", 10), "a b c");
        assert_eq!(excerpt("héllo wörld", 5), "héllo…");
    }

    #[test]
    fn test_args_override_config() {
        let config = Config::default();
        let opts = SearchArgs {
            top_k: Some(3),
            min_similarity: None,
            skip_stale: true,
        }
        .options(&config);
        assert_eq!(opts.top_k, 3);
        assert!((opts.min_similarity - 0.1).abs() < 1e-6);
        assert!(opts.skip_stale);
    }
}
