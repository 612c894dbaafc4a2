//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration. [`load_config`] validates once;
//! the rest of the application trusts the values it returns.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docindex_core::chunk::ChunkOptions;
use docindex_core::embedding::EmbeddingOptions;
use docindex_core::search::SearchOptions;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub chunking: ChunkOptions,
    pub embedding: EmbeddingOptions,
    pub indexing: IndexingConfig,
    pub search: SearchOptions,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/docidx.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexingConfig {
    pub recursive: bool,
    pub max_files: usize,
    /// Regex matched against each file name.
    pub pattern: Option<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_files: 1000,
            pattern: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    /// Defaults to an `exports` directory next to the database.
    pub dir: Option<PathBuf>,
    pub on_close: bool,
    pub after_batch: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: None,
            on_close: true,
            after_batch: false,
        }
    }
}

impl Config {
    pub fn export_dir(&self) -> PathBuf {
        match &self.export.dir {
            Some(dir) => dir.clone(),
            None => self
                .db
                .path
                .parent()
                .map(|p| p.join("exports"))
                .unwrap_or_else(|| PathBuf::from("exports")),
        }
    }
}

/// Read and validate `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    config
        .chunking
        .validate()
        .context("Invalid [chunking] section")?;

    if config.embedding.dimensions == 0 {
        bail!("embedding.dimensions must be > 0");
    }

    if config.search.top_k == 0 {
        bail!("search.top_k must be >= 1");
    }

    if !(-1.0..=1.0).contains(&config.search.min_similarity) {
        bail!("search.min_similarity must be in [-1.0, 1.0]");
    }

    if config.indexing.max_files == 0 {
        bail!("indexing.max_files must be >= 1");
    }

    if let Some(pattern) = &config.indexing.pattern {
        regex::Regex::new(pattern)
            .with_context(|| format!("indexing.pattern is not a valid regex: {}", pattern))?;
    }

    Ok(())
}
