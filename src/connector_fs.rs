//! Filesystem discovery.
//!
//! Walks a directory for files whose extension is on [`SUPPORTED_EXTENSIONS`],
//! skipping hidden directories and common dependency/build output. Results
//! are sorted so a batch always processes files in the same order.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File extensions the indexer accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "text", "rst", "rs", "py", "js", "jsx", "ts", "tsx", "go", "java",
    "c", "h", "cpp", "hpp", "cs", "rb", "php", "swift", "kt", "scala", "sh", "sql", "html", "css",
    "json", "yaml", "yml", "toml", "xml", "ini", "cfg",
];

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "__pycache__",
    "venv",
    "dist",
    "build",
];

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub recursive: bool,
    pub max_files: usize,
    /// Matched against the file name only.
    pub pattern: Option<Regex>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            max_files: 1000,
            pattern: None,
        }
    }
}

pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

pub fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// List indexable files under `root`, sorted, capped at `max_files`.
pub fn discover_files(root: &Path, opts: &DiscoveryOptions) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Directory does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let mut walker = WalkDir::new(root).follow_links(false);
    if !opts.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !is_skipped_dir(e)) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_supported(path) {
            continue;
        }
        if let Some(re) = &opts.pattern {
            let name = entry.file_name().to_string_lossy();
            if !re.is_match(&name) {
                continue;
            }
        }
        files.push(path.to_path_buf());
    }

    // Sort before capping so the cap is deterministic too.
    files.sort();
    if files.len() > opts.max_files {
        tracing::warn!(
            found = files.len(),
            max_files = opts.max_files,
            "file limit reached, ignoring the rest"
        );
        files.truncate(opts.max_files);
    }
    Ok(files)
}
