//! # docindex CLI (`docidx`)
//!
//! Indexes local files into SQLite and answers TF‑IDF similarity queries.
//!
//! ## Usage
//!
//! ```bash
//! docidx --config ./config/docidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docidx init` | Create the SQLite database and schema |
//! | `docidx index <path>` | Index a file or a directory tree |
//! | `docidx search "<query>"` | Rank stored chunks against a query |
//! | `docidx list` | List indexed documents |
//! | `docidx delete <id>` | Remove a document with its chunks and embeddings |
//! | `docidx rebuild` | Re-embed every chunk under one fresh vocabulary |
//! | `docidx stats` | Counts, vocabulary, per-type breakdown |
//! | `docidx export` | Write a JSON snapshot of the index |
//!
//! ## Examples
//!
//! ```bash
//! # Index only markdown, at most 200 files
//! docidx index ./docs --pattern '\.md$' --max-files 200
//!
//! # Re-index even if nothing changed
//! docidx index ./docs --force
//!
//! # Top 5 results, ignoring embeddings from an older vocabulary
//! docidx search "ownership rules" --top-k 5 --skip-stale
//! ```
//!
//! Logs go to stderr (`RUST_LOG` or `--verbose`); results go to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use docindex_core::models::ContentType;
use docindex_core::IndexError;
use docindex::{config, documents, export, ingest, migrate, search, stats};

/// Local document indexing and TF‑IDF retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means defaults.
#[derive(Parser)]
#[command(
    name = "docidx",
    about = "docindex: local document indexing and TF-IDF retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docidx.toml")]
    config: PathBuf,

    /// Debug-level logging on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index a file or every supported file under a directory.
    ///
    /// Files whose content hash is unchanged are skipped unless `--force`.
    /// A directory is indexed as one batch sharing a single vocabulary.
    Index {
        path: PathBuf,

        /// Re-index unchanged files.
        #[arg(long)]
        force: bool,

        /// Only the top level of the directory.
        #[arg(long)]
        no_recursive: bool,

        /// Maximum number of files to index.
        #[arg(long)]
        max_files: Option<usize>,

        /// Regex matched against each file name.
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Search indexed chunks.
    Search {
        query: String,

        /// Number of results.
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum cosine similarity.
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Skip embeddings built with an older vocabulary.
        #[arg(long)]
        skip_stale: bool,
    },

    /// List indexed documents, most recent first.
    List {
        /// markdown, text, or code.
        #[arg(long)]
        content_type: Option<ContentType>,

        /// Case-insensitive filename substring.
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete a document by id.
    Delete { id: String },

    /// Rebuild the vocabulary over all stored chunks and re-embed them.
    Rebuild,

    /// Show index statistics.
    Stats,

    /// Export the index as JSON.
    Export {
        /// Output directory (defaults to `[export].dir`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Commands after which an on-close export is taken.
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Index { .. } | Commands::Delete { .. } | Commands::Rebuild
        )
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<IndexError>() {
            // Usage problems get the bare message and a distinct exit code.
            Some(e) if e.is_user_facing() => {
                eprintln!("Error: {}", e);
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {:?}", err);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;
    let export_on_close = cfg.export.on_close && cli.command.mutates();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            path,
            force,
            no_recursive,
            max_files,
            pattern,
        } => {
            let args = ingest::IndexArgs {
                force,
                no_recursive,
                max_files,
                pattern,
            };
            ingest::run_index(&cfg, &path, &args).await?;
        }
        Commands::Search {
            query,
            top_k,
            min_similarity,
            skip_stale,
        } => {
            let args = search::SearchArgs {
                top_k,
                min_similarity,
                skip_stale,
            };
            search::run_search(&cfg, &query, &args).await?;
        }
        Commands::List {
            content_type,
            name,
            limit,
        } => {
            documents::run_list(&cfg, content_type, name, limit).await?;
        }
        Commands::Delete { id } => {
            documents::run_delete(&cfg, &id).await?;
        }
        Commands::Rebuild => {
            ingest::run_rebuild(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { dir } => {
            export::run_export(&cfg, dir.as_deref()).await?;
        }
    }

    if export_on_close {
        export::export_configured(&cfg, None).await?;
    }

    Ok(())
}
