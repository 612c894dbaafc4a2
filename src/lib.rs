//! # docindex
//!
//! Local document indexing and TF‑IDF retrieval.
//!
//! Files are discovered on disk, split into structure-aware chunks,
//! embedded against a corpus vocabulary, and stored in SQLite. Queries are
//! embedded with the same vocabulary and ranked by cosine similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ connector_fs │──▶│ ingest::Indexer  │──▶│ SqliteStore  │
//! │ walk + filter│   │ chunk + TF-IDF   │   │ WAL, cascade │
//! └──────────────┘   └────────┬─────────┘   └──────┬───────┘
//!                             │                    │
//!                             ▼                    ▼
//!                      ┌────────────┐       ┌────────────┐
//!                      │ CLI docidx │       │ JSON export│
//!                      └────────────┘       └────────────┘
//! ```
//!
//! The storage-agnostic pieces (chunker, embedder, vocabulary, ranking,
//! the `Store` trait) live in the `docindex-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! docidx init                          # create database
//! docidx index ./docs                  # index a directory
//! docidx search "borrow checker"       # ranked chunks
//! docidx rebuild                       # one vocabulary over everything
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Filesystem discovery |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`ingest`] | Indexer orchestration |
//! | [`search`] | `docidx search` output |
//! | [`documents`] | `docidx list` / `docidx delete` |
//! | [`stats`] | `docidx stats` |
//! | [`export`] | JSON snapshots |

pub mod config;
pub mod connector_fs;
pub mod db;
pub mod documents;
pub mod export;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod stats;
