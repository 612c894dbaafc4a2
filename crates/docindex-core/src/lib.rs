//! # docindex core
//!
//! Runtime-agnostic logic for docindex: data models, content-aware
//! chunking, the TF‑IDF vocabulary and embedder, the store abstraction,
//! and the search algorithm.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. The `docindex` app crate supplies the SQLite
//! store, file discovery, and the indexing orchestrator.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod search;
pub mod store;
pub mod vocabulary;

pub use error::{IndexError, Result};
