//! Error kinds surfaced by chunking, embedding, storage, and indexing.
//!
//! Library code returns [`Result<T>`](Result) with an [`IndexError`]; the
//! application layer wraps these in `anyhow` where it adds context.

use thiserror::Error;

/// Every failure the indexing and retrieval pipeline can report.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The file extension is not on the ingestion allow-list.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The input contained no text after trimming.
    #[error("empty content: {0}")]
    EmptyContent(String),

    /// Chunking produced nothing that survived the minimum size filter.
    #[error("no chunks generated for {0}")]
    NoChunksGenerated(String),

    /// A query was issued before any vocabulary was built or persisted.
    #[error("vocabulary not loaded: index at least one document before searching")]
    VocabularyNotLoaded,

    /// Two vectors of different length were compared.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// A stored embedding was built under a different vocabulary epoch.
    #[error("vocabulary epoch mismatch: active {active}, embedding {found}")]
    EpochMismatch { active: String, found: String },

    /// A write to the store failed.
    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    /// A read from the store failed.
    #[error("storage read failed: {0}")]
    StorageReadFailed(String),

    /// The file could not be read (missing, permissions, not UTF-8).
    #[error("failed to read {path}: {reason}")]
    FileReadFailed { path: String, reason: String },

    /// Options failed validation. This is a caller bug, not a data problem.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl IndexError {
    /// Errors the caller can only resolve by changing what it does
    /// (index something first, stop mixing epochs, fix options).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            IndexError::VocabularyNotLoaded
                | IndexError::DimensionMismatch { .. }
                | IndexError::EpochMismatch { .. }
                | IndexError::InvalidOptions(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = IndexError::DimensionMismatch {
            left: 300,
            right: 315,
        };
        assert_eq!(err.to_string(), "dimension mismatch: 300 vs 315");
    }

    #[test]
    fn test_file_read_failed_display() {
        let err = IndexError::FileReadFailed {
            path: "notes/a.md".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read notes/a.md: permission denied"
        );
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(IndexError::VocabularyNotLoaded.is_user_facing());
        assert!(IndexError::EpochMismatch {
            active: "a".into(),
            found: "b".into()
        }
        .is_user_facing());
        assert!(!IndexError::StorageWriteFailed("disk full".into()).is_user_facing());
        assert!(!IndexError::EmptyContent("x".into()).is_user_facing());
    }
}
