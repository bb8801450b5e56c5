//! Error types for fixture handling and scoring.

use thiserror::Error;

/// Convenient result alias used across the harness crate.
pub type Result<T> = anyhow::Result<T>;

/// Errors raised while preparing fixtures or scoring engines.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// An archive did not hash to its pinned digest.
    #[error("checksum mismatch for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Fixture whose archive was checked.
        name: String,
        /// The pinned MD5 digest.
        expected: String,
        /// Digest the archive actually hashed to.
        actual: String,
    },

    /// No fixture cache location could be determined.
    #[error("no cache directory: set CALIPER_CACHE_DIR or HOME")]
    NoCacheDir,

    /// An engine run did not produce the tensor to score.
    #[error("engine output '{0}' is missing")]
    MissingOutput(String),

    /// Scoring was asked to run over zero batches.
    #[error("evaluation requires at least one batch")]
    NoBatches,

    /// A scored output had a different row count than the batch had labels.
    #[error("got {predictions} predictions for {labels} labels")]
    LabelCount {
        /// Rows in the scored output.
        predictions: usize,
        /// Labels in the batch.
        labels: usize,
    },

    /// Batches must hold at least one sample.
    #[error("batch size must be positive")]
    EmptyBatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = HarnessError::ChecksumMismatch {
            name: "mnist_model".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "checksum mismatch for 'mnist_model': expected aa, got bb"
        );

        let error = HarnessError::MissingOutput("probabilities".to_string());
        assert!(error.to_string().contains("probabilities"));

        let error = HarnessError::LabelCount {
            predictions: 8,
            labels: 10,
        };
        assert_eq!(error.to_string(), "got 8 predictions for 10 labels");
    }
}
