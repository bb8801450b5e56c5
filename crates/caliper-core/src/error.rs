//! Error types for core operations.

/// Convenience alias used across the workspace.
pub type Result<T> = anyhow::Result<T>;

/// Classifiable failures produced by the core data model.
///
/// Most functions propagate `anyhow` errors; these variants exist where
/// callers (and tests) care about the category of failure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A graph violated a structural invariant.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Provided data does not match the declared shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Element count implied by the shape.
        expected: usize,
        /// Element count actually provided.
        actual: usize,
    },
}
