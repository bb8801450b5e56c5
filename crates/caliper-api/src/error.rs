//! Error types for the high-level API.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = anyhow::Result<T>;

/// Errors raised by the model facade and the export verifier.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The verifier was asked to run without any input bound to a
    /// declared model input.
    #[error("no verification input bound for '{0}'")]
    UnboundInput(String),

    /// The verifier was configured with an empty opset list.
    #[error("no opset versions to verify")]
    NoOpsets,

    /// The two backends produced outputs of different sizes.
    #[error("output '{output}' has {reference} elements natively and {candidate} after decoding")]
    OutputArity {
        /// Name of the mismatched output.
        output: String,
        /// Element count from the in-memory graph engine.
        reference: usize,
        /// Element count from the decoded model.
        candidate: usize,
    },

    /// An output value diverged beyond the configured tolerance.
    #[error(
        "output '{output}' disagrees at opset {opset}, index {index}: \
         {candidate} vs {reference} (tolerance {tolerance})"
    )]
    OutputMismatch {
        /// Name of the diverging output.
        output: String,
        /// Opset version the model was exported at.
        opset: i64,
        /// Flat element index of the first divergence.
        index: usize,
        /// Value from the decoded model.
        candidate: f32,
        /// Value from the in-memory graph engine.
        reference: f32,
        /// Allowed absolute difference at this element.
        tolerance: f32,
    },
}
