//! Error types for ONNX serialization.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = anyhow::Result<T>;

/// Errors raised while exporting or loading ONNX models.
#[derive(Error, Debug)]
pub enum OnnxError {
    /// The element type code has no equivalent in the core type system.
    #[error("unsupported ONNX data type code: {0}")]
    UnsupportedDataType(i32),

    /// The model container does not carry a graph.
    #[error("model has no graph")]
    MissingGraph,

    /// The model was produced against an IR version we no longer read.
    #[error("IR version {0} is older than the minimum supported version")]
    IrVersionTooOld(i64),

    /// An initializer carries neither typed data nor raw bytes.
    #[error("initializer '{0}' has no data")]
    EmptyTensor(String),

    /// An initializer payload does not match its declared shape.
    #[error("initializer '{name}' declares {expected} elements but carries {actual}")]
    DataLengthMismatch {
        /// Initializer name.
        name: String,
        /// Element count implied by the declared dims.
        expected: usize,
        /// Element count actually present in the payload.
        actual: usize,
    },

    /// An attribute uses a payload kind outside the supported subset.
    #[error("attribute '{0}' has an unsupported payload type")]
    UnsupportedAttribute(String),

    /// Subgraphs must close over outer-scope values instead of carrying
    /// their own initializers.
    #[error("subgraph '{0}' carries initializers, which is not supported")]
    SubgraphInitializer(String),

    /// A boundary tensor is declared without type information.
    #[error("value info '{0}' is missing its tensor type")]
    MissingTensorType(String),
}
