//! Error types for graph execution.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = anyhow::Result<T>;

/// Errors raised while executing a model graph.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No registered kernel implements the operator.
    #[error("unsupported operator: {0}")]
    UnsupportedOp(String),

    /// A node reads a tensor that no scope provides.
    #[error("node '{node}' reads tensor '{tensor}' which is not available")]
    MissingTensor {
        /// The consuming node.
        node: String,
        /// The unavailable tensor.
        tensor: String,
    },

    /// The caller did not provide a declared graph input.
    #[error("missing required input '{0}'")]
    MissingInput(String),

    /// A provided input does not satisfy the declared spec.
    #[error("input '{name}' has shape {actual:?}, which does not satisfy the declared {expected:?}")]
    InputShapeMismatch {
        /// Input name.
        name: String,
        /// Declared dims, rendered from the input's tensor spec.
        expected: Vec<String>,
        /// Provided shape.
        actual: Vec<usize>,
    },

    /// A kernel produced the wrong number of outputs.
    #[error("node '{node}' produced {actual} outputs, expected {expected}")]
    OutputArity {
        /// The executing node.
        node: String,
        /// Outputs declared in the graph.
        expected: usize,
        /// Outputs the kernel returned.
        actual: usize,
    },

    /// A declared graph output was never produced.
    #[error("graph output '{0}' was not produced")]
    MissingOutput(String),
}
