//! Caliper Core
//!
//! Foundational components of the caliper toolkit: the tensor wrapper over
//! Candle, the model-graph data model used by the exporter and the runtime
//! engines, and the shared logging setup.
//!
//! ## Architecture
//!
//! - **Types**: data structures for tensors, graph nodes, attributes
//!   (including nested subgraphs) and boundary specifications
//! - **Tensor**: Candle-backed storage tagged with a logical element type
//! - **Graph**: builder, validation and topological traversal
//! - **Logging**: `tracing` configuration with environment overrides
//!
//! ## Example
//!
//! ```rust
//! use caliper_core::{DataType, Tensor, TensorLayout};
//!
//! let tensor = Tensor::zeros(vec![2, 3], DataType::F32, TensorLayout::RowMajor)?;
//! assert_eq!(tensor.shape(), vec![2, 3]);
//! assert_eq!(tensor.numel(), 6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod graph;
pub mod logging;
pub mod tensor;
pub mod types;

// Re-export commonly used types.
pub use error::{CoreError, Result};
pub use graph::{GraphBuilder, GraphStatistics};
pub use logging::{init_logging, LogLevel, LoggingConfig};
pub use tensor::Tensor;
pub use types::{
    AttributeValue, DataType, Dim, GraphEdge, GraphMetadata, GraphNode, ModelGraph, NodeId,
    TensorLayout, TensorSpec,
};
