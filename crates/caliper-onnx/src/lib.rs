//! ONNX interchange for caliper model graphs.
//!
//! Implements export of in-memory graphs, including the nested subgraphs of
//! control-flow operators, to the ONNX wire format, and loading of ONNX
//! models back. The wire schema is a hand-maintained prost mirror of the
//! subset of `onnx.proto` the engines execute.
//!
//! # Architecture
//!
//! - **proto**: prost message definitions matching upstream field numbers
//! - **types**: element type mapping between core and wire representations
//! - **export**: deterministic serialization of graphs and initializers
//! - **loader**: deserialization with IR and opset version checks
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use caliper_core::{DataType, GraphBuilder, TensorSpec};
//! use caliper_onnx::{ModelExporter, ModelLoader};
//!
//! let graph = GraphBuilder::new("identity")
//!     .input(TensorSpec::fixed("x", &[2], DataType::F32))
//!     .op("Relu", "act", &["x"], &["y"])
//!     .output(TensorSpec::fixed("y", &[2], DataType::F32))
//!     .build()?;
//!
//! let bytes = ModelExporter::new().export(&graph, &HashMap::new())?;
//! let loaded = ModelLoader::new().load_bytes(&bytes)?;
//! assert_eq!(loaded.graph.nodes.len(), 1);
//! assert_eq!(loaded.producer_name, "caliper");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod export;
pub mod loader;
pub mod proto;
pub mod types;

pub use error::{OnnxError, Result};
pub use export::{ModelExporter, DEFAULT_OPSET, IR_VERSION};
pub use loader::{LoadedModel, ModelLoader, MAX_SUPPORTED_OPSET, MIN_IR_VERSION};
pub use types::{dtype_from_onnx, dtype_to_onnx};
