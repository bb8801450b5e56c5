//! Inference engines executing caliper model graphs.
//!
//! Two backends share one [`InferenceEngine`] interface: [`GraphEngine`]
//! runs the in-memory graph directly, and [`OnnxEngine`] runs a model
//! decoded from its ONNX serialization. Running the same model on both and
//! comparing outputs is how the toolkit verifies that serialization
//! preserves behavior.
//!
//! # Architecture
//!
//! - **engine**: the `InferenceEngine` trait and backend identifiers
//! - **native**: scope-based graph execution with subgraph capture
//! - **onnx**: the decode-then-execute backend
//! - **ops**: operator kernels over Candle, dispatched via a registry
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use caliper_core::{DataType, GraphBuilder, Tensor, TensorLayout, TensorSpec};
//! use caliper_engines::{GraphEngine, InferenceEngine};
//!
//! let graph = GraphBuilder::new("double")
//!     .input(TensorSpec::fixed("x", &[2], DataType::F32))
//!     .op("Add", "double", &["x", "x"], &["y"])
//!     .output(TensorSpec::fixed("y", &[2], DataType::F32))
//!     .build()?;
//!
//! let engine = GraphEngine::new(graph, HashMap::new())?;
//! let x = Tensor::from_data(vec![1.5, -2.0], vec![2], DataType::F32, TensorLayout::RowMajor)?;
//! let outputs = engine.run(std::iter::once(("x".to_string(), x)).collect())?;
//! assert_eq!(outputs["y"].to_vec()?, vec![3.0, -4.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod engine;
pub mod error;
pub mod native;
pub mod onnx;
pub mod ops;

pub use engine::{EngineKind, InferenceEngine};
pub use error::{EngineError, Result};
pub use native::{ExecutionContext, GraphEngine};
pub use onnx::OnnxEngine;
pub use ops::{Operator, OperatorRegistry};
