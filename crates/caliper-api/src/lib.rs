//! High-level facade for building, exporting and verifying caliper models.
//!
//! This crate ties the lower layers together behind two types: [`Model`],
//! a validated graph plus its weights with one-call access to serialization
//! and both execution backends, and [`ExportVerifier`], which proves that a
//! model behaves the same before and after its trip through the ONNX wire
//! format. The quantization entry points from `caliper-quant` are
//! re-exported so a downstream crate needs only this one dependency.
//!
//! # Architecture
//!
//! - **model**: graph + initializers, with export, load and engine access
//! - **verify**: elementwise cross-backend equivalence runs per opset
//!
//! # Example
//!
//! ```rust
//! use caliper_api::{ExportVerifier, Model};
//! use caliper_core::{DataType, GraphBuilder, Tensor, TensorLayout, TensorSpec};
//!
//! let graph = GraphBuilder::new("double")
//!     .input(TensorSpec::fixed("x", &[2], DataType::F32))
//!     .op("Add", "double", &["x", "x"], &["y"])
//!     .output(TensorSpec::fixed("y", &[2], DataType::F32))
//!     .build()?;
//! let model = Model::new(graph, std::collections::HashMap::new())?;
//!
//! let x = Tensor::from_data(vec![1.0, -3.5], vec![2], DataType::F32, TensorLayout::RowMajor)?;
//! let reports = ExportVerifier::new(&model).with_input("x", x).run()?;
//! assert_eq!(reports.len(), 1);
//! assert!(reports[0].max_abs_diff <= 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod model;
pub mod verify;

pub use error::{ApiError, Result};
pub use model::Model;
pub use verify::{ExportVerifier, OpsetReport, DEFAULT_DELTA, DEFAULT_RTOL};

// Re-export commonly used types from the lower layers.
pub use caliper_core::{DataType, Tensor, TensorLayout, TensorSpec};
pub use caliper_engines::{EngineKind, GraphEngine, InferenceEngine, OnnxEngine};
pub use caliper_quant::{CalibrationMethod, CalibrationTable, PostTrainingQuantizer, QuantizedModel};

/// Commonly used imports for working with the high-level API.
pub mod prelude {
    pub use crate::{
        CalibrationMethod, ExportVerifier, InferenceEngine, Model, PostTrainingQuantizer, Tensor,
    };
}
