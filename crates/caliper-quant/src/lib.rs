//! Post-training INT8 quantization for caliper models.
//!
//! The crate calibrates a model over representative input batches, selects
//! per-tensor scales with one of five algorithms, and rewrites the graph
//! into QDQ form that both inference engines run unchanged.
//!
//! # Architecture
//!
//! - [`observer`]: per-tensor statistics and the scale-selection algorithms.
//! - [`calibrate`]: batch-driven statistics collection over traced runs.
//! - [`table`]: the persisted `scale_info:` calibration table format.
//! - [`quantize`]: the post-training quantizer and the QDQ graph rewrite.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use caliper_core::{AttributeValue, DataType, GraphBuilder, Tensor, TensorLayout, TensorSpec};
//! use caliper_quant::{CalibrationMethod, PostTrainingQuantizer};
//!
//! let graph = GraphBuilder::new("head")
//!     .input(TensorSpec::batched("x", &[2], DataType::F32))
//!     .op("Gemm", "fc", &["x", "w"], &["y"])
//!     .attr("transB", AttributeValue::Int(1))
//!     .output(TensorSpec::batched("y", &[2], DataType::F32))
//!     .build()?;
//! let mut initializers = HashMap::new();
//! initializers.insert(
//!     "w".to_string(),
//!     Tensor::from_data(
//!         vec![0.5, -0.25, 1.0, 0.75],
//!         vec![2, 2],
//!         DataType::F32,
//!         TensorLayout::RowMajor,
//!     )?,
//! );
//!
//! let mut batch = HashMap::new();
//! batch.insert(
//!     "x".to_string(),
//!     Tensor::from_data(vec![1.0, -2.0], vec![1, 2], DataType::F32, TensorLayout::RowMajor)?,
//! );
//!
//! let model = PostTrainingQuantizer::new(CalibrationMethod::AbsMax)
//!     .quantize(&graph, &initializers, vec![batch])?;
//! assert_eq!(model.table().len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod calibrate;
pub mod error;
pub mod observer;
pub mod quantize;
pub mod table;

pub use calibrate::Calibrator;
pub use error::{QuantError, Result};
pub use observer::{CalibrationMethod, TensorObserver};
pub use quantize::{
    PostTrainingQuantizer, QuantizedModel, DEFAULT_QUANTIZABLE_OPS, FULL_QUANTIZE_OPS, MODEL_FILE,
    TABLE_FILE,
};
pub use table::CalibrationTable;
