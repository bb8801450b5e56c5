//! Shared harness for caliper regression suites.
//!
//! Bundles what the accuracy and equivalence suites have in common: pinned
//! downloadable fixtures, deterministic datasets and model graphs, timed
//! top-1 scoring, and JSON report output.
//!
//! # Architecture
//!
//! - **fixture**: pinned archives with MD5-verified caching and extraction
//! - **dataset**: seeded synthetic classification batches
//! - **models**: deterministic classifier and branching graphs
//! - **eval**: timed top-1 scoring over any inference engine
//! - **report**: JSON regression reports
//!
//! # Example
//!
//! ```rust
//! use caliper_engines::GraphEngine;
//! use caliper_harness::dataset::PatchDataset;
//! use caliper_harness::eval::{self, DEFAULT_BATCH_SIZE};
//! use caliper_harness::models;
//!
//! let (graph, initializers) = models::patch_classifier()?;
//! let engine = GraphEngine::new(graph, initializers)?;
//!
//! let dataset = PatchDataset::generate(7, 2 * DEFAULT_BATCH_SIZE);
//! let batches = dataset.batches(DEFAULT_BATCH_SIZE)?;
//! let metrics = eval::evaluate(&engine, &batches, models::INPUT_NAME, models::OUTPUT_NAME)?;
//! assert!(metrics.top1_accuracy > 0.99);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod dataset;
pub mod error;
pub mod eval;
pub mod fixture;
pub mod models;
pub mod report;

pub use dataset::{Batch, PatchDataset};
pub use error::{HarnessError, Result};
pub use eval::{evaluate, EvalMetrics};
pub use fixture::{cache_root, ensure_dir_or_exit, Fixture};
pub use report::RegressionReport;
