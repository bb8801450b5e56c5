//! Timed top-1 scoring of classifier engines.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::anyhow;
use caliper_core::Tensor;
use caliper_engines::InferenceEngine;
use serde::Serialize;
use tracing::debug;

use crate::dataset::Batch;
use crate::error::{HarnessError, Result};

/// Images per batch in the regression protocol.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Batches scored per evaluation pass.
pub const DEFAULT_EVAL_BATCHES: usize = 50;
/// Batches observed during calibration.
pub const DEFAULT_CALIBRATION_BATCHES: usize = 5;

/// Aggregate scores for one engine over one dataset pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalMetrics {
    /// Fraction of images whose top prediction matches the label.
    pub top1_accuracy: f64,
    /// Images scored per second.
    pub throughput: f64,
    /// Mean seconds per batch.
    pub avg_latency: f64,
}

/// Score `engine` on `batches`, feeding each batch's images as `input` and
/// reading class scores from `output`.
///
/// The predicted class is the argmax over the last axis of `output`. Only
/// the engine runs are timed.
pub fn evaluate(
    engine: &dyn InferenceEngine,
    batches: &[Batch],
    input: &str,
    output: &str,
) -> Result<EvalMetrics> {
    if batches.is_empty() {
        return Err(HarnessError::NoBatches.into());
    }

    let mut correct = 0usize;
    let mut total = 0usize;
    let mut periods = Vec::with_capacity(batches.len());
    for batch in batches {
        let mut inputs = HashMap::with_capacity(1);
        inputs.insert(input.to_string(), batch.images.clone());

        let start = Instant::now();
        let outputs = engine.run(inputs)?;
        periods.push(start.elapsed().as_secs_f64());

        let scores = outputs
            .get(output)
            .ok_or_else(|| HarnessError::MissingOutput(output.to_string()))?;
        let predictions = argmax_rows(scores)?;
        if predictions.len() != batch.labels.len() {
            return Err(HarnessError::LabelCount {
                predictions: predictions.len(),
                labels: batch.labels.len(),
            }
            .into());
        }
        correct += predictions
            .iter()
            .zip(&batch.labels)
            .filter(|(prediction, label)| prediction == label)
            .count();
        total += batch.labels.len();
    }

    let elapsed: f64 = periods.iter().sum();
    let metrics = EvalMetrics {
        top1_accuracy: correct as f64 / total as f64,
        throughput: total as f64 / elapsed,
        avg_latency: elapsed / periods.len() as f64,
    };
    debug!(
        engine = %engine.kind(),
        accuracy = metrics.top1_accuracy,
        throughput = metrics.throughput,
        "scored engine"
    );
    Ok(metrics)
}

/// Row-wise argmax over the `[rows, classes]` view of a tensor, where
/// `classes` is the last axis.
fn argmax_rows(scores: &Tensor) -> Result<Vec<usize>> {
    let shape = scores.shape();
    let classes = *shape
        .last()
        .ok_or_else(|| anyhow!("scores tensor has no dimensions"))?;
    if classes == 0 {
        return Err(anyhow!("scores tensor has a zero-width class axis"));
    }

    let values = scores.to_vec()?;
    let rows = values.len() / classes;
    let mut result = Vec::with_capacity(rows);
    for row in 0..rows {
        let slice = &values[row * classes..(row + 1) * classes];
        let mut best = 0usize;
        for (index, value) in slice.iter().enumerate() {
            if *value > slice[best] {
                best = index;
            }
        }
        result.push(best);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_engines::GraphEngine;

    use crate::dataset::PatchDataset;
    use crate::models;

    #[test]
    fn test_engineered_classifier_scores_perfectly() -> Result<()> {
        let (graph, initializers) = models::patch_classifier()?;
        let engine = GraphEngine::new(graph, initializers)?;
        let batches = PatchDataset::generate(5, 30).batches(DEFAULT_BATCH_SIZE)?;

        let metrics = evaluate(&engine, &batches, models::INPUT_NAME, models::OUTPUT_NAME)?;
        assert_eq!(metrics.top1_accuracy, 1.0);
        assert!(metrics.throughput > 0.0);
        assert!(metrics.avg_latency > 0.0);
        Ok(())
    }

    #[test]
    fn test_missing_output_is_reported_by_name() -> Result<()> {
        let (graph, initializers) = models::patch_classifier()?;
        let engine = GraphEngine::new(graph, initializers)?;
        let batches = PatchDataset::generate(5, 10).batches(DEFAULT_BATCH_SIZE)?;

        let error = evaluate(&engine, &batches, models::INPUT_NAME, "missing")
            .expect_err("output does not exist");
        assert!(error.to_string().contains("missing"));
        Ok(())
    }

    #[test]
    fn test_no_batches_is_an_error() -> Result<()> {
        let (graph, initializers) = models::patch_classifier()?;
        let engine = GraphEngine::new(graph, initializers)?;
        assert!(evaluate(&engine, &[], models::INPUT_NAME, models::OUTPUT_NAME).is_err());
        Ok(())
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() -> Result<()> {
        let scores = Tensor::from_data(
            vec![0.1, 0.7, 0.2, 0.4, 0.4, 0.2],
            vec![2, 3],
            caliper_core::DataType::F32,
            caliper_core::TensorLayout::RowMajor,
        )?;
        assert_eq!(argmax_rows(&scores)?, vec![1, 0]);
        Ok(())
    }
}
