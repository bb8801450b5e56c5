//! Batch-driven statistics collection over a running model.

use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use caliper_core::Tensor;
use caliper_engines::GraphEngine;
use tracing::debug;

use crate::error::{QuantError, Result};
use crate::observer::{CalibrationMethod, TensorObserver};
use crate::table::CalibrationTable;

/// Feeds calibration batches through a model and observes a chosen set of
/// tensors on every run.
///
/// The engine's traced runs expose inputs, intermediates and outputs by
/// name, so any tensor in the graph can be observed.
#[derive(Debug)]
pub struct Calibrator {
    engine: GraphEngine,
    observers: BTreeMap<String, TensorObserver>,
    batches: usize,
}

impl Calibrator {
    /// Observe `tensors` on runs of `engine`.
    pub fn new(engine: GraphEngine, tensors: impl IntoIterator<Item = String>) -> Self {
        let observers = tensors
            .into_iter()
            .map(|name| (name, TensorObserver::new()))
            .collect();
        Self {
            engine,
            observers,
            batches: 0,
        }
    }

    /// Run one batch and record every observed tensor.
    pub fn observe_batch(&mut self, inputs: HashMap<String, Tensor>) -> Result<()> {
        let traced = self.engine.run_traced(inputs)?;
        for (name, observer) in &mut self.observers {
            let value = traced
                .get(name)
                .ok_or_else(|| QuantError::TensorNotTraced(name.clone()))?;
            observer.record(value)?;
        }
        self.batches += 1;
        debug!(
            batch = self.batches,
            tensors = self.observers.len(),
            "collected calibration statistics"
        );
        Ok(())
    }

    /// Number of batches observed so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Access the accumulated statistics for one tensor.
    pub fn observer(&self, name: &str) -> Option<&TensorObserver> {
        self.observers.get(name)
    }

    /// Compute the calibration table for every observed tensor.
    pub fn scales(&self, method: CalibrationMethod) -> Result<CalibrationTable> {
        if self.batches == 0 {
            return Err(QuantError::NoCalibrationData.into());
        }
        let mut table = CalibrationTable::new();
        for (name, observer) in &self.observers {
            let scale = observer
                .scale(method)
                .with_context(|| format!("computing {method} scale for tensor '{name}'"))?;
            table.insert(name.clone(), scale)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_core::{DataType, GraphBuilder, ModelGraph, TensorLayout, TensorSpec};

    fn dense_graph() -> Result<ModelGraph> {
        Ok(GraphBuilder::new("calibration_probe")
            .input(TensorSpec::batched("x", &[2], DataType::F32))
            .op("MatMul", "project", &["x", "w"], &["h"])
            .op("Relu", "act", &["h"], &["y"])
            .output(TensorSpec::batched("y", &[2], DataType::F32))
            .build()?)
    }

    fn engine() -> Result<GraphEngine> {
        let mut initializers = HashMap::new();
        initializers.insert(
            "w".to_string(),
            Tensor::from_data(
                vec![1.0, 0.0, 0.0, -1.0],
                vec![2, 2],
                DataType::F32,
                TensorLayout::RowMajor,
            )?,
        );
        GraphEngine::new(dense_graph()?, initializers)
    }

    fn batch(values: Vec<f32>) -> Result<HashMap<String, Tensor>> {
        let mut inputs = HashMap::new();
        inputs.insert(
            "x".to_string(),
            Tensor::from_data(values, vec![2, 2], DataType::F32, TensorLayout::RowMajor)?,
        );
        Ok(inputs)
    }

    fn observed() -> Vec<String> {
        ["x", "h", "y"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_observes_inputs_intermediates_and_outputs() -> Result<()> {
        let mut calibrator = Calibrator::new(engine()?, observed());
        calibrator.observe_batch(batch(vec![1.0, 2.0, 3.0, 4.0])?)?;
        calibrator.observe_batch(batch(vec![0.5, -1.0, 2.0, 8.0])?)?;

        assert_eq!(calibrator.batches(), 2);
        // The projection negates the second column, Relu zeroes it.
        assert_eq!(calibrator.observer("x").map(TensorObserver::abs_max), Some(8.0));
        assert_eq!(calibrator.observer("h").map(TensorObserver::abs_max), Some(8.0));
        assert_eq!(calibrator.observer("y").map(TensorObserver::abs_max), Some(3.0));
        Ok(())
    }

    #[test]
    fn test_scales_cover_every_observed_tensor() -> Result<()> {
        let mut calibrator = Calibrator::new(engine()?, observed());
        calibrator.observe_batch(batch(vec![1.0, 2.0, 3.0, 4.0])?)?;
        calibrator.observe_batch(batch(vec![0.5, -1.0, 2.0, 8.0])?)?;

        let table = calibrator.scales(CalibrationMethod::AbsMax)?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.scale("x"), Some(8.0 / 127.0));
        assert_eq!(table.scale("y"), Some(3.0 / 127.0));

        // Average works from per-batch maxima instead of the global one.
        let table = calibrator.scales(CalibrationMethod::Average)?;
        assert_eq!(table.scale("y"), Some(2.5 / 127.0));
        Ok(())
    }

    #[test]
    fn test_unknown_tensor_fails_the_batch() -> Result<()> {
        let mut calibrator = Calibrator::new(engine()?, vec!["phantom".to_string()]);
        let err = calibrator
            .observe_batch(batch(vec![1.0, 2.0, 3.0, 4.0])?)
            .unwrap_err();
        assert!(err.to_string().contains("phantom"));
        Ok(())
    }

    #[test]
    fn test_scales_without_batches_is_an_error() -> Result<()> {
        let calibrator = Calibrator::new(engine()?, observed());
        let err = calibrator.scales(CalibrationMethod::Mse).unwrap_err();
        assert!(err.to_string().contains("at least one batch"));
        Ok(())
    }
}
