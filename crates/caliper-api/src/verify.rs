//! Behavioral equivalence checks across the export boundary.
//!
//! A model that serializes cleanly is not necessarily a model that
//! serializes *correctly*. The verifier runs the same inputs through the
//! in-memory graph engine and through an engine rebuilt from the exported
//! bytes, then compares every output elementwise.

use std::collections::HashMap;

use anyhow::anyhow;
use caliper_core::Tensor;
use caliper_engines::InferenceEngine;
use caliper_onnx::DEFAULT_OPSET;
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::model::Model;

/// Default absolute tolerance for output comparison.
pub const DEFAULT_DELTA: f32 = 1e-6;

/// Default relative tolerance for output comparison.
pub const DEFAULT_RTOL: f32 = 1e-5;

/// Outcome of verifying one exported opset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpsetReport {
    /// Opset version the model was exported at.
    pub opset: i64,
    /// Largest absolute difference observed across all outputs.
    pub max_abs_diff: f32,
}

/// Checks that a model behaves identically before and after its trip
/// through the ONNX wire format.
///
/// For every requested opset the model is exported, decoded into a fresh
/// engine and run on the bound inputs; each output element must satisfy
/// `|candidate - reference| <= delta + rtol * |reference|` against the
/// in-memory graph engine.
#[derive(Debug)]
pub struct ExportVerifier<'a> {
    model: &'a Model,
    opsets: Vec<i64>,
    inputs: HashMap<String, Tensor>,
    delta: f32,
    rtol: f32,
}

impl<'a> ExportVerifier<'a> {
    /// A verifier with default tolerances, checking the default opset.
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            opsets: vec![DEFAULT_OPSET],
            inputs: HashMap::new(),
            delta: DEFAULT_DELTA,
            rtol: DEFAULT_RTOL,
        }
    }

    /// Replace the opset versions to verify.
    pub fn with_opsets(mut self, opsets: &[i64]) -> Self {
        self.opsets = opsets.to_vec();
        self
    }

    /// Bind a named input tensor for the comparison runs.
    pub fn with_input(mut self, name: impl Into<String>, value: Tensor) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    /// Override the comparison tolerances.
    pub fn with_tolerance(mut self, delta: f32, rtol: f32) -> Self {
        self.delta = delta;
        self.rtol = rtol;
        self
    }

    /// Run the comparison, returning one report per opset.
    ///
    /// Fails on the first output element that diverges beyond tolerance,
    /// naming the output, the opset and the element index.
    pub fn run(&self) -> Result<Vec<OpsetReport>> {
        if self.opsets.is_empty() {
            return Err(ApiError::NoOpsets.into());
        }
        for spec in self.model.inputs() {
            if !self.inputs.contains_key(&spec.name) {
                return Err(ApiError::UnboundInput(spec.name.clone()).into());
            }
        }

        let reference_engine = self.model.graph_engine()?;
        let reference = reference_engine.run(self.inputs.clone())?;

        let mut reports = Vec::with_capacity(self.opsets.len());
        for &opset in &self.opsets {
            let engine = self.model.onnx_engine(opset)?;
            let candidate = engine.run(self.inputs.clone())?;

            let mut max_abs_diff = 0.0f32;
            for spec in self.model.outputs() {
                let expected = reference
                    .get(&spec.name)
                    .ok_or_else(|| anyhow!("reference run produced no output '{}'", spec.name))?
                    .to_vec()?;
                let actual = candidate
                    .get(&spec.name)
                    .ok_or_else(|| anyhow!("decoded run produced no output '{}'", spec.name))?
                    .to_vec()?;
                let output_diff =
                    compare_output(&spec.name, opset, &expected, &actual, self.delta, self.rtol)?;
                max_abs_diff = max_abs_diff.max(output_diff);
            }

            debug!(opset, max_abs_diff, "export round trip matched");
            reports.push(OpsetReport {
                opset,
                max_abs_diff,
            });
        }

        info!(
            model = %self.model.graph().metadata.name,
            opsets = ?self.opsets,
            outputs = self.model.outputs().len(),
            "export verified"
        );
        Ok(reports)
    }
}

/// Elementwise comparison of one output, returning the largest absolute
/// difference when every element is within tolerance.
fn compare_output(
    output: &str,
    opset: i64,
    reference: &[f32],
    candidate: &[f32],
    delta: f32,
    rtol: f32,
) -> Result<f32> {
    if reference.len() != candidate.len() {
        return Err(ApiError::OutputArity {
            output: output.to_string(),
            reference: reference.len(),
            candidate: candidate.len(),
        }
        .into());
    }

    let mut max_abs_diff = 0.0f32;
    for (index, (actual, expected)) in candidate.iter().zip(reference).enumerate() {
        let diff = (actual - expected).abs();
        let tolerance = delta + rtol * expected.abs();
        // A NaN difference is a mismatch, so poisoned outputs are reported too.
        if diff.is_nan() || diff > tolerance {
            return Err(ApiError::OutputMismatch {
                output: output.to_string(),
                opset,
                index,
                candidate: *actual,
                reference: *expected,
                tolerance,
            }
            .into());
        }
        max_abs_diff = max_abs_diff.max(diff);
    }
    Ok(max_abs_diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_core::{DataType, GraphBuilder, TensorLayout, TensorSpec};

    fn affine_model() -> Result<Model> {
        let graph = GraphBuilder::new("affine")
            .input(TensorSpec::fixed("x", &[4], DataType::F32))
            .op("Mul", "scale", &["x", "gain"], &["scaled"])
            .op("Add", "shift", &["scaled", "bias"], &["y"])
            .output(TensorSpec::fixed("y", &[4], DataType::F32))
            .build()?;

        let gain = Tensor::from_data(
            vec![2.0, 2.0, 2.0, 2.0],
            vec![4],
            DataType::F32,
            TensorLayout::RowMajor,
        )?;
        let bias = Tensor::from_data(
            vec![0.5, -0.5, 0.0, 1.0],
            vec![4],
            DataType::F32,
            TensorLayout::RowMajor,
        )?;
        Model::new(
            graph,
            HashMap::from([("gain".to_string(), gain), ("bias".to_string(), bias)]),
        )
    }

    fn probe() -> Result<Tensor> {
        Ok(Tensor::from_data(
            vec![1.0, -2.0, 3.5, 0.0],
            vec![4],
            DataType::F32,
            TensorLayout::RowMajor,
        )?)
    }

    #[test]
    fn test_round_trip_matches_at_several_opsets() -> Result<()> {
        let model = affine_model()?;
        let reports = ExportVerifier::new(&model)
            .with_opsets(&[11, 13])
            .with_input("x", probe()?)
            .run()?;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].opset, 11);
        assert_eq!(reports[1].opset, 13);
        for report in reports {
            assert!(report.max_abs_diff <= DEFAULT_DELTA);
        }
        Ok(())
    }

    #[test]
    fn test_unbound_input_is_named() -> Result<()> {
        let model = affine_model()?;
        let err = ExportVerifier::new(&model)
            .run()
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("'x'"), "unexpected error: {err}");
        Ok(())
    }

    #[test]
    fn test_empty_opset_list_is_rejected() -> Result<()> {
        let model = affine_model()?;
        let result = ExportVerifier::new(&model)
            .with_opsets(&[])
            .with_input("x", probe()?)
            .run();
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_mismatch_names_output_and_index() {
        let err = compare_output("y", 13, &[1.0, 2.0], &[1.0, 2.5], 1e-6, 1e-5)
            .expect_err("0.5 apart must not pass a 1e-5 tolerance");
        let message = err.to_string();
        assert!(message.contains("'y'"), "unexpected error: {message}");
        assert!(message.contains("opset 13"), "unexpected error: {message}");
        assert!(message.contains("index 1"), "unexpected error: {message}");
    }

    #[test]
    fn test_arity_mismatch_is_reported() {
        let err = compare_output("y", 13, &[1.0, 2.0], &[1.0], 1e-6, 1e-5)
            .expect_err("length mismatch must fail");
        assert!(err.to_string().contains("elements"));
    }

    #[test]
    fn test_nan_output_fails_comparison() {
        assert!(compare_output("y", 13, &[1.0], &[f32::NAN], 1e-6, 1e-5).is_err());
    }

    #[test]
    fn test_relative_tolerance_scales_with_magnitude() -> Result<()> {
        // 0.005 apart at magnitude 1000 passes rtol 1e-5, at 1.0 it fails.
        assert!(compare_output("y", 13, &[1000.0], &[1000.005], 1e-6, 1e-5).is_ok());
        assert!(compare_output("y", 13, &[1.0], &[1.005], 1e-6, 1e-5).is_err());
        Ok(())
    }
}
