//! JSON regression reports aggregating per-engine scores.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::eval::EvalMetrics;

/// One scored configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Engine the scores came from.
    pub engine: String,
    /// Numeric precision of the scored model, e.g. `fp32` or `int8`.
    pub precision: String,
    /// Calibration method, present for quantized entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// The scores.
    pub metrics: EvalMetrics,
}

/// Collected scores for one regression run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegressionReport {
    /// Model under test.
    pub model: String,
    /// Scored configurations in insertion order.
    pub entries: Vec<ReportEntry>,
}

impl RegressionReport {
    /// Empty report for a model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            entries: Vec::new(),
        }
    }

    /// Add one scored configuration.
    pub fn record(
        &mut self,
        engine: impl Into<String>,
        precision: impl Into<String>,
        algorithm: Option<&str>,
        metrics: EvalMetrics,
    ) {
        self.entries.push(ReportEntry {
            engine: engine.into(),
            precision: precision.into(),
            algorithm: algorithm.map(str::to_string),
            metrics,
        });
    }

    /// Scores for an engine and precision, if recorded.
    pub fn metrics(&self, engine: &str, precision: &str) -> Option<&EvalMetrics> {
        self.entries
            .iter()
            .find(|entry| entry.engine == engine && entry.precision == precision)
            .map(|entry| &entry.metrics)
    }

    /// Log every entry through tracing.
    pub fn summarize(&self) {
        for entry in &self.entries {
            info!(
                model = %self.model,
                engine = %entry.engine,
                precision = %entry.precision,
                algorithm = entry.algorithm.as_deref().unwrap_or("-"),
                accuracy = entry.metrics.top1_accuracy,
                throughput = entry.metrics.throughput,
                latency = entry.metrics.avg_latency,
                "regression entry"
            );
        }
    }

    /// The report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing regression report")
    }

    /// Write the JSON report to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("writing report to {}", path.as_ref().display()))?;
        info!(path = %path.as_ref().display(), "wrote regression report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(accuracy: f64) -> EvalMetrics {
        EvalMetrics {
            top1_accuracy: accuracy,
            throughput: 1200.0,
            avg_latency: 0.008,
        }
    }

    #[test]
    fn test_lookup_by_engine_and_precision() {
        let mut report = RegressionReport::new("patch_classifier");
        report.record("graph", "fp32", None, metrics(1.0));
        report.record("graph", "int8", Some("kl"), metrics(0.998));

        assert_eq!(report.metrics("graph", "fp32"), Some(&metrics(1.0)));
        assert_eq!(report.metrics("graph", "int8"), Some(&metrics(0.998)));
        assert_eq!(report.metrics("onnx", "fp32"), None);
    }

    #[test]
    fn test_json_omits_algorithm_for_float_entries() -> Result<()> {
        let mut report = RegressionReport::new("patch_classifier");
        report.record("graph", "fp32", None, metrics(1.0));
        report.record("onnx", "int8", Some("mse"), metrics(0.997));

        let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
        let entries = json["entries"].as_array().expect("entries array");
        assert!(entries[0].get("algorithm").is_none());
        assert_eq!(entries[1]["algorithm"], "mse");
        assert_eq!(entries[1]["metrics"]["top1_accuracy"], 0.997);
        Ok(())
    }

    #[test]
    fn test_save_writes_parseable_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.json");

        let mut report = RegressionReport::new("patch_classifier");
        report.record("onnx", "fp32", None, metrics(1.0));
        report.save(&path)?;

        let loaded: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(loaded["model"], "patch_classifier");
        assert_eq!(loaded["entries"].as_array().map(Vec::len), Some(1));
        Ok(())
    }
}
