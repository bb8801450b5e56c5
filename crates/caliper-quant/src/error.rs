//! Error types for calibration and quantization.

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = anyhow::Result<T>;

/// Errors raised while calibrating or quantizing a model.
#[derive(Error, Debug)]
pub enum QuantError {
    /// The calibration method name is not recognized.
    #[error("unknown calibration method '{0}'")]
    UnknownMethod(String),

    /// A scale was requested from an observer that never saw data.
    #[error("observer has not recorded any values")]
    NoObservations,

    /// Calibration was run without a single batch of input data.
    #[error("calibration requires at least one batch of input data")]
    NoCalibrationData,

    /// A tensor selected for calibration never appeared in a traced run.
    #[error("tensor '{0}' did not appear in the traced run")]
    TensorNotTraced(String),

    /// The quantizer needs a scale the calibration table does not hold.
    #[error("no calibration scale recorded for tensor '{0}'")]
    MissingScale(String),

    /// No node in the graph matches the quantizable operator set.
    #[error("graph has no nodes matching the quantizable operator set")]
    NothingToQuantize,

    /// The calibration table text does not start with its header.
    #[error("calibration table is missing the 'scale_info:' header")]
    MissingHeader,

    /// A calibration table line is not `tensor_name scale_value`.
    #[error("malformed calibration entry at line {line}: '{content}'")]
    MalformedLine {
        /// One-based line number in the table text.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// A scale value is unusable for symmetric quantization.
    #[error("calibration scale for '{name}' must be positive and finite, got {value}")]
    InvalidScale {
        /// The tensor the scale belongs to.
        name: String,
        /// The rejected value.
        value: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QuantError::UnknownMethod("minmax".to_string());
        assert!(err.to_string().contains("minmax"));

        let err = QuantError::MalformedLine {
            line: 3,
            content: "conv1_out".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("conv1_out"));

        let err = QuantError::InvalidScale {
            name: "fc_w".to_string(),
            value: -0.5,
        };
        assert!(err.to_string().contains("fc_w"));
        assert!(err.to_string().contains("-0.5"));
    }
}
