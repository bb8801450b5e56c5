//! The engine abstraction shared by the execution backends.

use std::collections::HashMap;

use caliper_core::Tensor;

use crate::error::Result;

/// Which backend an engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Executes the in-memory graph directly.
    Graph,
    /// Executes a model decoded from its ONNX serialization.
    Onnx,
}

impl EngineKind {
    /// Stable lowercase name, used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Onnx => "onnx",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model execution backend.
///
/// Engines hold no per-run state: `run` maps named inputs to the model's
/// declared outputs and can be called repeatedly or concurrently.
pub trait InferenceEngine: Send + Sync {
    /// Which backend this engine is.
    fn kind(&self) -> EngineKind;

    /// Execute the model on named inputs.
    fn run(&self, inputs: HashMap<String, Tensor>) -> Result<HashMap<String, Tensor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(EngineKind::Graph.to_string(), "graph");
        assert_eq!(EngineKind::Onnx.to_string(), "onnx");
        assert_ne!(EngineKind::Graph, EngineKind::Onnx);
    }
}
