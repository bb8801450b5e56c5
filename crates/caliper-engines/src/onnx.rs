//! Engine backed by the ONNX serialization of a model.

use std::collections::HashMap;
use std::path::Path;

use caliper_core::Tensor;
use caliper_onnx::ModelLoader;
use tracing::debug;

use crate::engine::{EngineKind, InferenceEngine};
use crate::error::Result;
use crate::native::GraphEngine;

/// Executes models from their serialized ONNX form.
///
/// Construction always goes through a full decode of the wire format, so
/// agreement between this engine and [`GraphEngine`] exercises the
/// interchange layer as well as the kernels.
#[derive(Debug)]
pub struct OnnxEngine {
    inner: GraphEngine,
    opset_version: i64,
}

impl OnnxEngine {
    /// Build an engine by decoding serialized model bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let loaded = ModelLoader::new().load_bytes(bytes)?;
        debug!(
            producer = %loaded.producer_name,
            opset = loaded.opset_version,
            "building engine from decoded model"
        );
        Ok(Self {
            inner: GraphEngine::new(loaded.graph, loaded.initializers)?,
            opset_version: loaded.opset_version,
        })
    }

    /// Build an engine from an ONNX model file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let loaded = ModelLoader::new().load_file(path)?;
        Ok(Self {
            inner: GraphEngine::new(loaded.graph, loaded.initializers)?,
            opset_version: loaded.opset_version,
        })
    }

    /// Operator set version the decoded model declares.
    pub fn opset_version(&self) -> i64 {
        self.opset_version
    }
}

impl InferenceEngine for OnnxEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Onnx
    }

    fn run(&self, inputs: HashMap<String, Tensor>) -> Result<HashMap<String, Tensor>> {
        self.inner.run(inputs)
    }
}
