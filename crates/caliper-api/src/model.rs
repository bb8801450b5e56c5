//! The model facade tying graphs, serialization and engines together.

use std::collections::HashMap;
use std::path::Path;

use caliper_core::{ModelGraph, Tensor, TensorSpec};
use caliper_engines::{GraphEngine, OnnxEngine};
use caliper_onnx::{ModelExporter, ModelLoader};

use crate::error::Result;

/// A model: a validated graph together with its weight initializers.
///
/// This is the unit the high-level API operates on. From here a model can
/// be serialized to ONNX, reloaded, and handed to either execution backend.
#[derive(Debug, Clone)]
pub struct Model {
    graph: ModelGraph,
    initializers: HashMap<String, Tensor>,
}

impl Model {
    /// Wrap a graph and its initializers, validating the graph structure.
    pub fn new(graph: ModelGraph, initializers: HashMap<String, Tensor>) -> Result<Self> {
        graph.validate()?;
        Ok(Self {
            graph,
            initializers,
        })
    }

    /// Decode a model from serialized ONNX bytes.
    pub fn from_onnx_bytes(bytes: &[u8]) -> Result<Self> {
        let loaded = ModelLoader::new().load_bytes(bytes)?;
        Ok(Self {
            graph: loaded.graph,
            initializers: loaded.initializers,
        })
    }

    /// Load a model from an ONNX file on disk.
    pub fn open_onnx(path: impl AsRef<Path>) -> Result<Self> {
        let loaded = ModelLoader::new().load_file(path)?;
        Ok(Self {
            graph: loaded.graph,
            initializers: loaded.initializers,
        })
    }

    /// The underlying computation graph.
    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// The weight initializers bound to the graph's free inputs.
    pub fn initializers(&self) -> &HashMap<String, Tensor> {
        &self.initializers
    }

    /// Declared input specs.
    pub fn inputs(&self) -> &[TensorSpec] {
        &self.graph.inputs
    }

    /// Declared output specs.
    pub fn outputs(&self) -> &[TensorSpec] {
        &self.graph.outputs
    }

    /// Serialize the model to ONNX bytes at the given opset version.
    pub fn to_onnx(&self, opset: i64) -> Result<Vec<u8>> {
        ModelExporter::new()
            .with_opset(opset)
            .export(&self.graph, &self.initializers)
    }

    /// Write the ONNX serialization to a file.
    pub fn save_onnx(&self, path: impl AsRef<Path>, opset: i64) -> Result<()> {
        ModelExporter::new()
            .with_opset(opset)
            .export_to_file(&self.graph, &self.initializers, path)
    }

    /// An engine executing the in-memory graph directly.
    pub fn graph_engine(&self) -> Result<GraphEngine> {
        GraphEngine::new(self.graph.clone(), self.initializers.clone())
    }

    /// An engine executing the model through its ONNX serialization.
    ///
    /// The model is exported at `opset` and decoded back, so this engine
    /// sees exactly what an external consumer of the file would see.
    pub fn onnx_engine(&self, opset: i64) -> Result<OnnxEngine> {
        OnnxEngine::from_bytes(&self.to_onnx(opset)?)
    }
}
