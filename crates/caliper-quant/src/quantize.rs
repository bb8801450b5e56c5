//! Post-training quantization and the QDQ graph rewrite.
//!
//! [`PostTrainingQuantizer`] calibrates a model over representative batches,
//! then rewrites the graph into QDQ form: weights feeding quantizable nodes
//! become int8 initializers followed by `DequantizeLinear`, and the
//! activations around those nodes gain `QuantizeLinear`/`DequantizeLinear`
//! pairs carrying the calibrated scales. The rewritten graph still computes
//! in floating point, so both engines run it unchanged while every quantized
//! tensor passes through the int8 grid.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use caliper_core::{DataType, GraphNode, ModelGraph, NodeId, Tensor, TensorLayout};
use caliper_engines::ops::quantize::INT8_LEVELS;
use caliper_engines::GraphEngine;
use caliper_onnx::ModelExporter;
use tracing::{debug, info};

use crate::calibrate::Calibrator;
use crate::error::{QuantError, Result};
use crate::observer::CalibrationMethod;
use crate::table::CalibrationTable;

/// Operator types quantized by default.
pub const DEFAULT_QUANTIZABLE_OPS: &[&str] = &["Conv", "Gemm", "MatMul"];

/// Operator types added by full quantization.
pub const FULL_QUANTIZE_OPS: &[&str] = &["Add", "Mul"];

/// File name of the exported graph inside a saved quantized model directory.
pub const MODEL_FILE: &str = "model.onnx";

/// File name of the scale table inside a saved quantized model directory.
pub const TABLE_FILE: &str = "calibration_table.txt";

/// Builder-configured post-training quantizer.
#[derive(Debug, Clone)]
pub struct PostTrainingQuantizer {
    method: CalibrationMethod,
    quantizable_ops: BTreeSet<String>,
    skip_tensors: BTreeSet<String>,
    max_batches: Option<usize>,
}

impl PostTrainingQuantizer {
    /// Create a quantizer using `method` over the default quantizable set.
    pub fn new(method: CalibrationMethod) -> Self {
        Self {
            method,
            quantizable_ops: DEFAULT_QUANTIZABLE_OPS
                .iter()
                .map(|op| op.to_string())
                .collect(),
            skip_tensors: BTreeSet::new(),
            max_batches: None,
        }
    }

    /// Extend the quantizable set with the elementwise operators.
    pub fn full_quantize(mut self) -> Self {
        self.quantizable_ops
            .extend(FULL_QUANTIZE_OPS.iter().map(|op| op.to_string()));
        self
    }

    /// Replace the quantizable operator set.
    pub fn with_quantizable_ops(mut self, ops: &[&str]) -> Self {
        self.quantizable_ops = ops.iter().map(|op| op.to_string()).collect();
        self
    }

    /// Leave the named tensors in floating point.
    pub fn with_skip_tensors(mut self, tensors: &[&str]) -> Self {
        self.skip_tensors = tensors.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Cap the number of calibration batches consumed from the source.
    pub fn with_max_batches(mut self, batches: usize) -> Self {
        self.max_batches = Some(batches);
        self
    }

    /// Calibrate over `batches` and produce the QDQ-form model.
    pub fn quantize<I>(
        &self,
        graph: &ModelGraph,
        initializers: &HashMap<String, Tensor>,
        batches: I,
    ) -> Result<QuantizedModel>
    where
        I: IntoIterator<Item = HashMap<String, Tensor>>,
    {
        let targets = self.target_nodes(graph);
        if targets.is_empty() {
            return Err(QuantError::NothingToQuantize.into());
        }
        let (weights, activations) = self.partition_tensors(graph, initializers, &targets);
        debug!(
            nodes = targets.len(),
            weights = weights.len(),
            activations = activations.len(),
            method = %self.method,
            "selected quantization targets"
        );

        let mut table = self.calibrate(graph, initializers, &activations, batches)?;

        let mut quantized = graph.clone();
        let mut rewritten = initializers.clone();
        quantize_weights(&mut quantized, &mut rewritten, &weights, &mut table)?;
        wrap_activations(
            &mut quantized,
            &mut rewritten,
            &targets,
            &activations,
            &table,
        )?;

        quantized.rebuild_edges();
        quantized
            .validate()
            .context("quantization produced an invalid graph")?;

        info!(
            method = %self.method,
            entries = table.len(),
            nodes = quantized.nodes.len(),
            "rewrote model to QDQ form"
        );
        Ok(QuantizedModel {
            graph: quantized,
            initializers: rewritten,
            table,
            method: self.method,
        })
    }

    /// Ids of the nodes whose tensors get quantized.
    fn target_nodes(&self, graph: &ModelGraph) -> Vec<NodeId> {
        graph
            .nodes
            .iter()
            .filter(|node| self.quantizable_ops.contains(&node.op_type))
            .map(|node| node.id)
            .collect()
    }

    /// Split the target nodes' tensors into weights and activations.
    fn partition_tensors(
        &self,
        graph: &ModelGraph,
        initializers: &HashMap<String, Tensor>,
        targets: &[NodeId],
    ) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut weights = BTreeSet::new();
        let mut activations = BTreeSet::new();
        for &id in targets {
            let node = &graph.nodes[id];
            for input in &node.inputs {
                if self.skip_tensors.contains(input) {
                    continue;
                }
                if initializers.contains_key(input) {
                    weights.insert(input.clone());
                } else {
                    activations.insert(input.clone());
                }
            }
            for output in &node.outputs {
                if !self.skip_tensors.contains(output) {
                    activations.insert(output.clone());
                }
            }
        }
        (weights, activations)
    }

    /// Run the calibration batches and build the activation scale table.
    fn calibrate<I>(
        &self,
        graph: &ModelGraph,
        initializers: &HashMap<String, Tensor>,
        activations: &BTreeSet<String>,
        batches: I,
    ) -> Result<CalibrationTable>
    where
        I: IntoIterator<Item = HashMap<String, Tensor>>,
    {
        let engine = GraphEngine::new(graph.clone(), initializers.clone())?;
        let mut calibrator = Calibrator::new(engine, activations.iter().cloned());
        let limit = self.max_batches.unwrap_or(usize::MAX);
        for inputs in batches.into_iter().take(limit) {
            calibrator.observe_batch(inputs)?;
        }
        calibrator.scales(self.method)
    }
}

/// Replace each weight with its int8 levels plus a `DequantizeLinear`, and
/// rewire every consumer to the dequantized tensor.
fn quantize_weights(
    graph: &mut ModelGraph,
    initializers: &mut HashMap<String, Tensor>,
    weights: &BTreeSet<String>,
    table: &mut CalibrationTable,
) -> Result<()> {
    for name in weights {
        let (values, shape) = {
            let weight = initializers.get(name).ok_or_else(|| {
                anyhow::anyhow!("weight initializer '{name}' disappeared during rewrite")
            })?;
            (weight.to_vec()?, weight.shape())
        };
        let scale = weight_scale(&values);
        let levels: Vec<f32> = values
            .iter()
            .map(|&v| (v / scale).round().clamp(-INT8_LEVELS, INT8_LEVELS))
            .collect();
        initializers.insert(
            name.clone(),
            Tensor::from_data(levels, shape, DataType::I8, TensorLayout::RowMajor)?,
        );

        let scale_name = format!("{name}_scale");
        let zero_name = format!("{name}_zero_point");
        initializers.insert(scale_name.clone(), scalar_f32(scale)?);
        initializers.insert(zero_name.clone(), zero_point_i8()?);
        table.insert(name.clone(), scale)?;

        let dequant_name = format!("{name}_dequant");
        let id = graph.nodes.len();
        graph.nodes.push(GraphNode {
            id,
            name: format!("{name}_dequantize"),
            op_type: "DequantizeLinear".to_string(),
            inputs: vec![name.clone(), scale_name, zero_name],
            outputs: vec![dequant_name.clone()],
            attributes: HashMap::new(),
        });
        // The raw name now refers to int8 levels; no existing node may keep
        // reading it directly.
        for node in &mut graph.nodes[..id] {
            for input in &mut node.inputs {
                if input == name {
                    *input = dequant_name.clone();
                }
            }
        }
    }
    Ok(())
}

/// Funnel the target nodes' activations through the int8 grid.
///
/// Outputs are wrapped first: the producer is renamed to write a raw tensor
/// and the QDQ pair hands consumers back the original name, so downstream
/// nodes and declared graph outputs need no rewiring. Inputs already covered
/// by an upstream output wrap are left alone.
fn wrap_activations(
    graph: &mut ModelGraph,
    initializers: &mut HashMap<String, Tensor>,
    targets: &[NodeId],
    activations: &BTreeSet<String>,
    table: &CalibrationTable,
) -> Result<()> {
    let mut already_dequantized: HashSet<String> = HashSet::new();
    for &id in targets {
        let outputs = graph.nodes[id].outputs.clone();
        for output in outputs {
            if !activations.contains(&output) {
                continue;
            }
            let scale = table
                .scale(&output)
                .ok_or_else(|| QuantError::MissingScale(output.clone()))?;
            let raw_name = format!("{output}_raw");
            for slot in &mut graph.nodes[id].outputs {
                if *slot == output {
                    *slot = raw_name.clone();
                }
            }
            push_qdq_pair(graph, initializers, &output, &raw_name, &output, scale)?;
            already_dequantized.insert(output);
        }
    }

    let mut input_wraps: HashMap<String, String> = HashMap::new();
    for &id in targets {
        let inputs = graph.nodes[id].inputs.clone();
        for input in inputs {
            if !activations.contains(&input) || already_dequantized.contains(&input) {
                continue;
            }
            let dequant_name = match input_wraps.get(&input) {
                Some(existing) => existing.clone(),
                None => {
                    let scale = table
                        .scale(&input)
                        .ok_or_else(|| QuantError::MissingScale(input.clone()))?;
                    let dequant_name = format!("{input}_dequant");
                    push_qdq_pair(graph, initializers, &input, &input, &dequant_name, scale)?;
                    input_wraps.insert(input.clone(), dequant_name.clone());
                    dequant_name
                }
            };
            for slot in &mut graph.nodes[id].inputs {
                if *slot == input {
                    *slot = dequant_name.clone();
                }
            }
        }
    }
    Ok(())
}

/// Append a `QuantizeLinear`/`DequantizeLinear` pair taking `source` through
/// the int8 grid into `sink`, with scale and zero-point initializers named
/// after `base`.
fn push_qdq_pair(
    graph: &mut ModelGraph,
    initializers: &mut HashMap<String, Tensor>,
    base: &str,
    source: &str,
    sink: &str,
    scale: f32,
) -> Result<()> {
    let scale_name = format!("{base}_scale");
    let zero_name = format!("{base}_zero_point");
    let quant_name = format!("{base}_quant");
    initializers.insert(scale_name.clone(), scalar_f32(scale)?);
    initializers.insert(zero_name.clone(), zero_point_i8()?);

    let id = graph.nodes.len();
    graph.nodes.push(GraphNode {
        id,
        name: format!("{base}_quantize"),
        op_type: "QuantizeLinear".to_string(),
        inputs: vec![source.to_string(), scale_name.clone(), zero_name.clone()],
        outputs: vec![quant_name.clone()],
        attributes: HashMap::new(),
    });
    let id = graph.nodes.len();
    graph.nodes.push(GraphNode {
        id,
        name: format!("{base}_dequantize"),
        op_type: "DequantizeLinear".to_string(),
        inputs: vec![quant_name, scale_name, zero_name],
        outputs: vec![sink.to_string()],
        attributes: HashMap::new(),
    });
    Ok(())
}

/// Symmetric per-tensor scale for weight data.
fn weight_scale(values: &[f32]) -> f32 {
    let abs_max = values.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()));
    if abs_max > 0.0 {
        abs_max / INT8_LEVELS
    } else {
        1.0
    }
}

fn scalar_f32(value: f32) -> Result<Tensor> {
    Tensor::from_data(vec![value], vec![1], DataType::F32, TensorLayout::RowMajor)
}

fn zero_point_i8() -> Result<Tensor> {
    Tensor::from_data(vec![0.0], vec![1], DataType::I8, TensorLayout::RowMajor)
}

/// A calibrated QDQ-form model together with its scale table.
#[derive(Debug, Clone)]
pub struct QuantizedModel {
    graph: ModelGraph,
    initializers: HashMap<String, Tensor>,
    table: CalibrationTable,
    method: CalibrationMethod,
}

impl QuantizedModel {
    /// The rewritten graph.
    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Initializers, including int8 weights, scales and zero points.
    pub fn initializers(&self) -> &HashMap<String, Tensor> {
        &self.initializers
    }

    /// Per-tensor scales backing the rewrite.
    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Method used to calibrate.
    pub fn method(&self) -> CalibrationMethod {
        self.method
    }

    /// Serialize the model to ONNX bytes at `opset`.
    pub fn to_onnx(&self, opset: i64) -> Result<Vec<u8>> {
        ModelExporter::new()
            .with_opset(opset)
            .export(&self.graph, &self.initializers)
    }

    /// Build a graph engine over the quantized model.
    pub fn engine(&self) -> Result<GraphEngine> {
        GraphEngine::new(self.graph.clone(), self.initializers.clone())
    }

    /// Write `model.onnx` and `calibration_table.txt` into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>, opset: i64) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        ModelExporter::new().with_opset(opset).export_to_file(
            &self.graph,
            &self.initializers,
            dir.join(MODEL_FILE),
        )?;
        self.table.save(dir.join(TABLE_FILE))?;
        info!(dir = %dir.display(), method = %self.method, "saved quantized model");
        Ok(())
    }
}
