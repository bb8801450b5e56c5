//! Export of in-memory model graphs to the ONNX wire format.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use caliper_core::{AttributeValue, DataType, Dim, GraphNode, ModelGraph, Tensor, TensorSpec};
use prost::Message;
use tracing::{debug, info};

use crate::error::Result;
use crate::proto;
use crate::proto::attribute_proto::AttributeType;
use crate::types::dtype_to_onnx;

/// IR version stamped into exported models.
pub const IR_VERSION: i64 = 8;

/// Operator set version used when the caller does not pick one.
pub const DEFAULT_OPSET: i64 = 13;

/// Serializes a [`ModelGraph`] and its initializers into an ONNX model.
///
/// Output is deterministic: nodes are emitted in topological order and
/// initializers and attributes are sorted by name, so the same graph always
/// encodes to the same bytes.
#[derive(Debug, Clone)]
pub struct ModelExporter {
    opset_version: i64,
}

impl Default for ModelExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelExporter {
    /// Exporter targeting [`DEFAULT_OPSET`].
    pub fn new() -> Self {
        Self {
            opset_version: DEFAULT_OPSET,
        }
    }

    /// Target a specific operator set version.
    pub fn with_opset(mut self, version: i64) -> Self {
        self.opset_version = version;
        self
    }

    /// Encode the graph and initializers as ONNX model bytes.
    pub fn export(
        &self,
        graph: &ModelGraph,
        initializers: &HashMap<String, Tensor>,
    ) -> Result<Vec<u8>> {
        graph
            .validate()
            .context("refusing to export an invalid graph")?;

        let graph_proto = graph_to_proto(graph, initializers)?;
        let model = proto::ModelProto {
            ir_version: IR_VERSION,
            producer_name: "caliper".to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            domain: String::new(),
            model_version: 1,
            doc_string: String::new(),
            graph: Some(graph_proto),
            opset_import: vec![proto::OperatorSetIdProto {
                domain: String::new(),
                version: self.opset_version,
            }],
            metadata_props: Vec::new(),
        };

        let bytes = model.encode_to_vec();
        debug!(
            nodes = graph.nodes.len(),
            initializers = initializers.len(),
            opset = self.opset_version,
            size = bytes.len(),
            "encoded model"
        );
        Ok(bytes)
    }

    /// Encode the model and write it to a file.
    pub fn export_to_file(
        &self,
        graph: &ModelGraph,
        initializers: &HashMap<String, Tensor>,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.export(graph, initializers)?;
        std::fs::write(path.as_ref(), &bytes)
            .with_context(|| format!("writing model to {}", path.as_ref().display()))?;
        info!(path = %path.as_ref().display(), "wrote ONNX model");
        Ok(())
    }
}

/// Convert a graph (top-level or subgraph) into its wire representation.
fn graph_to_proto(
    graph: &ModelGraph,
    initializers: &HashMap<String, Tensor>,
) -> Result<proto::GraphProto> {
    let order = graph.topological_sort()?;
    let mut nodes = Vec::with_capacity(order.len());
    for id in order {
        nodes.push(node_to_proto(&graph.nodes[id])?);
    }

    let mut names: Vec<&String> = initializers.keys().collect();
    names.sort();
    let mut init_protos = Vec::with_capacity(names.len());
    for name in names {
        init_protos.push(tensor_to_proto(name, &initializers[name])?);
    }

    // Initializers are constants, not runtime inputs (legal since IR 4).
    let input = graph
        .inputs
        .iter()
        .filter(|spec| !initializers.contains_key(&spec.name))
        .map(spec_to_value_info)
        .collect();
    let output = graph.outputs.iter().map(spec_to_value_info).collect();

    Ok(proto::GraphProto {
        node: nodes,
        name: graph.metadata.name.clone(),
        initializer: init_protos,
        doc_string: graph.metadata.doc.clone(),
        input,
        output,
        value_info: Vec::new(),
    })
}

fn node_to_proto(node: &GraphNode) -> Result<proto::NodeProto> {
    let mut keys: Vec<&String> = node.attributes.keys().collect();
    keys.sort();
    let mut attributes = Vec::with_capacity(keys.len());
    for key in keys {
        attributes.push(attribute_to_proto(key, &node.attributes[key])?);
    }

    Ok(proto::NodeProto {
        input: node.inputs.clone(),
        output: node.outputs.clone(),
        name: node.name.clone(),
        op_type: node.op_type.clone(),
        attribute: attributes,
        doc_string: String::new(),
        domain: String::new(),
    })
}

fn attribute_to_proto(name: &str, value: &AttributeValue) -> Result<proto::AttributeProto> {
    let mut attr = proto::AttributeProto {
        name: name.to_string(),
        ..Default::default()
    };
    match value {
        AttributeValue::Float(v) => {
            attr.f = *v;
            attr.r#type = AttributeType::Float as i32;
        }
        AttributeValue::Int(v) => {
            attr.i = *v;
            attr.r#type = AttributeType::Int as i32;
        }
        AttributeValue::String(v) => {
            attr.s = v.clone().into_bytes();
            attr.r#type = AttributeType::String as i32;
        }
        AttributeValue::Tensor(t) => {
            attr.t = Some(tensor_to_proto(name, t)?);
            attr.r#type = AttributeType::Tensor as i32;
        }
        AttributeValue::Graph(g) => {
            // Subgraphs carry no initializers of their own; they close over
            // outer-scope values by name.
            attr.g = Some(Box::new(graph_to_proto(g, &HashMap::new())?));
            attr.r#type = AttributeType::Graph as i32;
        }
        AttributeValue::Floats(v) => {
            attr.floats = v.clone();
            attr.r#type = AttributeType::Floats as i32;
        }
        AttributeValue::Ints(v) => {
            attr.ints = v.clone();
            attr.r#type = AttributeType::Ints as i32;
        }
        AttributeValue::Strings(v) => {
            attr.strings = v.iter().map(|s| s.clone().into_bytes()).collect();
            attr.r#type = AttributeType::Strings as i32;
        }
    }
    Ok(attr)
}

fn tensor_to_proto(name: &str, tensor: &Tensor) -> Result<proto::TensorProto> {
    let mut result = proto::TensorProto {
        dims: tensor.shape().iter().map(|&d| d as i64).collect(),
        data_type: dtype_to_onnx(tensor.dtype()),
        name: name.to_string(),
        ..Default::default()
    };

    match tensor.dtype() {
        DataType::F32 => result.float_data = tensor.to_vec()?,
        DataType::I64 => result.int64_data = tensor.to_i64_vec()?,
        DataType::I8 | DataType::I32 | DataType::U8 | DataType::Bool => {
            result.int32_data = tensor.to_vec()?.into_iter().map(|x| x as i32).collect();
        }
        other => {
            anyhow::bail!("cannot serialize tensor '{name}' with element type {other:?}");
        }
    }
    Ok(result)
}

fn spec_to_value_info(spec: &TensorSpec) -> proto::ValueInfoProto {
    let dim = spec
        .dims
        .iter()
        .map(|d| proto::tensor_shape_proto::Dimension {
            denotation: String::new(),
            value: Some(match d {
                Dim::Fixed(n) => {
                    proto::tensor_shape_proto::dimension::Value::DimValue(*n as i64)
                }
                Dim::Symbolic(s) => {
                    proto::tensor_shape_proto::dimension::Value::DimParam(s.clone())
                }
            }),
        })
        .collect();

    proto::ValueInfoProto {
        name: spec.name.clone(),
        r#type: Some(proto::TypeProto {
            value: Some(proto::type_proto::Value::TensorType(proto::type_proto::Tensor {
                elem_type: dtype_to_onnx(spec.dtype),
                shape: Some(proto::TensorShapeProto { dim }),
            })),
        }),
        doc_string: String::new(),
    }
}
