//! Loading ONNX models back into in-memory graphs.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use caliper_core::{
    AttributeValue, DataType, Dim, GraphMetadata, GraphNode, ModelGraph, Tensor, TensorLayout,
    TensorSpec,
};
use prost::Message;
use tracing::{debug, info, warn};

use crate::error::{OnnxError, Result};
use crate::export::DEFAULT_OPSET;
use crate::proto;
use crate::proto::attribute_proto::AttributeType;
use crate::types::dtype_from_onnx;

/// Oldest IR version the loader accepts.
pub const MIN_IR_VERSION: i64 = 3;

/// Newest operator set version the engines implement.
pub const MAX_SUPPORTED_OPSET: i64 = 13;

/// A model read from the wire format: the graph, its constants and the
/// provenance recorded by the producer.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// The computation graph.
    pub graph: ModelGraph,
    /// Constant tensors bound to the graph's free inputs.
    pub initializers: HashMap<String, Tensor>,
    /// Producer recorded in the model.
    pub producer_name: String,
    /// IR version recorded in the model.
    pub ir_version: i64,
    /// Operator set version for the default domain.
    pub opset_version: i64,
}

/// Deserializes ONNX model bytes into a [`LoadedModel`].
#[derive(Debug, Clone, Default)]
pub struct ModelLoader;

impl ModelLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }

    /// Decode a model from its serialized bytes.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<LoadedModel> {
        let model = proto::ModelProto::decode(bytes).context("decoding ONNX model bytes")?;

        if model.ir_version < MIN_IR_VERSION {
            return Err(OnnxError::IrVersionTooOld(model.ir_version).into());
        }

        let opset_version = model
            .opset_import
            .iter()
            .find(|o| o.domain.is_empty())
            .map_or(DEFAULT_OPSET, |o| o.version);
        if opset_version > MAX_SUPPORTED_OPSET {
            warn!(
                opset = opset_version,
                max = MAX_SUPPORTED_OPSET,
                "model opset exceeds the supported range, proceeding anyway"
            );
        }

        let graph_proto = model.graph.as_ref().ok_or(OnnxError::MissingGraph)?;
        let (graph, initializers) = graph_from_proto(graph_proto)?;

        debug!(
            nodes = graph.nodes.len(),
            initializers = initializers.len(),
            producer = %model.producer_name,
            "decoded model"
        );
        Ok(LoadedModel {
            graph,
            initializers,
            producer_name: model.producer_name,
            ir_version: model.ir_version,
            opset_version,
        })
    }

    /// Read and decode a model file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedModel> {
        let bytes = std::fs::read(path.as_ref())
            .with_context(|| format!("reading model from {}", path.as_ref().display()))?;
        let loaded = self.load_bytes(&bytes)?;
        info!(
            path = %path.as_ref().display(),
            nodes = loaded.graph.nodes.len(),
            "loaded ONNX model"
        );
        Ok(loaded)
    }
}

/// Convert a top-level graph, collecting its initializers.
fn graph_from_proto(g: &proto::GraphProto) -> Result<(ModelGraph, HashMap<String, Tensor>)> {
    let mut initializers = HashMap::with_capacity(g.initializer.len());
    for tensor_proto in &g.initializer {
        initializers.insert(
            tensor_proto.name.clone(),
            tensor_from_proto(tensor_proto)?,
        );
    }

    let mut nodes = Vec::with_capacity(g.node.len());
    for (id, node_proto) in g.node.iter().enumerate() {
        nodes.push(node_from_proto(id, node_proto)?);
    }

    // Pre-IR-4 exporters list initializers among the inputs; the free-input
    // binding happens through the initializer map instead.
    let mut inputs = Vec::new();
    for info in &g.input {
        if !initializers.contains_key(&info.name) {
            inputs.push(value_info_to_spec(info)?);
        }
    }
    let mut outputs = Vec::with_capacity(g.output.len());
    for info in &g.output {
        outputs.push(value_info_to_spec(info)?);
    }

    let mut graph = ModelGraph {
        nodes,
        edges: Vec::new(),
        inputs,
        outputs,
        metadata: GraphMetadata {
            name: g.name.clone(),
            doc: g.doc_string.clone(),
        },
    };
    graph.rebuild_edges();
    graph.validate()?;
    Ok((graph, initializers))
}

/// Convert a control-flow subgraph, which closes over outer-scope values
/// instead of carrying constants.
fn subgraph_from_proto(g: &proto::GraphProto) -> Result<ModelGraph> {
    if !g.initializer.is_empty() {
        return Err(OnnxError::SubgraphInitializer(g.name.clone()).into());
    }
    Ok(graph_from_proto(g)?.0)
}

fn node_from_proto(id: usize, node: &proto::NodeProto) -> Result<GraphNode> {
    let name = if node.name.is_empty() {
        format!("{}_{id}", node.op_type.to_lowercase())
    } else {
        node.name.clone()
    };

    let mut attributes = HashMap::with_capacity(node.attribute.len());
    for attr in &node.attribute {
        attributes.insert(attr.name.clone(), attribute_from_proto(attr)?);
    }

    Ok(GraphNode {
        id,
        name,
        op_type: node.op_type.clone(),
        // Empty input names mark absent optional inputs.
        inputs: node.input.iter().filter(|s| !s.is_empty()).cloned().collect(),
        outputs: node.output.clone(),
        attributes,
    })
}

fn attribute_from_proto(attr: &proto::AttributeProto) -> Result<AttributeValue> {
    let kind = AttributeType::try_from(attr.r#type)
        .map_err(|_| OnnxError::UnsupportedAttribute(attr.name.clone()))?;
    match kind {
        AttributeType::Float => Ok(AttributeValue::Float(attr.f)),
        AttributeType::Int => Ok(AttributeValue::Int(attr.i)),
        AttributeType::String => Ok(AttributeValue::String(
            String::from_utf8_lossy(&attr.s).into_owned(),
        )),
        AttributeType::Tensor => {
            let t = attr
                .t
                .as_ref()
                .ok_or_else(|| OnnxError::UnsupportedAttribute(attr.name.clone()))?;
            Ok(AttributeValue::Tensor(tensor_from_proto(t)?))
        }
        AttributeType::Graph => {
            let g = attr
                .g
                .as_ref()
                .ok_or_else(|| OnnxError::UnsupportedAttribute(attr.name.clone()))?;
            Ok(AttributeValue::Graph(subgraph_from_proto(g)?))
        }
        AttributeType::Floats => Ok(AttributeValue::Floats(attr.floats.clone())),
        AttributeType::Ints => Ok(AttributeValue::Ints(attr.ints.clone())),
        AttributeType::Strings => Ok(AttributeValue::Strings(
            attr.strings
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
        )),
        AttributeType::Undefined | AttributeType::Tensors | AttributeType::Graphs => {
            Err(OnnxError::UnsupportedAttribute(attr.name.clone()).into())
        }
    }
}

fn tensor_from_proto(t: &proto::TensorProto) -> Result<Tensor> {
    let dtype = dtype_from_onnx(t.data_type)?;
    let shape: Vec<usize> = t.dims.iter().map(|&d| d as usize).collect();
    let expected: usize = shape.iter().product();

    let check_len = |actual: usize| -> Result<()> {
        if actual != expected {
            return Err(OnnxError::DataLengthMismatch {
                name: t.name.clone(),
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    };

    if !t.raw_data.is_empty() {
        return match dtype {
            DataType::F32 => {
                let data: Vec<f32> = t
                    .raw_data
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                check_len(data.len())?;
                Tensor::from_data(data, shape, dtype, TensorLayout::RowMajor)
            }
            DataType::I64 => {
                let data: Vec<i64> = t
                    .raw_data
                    .chunks_exact(8)
                    .map(|c| {
                        i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect();
                check_len(data.len())?;
                Tensor::from_i64(data, shape, TensorLayout::RowMajor)
            }
            DataType::I32 => {
                let data: Vec<f32> = t
                    .raw_data
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32)
                    .collect();
                check_len(data.len())?;
                Tensor::from_data(data, shape, dtype, TensorLayout::RowMajor)
            }
            DataType::I8 => {
                let data: Vec<f32> = t.raw_data.iter().map(|&b| f32::from(b as i8)).collect();
                check_len(data.len())?;
                Tensor::from_data(data, shape, dtype, TensorLayout::RowMajor)
            }
            DataType::U8 | DataType::Bool => {
                let data: Vec<f32> = t.raw_data.iter().map(|&b| f32::from(b)).collect();
                check_len(data.len())?;
                Tensor::from_data(data, shape, dtype, TensorLayout::RowMajor)
            }
            other => Err(anyhow::anyhow!(
                "raw_data for initializer '{}' with element type {other:?} is not supported",
                t.name
            )),
        };
    }

    match dtype {
        DataType::F32 if !t.float_data.is_empty() => {
            check_len(t.float_data.len())?;
            Tensor::from_data(t.float_data.clone(), shape, dtype, TensorLayout::RowMajor)
        }
        DataType::I64 if !t.int64_data.is_empty() => {
            check_len(t.int64_data.len())?;
            Tensor::from_i64(t.int64_data.clone(), shape, TensorLayout::RowMajor)
        }
        DataType::I8 | DataType::I32 | DataType::U8 | DataType::Bool
            if !t.int32_data.is_empty() =>
        {
            check_len(t.int32_data.len())?;
            let data = t.int32_data.iter().map(|&v| v as f32).collect();
            Tensor::from_data(data, shape, dtype, TensorLayout::RowMajor)
        }
        _ => Err(OnnxError::EmptyTensor(t.name.clone()).into()),
    }
}

fn value_info_to_spec(info: &proto::ValueInfoProto) -> Result<TensorSpec> {
    let tensor_type = match info.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(proto::type_proto::Value::TensorType(t)) => t,
        None => return Err(OnnxError::MissingTensorType(info.name.clone()).into()),
    };

    let dtype = dtype_from_onnx(tensor_type.elem_type)?;
    let dims = tensor_type
        .shape
        .as_ref()
        .map(|shape| {
            shape
                .dim
                .iter()
                .map(|d| match &d.value {
                    Some(proto::tensor_shape_proto::dimension::Value::DimValue(v))
                        if *v >= 0 =>
                    {
                        Dim::Fixed(*v as usize)
                    }
                    Some(proto::tensor_shape_proto::dimension::Value::DimParam(p)) => {
                        Dim::Symbolic(p.clone())
                    }
                    // A negative or missing extent is an unnamed dynamic dim.
                    _ => Dim::Symbolic("?".to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(TensorSpec {
        name: info.name.clone(),
        dims,
        dtype,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_graph_is_rejected() {
        let model = proto::ModelProto {
            ir_version: 8,
            ..Default::default()
        };
        let result = ModelLoader::new().load_bytes(&model.encode_to_vec());
        assert!(result.is_err());
    }

    #[test]
    fn test_old_ir_version_is_rejected() {
        let model = proto::ModelProto {
            ir_version: 2,
            graph: Some(proto::GraphProto::default()),
            ..Default::default()
        };
        let result = ModelLoader::new().load_bytes(&model.encode_to_vec());
        assert!(result.unwrap_err().to_string().contains("IR version"));
    }

    #[test]
    fn test_raw_data_f32_decoding() -> Result<()> {
        let mut raw = Vec::new();
        for v in [1.5f32, -2.25, 0.0] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let t = tensor_from_proto(&proto::TensorProto {
            dims: vec![3],
            data_type: proto::tensor_proto::DataType::Float as i32,
            name: "w".to_string(),
            raw_data: raw,
            ..Default::default()
        })?;
        assert_eq!(t.to_vec()?, vec![1.5, -2.25, 0.0]);
        assert_eq!(t.dtype(), DataType::F32);
        Ok(())
    }

    #[test]
    fn test_raw_data_i8_decoding() -> Result<()> {
        let t = tensor_from_proto(&proto::TensorProto {
            dims: vec![2],
            data_type: proto::tensor_proto::DataType::Int8 as i32,
            name: "q".to_string(),
            raw_data: vec![0xFF, 0x7F],
            ..Default::default()
        })?;
        assert_eq!(t.dtype(), DataType::I8);
        assert_eq!(t.to_vec()?, vec![-1.0, 127.0]);
        Ok(())
    }

    #[test]
    fn test_payload_length_mismatch_is_rejected() {
        let result = tensor_from_proto(&proto::TensorProto {
            dims: vec![4],
            data_type: proto::tensor_proto::DataType::Float as i32,
            name: "w".to_string(),
            float_data: vec![1.0, 2.0],
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_initializer_is_rejected() {
        let result = tensor_from_proto(&proto::TensorProto {
            dims: vec![2],
            data_type: proto::tensor_proto::DataType::Float as i32,
            name: "w".to_string(),
            ..Default::default()
        });
        assert!(result.unwrap_err().to_string().contains("no data"));
    }

    #[test]
    fn test_empty_node_names_are_synthesized() -> Result<()> {
        let graph = proto::GraphProto {
            node: vec![proto::NodeProto {
                input: vec!["x".to_string()],
                output: vec!["y".to_string()],
                op_type: "Relu".to_string(),
                ..Default::default()
            }],
            name: "g".to_string(),
            input: vec![value_info("x")],
            output: vec![value_info("y")],
            ..Default::default()
        };
        let model = proto::ModelProto {
            ir_version: 8,
            graph: Some(graph),
            ..Default::default()
        };

        let loaded = ModelLoader::new().load_bytes(&model.encode_to_vec())?;
        assert_eq!(loaded.graph.nodes[0].name, "relu_0");
        Ok(())
    }

    #[test]
    fn test_subgraph_initializers_are_rejected() {
        let sub = proto::GraphProto {
            initializer: vec![proto::TensorProto {
                dims: vec![1],
                data_type: 1,
                name: "c".to_string(),
                float_data: vec![1.0],
                ..Default::default()
            }],
            name: "branch".to_string(),
            ..Default::default()
        };
        assert!(subgraph_from_proto(&sub).is_err());
    }

    fn value_info(name: &str) -> proto::ValueInfoProto {
        proto::ValueInfoProto {
            name: name.to_string(),
            r#type: Some(proto::TypeProto {
                value: Some(proto::type_proto::Value::TensorType(
                    proto::type_proto::Tensor {
                        elem_type: proto::tensor_proto::DataType::Float as i32,
                        shape: Some(proto::TensorShapeProto {
                            dim: vec![proto::tensor_shape_proto::Dimension {
                                denotation: String::new(),
                                value: Some(
                                    proto::tensor_shape_proto::dimension::Value::DimValue(1),
                                ),
                            }],
                        }),
                    },
                )),
            }),
            doc_string: String::new(),
        }
    }
}
