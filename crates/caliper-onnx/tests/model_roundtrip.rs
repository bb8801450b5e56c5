//! Round-trip tests: graphs exported to ONNX bytes and loaded back must
//! preserve structure, attributes, initializers and boundary specs.

use std::collections::HashMap;

use caliper_core::{
    AttributeValue, DataType, Dim, GraphBuilder, ModelGraph, Tensor, TensorLayout, TensorSpec,
};
use caliper_onnx::{ModelExporter, ModelLoader, IR_VERSION};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

// ============================================================================
// Plain Graphs
// ============================================================================

#[test]
fn test_graph_structure_survives_roundtrip() -> Result<()> {
    let graph = GraphBuilder::new("mlp")
        .input(TensorSpec::batched("x", &[4], DataType::F32))
        .op("MatMul", "hidden", &["x", "w1"], &["h"])
        .op("Relu", "act", &["h"], &["a"])
        .op("MatMul", "logits", &["a", "w2"], &["y"])
        .output(TensorSpec::batched("y", &[2], DataType::F32))
        .build()?;

    let mut initializers = HashMap::new();
    initializers.insert(
        "w1".to_string(),
        Tensor::from_data(vec![0.1; 12], vec![4, 3], DataType::F32, TensorLayout::RowMajor)?,
    );
    initializers.insert(
        "w2".to_string(),
        Tensor::from_data(vec![0.2; 6], vec![3, 2], DataType::F32, TensorLayout::RowMajor)?,
    );

    let bytes = ModelExporter::new().export(&graph, &initializers)?;
    let loaded = ModelLoader::new().load_bytes(&bytes)?;

    assert_eq!(loaded.ir_version, IR_VERSION);
    assert_eq!(loaded.graph.nodes.len(), 3);
    assert_eq!(loaded.graph.metadata.name, "mlp");
    for (original, reloaded) in graph.nodes.iter().zip(&loaded.graph.nodes) {
        assert_eq!(original.op_type, reloaded.op_type);
        assert_eq!(original.inputs, reloaded.inputs);
        assert_eq!(original.outputs, reloaded.outputs);
    }

    assert_eq!(loaded.initializers.len(), 2);
    assert_eq!(loaded.initializers["w1"].shape(), vec![4, 3]);
    assert_eq!(loaded.initializers["w2"].to_vec()?, vec![0.2; 6]);
    Ok(())
}

#[test]
fn test_symbolic_batch_dim_survives_roundtrip() -> Result<()> {
    let graph = GraphBuilder::new("sym")
        .input(TensorSpec::batched("x", &[1, 16, 16], DataType::F32))
        .op("Relu", "act", &["x"], &["y"])
        .output(TensorSpec::batched("y", &[1, 16, 16], DataType::F32))
        .build()?;

    let bytes = ModelExporter::new().export(&graph, &HashMap::new())?;
    let loaded = ModelLoader::new().load_bytes(&bytes)?;

    let input = &loaded.graph.inputs[0];
    assert_eq!(input.dims[0], Dim::Symbolic("N".to_string()));
    assert_eq!(input.dims[1], Dim::Fixed(1));
    assert!(input.accepts(&[32, 1, 16, 16]));
    Ok(())
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn test_attribute_kinds_survive_roundtrip() -> Result<()> {
    let value = Tensor::from_data(vec![3.0, 4.0], vec![2], DataType::F32, TensorLayout::RowMajor)?;
    let graph = GraphBuilder::new("attrs")
        .input(TensorSpec::fixed("x", &[1, 1, 8, 8], DataType::F32))
        .op("Conv", "conv", &["x", "w"], &["y"])
        .attr("kernel_shape", AttributeValue::Ints(vec![3, 3]))
        .attr("pads", AttributeValue::Ints(vec![1, 1, 1, 1]))
        .attr("alpha", AttributeValue::Float(0.5))
        .attr("group", AttributeValue::Int(1))
        .attr("auto_pad", AttributeValue::String("NOTSET".to_string()))
        .attr("scales", AttributeValue::Floats(vec![1.0, 2.0]))
        .attr("value", AttributeValue::Tensor(value))
        .output(TensorSpec::fixed("y", &[1, 1, 8, 8], DataType::F32))
        .build()?;

    let bytes = ModelExporter::new().export(&graph, &HashMap::new())?;
    let loaded = ModelLoader::new().load_bytes(&bytes)?;

    let node = &loaded.graph.nodes[0];
    assert_eq!(
        node.attribute("kernel_shape").and_then(AttributeValue::as_ints),
        Some(&[3i64, 3][..])
    );
    assert_eq!(
        node.attribute("alpha").and_then(AttributeValue::as_float),
        Some(0.5)
    );
    assert_eq!(
        node.attribute("group").and_then(AttributeValue::as_int),
        Some(1)
    );
    assert_eq!(
        node.attribute("auto_pad").and_then(AttributeValue::as_str),
        Some("NOTSET")
    );
    let tensor = node
        .attribute("value")
        .and_then(AttributeValue::as_tensor)
        .expect("tensor attribute");
    assert_eq!(tensor.to_vec()?, vec![3.0, 4.0]);
    Ok(())
}

#[test]
fn test_control_flow_subgraphs_survive_roundtrip() -> Result<()> {
    fn constant_branch(name: &str, value: f32) -> Result<ModelGraph> {
        Ok(GraphBuilder::new(name)
            .op("Constant", "value", &[], &["branch_out"])
            .attr(
                "value",
                AttributeValue::Tensor(Tensor::from_data(
                    vec![value],
                    vec![1],
                    DataType::F32,
                    TensorLayout::RowMajor,
                )?),
            )
            .output(TensorSpec::fixed("branch_out", &[1], DataType::F32))
            .build()?)
    }

    let graph = GraphBuilder::new("ifelse")
        .input(TensorSpec::fixed("cond", &[1], DataType::Bool))
        .op("If", "pick", &["cond"], &["out"])
        .attr("then_branch", AttributeValue::Graph(constant_branch("then", 1.0)?))
        .attr("else_branch", AttributeValue::Graph(constant_branch("else", 2.0)?))
        .output(TensorSpec::fixed("out", &[1], DataType::F32))
        .build()?;

    let bytes = ModelExporter::new().with_opset(11).export(&graph, &HashMap::new())?;
    let loaded = ModelLoader::new().load_bytes(&bytes)?;
    assert_eq!(loaded.opset_version, 11);

    let node = &loaded.graph.nodes[0];
    let then_branch = node
        .attribute("then_branch")
        .and_then(AttributeValue::as_graph)
        .expect("then branch");
    assert_eq!(then_branch.metadata.name, "then");
    assert_eq!(then_branch.nodes[0].op_type, "Constant");
    let payload = then_branch.nodes[0]
        .attribute("value")
        .and_then(AttributeValue::as_tensor)
        .expect("constant payload");
    assert_eq!(payload.to_vec()?, vec![1.0]);

    let else_branch = node
        .attribute("else_branch")
        .and_then(AttributeValue::as_graph)
        .expect("else branch");
    assert_eq!(else_branch.metadata.name, "else");
    Ok(())
}

// ============================================================================
// Initializer Element Types
// ============================================================================

#[test]
fn test_integer_initializers_survive_roundtrip() -> Result<()> {
    let graph = GraphBuilder::new("typed")
        .input(TensorSpec::fixed("x", &[1, 64], DataType::F32))
        .op("Reshape", "reshape", &["x", "shape"], &["r"])
        .op("DequantizeLinear", "dq", &["q", "scale"], &["d"])
        .op("Add", "add", &["r", "d"], &["y"])
        .output(TensorSpec::fixed("y", &[1, 64], DataType::F32))
        .build()?;

    let mut initializers = HashMap::new();
    initializers.insert(
        "shape".to_string(),
        Tensor::from_i64(vec![1, 64], vec![2], TensorLayout::RowMajor)?,
    );
    initializers.insert(
        "q".to_string(),
        Tensor::from_data(vec![-5.0; 64], vec![1, 64], DataType::I8, TensorLayout::RowMajor)?,
    );
    initializers.insert(
        "scale".to_string(),
        Tensor::from_data(vec![0.25], vec![1], DataType::F32, TensorLayout::RowMajor)?,
    );

    let bytes = ModelExporter::new().export(&graph, &initializers)?;
    let loaded = ModelLoader::new().load_bytes(&bytes)?;

    let shape = &loaded.initializers["shape"];
    assert_eq!(shape.dtype(), DataType::I64);
    assert_eq!(shape.to_i64_vec()?, vec![1, 64]);

    let q = &loaded.initializers["q"];
    assert_eq!(q.dtype(), DataType::I8);
    assert_eq!(q.to_vec()?, vec![-5.0; 64]);

    assert_eq!(loaded.initializers["scale"].to_vec()?, vec![0.25]);
    Ok(())
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_file_roundtrip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model.onnx");

    let graph = GraphBuilder::new("on_disk")
        .input(TensorSpec::fixed("x", &[3], DataType::F32))
        .op("Relu", "act", &["x"], &["y"])
        .output(TensorSpec::fixed("y", &[3], DataType::F32))
        .build()?;

    ModelExporter::new().export_to_file(&graph, &HashMap::new(), &path)?;
    assert!(path.exists());

    let loaded = ModelLoader::new().load_file(&path)?;
    assert_eq!(loaded.graph.metadata.name, "on_disk");
    assert_eq!(loaded.graph.nodes.len(), 1);
    Ok(())
}

#[test]
fn test_malformed_bytes_are_rejected() {
    // 0xFF encodes wire type 7, which protobuf does not define.
    let garbage = [0xFFu8; 16];
    assert!(ModelLoader::new().load_bytes(&garbage).is_err());
}
