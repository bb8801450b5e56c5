//! Deterministic model graphs for the regression suites.
//!
//! The classifier is engineered, not trained: channel 0 passes pixel
//! brightness through two pooling stages so each final spatial cell holds
//! the peak brightness of the matching [`crate::dataset`] grid cell, and the
//! classifier head reads exactly those cells. On patch data the class logit
//! is an order of magnitude above the others, which keeps top-1 accuracy
//! stable under INT8 quantization with any calibration method.

use std::collections::HashMap;

use caliper_core::{
    AttributeValue, DataType, GraphBuilder, ModelGraph, Tensor, TensorLayout, TensorSpec,
};

use crate::dataset::{IMAGE_SIZE, NUM_CLASSES, PATCH_SIZE};
use crate::error::Result;

/// Input tensor name of the harness models.
pub const INPUT_NAME: &str = "image";
/// Output tensor name of the patch classifier.
pub const OUTPUT_NAME: &str = "probabilities";

const CONV1_CHANNELS: usize = 4;
const FEATURES: usize = CONV1_CHANNELS * (IMAGE_SIZE / PATCH_SIZE) * (IMAGE_SIZE / PATCH_SIZE);

/// The patch classifier: Conv 3x3, Relu, MaxPool, Conv 1x1, Relu, MaxPool,
/// Reshape, Gemm, Softmax over `[N, 1, 16, 16]` images.
pub fn patch_classifier() -> Result<(ModelGraph, HashMap<String, Tensor>)> {
    let graph = GraphBuilder::new("patch_classifier")
        .doc("Labels each image by the grid cell holding its bright patch.")
        .input(TensorSpec::batched(
            INPUT_NAME,
            &[1, IMAGE_SIZE, IMAGE_SIZE],
            DataType::F32,
        ))
        .op("Conv", "conv1", &[INPUT_NAME, "conv1_weight"], &["conv1_out"])
        .attr("kernel_shape", AttributeValue::Ints(vec![3, 3]))
        .attr("pads", AttributeValue::Ints(vec![1, 1, 1, 1]))
        .op("Relu", "relu1", &["conv1_out"], &["conv1_act"])
        .op("MaxPool", "pool1", &["conv1_act"], &["pool1_out"])
        .attr("kernel_shape", AttributeValue::Ints(vec![2, 2]))
        .attr("strides", AttributeValue::Ints(vec![2, 2]))
        .op("Conv", "conv2", &["pool1_out", "conv2_weight"], &["conv2_out"])
        .attr("kernel_shape", AttributeValue::Ints(vec![1, 1]))
        .op("Relu", "relu2", &["conv2_out"], &["conv2_act"])
        .op("MaxPool", "pool2", &["conv2_act"], &["pool2_out"])
        .attr("kernel_shape", AttributeValue::Ints(vec![2, 2]))
        .attr("strides", AttributeValue::Ints(vec![2, 2]))
        .op("Reshape", "flatten", &["pool2_out", "flat_shape"], &["features"])
        .op("Gemm", "classifier", &["features", "fc_weight"], &["logits"])
        .attr("transB", AttributeValue::Int(1))
        .op("Softmax", "softmax", &["logits"], &[OUTPUT_NAME])
        .attr("axis", AttributeValue::Int(1))
        .output(TensorSpec::batched(
            OUTPUT_NAME,
            &[NUM_CLASSES],
            DataType::F32,
        ))
        .build()?;

    let mut initializers = HashMap::new();
    initializers.insert(
        "conv1_weight".to_string(),
        tensor(conv1_weights(), vec![CONV1_CHANNELS, 1, 3, 3])?,
    );
    initializers.insert(
        "conv2_weight".to_string(),
        tensor(conv2_weights(), vec![CONV1_CHANNELS, CONV1_CHANNELS, 1, 1])?,
    );
    initializers.insert(
        "flat_shape".to_string(),
        Tensor::from_i64(vec![-1, FEATURES as i64], vec![2], TensorLayout::RowMajor)?,
    );
    initializers.insert(
        "fc_weight".to_string(),
        tensor(fc_weights(), vec![NUM_CLASSES, FEATURES])?,
    );
    Ok((graph, initializers))
}

/// Model with an `If` branch: emits 1.0 when `flag` equals one, 2.0
/// otherwise.
pub fn branching_model() -> Result<(ModelGraph, HashMap<String, Tensor>)> {
    let graph = GraphBuilder::new("branching")
        .doc("Picks a constant by comparing the flag against one.")
        .input(TensorSpec::fixed("flag", &[1], DataType::F32))
        .op("Constant", "one", &[], &["one_value"])
        .attr("value", AttributeValue::Tensor(tensor(vec![1.0], vec![1])?))
        .op("Equal", "is_one", &["flag", "one_value"], &["cond"])
        .op("If", "pick", &["cond"], &["out"])
        .attr(
            "then_branch",
            AttributeValue::Graph(constant_branch("then", 1.0)?),
        )
        .attr(
            "else_branch",
            AttributeValue::Graph(constant_branch("else", 2.0)?),
        )
        .output(TensorSpec::fixed("out", &[1], DataType::F32))
        .build()?;
    Ok((graph, HashMap::new()))
}

fn constant_branch(name: &str, value: f32) -> Result<ModelGraph> {
    GraphBuilder::new(name)
        .op("Constant", "value", &[], &["branch_out"])
        .attr(
            "value",
            AttributeValue::Tensor(tensor(vec![value], vec![1])?),
        )
        .output(TensorSpec::fixed("branch_out", &[1], DataType::F32))
        .build()
}

fn tensor(data: Vec<f32>, shape: Vec<usize>) -> Result<Tensor> {
    Tensor::from_data(data, shape, DataType::F32, TensorLayout::RowMajor)
}

/// Channel 0 passes the center pixel, 1 and 2 respond to horizontal and
/// vertical edges, channel 3 is a local mean.
fn conv1_weights() -> Vec<f32> {
    let mut weights = vec![0.0f32; CONV1_CHANNELS * 9];
    weights[4] = 1.0;
    for row in 0..3 {
        weights[9 + row * 3] = -1.0;
        weights[9 + row * 3 + 2] = 1.0;
    }
    for col in 0..3 {
        weights[2 * 9 + col] = -1.0;
        weights[2 * 9 + 6 + col] = 1.0;
    }
    for k in 0..9 {
        weights[3 * 9 + k] = 1.0 / 9.0;
    }
    weights
}

/// 1x1 mixing: channel 0 stays clean, 1 and 2 are damped, channel 3 blends
/// all four.
fn conv2_weights() -> Vec<f32> {
    let mut weights = vec![0.0f32; CONV1_CHANNELS * CONV1_CHANNELS];
    weights[0] = 1.0;
    weights[CONV1_CHANNELS + 1] = 0.5;
    weights[2 * CONV1_CHANNELS + 2] = 0.5;
    for in_c in 0..CONV1_CHANNELS {
        weights[3 * CONV1_CHANNELS + in_c] = 0.25;
    }
    weights
}

/// Each class reads channel 0 at its own grid cell.
fn fc_weights() -> Vec<f32> {
    let cells = IMAGE_SIZE / PATCH_SIZE;
    let mut weights = vec![0.0f32; NUM_CLASSES * FEATURES];
    for class in 0..NUM_CLASSES {
        let (row, col) = (class / cells, class % cells);
        weights[class * FEATURES + row * cells + col] = 2.0;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_engines::{GraphEngine, InferenceEngine};

    fn single_input(name: &str, value: Tensor) -> HashMap<String, Tensor> {
        std::iter::once((name.to_string(), value)).collect()
    }

    fn clean_image(class: usize) -> Result<Tensor> {
        let (row0, col0) = crate::dataset::patch_origin(class);
        let mut pixels = vec![0.0f32; IMAGE_SIZE * IMAGE_SIZE];
        for row in row0..row0 + PATCH_SIZE {
            for col in col0..col0 + PATCH_SIZE {
                pixels[row * IMAGE_SIZE + col] = crate::dataset::PATCH_VALUE;
            }
        }
        tensor(pixels, vec![1, 1, IMAGE_SIZE, IMAGE_SIZE])
    }

    fn argmax(values: &[f32]) -> usize {
        let mut best = 0;
        for (index, value) in values.iter().enumerate() {
            if *value > values[best] {
                best = index;
            }
        }
        best
    }

    #[test]
    fn test_classifier_labels_every_patch_position() -> Result<()> {
        let (graph, initializers) = patch_classifier()?;
        let engine = GraphEngine::new(graph, initializers)?;
        for class in 0..NUM_CLASSES {
            let outputs = engine.run(single_input(INPUT_NAME, clean_image(class)?))?;
            let probabilities = outputs[OUTPUT_NAME].to_vec()?;
            assert_eq!(probabilities.len(), NUM_CLASSES);
            assert_eq!(argmax(&probabilities), class, "class {class}");
            assert!(
                probabilities[class] > 0.9,
                "class {class} got probability {}",
                probabilities[class]
            );
        }
        Ok(())
    }

    #[test]
    fn test_classifier_structure_is_stable() -> Result<()> {
        let (graph, initializers) = patch_classifier()?;
        assert_eq!(graph.nodes.len(), 9);
        assert_eq!(initializers.len(), 4);
        assert_eq!(graph.inputs[0].name, INPUT_NAME);
        assert_eq!(graph.outputs[0].name, OUTPUT_NAME);
        assert_eq!(
            initializers["fc_weight"].shape(),
            vec![NUM_CLASSES, FEATURES]
        );
        Ok(())
    }

    #[test]
    fn test_branching_model_selects_by_flag() -> Result<()> {
        let (graph, initializers) = branching_model()?;
        let engine = GraphEngine::new(graph, initializers)?;
        for (flag, expected) in [(1.0, 1.0), (0.0, 2.0), (5.0, 2.0)] {
            let outputs = engine.run(single_input("flag", tensor(vec![flag], vec![1])?))?;
            assert_eq!(outputs["out"].to_vec()?, vec![expected], "flag {flag}");
        }
        Ok(())
    }
}
