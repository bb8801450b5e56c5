//! Shape manipulation, comparison and constant materialization.

use anyhow::{anyhow, Result};
use caliper_core::{DataType, GraphNode, Tensor};
use candle_core::Shape;

use crate::native::ExecutionContext;
use crate::ops::{require_tensor, Operator};

/// Reshape to a target shape given as an INT64 tensor.
///
/// Follows the ONNX conventions: a `0` copies the corresponding input
/// dimension and a single `-1` is inferred from the element count.
#[derive(Debug, Default)]
pub struct Reshape;

impl Operator for Reshape {
    fn op_type(&self) -> &'static str {
        "Reshape"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        if inputs.len() != 2 {
            return Err(anyhow!(
                "Reshape requires data and shape inputs, node '{}' has {}",
                node.name,
                inputs.len()
            ));
        }
        let data = &inputs[0];
        let targets = inputs[1].to_i64_vec()?;
        let input_shape = data.shape();
        let numel = data.numel();

        let mut resolved: Vec<usize> = Vec::with_capacity(targets.len());
        let mut infer_index = None;
        for (i, &target) in targets.iter().enumerate() {
            match target {
                -1 => {
                    if infer_index.is_some() {
                        return Err(anyhow!(
                            "Reshape node '{}' has more than one -1 in {targets:?}",
                            node.name
                        ));
                    }
                    infer_index = Some(i);
                    resolved.push(1);
                }
                0 => {
                    let dim = input_shape.get(i).ok_or_else(|| {
                        anyhow!(
                            "Reshape node '{}' copies dimension {i}, which the input {input_shape:?} does not have",
                            node.name
                        )
                    })?;
                    resolved.push(*dim);
                }
                t if t > 0 => resolved.push(t as usize),
                _ => {
                    return Err(anyhow!(
                        "Reshape node '{}' has invalid target dimension {target}",
                        node.name
                    ));
                }
            }
        }

        let known: usize = resolved.iter().product();
        if let Some(i) = infer_index {
            if known == 0 || numel % known != 0 {
                return Err(anyhow!(
                    "Reshape node '{}' cannot infer -1: {numel} elements into {targets:?}",
                    node.name
                ));
            }
            resolved[i] = numel / known;
        } else if known != numel {
            return Err(anyhow!(
                "Reshape node '{}' maps {numel} elements to {targets:?}",
                node.name
            ));
        }

        let result = data.candle_tensor().reshape(Shape::from_dims(&resolved))?;
        Ok(vec![Tensor::from_candle(result, data.dtype(), data.layout())])
    }
}

/// Element-wise equality, producing a boolean tensor.
#[derive(Debug, Default)]
pub struct Equal;

impl Operator for Equal {
    fn op_type(&self) -> &'static str {
        "Equal"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        if inputs.len() != 2 {
            return Err(anyhow!(
                "Equal requires 2 inputs, node '{}' has {}",
                node.name,
                inputs.len()
            ));
        }
        let a = &inputs[0];
        let b = &inputs[1];
        if a.shape() != b.shape() {
            return Err(anyhow!(
                "Equal requires identical shapes, node '{}' got {:?} and {:?}",
                node.name,
                a.shape(),
                b.shape()
            ));
        }

        let result = a.candle_tensor().eq(b.candle_tensor())?;
        Ok(vec![Tensor::from_candle(result, DataType::Bool, a.layout())])
    }
}

/// Materializes the tensor carried in the node's `value` attribute.
#[derive(Debug, Default)]
pub struct Constant;

impl Operator for Constant {
    fn op_type(&self) -> &'static str {
        "Constant"
    }

    fn execute(
        &self,
        _inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let value = require_tensor(node, "value")?;
        Ok(vec![value.clone()])
    }
}
