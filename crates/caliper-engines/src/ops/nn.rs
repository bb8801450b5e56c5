//! Neural-network operators: activations, convolution, pooling and Gemm.

use anyhow::{anyhow, Result};
use caliper_core::{AttributeValue, GraphNode, Tensor};

use crate::native::ExecutionContext;
use crate::ops::{float_attr, int_attr, ints_attr, Operator};

/// Check and destructure the single operand of a unary operator.
fn single_input<'a>(inputs: &'a [Tensor], node: &GraphNode) -> Result<&'a Tensor> {
    if inputs.len() != 1 {
        return Err(anyhow!(
            "{} requires 1 input, node '{}' has {}",
            node.op_type,
            node.name,
            inputs.len()
        ));
    }
    Ok(&inputs[0])
}

/// Reduce a per-axis attribute to the single value Candle accepts.
///
/// Candle's conv and pool kernels take one symmetric value per parameter, so
/// non-uniform strides, pads or dilations are rejected up front.
fn uniform(values: &[i64], what: &str, node: &GraphNode) -> Result<usize> {
    let first = *values
        .first()
        .ok_or_else(|| anyhow!("node '{}' has an empty {what} attribute", node.name))?;
    if first < 0 || values.iter().any(|&v| v != first) {
        return Err(anyhow!(
            "node '{}' has non-uniform {what} {values:?}, which the engines do not support",
            node.name
        ));
    }
    Ok(first as usize)
}

/// Rectified linear activation.
#[derive(Debug, Default)]
pub struct Relu;

impl Operator for Relu {
    fn op_type(&self) -> &'static str {
        "Relu"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let x = single_input(inputs, node)?;
        let result = x.candle_tensor().relu()?;
        Ok(vec![Tensor::from_candle(result, x.dtype(), x.layout())])
    }
}

/// Softmax along an axis, default the last.
#[derive(Debug, Default)]
pub struct Softmax;

impl Operator for Softmax {
    fn op_type(&self) -> &'static str {
        "Softmax"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let x = single_input(inputs, node)?;
        let rank = x.ndim() as i64;
        let axis = int_attr(node, "axis", -1);
        let dim = if axis < 0 { axis + rank } else { axis };
        if dim < 0 || dim >= rank {
            return Err(anyhow!(
                "Softmax axis {axis} is out of range for rank {rank} in node '{}'",
                node.name
            ));
        }

        let result = candle_nn::ops::softmax(x.candle_tensor(), dim as usize)?;
        Ok(vec![Tensor::from_candle(result, x.dtype(), x.layout())])
    }
}

/// 2D convolution over NCHW tensors, with optional bias.
#[derive(Debug, Default)]
pub struct Conv;

impl Operator for Conv {
    fn op_type(&self) -> &'static str {
        "Conv"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        if inputs.len() < 2 || inputs.len() > 3 {
            return Err(anyhow!(
                "Conv requires 2 or 3 inputs, node '{}' has {}",
                node.name,
                inputs.len()
            ));
        }
        let x = &inputs[0];
        let w = &inputs[1];
        if x.ndim() != 4 || w.ndim() != 4 {
            return Err(anyhow!(
                "Conv supports NCHW tensors only, node '{}' got {:?} and {:?}",
                node.name,
                x.shape(),
                w.shape()
            ));
        }

        let stride = uniform(&ints_attr(node, "strides", &[1, 1]), "strides", node)?;
        let padding = uniform(&ints_attr(node, "pads", &[0, 0, 0, 0]), "pads", node)?;
        let dilation = uniform(&ints_attr(node, "dilations", &[1, 1]), "dilations", node)?;
        let group = int_attr(node, "group", 1);
        if group < 1 {
            return Err(anyhow!("node '{}' has invalid group {group}", node.name));
        }

        let mut y = x
            .candle_tensor()
            .conv2d(w.candle_tensor(), padding, stride, dilation, group as usize)?;
        if let Some(b) = inputs.get(2) {
            let channels = b.numel();
            let bias = b.candle_tensor().reshape((1, channels, 1, 1))?;
            y = y.broadcast_add(&bias)?;
        }
        Ok(vec![Tensor::from_candle(y, x.dtype(), x.layout())])
    }
}

/// 2D max pooling over NCHW tensors.
#[derive(Debug, Default)]
pub struct MaxPool;

impl Operator for MaxPool {
    fn op_type(&self) -> &'static str {
        "MaxPool"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let x = single_input(inputs, node)?;
        if x.ndim() != 4 {
            return Err(anyhow!(
                "MaxPool supports NCHW tensors only, node '{}' got {:?}",
                node.name,
                x.shape()
            ));
        }
        if node.outputs.len() > 1 {
            return Err(anyhow!(
                "MaxPool node '{}' requests the Indices output, which is not supported",
                node.name
            ));
        }

        let kernel_shape = node
            .attribute("kernel_shape")
            .and_then(AttributeValue::as_ints)
            .ok_or_else(|| anyhow!("MaxPool node '{}' requires kernel_shape", node.name))?;
        let strides = ints_attr(node, "strides", &[1, 1]);
        if kernel_shape.len() != 2 || strides.len() != 2 {
            return Err(anyhow!(
                "MaxPool node '{}' must be 2D, got kernel {kernel_shape:?} strides {strides:?}",
                node.name
            ));
        }
        let pads = ints_attr(node, "pads", &[0, 0, 0, 0]);
        if pads.iter().any(|&p| p != 0) {
            return Err(anyhow!(
                "padded pooling is not supported in node '{}'",
                node.name
            ));
        }

        let result = x.candle_tensor().max_pool2d_with_stride(
            (kernel_shape[0] as usize, kernel_shape[1] as usize),
            (strides[0] as usize, strides[1] as usize),
        )?;
        Ok(vec![Tensor::from_candle(result, x.dtype(), x.layout())])
    }
}

/// General matrix multiplication: `alpha * A' * B' + beta * C`.
#[derive(Debug, Default)]
pub struct Gemm;

impl Operator for Gemm {
    fn op_type(&self) -> &'static str {
        "Gemm"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        if inputs.len() < 2 || inputs.len() > 3 {
            return Err(anyhow!(
                "Gemm requires 2 or 3 inputs, node '{}' has {}",
                node.name,
                inputs.len()
            ));
        }
        if inputs[0].ndim() != 2 || inputs[1].ndim() != 2 {
            return Err(anyhow!(
                "Gemm operands must be rank 2, node '{}' got {:?} and {:?}",
                node.name,
                inputs[0].shape(),
                inputs[1].shape()
            ));
        }

        let alpha = float_attr(node, "alpha", 1.0);
        let beta = float_attr(node, "beta", 1.0);
        let trans_a = int_attr(node, "transA", 0) != 0;
        let trans_b = int_attr(node, "transB", 0) != 0;

        let a = if trans_a {
            inputs[0].candle_tensor().t()?
        } else {
            inputs[0].candle_tensor().clone()
        };
        let b = if trans_b {
            inputs[1].candle_tensor().t()?
        } else {
            inputs[1].candle_tensor().clone()
        };

        let mut y = a.matmul(&b)?;
        if (alpha - 1.0).abs() > f32::EPSILON {
            y = y.affine(f64::from(alpha), 0.0)?;
        }
        if let Some(c) = inputs.get(2) {
            let bias = if (beta - 1.0).abs() > f32::EPSILON {
                c.candle_tensor().affine(f64::from(beta), 0.0)?
            } else {
                c.candle_tensor().clone()
            };
            y = y.broadcast_add(&bias)?;
        }
        Ok(vec![Tensor::from_candle(y, inputs[0].dtype(), inputs[0].layout())])
    }
}
