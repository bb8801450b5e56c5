//! Element-wise arithmetic and matrix multiplication.

use anyhow::{anyhow, Result};
use caliper_core::{GraphNode, Tensor};
use candle_core::Tensor as CandleTensor;

use crate::native::ExecutionContext;
use crate::ops::Operator;

/// Check and destructure the two operands of a binary operator.
fn binary_inputs<'a>(inputs: &'a [Tensor], node: &GraphNode) -> Result<(&'a Tensor, &'a Tensor)> {
    if inputs.len() != 2 {
        return Err(anyhow!(
            "{} requires 2 inputs, node '{}' has {}",
            node.op_type,
            node.name,
            inputs.len()
        ));
    }
    Ok((&inputs[0], &inputs[1]))
}

/// Whether two shapes are compatible under numpy broadcasting rules.
fn broadcastable(a: &[usize], b: &[usize]) -> bool {
    let mut a_rev = a.iter().rev();
    let mut b_rev = b.iter().rev();
    loop {
        match (a_rev.next(), b_rev.next()) {
            (Some(&x), Some(&y)) => {
                if x != y && x != 1 && y != 1 {
                    return false;
                }
            }
            (None, _) | (_, None) => return true,
        }
    }
}

/// Apply a broadcasting binary Candle op, keeping the left operand's type tag.
fn broadcast_op<F>(a: &Tensor, b: &Tensor, node: &GraphNode, op: F) -> Result<Vec<Tensor>>
where
    F: Fn(&CandleTensor, &CandleTensor) -> candle_core::Result<CandleTensor>,
{
    if !broadcastable(&a.shape(), &b.shape()) {
        return Err(anyhow!(
            "cannot broadcast shapes {:?} and {:?} in node '{}'",
            a.shape(),
            b.shape(),
            node.name
        ));
    }
    let result = op(a.candle_tensor(), b.candle_tensor())?;
    Ok(vec![Tensor::from_candle(result, a.dtype(), a.layout())])
}

/// Element-wise addition with broadcasting.
#[derive(Debug, Default)]
pub struct Add;

impl Operator for Add {
    fn op_type(&self) -> &'static str {
        "Add"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let (a, b) = binary_inputs(inputs, node)?;
        broadcast_op(a, b, node, |x, y| x.broadcast_add(y))
    }
}

/// Element-wise subtraction with broadcasting.
#[derive(Debug, Default)]
pub struct Sub;

impl Operator for Sub {
    fn op_type(&self) -> &'static str {
        "Sub"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let (a, b) = binary_inputs(inputs, node)?;
        broadcast_op(a, b, node, |x, y| x.broadcast_sub(y))
    }
}

/// Element-wise multiplication with broadcasting.
#[derive(Debug, Default)]
pub struct Mul;

impl Operator for Mul {
    fn op_type(&self) -> &'static str {
        "Mul"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let (a, b) = binary_inputs(inputs, node)?;
        broadcast_op(a, b, node, |x, y| x.broadcast_mul(y))
    }
}

/// Element-wise division with broadcasting.
#[derive(Debug, Default)]
pub struct Div;

impl Operator for Div {
    fn op_type(&self) -> &'static str {
        "Div"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let (a, b) = binary_inputs(inputs, node)?;
        broadcast_op(a, b, node, |x, y| x.broadcast_div(y))
    }
}

/// Matrix product, batched over leading dimensions.
#[derive(Debug, Default)]
pub struct MatMul;

impl Operator for MatMul {
    fn op_type(&self) -> &'static str {
        "MatMul"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let (a, b) = binary_inputs(inputs, node)?;
        let a_shape = a.shape();
        let b_shape = b.shape();
        if a_shape.len() < 2 || b_shape.len() < 2 {
            return Err(anyhow!(
                "MatMul requires rank >= 2 operands, node '{}' got {a_shape:?} and {b_shape:?}",
                node.name
            ));
        }
        if a_shape[a_shape.len() - 1] != b_shape[b_shape.len() - 2] {
            return Err(anyhow!(
                "inner dimensions do not agree in node '{}': {a_shape:?} x {b_shape:?}",
                node.name
            ));
        }

        let result = a.candle_tensor().matmul(b.candle_tensor())?;
        Ok(vec![Tensor::from_candle(result, a.dtype(), a.layout())])
    }
}
