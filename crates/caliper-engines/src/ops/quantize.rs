//! Symmetric INT8 quantize and dequantize operators.

use anyhow::{anyhow, Result};
use caliper_core::{DataType, GraphNode, Tensor};

use crate::native::ExecutionContext;
use crate::ops::Operator;

/// Widest representable magnitude of the symmetric INT8 range.
pub const INT8_LEVELS: f32 = 127.0;

/// Extract and validate the scale operand shared by both operators.
fn quant_params(inputs: &[Tensor], node: &GraphNode) -> Result<f32> {
    if inputs.len() < 2 || inputs.len() > 3 {
        return Err(anyhow!(
            "{} requires x, scale and an optional zero point, node '{}' has {} inputs",
            node.op_type,
            node.name,
            inputs.len()
        ));
    }
    let scale = inputs[1].scalar_f32()?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(anyhow!(
            "node '{}' has invalid quantization scale {scale}",
            node.name
        ));
    }
    if let Some(zero_point) = inputs.get(2) {
        if zero_point.scalar_f32()? != 0.0 {
            return Err(anyhow!(
                "node '{}' uses a nonzero zero point; only symmetric quantization is supported",
                node.name
            ));
        }
    }
    Ok(scale)
}

/// `y = clamp(round(x / scale), -127, 127)`, tagged INT8.
#[derive(Debug, Default)]
pub struct QuantizeLinear;

impl Operator for QuantizeLinear {
    fn op_type(&self) -> &'static str {
        "QuantizeLinear"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let scale = quant_params(inputs, node)?;
        let x = &inputs[0];

        let quantized = x
            .candle_tensor()
            .affine(1.0 / f64::from(scale), 0.0)?
            .round()?
            .clamp(-INT8_LEVELS, INT8_LEVELS)?;
        Ok(vec![Tensor::from_candle(
            quantized,
            DataType::I8,
            x.layout(),
        )])
    }
}

/// `y = x * scale`, back to F32.
#[derive(Debug, Default)]
pub struct DequantizeLinear;

impl Operator for DequantizeLinear {
    fn op_type(&self) -> &'static str {
        "DequantizeLinear"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        _ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let scale = quant_params(inputs, node)?;
        let x = &inputs[0];

        let restored = x.candle_tensor().affine(f64::from(scale), 0.0)?;
        Ok(vec![Tensor::from_candle(
            restored,
            DataType::F32,
            x.layout(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::with_test_context;
    use caliper_core::TensorLayout;
    use std::collections::HashMap;

    fn tensor(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
        Tensor::from_data(data, shape, DataType::F32, TensorLayout::RowMajor).unwrap()
    }

    fn node(op_type: &str) -> GraphNode {
        GraphNode {
            id: 0,
            name: format!("{}_under_test", op_type.to_lowercase()),
            op_type: op_type.to_string(),
            inputs: vec![],
            outputs: vec!["y".to_string()],
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_quantize_rounds_and_saturates() -> Result<()> {
        let x = tensor(vec![0.24, -0.26, 10.0, -10.0], vec![4]);
        let scale = tensor(vec![0.5], vec![1]);
        let out = with_test_context(|ctx| {
            QuantizeLinear.execute(&[x, scale], &node("QuantizeLinear"), ctx)
        })?;
        assert_eq!(out[0].dtype(), DataType::I8);
        // 0.48 rounds to 0, -0.52 rounds to -1.
        assert_eq!(out[0].to_vec()?, vec![0.0, -1.0, 20.0, -20.0]);
        Ok(())
    }

    #[test]
    fn test_quantize_saturates_at_int8_range() -> Result<()> {
        let x = tensor(vec![1000.0, -1000.0], vec![2]);
        let scale = tensor(vec![1.0], vec![1]);
        let out = with_test_context(|ctx| {
            QuantizeLinear.execute(&[x, scale], &node("QuantizeLinear"), ctx)
        })?;
        assert_eq!(out[0].to_vec()?, vec![127.0, -127.0]);
        Ok(())
    }

    #[test]
    fn test_dequantize_restores_scaled_values() -> Result<()> {
        let q = Tensor::from_data(
            vec![-4.0, 0.0, 6.0],
            vec![3],
            DataType::I8,
            TensorLayout::RowMajor,
        )?;
        let scale = tensor(vec![0.25], vec![1]);
        let out = with_test_context(|ctx| {
            DequantizeLinear.execute(&[q, scale], &node("DequantizeLinear"), ctx)
        })?;
        assert_eq!(out[0].dtype(), DataType::F32);
        assert_eq!(out[0].to_vec()?, vec![-1.0, 0.0, 1.5]);
        Ok(())
    }

    #[test]
    fn test_quantize_dequantize_is_within_half_step() -> Result<()> {
        let values = vec![0.9, -0.33, 0.17, 0.5001, -0.74];
        let x = tensor(values.clone(), vec![5]);
        let scale_value = 1.0 / INT8_LEVELS;
        let scale = tensor(vec![scale_value], vec![1]);

        let q = with_test_context(|ctx| {
            QuantizeLinear.execute(&[x, scale.clone()], &node("QuantizeLinear"), ctx)
        })?;
        let d = with_test_context(|ctx| {
            DequantizeLinear.execute(&[q[0].clone(), scale], &node("DequantizeLinear"), ctx)
        })?;

        for (original, restored) in values.iter().zip(d[0].to_vec()?) {
            assert!((original - restored).abs() <= scale_value / 2.0 + 1e-7);
        }
        Ok(())
    }

    #[test]
    fn test_nonzero_zero_point_is_rejected() {
        let x = tensor(vec![1.0], vec![1]);
        let scale = tensor(vec![0.5], vec![1]);
        let zero_point = tensor(vec![3.0], vec![1]);
        let result = with_test_context(|ctx| {
            QuantizeLinear.execute(&[x, scale, zero_point], &node("QuantizeLinear"), ctx)
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_non_positive_scale_is_rejected() {
        let x = tensor(vec![1.0], vec![1]);
        let scale = tensor(vec![0.0], vec![1]);
        let result = with_test_context(|ctx| {
            QuantizeLinear.execute(&[x, scale], &node("QuantizeLinear"), ctx)
        });
        assert!(result.is_err());
    }
}
