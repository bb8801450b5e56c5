//! Operator kernels executing graph nodes.
//!
//! Each kernel implements one ONNX operator type over the Candle backend.
//! Kernels are registered in an [`OperatorRegistry`] and dispatched by
//! operator type during graph execution.

pub mod control_flow;
pub mod math;
pub mod nn;
pub mod quantize;
pub mod tensor_ops;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use caliper_core::{AttributeValue, GraphNode, ModelGraph, Tensor};
use dashmap::DashMap;
use tracing::debug;

use crate::native::ExecutionContext;

/// A kernel implementing one operator type.
pub trait Operator: Send + Sync + std::fmt::Debug {
    /// The operator type this kernel implements, e.g. `"Conv"`.
    fn op_type(&self) -> &'static str;

    /// Execute a node on its resolved input tensors.
    ///
    /// `inputs` follows the node's input order. The context gives
    /// control-flow kernels access to subgraph execution against the values
    /// currently in scope; most kernels ignore it.
    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>>;
}

/// Registry of operator kernels indexed by operator type.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    ops: DashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            ops: DashMap::new(),
        }
    }

    /// Registry with every built-in kernel registered.
    pub fn with_standard_ops() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(math::Add));
        registry.register(Arc::new(math::Sub));
        registry.register(Arc::new(math::Mul));
        registry.register(Arc::new(math::Div));
        registry.register(Arc::new(math::MatMul));
        registry.register(Arc::new(nn::Relu));
        registry.register(Arc::new(nn::Softmax));
        registry.register(Arc::new(nn::Conv));
        registry.register(Arc::new(nn::MaxPool));
        registry.register(Arc::new(nn::Gemm));
        registry.register(Arc::new(tensor_ops::Reshape));
        registry.register(Arc::new(tensor_ops::Equal));
        registry.register(Arc::new(tensor_ops::Constant));
        registry.register(Arc::new(control_flow::If));
        registry.register(Arc::new(quantize::QuantizeLinear));
        registry.register(Arc::new(quantize::DequantizeLinear));
        registry
    }

    /// Register a kernel, replacing any previous one for the same type.
    pub fn register(&self, op: Arc<dyn Operator>) {
        debug!(op_type = op.op_type(), "registered operator kernel");
        self.ops.insert(op.op_type().to_string(), op);
    }

    /// Look up the kernel for an operator type.
    pub fn get(&self, op_type: &str) -> Option<Arc<dyn Operator>> {
        self.ops.get(op_type).map(|op| op.clone())
    }

    /// Whether a kernel exists for the operator type.
    pub fn supports(&self, op_type: &str) -> bool {
        self.ops.contains_key(op_type)
    }

    /// Sorted list of registered operator types.
    pub fn supported_ops(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.ops.iter().map(|entry| entry.key().clone()).collect();
        ops.sort();
        ops
    }
}

/// Integer attribute with a default.
pub fn int_attr(node: &GraphNode, name: &str, default: i64) -> i64 {
    node.attribute(name)
        .and_then(AttributeValue::as_int)
        .unwrap_or(default)
}

/// Float attribute with a default.
pub fn float_attr(node: &GraphNode, name: &str, default: f32) -> f32 {
    node.attribute(name)
        .and_then(AttributeValue::as_float)
        .unwrap_or(default)
}

/// Integer-list attribute with a default.
pub fn ints_attr(node: &GraphNode, name: &str, default: &[i64]) -> Vec<i64> {
    node.attribute(name)
        .and_then(AttributeValue::as_ints)
        .map_or_else(|| default.to_vec(), <[i64]>::to_vec)
}

/// Required subgraph attribute.
pub fn require_graph<'a>(node: &'a GraphNode, name: &str) -> Result<&'a ModelGraph> {
    node.attribute(name)
        .and_then(AttributeValue::as_graph)
        .ok_or_else(|| {
            anyhow!(
                "node '{}' is missing required subgraph attribute '{name}'",
                node.name
            )
        })
}

/// Required tensor attribute.
pub fn require_tensor<'a>(node: &'a GraphNode, name: &str) -> Result<&'a Tensor> {
    node.attribute(name)
        .and_then(AttributeValue::as_tensor)
        .ok_or_else(|| {
            anyhow!(
                "node '{}' is missing required tensor attribute '{name}'",
                node.name
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node_with(attributes: HashMap<String, AttributeValue>) -> GraphNode {
        GraphNode {
            id: 0,
            name: "n".to_string(),
            op_type: "Test".to_string(),
            inputs: vec![],
            outputs: vec![],
            attributes,
        }
    }

    #[test]
    fn test_standard_registry_covers_the_executed_subset() {
        let registry = OperatorRegistry::with_standard_ops();
        for op in [
            "Add", "Conv", "DequantizeLinear", "Equal", "Gemm", "If", "MatMul", "MaxPool",
            "QuantizeLinear", "Relu", "Reshape", "Softmax",
        ] {
            assert!(registry.supports(op), "missing kernel for {op}");
        }
        assert!(!registry.supports("Loop"));
    }

    #[test]
    fn test_supported_ops_is_sorted() {
        let ops = OperatorRegistry::with_standard_ops().supported_ops();
        let mut sorted = ops.clone();
        sorted.sort();
        assert_eq!(ops, sorted);
        assert_eq!(ops.len(), 16);
    }

    #[test]
    fn test_attr_helpers_fall_back_to_defaults() {
        let mut attributes = HashMap::new();
        attributes.insert("group".to_string(), AttributeValue::Int(2));
        let node = node_with(attributes);

        assert_eq!(int_attr(&node, "group", 1), 2);
        assert_eq!(int_attr(&node, "axis", -1), -1);
        assert_eq!(float_attr(&node, "alpha", 1.0), 1.0);
        assert_eq!(ints_attr(&node, "strides", &[1, 1]), vec![1, 1]);
        assert!(require_graph(&node, "then_branch").is_err());
        assert!(require_tensor(&node, "value").is_err());
    }
}
