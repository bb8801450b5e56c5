//! Control-flow operators.

use anyhow::{anyhow, Result};
use caliper_core::{GraphNode, Tensor};

use crate::error::EngineError;
use crate::native::ExecutionContext;
use crate::ops::{require_graph, Operator};

/// Conditional execution of one of two branch subgraphs.
///
/// The selected branch runs against the enclosing scope, so branch nodes can
/// consume any tensor visible to the `If` node itself.
#[derive(Debug, Default)]
pub struct If;

impl Operator for If {
    fn op_type(&self) -> &'static str {
        "If"
    }

    fn execute(
        &self,
        inputs: &[Tensor],
        node: &GraphNode,
        ctx: &ExecutionContext<'_, '_>,
    ) -> Result<Vec<Tensor>> {
        let cond = inputs
            .first()
            .ok_or_else(|| anyhow!("If node '{}' requires a condition input", node.name))?;
        let taken = if cond.scalar_f32()? != 0.0 {
            require_graph(node, "then_branch")?
        } else {
            require_graph(node, "else_branch")?
        };

        let outputs = ctx.run_subgraph(taken)?;
        if outputs.len() != node.outputs.len() {
            return Err(EngineError::OutputArity {
                node: node.name.clone(),
                expected: node.outputs.len(),
                actual: outputs.len(),
            }
            .into());
        }
        Ok(outputs)
    }
}
