//! Direct execution of in-memory model graphs.

use std::collections::HashMap;
use std::sync::Arc;

use caliper_core::{ModelGraph, NodeId, Tensor};
use tracing::debug;

use crate::engine::{EngineKind, InferenceEngine};
use crate::error::{EngineError, Result};
use crate::ops::OperatorRegistry;

/// Name-to-tensor bindings visible during execution.
///
/// Lookups fall through the per-run values, then the engine's constants,
/// then the enclosing scope. Subgraphs of control-flow operators get a child
/// scope whose parent is the scope of the executing node, which is what lets
/// them close over outer values.
#[derive(Debug, Default)]
pub(crate) struct Scope<'a> {
    values: HashMap<String, Tensor>,
    constants: Option<&'a HashMap<String, Tensor>>,
    parent: Option<&'a Scope<'a>>,
}

impl Scope<'_> {
    fn get(&self, name: &str) -> Option<&Tensor> {
        if let Some(value) = self.values.get(name) {
            return Some(value);
        }
        if let Some(value) = self.constants.and_then(|constants| constants.get(name)) {
            return Some(value);
        }
        self.parent.and_then(|parent| parent.get(name))
    }
}

/// Execution state handed to operator kernels.
///
/// Most kernels only use their resolved inputs; control-flow kernels use the
/// context to run branch subgraphs against the values currently in scope.
pub struct ExecutionContext<'r, 's> {
    scope: &'r Scope<'s>,
    registry: &'r OperatorRegistry,
}

impl ExecutionContext<'_, '_> {
    /// Look up a tensor visible to the executing node.
    pub fn lookup(&self, name: &str) -> Option<&Tensor> {
        self.scope.get(name)
    }

    /// Execute a subgraph against the current scope.
    ///
    /// Returns the subgraph's declared outputs in order. Free names inside
    /// the subgraph resolve to values captured from the enclosing scopes.
    pub fn run_subgraph(&self, graph: &ModelGraph) -> Result<Vec<Tensor>> {
        let order = graph.topological_sort()?;
        let mut child = Scope {
            values: HashMap::new(),
            constants: None,
            parent: Some(self.scope),
        };
        run_nodes(graph, &order, &mut child, self.registry)?;

        let mut outputs = Vec::with_capacity(graph.outputs.len());
        for spec in &graph.outputs {
            let value = child
                .get(&spec.name)
                .cloned()
                .ok_or_else(|| EngineError::MissingOutput(spec.name.clone()))?;
            outputs.push(value);
        }
        Ok(outputs)
    }
}

/// Execute nodes in `order`, resolving inputs through `scope` and inserting
/// produced tensors back into it.
fn run_nodes(
    graph: &ModelGraph,
    order: &[NodeId],
    scope: &mut Scope<'_>,
    registry: &OperatorRegistry,
) -> Result<()> {
    for &id in order {
        let node = &graph.nodes[id];
        let op = registry
            .get(&node.op_type)
            .ok_or_else(|| EngineError::UnsupportedOp(node.op_type.clone()))?;

        let mut inputs = Vec::with_capacity(node.inputs.len());
        for name in &node.inputs {
            let value = scope.get(name).cloned().ok_or_else(|| {
                EngineError::MissingTensor {
                    node: node.name.clone(),
                    tensor: name.clone(),
                }
            })?;
            inputs.push(value);
        }

        let ctx = ExecutionContext {
            scope: &*scope,
            registry,
        };
        let outputs = op.execute(&inputs, node, &ctx)?;
        if outputs.len() != node.outputs.len() {
            return Err(EngineError::OutputArity {
                node: node.name.clone(),
                expected: node.outputs.len(),
                actual: outputs.len(),
            }
            .into());
        }
        for (name, value) in node.outputs.iter().zip(outputs) {
            scope.values.insert(name.clone(), value);
        }
    }
    Ok(())
}

/// Executes models directly from their in-memory graph representation.
#[derive(Debug)]
pub struct GraphEngine {
    graph: ModelGraph,
    order: Vec<NodeId>,
    initializers: HashMap<String, Tensor>,
    registry: Arc<OperatorRegistry>,
}

impl GraphEngine {
    /// Build an engine for a graph and the constants bound to its free
    /// inputs. The graph is validated and its execution order fixed here,
    /// not per run.
    pub fn new(graph: ModelGraph, initializers: HashMap<String, Tensor>) -> Result<Self> {
        graph.validate()?;
        let order = graph.topological_sort()?;
        debug!(
            model = %graph.metadata.name,
            nodes = graph.nodes.len(),
            initializers = initializers.len(),
            "prepared graph engine"
        );
        Ok(Self {
            graph,
            order,
            initializers,
            registry: Arc::new(OperatorRegistry::with_standard_ops()),
        })
    }

    /// Replace the operator registry, e.g. to add custom kernels.
    pub fn with_registry(mut self, registry: Arc<OperatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// The executed graph.
    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Constants bound to the graph's free inputs.
    pub fn initializers(&self) -> &HashMap<String, Tensor> {
        &self.initializers
    }

    fn check_inputs(&self, inputs: &HashMap<String, Tensor>) -> Result<()> {
        for spec in &self.graph.inputs {
            let value = inputs
                .get(&spec.name)
                .ok_or_else(|| EngineError::MissingInput(spec.name.clone()))?;
            if !spec.accepts(&value.shape()) {
                return Err(EngineError::InputShapeMismatch {
                    name: spec.name.clone(),
                    expected: spec.dims.iter().map(|d| format!("{d:?}")).collect(),
                    actual: value.shape(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn execute(&self, inputs: HashMap<String, Tensor>) -> Result<Scope<'_>> {
        self.check_inputs(&inputs)?;
        let mut scope = Scope {
            values: inputs,
            constants: Some(&self.initializers),
            parent: None,
        };
        run_nodes(&self.graph, &self.order, &mut scope, &self.registry)?;
        Ok(scope)
    }

    /// Run the model, returning every tensor the run produced, inputs
    /// included. Calibration observes activation distributions through this
    /// without re-running the graph per tensor.
    pub fn run_traced(&self, inputs: HashMap<String, Tensor>) -> Result<HashMap<String, Tensor>> {
        let scope = self.execute(inputs)?;
        Ok(scope.values)
    }
}

impl InferenceEngine for GraphEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Graph
    }

    fn run(&self, inputs: HashMap<String, Tensor>) -> Result<HashMap<String, Tensor>> {
        let scope = self.execute(inputs)?;
        let mut outputs = HashMap::with_capacity(self.graph.outputs.len());
        for spec in &self.graph.outputs {
            let value = scope
                .get(&spec.name)
                .cloned()
                .ok_or_else(|| EngineError::MissingOutput(spec.name.clone()))?;
            outputs.insert(spec.name.clone(), value);
        }
        Ok(outputs)
    }
}

/// Run a closure against a context with an empty scope and the standard
/// registry. Lets kernel tests execute operators without a full engine.
#[cfg(test)]
pub(crate) fn with_test_context<R>(f: impl FnOnce(&ExecutionContext<'_, '_>) -> R) -> R {
    let registry = OperatorRegistry::with_standard_ops();
    let scope = Scope::default();
    let ctx = ExecutionContext {
        scope: &scope,
        registry: &registry,
    };
    f(&ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_core::{
        AttributeValue, DataType, GraphBuilder, TensorLayout, TensorSpec,
    };

    fn tensor(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
        Tensor::from_data(data, shape, DataType::F32, TensorLayout::RowMajor).unwrap()
    }

    fn inputs_of(pairs: Vec<(&str, Tensor)>) -> HashMap<String, Tensor> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_runs_weighted_graph_with_initializers() -> Result<()> {
        let graph = GraphBuilder::new("proj")
            .input(TensorSpec::batched("x", &[2], DataType::F32))
            .op("MatMul", "proj", &["x", "weight"], &["h"])
            .op("Relu", "act", &["h"], &["y"])
            .output(TensorSpec::batched("y", &[2], DataType::F32))
            .build()?;
        let mut initializers = HashMap::new();
        initializers.insert(
            "weight".to_string(),
            tensor(vec![1.0, 0.0, 0.0, -1.0], vec![2, 2]),
        );

        let engine = GraphEngine::new(graph, initializers)?;
        let outputs = engine.run(inputs_of(vec![("x", tensor(vec![3.0, 5.0], vec![1, 2]))]))?;
        assert_eq!(outputs["y"].to_vec()?, vec![3.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_missing_input_is_rejected() -> Result<()> {
        let graph = GraphBuilder::new("id")
            .input(TensorSpec::fixed("x", &[1], DataType::F32))
            .op("Relu", "act", &["x"], &["y"])
            .output(TensorSpec::fixed("y", &[1], DataType::F32))
            .build()?;
        let engine = GraphEngine::new(graph, HashMap::new())?;
        assert!(engine.run(HashMap::new()).is_err());
        Ok(())
    }

    #[test]
    fn test_input_shape_mismatch_is_rejected() -> Result<()> {
        let graph = GraphBuilder::new("id")
            .input(TensorSpec::fixed("x", &[2], DataType::F32))
            .op("Relu", "act", &["x"], &["y"])
            .output(TensorSpec::fixed("y", &[2], DataType::F32))
            .build()?;
        let engine = GraphEngine::new(graph, HashMap::new())?;
        let result = engine.run(inputs_of(vec![("x", tensor(vec![1.0, 2.0, 3.0], vec![3]))]));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_unsupported_op_is_reported() -> Result<()> {
        let graph = GraphBuilder::new("exotic")
            .input(TensorSpec::fixed("x", &[1], DataType::F32))
            .op("Loop", "iterate", &["x"], &["y"])
            .output(TensorSpec::fixed("y", &[1], DataType::F32))
            .build()?;
        let engine = GraphEngine::new(graph, HashMap::new())?;
        let err = engine
            .run(inputs_of(vec![("x", tensor(vec![1.0], vec![1]))]))
            .unwrap_err();
        assert!(err.to_string().contains("Loop"));
        Ok(())
    }

    #[test]
    fn test_run_traced_exposes_intermediates() -> Result<()> {
        let graph = GraphBuilder::new("chain")
            .input(TensorSpec::fixed("x", &[2], DataType::F32))
            .op("Relu", "act", &["x"], &["h"])
            .op("Add", "double", &["h", "h"], &["y"])
            .output(TensorSpec::fixed("y", &[2], DataType::F32))
            .build()?;
        let engine = GraphEngine::new(graph, HashMap::new())?;

        let traced = engine.run_traced(inputs_of(vec![("x", tensor(vec![-1.0, 2.0], vec![2]))]))?;
        assert_eq!(traced["x"].to_vec()?, vec![-1.0, 2.0]);
        assert_eq!(traced["h"].to_vec()?, vec![0.0, 2.0]);
        assert_eq!(traced["y"].to_vec()?, vec![0.0, 4.0]);
        Ok(())
    }

    fn branch(name: &str, value: f32) -> Result<ModelGraph> {
        GraphBuilder::new(name)
            .op("Constant", "value", &[], &["branch_out"])
            .attr(
                "value",
                AttributeValue::Tensor(tensor(vec![value], vec![1])),
            )
            .output(TensorSpec::fixed("branch_out", &[1], DataType::F32))
            .build()
    }

    #[test]
    fn test_if_selects_branch_by_condition() -> Result<()> {
        let graph = GraphBuilder::new("ifelse")
            .input(TensorSpec::fixed("x", &[1], DataType::F32))
            .op("Constant", "one", &[], &["one_value"])
            .attr("value", AttributeValue::Tensor(tensor(vec![1.0], vec![1])))
            .op("Equal", "is_one", &["x", "one_value"], &["cond"])
            .op("If", "pick", &["cond"], &["out"])
            .attr("then_branch", AttributeValue::Graph(branch("then", 1.0)?))
            .attr("else_branch", AttributeValue::Graph(branch("else", 2.0)?))
            .output(TensorSpec::fixed("out", &[1], DataType::F32))
            .build()?;
        let engine = GraphEngine::new(graph, HashMap::new())?;

        let hit = engine.run(inputs_of(vec![("x", tensor(vec![1.0], vec![1]))]))?;
        assert_eq!(hit["out"].to_vec()?, vec![1.0]);

        let miss = engine.run(inputs_of(vec![("x", tensor(vec![7.0], vec![1]))]))?;
        assert_eq!(miss["out"].to_vec()?, vec![2.0]);
        Ok(())
    }

    #[test]
    fn test_subgraph_captures_outer_scope() -> Result<()> {
        // The taken branch reads `h`, produced outside the subgraph.
        let capture = GraphBuilder::new("capture")
            .op("Add", "double", &["h", "h"], &["branch_out"])
            .output(TensorSpec::fixed("branch_out", &[2], DataType::F32))
            .build()?;
        let graph = GraphBuilder::new("outer")
            .input(TensorSpec::fixed("x", &[2], DataType::F32))
            .input(TensorSpec::fixed("flag", &[1], DataType::Bool))
            .op("Relu", "act", &["x"], &["h"])
            .op("If", "pick", &["flag"], &["out"])
            .attr("then_branch", AttributeValue::Graph(capture.clone()))
            .attr("else_branch", AttributeValue::Graph(capture))
            .output(TensorSpec::fixed("out", &[2], DataType::F32))
            .build()?;
        let engine = GraphEngine::new(graph, HashMap::new())?;

        let outputs = engine.run(inputs_of(vec![
            ("x", tensor(vec![-3.0, 4.0], vec![2])),
            (
                "flag",
                Tensor::from_data(vec![1.0], vec![1], DataType::Bool, TensorLayout::RowMajor)?,
            ),
        ]))?;
        assert_eq!(outputs["out"].to_vec()?, vec![0.0, 8.0]);
        Ok(())
    }
}
