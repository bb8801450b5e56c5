//! Model graph construction, validation and traversal.
//!
//! [`ModelGraph`] itself is a plain data structure defined in
//! [`crate::types`]; this module implements the behavior on top of it:
//! structural validation, cycle detection, topological ordering and the
//! [`GraphBuilder`] used by model constructors throughout the workspace.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;

use crate::error::CoreError;
use crate::types::{
    AttributeValue, GraphEdge, GraphMetadata, GraphNode, ModelGraph, NodeId, TensorSpec,
};

/// Node coloring for the depth-first cycle check.
#[derive(Clone, Copy, PartialEq)]
enum NodeState {
    Unvisited,
    Visiting,
    Visited,
}

impl ModelGraph {
    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Map from produced tensor name to the id of the producing node.
    pub fn producer_index(&self) -> HashMap<&str, NodeId> {
        let mut producers = HashMap::new();
        for node in &self.nodes {
            for output in &node.outputs {
                producers.insert(output.as_str(), node.id);
            }
        }
        producers
    }

    /// Tensor names consumed by nodes but neither produced inside the graph
    /// nor declared as graph inputs.
    ///
    /// These are bound at execution time: to initializers for a top-level
    /// graph, or to values captured from the enclosing scope for the
    /// subgraphs of control-flow operators. First-seen order, deduplicated.
    pub fn free_inputs(&self) -> Vec<String> {
        let producers = self.producer_index();
        let declared: HashSet<&str> = self.inputs.iter().map(|s| s.name.as_str()).collect();
        let mut seen = HashSet::new();
        let mut free = Vec::new();
        for node in &self.nodes {
            for input in &node.inputs {
                if !producers.contains_key(input.as_str())
                    && !declared.contains(input.as_str())
                    && seen.insert(input.clone())
                {
                    free.push(input.clone());
                }
            }
        }
        free
    }

    /// Check the structural invariants of the graph.
    ///
    /// Rejects mismatched node ids, duplicate node names, tensors produced
    /// more than once (or shadowing a declared input), edges referencing
    /// nonexistent nodes, declared outputs nobody produces, and cycles.
    /// Subgraph attributes are validated recursively.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id != index {
                return Err(CoreError::InvalidGraph(format!(
                    "node {} has id {} but index {index}",
                    node.name, node.id
                ))
                .into());
            }
        }

        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(
                    CoreError::InvalidGraph(format!("duplicate node name {}", node.name)).into(),
                );
            }
        }

        let declared: HashSet<&str> = self.inputs.iter().map(|s| s.name.as_str()).collect();
        let mut produced = HashSet::new();
        for node in &self.nodes {
            for output in &node.outputs {
                if declared.contains(output.as_str()) {
                    return Err(CoreError::InvalidGraph(format!(
                        "tensor {output} is both a graph input and an output of node {}",
                        node.name
                    ))
                    .into());
                }
                if !produced.insert(output.as_str()) {
                    return Err(CoreError::InvalidGraph(format!(
                        "tensor {output} is produced more than once"
                    ))
                    .into());
                }
            }
        }

        for edge in &self.edges {
            if edge.from >= self.nodes.len() || edge.to >= self.nodes.len() {
                return Err(CoreError::InvalidGraph(format!(
                    "edge {} -> {} references a nonexistent node",
                    edge.from, edge.to
                ))
                .into());
            }
        }

        for spec in &self.outputs {
            if !produced.contains(spec.name.as_str()) && !declared.contains(spec.name.as_str()) {
                return Err(CoreError::InvalidGraph(format!(
                    "graph output {} is not produced by any node",
                    spec.name
                ))
                .into());
            }
        }

        self.check_acyclic()?;

        for node in &self.nodes {
            for value in node.attributes.values() {
                if let AttributeValue::Graph(subgraph) = value {
                    subgraph.validate()?;
                }
            }
        }

        Ok(())
    }

    /// Depth-first cycle detection over the edge relation.
    fn check_acyclic(&self) -> Result<()> {
        let mut adjacency: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            adjacency[edge.from].push(edge.to);
        }

        let mut state = vec![NodeState::Unvisited; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if state[start] == NodeState::Unvisited
                && Self::visit(start, &adjacency, &mut state)
            {
                return Err(CoreError::InvalidGraph(format!(
                    "cycle detected involving node {}",
                    self.nodes[start].name
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Returns true if a cycle is reachable from `node`.
    fn visit(node: NodeId, adjacency: &[Vec<NodeId>], state: &mut [NodeState]) -> bool {
        state[node] = NodeState::Visiting;
        for &next in &adjacency[node] {
            match state[next] {
                NodeState::Visiting => return true,
                NodeState::Unvisited => {
                    if Self::visit(next, adjacency, state) {
                        return true;
                    }
                }
                NodeState::Visited => {}
            }
        }
        state[node] = NodeState::Visited;
        false
    }

    /// Execution order via Kahn's algorithm.
    ///
    /// Nodes with equal depth keep their insertion order, so the result is
    /// deterministic for a given graph.
    pub fn topological_sort(&self) -> Result<Vec<NodeId>> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut adjacency: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            adjacency[edge.from].push(edge.to);
            in_degree[edge.to] += 1;
        }

        let mut ready: VecDeque<NodeId> = (0..self.nodes.len())
            .filter(|&id| in_degree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &next in &adjacency[id] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(CoreError::InvalidGraph(
                "graph contains a cycle, no topological order exists".to_string(),
            )
            .into());
        }
        Ok(order)
    }

    /// Recompute `edges` from the tensor names in `nodes`.
    ///
    /// Used by the builder and by the model loader after assembling nodes
    /// from an external representation.
    pub fn rebuild_edges(&mut self) {
        let mut producers: HashMap<String, NodeId> = HashMap::new();
        for node in &self.nodes {
            for output in &node.outputs {
                producers.insert(output.clone(), node.id);
            }
        }
        self.edges.clear();
        for node in &self.nodes {
            for input in &node.inputs {
                if let Some(&from) = producers.get(input) {
                    self.edges.push(GraphEdge {
                        from,
                        to: node.id,
                        tensor: input.clone(),
                    });
                }
            }
        }
    }

    /// Aggregate counts over the graph.
    pub fn statistics(&self) -> GraphStatistics {
        let mut op_frequency = HashMap::new();
        for node in &self.nodes {
            *op_frequency.entry(node.op_type.clone()).or_insert(0) += 1;
        }
        GraphStatistics {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            input_count: self.inputs.len(),
            output_count: self.outputs.len(),
            op_frequency,
        }
    }
}

/// Aggregate counts describing a graph.
#[derive(Debug, Clone)]
pub struct GraphStatistics {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of derived edges.
    pub edge_count: usize,
    /// Number of declared inputs.
    pub input_count: usize,
    /// Number of declared outputs.
    pub output_count: usize,
    /// Node count per operator type.
    pub op_frequency: HashMap<String, usize>,
}

/// Incremental builder for [`ModelGraph`].
///
/// Edges are derived from tensor names when [`GraphBuilder::build`] runs:
/// a node consuming a tensor another node produces depends on that node.
///
/// # Example
/// ```rust
/// use caliper_core::{AttributeValue, DataType, GraphBuilder, TensorSpec};
///
/// let graph = GraphBuilder::new("double")
///     .input(TensorSpec::fixed("x", &[2], DataType::F32))
///     .op("Add", "add", &["x", "x"], &["y"])
///     .output(TensorSpec::fixed("y", &[2], DataType::F32))
///     .build()?;
/// assert_eq!(graph.nodes.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    name: String,
    doc: String,
    nodes: Vec<GraphNode>,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    error: Option<String>,
}

impl GraphBuilder {
    /// Start a builder for a graph with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach a documentation string to the graph.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Declare a graph input.
    pub fn input(mut self, spec: TensorSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    /// Declare a graph output.
    pub fn output(mut self, spec: TensorSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    /// Append an operation node.
    pub fn op(mut self, op_type: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            id,
            name: name.to_string(),
            op_type: op_type.to_string(),
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
            outputs: outputs.iter().map(|s| (*s).to_string()).collect(),
            attributes: HashMap::new(),
        });
        self
    }

    /// Attach an attribute to the most recently appended node.
    pub fn attr(mut self, key: &str, value: AttributeValue) -> Self {
        match self.nodes.last_mut() {
            Some(node) => {
                node.attributes.insert(key.to_string(), value);
            }
            None => {
                self.error
                    .get_or_insert_with(|| format!("attribute {key} set before any node"));
            }
        }
        self
    }

    /// Derive edges, validate and produce the graph.
    pub fn build(self) -> Result<ModelGraph> {
        if let Some(message) = self.error {
            return Err(CoreError::InvalidGraph(message).into());
        }

        let mut graph = ModelGraph {
            nodes: self.nodes,
            edges: Vec::new(),
            inputs: self.inputs,
            outputs: self.outputs,
            metadata: GraphMetadata {
                name: self.name,
                doc: self.doc,
            },
        };
        graph.rebuild_edges();
        graph.validate()?;
        Ok(graph)
    }
}
