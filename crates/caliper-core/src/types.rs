//! Fundamental data structures shared across the workspace.
//!
//! Everything an exported model is made of lives here: logical data types,
//! boundary tensor specifications, node attributes (including nested
//! subgraphs for control flow) and the model graph itself. Behavior is
//! implemented in [`crate::graph`]; this module holds the shapes.

use std::collections::HashMap;

use crate::tensor::Tensor;

/// Identifier of a node inside a [`ModelGraph`], assigned by the builder.
pub type NodeId = usize;

/// Logical element type of a tensor.
///
/// Candle has no 8-bit integer storage, so `I8` tensors keep their values in
/// float storage while carrying this tag; the ONNX layer maps the tag back to
/// the proper wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit IEEE float.
    F32,
    /// 16-bit IEEE float.
    F16,
    /// bfloat16.
    BF16,
    /// 64-bit IEEE float.
    F64,
    /// 8-bit signed integer (symmetric quantization target).
    I8,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// Boolean.
    Bool,
}

impl DataType {
    /// Whether the type is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F16 | Self::BF16 | Self::F64)
    }
}

/// Preferred memory layout of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TensorLayout {
    /// C-contiguous, last dimension fastest.
    #[default]
    RowMajor,
    /// Fortran-contiguous, first dimension fastest.
    ColumnMajor,
}

/// A single dimension of a boundary tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Concrete extent.
    Fixed(usize),
    /// Named symbolic extent, e.g. a dynamic batch dimension `"N"`.
    Symbolic(String),
}

impl Dim {
    /// The concrete extent, if this dimension has one.
    pub fn fixed(&self) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(*n),
            Self::Symbolic(_) => None,
        }
    }

    /// Whether a runtime extent satisfies this dimension.
    pub fn accepts(&self, extent: usize) -> bool {
        match self {
            Self::Fixed(n) => *n == extent,
            Self::Symbolic(_) => true,
        }
    }
}

/// Declared name, shape and type of a graph input or output.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    /// Tensor name, unique within the graph boundary.
    pub name: String,
    /// Dimensions, possibly symbolic.
    pub dims: Vec<Dim>,
    /// Element type.
    pub dtype: DataType,
}

impl TensorSpec {
    /// Spec with fully concrete dimensions.
    pub fn fixed(name: impl Into<String>, dims: &[usize], dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|d| Dim::Fixed(*d)).collect(),
            dtype,
        }
    }

    /// Spec whose leading dimension is a symbolic batch dimension `"N"`.
    pub fn batched(name: impl Into<String>, tail: &[usize], dtype: DataType) -> Self {
        let mut dims = vec![Dim::Symbolic("N".to_string())];
        dims.extend(tail.iter().map(|d| Dim::Fixed(*d)));
        Self {
            name: name.into(),
            dims,
            dtype,
        }
    }

    /// Whether a runtime shape satisfies this spec.
    pub fn accepts(&self, shape: &[usize]) -> bool {
        self.dims.len() == shape.len()
            && self.dims.iter().zip(shape).all(|(d, s)| d.accepts(*s))
    }
}

/// Value of a node attribute.
///
/// Mirrors what the interchange format can carry; the `Graph` variant holds
/// the branch bodies of control-flow operators.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Single float.
    Float(f32),
    /// Single integer.
    Int(i64),
    /// Single string.
    String(String),
    /// Embedded constant tensor.
    Tensor(Tensor),
    /// Nested subgraph.
    Graph(ModelGraph),
    /// Float list.
    Floats(Vec<f32>),
    /// Integer list.
    Ints(Vec<i64>),
    /// String list.
    Strings(Vec<String>),
}

impl AttributeValue {
    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float payload, if this is a `Float`.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer-list payload, if this is an `Ints`.
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Self::Ints(v) => Some(v),
            _ => None,
        }
    }

    /// The string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The tensor payload, if this is a `Tensor`.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(v) => Some(v),
            _ => None,
        }
    }

    /// The subgraph payload, if this is a `Graph`.
    pub fn as_graph(&self) -> Option<&ModelGraph> {
        match self {
            Self::Graph(v) => Some(v),
            _ => None,
        }
    }
}

/// A single operation in a model graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Builder-assigned identifier, equal to the node's index.
    pub id: NodeId,
    /// Unique node name.
    pub name: String,
    /// Operator type, e.g. `"Conv"` or `"If"`.
    pub op_type: String,
    /// Names of consumed tensors, in operator order.
    pub inputs: Vec<String>,
    /// Names of produced tensors, in operator order.
    pub outputs: Vec<String>,
    /// Operator attributes.
    pub attributes: HashMap<String, AttributeValue>,
}

impl GraphNode {
    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// A data dependency between two nodes, derived from tensor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    /// Producing node.
    pub from: NodeId,
    /// Consuming node.
    pub to: NodeId,
    /// The tensor carried by this edge.
    pub tensor: String,
}

/// Descriptive information attached to a graph.
#[derive(Debug, Clone, Default)]
pub struct GraphMetadata {
    /// Graph name, used as the exported graph's name.
    pub name: String,
    /// Free-form documentation string.
    pub doc: String,
}

/// An in-memory model graph.
///
/// Nodes are stored in insertion order; `edges` is the derived data-dependency
/// relation over node ids. Tensors that are neither produced by a node nor
/// declared as inputs are free names, bound at execution time to initializers
/// or to values captured from an enclosing scope (subgraphs of control-flow
/// operators).
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    /// Operations in insertion order; `nodes[i].id == i`.
    pub nodes: Vec<GraphNode>,
    /// Derived data dependencies.
    pub edges: Vec<GraphEdge>,
    /// Declared graph inputs.
    pub inputs: Vec<TensorSpec>,
    /// Declared graph outputs.
    pub outputs: Vec<TensorSpec>,
    /// Descriptive metadata.
    pub metadata: GraphMetadata,
}
