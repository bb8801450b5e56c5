//! Hand-maintained prost mirror of the ONNX protobuf schema.
//!
//! Field numbers and enum values match upstream `onnx.proto`, so encoded
//! models interoperate with other ONNX tooling. Only the subset of messages
//! and fields this toolkit reads or writes is mirrored; unknown fields in
//! foreign models are skipped by prost during decoding.

/// Top-level model container.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelProto {
    /// Version of the IR format.
    #[prost(int64, tag = "1")]
    pub ir_version: i64,
    /// Name of the producing tool.
    #[prost(string, tag = "2")]
    pub producer_name: ::prost::alloc::string::String,
    /// Version of the producing tool.
    #[prost(string, tag = "3")]
    pub producer_version: ::prost::alloc::string::String,
    /// Reverse-DNS model namespace.
    #[prost(string, tag = "4")]
    pub domain: ::prost::alloc::string::String,
    /// Version of the model itself.
    #[prost(int64, tag = "5")]
    pub model_version: i64,
    /// Human-readable documentation.
    #[prost(string, tag = "6")]
    pub doc_string: ::prost::alloc::string::String,
    /// The computation graph.
    #[prost(message, optional, tag = "7")]
    pub graph: ::core::option::Option<GraphProto>,
    /// Operator sets the model depends on.
    #[prost(message, repeated, tag = "8")]
    pub opset_import: ::prost::alloc::vec::Vec<OperatorSetIdProto>,
    /// Named metadata entries.
    #[prost(message, repeated, tag = "14")]
    pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
}

/// An operator set requirement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OperatorSetIdProto {
    /// Operator domain; empty for the default ONNX domain.
    #[prost(string, tag = "1")]
    pub domain: ::prost::alloc::string::String,
    /// Opset version within the domain.
    #[prost(int64, tag = "2")]
    pub version: i64,
}

/// A key/value metadata entry.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringStringEntryProto {
    /// Entry key.
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    /// Entry value.
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

/// A computation graph: nodes plus boundary and constant tensors.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GraphProto {
    /// Topologically sortable list of operations.
    #[prost(message, repeated, tag = "1")]
    pub node: ::prost::alloc::vec::Vec<NodeProto>,
    /// Graph name.
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    /// Constant tensors referenced by name.
    #[prost(message, repeated, tag = "5")]
    pub initializer: ::prost::alloc::vec::Vec<TensorProto>,
    /// Human-readable documentation.
    #[prost(string, tag = "10")]
    pub doc_string: ::prost::alloc::string::String,
    /// Declared graph inputs.
    #[prost(message, repeated, tag = "11")]
    pub input: ::prost::alloc::vec::Vec<ValueInfoProto>,
    /// Declared graph outputs.
    #[prost(message, repeated, tag = "12")]
    pub output: ::prost::alloc::vec::Vec<ValueInfoProto>,
    /// Optional shape/type annotations for internal tensors.
    #[prost(message, repeated, tag = "13")]
    pub value_info: ::prost::alloc::vec::Vec<ValueInfoProto>,
}

/// A single operation.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeProto {
    /// Names of consumed tensors.
    #[prost(string, repeated, tag = "1")]
    pub input: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// Names of produced tensors.
    #[prost(string, repeated, tag = "2")]
    pub output: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// Node name, optionally empty.
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    /// Operator type, e.g. `Conv`.
    #[prost(string, tag = "4")]
    pub op_type: ::prost::alloc::string::String,
    /// Operator attributes.
    #[prost(message, repeated, tag = "5")]
    pub attribute: ::prost::alloc::vec::Vec<AttributeProto>,
    /// Human-readable documentation.
    #[prost(string, tag = "6")]
    pub doc_string: ::prost::alloc::string::String,
    /// Operator domain; empty for the default ONNX domain.
    #[prost(string, tag = "7")]
    pub domain: ::prost::alloc::string::String,
}

/// A named attribute carrying exactly one kind of payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AttributeProto {
    /// Attribute name.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Float payload.
    #[prost(float, tag = "2")]
    pub f: f32,
    /// Integer payload.
    #[prost(int64, tag = "3")]
    pub i: i64,
    /// UTF-8 string payload (bytes on the wire).
    #[prost(bytes = "vec", tag = "4")]
    pub s: ::prost::alloc::vec::Vec<u8>,
    /// Tensor payload.
    #[prost(message, optional, tag = "5")]
    pub t: ::core::option::Option<TensorProto>,
    /// Subgraph payload, used by control-flow operators.
    #[prost(message, optional, boxed, tag = "6")]
    pub g: ::core::option::Option<::prost::alloc::boxed::Box<GraphProto>>,
    /// Float-list payload.
    #[prost(float, repeated, tag = "7")]
    pub floats: ::prost::alloc::vec::Vec<f32>,
    /// Integer-list payload.
    #[prost(int64, repeated, tag = "8")]
    pub ints: ::prost::alloc::vec::Vec<i64>,
    /// String-list payload (bytes on the wire).
    #[prost(bytes = "vec", repeated, tag = "9")]
    pub strings: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    /// Human-readable documentation.
    #[prost(string, tag = "13")]
    pub doc_string: ::prost::alloc::string::String,
    /// Discriminant naming the populated payload field.
    #[prost(enumeration = "attribute_proto::AttributeType", tag = "20")]
    pub r#type: i32,
}

/// Nested types for [`AttributeProto`].
pub mod attribute_proto {
    /// Discriminant for the payload carried by an attribute.
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum AttributeType {
        /// No payload.
        Undefined = 0,
        /// `f` is populated.
        Float = 1,
        /// `i` is populated.
        Int = 2,
        /// `s` is populated.
        String = 3,
        /// `t` is populated.
        Tensor = 4,
        /// `g` is populated.
        Graph = 5,
        /// `floats` is populated.
        Floats = 6,
        /// `ints` is populated.
        Ints = 7,
        /// `strings` is populated.
        Strings = 8,
        /// `tensors` is populated (not mirrored here).
        Tensors = 9,
        /// `graphs` is populated (not mirrored here).
        Graphs = 10,
    }
}

/// A constant tensor value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TensorProto {
    /// Tensor dimensions.
    #[prost(int64, repeated, tag = "1")]
    pub dims: ::prost::alloc::vec::Vec<i64>,
    /// Element type, one of [`tensor_proto::DataType`] as i32.
    #[prost(int32, tag = "2")]
    pub data_type: i32,
    /// Float elements, used when `data_type` is FLOAT.
    #[prost(float, repeated, tag = "4")]
    pub float_data: ::prost::alloc::vec::Vec<f32>,
    /// Widened integer elements, used for INT8/UINT8/BOOL/INT32.
    #[prost(int32, repeated, tag = "5")]
    pub int32_data: ::prost::alloc::vec::Vec<i32>,
    /// 64-bit integer elements, used when `data_type` is INT64.
    #[prost(int64, repeated, tag = "7")]
    pub int64_data: ::prost::alloc::vec::Vec<i64>,
    /// Tensor name.
    #[prost(string, tag = "8")]
    pub name: ::prost::alloc::string::String,
    /// Little-endian packed elements, alternative to the typed fields.
    #[prost(bytes = "vec", tag = "9")]
    pub raw_data: ::prost::alloc::vec::Vec<u8>,
    /// Human-readable documentation.
    #[prost(string, tag = "12")]
    pub doc_string: ::prost::alloc::string::String,
}

/// Nested types for [`TensorProto`].
pub mod tensor_proto {
    /// Element types defined by the ONNX standard.
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum DataType {
        /// Unset.
        Undefined = 0,
        /// 32-bit IEEE float.
        Float = 1,
        /// 8-bit unsigned integer.
        Uint8 = 2,
        /// 8-bit signed integer.
        Int8 = 3,
        /// 16-bit unsigned integer.
        Uint16 = 4,
        /// 16-bit signed integer.
        Int16 = 5,
        /// 32-bit signed integer.
        Int32 = 6,
        /// 64-bit signed integer.
        Int64 = 7,
        /// UTF-8 strings.
        String = 8,
        /// Boolean.
        Bool = 9,
        /// 16-bit IEEE float.
        Float16 = 10,
        /// 64-bit IEEE float.
        Double = 11,
        /// 32-bit unsigned integer.
        Uint32 = 12,
        /// 64-bit unsigned integer.
        Uint64 = 13,
        /// Single-precision complex.
        Complex64 = 14,
        /// Double-precision complex.
        Complex128 = 15,
        /// bfloat16.
        Bfloat16 = 16,
    }
}

/// Name, type and shape of a graph boundary tensor.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValueInfoProto {
    /// Tensor name.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Tensor type and shape.
    #[prost(message, optional, tag = "2")]
    pub r#type: ::core::option::Option<TypeProto>,
    /// Human-readable documentation.
    #[prost(string, tag = "3")]
    pub doc_string: ::prost::alloc::string::String,
}

/// Type of a value; only tensor types are mirrored.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypeProto {
    /// The concrete type kind.
    #[prost(oneof = "type_proto::Value", tags = "1")]
    pub value: ::core::option::Option<type_proto::Value>,
}

/// Nested types for [`TypeProto`].
pub mod type_proto {
    /// A tensor type: element type plus shape.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Tensor {
        /// Element type, one of [`super::tensor_proto::DataType`] as i32.
        #[prost(int32, tag = "1")]
        pub elem_type: i32,
        /// Tensor shape; absent means unknown rank.
        #[prost(message, optional, tag = "2")]
        pub shape: ::core::option::Option<super::TensorShapeProto>,
    }

    /// The kinds of value types.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// A tensor type.
        #[prost(message, tag = "1")]
        TensorType(Tensor),
    }
}

/// Shape of a tensor as a list of dimensions.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TensorShapeProto {
    /// The dimensions, outermost first.
    #[prost(message, repeated, tag = "1")]
    pub dim: ::prost::alloc::vec::Vec<tensor_shape_proto::Dimension>,
}

/// Nested types for [`TensorShapeProto`].
pub mod tensor_shape_proto {
    /// One dimension: a concrete extent or a symbolic name.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Dimension {
        /// Standardized denotation of the dimension, if any.
        #[prost(string, tag = "3")]
        pub denotation: ::prost::alloc::string::String,
        /// The extent, concrete or symbolic.
        #[prost(oneof = "dimension::Value", tags = "1, 2")]
        pub value: ::core::option::Option<dimension::Value>,
    }

    /// Nested types for [`Dimension`].
    pub mod dimension {
        /// Concrete or symbolic extent of a dimension.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Value {
            /// Concrete extent.
            #[prost(int64, tag = "1")]
            DimValue(i64),
            /// Symbolic extent, e.g. a batch dimension name.
            #[prost(string, tag = "2")]
            DimParam(::prost::alloc::string::String),
        }
    }
}
