//! Conversions between core data types and ONNX element type codes.

use caliper_core::DataType;

use crate::error::OnnxError;
use crate::proto::tensor_proto;

/// Maps a core data type to its ONNX element type code.
pub fn dtype_to_onnx(dtype: DataType) -> i32 {
    let code = match dtype {
        DataType::F32 => tensor_proto::DataType::Float,
        DataType::U8 => tensor_proto::DataType::Uint8,
        DataType::I8 => tensor_proto::DataType::Int8,
        DataType::I32 => tensor_proto::DataType::Int32,
        DataType::I64 => tensor_proto::DataType::Int64,
        DataType::Bool => tensor_proto::DataType::Bool,
        DataType::F16 => tensor_proto::DataType::Float16,
        DataType::F64 => tensor_proto::DataType::Double,
        DataType::BF16 => tensor_proto::DataType::Bfloat16,
    };
    code as i32
}

/// Maps an ONNX element type code to a core data type.
///
/// Returns [`OnnxError::UnsupportedDataType`] for codes outside the
/// supported subset (strings, complex types, unsigned wide integers).
pub fn dtype_from_onnx(code: i32) -> Result<DataType, OnnxError> {
    match tensor_proto::DataType::try_from(code) {
        Ok(tensor_proto::DataType::Float) => Ok(DataType::F32),
        Ok(tensor_proto::DataType::Uint8) => Ok(DataType::U8),
        Ok(tensor_proto::DataType::Int8) => Ok(DataType::I8),
        Ok(tensor_proto::DataType::Int32) => Ok(DataType::I32),
        Ok(tensor_proto::DataType::Int64) => Ok(DataType::I64),
        Ok(tensor_proto::DataType::Bool) => Ok(DataType::Bool),
        Ok(tensor_proto::DataType::Float16) => Ok(DataType::F16),
        Ok(tensor_proto::DataType::Double) => Ok(DataType::F64),
        Ok(tensor_proto::DataType::Bfloat16) => Ok(DataType::BF16),
        _ => Err(OnnxError::UnsupportedDataType(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_supported_dtypes() {
        let dtypes = [
            DataType::F32,
            DataType::U8,
            DataType::I8,
            DataType::I32,
            DataType::I64,
            DataType::Bool,
            DataType::F16,
            DataType::F64,
            DataType::BF16,
        ];
        for dtype in dtypes {
            let code = dtype_to_onnx(dtype);
            assert_eq!(dtype_from_onnx(code).ok(), Some(dtype));
        }
    }

    #[test]
    fn test_unsupported_codes_rejected() {
        // STRING and COMPLEX64 are outside the supported subset.
        assert!(dtype_from_onnx(8).is_err());
        assert!(dtype_from_onnx(14).is_err());
        assert!(dtype_from_onnx(999).is_err());
    }
}
