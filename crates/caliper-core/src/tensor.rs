//! Tensor implementation backed by Candle.
//!
//! The wrapper pairs a Candle tensor with the logical [`DataType`] it
//! represents. The distinction matters for quantization: Candle has no i8
//! storage, so INT8 tensors keep rounded values in f32 storage and rely on
//! the tag when crossing the interchange boundary.

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Shape, Tensor as CandleTensor};

use crate::error::CoreError;
use crate::types::{DataType, TensorLayout};

/// A tensor with Candle storage and a logical element type.
#[derive(Debug, Clone)]
pub struct Tensor {
    /// The underlying Candle tensor.
    candle_tensor: CandleTensor,
    /// Logical element type.
    dtype: DataType,
    /// Memory layout preference.
    layout: TensorLayout,
}

/// Map a logical data type to the Candle storage type used for it.
fn storage_dtype(dtype: DataType) -> DType {
    match dtype {
        DataType::F32 => DType::F32,
        DataType::F16 => DType::F16,
        DataType::BF16 => DType::BF16,
        DataType::F64 => DType::F64,
        // Candle has no i8/i32 storage; values are kept in f32.
        DataType::I8 | DataType::I32 => DType::F32,
        DataType::I64 => DType::I64,
        DataType::U8 | DataType::Bool => DType::U8,
    }
}

impl Tensor {
    /// Create a tensor from f32 values, converting to the storage type of
    /// `dtype`.
    ///
    /// # Example
    /// ```rust
    /// use caliper_core::{DataType, Tensor, TensorLayout};
    ///
    /// let t = Tensor::from_data(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2], DataType::F32, TensorLayout::RowMajor)?;
    /// assert_eq!(t.shape(), vec![2, 2]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_data(
        data: Vec<f32>,
        shape: Vec<usize>,
        dtype: DataType,
        layout: TensorLayout,
    ) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(CoreError::ShapeMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }

        let device = Device::Cpu;
        let candle_shape = Shape::from_dims(&shape);

        let candle_tensor = match dtype {
            DataType::F32 | DataType::I8 | DataType::I32 => {
                CandleTensor::from_vec(data, candle_shape, &device)?
            }
            DataType::F16 => {
                let converted: Vec<half::f16> =
                    data.into_iter().map(half::f16::from_f32).collect();
                CandleTensor::from_vec(converted, candle_shape, &device)?
            }
            DataType::BF16 => {
                let converted: Vec<half::bf16> =
                    data.into_iter().map(half::bf16::from_f32).collect();
                CandleTensor::from_vec(converted, candle_shape, &device)?
            }
            DataType::F64 => {
                let converted: Vec<f64> = data.into_iter().map(f64::from).collect();
                CandleTensor::from_vec(converted, candle_shape, &device)?
            }
            DataType::I64 => {
                let converted: Vec<i64> = data.into_iter().map(|x| x as i64).collect();
                CandleTensor::from_vec(converted, candle_shape, &device)?
            }
            DataType::U8 => {
                let converted: Vec<u8> = data.into_iter().map(|x| x as u8).collect();
                CandleTensor::from_vec(converted, candle_shape, &device)?
            }
            DataType::Bool => {
                let converted: Vec<u8> = data.into_iter().map(|x| u8::from(x != 0.0)).collect();
                CandleTensor::from_vec(converted, candle_shape, &device)?
            }
        };

        Ok(Self {
            candle_tensor,
            dtype,
            layout,
        })
    }

    /// Create an INT64 tensor from i64 values.
    pub fn from_i64(data: Vec<i64>, shape: Vec<usize>, layout: TensorLayout) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(CoreError::ShapeMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }
        let candle_tensor =
            CandleTensor::from_vec(data, Shape::from_dims(&shape), &Device::Cpu)?;
        Ok(Self {
            candle_tensor,
            dtype: DataType::I64,
            layout,
        })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>, dtype: DataType, layout: TensorLayout) -> Result<Self> {
        let candle_tensor = CandleTensor::zeros(
            Shape::from_dims(&shape),
            storage_dtype(dtype),
            &Device::Cpu,
        )?;
        Ok(Self {
            candle_tensor,
            dtype,
            layout,
        })
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: Vec<usize>, dtype: DataType, layout: TensorLayout) -> Result<Self> {
        let candle_tensor = CandleTensor::ones(
            Shape::from_dims(&shape),
            storage_dtype(dtype),
            &Device::Cpu,
        )?;
        Ok(Self {
            candle_tensor,
            dtype,
            layout,
        })
    }

    /// Wrap an existing Candle tensor.
    pub fn from_candle(candle_tensor: CandleTensor, dtype: DataType, layout: TensorLayout) -> Self {
        Self {
            candle_tensor,
            dtype,
            layout,
        }
    }

    /// The underlying Candle tensor, for operator kernels.
    pub fn candle_tensor(&self) -> &CandleTensor {
        &self.candle_tensor
    }

    /// Tensor dimensions.
    pub fn shape(&self) -> Vec<usize> {
        self.candle_tensor.dims().to_vec()
    }

    /// Logical element type.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Memory layout preference.
    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.candle_tensor.dims().len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.candle_tensor.elem_count()
    }

    /// A copy of this tensor carrying a different logical type but the same
    /// storage. Valid only between types that share a storage type, e.g.
    /// tagging rounded f32 values as INT8.
    pub fn retagged(&self, dtype: DataType) -> Result<Self> {
        if storage_dtype(dtype) != self.candle_tensor.dtype() {
            return Err(anyhow!(
                "cannot retag {:?} storage as {dtype:?}",
                self.candle_tensor.dtype()
            ));
        }
        Ok(Self {
            candle_tensor: self.candle_tensor.clone(),
            dtype,
            layout: self.layout,
        })
    }

    /// Matrix multiplication of two rank-2 tensors.
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        let product = self.candle_tensor.matmul(&other.candle_tensor)?;
        Ok(Self::from_candle(product, self.dtype, self.layout))
    }

    /// Extract all values as f32, flattening multi-dimensional tensors in
    /// row-major order.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        let flattened = if self.candle_tensor.dims().len() > 1 {
            self.candle_tensor.flatten_all()?
        } else if self.candle_tensor.dims().is_empty() {
            self.candle_tensor.reshape((1,))?
        } else {
            self.candle_tensor.clone()
        };

        match self.dtype {
            DataType::F32 | DataType::I8 | DataType::I32 => Ok(flattened.to_vec1()?),
            DataType::F16 => {
                let data: Vec<half::f16> = flattened.to_vec1()?;
                Ok(data.into_iter().map(|x| x.to_f32()).collect())
            }
            DataType::BF16 => {
                let data: Vec<half::bf16> = flattened.to_vec1()?;
                Ok(data.into_iter().map(|x| x.to_f32()).collect())
            }
            DataType::F64 => {
                let data: Vec<f64> = flattened.to_vec1()?;
                Ok(data.into_iter().map(|x| x as f32).collect())
            }
            DataType::I64 => {
                let data: Vec<i64> = flattened.to_vec1()?;
                Ok(data.into_iter().map(|x| x as f32).collect())
            }
            DataType::U8 | DataType::Bool => {
                let data: Vec<u8> = flattened.to_vec1()?;
                Ok(data.into_iter().map(f32::from).collect())
            }
        }
    }

    /// Extract all values as i64.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        if self.dtype == DataType::I64 {
            let flattened = if self.candle_tensor.dims().len() > 1 {
                self.candle_tensor.flatten_all()?
            } else {
                self.candle_tensor.clone()
            };
            return Ok(flattened.to_vec1()?);
        }
        Ok(self.to_vec()?.into_iter().map(|x| x as i64).collect())
    }

    /// The single value of a one-element tensor.
    pub fn scalar_f32(&self) -> Result<f32> {
        if self.numel() != 1 {
            return Err(anyhow!(
                "expected a one-element tensor, got shape {:?}",
                self.shape()
            ));
        }
        Ok(self.to_vec()?[0])
    }
}
