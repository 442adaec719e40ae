use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::CodecError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_id: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[serde(alias = "float32")]
    F32,
    #[serde(alias = "uint8")]
    U8,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::U8 => 1,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::U8 => write!(f, "u8"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    /// Element count, or `None` if it does not fit in a `usize`. A rank-0
    /// shape holds one scalar.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0.as_slice())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
}

/// A flat, little-endian element buffer with its dtype and shape.
///
/// The buffer is reference counted, so cloning a tensor (for a retry, say)
/// does not copy element data.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub desc: TensorDesc,
    data: Bytes,
}

impl Tensor {
    /// Wraps raw little-endian bytes, checking the length against the shape.
    pub fn from_bytes(dtype: DType, shape: Shape, data: Bytes) -> Result<Self, CodecError> {
        let expected = shape
            .checked_numel()
            .and_then(|n| n.checked_mul(dtype.byte_size()));
        if expected != Some(data.len()) {
            let expected = expected.map_or_else(|| "more than usize::MAX".to_string(), |n| {
                n.to_string()
            });
            return Err(CodecError::ShapeMismatch {
                message: format!(
                    "{dtype} tensor of shape {shape} needs {expected} bytes, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            desc: TensorDesc { dtype, shape },
            data,
        })
    }

    pub fn from_u8(shape: Shape, values: Vec<u8>) -> Result<Self, CodecError> {
        Self::from_bytes(DType::U8, shape, Bytes::from(values))
    }

    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, CodecError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(DType::F32, shape, Bytes::from(bytes))
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    /// Element count. Exact, because construction checked the buffer length
    /// against the shape.
    pub fn numel(&self) -> usize {
        self.data.len() / self.desc.dtype.byte_size()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Borrows the elements of a `U8` tensor.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self.desc.dtype {
            DType::U8 => Some(&self.data),
            DType::F32 => None,
        }
    }

    /// Decodes the elements of an `F32` tensor.
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        match self.desc.dtype {
            DType::F32 => Some(
                self.data
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
            DType::U8 => None,
        }
    }

    /// Every element widened to `f32`, whatever the dtype.
    pub fn scores(&self) -> Vec<f32> {
        match self.desc.dtype {
            DType::U8 => self.data.iter().map(|&v| f32::from(v)).collect(),
            DType::F32 => self.to_f32_vec().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_buffer_of_wrong_length() {
        let err = Tensor::from_u8(Shape::from_slice(&[1, 4]), vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { .. }));
    }

    #[test]
    fn f32_tensor_decodes_what_it_encoded() {
        let values = [0.25f32, -1.5, 3.0];
        let tensor = Tensor::from_f32(Shape::from_slice(&[3]), &values).unwrap();
        assert_eq!(tensor.byte_len(), 12);
        assert_eq!(tensor.to_f32_vec().unwrap(), values);
        assert!(tensor.as_u8().is_none());
    }

    #[test]
    fn byte_scores_widen_to_f32() {
        let tensor = Tensor::from_u8(Shape::from_slice(&[1, 3]), vec![0, 9, 255]).unwrap();
        assert_eq!(tensor.scores(), vec![0.0, 9.0, 255.0]);
    }

    #[test]
    fn overflowing_shape_is_rejected_not_panicking() {
        let shape = Shape::from_slice(&[usize::MAX, 2]);
        assert_eq!(shape.checked_numel(), None);
        let err = Tensor::from_u8(shape, vec![0; 4]).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { .. }));

        // Fits as elements but not as f32 bytes.
        let shape = Shape::from_slice(&[usize::MAX / 2]);
        assert!(shape.checked_numel().is_some());
        assert!(Tensor::from_f32(shape, &[]).is_err());
    }
}
