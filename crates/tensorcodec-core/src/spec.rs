use serde::{Deserialize, Serialize};

use crate::{CodecError, DType, Shape, Tensor};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IOName(pub String);

impl std::fmt::Display for IOName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordering of the batch, height, width and channel dims of an image tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `[batch, height, width, channels]`, channels interleaved per pixel.
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`, one plane per channel.
    Nchw,
}

/// Maps an 8-bit channel value `v` to `(v - offset) / scale`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub offset: f32,
    pub scale: f32,
}

impl Normalization {
    /// `[0, 255]` to `[0, 1]`.
    pub const UNIT: Self = Self {
        offset: 0.0,
        scale: 255.0,
    };

    /// `[0, 255]` to roughly `[-0.5, 0.5]`.
    pub const CENTERED: Self = Self {
        offset: 127.0,
        scale: 255.0,
    };

    #[inline]
    pub fn apply(&self, value: u8) -> f32 {
        (f32::from(value) - self.offset) / self.scale
    }

    fn validate(&self) -> Result<(), CodecError> {
        if !self.offset.is_finite() {
            return Err(CodecError::unsupported(format!(
                "normalization offset must be finite, got {}",
                self.offset
            )));
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(CodecError::unsupported(format!(
                "normalization scale must be finite and non-zero, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// Height, width and channel count of a validated image input spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDims {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

/// The shape, element type and value mapping a model expects for one tensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<IOName>,
    pub shape: Shape,
    pub dtype: DType,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization: Option<Normalization>,
}

impl TensorSpec {
    pub fn new(shape: &[usize], dtype: DType) -> Self {
        Self {
            name: None,
            shape: Shape::from_slice(shape),
            dtype,
            layout: Layout::default(),
            normalization: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(IOName(name.into()));
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = Some(normalization);
        self
    }

    /// Element count of a conforming tensor.
    pub fn numel(&self) -> Result<usize, CodecError> {
        self.shape.checked_numel().ok_or_else(|| {
            CodecError::unsupported(format!("shape {} has too many elements", self.shape))
        })
    }

    /// Checks that an image can be packed into this spec and returns the
    /// target dims.
    ///
    /// The shape must be rank 4 with a batch of 1, no zero dims and 1, 3 or
    /// 4 channels. `F32` specs need a usable normalization.
    pub fn image_dims(&self) -> Result<ImageDims, CodecError> {
        let dims = self.shape.dims();
        if dims.len() != 4 {
            return Err(CodecError::unsupported(format!(
                "image tensors must be rank 4, got shape {}",
                self.shape
            )));
        }
        self.numel()?;
        if dims.contains(&0) {
            return Err(CodecError::unsupported(format!(
                "shape {} has a zero dimension",
                self.shape
            )));
        }
        if dims[0] != 1 {
            return Err(CodecError::unsupported(format!(
                "batch size must be 1, got {}",
                dims[0]
            )));
        }

        let (height, width, channels) = match self.layout {
            Layout::Nhwc => (dims[1], dims[2], dims[3]),
            Layout::Nchw => (dims[2], dims[3], dims[1]),
        };
        if !matches!(channels, 1 | 3 | 4) {
            return Err(CodecError::unsupported(format!(
                "channel count must be 1, 3 or 4, got {channels}"
            )));
        }

        match (self.dtype, &self.normalization) {
            (DType::F32, None) => {
                return Err(CodecError::unsupported(
                    "f32 input specs need a normalization offset and scale",
                ))
            }
            (DType::F32, Some(norm)) => norm.validate()?,
            (DType::U8, _) => {}
        }

        Ok(ImageDims {
            height,
            width,
            channels,
        })
    }

    /// Checks a tensor produced by a model against this spec.
    pub fn check_tensor(&self, tensor: &Tensor) -> Result<(), CodecError> {
        if tensor.dtype() != self.dtype {
            return Err(CodecError::unsupported(format!(
                "expected a {} tensor, got {}",
                self.dtype,
                tensor.dtype()
            )));
        }
        let expected = self.numel()?;
        if tensor.numel() != expected {
            return Err(CodecError::ShapeMismatch {
                message: format!(
                    "expected {expected} elements (shape {}), got {} (shape {})",
                    self.shape,
                    tensor.numel(),
                    tensor.shape()
                ),
            });
        }
        Ok(())
    }

    /// Checks this declared spec against what a loaded model reports.
    pub fn check_compatible(&self, io: &IoDesc) -> Result<(), CodecError> {
        if io.dtype != self.dtype {
            return Err(CodecError::unsupported(format!(
                "'{}' is {} in the model, declared as {}",
                io.name, io.dtype, self.dtype
            )));
        }
        if io.dims.len() != self.shape.rank() {
            return Err(CodecError::unsupported(format!(
                "'{}' has rank {} in the model, declared shape is {}",
                io.name,
                io.dims.len(),
                self.shape
            )));
        }
        for (axis, (model_dim, declared)) in io.dims.iter().zip(self.shape.dims()).enumerate() {
            if let Some(model_dim) = model_dim {
                if model_dim != declared {
                    return Err(CodecError::unsupported(format!(
                        "'{}' axis {axis} is {model_dim} in the model, declared {declared}",
                        io.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One model input or output as reported by a backend.
#[derive(Clone, Debug)]
pub struct IoDesc {
    pub name: IOName,
    pub dtype: DType,
    pub dims: Vec<Option<usize>>, // None = dynamic
}

#[derive(Clone, Debug)]
pub struct ModelSpec {
    pub inputs: Vec<IoDesc>,
    pub outputs: Vec<IoDesc>,
}

impl ModelSpec {
    /// The sole input and output of a one-tensor-in, one-tensor-out model.
    pub fn single_io(&self) -> Result<(&IoDesc, &IoDesc), CodecError> {
        match (self.inputs.as_slice(), self.outputs.as_slice()) {
            ([input], [output]) => Ok((input, output)),
            (inputs, outputs) => Err(CodecError::unsupported(format!(
                "expected a model with one input and one output, it has {} and {}",
                inputs.len(),
                outputs.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io(dtype: DType, dims: Vec<Option<usize>>) -> IoDesc {
        IoDesc {
            name: IOName("input".to_string()),
            dtype,
            dims,
        }
    }

    #[test]
    fn nhwc_dims() {
        let spec = TensorSpec::new(&[1, 224, 200, 3], DType::U8);
        let dims = spec.image_dims().unwrap();
        assert_eq!((dims.height, dims.width, dims.channels), (224, 200, 3));
    }

    #[test]
    fn nchw_dims() {
        let spec = TensorSpec::new(&[1, 4, 16, 8], DType::U8).with_layout(Layout::Nchw);
        let dims = spec.image_dims().unwrap();
        assert_eq!((dims.height, dims.width, dims.channels), (16, 8, 4));
    }

    #[test]
    fn rejects_unusable_image_specs() {
        let cases = [
            TensorSpec::new(&[224, 224, 3], DType::U8),
            TensorSpec::new(&[1, 224, 224, 2], DType::U8),
            TensorSpec::new(&[2, 224, 224, 3], DType::U8),
            TensorSpec::new(&[1, 0, 224, 3], DType::U8),
            TensorSpec::new(&[1, 224, 224, 3], DType::F32),
            TensorSpec::new(&[1, 224, 224, 3], DType::F32).with_normalization(Normalization {
                offset: 0.0,
                scale: 0.0,
            }),
        ];
        for spec in cases {
            let err = spec.image_dims().unwrap_err();
            assert!(
                matches!(err, CodecError::UnsupportedSpec { .. }),
                "{spec:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn compatible_with_dynamic_batch() {
        let spec = TensorSpec::new(&[1, 224, 224, 3], DType::U8);
        spec.check_compatible(&io(DType::U8, vec![None, Some(224), Some(224), Some(3)]))
            .unwrap();
    }

    #[test]
    fn incompatible_dtype_or_dim() {
        let spec = TensorSpec::new(&[1, 224, 224, 3], DType::U8);
        assert!(spec
            .check_compatible(&io(DType::F32, vec![Some(1), Some(224), Some(224), Some(3)]))
            .is_err());
        assert!(spec
            .check_compatible(&io(DType::U8, vec![Some(1), Some(192), Some(192), Some(3)]))
            .is_err());
        assert!(spec
            .check_compatible(&io(DType::U8, vec![Some(1), Some(1001)]))
            .is_err());
    }

    #[test]
    fn single_io_requires_exactly_one_each() {
        let one = io(DType::U8, vec![Some(1), Some(3)]);
        let spec = ModelSpec {
            inputs: vec![one.clone()],
            outputs: vec![one.clone()],
        };
        spec.single_io().unwrap();

        let two_inputs = ModelSpec {
            inputs: vec![one.clone(), one.clone()],
            outputs: vec![one.clone()],
        };
        assert!(matches!(
            two_inputs.single_io(),
            Err(CodecError::UnsupportedSpec { .. })
        ));

        let no_outputs = ModelSpec {
            inputs: vec![one],
            outputs: Vec::new(),
        };
        assert!(no_outputs.single_io().is_err());
    }

    #[test]
    fn overflowing_shapes_are_unsupported() {
        let output = TensorSpec::new(&[usize::MAX, 2], DType::U8);
        assert!(matches!(
            output.numel(),
            Err(CodecError::UnsupportedSpec { .. })
        ));

        let input = TensorSpec::new(&[1, usize::MAX, usize::MAX, 3], DType::U8);
        assert!(matches!(
            input.image_dims(),
            Err(CodecError::UnsupportedSpec { .. })
        ));
    }

    #[test]
    fn check_tensor_counts_elements() {
        let spec = TensorSpec::new(&[1, 4], DType::U8);
        let ok = Tensor::from_u8(Shape::from_slice(&[4]), vec![0; 4]).unwrap();
        spec.check_tensor(&ok).unwrap();

        let short = Tensor::from_u8(Shape::from_slice(&[1, 3]), vec![0; 3]).unwrap();
        assert!(matches!(
            spec.check_tensor(&short),
            Err(CodecError::ShapeMismatch { .. })
        ));
    }
}
