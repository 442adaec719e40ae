//! Image to tensor conversion.
//!
//! Images are resized with bilinear filtering to the spec's height and width,
//! converted to the spec's channel count (1 = luma, 3 = RGB, 4 = RGBA) and
//! packed in the spec's layout. `U8` specs receive the raw channel values,
//! `F32` specs receive `(value - offset) / scale`.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView};

use crate::{CodecError, DType, ImageDims, Layout, Tensor, TensorSpec};

const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Opens and decodes an image file.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, CodecError> {
    let path = path.as_ref();
    image::open(path).map_err(|e| {
        CodecError::invalid_image(format!("failed to open '{}': {e}", path.display()))
    })
}

/// Decodes an encoded image (PNG, JPEG) held in memory.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes)
        .map_err(|e| CodecError::invalid_image(format!("failed to decode image: {e}")))
}

/// Converts `image` into a tensor matching `spec`.
///
/// The output holds exactly `spec.numel()` elements and is identical for
/// identical inputs.
///
/// # Errors
///
/// * [`CodecError::InvalidImage`] if the image has no pixels.
/// * [`CodecError::UnsupportedSpec`] if `spec` is not a rank 4, batch 1
///   image spec with 1, 3 or 4 channels, or is `F32` without a usable
///   normalization.
pub fn preprocess(image: &DynamicImage, spec: &TensorSpec) -> Result<Tensor, CodecError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(CodecError::invalid_image(format!(
            "image has no pixels ({src_w}x{src_h})"
        )));
    }
    let dims = spec.image_dims()?;
    let samples = channel_samples(image, dims)?;

    let values = match spec.layout {
        Layout::Nhwc => samples,
        Layout::Nchw => to_planar(&samples, dims.channels),
    };

    match spec.dtype {
        DType::U8 => Tensor::from_u8(spec.shape.clone(), values),
        DType::F32 => {
            let norm = spec
                .normalization
                .ok_or_else(|| CodecError::unsupported("f32 spec has no normalization"))?;
            let floats: Vec<f32> = values.iter().map(|&v| norm.apply(v)).collect();
            Tensor::from_f32(spec.shape.clone(), &floats)
        }
    }
}

/// Resizes and returns interleaved 8-bit samples, row-major, `R,G,B[,A]`
/// order per pixel.
fn channel_samples(image: &DynamicImage, dims: ImageDims) -> Result<Vec<u8>, CodecError> {
    let width = u32::try_from(dims.width)
        .map_err(|_| CodecError::unsupported(format!("width {} is too large", dims.width)))?;
    let height = u32::try_from(dims.height)
        .map_err(|_| CodecError::unsupported(format!("height {} is too large", dims.height)))?;

    let samples = match dims.channels {
        1 => resized(image.to_luma8(), width, height).into_raw(),
        3 => resized(image.to_rgb8(), width, height).into_raw(),
        4 => resized(image.to_rgba8(), width, height).into_raw(),
        other => {
            return Err(CodecError::unsupported(format!(
                "channel count must be 1, 3 or 4, got {other}"
            )))
        }
    };
    Ok(samples)
}

fn resized<P>(
    buffer: image::ImageBuffer<P, Vec<u8>>,
    width: u32,
    height: u32,
) -> image::ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    if buffer.dimensions() == (width, height) {
        buffer
    } else {
        imageops::resize(&buffer, width, height, RESIZE_FILTER)
    }
}

/// HWC interleaved samples to CHW planes.
fn to_planar(interleaved: &[u8], channels: usize) -> Vec<u8> {
    let pixels = interleaved.len() / channels;
    let mut planar = vec![0u8; interleaved.len()];
    for (p, pixel) in interleaved.chunks_exact(channels).enumerate() {
        for (c, &value) in pixel.iter().enumerate() {
            planar[c * pixels + p] = value;
        }
    }
    planar
}
