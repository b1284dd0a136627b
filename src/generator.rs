//! Image generation for a noise texture: picks seamless or windowed sampling,
//! optionally converts the result to a normal map, and turns finished pixel
//! buffers into Bevy [`Image`]s.

use std::sync::Arc;

use bevy::{
    asset::RenderAssetUsages,
    image::{Image, ImageAddressMode, ImageFilterMode, ImageSampler, ImageSamplerDescriptor},
    math::Vec2,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};

use crate::{
    image::TextureImage,
    noise::NoiseSource,
    normal::{BoundaryMode, derive_normal_map},
};

/// Error returned when a texture setting is out of range.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureError {
    /// Either `width` or `height` was zero, which is not a valid wgpu texture size.
    ZeroDimension { width: u32, height: u32 },
    /// One or both dimensions exceeded [`MAX_DIMENSION`].
    DimensionTooLarge { width: u32, height: u32, max: u32 },
    /// Bump strength must be a finite, non-negative number.
    InvalidBumpStrength(f32),
    /// Both offset components must be finite.
    InvalidNoiseOffset([f32; 2]),
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::ZeroDimension { width, height } => write!(
                f,
                "texture dimensions must be non-zero (got {width}×{height})"
            ),
            TextureError::DimensionTooLarge { width, height, max } => write!(
                f,
                "texture dimensions {width}×{height} exceed MAX_DIMENSION={max}"
            ),
            TextureError::InvalidBumpStrength(s) => {
                write!(f, "bump strength must be finite and >= 0 (got {s})")
            }
            TextureError::InvalidNoiseOffset([x, y]) => {
                write!(f, "noise offset must be finite (got ({x}, {y}))")
            }
        }
    }
}

impl std::error::Error for TextureError {}

/// Maximum allowed texture dimension (per side).
pub const MAX_DIMENSION: u32 = 4096;

/// Dimension guard used by every size setter.
#[inline]
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::ZeroDimension { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(TextureError::DimensionTooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}

#[inline]
pub fn validate_bump_strength(strength: f32) -> Result<(), TextureError> {
    if strength.is_finite() && strength >= 0.0 {
        Ok(())
    } else {
        Err(TextureError::InvalidBumpStrength(strength))
    }
}

#[inline]
pub fn validate_noise_offset(offset: Vec2) -> Result<(), TextureError> {
    if offset.is_finite() {
        Ok(())
    } else {
        Err(TextureError::InvalidNoiseOffset(offset.to_array()))
    }
}

/// Everything one generation pass reads, captured at the moment the pass is
/// started so later edits to the texture cannot race it.
#[derive(Clone)]
pub struct GenerationRequest {
    pub width: u32,
    pub height: u32,
    pub noise_offset: Vec2,
    pub seamless: bool,
    pub as_normal_map: bool,
    pub bump_strength: f32,
    pub noise: Option<Arc<dyn NoiseSource>>,
}

/// Run one generation pass.
///
/// Returns `None` when no noise source is set, which is the normal state of
/// a texture that has not been configured yet.  A seamless request produces
/// a square `width × width` tile.
pub fn generate(request: &GenerationRequest) -> Option<TextureImage> {
    let noise = request.noise.as_ref()?;

    let image = if request.seamless {
        noise.sample_seamless(request.width)
    } else {
        noise.sample_windowed(request.width, request.height, request.noise_offset)
    };

    if request.as_normal_map {
        Some(derive_normal_map(
            &image,
            request.bump_strength,
            BoundaryMode::for_seamless(request.seamless),
        ))
    } else {
        Some(image)
    }
}

/// Convert a generated buffer into a Bevy [`Image`].
///
/// Seamless textures get a repeating sampler; windowed ones clamp to edge.
pub fn make_image(image: &TextureImage, seamless: bool) -> Image {
    let address_mode = if seamless {
        ImageAddressMode::Repeat
    } else {
        ImageAddressMode::ClampToEdge
    };
    let mut out = Image::new(
        Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        image.as_bytes().to_vec(),
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::default(),
    );
    out.sampler = ImageSampler::Descriptor(ImageSamplerDescriptor {
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        mag_filter: ImageFilterMode::Linear,
        min_filter: ImageFilterMode::Linear,
        ..Default::default()
    });
    out
}
