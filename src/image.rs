//! Owned RGBA8 pixel buffer shared between noise sources, the normal map
//! deriver and the publishing step.

/// Row-major RGBA8 image.
///
/// Once a `TextureImage` has been handed to [`crate::texture::NoiseTexture`]
/// it is kept behind an `Arc` and never written again; each regeneration
/// produces a fresh buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TextureImage {
    /// A zero-sized image.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an existing RGBA8 buffer.
    ///
    /// Returns `None` if `data.len() != width * height * 4`.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Build an opaque greyscale image from one byte per pixel.
    pub fn from_luma8(width: u32, height: u32, luma: &[u8]) -> Option<Self> {
        if luma.len() != width as usize * height as usize {
            return None;
        }
        let data = luma.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// An image filled with a single colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            data: rgba.repeat(n),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `true` if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw RGBA8 bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Per-pixel Rec. 709 luminance in `[0, 1]`, row-major.
    pub fn luminance(&self) -> Vec<f64> {
        self.data
            .chunks_exact(4)
            .map(|px| {
                (0.2126 * px[0] as f64 + 0.7152 * px[1] as f64 + 0.0722 * px[2] as f64) / 255.0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer_length() {
        assert!(TextureImage::from_rgba8(2, 2, vec![0; 15]).is_none());
        assert!(TextureImage::from_luma8(3, 1, &[1, 2]).is_none());
    }

    #[test]
    fn luma_expands_to_opaque_grey() {
        let img = TextureImage::from_luma8(2, 1, &[10, 200]).expect("valid size");
        assert_eq!(img.pixel(0, 0), Some([10, 10, 10, 255]));
        assert_eq!(img.pixel(1, 0), Some([200, 200, 200, 255]));
        assert_eq!(img.pixel(2, 0), None);
    }

    #[test]
    fn grey_luminance_matches_channel_value() {
        let img = TextureImage::from_luma8(1, 1, &[255]).expect("valid size");
        assert!((img.luminance()[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_when_any_dimension_is_zero() {
        assert!(TextureImage::empty().is_empty());
        assert!(TextureImage::filled(0, 4, [0; 4]).is_empty());
        assert!(!TextureImage::filled(1, 1, [0; 4]).is_empty());
    }
}
