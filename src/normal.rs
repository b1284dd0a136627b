//! Convert a heightfield image into a tangent-space normal map.
//!
//! Height is taken from the luminance of each pixel.  Central differences
//! estimate the surface gradient at each texel and the result is encoded as
//! RGBA8 with:
//!   R = X  (tangent)
//!   G = Y  (bitangent)
//!   B = Z  (surface normal, always points outward)
//!   A = 255
//!
//! Components are remapped from [-1,1] to \[0, 255\] via
//! `round((n * 0.5 + 0.5) * 255)`.

use crate::image::TextureImage;

/// How to handle pixel neighbours at the image boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoundaryMode {
    /// Wrap indices toroidally. Matches images sampled with seamless tiling.
    Wrap,
    /// Replicate edge pixels. Matches images sampled from a window of an
    /// unbounded noise field.
    Clamp,
}

impl BoundaryMode {
    /// The boundary mode matching how the source image was sampled.
    pub fn for_seamless(seamless: bool) -> Self {
        if seamless {
            BoundaryMode::Wrap
        } else {
            BoundaryMode::Clamp
        }
    }
}

/// Derive a normal map from `height`, treating pixel luminance as elevation.
///
/// `strength` scales the per-pixel gradient.  The output has the same size as
/// the input.  An empty input yields an empty output.
pub fn derive_normal_map(
    height: &TextureImage,
    strength: f32,
    boundary: BoundaryMode,
) -> TextureImage {
    if height.is_empty() {
        return TextureImage::empty();
    }
    let heights = height.luminance();
    let data = height_to_normal(&heights, height.width(), height.height(), strength, boundary);
    TextureImage::from_rgba8(height.width(), height.height(), data).unwrap_or_default()
}

/// Convert a slice of normalised height values `[0, 1]` into a tangent-space
/// normal map encoded as RGBA8.
///
/// Gradients are measured in height units per pixel.
pub fn height_to_normal(
    heights: &[f64],
    width: u32,
    height: u32,
    strength: f32,
    boundary: BoundaryMode,
) -> Vec<u8> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let w = width as usize;
    let h = height as usize;
    let s = strength as f64;

    let mut out = vec![0u8; w * h * 4];

    for y in 0..h {
        for x in 0..w {
            let (xm, xp, ym, yp) = match boundary {
                BoundaryMode::Wrap => ((x + w - 1) % w, (x + 1) % w, (y + h - 1) % h, (y + 1) % h),
                BoundaryMode::Clamp => (
                    x.saturating_sub(1),
                    (x + 1).min(w - 1),
                    y.saturating_sub(1),
                    (y + 1).min(h - 1),
                ),
            };

            let left = heights[y * w + xm];
            let right = heights[y * w + xp];
            let above = heights[ym * w + x];
            let below = heights[yp * w + x];

            // Wrap is always a central difference over two pixels.  Under
            // Wrap xm can exceed xp, so `xp - xm` must not be computed there.
            // Clamp is one-sided at the border; a 1-pixel axis gives xm == xp
            // and a zero numerator, hence the max(1).
            let (x_dist, y_dist) = match boundary {
                BoundaryMode::Wrap => (2.0f64, 2.0f64),
                BoundaryMode::Clamp => ((xp - xm).max(1) as f64, (yp - ym).max(1) as f64),
            };
            let dx = (right - left) * s / x_dist;
            let dy = (below - above) * s / y_dist;

            let len = (dx * dx + dy * dy + 1.0).sqrt();
            let nx = -dx / len;
            let ny = -dy / len;
            let nz = 1.0 / len;

            let idx = (y * w + x) * 4;
            out[idx] = encode_normal(nx);
            out[idx + 1] = encode_normal(ny);
            out[idx + 2] = encode_normal(nz);
            out[idx + 3] = 255;
        }
    }

    out
}

#[inline]
fn encode_normal(n: f64) -> u8 {
    ((n * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Inverse of the channel encoding, mapping `[0, 255]` back to `[-1, 1]`.
#[inline]
pub fn decode_normal(c: u8) -> f64 {
    c as f64 / 127.5 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1.0 / 127.5;

    fn decode(px: [u8; 4]) -> [f64; 3] {
        [decode_normal(px[0]), decode_normal(px[1]), decode_normal(px[2])]
    }

    fn ramp_x(width: u32, height: u32) -> TextureImage {
        let luma: Vec<u8> = (0..height)
            .flat_map(|_| (0..width).map(|x| (x * 255 / (width - 1)) as u8))
            .collect();
        TextureImage::from_luma8(width, height, &luma).expect("valid size")
    }

    #[test]
    fn flat_image_points_straight_up() {
        for (w, h) in [(1, 1), (3, 5), (16, 16)] {
            let flat = TextureImage::filled(w, h, [90, 90, 90, 255]);
            for strength in [0.1, 1.0, 8.0, 32.0] {
                for boundary in [BoundaryMode::Wrap, BoundaryMode::Clamp] {
                    let normal = derive_normal_map(&flat, strength, boundary);
                    assert_eq!((normal.width(), normal.height()), (w, h));
                    for y in 0..h {
                        for x in 0..w {
                            let px = normal.pixel(x, y).expect("in bounds");
                            let [nx, ny, nz] = decode(px);
                            assert!(nx.abs() <= TOLERANCE, "nx={nx} at ({x},{y})");
                            assert!(ny.abs() <= TOLERANCE, "ny={ny} at ({x},{y})");
                            assert!((nz - 1.0).abs() <= TOLERANCE, "nz={nz} at ({x},{y})");
                            assert_eq!(px[3], 255);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn empty_image_yields_empty_result() {
        let out = derive_normal_map(&TextureImage::empty(), 8.0, BoundaryMode::Clamp);
        assert!(out.is_empty());
        assert!(out.as_bytes().is_empty());
        let zero_wide = TextureImage::filled(0, 7, [0; 4]);
        assert!(derive_normal_map(&zero_wide, 1.0, BoundaryMode::Wrap).is_empty());
    }

    #[test]
    fn rising_slope_tilts_normal_against_gradient() {
        let normal = derive_normal_map(&ramp_x(8, 4), 4.0, BoundaryMode::Clamp);
        let [nx, ny, nz] = decode(normal.pixel(4, 2).expect("in bounds"));
        assert!(nx < -0.1, "height rises to the right, normal must lean left (nx={nx})");
        assert!(ny.abs() <= TOLERANCE);
        assert!(nz > 0.0);
    }

    #[test]
    fn larger_strength_gives_steeper_normals() {
        let img = ramp_x(8, 2);
        let weak = derive_normal_map(&img, 1.0, BoundaryMode::Clamp);
        let strong = derive_normal_map(&img, 16.0, BoundaryMode::Clamp);
        let weak_z = decode(weak.pixel(3, 0).expect("in bounds"))[2];
        let strong_z = decode(strong.pixel(3, 0).expect("in bounds"))[2];
        assert!(strong_z < weak_z);
    }

    #[test]
    fn wrap_sees_seam_that_clamp_ignores() {
        // The ramp jumps from 255 back to 0 across the wrap boundary, so the
        // left edge gets a large gradient only under Wrap.
        let img = ramp_x(8, 1);
        let wrap = decode(derive_normal_map(&img, 8.0, BoundaryMode::Wrap).pixel(0, 0).expect("in bounds"));
        let clamp = decode(derive_normal_map(&img, 8.0, BoundaryMode::Clamp).pixel(0, 0).expect("in bounds"));
        assert!(wrap[0] > 0.0, "wrapped neighbour is higher on the left");
        assert!(clamp[0] < 0.0, "clamped edge only sees the rising ramp");
    }

    #[test]
    fn encoded_normals_are_unit_length() {
        let normal = derive_normal_map(&ramp_x(16, 16), 6.0, BoundaryMode::Wrap);
        for px in normal.as_bytes().chunks_exact(4) {
            let [x, y, z] = decode([px[0], px[1], px[2], px[3]]);
            let len = (x * x + y * y + z * z).sqrt();
            assert!((len - 1.0).abs() < 0.02, "length {len}");
        }
    }
}
