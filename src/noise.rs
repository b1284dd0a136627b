//! Noise sources that a [`crate::texture::NoiseTexture`] samples from.
//!
//! A [`NoiseSource`] produces greyscale images over a 2D noise field, either
//! as a window at some offset or as a seamless tile.  [`SimplexNoise`] is the
//! bundled implementation, a fractal OpenSimplex field whose parameters can
//! be edited at runtime; every edit fires its [`ChangeSignal`].
//!
//! Seamless tiles come from [`ToroidalNoise`], which maps 2-D UV coordinates
//! (in [0,1]) to a 4D point on a torus so the field wraps at all four edges:
//!   nx = cos(2π·u) · frequency
//!   ny = sin(2π·u) · frequency
//!   nz = cos(2π·v) · frequency
//!   nw = sin(2π·v) · frequency
//!
//! Seam-freedom is guaranteed because cos(0)=cos(2π) and sin(0)=sin(2π), so
//! u=0 and u=1 always resolve to the identical 4D coordinate.

use std::f64::consts::TAU;
use std::sync::{PoisonError, RwLock};

use bevy::math::Vec2;
use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex};

use crate::{image::TextureImage, signal::ChangeSignal};

/// A scalar noise field that can be rendered into images.
///
/// Implementations must be cheap to share behind an `Arc`; sampling may run
/// on a worker thread while the owning texture keeps editing its own
/// settings.
pub trait NoiseSource: Send + Sync {
    /// Sample a `width × height` window whose top-left pixel sits at
    /// `offset` in noise space.
    fn sample_windowed(&self, width: u32, height: u32, offset: Vec2) -> TextureImage;

    /// Sample a `size × size` image that tiles without seams.
    fn sample_seamless(&self, size: u32) -> TextureImage;

    /// Fired whenever the field changes and previously sampled images are stale.
    fn changed(&self) -> &ChangeSignal;
}

/// Wraps any 4-dimensional noise function and samples it on a torus, producing
/// output that tiles seamlessly when `u` and `v` are each in `[0, 1]`.
pub struct ToroidalNoise<N> {
    noise: N,
    /// Torus radius in noise-space.
    pub frequency: f64,
}

impl<N: NoiseFn<f64, 4>> ToroidalNoise<N> {
    pub fn new(noise: N, frequency: f64) -> Self {
        Self { noise, frequency }
    }

    /// Sample the noise at normalised UV coordinates in [0, 1].
    pub fn get(&self, u: f64, v: f64) -> f64 {
        let nx = (TAU * u).cos() * self.frequency;
        let ny = (TAU * u).sin() * self.frequency;
        let nz = (TAU * v).cos() * self.frequency;
        let nw = (TAU * v).sin() * self.frequency;
        self.noise.get([nx, ny, nz, nw])
    }
}

/// Map a raw noise sample from `[-1, 1]` to an unsigned byte `[0, 255]`.
#[inline]
pub fn to_u8(v: f64) -> u8 {
    ((v * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Parameters of a [`SimplexNoise`] field.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimplexNoiseParams {
    pub seed: u32,
    /// Number of fractal layers, clamped to `1..=9`.
    pub octaves: usize,
    /// Feature size in pixels; the base frequency is `1 / period`.
    pub period: f64,
    /// Amplitude falloff between octaves.
    pub persistence: f64,
    /// Frequency gain between octaves.
    pub lacunarity: f64,
}

impl Default for SimplexNoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 3,
            period: 64.0,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

impl SimplexNoiseParams {
    pub const MIN_OCTAVES: usize = 1;
    pub const MAX_OCTAVES: usize = 9;
    pub const MIN_PERIOD: f64 = 0.1;

    fn sanitized(mut self) -> Self {
        self.octaves = self.octaves.clamp(Self::MIN_OCTAVES, Self::MAX_OCTAVES);
        if !(self.period >= Self::MIN_PERIOD) {
            self.period = Self::MIN_PERIOD;
        }
        self
    }

    fn fbm(&self) -> Fbm<OpenSimplex> {
        Fbm::<OpenSimplex>::new(self.seed)
            .set_octaves(self.octaves)
            .set_frequency(1.0 / self.period)
            .set_persistence(self.persistence)
            .set_lacunarity(self.lacunarity)
    }
}

/// Editable fractal OpenSimplex field.
///
/// Setters take `&self` so the source can be shared between several textures
/// through an `Arc`; a setter that actually changes a value emits
/// [`NoiseSource::changed`].
pub struct SimplexNoise {
    params: RwLock<SimplexNoiseParams>,
    changed: ChangeSignal,
}

impl Default for SimplexNoise {
    fn default() -> Self {
        Self::new(SimplexNoiseParams::default())
    }
}

impl SimplexNoise {
    pub fn new(params: SimplexNoiseParams) -> Self {
        Self {
            params: RwLock::new(params.sanitized()),
            changed: ChangeSignal::new(),
        }
    }

    /// Snapshot of the current parameters.
    pub fn params(&self) -> SimplexNoiseParams {
        self.params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace all parameters at once; emits a single change notification.
    pub fn set_params(&self, params: SimplexNoiseParams) {
        self.update(|p| *p = params.sanitized());
    }

    pub fn set_seed(&self, seed: u32) {
        self.update(|p| p.seed = seed);
    }

    pub fn set_octaves(&self, octaves: usize) {
        self.update(|p| {
            p.octaves = octaves.clamp(SimplexNoiseParams::MIN_OCTAVES, SimplexNoiseParams::MAX_OCTAVES)
        });
    }

    pub fn set_period(&self, period: f64) {
        self.update(|p| {
            p.period = period;
            *p = p.clone().sanitized();
        });
    }

    pub fn set_persistence(&self, persistence: f64) {
        self.update(|p| p.persistence = persistence);
    }

    pub fn set_lacunarity(&self, lacunarity: f64) {
        self.update(|p| p.lacunarity = lacunarity);
    }

    /// Apply `f` and emit only if the parameters differ afterwards.  The lock
    /// is released before listeners run.
    fn update(&self, f: impl FnOnce(&mut SimplexNoiseParams)) {
        let dirty = {
            let mut params = self.params.write().unwrap_or_else(PoisonError::into_inner);
            let before = params.clone();
            f(&mut params);
            *params != before
        };
        if dirty {
            self.changed.emit();
        }
    }
}

impl NoiseSource for SimplexNoise {
    fn sample_windowed(&self, width: u32, height: u32, offset: Vec2) -> TextureImage {
        let fbm = self.params().fbm();
        let ox = offset.x as f64;
        let oy = offset.y as f64;
        let luma: Vec<u8> = (0..height)
            .flat_map(|y| {
                let fbm = &fbm;
                (0..width).map(move |x| to_u8(fbm.get([x as f64 + ox, y as f64 + oy])))
            })
            .collect();
        TextureImage::from_luma8(width, height, &luma).unwrap_or_default()
    }

    fn sample_seamless(&self, size: u32) -> TextureImage {
        // A circle of circumference `size` pixels keeps the feature size
        // equal to windowed sampling at the same period.
        let noise = ToroidalNoise::new(self.params().fbm(), size as f64 / TAU);
        let s = size as f64;
        let luma: Vec<u8> = (0..size)
            .flat_map(|y| {
                let noise = &noise;
                (0..size).map(move |x| to_u8(noise.get(x as f64 / s, y as f64 / s)))
            })
            .collect();
        TextureImage::from_luma8(size, size, &luma).unwrap_or_default()
    }

    fn changed(&self) -> &ChangeSignal {
        &self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noise::Perlin;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    /// Verify left/right and top/bottom edges match (seamless tiling).
    #[test]
    fn tiles_seamlessly() {
        let noise = ToroidalNoise::new(Perlin::new(42), 3.0);
        for v in [0.0, 0.25, 0.5, 0.75] {
            let at_0 = noise.get(0.0, v);
            let at_1 = noise.get(1.0, v);
            assert!(
                (at_0 - at_1).abs() < 1e-10,
                "horizontal seam at v={v}: {at_0} != {at_1}"
            );
        }
        for u in [0.0, 0.25, 0.5, 0.75] {
            let at_0 = noise.get(u, 0.0);
            let at_1 = noise.get(u, 1.0);
            assert!(
                (at_0 - at_1).abs() < 1e-10,
                "vertical seam at u={u}: {at_0} != {at_1}"
            );
        }
    }

    #[test]
    fn windowed_image_has_requested_size_and_varies() {
        let noise = SimplexNoise::new(SimplexNoiseParams {
            period: 8.0,
            ..Default::default()
        });
        let img = noise.sample_windowed(32, 16, Vec2::ZERO);
        assert_eq!((img.width(), img.height()), (32, 16));
        let first = img.pixel(0, 0).expect("in bounds");
        assert!(
            img.as_bytes().chunks_exact(4).any(|px| px[0] != first[0]),
            "windowed noise should not be constant"
        );
    }

    #[test]
    fn offset_shifts_the_window() {
        let noise = SimplexNoise::default();
        let base = noise.sample_windowed(8, 8, Vec2::ZERO);
        let shifted = noise.sample_windowed(4, 4, Vec2::new(4.0, 4.0));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(shifted.pixel(x, y), base.pixel(x + 4, y + 4));
            }
        }
    }

    #[test]
    fn seamless_image_is_square() {
        let img = SimplexNoise::default().sample_seamless(12);
        assert_eq!((img.width(), img.height()), (12, 12));
    }

    #[test]
    fn setters_emit_only_on_real_change() {
        let noise = SimplexNoise::default();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            noise.changed().connect(move || {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }
        noise.set_seed(0);
        noise.set_octaves(3);
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        noise.set_seed(7);
        noise.set_period(32.0);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn octaves_and_period_are_clamped() {
        let noise = SimplexNoise::default();
        noise.set_octaves(40);
        noise.set_period(-3.0);
        let p = noise.params();
        assert_eq!(p.octaves, SimplexNoiseParams::MAX_OCTAVES);
        assert_eq!(p.period, SimplexNoiseParams::MIN_PERIOD);
    }
}
