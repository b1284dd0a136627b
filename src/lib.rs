//! `bevy_noise_texture`: a noise-backed texture resource for Bevy.
//!
//! # Architecture
//! A [`NoiseTexture`] component samples a [`NoiseSource`] into a
//! [`TextureImage`] and publishes it as a `Handle<Image>`.  Editing any of
//! its properties requests a regeneration; requests coalesce in the
//! [`UpdateQueue`] until [`drain_update_queue`] runs the pass, optionally on
//! a background worker (see [`GenerationMode`]).  With `as_normal_map` set
//! the sampled heightfield goes through [`normal::derive_normal_map`] first.
//!
//! Seamless tiles are produced by the [`ToroidalNoise`] wrapper, which maps
//! 2-D UV coordinates to a 4-D torus so noise wraps at every edge.

pub mod async_gen;
pub mod generator;
pub mod image;
pub mod noise;
pub mod normal;
pub mod properties;
pub mod scheduler;
pub mod signal;
pub mod sink;
pub mod texture;

pub use async_gen::{NoiseTextureChanged, drain_update_queue, poll_generation_tasks};
pub use generator::{GenerationRequest, TextureError, generate};
pub use image::TextureImage;
pub use noise::{NoiseSource, SimplexNoise, SimplexNoiseParams, ToroidalNoise};
pub use scheduler::{GenerationMode, UpdateQueue};
pub use sink::TextureSink;
pub use texture::{NoiseTexture, NoiseTextureSettings};

use bevy::prelude::*;

/// Bevy plugin that registers the update queue and the regeneration systems.
#[derive(Default)]
pub struct NoiseTexturePlugin {
    /// Where regeneration passes run.  Defaults to a background worker pool.
    pub mode: GenerationMode,
}

impl Plugin for NoiseTexturePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UpdateQueue>()
            .insert_resource(self.mode)
            .add_message::<NoiseTextureChanged>()
            .add_systems(
                Update,
                (async_gen::drain_update_queue, async_gen::poll_generation_tasks).chain(),
            );
    }
}
