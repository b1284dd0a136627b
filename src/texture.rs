//! The noise texture resource.
//!
//! A [`NoiseTexture`] owns its [`NoiseTextureSettings`], an optional shared
//! [`NoiseSource`], the last generated [`TextureImage`] and the published
//! `Handle<Image>`.  Every setter that changes something requests a deferred
//! regeneration; setting a property to its current value does nothing.
//!
//! # Usage
//! ```rust,ignore
//! fn spawn(mut commands: Commands, queue: Res<UpdateQueue>) {
//!     let noise = Arc::new(SimplexNoise::default());
//!     commands.spawn(NoiseTexture::new(&queue).with_noise(noise));
//! }
//! ```

use std::sync::Arc;

use bevy::{
    asset::Handle,
    ecs::component::Component,
    image::Image,
    math::Vec2,
};

use crate::{
    generator::{
        GenerationRequest, TextureError, make_image, validate_bump_strength, validate_dimensions,
        validate_noise_offset,
    },
    image::TextureImage,
    noise::NoiseSource,
    scheduler::{GenerationMode, Generated, Poll, RegenerationScheduler, TextureId, UpdateQueue},
    signal::ListenerId,
    sink::TextureSink,
};

/// Editable configuration of a [`NoiseTexture`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NoiseTextureSettings {
    pub width: u32,
    pub height: u32,
    /// Top-left corner of the sampled window in noise space.  Ignored when
    /// `seamless` is set.
    pub noise_offset: [f32; 2],
    /// Sample a square tile that repeats without seams.
    pub seamless: bool,
    /// Convert the sampled heightfield into a tangent-space normal map.
    pub as_normal_map: bool,
    /// Gradient scale used when `as_normal_map` is set.
    pub bump_strength: f32,
}

impl Default for NoiseTextureSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            noise_offset: [0.0, 0.0],
            seamless: false,
            as_normal_map: false,
            bump_strength: 8.0,
        }
    }
}

impl NoiseTextureSettings {
    pub fn validate(&self) -> Result<(), TextureError> {
        validate_dimensions(self.width, self.height)?;
        validate_noise_offset(Vec2::from_array(self.noise_offset))?;
        validate_bump_strength(self.bump_strength)
    }
}

/// Procedural texture backed by a [`NoiseSource`].
///
/// Spawn it as a component after adding [`crate::NoiseTexturePlugin`]; the
/// plugin's systems drain the [`UpdateQueue`] and publish into
/// `Assets<Image>`.  Outside the ECS, call [`perform_update`] and
/// [`poll_generation`] yourself with any [`TextureSink`].
///
/// [`perform_update`]: Self::perform_update
/// [`poll_generation`]: Self::poll_generation
#[derive(Component)]
pub struct NoiseTexture {
    settings: NoiseTextureSettings,
    noise: Option<Arc<dyn NoiseSource>>,
    /// Subscription on `noise`'s change signal.
    listener: Option<ListenerId>,
    image: Option<Arc<TextureImage>>,
    handle: Option<Handle<Image>>,
    scheduler: RegenerationScheduler,
    /// The first pass always runs synchronously so a freshly configured
    /// texture has content on its first frame.
    first_pass: bool,
    property_list_changed: bool,
    revision: u64,
}

impl NoiseTexture {
    /// A texture with default settings and no noise source.  An initial pass
    /// is queued right away.
    pub fn new(queue: &UpdateQueue) -> Self {
        let texture = Self {
            settings: NoiseTextureSettings::default(),
            noise: None,
            listener: None,
            image: None,
            handle: None,
            scheduler: RegenerationScheduler::new(queue),
            first_pass: true,
            property_list_changed: false,
            revision: 0,
        };
        texture.request_update();
        texture
    }

    pub fn from_settings(
        queue: &UpdateQueue,
        settings: NoiseTextureSettings,
    ) -> Result<Self, TextureError> {
        settings.validate()?;
        let mut texture = Self::new(queue);
        texture.settings = settings;
        Ok(texture)
    }

    /// Builder form of [`set_noise`](Self::set_noise).
    pub fn with_noise(mut self, noise: Arc<dyn NoiseSource>) -> Self {
        self.set_noise(Some(noise));
        self
    }

    pub fn id(&self) -> TextureId {
        self.scheduler.id()
    }

    pub fn settings(&self) -> &NoiseTextureSettings {
        &self.settings
    }

    pub fn width(&self) -> u32 {
        self.settings.width
    }

    pub fn height(&self) -> u32 {
        self.settings.height
    }

    pub fn noise(&self) -> Option<&Arc<dyn NoiseSource>> {
        self.noise.as_ref()
    }

    pub fn noise_offset(&self) -> Vec2 {
        Vec2::from_array(self.settings.noise_offset)
    }

    pub fn seamless(&self) -> bool {
        self.settings.seamless
    }

    pub fn as_normal_map(&self) -> bool {
        self.settings.as_normal_map
    }

    pub fn bump_strength(&self) -> f32 {
        self.settings.bump_strength
    }

    pub fn set_width(&mut self, width: u32) -> Result<(), TextureError> {
        validate_dimensions(width, self.settings.height)?;
        if width != self.settings.width {
            self.settings.width = width;
            self.request_update();
        }
        Ok(())
    }

    pub fn set_height(&mut self, height: u32) -> Result<(), TextureError> {
        validate_dimensions(self.settings.width, height)?;
        if height != self.settings.height {
            self.settings.height = height;
            self.request_update();
        }
        Ok(())
    }

    pub fn set_noise_offset(&mut self, offset: Vec2) -> Result<(), TextureError> {
        validate_noise_offset(offset)?;
        let offset = offset.to_array();
        if offset != self.settings.noise_offset {
            self.settings.noise_offset = offset;
            self.request_update();
        }
        Ok(())
    }

    pub fn set_seamless(&mut self, seamless: bool) {
        if seamless != self.settings.seamless {
            self.settings.seamless = seamless;
            self.request_update();
        }
    }

    /// Toggling normal-map mode also changes which properties are editable;
    /// see [`take_property_list_changed`](Self::take_property_list_changed).
    pub fn set_as_normal_map(&mut self, as_normal_map: bool) {
        if as_normal_map != self.settings.as_normal_map {
            self.settings.as_normal_map = as_normal_map;
            self.property_list_changed = true;
            self.request_update();
        }
    }

    /// Only regenerates when the texture is in normal-map mode; otherwise the
    /// value is stored for later.
    pub fn set_bump_strength(&mut self, strength: f32) -> Result<(), TextureError> {
        validate_bump_strength(strength)?;
        if strength != self.settings.bump_strength {
            self.settings.bump_strength = strength;
            if self.settings.as_normal_map {
                self.request_update();
            }
        }
        Ok(())
    }

    /// Replace the noise source, moving the change subscription with it.
    pub fn set_noise(&mut self, noise: Option<Arc<dyn NoiseSource>>) {
        if same_source(self.noise.as_ref(), noise.as_ref()) {
            return;
        }
        self.disconnect_noise();
        self.noise = noise;
        if let Some(noise) = &self.noise {
            self.listener = Some(noise.changed().connect(self.scheduler.requester()));
        }
        self.request_update();
    }

    /// Queue a regeneration pass unless one is already pending.
    pub fn request_update(&self) -> bool {
        self.scheduler.request_update()
    }

    pub fn is_update_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// `true` while a background pass for this texture is running.
    pub fn is_generating(&self) -> bool {
        self.scheduler.is_generating()
    }

    /// Run the deferred pass.
    ///
    /// Clears the pending flag first, so edits made while this pass runs
    /// queue another one.  Returns `true` if a new image was published
    /// during this call; background passes publish later from
    /// [`poll_generation`](Self::poll_generation).
    pub fn perform_update(&mut self, mode: GenerationMode, sink: &mut impl TextureSink) -> bool {
        self.scheduler.begin_pass();
        let request = self.generation_request();

        let synchronous = mode == GenerationMode::Blocking || self.first_pass;
        if !synchronous || self.scheduler.is_generating() {
            self.scheduler.start_background(request);
            return false;
        }
        self.first_pass = false;
        self.publish(Generated::run(&request), sink)
    }

    /// Publish the background pass if it has finished, and start the pass
    /// that was requested while it ran.  Never blocks.
    pub fn poll_generation(&mut self, sink: &mut impl TextureSink) -> bool {
        let published = match self.scheduler.poll() {
            Poll::Idle | Poll::Running => return false,
            Poll::Done(generated) => self.publish(generated, sink),
            Poll::Failed => {
                bevy::log::error!("noise texture generation thread panicked");
                false
            }
        };
        if self.scheduler.take_rerun() {
            let request = self.generation_request();
            self.scheduler.start_background(request);
        }
        published
    }

    /// Block until no background pass is running, publishing each one as it
    /// completes (including passes requested while waiting).
    pub fn finish_generation(&mut self, sink: &mut impl TextureSink) -> bool {
        let mut published = false;
        loop {
            match self.scheduler.wait() {
                Poll::Idle | Poll::Running => return published,
                Poll::Done(generated) => published |= self.publish(generated, sink),
                Poll::Failed => bevy::log::error!("noise texture generation thread panicked"),
            }
            if self.scheduler.take_rerun() {
                let request = self.generation_request();
                self.scheduler.start_background(request);
            }
        }
    }

    /// The published handle, creating a 1×1 transparent placeholder if
    /// nothing has been published yet.
    pub fn texture_handle(&mut self, sink: &mut impl TextureSink) -> Handle<Image> {
        if let Some(handle) = &self.handle {
            return handle.clone();
        }
        let placeholder = TextureImage::filled(1, 1, [0, 0, 0, 0]);
        let handle = sink.create(make_image(&placeholder, self.settings.seamless));
        self.handle = Some(handle.clone());
        handle
    }

    /// The published handle, if one has been created.
    pub fn handle(&self) -> Option<&Handle<Image>> {
        self.handle.as_ref()
    }

    /// The last successfully generated image.
    pub fn image(&self) -> Option<Arc<TextureImage>> {
        self.image.clone()
    }

    /// Number of images published so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// `true` once after the set of editable properties has changed.
    pub fn take_property_list_changed(&mut self) -> bool {
        std::mem::take(&mut self.property_list_changed)
    }

    fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            width: self.settings.width,
            height: self.settings.height,
            noise_offset: self.noise_offset(),
            seamless: self.settings.seamless,
            as_normal_map: self.settings.as_normal_map,
            bump_strength: self.settings.bump_strength,
            noise: self.noise.clone(),
        }
    }

    /// Swap in a finished image.  Without an image, or if the sink refuses
    /// it, the previous texture is left exactly as it was.
    fn publish(&mut self, generated: Generated, sink: &mut impl TextureSink) -> bool {
        let Some(image) = generated.image.filter(|img| !img.is_empty()) else {
            bevy::log::debug!("noise texture {:?}: nothing to publish", self.id());
            return false;
        };
        let gpu_image = make_image(&image, generated.seamless);
        match &self.handle {
            Some(handle) => {
                if !sink.replace(handle, gpu_image) {
                    return false;
                }
            }
            None => self.handle = Some(sink.create(gpu_image)),
        }
        self.image = Some(Arc::new(image));
        self.revision += 1;
        true
    }

    fn disconnect_noise(&mut self) {
        if let (Some(noise), Some(id)) = (&self.noise, self.listener.take()) {
            noise.changed().disconnect(id);
        }
    }
}

impl Drop for NoiseTexture {
    fn drop(&mut self) {
        self.disconnect_noise();
        self.scheduler.cancel_and_join();
    }
}

impl std::fmt::Debug for NoiseTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseTexture")
            .field("id", &self.id())
            .field("settings", &self.settings)
            .field("has_noise", &self.noise.is_some())
            .field("revision", &self.revision)
            .finish()
    }
}

fn same_source(a: Option<&Arc<dyn NoiseSource>>, b: Option<&Arc<dyn NoiseSource>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}
