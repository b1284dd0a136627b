//! Where finished noise images are published.

use bevy::{
    asset::{Assets, Handle},
    image::Image,
};

/// Receives published texture contents.
///
/// A [`crate::texture::NoiseTexture`] calls [`create`](Self::create) at most
/// once in its lifetime and [`replace`](Self::replace) for every later
/// publish, so the handle it hands out stays stable.
pub trait TextureSink {
    fn create(&mut self, image: Image) -> Handle<Image>;
    /// Overwrite the contents behind `handle`.  Returns `false` if the sink
    /// could not store them; the previous contents are then still in place.
    fn replace(&mut self, handle: &Handle<Image>, image: Image) -> bool;
}

impl TextureSink for Assets<Image> {
    fn create(&mut self, image: Image) -> Handle<Image> {
        self.add(image)
    }

    fn replace(&mut self, handle: &Handle<Image>, image: Image) -> bool {
        // Overwriting in place keeps every clone of `handle` valid.
        match self.insert(handle.id(), image) {
            Ok(()) => true,
            Err(e) => {
                bevy::log::error!("cannot replace noise texture image {:?}: {e}", handle.id());
                false
            }
        }
    }
}
