//! Bevy systems that drive [`NoiseTexture`] regeneration.
//!
//! [`drain_update_queue`] is the deferred-call point: it runs once per frame,
//! takes everything queued since the previous frame and calls
//! [`NoiseTexture::perform_update`] on each texture that asked.
//! [`poll_generation_tasks`] then non-blockingly checks background passes
//! and publishes the finished ones into [`Assets<Image>`].
//!
//! # Usage
//! ```rust,ignore
//! App::new()
//!     .add_plugins((DefaultPlugins, NoiseTexturePlugin::default()))
//!     .add_systems(Update, on_texture_changed);
//!
//! fn on_texture_changed(mut changed: MessageReader<NoiseTextureChanged>) {
//!     for msg in changed.read() {
//!         info!("{:?} has new pixels", msg.entity);
//!     }
//! }
//! ```

use std::collections::HashMap;

use bevy::{
    asset::Assets,
    ecs::{
        entity::Entity,
        message::{Message, MessageWriter},
        system::{Query, Res, ResMut},
    },
    image::Image,
};

use crate::{
    scheduler::{GenerationMode, UpdateQueue},
    texture::NoiseTexture,
};

/// Written whenever a [`NoiseTexture`] publishes a new image.
#[derive(Message, Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoiseTextureChanged {
    pub entity: Entity,
}

/// Bevy system: run the deferred pass of every texture that requested one.
///
/// Requests from textures that exist but are not in the world yet (built this
/// frame, spawned by deferred commands) are put back for the next frame.
pub fn drain_update_queue(
    queue: Res<UpdateQueue>,
    mode: Res<GenerationMode>,
    mut textures: Query<(Entity, &mut NoiseTexture)>,
    mut images: ResMut<Assets<Image>>,
    mut changed: MessageWriter<NoiseTextureChanged>,
) {
    let mut waiting: HashMap<_, _> = queue
        .drain()
        .into_iter()
        .map(|update| (update.id(), update))
        .collect();
    if waiting.is_empty() {
        return;
    }

    for (entity, mut texture) in &mut textures {
        if waiting.remove(&texture.id()).is_none() {
            continue;
        }
        if texture.perform_update(*mode, &mut *images) {
            changed.write(NoiseTextureChanged { entity });
        }
    }

    for (_, update) in waiting {
        queue.requeue(update);
    }
}

/// Bevy system: publish background passes that have finished.
pub fn poll_generation_tasks(
    mut textures: Query<(Entity, &mut NoiseTexture)>,
    mut images: ResMut<Assets<Image>>,
    mut changed: MessageWriter<NoiseTextureChanged>,
) {
    for (entity, mut texture) in &mut textures {
        // Checked through a shared borrow so idle textures are not marked changed.
        if !texture.is_generating() {
            continue;
        }
        if texture.poll_generation(&mut *images) {
            changed.write(NoiseTextureChanged { entity });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bevy::{
        app::{App, Update},
        ecs::message::Messages,
    };

    use super::*;
    use crate::{NoiseTexturePlugin, noise::SimplexNoise, texture::NoiseTextureSettings};

    fn app(mode: GenerationMode) -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Image>>()
            .add_plugins(NoiseTexturePlugin { mode });
        app
    }

    fn small_texture(app: &App) -> NoiseTexture {
        let queue = app.world().resource::<UpdateQueue>();
        let settings = NoiseTextureSettings {
            width: 8,
            height: 8,
            ..Default::default()
        };
        NoiseTexture::from_settings(queue, settings)
            .expect("valid settings")
            .with_noise(Arc::new(SimplexNoise::default()))
    }

    fn changed_count(app: &mut App) -> usize {
        app.world_mut()
            .resource_mut::<Messages<NoiseTextureChanged>>()
            .drain()
            .count()
    }

    #[test]
    fn spawned_texture_is_published_on_next_update() {
        let mut app = app(GenerationMode::Blocking);
        let texture = small_texture(&app);
        let entity = app.world_mut().spawn(texture).id();
        app.update();

        let texture = app.world().get::<NoiseTexture>(entity).expect("spawned");
        let handle = texture.handle().cloned().expect("published");
        let image = app
            .world()
            .resource::<Assets<Image>>()
            .get(&handle)
            .expect("asset exists");
        assert_eq!(image.width(), 8);
        assert_eq!(changed_count(&mut app), 1);
    }

    #[test]
    fn requests_for_unspawned_textures_wait_for_them() {
        let mut app = app(GenerationMode::Blocking);
        let texture = small_texture(&app);
        app.update();
        assert!(texture.is_update_pending());

        let entity = app.world_mut().spawn(texture).id();
        app.update();
        let texture = app.world().get::<NoiseTexture>(entity).expect("spawned");
        assert_eq!(texture.revision(), 1);
        assert!(!texture.is_update_pending());
    }

    #[test]
    fn background_edits_publish_through_polling() {
        let mut app = app(GenerationMode::Background);
        let texture = small_texture(&app);
        let entity = app.world_mut().spawn(texture).id();
        app.update();

        app.world_mut()
            .get_mut::<NoiseTexture>(entity)
            .expect("spawned")
            .set_width(16)
            .expect("valid width");

        // Bounded wait for the worker pool.
        for _ in 0..1000 {
            app.update();
            let texture = app.world().get::<NoiseTexture>(entity).expect("spawned");
            if texture.revision() == 2 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let texture = app.world().get::<NoiseTexture>(entity).expect("spawned");
        assert_eq!(texture.revision(), 2);
        assert_eq!(texture.image().expect("generated").width(), 16);
    }

    #[test]
    fn plugin_runs_in_update_schedule() {
        let mut app = app(GenerationMode::Blocking);
        assert!(app.get_schedule(Update).is_some());
        assert_eq!(*app.world().resource::<GenerationMode>(), GenerationMode::Blocking);
        app.update();
    }
}
