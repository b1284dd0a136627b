//! `noise_viewer`: edit a noise texture live and watch it regenerate.
//!
//! Run with:
//!   cargo run --example noise_viewer --features egui

use std::sync::Arc;

use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use bevy_noise_texture::{
    NoiseTexture, NoiseTextureChanged, NoiseTexturePlugin, NoiseTextureSettings, SimplexNoise,
    UpdateQueue,
};
use rand::Rng;

const VIEW_SIZE: f32 = 512.0;

#[derive(Resource)]
struct DemoNoise(Arc<SimplexNoise>);

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "bevy_noise_texture viewer".into(),
                resolution: (900, 600).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(NoiseTexturePlugin::default())
        .insert_resource(DemoNoise(Arc::new(SimplexNoise::default())))
        .add_systems(Startup, spawn_texture)
        .add_systems(EguiPrimaryContextPass, edit_ui)
        .add_systems(Update, log_changes)
        .run();
}

fn spawn_texture(
    mut commands: Commands,
    queue: Res<UpdateQueue>,
    noise: Res<DemoNoise>,
    mut images: ResMut<Assets<Image>>,
) {
    commands.spawn(Camera2d);

    let settings = NoiseTextureSettings {
        width: 256,
        height: 256,
        ..default()
    };
    let Ok(texture) = NoiseTexture::from_settings(&queue, settings) else {
        error!("invalid demo settings");
        return;
    };
    let mut texture = texture.with_noise(noise.0.clone());
    // Published images replace the placeholder in place, so the sprite never
    // needs its handle swapped.
    let handle = texture.texture_handle(&mut *images);

    commands.spawn((
        texture,
        Sprite {
            image: handle,
            custom_size: Some(Vec2::splat(VIEW_SIZE)),
            ..default()
        },
        Transform::from_translation(Vec3::new(150.0, 0.0, 0.0)),
    ));
}

fn edit_ui(
    mut contexts: EguiContexts,
    noise: Res<DemoNoise>,
    mut textures: Query<&mut NoiseTexture>,
) -> Result {
    let ctx = contexts.ctx_mut()?;
    let Ok(mut texture) = textures.single_mut() else {
        return Ok(());
    };

    egui::Window::new("Noise texture").show(ctx, |ui| {
        let mut width = texture.width();
        let mut height = texture.height();
        let mut seamless = texture.seamless();
        let mut normal = texture.as_normal_map();
        let mut bump = texture.bump_strength();
        let mut offset = texture.noise_offset();

        ui.add(egui::Slider::new(&mut width, 1..=1024).text("width"));
        ui.add(egui::Slider::new(&mut height, 1..=1024).text("height"));
        ui.add(egui::Slider::new(&mut offset.x, -512.0..=512.0).text("offset x"));
        ui.add(egui::Slider::new(&mut offset.y, -512.0..=512.0).text("offset y"));
        ui.checkbox(&mut seamless, "seamless");
        ui.checkbox(&mut normal, "as normal map");
        if texture.as_normal_map() {
            ui.add(egui::Slider::new(&mut bump, 0.0..=32.0).text("bump strength"));
        }

        // Setters ignore unchanged values, so calling them every frame is free.
        if let Err(e) = texture.set_width(width) {
            warn!("{e}");
        }
        if let Err(e) = texture.set_height(height) {
            warn!("{e}");
        }
        if let Err(e) = texture.set_noise_offset(offset) {
            warn!("{e}");
        }
        texture.set_seamless(seamless);
        texture.set_as_normal_map(normal);
        if let Err(e) = texture.set_bump_strength(bump) {
            warn!("{e}");
        }

        ui.separator();
        let params = noise.0.params();
        let mut period = params.period;
        let mut octaves = params.octaves;
        ui.add(egui::Slider::new(&mut period, 1.0..=256.0).text("period"));
        ui.add(egui::Slider::new(&mut octaves, 1..=9).text("octaves"));
        noise.0.set_period(period);
        noise.0.set_octaves(octaves);
        if ui.button("reseed").clicked() {
            noise.0.set_seed(rand::rng().random());
        }
        ui.label(format!("revision {}", texture.revision()));
    });
    Ok(())
}

fn log_changes(mut changed: MessageReader<NoiseTextureChanged>) {
    for msg in changed.read() {
        debug!("noise texture on {:?} regenerated", msg.entity);
    }
}
