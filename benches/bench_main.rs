use std::hint::black_box;
use std::sync::Arc;

use bevy::math::Vec2;
use bevy_noise_texture::generator::{GenerationRequest, generate};
use bevy_noise_texture::noise::{NoiseSource, SimplexNoise};
use bevy_noise_texture::normal::{BoundaryMode, derive_normal_map};
use criterion::{Criterion, criterion_group, criterion_main};

fn request(seamless: bool, as_normal_map: bool) -> GenerationRequest {
    GenerationRequest {
        width: 512,
        height: 512,
        noise_offset: Vec2::ZERO,
        seamless,
        as_normal_map,
        bump_strength: 8.0,
        noise: Some(Arc::new(SimplexNoise::default())),
    }
}

fn bench_windowed(c: &mut Criterion) {
    let req = request(false, false);
    c.bench_function("windowed_512", |b| b.iter(|| generate(black_box(&req))));
}

fn bench_seamless(c: &mut Criterion) {
    let req = request(true, false);
    c.bench_function("seamless_512", |b| b.iter(|| generate(black_box(&req))));
}

fn bench_normal_map(c: &mut Criterion) {
    let height = SimplexNoise::default().sample_windowed(512, 512, Vec2::ZERO);
    c.bench_function("normal_map_512", |b| {
        b.iter(|| derive_normal_map(black_box(&height), black_box(8.0), BoundaryMode::Clamp))
    });
}

criterion_group!(benches, bench_windowed, bench_seamless, bench_normal_map);
criterion_main!(benches);
