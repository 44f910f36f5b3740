//! # ECS Hot-Path Benchmarks
//!
//! Entity churn, component access and whole-frame cost.
//!
//! Run with: `cargo bench --package ember_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bytemuck::{Pod, Zeroable};
use ember_core::{Component, World, WorldConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
    _pad: f32,
}

impl Component for Position {
    const NAME: &'static str = "Position";
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
    _pad: f32,
}

impl Component for Velocity {
    const NAME: &'static str = "Velocity";
}

fn bench_config(entities: usize) -> WorldConfig {
    WorldConfig {
        entity_capacity: entities,
        command_capacity: entities,
        command_stage_bytes: entities * 32,
        event_queue_capacity: 4096,
    }
}

fn bench_entity_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_churn");

    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut world = World::new(bench_config(count));
            b.iter(|| {
                let mut handles = Vec::with_capacity(count);
                for _ in 0..count {
                    handles.push(world.create().unwrap());
                }
                for handle in handles {
                    world.destroy(handle).unwrap();
                }
                world.events_mut().clear();
            });
        });
    }

    group.finish();
}

fn bench_component_add_set(c: &mut Criterion) {
    c.bench_function("component_add_set_10k", |b| {
        let count = 10_000;
        let mut world = World::new(bench_config(count));
        let handles: Vec<_> = (0..count).map(|_| world.create().unwrap()).collect();

        b.iter(|| {
            for (i, &handle) in handles.iter().enumerate() {
                if world.has::<Position>(handle) {
                    world
                        .set(handle, Position { x: i as f32, ..Position::default() })
                        .unwrap();
                } else {
                    world.add(handle, Position::default()).unwrap();
                }
            }
            world.events_mut().clear();
        });
    });
}

fn tick_positions(world: &mut World, dt: f32) {
    let updates: Vec<_> = world
        .iter::<Velocity>()
        .map(|(entity, velocity)| (entity, *velocity))
        .collect();
    for (entity, velocity) in updates {
        if let Ok(position) = world.get::<Position>(entity) {
            let moved = Position {
                x: position.x + velocity.x * dt,
                y: position.y + velocity.y * dt,
                z: position.z + velocity.z * dt,
                _pad: 0.0,
            };
            let _ = world.set(entity, moved);
        }
    }
}

fn bench_frame_tick(c: &mut Criterion) {
    c.bench_function("frame_tick_10k_moving", |b| {
        let count = 10_000;
        let mut world = World::new(bench_config(count));
        for _ in 0..count {
            let e = world.create().unwrap();
            world.add(e, Position::default()).unwrap();
            world
                .add(e, Velocity { x: 1.0, y: 2.0, z: 3.0, _pad: 0.0 })
                .unwrap();
        }
        world.register_system(tick_positions, 1).unwrap();
        world.events_mut().clear();

        b.iter(|| {
            let stats = world.run_frame(black_box(0.016));
            world.events_mut().clear();
            stats.duration_us
        });
    });
}

fn bench_deferred_flush(c: &mut Criterion) {
    c.bench_function("deferred_flush_1k", |b| {
        let count = 1_000;
        let mut world = World::new(bench_config(count));
        let handles: Vec<_> = (0..count).map(|_| world.create().unwrap()).collect();
        for &handle in &handles {
            world.add(handle, Position::default()).unwrap();
        }

        b.iter(|| {
            for &handle in &handles {
                world
                    .defer_set(handle, Position { x: 5.0, ..Position::default() })
                    .unwrap();
            }
            let applied = world.flush_commands().0;
            world.events_mut().clear();
            applied
        });
    });
}

criterion_group!(
    benches,
    bench_entity_churn,
    bench_component_add_set,
    bench_frame_tick,
    bench_deferred_flush
);
criterion_main!(benches);
