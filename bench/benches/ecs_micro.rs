//! ECS microbenchmarks using Criterion.
//!
//! These benchmarks measure individual operations in isolation:
//! - Entity add/remove
//! - Component iteration via `View`
//! - Component add/remove on existing entities
//! - Fragmented (many-archetype) iteration

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rusty_bench::components::*;
use rusty_engine::ecs::{EntityStore, View};

// =============================================================================
// Entity Spawn Benchmarks
// =============================================================================

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        // Single component per entity.
        group.bench_with_input(BenchmarkId::new("single_component", count), &count, |b, &n| {
            b.iter(|| {
                let mut store = EntityStore::new();
                for _ in 0..n {
                    let e = store.add_entity();
                    black_box(store.add::<Position>(e).unwrap());
                }
            });
        });

        // Four components per entity.
        group.bench_with_input(BenchmarkId::new("four_components", count), &count, |b, &n| {
            b.iter(|| {
                let mut store = EntityStore::new();
                for _ in 0..n {
                    let e = store.add_entity();
                    store.add::<Transform>(e).unwrap();
                    store.add::<Position>(e).unwrap();
                    store.add::<Acceleration>(e).unwrap();
                    black_box(store.add::<Velocity>(e).unwrap());
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Iteration Benchmarks
// =============================================================================

fn bench_simple_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_iter");

    for count in [1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("pos_vel", count), &count, |b, &n| {
            let mut store = EntityStore::new();
            for i in 0..n {
                let e = store.add_entity();
                store.add::<Position>(e).unwrap().set_field::<f32>(Position::X, i as f32);
                store.add::<Velocity>(e).unwrap().set_field::<f32>(Velocity::X, 1.0);
            }

            b.iter(|| {
                for m in View::new(&store).required::<Position>().required::<Velocity>().iter() {
                    let pos = m.required::<Position>();
                    let vel = m.required::<Velocity>();
                    black_box(*pos.field::<f32>(Position::X) + *vel.field::<f32>(Velocity::X));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("single", count), &count, |b, &n| {
            let mut store = EntityStore::new();
            for i in 0..n {
                let e = store.add_entity();
                store.add::<Position>(e).unwrap().set_field::<f32>(Position::X, i as f32);
            }

            b.iter(|| {
                for m in View::new(&store).required::<Position>().iter() {
                    let pos = m.required::<Position>();
                    black_box(*pos.field::<f32>(Position::X));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("four_components", count), &count, |b, &n| {
            let mut store = EntityStore::new();
            for _ in 0..n {
                let e = store.add_entity();
                store.add::<Transform>(e).unwrap();
                store.add::<Position>(e).unwrap();
                store.add::<Rotation>(e).unwrap();
                store.add::<Velocity>(e).unwrap();
            }

            b.iter(|| {
                for m in View::new(&store)
                    .required::<Position>()
                    .required::<Velocity>()
                    .required::<Rotation>()
                    .required::<Transform>()
                    .iter()
                {
                    let pos = m.required::<Position>();
                    let vel = m.required::<Velocity>();
                    black_box(*pos.field::<f32>(Position::X) + *vel.field::<f32>(Velocity::X));
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Fragmented Iteration Benchmarks
// =============================================================================

fn bench_fragmented_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_iter");

    // A handful of disjoint Data+Marker repositories, driven through
    // separate `View`s — every required type with no repository yet is an
    // empty join, so unused markers cost nothing.
    let archetype_count = 6;
    let entities_per_archetype = 20;
    let total = archetype_count * entities_per_archetype;

    group.throughput(Throughput::Elements(total as u64));

    group.bench_function("6_archetypes", |b| {
        let mut store = EntityStore::new();

        macro_rules! spawn_marked {
            ($marker:ty) => {
                for _ in 0..entities_per_archetype {
                    let e = store.add_entity();
                    store.add::<Data>(e).unwrap().set_field::<f64>(Data::VALUE, 1.0);
                    store.add::<$marker>(e).unwrap();
                }
            };
        }
        spawn_marked!(MarkerA);
        spawn_marked!(MarkerB);
        spawn_marked!(MarkerC);
        spawn_marked!(MarkerD);
        spawn_marked!(MarkerE);
        spawn_marked!(MarkerF);

        b.iter(|| {
            for m in View::new(&store).required::<Data>().iter() {
                let entity = m.entity();
                let value = *m.required::<Data>().field::<f64>(Data::VALUE);
                black_box((entity, value * 2.0));
            }
        });
    });

    group.finish();
}

// =============================================================================
// Component Add/Remove Benchmarks
// =============================================================================

fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("add_component", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = EntityStore::new();
                    let entities: Vec<_> = (0..n)
                        .map(|_| {
                            let e = store.add_entity();
                            store.add::<Position>(e).unwrap();
                            e
                        })
                        .collect();
                    (store, entities)
                },
                |(mut store, entities)| {
                    for entity in entities {
                        store.add::<Velocity>(entity).unwrap();
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("remove_component", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = EntityStore::new();
                    let entities: Vec<_> = (0..n)
                        .map(|_| {
                            let e = store.add_entity();
                            store.add::<Position>(e).unwrap();
                            store.add::<Velocity>(e).unwrap();
                            e
                        })
                        .collect();
                    (store, entities)
                },
                |(mut store, entities)| {
                    for entity in entities {
                        store.remove::<Velocity>(entity);
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// =============================================================================
// Entity Removal Benchmarks
// =============================================================================

fn bench_despawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("despawn");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("single_component", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = EntityStore::new();
                    let entities: Vec<_> = (0..n)
                        .map(|_| {
                            let e = store.add_entity();
                            store.add::<Position>(e).unwrap();
                            e
                        })
                        .collect();
                    (store, entities)
                },
                |(mut store, entities)| {
                    for entity in entities {
                        store.remove_entity(entity);
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("four_components", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = EntityStore::new();
                    let entities: Vec<_> = (0..n)
                        .map(|_| {
                            let e = store.add_entity();
                            store.add::<Transform>(e).unwrap();
                            store.add::<Position>(e).unwrap();
                            store.add::<Rotation>(e).unwrap();
                            store.add::<Velocity>(e).unwrap();
                            e
                        })
                        .collect();
                    (store, entities)
                },
                |(mut store, entities)| {
                    for entity in entities {
                        store.remove_entity(entity);
                    }
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// =============================================================================
// Compaction Benchmarks
// =============================================================================

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");

    for count in [1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("half_dead", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = EntityStore::new();
                    let entities: Vec<_> = (0..n)
                        .map(|_| {
                            let e = store.add_entity();
                            store.add::<Position>(e).unwrap();
                            e
                        })
                        .collect();
                    for (i, entity) in entities.into_iter().enumerate() {
                        if i % 2 == 0 {
                            store.remove_entity(entity);
                        }
                    }
                    store
                },
                |mut store| {
                    store.compact();
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_spawn,
    bench_simple_iter,
    bench_fragmented_iter,
    bench_add_remove,
    bench_despawn,
    bench_compact,
);

criterion_main!(benches);
