//! Particle system benchmark scenario.
//!
//! Simulates a high-volume particle system with:
//! - 100,000 particles
//! - Simple components: Position, Velocity, Lifetime, Color, Size
//! - Tasks: movement, lifetime decay, fade, despawn/respawn dead particles
//!
//! This scenario tests:
//! - High entity count iteration performance
//! - Simple component access patterns
//! - Entity spawn/despawn throughput (particles dying and respawning)

use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use rusty_engine::ecs::{Entity, EntityStore, Job, Scheduler, Task, TaskContext, View};

use crate::components::{Color, Lifetime, Particle, Position, Size, Velocity};
use crate::scenarios::Scenario;

/// Configuration for the particle benchmark.
pub struct ParticleConfig {
    /// Total number of particles to maintain.
    pub particle_count: usize,
    /// Simulated delta time per frame.
    pub delta_time: f32,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            particle_count: 100_000,
            delta_time: 1.0 / 60.0, // 60 FPS
            seed: 12345,
        }
    }
}

fn random_particle_fields(rng: &mut ChaCha8Rng) -> (f32, f32, f32, f32, f32, f32, f32, f32, f32, f32, f32) {
    (
        rng.gen_range(-100.0..100.0), // x
        rng.gen_range(-100.0..100.0), // y
        rng.gen_range(-100.0..100.0), // z
        rng.gen_range(-10.0..10.0),   // vx
        rng.gen_range(-10.0..10.0),   // vy
        rng.gen_range(-10.0..10.0),   // vz
        rng.gen_range(1.0..5.0),      // remaining
        rng.gen_range(0.0..1.0),      // r
        rng.gen_range(0.0..1.0),      // g
        rng.gen_range(0.1..2.0),      // width
        rng.gen_range(0.1..2.0),      // height
    )
}

fn spawn_particle(store: &mut EntityStore, rng: &mut ChaCha8Rng) -> Entity {
    let (x, y, z, vx, vy, vz, remaining, r, g, width, height) = random_particle_fields(rng);
    let entity = store.add_entity();
    store.add::<Particle>(entity).unwrap();
    {
        let mut pos = store.add::<Position>(entity).unwrap();
        pos.set_field::<f32>(Position::X, x);
        pos.set_field::<f32>(Position::Y, y);
        pos.set_field::<f32>(Position::Z, z);
    }
    {
        let mut vel = store.add::<Velocity>(entity).unwrap();
        vel.set_field::<f32>(Velocity::X, vx);
        vel.set_field::<f32>(Velocity::Y, vy);
        vel.set_field::<f32>(Velocity::Z, vz);
    }
    {
        let mut life = store.add::<Lifetime>(entity).unwrap();
        life.set_field::<f32>(Lifetime::REMAINING, remaining);
        life.set_field::<f32>(Lifetime::TOTAL, 5.0);
    }
    {
        let mut color = store.add::<Color>(entity).unwrap();
        color.set_field::<f32>(Color::R, r);
        color.set_field::<f32>(Color::G, g);
        color.set_field::<f32>(Color::B, 1.0);
        color.set_field::<f32>(Color::A, 1.0);
    }
    {
        let mut size = store.add::<Size>(entity).unwrap();
        size.set_field::<f32>(Size::WIDTH, width);
        size.set_field::<f32>(Size::HEIGHT, height);
    }
    entity
}

/// Moves every particle by its velocity scaled by `delta_time`.
struct MovementTask {
    delta_time: f32,
}

impl Task for MovementTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        let dt = self.delta_time;
        for m in View::new(ctx.store()).required::<Position>().required::<Velocity>().iter() {
            let entity = m.entity();
            let pos = m.required::<Position>();
            let vel = m.required::<Velocity>();
            let nx = *pos.field::<f32>(Position::X) + *vel.field::<f32>(Velocity::X) * dt;
            let ny = *pos.field::<f32>(Position::Y) + *vel.field::<f32>(Velocity::Y) * dt;
            let nz = *pos.field::<f32>(Position::Z) + *vel.field::<f32>(Velocity::Z) * dt;
            ctx.commands().push(move |store| {
                if let Some(mut pos) = store.get_mut::<Position>(entity) {
                    pos.set_field_no_bump::<f32>(Position::X, nx);
                    pos.set_field_no_bump::<f32>(Position::Y, ny);
                    pos.set_field::<f32>(Position::Z, nz);
                }
            });
        }
        None
    }
}

/// Fades particle color alpha based on remaining lifetime fraction.
struct FadeTask;

impl Task for FadeTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        for m in View::new(ctx.store()).required::<Lifetime>().required::<Color>().iter() {
            let entity = m.entity();
            let life = m.required::<Lifetime>();
            let alpha = (*life.field::<f32>(Lifetime::REMAINING) / *life.field::<f32>(Lifetime::TOTAL)).max(0.0);
            ctx.commands().push(move |store| {
                if let Some(mut color) = store.get_mut::<Color>(entity) {
                    color.set_field::<f32>(Color::A, alpha);
                }
            });
        }
        None
    }
}

/// Decays remaining lifetime and respawns any particle that has died,
/// keeping the total particle count constant.
struct LifetimeTask {
    delta_time: f32,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl Task for LifetimeTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        let dt = self.delta_time;
        let mut dead = Vec::new();
        for m in View::new(ctx.store()).required::<Lifetime>().iter() {
            let life = m.required::<Lifetime>();
            let remaining = *life.field::<f32>(Lifetime::REMAINING) - dt;
            let entity = m.entity();
            if remaining <= 0.0 {
                dead.push(entity);
            } else {
                ctx.commands().push(move |store| {
                    if let Some(mut life) = store.get_mut::<Lifetime>(entity) {
                        life.set_field::<f32>(Lifetime::REMAINING, remaining);
                    }
                });
            }
        }

        let rng = self.rng.clone();
        for dead_entity in dead {
            let rng = rng.clone();
            ctx.commands().push(move |store| {
                store.remove_entity(dead_entity);
                let mut rng = rng.lock().unwrap();
                spawn_particle(store, &mut rng);
            });
        }
        None
    }
}

/// Particle system benchmark scenario.
pub struct ParticleScenario {
    config: ParticleConfig,
    scheduler: Scheduler,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl ParticleScenario {
    /// Create a new particle scenario with default config.
    pub fn new() -> Self {
        Self::with_config(ParticleConfig::default())
    }

    /// Create a new particle scenario with custom config.
    pub fn with_config(config: ParticleConfig) -> Self {
        Self {
            scheduler: Scheduler::new(EntityStore::new()),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(config.seed))),
            config,
        }
    }

    /// Current particle count.
    pub fn current_count(&self) -> usize {
        self.scheduler.with_store(|store| View::new(store).required::<Particle>().iter().count())
    }
}

impl Default for ParticleScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for ParticleScenario {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn description(&self) -> &'static str {
        "High-volume particle system with movement, lifetime, and respawn"
    }

    fn entity_count(&self) -> usize {
        self.config.particle_count
    }

    fn setup(&mut self) {
        let mut rng = self.rng.lock().unwrap();
        self.scheduler.with_store_mut(|store| {
            for _ in 0..self.config.particle_count {
                spawn_particle(store, &mut rng);
            }
        });
    }

    fn update(&mut self) {
        let job = self
            .scheduler
            .job("particles")
            .task(MovementTask {
                delta_time: self.config.delta_time,
            })
            .task(FadeTask)
            .task(LifetimeTask {
                delta_time: self.config.delta_time,
                rng: self.rng.clone(),
            })
            .build();
        self.scheduler.run(job).unwrap();
    }

    fn teardown(&mut self) {
        self.scheduler.with_store_mut(|store| {
            let entities: Vec<Entity> = View::new(store).required::<Particle>().iter().map(|m| m.entity()).collect();
            for entity in entities {
                store.remove_entity(entity);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_scenario_setup() {
        let mut scenario = ParticleScenario::with_config(ParticleConfig {
            particle_count: 100,
            ..Default::default()
        });

        scenario.setup();
        assert_eq!(scenario.current_count(), 100);

        scenario.teardown();
        assert_eq!(scenario.current_count(), 0);
    }

    #[test]
    fn particle_scenario_update() {
        let mut scenario = ParticleScenario::with_config(ParticleConfig {
            particle_count: 100,
            ..Default::default()
        });

        scenario.setup();

        for _ in 0..10 {
            scenario.update();
        }

        // Constant population: dead particles respawn in place.
        assert_eq!(scenario.current_count(), 100);

        scenario.teardown();
    }
}
