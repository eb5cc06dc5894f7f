//! Physics simulation benchmark scenario.
//!
//! Simulates a physics-heavy workload with:
//! - ~50,000 rigid bodies
//! - Position, Velocity, Acceleration integration
//! - Transform matrix updates
//!
//! This scenario tests:
//! - Compute-heavy component updates
//! - Large entity iteration
//! - Multi-component access patterns

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use rusty_engine::ecs::{Entity, EntityStore, Job, Scheduler, Task, TaskContext, View};

use crate::components::{Acceleration, Position, Transform, Velocity};
use crate::scenarios::Scenario;

/// Configuration for the physics benchmark.
pub struct PhysicsConfig {
    /// Number of physics bodies.
    pub body_count: usize,
    /// Fixed timestep for physics integration.
    pub delta_time: f32,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            body_count: 50_000,
            delta_time: 1.0 / 120.0, // 120 Hz physics
            seed: 99999,
        }
    }
}

fn spawn_body(store: &mut EntityStore, rng: &mut ChaCha8Rng) -> Entity {
    let entity = store.add_entity();
    {
        let mut pos = store.add::<Position>(entity).unwrap();
        pos.set_field_no_bump::<f32>(Position::X, rng.gen_range(-1000.0..1000.0));
        pos.set_field_no_bump::<f32>(Position::Y, rng.gen_range(-1000.0..1000.0));
        pos.set_field::<f32>(Position::Z, rng.gen_range(-1000.0..1000.0));
    }
    {
        let mut vel = store.add::<Velocity>(entity).unwrap();
        vel.set_field_no_bump::<f32>(Velocity::X, rng.gen_range(-10.0..10.0));
        vel.set_field_no_bump::<f32>(Velocity::Y, rng.gen_range(-10.0..10.0));
        vel.set_field::<f32>(Velocity::Z, rng.gen_range(-10.0..10.0));
    }
    {
        let mut accel = store.add::<Acceleration>(entity).unwrap();
        accel.set_field_no_bump::<f32>(Acceleration::X, 0.0);
        accel.set_field_no_bump::<f32>(Acceleration::Y, -9.81);
        accel.set_field::<f32>(Acceleration::Z, 0.0);
    }
    store.add::<Transform>(entity).unwrap().set_field::<[[f32; 4]; 4]>(Transform::MATRIX, Transform::identity());
    entity
}

/// Integrates acceleration into velocity.
struct IntegrateAccelerationTask {
    delta_time: f32,
}

impl Task for IntegrateAccelerationTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        let dt = self.delta_time;
        for m in View::new(ctx.store()).required::<Acceleration>().required::<Velocity>().iter() {
            let entity = m.entity();
            let accel = m.required::<Acceleration>();
            let vel = m.required::<Velocity>();
            let nx = *vel.field::<f32>(Velocity::X) + *accel.field::<f32>(Acceleration::X) * dt;
            let ny = *vel.field::<f32>(Velocity::Y) + *accel.field::<f32>(Acceleration::Y) * dt;
            let nz = *vel.field::<f32>(Velocity::Z) + *accel.field::<f32>(Acceleration::Z) * dt;
            ctx.commands().push(move |store| {
                if let Some(mut vel) = store.get_mut::<Velocity>(entity) {
                    vel.set_field_no_bump::<f32>(Velocity::X, nx);
                    vel.set_field_no_bump::<f32>(Velocity::Y, ny);
                    vel.set_field::<f32>(Velocity::Z, nz);
                }
            });
        }
        None
    }
}

/// Integrates velocity into position, then bounces bodies off a fixed
/// boundary.
struct IntegrateVelocityTask {
    delta_time: f32,
}

impl Task for IntegrateVelocityTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        const BOUNDS: f32 = 1000.0;
        let dt = self.delta_time;
        for m in View::new(ctx.store()).required::<Position>().required::<Velocity>().iter() {
            let entity = m.entity();
            let pos = m.required::<Position>();
            let vel = m.required::<Velocity>();

            let mut nx = *pos.field::<f32>(Position::X) + *vel.field::<f32>(Velocity::X) * dt;
            let mut ny = *pos.field::<f32>(Position::Y) + *vel.field::<f32>(Velocity::Y) * dt;
            let mut nz = *pos.field::<f32>(Position::Z) + *vel.field::<f32>(Velocity::Z) * dt;
            let mut vx = *vel.field::<f32>(Velocity::X);
            let mut vy = *vel.field::<f32>(Velocity::Y);
            let mut vz = *vel.field::<f32>(Velocity::Z);

            if nx.abs() > BOUNDS {
                nx = nx.signum() * BOUNDS;
                vx = -vx * 0.8;
            }
            if ny.abs() > BOUNDS {
                ny = ny.signum() * BOUNDS;
                vy = -vy * 0.8;
            }
            if nz.abs() > BOUNDS {
                nz = nz.signum() * BOUNDS;
                vz = -vz * 0.8;
            }

            ctx.commands().push(move |store| {
                if let Some(mut pos) = store.get_mut::<Position>(entity) {
                    pos.set_field_no_bump::<f32>(Position::X, nx);
                    pos.set_field_no_bump::<f32>(Position::Y, ny);
                    pos.set_field::<f32>(Position::Z, nz);
                }
                if let Some(mut vel) = store.get_mut::<Velocity>(entity) {
                    vel.set_field_no_bump::<f32>(Velocity::X, vx);
                    vel.set_field_no_bump::<f32>(Velocity::Y, vy);
                    vel.set_field::<f32>(Velocity::Z, vz);
                }
            });
        }
        None
    }
}

/// Writes position into the transform matrix's translation column and
/// renormalizes the diagonal scale — deliberately compute-heavy, to mirror
/// a real transform-update system.
struct UpdateTransformsTask;

impl Task for UpdateTransformsTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        for m in View::new(ctx.store()).required::<Position>().required::<Transform>().iter() {
            let entity = m.entity();
            let pos = m.required::<Position>();
            let transform = m.required::<Transform>();
            let mut matrix = *transform.field::<[[f32; 4]; 4]>(Transform::MATRIX);

            matrix[0][3] = *pos.field::<f32>(Position::X);
            matrix[1][3] = *pos.field::<f32>(Position::Y);
            matrix[2][3] = *pos.field::<f32>(Position::Z);

            let scale = 1.0 / (matrix[0][0] * matrix[0][0] + matrix[1][1] * matrix[1][1] + matrix[2][2] * matrix[2][2]).sqrt();
            matrix[0][0] *= scale;
            matrix[1][1] *= scale;
            matrix[2][2] *= scale;

            ctx.commands().push(move |store| {
                if let Some(mut transform) = store.get_mut::<Transform>(entity) {
                    transform.set_field::<[[f32; 4]; 4]>(Transform::MATRIX, matrix);
                }
            });
        }
        None
    }
}

/// Physics simulation benchmark scenario.
pub struct PhysicsScenario {
    config: PhysicsConfig,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
    bodies: Vec<Entity>,
}

impl PhysicsScenario {
    /// Create a new physics scenario with default config.
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    /// Create a new physics scenario with custom config.
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            scheduler: Scheduler::new(EntityStore::new()),
            bodies: Vec::new(),
            config,
        }
    }

    /// Current body count.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

impl Default for PhysicsScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for PhysicsScenario {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn description(&self) -> &'static str {
        "Physics simulation with acceleration/velocity integration and transforms"
    }

    fn entity_count(&self) -> usize {
        self.config.body_count
    }

    fn setup(&mut self) {
        self.bodies = Vec::with_capacity(self.config.body_count);
        let rng = &mut self.rng;
        let bodies = &mut self.bodies;
        self.scheduler.with_store_mut(|store| {
            for _ in 0..bodies.capacity() {
                bodies.push(spawn_body(store, rng));
            }
        });
    }

    fn update(&mut self) {
        let job = self
            .scheduler
            .job("physics")
            .task(IntegrateAccelerationTask {
                delta_time: self.config.delta_time,
            })
            .task(IntegrateVelocityTask {
                delta_time: self.config.delta_time,
            })
            .task(UpdateTransformsTask)
            .build();
        self.scheduler.run(job).unwrap();
    }

    fn teardown(&mut self) {
        self.scheduler.with_store_mut(|store| {
            for entity in self.bodies.drain(..) {
                store.remove_entity(entity);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physics_scenario_setup() {
        let mut scenario = PhysicsScenario::with_config(PhysicsConfig {
            body_count: 100,
            ..Default::default()
        });

        scenario.setup();
        assert_eq!(scenario.body_count(), 100);

        scenario.teardown();
        assert_eq!(scenario.body_count(), 0);
    }

    #[test]
    fn physics_scenario_update() {
        let mut scenario = PhysicsScenario::with_config(PhysicsConfig {
            body_count: 100,
            ..Default::default()
        });

        scenario.setup();

        for _ in 0..60 {
            scenario.update();
        }

        assert_eq!(scenario.body_count(), 100);
        scenario.teardown();
    }
}
