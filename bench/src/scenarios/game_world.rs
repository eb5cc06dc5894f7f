//! Game world benchmark scenario.
//!
//! Simulates a mixed game world with:
//! - ~10,000 entities across multiple archetypes
//! - NPCs with AI, health, team affiliation
//! - Players with health and team affiliation
//! - Projectiles with short lifetimes
//! - Static objects
//!
//! This scenario tests:
//! - Multiple required/optional component combinations
//! - Complex component access patterns
//! - Varied task workloads

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use rusty_engine::ecs::{Entity, EntityStore, Job, Scheduler, Task, TaskContext, View};

use crate::components::{AiState, Health, Lifetime, Position, Team, Velocity};
use crate::scenarios::Scenario;

/// Configuration for the game world benchmark.
#[derive(Clone)]
pub struct GameWorldConfig {
    /// Number of NPC entities.
    pub npc_count: usize,
    /// Number of player entities.
    pub player_count: usize,
    /// Number of projectile entities.
    pub projectile_count: usize,
    /// Number of static objects.
    pub static_count: usize,
    /// Simulated delta time per frame.
    pub delta_time: f32,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for GameWorldConfig {
    fn default() -> Self {
        Self {
            npc_count: 5_000,
            player_count: 100,
            projectile_count: 2_000,
            static_count: 3_000,
            delta_time: 1.0 / 60.0,
            seed: 54321,
        }
    }
}

fn random_position(rng: &mut ChaCha8Rng) -> (f32, f32, f32) {
    (rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0), 0.0)
}

fn spawn_position(store: &mut EntityStore, entity: Entity, x: f32, y: f32, z: f32) {
    let mut pos = store.add::<Position>(entity).unwrap();
    pos.set_field_no_bump::<f32>(Position::X, x);
    pos.set_field_no_bump::<f32>(Position::Y, y);
    pos.set_field::<f32>(Position::Z, z);
}

fn spawn_npc(store: &mut EntityStore, rng: &mut ChaCha8Rng) -> Entity {
    let (x, y, z) = random_position(rng);
    let entity = store.add_entity();
    spawn_position(store, entity, x, y, z);
    store.add::<Velocity>(entity).unwrap();
    {
        let mut health = store.add::<Health>(entity).unwrap();
        health.set_field_no_bump::<f32>(Health::CURRENT, 100.0);
        health.set_field::<f32>(Health::MAX, 100.0);
    }
    {
        let mut ai = store.add::<AiState>(entity).unwrap();
        ai.set_field_no_bump::<u32>(AiState::STATE, 0);
        ai.set_field_no_bump::<f32>(AiState::TIMER, rng.gen_range(0.0..5.0));
        ai.set_field_no_bump::<f32>(AiState::TARGET_X, rng.gen_range(-500.0..500.0));
        ai.set_field::<f32>(AiState::TARGET_Y, rng.gen_range(-500.0..500.0));
    }
    store.add::<Team>(entity).unwrap().set_field::<u32>(Team::ID, rng.gen_range(0..4));
    entity
}

fn spawn_player(store: &mut EntityStore, rng: &mut ChaCha8Rng) -> Entity {
    let (x, y, z) = random_position(rng);
    let entity = store.add_entity();
    spawn_position(store, entity, x, y, z);
    store.add::<Velocity>(entity).unwrap();
    {
        let mut health = store.add::<Health>(entity).unwrap();
        health.set_field_no_bump::<f32>(Health::CURRENT, 100.0);
        health.set_field::<f32>(Health::MAX, 100.0);
    }
    store.add::<Team>(entity).unwrap().set_field::<u32>(Team::ID, 0);
    entity
}

fn spawn_projectile(store: &mut EntityStore, rng: &mut ChaCha8Rng) -> Entity {
    let (x, y, z) = random_position(rng);
    let entity = store.add_entity();
    spawn_position(store, entity, x, y, z);
    {
        let mut vel = store.add::<Velocity>(entity).unwrap();
        vel.set_field_no_bump::<f32>(Velocity::X, rng.gen_range(-50.0..50.0));
        vel.set_field_no_bump::<f32>(Velocity::Y, rng.gen_range(-50.0..50.0));
        vel.set_field::<f32>(Velocity::Z, 0.0);
    }
    {
        let mut life = store.add::<Lifetime>(entity).unwrap();
        life.set_field_no_bump::<f32>(Lifetime::REMAINING, rng.gen_range(0.5..2.0));
        life.set_field::<f32>(Lifetime::TOTAL, 2.0);
    }
    store.add::<Team>(entity).unwrap().set_field::<u32>(Team::ID, rng.gen_range(0..4));
    entity
}

fn spawn_static(store: &mut EntityStore, rng: &mut ChaCha8Rng) -> Entity {
    let (x, y, z) = random_position(rng);
    let entity = store.add_entity();
    spawn_position(store, entity, x, y, z);
    entity
}

/// Steers NPCs towards their AI target and picks a new one periodically.
struct AiTask {
    delta_time: f32,
}

impl Task for AiTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        let dt = self.delta_time;
        for m in View::new(ctx.store())
            .required::<Position>()
            .required::<AiState>()
            .required::<Velocity>()
            .iter()
        {
            let entity = m.entity();
            let pos = m.required::<Position>();
            let ai = m.required::<AiState>();

            let mut timer = *ai.field::<f32>(AiState::TIMER) - dt;
            let mut state = *ai.field::<u32>(AiState::STATE);
            if timer <= 0.0 {
                state = (state + 1) % 4;
                timer = 2.0;
            }

            let target_x = *ai.field::<f32>(AiState::TARGET_X);
            let target_y = *ai.field::<f32>(AiState::TARGET_Y);
            let dx = target_x - *pos.field::<f32>(Position::X);
            let dy = target_y - *pos.field::<f32>(Position::Y);
            let dist = (dx * dx + dy * dy).sqrt().max(0.001);
            let speed = 10.0;
            let (vx, vy) = (dx / dist * speed, dy / dist * speed);

            ctx.commands().push(move |store| {
                if let Some(mut ai) = store.get_mut::<AiState>(entity) {
                    ai.set_field_no_bump::<u32>(AiState::STATE, state);
                    ai.set_field::<f32>(AiState::TIMER, timer);
                }
                if let Some(mut vel) = store.get_mut::<Velocity>(entity) {
                    vel.set_field_no_bump::<f32>(Velocity::X, vx);
                    vel.set_field::<f32>(Velocity::Y, vy);
                }
            });
        }
        None
    }
}

/// Applies velocity to position for every moving entity.
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

/// Decays projectile lifetimes and removes any that have expired.
struct ProjectileLifetimeTask {
    delta_time: f32,
}

impl Task for ProjectileLifetimeTask {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        let dt = self.delta_time;
        for m in View::new(ctx.store()).required::<Lifetime>().iter() {
            let life = m.required::<Lifetime>();
            let remaining = *life.field::<f32>(Lifetime::REMAINING) - dt;
            let entity = m.entity();
            if remaining <= 0.0 {
                ctx.commands().push(move |store| {
                    store.remove_entity(entity);
                });
            } else {
                ctx.commands().push(move |store| {
                    if let Some(mut life) = store.get_mut::<Lifetime>(entity) {
                        life.set_field::<f32>(Lifetime::REMAINING, remaining);
                    }
                });
            }
        }
        None
    }
}

/// Game world benchmark scenario.
pub struct GameWorldScenario {
    config: GameWorldConfig,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
}

impl GameWorldScenario {
    /// Create a new game world scenario with default config.
    pub fn new() -> Self {
        Self::with_config(GameWorldConfig::default())
    }

    /// Create a new game world scenario with custom config.
    pub fn with_config(config: GameWorldConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            scheduler: Scheduler::new(EntityStore::new()),
            config,
        }
    }

    /// Total live entity count.
    pub fn total_count(&self) -> usize {
        self.scheduler.with_store(|store| store.len())
    }
}

impl Default for GameWorldScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for GameWorldScenario {
    fn name(&self) -> &'static str {
        "game_world"
    }

    fn description(&self) -> &'static str {
        "Mixed game world with NPCs, players, projectiles, and static objects"
    }

    fn entity_count(&self) -> usize {
        self.config.npc_count + self.config.player_count + self.config.projectile_count + self.config.static_count
    }

    fn setup(&mut self) {
        let rng = &mut self.rng;
        self.scheduler.with_store_mut(|store| {
            for _ in 0..self.config.npc_count {
                spawn_npc(store, rng);
            }
            for _ in 0..self.config.player_count {
                spawn_player(store, rng);
            }
            for _ in 0..self.config.projectile_count {
                spawn_projectile(store, rng);
            }
            for _ in 0..self.config.static_count {
                spawn_static(store, rng);
            }
        });
    }

    fn update(&mut self) {
        let job = self
            .scheduler
            .job("game_world")
            .task(AiTask {
                delta_time: self.config.delta_time,
            })
            .task(MovementTask {
                delta_time: self.config.delta_time,
            })
            .task(ProjectileLifetimeTask {
                delta_time: self.config.delta_time,
            })
            .build();
        self.scheduler.run(job).unwrap();
    }

    fn teardown(&mut self) {
        // Every archetype here is reachable through Position; removing by
        // that join is cheaper than replacing the whole store.
        self.scheduler.with_store_mut(|store| {
            let entities: Vec<Entity> = View::new(store).required::<Position>().iter().map(|m| m.entity()).collect();
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
    fn game_world_scenario_setup() {
        let mut scenario = GameWorldScenario::with_config(GameWorldConfig {
            npc_count: 50,
            player_count: 5,
            projectile_count: 20,
            static_count: 25,
            ..Default::default()
        });

        scenario.setup();
        assert_eq!(scenario.total_count(), 100);

        scenario.teardown();
        assert_eq!(scenario.total_count(), 0);
    }
}
