//! Minimal end-to-end walkthrough: define two component schemas, add
//! entities, join them with a [`View`], and run a one-shot job on the
//! [`Scheduler`].

use std::sync::OnceLock;

use rusty_engine::ecs::{
    EntityStore, HasSchema, Job, PropertyColumn, PropertyDeclaration, Schema, SchemaBuilder,
    Scheduler, Task, TaskContext, View,
};

struct Position {
    x: f32,
    y: f32,
}

impl HasSchema for Position {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Position>("examples::Position")
                .property(PropertyDeclaration::new("x", false, |cap| {
                    Box::new(PropertyColumn::<f32>::with_capacity(cap))
                }))
                .property(PropertyDeclaration::new("y", false, |cap| {
                    Box::new(PropertyColumn::<f32>::with_capacity(cap))
                }))
                .build()
                .unwrap()
        })
    }
}

// Declared properties are sorted ascending by name ("x" < "y"), so the
// field indices below match that order.
const POSITION_X: usize = 0;
const POSITION_Y: usize = 1;

struct Velocity {
    dx: f32,
    dy: f32,
}

impl HasSchema for Velocity {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Velocity>("examples::Velocity")
                .property(PropertyDeclaration::new("dx", false, |cap| {
                    Box::new(PropertyColumn::<f32>::with_capacity(cap))
                }))
                .property(PropertyDeclaration::new("dy", false, |cap| {
                    Box::new(PropertyColumn::<f32>::with_capacity(cap))
                }))
                .build()
                .unwrap()
        })
    }
}

const VELOCITY_DX: usize = 0;
const VELOCITY_DY: usize = 1;

/// Moves every entity with both `Position` and `Velocity` by one step.
/// Repository columns aren't interior-mutable, so the task reads through
/// the shared store and defers the actual write to `ctx.commands()`.
struct Movement;

impl Task for Movement {
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Option<Job> {
        for m in View::new(ctx.store()).required::<Position>().required::<Velocity>().iter() {
            let entity = m.entity();
            let pos = m.required::<Position>();
            let vel = m.required::<Velocity>();
            let (nx, ny) = (
                *pos.field::<f32>(POSITION_X) + *vel.field::<f32>(VELOCITY_DX),
                *pos.field::<f32>(POSITION_Y) + *vel.field::<f32>(VELOCITY_DY),
            );
            ctx.commands().push(move |store| {
                if let Some(mut pos) = store.get_mut::<Position>(entity) {
                    pos.set_field::<f32>(POSITION_X, nx);
                    pos.set_field::<f32>(POSITION_Y, ny);
                }
            });
        }
        None
    }
}

fn main() {
    let mut store = EntityStore::new();
    for i in 0..5 {
        let e = store.add_entity();
        store
            .add::<Position>(e)
            .unwrap()
            .set_field::<f32>(POSITION_X, i as f32);
        store.add::<Velocity>(e).unwrap().set_field::<f32>(VELOCITY_DX, 1.0);
    }

    let scheduler = Scheduler::new(store);
    let job = scheduler.job("movement").task(Movement).build();
    scheduler.run(job).unwrap();

    scheduler.with_store(|store| {
        for m in View::new(store).required::<Position>().iter() {
            let pos = m.required::<Position>();
            println!(
                "entity {}: x={}",
                m.entity().id(),
                pos.field::<f32>(POSITION_X)
            );
        }
    });
}
