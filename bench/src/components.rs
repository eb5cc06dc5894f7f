//! Common component types used across benchmarks.
//!
//! These components are designed to be representative of real game
//! components in terms of size and access patterns. Each declares its
//! schema by hand via `SchemaBuilder` (there is no derive macro for this
//! core, see `SPEC_FULL.md` §6.1.1) and exposes its declared field indices
//! as associated constants, the way the engine's own test modules do.

use std::sync::OnceLock;

use rusty_engine::ecs::{HasSchema, PropertyColumn, PropertyDeclaration, Schema, SchemaBuilder};

macro_rules! property {
    ($name:literal, $ty:ty) => {
        PropertyDeclaration::new($name, false, |cap| Box::new(PropertyColumn::<$ty>::with_capacity(cap)))
    };
}

// =============================================================================
// Transform Components (common in most games)
// =============================================================================

/// 3D position component.
#[derive(Clone, Copy, Debug, Default)]
pub struct Position;

impl Position {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
}

impl HasSchema for Position {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Position>("bench::Position")
                .property(property!("x", f32))
                .property(property!("y", f32))
                .property(property!("z", f32))
                .build()
                .unwrap()
        })
    }
}

/// 3D velocity component.
#[derive(Clone, Copy, Debug, Default)]
pub struct Velocity;

impl Velocity {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
}

impl HasSchema for Velocity {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Velocity>("bench::Velocity")
                .property(property!("x", f32))
                .property(property!("y", f32))
                .property(property!("z", f32))
                .build()
                .unwrap()
        })
    }
}

/// 3D acceleration component.
#[derive(Clone, Copy, Debug, Default)]
pub struct Acceleration;

impl Acceleration {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
}

impl HasSchema for Acceleration {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Acceleration>("bench::Acceleration")
                .property(property!("x", f32))
                .property(property!("y", f32))
                .property(property!("z", f32))
                .build()
                .unwrap()
        })
    }
}

/// Rotation as euler angles.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rotation;

impl Rotation {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
}

impl HasSchema for Rotation {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Rotation>("bench::Rotation")
                .property(property!("x", f32))
                .property(property!("y", f32))
                .property(property!("z", f32))
                .build()
                .unwrap()
        })
    }
}

/// Transform translation, stored as a flat 4x4 row-major matrix.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transform;

impl Transform {
    pub const MATRIX: usize = 0;

    pub fn identity() -> [[f32; 4]; 4] {
        [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

impl HasSchema for Transform {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Transform>("bench::Transform")
                .property(property!("matrix", [[f32; 4]; 4]))
                .build()
                .unwrap()
        })
    }
}

// =============================================================================
// Game Entity Components
// =============================================================================

/// Health component for damageable entities.
#[derive(Clone, Copy, Debug, Default)]
pub struct Health;

impl Health {
    pub const CURRENT: usize = 0;
    pub const MAX: usize = 1;
}

impl HasSchema for Health {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Health>("bench::Health")
                .property(property!("current", f32))
                .property(property!("max", f32))
                .build()
                .unwrap()
        })
    }
}

/// Simple AI state component.
#[derive(Clone, Copy, Debug, Default)]
pub struct AiState;

impl AiState {
    pub const STATE: usize = 0;
    pub const TARGET_X: usize = 1;
    pub const TARGET_Y: usize = 2;
    pub const TIMER: usize = 3;
}

impl HasSchema for AiState {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        // Declared properties sort ascending by name: state, target_x,
        // target_y, timer.
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<AiState>("bench::AiState")
                .property(property!("state", u32))
                .property(property!("target_x", f32))
                .property(property!("target_y", f32))
                .property(property!("timer", f32))
                .build()
                .unwrap()
        })
    }
}

/// Team/faction identifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct Team;

impl Team {
    pub const ID: usize = 0;
}

impl HasSchema for Team {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Team>("bench::Team")
                .property(property!("id", u32))
                .build()
                .unwrap()
        })
    }
}

/// A projectile marker, carries no fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct Projectile;

impl HasSchema for Projectile {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| SchemaBuilder::new::<Projectile>("bench::Projectile").build().unwrap())
    }
}

// =============================================================================
// Particle System Components
// =============================================================================

/// A particle marker, carries no fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct Particle;

impl HasSchema for Particle {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| SchemaBuilder::new::<Particle>("bench::Particle").build().unwrap())
    }
}

/// Particle lifetime tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lifetime;

impl Lifetime {
    pub const REMAINING: usize = 0;
    pub const TOTAL: usize = 1;
}

impl HasSchema for Lifetime {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Lifetime>("bench::Lifetime")
                .property(property!("remaining", f32))
                .property(property!("total", f32))
                .build()
                .unwrap()
        })
    }
}

/// RGBA color.
#[derive(Clone, Copy, Debug, Default)]
pub struct Color;

impl Color {
    pub const A: usize = 0;
    pub const B: usize = 1;
    pub const G: usize = 2;
    pub const R: usize = 3;
}

impl HasSchema for Color {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        // Declared properties sort ascending by name: a, b, g, r.
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Color>("bench::Color")
                .property(property!("a", f32))
                .property(property!("b", f32))
                .property(property!("g", f32))
                .property(property!("r", f32))
                .build()
                .unwrap()
        })
    }
}

/// Particle size/scale.
#[derive(Clone, Copy, Debug, Default)]
pub struct Size;

impl Size {
    pub const HEIGHT: usize = 0;
    pub const WIDTH: usize = 1;
}

impl HasSchema for Size {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Size>("bench::Size")
                .property(property!("height", f32))
                .property(property!("width", f32))
                .build()
                .unwrap()
        })
    }
}

// =============================================================================
// Fragmentation Test Components (A-F: a handful of archetypes, not the
// original 26 — see DESIGN.md for why the set was trimmed)
// =============================================================================

/// Shared data component for fragmentation tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Data;

impl Data {
    pub const VALUE: usize = 0;
}

impl HasSchema for Data {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Data>("bench::Data")
                .property(property!("value", f64))
                .build()
                .unwrap()
        })
    }
}

macro_rules! define_marker_components {
    ($($name:ident),*) => {
        $(
            #[derive(Clone, Copy, Debug, Default)]
            pub struct $name;

            impl HasSchema for $name {
                fn schema() -> &'static Schema {
                    static SCHEMA: OnceLock<Schema> = OnceLock::new();
                    SCHEMA.get_or_init(|| {
                        SchemaBuilder::new::<$name>(concat!("bench::", stringify!($name)))
                            .build()
                            .unwrap()
                    })
                }
            }
        )*
    };
}

// Marker components for creating a handful of archetypes in the
// fragmented-iteration microbenchmark.
define_marker_components!(MarkerA, MarkerB, MarkerC, MarkerD, MarkerE, MarkerF);
