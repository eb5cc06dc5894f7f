//! `rusty_engine`: a data-oriented entity/component core.
//!
//! Packed columnar component storage addressed by stable entity/component
//! ids, a schema model describing each component type's fields, an
//! ownership graph that cascades destruction, joined views over required/
//! optional component types, and a job/task scheduler with per-type
//! locking. See [`ecs`] for the full module layout.

pub mod ecs;
