//! End-to-end store scenarios, spec.md §8 (the literal-value walkthroughs).
//!
//! Each component type here declares its schema by hand via
//! `SchemaBuilder`, the way every other test module and `bench` already do
//! (see `DESIGN.md` §6.1.1 for why no derive macro ships).

use std::sync::OnceLock;

use rusty_engine::ecs::{EntityStore, HasSchema, PropertyColumn, PropertyDeclaration, Schema, SchemaBuilder, View};

#[derive(Clone, Copy, Debug, Default)]
struct Int;

impl Int {
    const VALUE: usize = 0;
}

impl HasSchema for Int {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Int>("store_scenarios::Int")
                .property(PropertyDeclaration::new("value", false, |cap| Box::new(PropertyColumn::<i32>::with_capacity(cap))))
                .build()
                .unwrap()
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Point;

impl Point {
    const X: usize = 0;
    const Y: usize = 1;
}

impl HasSchema for Point {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<Point>("store_scenarios::Point")
                .property(PropertyDeclaration::new("x", false, |cap| Box::new(PropertyColumn::<i32>::with_capacity(cap))))
                .property(PropertyDeclaration::new("y", false, |cap| Box::new(PropertyColumn::<i32>::with_capacity(cap))))
                .build()
                .unwrap()
        })
    }
}

/// A component that requires `A`: adding one adds and owns an `A`.
#[derive(Clone, Copy, Debug, Default)]
struct A;

impl A {
    const TAG: usize = 0;
}

impl HasSchema for A {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new::<A>("store_scenarios::A")
                .property(PropertyDeclaration::new("tag", false, |cap| Box::new(PropertyColumn::<i32>::with_capacity(cap))))
                .build()
                .unwrap()
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct B;

impl HasSchema for B {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| SchemaBuilder::new::<B>("store_scenarios::B").required::<A>().build().unwrap())
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Marker;

impl HasSchema for Marker {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| SchemaBuilder::new::<Marker>("store_scenarios::Marker").build().unwrap())
    }
}

/// Scenario 1: add a component, read it back, bump its version via a
/// setter, and see both the new value and a strictly larger version.
#[test]
fn scenario_1_add_read_set_bumps_version() {
    let mut store = EntityStore::new();
    let e1 = store.add_entity();
    store.add::<Int>(e1).unwrap().set_field::<i32>(Int::VALUE, 7);

    let handle = store.get::<Int>(e1).unwrap();
    assert_eq!(*handle.field::<i32>(Int::VALUE), 7);
    let v1 = handle.version();
    assert!(v1 > 0);
    drop(handle);

    store.get_mut::<Int>(e1).unwrap().set_field::<i32>(Int::VALUE, 8);

    let handle = store.get::<Int>(e1).unwrap();
    assert_eq!(*handle.field::<i32>(Int::VALUE), 8);
    let v2 = handle.version();
    assert!(v2 > v1);
}

/// Scenario 2: 100 entities each carrying `Point{x=i, y=i+1}`; remove the
/// even-indexed ones; compact; the view over `Point` yields 50 rows in
/// ascending entity order with `x` values `{1,3,5,...,99}`.
#[test]
fn scenario_2_compact_packs_survivors_in_ascending_order() {
    let mut store = EntityStore::new();
    let mut entities = Vec::with_capacity(100);
    for i in 0..100 {
        let e = store.add_entity();
        let mut point = store.add::<Point>(e).unwrap();
        point.set_field_no_bump::<i32>(Point::X, i);
        point.set_field::<i32>(Point::Y, i + 1);
        entities.push(e);
    }

    for (i, &e) in entities.iter().enumerate() {
        if i % 2 == 0 {
            store.remove_entity(e);
        }
    }

    store.compact();

    let xs: Vec<i32> = View::new(&store)
        .required::<Point>()
        .iter()
        .map(|m| *m.required::<Point>().field::<i32>(Point::X))
        .collect();

    assert_eq!(xs.len(), 50);
    let expected: Vec<i32> = (0..100).filter(|i| i % 2 == 1).collect();
    assert_eq!(xs, expected);
}

/// Scenario 3: `B` requires `A`; `add(B)` creates an owned `A`; `remove(B)`
/// takes both down with it.
#[test]
fn scenario_3_required_component_is_owned_and_cascades() {
    let mut store = EntityStore::new();
    let e = store.add_entity();
    store.add::<B>(e).unwrap();

    assert!(store.has::<A>(e));
    assert!(store.has::<B>(e));

    store.remove::<B>(e);

    assert!(store.get::<A>(e).is_none());
    assert!(store.get::<B>(e).is_none());
}

/// Scenario 4: an owner chain `e3 -owns-> c1 -owns-> c2 -owns-> e1 -owns->
/// e2`, where `c1`/`c2` are `e3`'s own `A`/`Int` components. Removing `c1`
/// (by type, off `e3`) cascades down the whole chain, while `e3` itself
/// survives.
#[test]
fn scenario_4_removing_a_component_cascades_down_an_owner_chain() {
    use std::any::TypeId;

    use rusty_engine::ecs::Ownable;

    let mut store = EntityStore::new();

    let e3 = store.add_entity();
    let e1 = store.add_entity();
    let e2 = store.add_entity();

    let c1 = store.add::<A>(e3).unwrap().id();
    let c2 = store.add::<Int>(e3).unwrap().id();

    store
        .ownership_mut()
        .set_owner(Ownable::Component(TypeId::of::<A>(), c1), Some(Ownable::Entity(e3.id())))
        .unwrap();
    store
        .ownership_mut()
        .set_owner(Ownable::Component(TypeId::of::<Int>(), c2), Some(Ownable::Component(TypeId::of::<A>(), c1)))
        .unwrap();
    store
        .ownership_mut()
        .set_owner(Ownable::Entity(e1.id()), Some(Ownable::Component(TypeId::of::<Int>(), c2)))
        .unwrap();
    store.set_entity_owner(e2, Some(e1)).unwrap();

    assert!(store.is_alive(e1));
    assert!(store.is_alive(e2));

    store.remove::<A>(e3);

    assert!(!store.has::<A>(e3));
    assert!(!store.has::<Int>(e3));
    assert!(!store.is_alive(e1));
    assert!(!store.is_alive(e2));
    assert!(store.is_alive(e3));
}

#[test]
fn add_then_remove_then_add_yields_a_fresh_id_fresh_version_and_defaults() {
    let mut store = EntityStore::new();
    let e = store.add_entity();

    let first = store.add::<Int>(e).unwrap();
    let first_id = first.id();
    drop(first);
    store.remove::<Int>(e);

    let second = store.add::<Int>(e).unwrap();
    assert_ne!(second.id(), first_id);
    assert_eq!(*second.field::<i32>(Int::VALUE), 0);
}

#[test]
fn compact_twice_with_no_mutation_in_between_is_a_no_op() {
    let mut store = EntityStore::new();
    for _ in 0..10 {
        let e = store.add_entity();
        store.add::<Marker>(e).unwrap();
    }
    store.compact();
    let before: Vec<_> = View::new(&store).required::<Marker>().iter().map(|m| m.entity()).collect();
    store.compact();
    let after: Vec<_> = View::new(&store).required::<Marker>().iter().map(|m| m.entity()).collect();
    assert_eq!(before, after);
}

#[test]
fn view_join_over_two_required_types_matches_entities_with_both() {
    let mut store = EntityStore::new();
    let both = store.add_entity();
    store.add::<Int>(both).unwrap();
    store.add::<Marker>(both).unwrap();

    let only_int = store.add_entity();
    store.add::<Int>(only_int).unwrap();

    let only_marker = store.add_entity();
    store.add::<Marker>(only_marker).unwrap();

    let matches: Vec<_> = View::new(&store).required::<Int>().required::<Marker>().iter().map(|m| m.entity()).collect();
    assert_eq!(matches, vec![both]);

    // Driving from whichever required type happens to be rarest doesn't
    // change the result set.
    let matches_swapped: Vec<_> = View::new(&store).required::<Marker>().required::<Int>().iter().map(|m| m.entity()).collect();
    assert_eq!(matches_swapped, vec![both]);
}
