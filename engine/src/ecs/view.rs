//! Joined iteration over required/optional component types (spec.md §4.6).
//!
//! A [`View`] is built against one [`EntityStore`] from a set of required
//! component types; it drives iteration from whichever required repository
//! currently holds the fewest live rows, which keeps the join cheap
//! regardless of which type happens to be rarest at any given moment.
//!
//! Rather than generating one concrete iterator item type per required/
//! optional arity combination, a [`ViewMatch`] carries the matched
//! [`Entity`] plus a reference back to the store: `.required::<T>()` and
//! `.optional::<T>()` are both just `EntityStore::get` calls keyed off that
//! entity, the only difference being that a required type is guaranteed
//! `Some` (the join already filtered on it) while an optional type may
//! legitimately be absent. This keeps the join itself generic over an
//! arbitrary list of `TypeId`s instead of needing a hand-written struct per
//! arity, at the cost of one extra hash lookup per accessed field — a good
//! trade here since the driver-selection and presence-check work already
//! dominates the per-row cost.

use std::any::TypeId;

use crate::ecs::entity::Entity;
use crate::ecs::entity_store::{Component, EntityStore};
use crate::ecs::schema::HasSchema;

/// One matched entity from a [`View`]: guaranteed to carry every required
/// type, and offers `.optional::<T>()` for types that may or may not be
/// present.
pub struct ViewMatch<'a> {
    entity: Entity,
    store: &'a EntityStore,
}

impl<'a> ViewMatch<'a> {
    /// The matched entity.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// A required component type's live handle. Panics if `T` was not
    /// declared required on the `View` that produced this match — that
    /// would be a logic error in the caller, not a runtime possibility,
    /// since the join only yields entities that already have it.
    pub fn required<T: HasSchema>(&self) -> Component<'a, T> {
        self.store
            .get::<T>(self.entity)
            .expect("ViewMatch::required called for a type the view did not guarantee")
    }

    /// An optional component type's live handle, or `None` if this entity
    /// doesn't have one.
    pub fn optional<T: HasSchema>(&self) -> Option<Component<'a, T>> {
        self.store.get::<T>(self.entity)
    }
}

/// A lazy, single-pass-per-construction join over one `EntityStore`.
///
/// Built with [`View::new`] plus [`View::required`]/[`View::optional`]
/// declarations. An empty required set, or a required type with no
/// repository yet, both just yield zero matches (spec.md §7 reserves
/// `InvalidArgument` for this at the call sites that build a `View` from
/// user-supplied type lists; `View` itself is the typed builder those
/// call sites use, so it stays infallible and simply empty).
pub struct View<'a> {
    store: &'a EntityStore,
    required: Vec<TypeId>,
    optional: Vec<TypeId>,
}

impl<'a> View<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self {
            store,
            required: Vec::new(),
            optional: Vec::new(),
        }
    }

    /// Declare a required component type. Order of declaration does not
    /// affect the result set, only (indirectly, via live counts) which
    /// repository drives iteration.
    pub fn required<T: HasSchema>(mut self) -> Self {
        self.required.push(TypeId::of::<T>());
        self
    }

    /// Declare an optional component type, attached to every match via
    /// `ViewMatch::optional::<T>()`.
    pub fn optional<T: HasSchema>(mut self) -> Self {
        self.optional.push(TypeId::of::<T>());
        self
    }

    /// Iterate matches.
    pub fn iter(&self) -> ViewIter<'a> {
        if self.required.is_empty() {
            return ViewIter::empty(self.store);
        }

        let mut driver: Option<(TypeId, usize)> = None;
        for &type_id in &self.required {
            let Some(len) = self.store.repo_len_by_type(type_id) else {
                // A required type with no repository yet has zero live
                // components: the join is empty, full stop.
                return ViewIter::empty(self.store);
            };
            if driver.map(|(_, best)| len < best).unwrap_or(true) {
                driver = Some((type_id, len));
            }
        }
        let (driver_type, _) = driver.expect("required is non-empty");

        let others: Vec<TypeId> = self
            .required
            .iter()
            .copied()
            .filter(|&t| t != driver_type)
            .collect();

        let rows = self
            .store
            .live_entity_rows_for_type(driver_type)
            .unwrap_or_default();

        ViewIter {
            store: self.store,
            rows,
            next: 0,
            others,
        }
    }
}

/// Iterator over [`View`] matches, driven by the required repository with
/// the fewest live rows at the time `iter()` was called.
pub struct ViewIter<'a> {
    store: &'a EntityStore,
    rows: Vec<u32>,
    next: usize,
    others: Vec<TypeId>,
}

impl<'a> ViewIter<'a> {
    fn empty(store: &'a EntityStore) -> Self {
        Self {
            store,
            rows: Vec::new(),
            next: 0,
            others: Vec::new(),
        }
    }
}

impl<'a> Iterator for ViewIter<'a> {
    type Item = ViewMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.rows.len() {
            let entity_row = self.rows[self.next];
            self.next += 1;
            if self
                .others
                .iter()
                .all(|&t| self.store.has_type_at_row(t, entity_row))
            {
                return Some(ViewMatch {
                    entity: self.store.entity_at_row(entity_row),
                    store: self.store,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::property::PropertyColumn;
    use crate::ecs::schema::{PropertyDeclaration, Schema, SchemaBuilder};
    use std::sync::OnceLock;

    struct A;
    impl HasSchema for A {
        fn schema() -> &'static Schema {
            static S: OnceLock<Schema> = OnceLock::new();
            S.get_or_init(|| {
                SchemaBuilder::new::<A>("A")
                    .property(PropertyDeclaration::new("v", false, |c| {
                        Box::new(PropertyColumn::<i32>::with_capacity(c))
                    }))
                    .build()
                    .unwrap()
            })
        }
    }
    struct B;
    impl HasSchema for B {
        fn schema() -> &'static Schema {
            static S: OnceLock<Schema> = OnceLock::new();
            S.get_or_init(|| {
                SchemaBuilder::new::<B>("B")
                    .property(PropertyDeclaration::new("v", false, |c| {
                        Box::new(PropertyColumn::<i32>::with_capacity(c))
                    }))
                    .build()
                    .unwrap()
            })
        }
    }
    struct C;
    impl HasSchema for C {
        fn schema() -> &'static Schema {
            static S: OnceLock<Schema> = OnceLock::new();
            S.get_or_init(|| SchemaBuilder::new::<C>("C").build().unwrap())
        }
    }

    #[test]
    fn join_matches_entities_with_both_required_types_regardless_of_driver() {
        let mut store = EntityStore::new();
        for i in 0..10 {
            let e = store.add_entity();
            store.add::<A>(e).unwrap();
            if i % 2 == 0 {
                store.add::<B>(e).unwrap();
            }
        }

        let view = View::new(&store).required::<A>().required::<B>();
        let matched: Vec<Entity> = view.iter().map(|m| m.entity()).collect();
        assert_eq!(matched.len(), 5);
        for e in &matched {
            assert!(store.has::<A>(*e));
            assert!(store.has::<B>(*e));
        }
    }

    #[test]
    fn optional_type_is_present_or_absent_correctly() {
        let mut store = EntityStore::new();
        let e1 = store.add_entity();
        store.add::<A>(e1).unwrap();
        store.add::<C>(e1).unwrap();
        let e2 = store.add_entity();
        store.add::<A>(e2).unwrap();

        let view = View::new(&store).required::<A>().optional::<C>();
        let mut with_c = 0;
        let mut without_c = 0;
        for m in view.iter() {
            match m.optional::<C>() {
                Some(_) => with_c += 1,
                None => without_c += 1,
            }
        }
        assert_eq!(with_c, 1);
        assert_eq!(without_c, 1);
    }

    #[test]
    fn empty_required_set_yields_no_matches() {
        let store = EntityStore::new();
        let view = View::new(&store);
        assert_eq!(view.iter().count(), 0);
    }
}
