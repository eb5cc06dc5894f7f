//! Packed, per-component-type storage.
//!
//! A [`Repository<T>`] holds every live component of type `T`: one packed
//! array of declared [`Property`] columns (one per schema field), a
//! bidirectional entity-row/component-row mapping, an `id`/`version`
//! column pair, and a vector of runtime-decorated columns. Row `0` is the
//! permanent dead-row sentinel; every column reads its default there.
//!
//! [`ErasedRepository`] is the type-erased face `EntityStore` programs
//! against when it needs to touch "every repository" (entity removal
//! cascade, capacity growth, compaction) or a repository it only knows by
//! `TypeId` (required-component chains). The typed `Repository<T>` API is
//! what user code and `EntityStore`'s `Component`/`ComponentMut` handles
//! use directly.

use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::ecs::error::{CallbackSite, Error, Result};
use crate::ecs::property::{Property, PropertyColumn, PropertyValue};
use crate::ecs::schema::{HasSchema, Schema};

/// Growth factor applied to row/entity-row arrays when they run out of
/// room: `new = old * 1.5 + 1` (spec.md §4.3).
const GROWTH_NUMERATOR: usize = 3;
const GROWTH_DENOMINATOR: usize = 2;

/// Live-row ratio below which `compact()` shrinks backing storage
/// (spec.md §4.3).
const COMPACT_SHRINK_THRESHOLD: f64 = 0.6;

fn grow(old: usize) -> usize {
    (old * GROWTH_NUMERATOR) / GROWTH_DENOMINATOR + 1
}

fn shrink_target(live: usize) -> usize {
    (live * 6) / 5 + 1
}

/// A live, strongly-typed handle bound to one repository row.
///
/// Resolution always goes through `expected_id == id[row]`; if they no
/// longer match (the row was removed, or reused by compaction for a
/// different component), the handle is *stale* and every accessor returns
/// the not-alive status described in spec.md §7, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentHandle {
    pub(crate) row: u32,
    pub(crate) expected_id: u64,
}

impl ComponentHandle {
    pub(crate) const DEAD: ComponentHandle = ComponentHandle {
        row: 0,
        expected_id: 0,
    };

    pub fn id(&self) -> u64 {
        self.expected_id
    }
}

struct DecoratedColumn {
    property: Box<dyn Property>,
    alive: Weak<()>,
}

/// A token returned by [`Repository::decorate`]. The decorated column is
/// culled (removed) the next time this token — and every clone of it — has
/// been dropped and a removal or compaction sweep runs.
#[derive(Clone)]
pub struct DecorationToken(Arc<()>);

/// Packed storage for every live component of type `T`.
pub struct Repository<T: HasSchema> {
    schema: &'static Schema,
    declared: Vec<Box<dyn Property>>,
    decorated: Vec<DecoratedColumn>,
    /// `entityForRow[row] -> entity row`. Index 0 is always 0 (sentinel).
    entity_of_row: Vec<u32>,
    /// `rowForEntity[entity row] -> component row`, sized to the entity
    /// store's entity capacity.
    row_of_entity: Vec<u32>,
    id: Vec<u64>,
    version: Vec<i64>,
    row_count: usize,
    next_id: u64,
    next_version: i64,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: HasSchema> Repository<T> {
    const INITIAL_CAPACITY: usize = 8;

    /// Construct an empty repository sized for `entity_capacity` entities.
    pub fn new(entity_capacity: usize) -> Self {
        let schema = T::schema();
        let capacity = Self::INITIAL_CAPACITY;
        let declared = schema
            .properties()
            .iter()
            .map(|decl| (decl.factory)(capacity))
            .collect();
        Self {
            schema,
            declared,
            decorated: Vec::new(),
            entity_of_row: vec![0; capacity],
            row_of_entity: vec![0; entity_capacity.max(1)],
            id: vec![0; capacity],
            version: vec![-1; capacity],
            row_count: 1, // row 0 is always "occupied" by the sentinel
            next_id: 1,
            next_version: 1,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Number of live rows, excluding the row-0 sentinel.
    pub fn len(&self) -> usize {
        self.row_count - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entity_of_row.len()
    }

    /// The component row for `entity_row`, or `0` if this entity has no
    /// component of this type.
    #[inline]
    pub fn row_for_entity(&self, entity_row: u32) -> u32 {
        self.row_of_entity
            .get(entity_row as usize)
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    pub fn entity_for_row(&self, row: u32) -> u32 {
        self.entity_of_row.get(row as usize).copied().unwrap_or(0)
    }

    pub fn has(&self, entity_row: u32) -> bool {
        self.row_for_entity(entity_row) != 0
    }

    pub fn id_at(&self, row: u32) -> u64 {
        self.id.get(row as usize).copied().unwrap_or(0)
    }

    /// Iterate live rows (excluding the row-0 sentinel and any tombstoned
    /// rows awaiting the next `compact()`), ascending. Used by `View`'s
    /// driver iteration and by the ownership cascade's component-id scan.
    pub fn rows(&self) -> impl Iterator<Item = u32> + '_ {
        (1..self.row_count as u32).filter(move |&r| self.entity_of_row[r as usize] != 0)
    }

    /// Scan for the entity row whose component has id `component_id`. Only
    /// used on the ownership-cascade path, bounded by the cascade's subtree
    /// size rather than by repository size in practice.
    pub fn find_entity_by_component_id(&self, component_id: u64) -> Option<u32> {
        if component_id == 0 {
            return None;
        }
        self.rows()
            .find(|&row| self.id[row as usize] == component_id)
            .map(|row| self.entity_of_row[row as usize])
    }

    pub fn version_at(&self, row: u32) -> i64 {
        self.version.get(row as usize).copied().unwrap_or(-1)
    }

    /// A handle usable to reach `entity_row`'s component, or `None` if it
    /// doesn't have one.
    pub fn handle_for_entity(&self, entity_row: u32) -> Option<ComponentHandle> {
        let row = self.row_for_entity(entity_row);
        if row == 0 {
            None
        } else {
            Some(ComponentHandle {
                row,
                expected_id: self.id[row as usize],
            })
        }
    }

    pub fn is_alive(&self, handle: ComponentHandle) -> bool {
        handle.row != 0
            && (handle.row as usize) < self.id.len()
            && self.id[handle.row as usize] == handle.expected_id
            && handle.expected_id != 0
    }

    /// Resolve a handle to its current row, only if still live.
    pub fn resolve(&self, handle: ComponentHandle) -> Option<u32> {
        self.is_alive(handle).then_some(handle.row)
    }

    fn ensure_entity_capacity(&mut self, entity_row: u32) {
        if entity_row as usize >= self.row_of_entity.len() {
            let new_len = grow((entity_row as usize) + 1).max(entity_row as usize + 1);
            self.row_of_entity.resize(new_len, 0);
        }
    }

    /// Grow to guarantee the entity-row table covers `capacity` entities.
    pub fn grow_entity_capacity(&mut self, capacity: usize) {
        if capacity > self.row_of_entity.len() {
            self.row_of_entity.resize(capacity, 0);
        }
    }

    fn grow_row_storage(&mut self) {
        let new_capacity = grow(self.entity_of_row.len());
        self.entity_of_row.resize(new_capacity, 0);
        self.id.resize(new_capacity, 0);
        self.version.resize(new_capacity, -1);
        for prop in self.declared.iter_mut() {
            prop.set_capacity(new_capacity);
        }
        for dec in self.decorated.iter_mut() {
            dec.property.set_capacity(new_capacity);
        }
    }

    fn alloc_row(&mut self) -> u32 {
        if self.row_count >= self.entity_of_row.len() {
            self.grow_row_storage();
        }
        let row = self.row_count as u32;
        self.row_count += 1;
        row
    }

    fn apply_defaults(&mut self, row: u32) {
        let row = row as usize;
        for prop in self.declared.iter_mut() {
            prop.set_default_value(row);
        }
        for dec in self.decorated.iter_mut() {
            dec.property.set_default_value(row);
        }
    }

    fn next_version(&mut self) -> i64 {
        let v = self.next_version;
        // spec.md's Open Question on overflow: widen instead of wrapping,
        // since `i64` cannot realistically overflow from version bumps.
        self.next_version = self.next_version.saturating_add(1).max(1);
        v
    }

    /// Add a component of this type to `entity_row`. If the entity already
    /// has one, it is removed first (its ownership/decoration state is
    /// released, per `remove`). `template` is an optional `(repository,
    /// row)` to clone declared columns from — the repository may belong to
    /// a different `EntityStore` since schemas are process-global.
    ///
    /// Does not resolve required-component chains; that is `EntityStore`'s
    /// job, since it needs to reach other repositories by `TypeId`.
    pub fn add(
        &mut self,
        entity_row: u32,
        template: Option<(&Repository<T>, u32)>,
    ) -> Result<ComponentHandle> {
        if self.has(entity_row) {
            self.remove(entity_row);
        }
        self.ensure_entity_capacity(entity_row);

        let row = self.alloc_row();
        self.apply_defaults(row);

        if let Some((template_repo, template_row)) = template {
            for (dst, src) in self.declared.iter_mut().zip(template_repo.declared.iter()) {
                // A user-implemented `PropertyValue::invoke_clone` can
                // panic; catch it the same way a bad-argument `clone_row`
                // result is handled, and release the row this `add` had
                // already allocated before propagating (spec.md §7's
                // "triggering add/remove is rolled back").
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    dst.clone_row(src.as_ref(), template_row as usize, row as usize)
                }));
                let result = outcome.unwrap_or_else(|payload| {
                    Err(Error::callback(
                        CallbackSite("clone hook"),
                        crate::ecs::error::describe_panic(payload),
                    ))
                });
                if let Err(err) = result {
                    self.deallocate_aborted_row(row);
                    return Err(err);
                }
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.id[row as usize] = id;
        self.version[row as usize] = self.next_version();

        self.entity_of_row[row as usize] = entity_row;
        self.row_of_entity[entity_row as usize] = row;

        Ok(ComponentHandle {
            row,
            expected_id: id,
        })
    }

    /// Reclaim the row `add` had just allocated when a template clone
    /// failed or panicked partway through. Only ever called on the row
    /// `alloc_row` most recently handed out, so rolling `row_count` back is
    /// safe — this isn't a generic "remove a row" path.
    fn deallocate_aborted_row(&mut self, row: u32) {
        self.apply_defaults(row);
        self.id[row as usize] = 0;
        self.version[row as usize] = -1;
        self.entity_of_row[row as usize] = 0;
        if row as usize + 1 == self.row_count {
            self.row_count -= 1;
        }
    }

    /// Check declared field `index`'s validation constraint (if any)
    /// against `value`, without writing it. A panicking validator is
    /// caught and reported as `Error::Callback`, same as a panicking clone
    /// hook (spec.md §7).
    pub fn validate_field<F: PropertyValue>(&self, index: usize, value: &F) -> Result<()> {
        let Some(validator) = self.schema.properties()[index].validator else {
            return Ok(());
        };
        let value: &dyn Any = value;
        panic::catch_unwind(AssertUnwindSafe(|| validator(value))).unwrap_or_else(|payload| {
            Err(Error::callback(
                CallbackSite("field validator"),
                crate::ecs::error::describe_panic(payload),
            ))
        })
    }

    /// Remove `entity_row`'s component of this type, if any. Returns
    /// whether a component was actually removed.
    ///
    /// The freed row is immediately reset to its dead state (`id = 0`,
    /// every column at its default) rather than waiting for the next
    /// `compact()`, so the "every dead row reads as default" invariant
    /// (spec.md §8) holds continuously, not just post-compaction.
    pub fn remove(&mut self, entity_row: u32) -> bool {
        let row = self.row_for_entity(entity_row);
        if row == 0 {
            return false;
        }
        self.id[row as usize] = 0;
        self.version[row as usize] = -1;
        self.apply_defaults(row);
        self.entity_of_row[row as usize] = 0;
        self.row_of_entity[entity_row as usize] = 0;
        self.sweep_decorations();
        true
    }

    /// Append a runtime-added ("decorated") property column, initialized
    /// to its default for every existing row. Returns the new column's
    /// index (for `decorated_column`) and a keep-alive token; once every
    /// clone of the token is dropped, the column is culled on the next
    /// `remove` or `compact`.
    pub fn decorate(&mut self, factory: fn(usize) -> Box<dyn Property>) -> (usize, DecorationToken) {
        let mut prop = factory(self.entity_of_row.len());
        prop.set_capacity(self.entity_of_row.len());
        let token = Arc::new(());
        let alive = Arc::downgrade(&token);
        self.decorated.push(DecoratedColumn { property: prop, alive });
        (self.decorated.len() - 1, DecorationToken(token))
    }

    pub fn decorated_column(&self, index: usize) -> Option<&dyn Property> {
        self.decorated.get(index).map(|d| d.property.as_ref())
    }

    pub fn decorated_column_mut(&mut self, index: usize) -> Option<&mut dyn Property> {
        self.decorated.get_mut(index).map(|d| d.property.as_mut())
    }

    fn sweep_decorations(&mut self) {
        self.decorated.retain(|d| d.alive.strong_count() > 0);
    }

    /// Typed access to declared column `index`, downcast to `F`. Called
    /// with a compile-time-constant index, giving O(1) resolution at the
    /// call site.
    #[inline]
    pub fn field<F: PropertyValue>(&self, index: usize, row: u32) -> &F {
        self.declared[index]
            .as_any()
            .downcast_ref::<PropertyColumn<F>>()
            .expect("schema/accessor field type mismatch")
            .get(row as usize)
    }

    #[inline]
    pub fn set_field<F: PropertyValue>(&mut self, index: usize, row: u32, value: F) {
        self.declared[index]
            .as_any_mut()
            .downcast_mut::<PropertyColumn<F>>()
            .expect("schema/accessor field type mismatch")
            .set(row as usize, value);
    }

    /// Shared-instance read of declared column `index` (spec.md §4.1):
    /// fills the column's one cached temporary with `row`'s value and
    /// returns it. Every call through this repository for this field
    /// returns the *same* cached object, refreshed in place — callers must
    /// be done reading one shared value before requesting the next.
    #[inline]
    pub fn field_shared<F: PropertyValue>(&mut self, index: usize, row: u32) -> &F {
        self.declared[index]
            .get_shared(row as usize)
            .downcast_ref::<F>()
            .expect("schema/accessor field type mismatch")
    }

    /// Bump a row's version. Called once per setter invocation (including
    /// once for a multi-parameter fluent setter that writes several
    /// fields) and by `touch()`.
    #[inline]
    pub fn bump_version(&mut self, row: u32) {
        let v = self.next_version();
        self.version[row as usize] = v;
    }

    /// Mark `row` as modified without changing any field, per spec.md's
    /// user-requested `touch()`.
    pub fn touch(&mut self, handle: ComponentHandle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        self.bump_version(handle.row);
        true
    }

    /// Stable-sort rows `[1, row_count)` ascending by `entity_of_row`,
    /// treating the unused sentinel value `0` as `+infinity` so dead rows
    /// sink to the end. `entity_remap[old_entity_row] = new_entity_row`
    /// lets compaction translate row-of-entity indices when the entity
    /// store compacted in the same pass (pass `None` to compact a
    /// repository on its own, e.g. after only component removals).
    pub fn compact(&mut self, entity_remap: Option<&[u32]>) {
        let n = self.row_count;
        let mut order: Vec<u32> = (1..n as u32).collect();
        // Insertion sort: near-linear on the near-sorted input this method
        // is expected to run against (spec.md §4.3).
        for i in 1..order.len() {
            let mut j = i;
            while j > 0 && self.sort_key(order[j - 1]) > self.sort_key(order[j]) {
                order.swap(j - 1, j);
                j -= 1;
            }
        }

        // Apply the permutation via a cycle-following in-place swap so
        // every declared/decorated column moves in lockstep.
        let mut position_of_row = vec![0u32; n];
        for (new_row_minus_one, &old_row) in order.iter().enumerate() {
            position_of_row[old_row as usize] = (new_row_minus_one + 1) as u32;
        }
        let mut visited = vec![false; n];
        for start in 1..n {
            if visited[start] {
                continue;
            }
            let mut current = start;
            loop {
                visited[current] = true;
                let target = position_of_row[current] as usize;
                if target == current || visited[target] {
                    break;
                }
                self.swap_rows(current as u32, target as u32);
                visited[target] = true;
                current = target;
            }
        }

        let live_count = self.entity_of_row[1..n]
            .iter()
            .take_while(|&&e| e != 0)
            .count();
        self.row_count = 1 + live_count;

        for row in 0..self.entity_of_row.len() {
            let entity_row = self.entity_of_row[row];
            if entity_row != 0 {
                if let Some(remap) = entity_remap {
                    let new_entity_row = remap.get(entity_row as usize).copied().unwrap_or(0);
                    self.entity_of_row[row] = new_entity_row;
                }
            }
        }
        // Rebuild rowForEntity from scratch (cheap relative to the sort,
        // and correct regardless of whether entity rows were remapped).
        for slot in self.row_of_entity.iter_mut() {
            *slot = 0;
        }
        for row in 1..self.row_count {
            let entity_row = self.entity_of_row[row];
            if entity_row != 0 && (entity_row as usize) < self.row_of_entity.len() {
                self.row_of_entity[entity_row as usize] = row as u32;
            }
        }

        self.sweep_decorations();

        let ratio = self.len() as f64 / (self.entity_of_row.len().max(1) as f64);
        if ratio < COMPACT_SHRINK_THRESHOLD {
            let target = shrink_target(self.len()).max(1);
            if target < self.entity_of_row.len() {
                self.entity_of_row.truncate(target);
                self.id.truncate(target);
                self.version.truncate(target);
                for prop in self.declared.iter_mut() {
                    prop.set_capacity(target);
                }
                for dec in self.decorated.iter_mut() {
                    dec.property.set_capacity(target);
                }
            }
        }
    }

    #[inline]
    fn sort_key(&self, row: u32) -> u32 {
        let e = self.entity_of_row[row as usize];
        if e == 0 {
            u32::MAX
        } else {
            e
        }
    }

    fn swap_rows(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        self.entity_of_row.swap(a as usize, b as usize);
        self.id.swap(a as usize, b as usize);
        self.version.swap(a as usize, b as usize);
        for prop in self.declared.iter_mut() {
            prop.swap(a as usize, b as usize);
        }
        for dec in self.decorated.iter_mut() {
            dec.property.swap(a as usize, b as usize);
        }
    }
}

/// Type-erased face of a `Repository<T>`, used by `EntityStore` when it
/// must act on "every repository" or on one it only knows by `TypeId`
/// (required-component resolution).
pub trait ErasedRepository: Send + Sync {
    fn type_id(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    fn has(&self, entity_row: u32) -> bool;
    fn grow_entity_capacity(&mut self, capacity: usize);
    /// Ensure `entity_row` has a default-valued component of this type.
    /// Returns `(component_id, created)`.
    fn ensure_default(&mut self, entity_row: u32) -> (u64, bool);
    fn remove(&mut self, entity_row: u32) -> bool;
    fn compact(&mut self, entity_remap: &[u32]);
    fn len(&self) -> usize;
    /// Scan for the entity row owning the component identified by
    /// `component_id`. Only used on the rare ownership-cascade path, not
    /// on any hot path.
    fn find_entity_by_component_id(&self, component_id: u64) -> Option<u32>;
    /// Entity rows carrying a live component of this type, ascending. Used
    /// by `View` to drive a join from whichever required type is rarest.
    fn live_entity_rows(&self) -> Vec<u32>;
    /// Clone the component at `template_row` in `self` into `dest_entity_row`
    /// of `dest`, which must be the same concrete `Repository<T>` as `self`
    /// (guaranteed by `EntityStore`, which only ever pairs repositories
    /// sharing a `TypeId`). Used for cross-store entity templating.
    fn clone_into(&self, template_row: u32, dest: &mut dyn ErasedRepository, dest_entity_row: u32) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: HasSchema> ErasedRepository for Repository<T> {
    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        self.schema.type_name()
    }

    fn has(&self, entity_row: u32) -> bool {
        Repository::has(self, entity_row)
    }

    fn grow_entity_capacity(&mut self, capacity: usize) {
        Repository::grow_entity_capacity(self, capacity)
    }

    fn ensure_default(&mut self, entity_row: u32) -> (u64, bool) {
        if let Some(handle) = self.handle_for_entity(entity_row) {
            (handle.expected_id, false)
        } else {
            let handle = self
                .add(entity_row, None)
                .expect("adding a default-valued required component cannot fail");
            (handle.expected_id, true)
        }
    }

    fn remove(&mut self, entity_row: u32) -> bool {
        Repository::remove(self, entity_row)
    }

    fn compact(&mut self, entity_remap: &[u32]) {
        Repository::compact(self, Some(entity_remap))
    }

    fn len(&self) -> usize {
        Repository::len(self)
    }

    fn clone_into(&self, template_row: u32, dest: &mut dyn ErasedRepository, dest_entity_row: u32) -> Result<()> {
        let dest = dest
            .as_any_mut()
            .downcast_mut::<Repository<T>>()
            .expect("clone_into called with mismatched repository types");
        dest.add(dest_entity_row, Some((self, template_row)))?;
        Ok(())
    }

    fn find_entity_by_component_id(&self, component_id: u64) -> Option<u32> {
        Repository::find_entity_by_component_id(self, component_id)
    }

    fn live_entity_rows(&self) -> Vec<u32> {
        self.rows().map(|row| self.entity_for_row(row)).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::schema::{PropertyDeclaration, SchemaBuilder};
    use std::sync::OnceLock;

    struct Point;

    impl HasSchema for Point {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                SchemaBuilder::new::<Point>("Point")
                    .property(PropertyDeclaration::new("x", false, |cap| {
                        Box::new(PropertyColumn::<i32>::with_capacity(cap))
                    }))
                    .property(PropertyDeclaration::new("y", false, |cap| {
                        Box::new(PropertyColumn::<i32>::with_capacity(cap))
                    }))
                    .build()
                    .unwrap()
            })
        }
    }

    const X: usize = 0;
    const Y: usize = 1;

    #[test]
    fn add_assigns_fresh_id_and_version() {
        let mut repo = Repository::<Point>::new(4);
        let h = repo.add(1, None).unwrap();
        assert!(repo.is_alive(h));
        assert!(h.expected_id > 0);
        assert!(repo.version_at(h.row) > 0);
        assert_eq!(*repo.field::<i32>(X, h.row), 0);
    }

    #[test]
    fn set_field_then_bump_changes_version() {
        let mut repo = Repository::<Point>::new(4);
        let h = repo.add(1, None).unwrap();
        let v1 = repo.version_at(h.row);
        repo.set_field::<i32>(X, h.row, 7);
        repo.bump_version(h.row);
        let v2 = repo.version_at(h.row);
        assert!(v2 > v1);
        assert_eq!(*repo.field::<i32>(X, h.row), 7);
    }

    #[test]
    fn remove_resets_row_to_default_immediately() {
        let mut repo = Repository::<Point>::new(4);
        let h = repo.add(1, None).unwrap();
        repo.set_field::<i32>(X, h.row, 99);
        assert!(repo.remove(1));
        assert_eq!(repo.id_at(h.row), 0);
        assert_eq!(*repo.field::<i32>(X, h.row), 0);
        assert!(!repo.is_alive(h));
    }

    #[test]
    fn readd_after_remove_gets_fresh_identity() {
        let mut repo = Repository::<Point>::new(4);
        let h1 = repo.add(1, None).unwrap();
        repo.remove(1);
        let h2 = repo.add(1, None).unwrap();
        assert_ne!(h1.expected_id, h2.expected_id);
        assert!(repo.version_at(h2.row) > 0);
        assert_eq!(*repo.field::<i32>(X, h2.row), 0);
    }

    #[test]
    fn compact_packs_rows_ascending_by_entity_and_fixes_maps() {
        let mut repo = Repository::<Point>::new(8);
        for e in 1..=6u32 {
            let h = repo.add(e, None).unwrap();
            repo.set_field::<i32>(X, h.row, e as i32);
        }
        // Remove every even-indexed entity.
        for e in (2..=6u32).step_by(2) {
            repo.remove(e);
        }
        repo.compact(None);

        assert_eq!(repo.len(), 3);
        let mut seen = Vec::new();
        for row in 1..=repo.len() as u32 {
            seen.push(*repo.field::<i32>(X, row));
        }
        seen.sort();
        assert_eq!(seen, vec![1, 3, 5]);

        for row in 1..=repo.len() as u32 {
            let entity_row = repo.entity_for_row(row);
            assert_eq!(repo.row_for_entity(entity_row), row);
        }
    }

    #[test]
    fn decorated_property_initializes_existing_rows_and_is_culled_when_dropped() {
        let mut repo = Repository::<Point>::new(4);
        let h = repo.add(1, None).unwrap();
        let (idx, token) = repo.decorate(|cap| Box::new(PropertyColumn::<i32>::with_capacity(cap)));
        assert_eq!(
            *repo
                .decorated_column(idx)
                .unwrap()
                .as_any()
                .downcast_ref::<PropertyColumn<i32>>()
                .unwrap()
                .get(h.row as usize),
            0
        );
        drop(token);
        repo.remove(1);
        assert!(repo.decorated_column(idx).is_none());
    }

    #[test]
    fn clone_from_template_copies_declared_fields_across_stores() {
        let mut template_repo = Repository::<Point>::new(4);
        let template = template_repo.add(1, None).unwrap();
        template_repo.set_field::<i32>(X, template.row, 5);
        template_repo.set_field::<i32>(Y, template.row, 9);

        let mut repo = Repository::<Point>::new(4);
        let cloned = repo
            .add(1, Some((&template_repo, template.row)))
            .unwrap();
        assert_eq!(*repo.field::<i32>(X, cloned.row), 5);
        assert_eq!(*repo.field::<i32>(Y, cloned.row), 9);
    }

    struct Guarded;
    impl HasSchema for Guarded {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                SchemaBuilder::new::<Guarded>("Guarded")
                    .property(
                        PropertyDeclaration::new("level", false, |cap| {
                            Box::new(PropertyColumn::<i32>::with_capacity(cap))
                        })
                        .with_validator(crate::ecs::schema::validators::non_default::<i32>),
                    )
                    .build()
                    .unwrap()
            })
        }
    }
    const LEVEL: usize = 0;

    #[test]
    fn validate_field_rejects_the_default_value() {
        let repo = Repository::<Guarded>::new(4);
        assert!(matches!(
            repo.validate_field(LEVEL, &0i32),
            Err(Error::InvalidArgument(_))
        ));
        assert!(repo.validate_field(LEVEL, &5i32).is_ok());
    }

    #[test]
    fn try_set_field_leaves_store_unchanged_on_violation() {
        let mut store = crate::ecs::entity_store::EntityStore::new();
        let e = store.add_entity();
        let mut c = store.add::<Guarded>(e).unwrap();
        let before = c.version();
        assert!(matches!(
            c.try_set_field(LEVEL, 0i32),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(*c.field::<i32>(LEVEL), 0);
        assert_eq!(c.version(), before);
        assert!(c.try_set_field(LEVEL, 7i32).is_ok());
        assert_eq!(*c.field::<i32>(LEVEL), 7);
        assert!(c.version() > before);
    }

    /// A `PropertyValue` whose clone hook panics, used to exercise the
    /// rollback path in `add()` when `CLONE_POLICY == InvokeClone`.
    ///
    /// Deliberately does not derive `std::default::Default`: the crate's
    /// blanket `impl<T: Clone + Default + 'static> PropertyValue for T`
    /// would then overlap with this manual impl (E0119). Overriding
    /// `CLONE_POLICY`/`invoke_clone` always means writing `PropertyValue`
    /// by hand and supplying `default_value()` directly instead.
    #[derive(Clone)]
    struct Poison(i32);
    impl PropertyValue for Poison {
        fn default_value() -> Self {
            Poison(0)
        }
        const CLONE_POLICY: CloningPolicy = CloningPolicy::InvokeClone;
        fn invoke_clone(&self) -> Self {
            panic!("poisoned clone hook");
        }
    }

    struct Poisoned;
    impl HasSchema for Poisoned {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                SchemaBuilder::new::<Poisoned>("Poisoned")
                    .property(PropertyDeclaration::new("v", false, |cap| {
                        Box::new(PropertyColumn::<Poison>::with_capacity(cap))
                    }))
                    .build()
                    .unwrap()
            })
        }
    }

    #[test]
    fn add_from_template_rolls_back_the_allocated_row_on_a_panicking_clone_hook() {
        let mut template_repo = Repository::<Poisoned>::new(4);
        let template = template_repo.add(1, None).unwrap();

        let mut repo = Repository::<Poisoned>::new(4);
        let before_len = repo.len();
        // `add()` catches the clone hook's panic internally; it must not
        // itself unwind out of this call.
        let result = repo.add(1, Some((&template_repo, template.row)));
        assert!(matches!(result, Err(Error::Callback { .. })));
        assert_eq!(repo.len(), before_len);
        assert!(!repo.has(1));
    }

    struct Shared;
    impl HasSchema for Shared {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                SchemaBuilder::new::<Shared>("Shared")
                    .property(PropertyDeclaration::new("label", true, |cap| {
                        Box::new(PropertyColumn::<i32>::with_capacity(cap))
                    }))
                    .build()
                    .unwrap()
            })
        }
    }
    const LABEL: usize = 0;

    #[test]
    fn field_shared_refreshes_the_one_cached_temporary_per_call() {
        let mut repo = Repository::<Shared>::new(4);
        let h1 = repo.add(1, None).unwrap();
        let h2 = repo.add(2, None).unwrap();
        repo.set_field::<i32>(LABEL, h1.row, 10);
        repo.set_field::<i32>(LABEL, h2.row, 20);

        assert_eq!(*repo.field_shared::<i32>(LABEL, h1.row), 10);
        assert_eq!(*repo.field_shared::<i32>(LABEL, h2.row), 20);
    }
}
