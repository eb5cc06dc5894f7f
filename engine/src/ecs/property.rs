//! Columnar, row-indexed storage for a single component field.
//!
//! A [`Property`] is the unit of storage the rest of the crate is built on:
//! one value per row, growable in place, with a per-type cloning policy used
//! when a `Repository` clones a row from a template. Row `0` is never a live
//! row in any repository; every property keeps row `0` at its default so
//! that a dead handle reads back sentinel values instead of garbage. A
//! property can additionally be read as a *shared instance*
//! (`Property::get_shared`/`Repository::field_shared`): instead of handing
//! back the row's own slot, the column fills and returns one cached
//! temporary shared across every row, refreshed on each call.

use std::any::Any;

use crate::ecs::error::{Error, Result};

/// How a property's values are copied when `Repository::add` is given a
/// template component to clone from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloningPolicy {
    /// Leave the destination row at its default; never copy from the
    /// source.
    Disable,
    /// Byte/value copy (`Clone::clone`) from source to destination.
    ValueCopy,
    /// Share the same underlying reference (only meaningful for
    /// reference-counted element types).
    ReferenceCopy,
    /// Call a user-provided deep-clone hook instead of `Clone::clone`.
    InvokeClone,
}

/// A value usable as the element type of a [`PropertyColumn`].
///
/// The blanket impl below covers any plain `Clone + Default` type with
/// [`CloningPolicy::ValueCopy`], which is correct for the overwhelming
/// majority of component fields (numbers, small structs, enums). Element
/// types that want [`CloningPolicy::ReferenceCopy`] or
/// [`CloningPolicy::InvokeClone`] implement `PropertyValue` by hand instead
/// of relying on the blanket impl — and must not also derive
/// `std::default::Default`, since the blanket impl's `T: Default` bound
/// would then make the two impls overlap (E0119); supply `default_value()`
/// directly in the hand-written impl instead.
pub trait PropertyValue: Clone + 'static {
    /// The sentinel value written into row 0 and into every freshly
    /// allocated row before a setter or template clone runs.
    fn default_value() -> Self;

    /// The policy used by `Repository::add(.., Some(template))`.
    const CLONE_POLICY: CloningPolicy = CloningPolicy::ValueCopy;

    /// Deep-clone hook used when `CLONE_POLICY == InvokeClone`. The default
    /// implementation falls back to `Clone::clone` and is only ever called
    /// when a type opts into `InvokeClone`.
    fn invoke_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: Clone + Default + 'static> PropertyValue for T {
    fn default_value() -> Self {
        T::default()
    }
}

/// Object-safe column contract used by `Repository` and `Schema` for
/// bookkeeping that doesn't need to know the element type: growth,
/// row swaps (used by compaction), default application, and cross-column
/// cloning. Typed access (`get`/`set`) lives on [`PropertyColumn<T>`]
/// directly, reached via [`Property::as_any`] downcasts at the small
/// number of call sites that need it generically (decoration, schema
/// validation); `Repository::field`/`set_field` downcast once per call with
/// a compile-time-constant index and cache nothing further, giving O(1)
/// access at the call site.
pub trait Property: Any + Send + Sync {
    /// Number of rows this column can currently address without growing.
    fn capacity(&self) -> usize;

    /// Grow (or shrink) capacity to at least `n`, preserving values in
    /// `[0, min(old, new))`. Shrinking below the live row count is the
    /// caller's responsibility to avoid.
    fn set_capacity(&mut self, n: usize);

    /// Exchange the values stored at rows `a` and `b`.
    fn swap(&mut self, a: usize, b: usize);

    /// Reset `row` to this property's default value.
    fn set_default_value(&mut self, row: usize);

    /// Clone one row from `src` (at `src_row`) into `self` (at `dst_row`),
    /// consulting this property's cloning policy. `src` must be the same
    /// concrete `PropertyColumn<T>` as `self`; a mismatch is a logic error
    /// in the caller (the `Repository`/`Schema` machinery never mixes
    /// columns across unrelated fields) and is reported as
    /// `Error::InvalidArgument` rather than panicking, since it can only
    /// be reached through a bug, not user input.
    fn clone_row(&mut self, src: &dyn Property, src_row: usize, dst_row: usize) -> Result<()>;

    /// This column's cloning policy, for diagnostics.
    fn cloning_policy(&self) -> CloningPolicy;

    /// Whether this column supports shared-instance reads (spec.md §4.1:
    /// "valid only when the element type is not primitive and the property
    /// implementation supports shareables"). `PropertyColumn<T>` supports it
    /// for every `T`; a schema that sets `shared_instance: true` on a
    /// primitive field is still rejected at `Schema::build` by consulting
    /// [`PropertyValue::SUPPORTS_SHAREABLE`], not this method.
    fn supports_shareable(&self) -> bool {
        true
    }

    /// Fill this column's single cached shareable with `row`'s value and
    /// return it. Every call through the same `Property` trait object
    /// overwrites and returns the *same* cached instance — callers must
    /// finish using the returned reference before the next call.
    fn get_shared(&mut self, row: usize) -> &dyn Any;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A concrete, typed column: one `Vec<T>` indexed directly by row.
pub struct PropertyColumn<T: PropertyValue> {
    values: Vec<T>,
    /// The one cached shareable this column hands back from `get_shared`,
    /// per spec.md §4.1: a shared-instance property reuses a single
    /// temporary per property per repository rather than allocating on
    /// every read.
    shared: T,
}

impl<T: PropertyValue> PropertyColumn<T> {
    /// Construct a column with `capacity` rows, all at the default value.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut values = Vec::with_capacity(capacity);
        values.resize_with(capacity, T::default_value);
        Self {
            values,
            shared: T::default_value(),
        }
    }

    /// Read the value at `row`. Panics if `row >= capacity()`, matching
    /// `Vec`'s own indexing contract; callers only ever pass rows bounded
    /// by the repository they belong to.
    #[inline]
    pub fn get(&self, row: usize) -> &T {
        &self.values[row]
    }

    /// Mutable access to the value at `row`.
    #[inline]
    pub fn get_mut(&mut self, row: usize) -> &mut T {
        &mut self.values[row]
    }

    /// Overwrite the value at `row`.
    #[inline]
    pub fn set(&mut self, row: usize, value: T) {
        self.values[row] = value;
    }
}

impl<T: PropertyValue> Property for PropertyColumn<T> {
    fn capacity(&self) -> usize {
        self.values.len()
    }

    fn set_capacity(&mut self, n: usize) {
        if n > self.values.len() {
            self.values.resize_with(n, T::default_value);
        } else if n < self.values.len() {
            self.values.truncate(n);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.values.swap(a, b);
    }

    fn set_default_value(&mut self, row: usize) {
        self.values[row] = T::default_value();
    }

    fn clone_row(&mut self, src: &dyn Property, src_row: usize, dst_row: usize) -> Result<()> {
        let src = src
            .as_any()
            .downcast_ref::<PropertyColumn<T>>()
            .ok_or_else(|| {
                Error::InvalidArgument(
                    "clone_row: source column element type does not match destination".into(),
                )
            })?;
        match T::CLONE_POLICY {
            CloningPolicy::Disable => self.values[dst_row] = T::default_value(),
            CloningPolicy::ValueCopy | CloningPolicy::ReferenceCopy => {
                self.values[dst_row] = src.values[src_row].clone();
            }
            CloningPolicy::InvokeClone => {
                self.values[dst_row] = src.values[src_row].invoke_clone();
            }
        }
        Ok(())
    }

    fn cloning_policy(&self) -> CloningPolicy {
        T::CLONE_POLICY
    }

    fn get_shared(&mut self, row: usize) -> &dyn Any {
        self.shared = self.values[row].clone();
        &self.shared
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

    #[test]
    fn grow_preserves_existing_values() {
        let mut col = PropertyColumn::<i32>::with_capacity(4);
        col.set(0, 10);
        col.set(3, 40);
        col.set_capacity(8);
        assert_eq!(*col.get(0), 10);
        assert_eq!(*col.get(3), 40);
        assert_eq!(*col.get(7), 0);
        assert_eq!(col.capacity(), 8);
    }

    #[test]
    fn swap_exchanges_rows() {
        let mut col = PropertyColumn::<i32>::with_capacity(4);
        col.set(1, 11);
        col.set(2, 22);
        col.swap(1, 2);
        assert_eq!(*col.get(1), 22);
        assert_eq!(*col.get(2), 11);
    }

    #[test]
    fn get_shared_refreshes_the_cached_temporary_each_call() {
        let mut col = PropertyColumn::<i32>::with_capacity(4);
        col.set(1, 11);
        col.set(2, 22);

        assert_eq!(*Property::get_shared(&mut col, 1).downcast_ref::<i32>().unwrap(), 11);
        assert_eq!(*Property::get_shared(&mut col, 2).downcast_ref::<i32>().unwrap(), 22);
        // The cache itself, not just the read, reflects the most recent call.
        assert_eq!(col.shared, 22);
    }

    #[test]
    fn clone_row_respects_value_copy() {
        let mut src = PropertyColumn::<i32>::with_capacity(2);
        src.set(1, 99);
        let mut dst = PropertyColumn::<i32>::with_capacity(2);
        dst.clone_row(&src, 1, 0).unwrap();
        assert_eq!(*dst.get(0), 99);
    }

    #[test]
    fn set_default_value_resets_row() {
        let mut col = PropertyColumn::<i32>::with_capacity(2);
        col.set(0, 5);
        col.set_default_value(0);
        assert_eq!(*col.get(0), 0);
    }
}
