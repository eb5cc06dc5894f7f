//! Entity identity for the ECS.
//!
//! Unlike a generational-index ECS, this store gives every entity a
//! monotonically assigned, never-reused 64-bit `id` and a separate `row`
//! that indexes into `EntityStore`'s packed arrays. The `row` is the fast
//! path; it can go stale across a `compact()`, at which point it is
//! refreshed by `EntityStore::resolve` (binary search / linear scan over
//! ids), never by reusing the slot for a different identity.
//!
//! See `EntityStore` for the packed array this indexes into, and
//! `Repository` for how component rows piggyback on entity rows.

use std::cmp::Ordering;

/// The sentinel/dead entity id. Row 0 in every `EntityStore` and
/// `Repository` is reserved and never live.
pub const DEAD_ID: u64 = 0;

/// A logical entity identifier.
///
/// `id` never changes while the entity handle is in scope and is never
/// reused once the entity is destroyed. `row` is a cache of the entity's
/// last known position in `EntityStore`'s packed arrays; it may be stale
/// after a `compact()`, in which case operations taking an `Entity`
/// transparently re-resolve it from `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub(crate) id: u64,
    pub(crate) row: u32,
}

impl Entity {
    /// The dead/sentinel entity: `id() == 0`.
    pub const DEAD: Entity = Entity {
        id: DEAD_ID,
        row: 0,
    };

    #[inline]
    pub(crate) fn new(id: u64, row: u32) -> Self {
        Self { id, row }
    }

    /// The entity's stable identity. Never changes, never reused.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// This entity's row at the time it was obtained. Prefer
    /// `EntityStore::resolve` over reading this directly across a
    /// `compact()` boundary.
    #[inline]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Whether this is the sentinel "dead" entity value (`id() == 0`).
    /// This is a cheap structural check; it does **not** consult a store
    /// to determine if a *live* entity with this id has since been
    /// removed. Use `EntityStore::is_alive` for that.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.id == DEAD_ID
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_entity_has_zero_id() {
        assert_eq!(Entity::DEAD.id(), 0);
        assert!(Entity::DEAD.is_sentinel());
    }

    #[test]
    fn entities_order_by_id() {
        let a = Entity::new(1, 5);
        let b = Entity::new(2, 0);
        assert!(a < b);
    }
}
