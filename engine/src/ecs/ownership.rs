//! Ownership graph tying entities and components together.
//!
//! Any entity or component can own, or be owned by, any other entity or
//! component (spec.md §3/§4.5). Destroying an owner cascades to everything
//! it (transitively) owns; a visited set makes the cascade safe even if a
//! cycle is accidentally introduced through `set_owner`.
//!
//! This module only tracks the graph itself — resolving an `Ownable` back
//! into an actual removal is `EntityStore`'s job, since that's the only
//! place with access to every repository.

use std::any::TypeId;
use std::collections::HashMap;

use crate::ecs::error::{Error, Result};

/// Anything that can participate in the ownership graph: an entity
/// (identified by its stable id) or a component (identified by its type
/// and component id, both stable across compaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownable {
    Entity(u64),
    Component(TypeId, u64),
}

#[derive(Default)]
struct Record {
    owner: Option<Ownable>,
    owned: Vec<Ownable>,
}

/// Tracks who owns whom. Records are created lazily on first use and
/// dropped once empty, so most entities/components never pay for one.
#[derive(Default)]
pub struct OwnershipGraph {
    records: HashMap<Ownable, Record>,
}

impl OwnershipGraph {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn owner(&self, of: Ownable) -> Option<Ownable> {
        self.records.get(&of).and_then(|r| r.owner)
    }

    pub fn owned_by(&self, owner: Ownable) -> &[Ownable] {
        self.records
            .get(&owner)
            .map(|r| r.owned.as_slice())
            .unwrap_or(&[])
    }

    /// Set (or clear, with `owner = None`) `of`'s owner. Rejects a change
    /// that would make `of` its own ancestor.
    pub fn set_owner(&mut self, of: Ownable, owner: Option<Ownable>) -> Result<()> {
        if let Some(new_owner) = owner {
            if new_owner == of || self.is_descendant(new_owner, of) {
                return Err(Error::InvalidArgument(
                    "set_owner would introduce an ownership cycle".into(),
                ));
            }
        }

        if let Some(old_owner) = self.records.get(&of).and_then(|r| r.owner) {
            if let Some(old_record) = self.records.get_mut(&old_owner) {
                old_record.owned.retain(|&o| o != of);
                if old_record.owned.is_empty() && old_record.owner.is_none() {
                    self.records.remove(&old_owner);
                }
            }
        }

        let record = self.records.entry(of).or_default();
        record.owner = owner;

        if let Some(new_owner) = owner {
            self.records.entry(new_owner).or_default().owned.push(of);
        } else if record.owned.is_empty() {
            self.records.remove(&of);
        }

        Ok(())
    }

    /// Whether `candidate` is `ancestor`'s descendant (walks the owned
    /// chain, following owner -> owned).
    fn is_descendant(&self, ancestor: Ownable, candidate: Ownable) -> bool {
        let mut stack = self.owned_by(ancestor).to_vec();
        let mut visited = std::collections::HashSet::new();
        while let Some(node) = stack.pop() {
            if node == candidate {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.extend(self.owned_by(node));
        }
        false
    }

    /// Remove `of`'s record, detaching it from its owner, and return the
    /// (former) direct children so the caller can cascade into them. Each
    /// returned child still has `of` as its owner in its own mind until
    /// the caller releases it too; the caller is expected to call
    /// `release` on every child reachable this way, using a visited set
    /// to guard against cycles introduced despite `set_owner`'s checks
    /// (e.g. by direct graph corruption in a future version).
    pub fn release(&mut self, of: Ownable) -> Vec<Ownable> {
        let Some(record) = self.records.remove(&of) else {
            return Vec::new();
        };
        if let Some(owner) = record.owner {
            if let Some(owner_record) = self.records.get_mut(&owner) {
                owner_record.owned.retain(|&o| o != of);
                if owner_record.owned.is_empty() && owner_record.owner.is_none() {
                    self.records.remove(&owner);
                }
            }
        }
        record.owned
    }

    /// Cascade-release `root` and everything it transitively owns,
    /// returning every `Ownable` that should now be destroyed (including
    /// `root` itself), in an order safe to destroy back-to-front
    /// (children before the owner that is already being removed by the
    /// caller).
    pub fn cascade(&mut self, root: Ownable) -> Vec<Ownable> {
        let mut visited = std::collections::HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let children = self.release(node);
            order.push(node);
            stack.extend(children);
        }
        order
    }
}
