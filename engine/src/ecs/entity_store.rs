//! The top-level container: entities, every component repository, and the
//! ownership graph that ties them together.
//!
//! Mirrors spec.md §3/§4: a packed entity-id array with a row-0 sentinel,
//! a directory of per-type `Repository`s reached by `TypeId`, and an
//! `OwnershipGraph` consulted on removal to cascade-destroy whatever an
//! entity or component owns.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use log::{debug, trace};

use crate::ecs::entity::Entity;
use crate::ecs::error::{Error, Result};
use crate::ecs::ownership::{Ownable, OwnershipGraph};
use crate::ecs::repository::{ComponentHandle, ErasedRepository, Repository};
use crate::ecs::schema::HasSchema;

/// Read-only typed view onto one entity's component of type `T`.
pub struct Component<'a, T: HasSchema> {
    pub(crate) repo: &'a Repository<T>,
    pub(crate) row: u32,
    pub(crate) expected_id: u64,
}

impl<'a, T: HasSchema> Component<'a, T> {
    pub fn is_alive(&self) -> bool {
        self.repo.is_alive(ComponentHandle {
            row: self.row,
            expected_id: self.expected_id,
        })
    }

    pub fn id(&self) -> u64 {
        self.expected_id
    }

    pub fn version(&self) -> i64 {
        self.repo.version_at(self.row)
    }

    pub fn entity_row(&self) -> u32 {
        self.repo.entity_for_row(self.row)
    }

    /// Typed access to declared field `index`, for use by derive-macro
    /// generated accessors.
    #[inline]
    pub fn field<F: crate::ecs::property::PropertyValue>(&self, index: usize) -> &F {
        self.repo.field(index, self.row)
    }
}

/// Mutable typed view onto one entity's component of type `T`.
pub struct ComponentMut<'a, T: HasSchema> {
    pub(crate) repo: &'a mut Repository<T>,
    pub(crate) row: u32,
    pub(crate) expected_id: u64,
}

impl<'a, T: HasSchema> ComponentMut<'a, T> {
    pub fn is_alive(&self) -> bool {
        self.repo.is_alive(ComponentHandle {
            row: self.row,
            expected_id: self.expected_id,
        })
    }

    pub fn id(&self) -> u64 {
        self.expected_id
    }

    pub fn version(&self) -> i64 {
        self.repo.version_at(self.row)
    }

    #[inline]
    pub fn field<F: crate::ecs::property::PropertyValue>(&self, index: usize) -> &F {
        self.repo.field(index, self.row)
    }

    /// Shared-instance read of declared field `index` (spec.md §4.1): fills
    /// the repository's one cached temporary for this field with this row's
    /// value and returns it. Only reachable through a mutable handle, since
    /// the read refreshes a cache shared by every row of the field, even
    /// though no component data changes and no version bump happens.
    #[inline]
    pub fn field_shared<F: crate::ecs::property::PropertyValue>(&mut self, index: usize) -> &F {
        self.repo.field_shared(index, self.row)
    }

    /// Write field `index` after checking its schema-declared validation
    /// constraint, if any (spec.md §4.2/§7). Returns `Error::InvalidArgument`
    /// without writing the field or bumping the version when the
    /// constraint is violated; the store is left unchanged.
    pub fn try_set_field<F: crate::ecs::property::PropertyValue>(
        &mut self,
        index: usize,
        value: F,
    ) -> Result<()> {
        self.repo.validate_field(index, &value)?;
        self.repo.set_field(index, self.row, value);
        self.repo.bump_version(self.row);
        Ok(())
    }

    /// Write field `index`, without bumping the row's version — used by a
    /// multi-parameter fluent setter that bumps the version once itself
    /// via `bump_version`, after writing every field it touches.
    #[inline]
    pub fn set_field_no_bump<F: crate::ecs::property::PropertyValue>(&mut self, index: usize, value: F) {
        self.repo.set_field(index, self.row, value);
    }

    /// Write field `index` and bump the row's version.
    #[inline]
    pub fn set_field<F: crate::ecs::property::PropertyValue>(&mut self, index: usize, value: F) {
        self.repo.set_field(index, self.row, value);
        self.repo.bump_version(self.row);
    }

    pub fn bump_version(&mut self) {
        self.repo.bump_version(self.row);
    }
}

struct RepositorySlot {
    repository: Box<dyn ErasedRepository>,
    create: fn(usize) -> Box<dyn ErasedRepository>,
}

/// The entity/component container. One `EntityStore` is a fully
/// independent world; nothing here is implicitly shared between stores
/// except the process-global `Schema`s that component types carry.
pub struct EntityStore {
    id_of_row: Vec<u64>,
    row_count: usize,
    next_id: u64,
    /// True when `id_of_row[1..row_count]` is known sorted ascending,
    /// letting `entity_by_id` binary search instead of scanning linearly.
    compacted: bool,
    repositories: HashMap<TypeId, RepositorySlot>,
    ownership: OwnershipGraph,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            id_of_row: vec![0],
            row_count: 1,
            next_id: 1,
            compacted: true,
            repositories: HashMap::new(),
            ownership: OwnershipGraph::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.row_count - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a new, empty entity.
    pub fn add_entity(&mut self) -> Entity {
        let row = self.row_count as u32;
        self.row_count += 1;
        if row as usize >= self.id_of_row.len() {
            self.id_of_row.push(0);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.id_of_row[row as usize] = id;
        self.compacted = false;
        for slot in self.repositories.values_mut() {
            slot.repository.grow_entity_capacity(self.row_count);
        }
        trace!("add_entity: id={} row={}", id, row);
        Entity::new(id, row)
    }

    /// Create a new entity, copying every component `template` has in
    /// `template_store` (which may be `self` or a different store —
    /// schemas are process-global, so cross-store templating is always
    /// safe).
    pub fn add_entity_from_template(
        &mut self,
        template_store: &EntityStore,
        template: Entity,
    ) -> Result<Entity> {
        let template_row = template_store.resolve(template).ok_or_else(|| {
            Error::InvalidArgument("add_entity_from_template: template entity is not alive".into())
        })?;
        let entity = self.add_entity();
        let dest_row = entity.row();
        for (type_id, template_slot) in template_store.repositories.iter() {
            if !template_slot.repository.has(template_row) {
                continue;
            }
            let dest_slot = self
                .repositories
                .entry(*type_id)
                .or_insert_with(|| RepositorySlot {
                    repository: (template_slot.create)(self.row_count),
                    create: template_slot.create,
                });
            dest_slot.repository.grow_entity_capacity(self.row_count);
            template_slot
                .repository
                .clone_into(template_row, dest_slot.repository.as_mut(), dest_row)?;
        }
        Ok(entity)
    }

    /// Resolve `entity` to its current row, re-validating against the
    /// stored id even if `entity.row()` happens to still be correct.
    pub fn resolve(&self, entity: Entity) -> Option<u32> {
        if entity.is_sentinel() {
            return None;
        }
        let row = entity.row() as usize;
        if row < self.id_of_row.len() && self.id_of_row[row] == entity.id() {
            return Some(row as u32);
        }
        self.row_of_id(entity.id())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.resolve(entity).is_some()
    }

    /// Look an entity up by its stable id alone.
    pub fn entity_by_id(&self, id: u64) -> Option<Entity> {
        self.row_of_id(id).map(|row| Entity::new(id, row))
    }

    /// Reconstruct an `Entity` handle for a live entity row. Used by `View`,
    /// which only ever walks rows it already knows are live.
    pub(crate) fn entity_at_row(&self, row: u32) -> Entity {
        Entity::new(self.id_of_row[row as usize], row)
    }

    fn row_of_id(&self, id: u64) -> Option<u32> {
        if id == 0 {
            return None;
        }
        if self.compacted {
            self.id_of_row[1..self.row_count]
                .binary_search(&id)
                .ok()
                .map(|i| (i + 1) as u32)
        } else {
            self.id_of_row[1..self.row_count]
                .iter()
                .position(|&r| r == id)
                .map(|i| (i + 1) as u32)
        }
    }

    /// Destroy `entity` and cascade into everything it (transitively)
    /// owns. Returns whether `entity` was alive to begin with.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        let Some(row) = self.resolve(entity) else {
            return false;
        };
        let destroyed = self.ownership.cascade(Ownable::Entity(entity.id()));
        for ownable in destroyed {
            match ownable {
                Ownable::Entity(id) => {
                    if id == entity.id() {
                        self.destroy_row(row, entity.id());
                    } else if let Some(victim) = self.entity_by_id(id) {
                        if let Some(victim_row) = self.resolve(victim) {
                            self.destroy_row(victim_row, id);
                        }
                    }
                }
                Ownable::Component(type_id, _component_id) => {
                    if let Some(owner_entity) = self.entity_owning_component(type_id, ownable) {
                        if let Some(slot) = self.repositories.get_mut(&type_id) {
                            slot.repository.remove(owner_entity);
                        }
                    }
                }
            }
        }
        debug!("remove_entity: id={}", entity.id());
        true
    }

    fn entity_owning_component(&self, type_id: TypeId, ownable: Ownable) -> Option<u32> {
        let Ownable::Component(_, component_id) = ownable else {
            return None;
        };
        let slot = self.repositories.get(&type_id)?;
        slot.repository.find_entity_by_component_id(component_id)
    }

    fn destroy_row(&mut self, row: u32, id: u64) {
        for slot in self.repositories.values_mut() {
            slot.repository.remove(row);
        }
        self.id_of_row[row as usize] = 0;
        self.compacted = false;
        let _ = id;
    }

    /// Compact every repository and this store's own entity-row table,
    /// packing live rows to the front in ascending id order.
    pub fn compact(&mut self) {
        let n = self.row_count;
        let mut order: Vec<u32> = (1..n as u32).filter(|&r| self.id_of_row[r as usize] != 0).collect();
        order.sort_by_key(|&r| self.id_of_row[r as usize]);

        let mut remap = vec![0u32; n];
        let mut new_id_of_row = vec![0u64; order.len() + 1];
        for (i, &old_row) in order.iter().enumerate() {
            let new_row = (i + 1) as u32;
            remap[old_row as usize] = new_row;
            new_id_of_row[new_row as usize] = self.id_of_row[old_row as usize];
        }
        self.id_of_row = new_id_of_row;
        self.row_count = order.len() + 1;
        self.compacted = true;

        for slot in self.repositories.values_mut() {
            slot.repository.compact(&remap);
        }
        debug!(
            "compact: entities before={} after={}",
            n - 1,
            self.row_count - 1
        );
    }

    /// Typed access to the repository for `T`, if any component of this
    /// type has ever been added to this store. Used by `View` to drive
    /// required/optional joins and by `Scheduler` to assign stable type
    /// indices for deterministic lock ordering.
    pub(crate) fn repo<T: HasSchema>(&self) -> Option<&Repository<T>> {
        self.repositories
            .get(&TypeId::of::<T>())
            .map(|slot| slot.repository.as_any().downcast_ref::<Repository<T>>().unwrap())
    }

    /// Live component count for a type reached only by `TypeId`. Used by
    /// `View` to pick the cheapest required type to drive a join from.
    pub(crate) fn repo_len_by_type(&self, type_id: TypeId) -> Option<usize> {
        self.repositories.get(&type_id).map(|slot| slot.repository.len())
    }

    /// Entity rows carrying a live component of `type_id`, ascending.
    pub(crate) fn live_entity_rows_for_type(&self, type_id: TypeId) -> Option<Vec<u32>> {
        self.repositories
            .get(&type_id)
            .map(|slot| slot.repository.live_entity_rows())
    }

    /// Whether `entity_row` carries a live component of `type_id`, reached
    /// only by `TypeId` (a type with no repository yet never has one).
    pub(crate) fn has_type_at_row(&self, type_id: TypeId, entity_row: u32) -> bool {
        self.repositories
            .get(&type_id)
            .map(|slot| slot.repository.has(entity_row))
            .unwrap_or(false)
    }

    fn repo_mut<T: HasSchema>(&mut self) -> &mut Repository<T> {
        let row_count = self.row_count;
        self.repositories
            .entry(TypeId::of::<T>())
            .or_insert_with(|| RepositorySlot {
                repository: Box::new(Repository::<T>::new(row_count)),
                create: |capacity| Box::new(Repository::<T>::new(capacity)),
            })
            .repository
            .as_any_mut()
            .downcast_mut::<Repository<T>>()
            .unwrap()
    }

    fn ensure_required<T: HasSchema>(&mut self, entity_row: u32, owner_id: u64) -> Result<()> {
        let required = T::schema().required().to_vec();
        let row_count = self.row_count;
        for req in required {
            let slot = self.repositories.entry(req.type_id).or_insert_with(|| RepositorySlot {
                repository: (req.create)(row_count),
                create: req.create,
            });
            slot.repository.grow_entity_capacity(row_count);
            let (created_id, created) = slot.repository.ensure_default(entity_row);
            if created {
                let _ = self.ownership.set_owner(
                    Ownable::Component(req.type_id, created_id),
                    Some(Ownable::Component(TypeId::of::<T>(), owner_id)),
                );
            }
        }
        Ok(())
    }

    /// Add a component of type `T` to `entity`, resolving its required
    /// chain first. Replaces any existing component of this type.
    pub fn add<T: HasSchema>(&mut self, entity: Entity) -> Result<ComponentMut<'_, T>> {
        let entity_row = self
            .resolve(entity)
            .ok_or_else(|| Error::InvalidArgument("add: entity is not alive".into()))?;
        self.repo_mut::<T>().grow_entity_capacity(self.row_count);
        let handle = self.repo_mut::<T>().add(entity_row, None)?;
        self.ensure_required::<T>(entity_row, handle.expected_id)?;
        trace!("add component {}: entity={}", T::schema().type_name(), entity.id());
        let repo = self.repo_mut::<T>();
        Ok(ComponentMut {
            repo,
            row: handle.row,
            expected_id: handle.expected_id,
        })
    }

    /// Add a component of type `T` to `entity`, cloning declared fields
    /// from `template`'s component in `template_repository` (which may
    /// belong to a different `EntityStore`).
    pub fn add_from_template<T: HasSchema>(
        &mut self,
        entity: Entity,
        template_repository: &Repository<T>,
        template: ComponentHandle,
    ) -> Result<ComponentMut<'_, T>> {
        let entity_row = self
            .resolve(entity)
            .ok_or_else(|| Error::InvalidArgument("add_from_template: entity is not alive".into()))?;
        let template_row = template_repository
            .resolve(template)
            .ok_or_else(|| Error::InvalidArgument("add_from_template: template handle is stale".into()))?;
        self.repo_mut::<T>().grow_entity_capacity(self.row_count);
        let handle = self
            .repo_mut::<T>()
            .add(entity_row, Some((template_repository, template_row)))?;
        self.ensure_required::<T>(entity_row, handle.expected_id)?;
        let repo = self.repo_mut::<T>();
        Ok(ComponentMut {
            repo,
            row: handle.row,
            expected_id: handle.expected_id,
        })
    }

    pub fn has<T: HasSchema>(&self, entity: Entity) -> bool {
        let Some(row) = self.resolve(entity) else {
            return false;
        };
        self.repo::<T>().map(|r| r.has(row)).unwrap_or(false)
    }

    pub fn get<T: HasSchema>(&self, entity: Entity) -> Option<Component<'_, T>> {
        let row = self.resolve(entity)?;
        let repo = self.repo::<T>()?;
        let handle = repo.handle_for_entity(row)?;
        Some(Component {
            repo,
            row: handle.row,
            expected_id: handle.expected_id,
        })
    }

    pub fn get_mut<T: HasSchema>(&mut self, entity: Entity) -> Option<ComponentMut<'_, T>> {
        let row = self.resolve(entity)?;
        let repo = self.repositories.get_mut(&TypeId::of::<T>())?.repository.as_any_mut().downcast_mut::<Repository<T>>().unwrap();
        let handle = repo.handle_for_entity(row)?;
        Some(ComponentMut {
            repo,
            row: handle.row,
            expected_id: handle.expected_id,
        })
    }

    /// Remove `entity`'s component of type `T`, releasing anything it
    /// owned. Returns whether a component was actually removed.
    pub fn remove<T: HasSchema>(&mut self, entity: Entity) -> bool {
        let Some(row) = self.resolve(entity) else {
            return false;
        };
        let Some(slot) = self.repositories.get_mut(&TypeId::of::<T>()) else {
            return false;
        };
        let Some(handle) = slot.repository.as_any().downcast_ref::<Repository<T>>().unwrap().handle_for_entity(row) else {
            return false;
        };
        let destroyed = self.ownership.cascade(Ownable::Component(TypeId::of::<T>(), handle.expected_id));
        for ownable in destroyed {
            match ownable {
                Ownable::Component(type_id, _) if type_id == TypeId::of::<T>() => {
                    self.repositories.get_mut(&type_id).unwrap().repository.remove(row);
                }
                Ownable::Component(type_id, _) => {
                    if let Some(owner_entity) = self.entity_owning_component(type_id, ownable) {
                        if let Some(slot) = self.repositories.get_mut(&type_id) {
                            slot.repository.remove(owner_entity);
                        }
                    }
                }
                Ownable::Entity(id) => {
                    if let Some(victim) = self.entity_by_id(id) {
                        self.remove_entity(victim);
                    }
                }
            }
        }
        trace!("remove component {}: entity={}", T::schema().type_name(), entity.id());
        true
    }

    pub fn ownership(&self) -> &OwnershipGraph {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut OwnershipGraph {
        &mut self.ownership
    }

    pub fn set_entity_owner(&mut self, entity: Entity, owner: Option<Entity>) -> Result<()> {
        self.ownership
            .set_owner(Ownable::Entity(entity.id()), owner.map(|e| Ownable::Entity(e.id())))
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
