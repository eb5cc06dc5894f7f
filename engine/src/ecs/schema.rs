//! Parsed description of a component type.
//!
//! A [`Schema`] is built once per component type (via [`HasSchema::schema`],
//! normally backed by a `#[derive(Component)]`-generated [`SchemaBuilder`]
//! call behind a `OnceLock`) and never mutates afterwards. It is the
//! process-global "schema source" spec.md §6 describes: the surface syntax
//! that produces it (derive macro vs. hand-written builder call) is outside
//! this crate's concern, the core only consumes the resulting `Schema`.

use std::any::{Any, TypeId};
use std::collections::HashSet;

use crate::ecs::error::{Error, Result};
use crate::ecs::property::Property;

/// A type that has a process-global [`Schema`].
///
/// Implemented by `#[derive(Component)]` or by hand via [`SchemaBuilder`].
/// The returned reference is expected to be backed by a `once_cell`/
/// `OnceLock`-style lazily-initialized static, so repeated calls are cheap
/// and always return the same address.
pub trait HasSchema: Any + Send + Sync + Sized + 'static {
    fn schema() -> &'static Schema;
}

/// One declared field/column of a component type.
pub struct PropertyDeclaration {
    /// Field name. Declared properties are kept sorted ascending by this
    /// name; the ordering is contractually observable (iteration order,
    /// deterministic hashing).
    pub name: &'static str,
    /// Whether this property is a shared-instance property: reads reuse a
    /// single cached temporary per repository rather than allocating.
    pub shared_instance: bool,
    pub(crate) factory: fn(usize) -> Box<dyn Property>,
    /// Optional validation constraint (spec.md §4.2: non-null, numeric
    /// range, named-reference co-constraint) checked against a setter's
    /// incoming value before it is written. A bare fn pointer, not a
    /// closure, matching `factory`'s no-captures shape: every real
    /// constraint (a range check, a non-default check) is expressible as a
    /// free function over the erased value.
    pub(crate) validator: Option<fn(&dyn Any) -> Result<()>>,
}

impl PropertyDeclaration {
    /// Declare one property from a capacity-to-column factory. Always a
    /// bare fn pointer in practice (every call site is a monomorphized
    /// `PropertyColumn::<T>::with_capacity`, which has no captures), which
    /// keeps a `Schema`'s declared properties `'static` with no leaked
    /// closure environments.
    pub const fn new(
        name: &'static str,
        shared_instance: bool,
        factory: fn(usize) -> Box<dyn Property>,
    ) -> Self {
        Self {
            name,
            shared_instance,
            factory,
            validator: None,
        }
    }

    /// Attach a validation constraint, checked on every setter call before
    /// the value is written (spec.md §4.2/§7: "violated validation
    /// constraint at setter call" is an `InvalidArgument`, not a panic, and
    /// leaves the store unchanged).
    pub const fn with_validator(mut self, validator: fn(&dyn Any) -> Result<()>) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Metadata about one of this component type's required components.
/// Resolution against the owning `EntityStore`'s repository directory is by
/// `TypeId`, but the directory may not yet hold a repository for `R` — so a
/// required component also carries a creator so the store can lazily build
/// one on first use instead of requiring it to already exist (see
/// `entity_store.rs::ensure_required`).
#[derive(Clone, Copy)]
pub struct RequiredComponent {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub(crate) create: fn(usize) -> Box<dyn crate::ecs::repository::ErasedRepository>,
}

/// The parsed, validated description of one component type.
pub struct Schema {
    pub(crate) type_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) properties: Vec<PropertyDeclaration>,
    pub(crate) required: Vec<RequiredComponent>,
    /// A non-negative fingerprint folded from the fully-qualified type
    /// name, used only for naming/debugging generated accessors (spec.md
    /// §6's `<TypeName>Impl<hash>` naming convention); it has no effect on
    /// behavior.
    pub(crate) fingerprint: u64,
}

impl Schema {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn properties(&self) -> &[PropertyDeclaration] {
        &self.properties
    }

    pub fn required(&self) -> &[RequiredComponent] {
        &self.required
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Index of the declared property named `name`, if any. Declared
    /// properties are sorted by name, so this is a binary search.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties
            .binary_search_by(|p| p.name.cmp(name))
            .ok()
    }
}

/// Builds a [`Schema`], enforcing the closed-set naming and ordering rules
/// from spec.md §4.2. This is what a `#[derive(Component)]` expansion
/// calls into; it is also usable directly for component types that can't
/// derive.
pub struct SchemaBuilder {
    type_name: &'static str,
    type_id: TypeId,
    properties: Vec<PropertyDeclaration>,
    required: Vec<RequiredComponent>,
    seen_names: HashSet<&'static str>,
}

impl SchemaBuilder {
    pub fn new<T: 'static>(type_name: &'static str) -> Self {
        Self {
            type_name,
            type_id: TypeId::of::<T>(),
            properties: Vec::new(),
            required: Vec::new(),
            seen_names: HashSet::new(),
        }
    }

    /// Declare one property. Property names must be unique within a type;
    /// a duplicate is an `IllDefinedSchema` error raised at `build()`.
    pub fn property(mut self, decl: PropertyDeclaration) -> Self {
        self.seen_names.insert(decl.name);
        self.properties.push(decl);
        self
    }

    /// Declare a required component type: whenever this type is added to
    /// an entity, `R` is added first if not already present, owned by the
    /// newly created component.
    pub fn required<R: HasSchema>(mut self) -> Self {
        self.required.push(RequiredComponent {
            type_id: TypeId::of::<R>(),
            type_name: R::schema().type_name(),
            create: |capacity| Box::new(crate::ecs::repository::Repository::<R>::new(capacity)),
        });
        self
    }

    /// Validate and finalize the schema. Property declarations are sorted
    /// ascending by name (spec.md §4.2's contractually-observable
    /// ordering). Fails with `IllDefinedSchema` on duplicate property
    /// names within one type.
    pub fn build(mut self) -> Result<Schema> {
        let mut names = HashSet::new();
        for decl in &self.properties {
            if !names.insert(decl.name) {
                return Err(Error::IllDefinedSchema(format!(
                    "{}: duplicate property name {:?}",
                    self.type_name, decl.name
                )));
            }
            if decl.shared_instance && !(decl.factory)(0).supports_shareable() {
                return Err(Error::IllDefinedSchema(format!(
                    "{}.{}: shared_instance is only valid for a property implementation that supports shareables",
                    self.type_name, decl.name
                )));
            }
        }
        self.properties.sort_by(|a, b| a.name.cmp(b.name));

        let fingerprint = fold_name_hash(self.type_name);

        Ok(Schema {
            type_name: self.type_name,
            type_id: self.type_id,
            properties: self.properties,
            required: self.required,
            fingerprint,
        })
    }
}

/// Validator helpers usable via `PropertyDeclaration::with_validator`.
///
/// A constraint that needs per-field parameters (a numeric range, a named
/// cross-field reference) must be a dedicated top-level `fn`: a closure
/// capturing the range's bounds cannot coerce to the bare
/// `fn(&dyn Any) -> Result<()>` pointer `with_validator` expects, the same
/// restriction `PropertyDeclaration::factory` already lives under. The one
/// constraint generic enough to need no field-specific parameters is
/// exposed here; reach for a hand-written `fn` for anything else.
pub mod validators {
    use super::*;
    use crate::ecs::property::PropertyValue;

    /// Rejects a value equal to its type's default — the "non-null"
    /// constraint for a property whose absence is represented by a
    /// sentinel default (spec.md §4.2).
    pub fn non_default<T>(value: &dyn Any) -> Result<()>
    where
        T: PropertyValue + PartialEq,
    {
        let v = value
            .downcast_ref::<T>()
            .expect("validator invoked with a value of the wrong field type");
        if *v == T::default_value() {
            Err(Error::InvalidArgument(
                "value must not be the property's default/null value".into(),
            ))
        } else {
            Ok(())
        }
    }
}

/// A small, dependency-free fold of the type name into a non-negative
/// fingerprint, standing in for spec.md §6's "non-negative folding of an
/// MD5 of the fully qualified type name". We use a cheap FNV-1a fold
/// instead of pulling in an MD5 crate purely for a debug-naming hash with
/// no on-disk or wire meaning.
fn fold_name_hash(type_name: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in type_name.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash & 0x7fff_ffff_ffff_ffff
}
