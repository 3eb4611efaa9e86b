//! Process-wide registry of entity versions, lineages, and live copies.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use uuid::Uuid;

use crate::diff::fork;
use crate::errors::{EntigraphError, Result};
use crate::model::Entity;

/// Descriptor for a concrete entity type, used by function-input assembly
/// and diagnostics (`CallableRegistry::info`).
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub field_names: Vec<String>,
}

/// The five process-wide maps named in the data model, guarded by a single
/// mutex. Reads and writes are both serialized; the specification only
/// requires read/read concurrency, so a `RwLock` would add complexity this
/// single-writer-per-root model doesn't need.
#[derive(Default)]
pub(crate) struct RegistryInner {
    pub(crate) snapshots: HashMap<Uuid, Entity>,
    pub(crate) ecs_id_to_root_id: HashMap<Uuid, Uuid>,
    pub(crate) lineages: HashMap<Uuid, Vec<Uuid>>,
    pub(crate) live_ids: HashMap<Uuid, Entity>,
    pub(crate) type_index: HashMap<String, TypeDescriptor>,
}

/// A handle to a registry. Cheaply constructed for isolated use (e.g. in
/// tests); [`Registry::global`] returns the process-wide default instance.
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// The process-wide default instance, lazily initialized on first use.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Register `root`. If its `ecs_id` is already known, the warm tree is
    /// compared against the stored snapshot and forked if it differs;
    /// otherwise the entire containment tree is stored fresh.
    pub fn register(&self, root: &mut Entity) -> Result<()> {
        if root.root_ecs_id.is_none() {
            root.promote_to_root();
        }
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        fork::register_root(&mut inner, root)
    }

    /// A deep-copied warm copy with a fresh `live_id` and `from_storage = true`.
    pub fn get(&self, ecs_id: Uuid) -> Result<Entity> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        let cold = inner
            .snapshots
            .get(&ecs_id)
            .ok_or(EntigraphError::UnknownEntity { ecs_id })?;
        let mut warm = cold.clone();
        warm.live_id = Uuid::now_v7();
        warm.from_storage = true;
        Ok(warm)
    }

    /// The immutable cold snapshot itself, unmodified.
    pub fn get_cold(&self, ecs_id: Uuid) -> Result<Entity> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .snapshots
            .get(&ecs_id)
            .cloned()
            .ok_or(EntigraphError::UnknownVersion { ecs_id })
    }

    /// An entity found anywhere inside `root_ecs_id`'s stored containment tree.
    pub fn get_stored_entity(&self, root_ecs_id: Uuid, ecs_id: Uuid) -> Result<Entity> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        let root = inner
            .snapshots
            .get(&root_ecs_id)
            .ok_or(EntigraphError::UnknownEntity {
                ecs_id: root_ecs_id,
            })?;
        find_in_tree(root, ecs_id)
            .cloned()
            .ok_or(EntigraphError::UnknownEntity { ecs_id })
    }

    pub fn get_live_entity(&self, live_id: Uuid) -> Result<Entity> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .live_ids
            .get(&live_id)
            .cloned()
            .ok_or(EntigraphError::UnknownEntity { ecs_id: live_id })
    }

    pub fn has(&self, ecs_id: Uuid) -> bool {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.snapshots.contains_key(&ecs_id)
    }

    pub fn root_of(&self, ecs_id: Uuid) -> Option<Uuid> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.ecs_id_to_root_id.get(&ecs_id).copied()
    }

    pub fn lineage_of(&self, lineage_id: Uuid) -> Vec<Uuid> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.lineages.get(&lineage_id).cloned().unwrap_or_default()
    }

    /// Detach all process-wide state. Mostly useful between test cases.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        *inner = RegistryInner::default();
    }

    pub fn register_type(&self, type_name: impl Into<String>, field_names: Vec<String>) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let type_name = type_name.into();
        inner.type_index.insert(
            type_name.clone(),
            TypeDescriptor {
                type_name,
                field_names,
            },
        );
    }

    pub fn type_descriptor(&self, type_name: &str) -> Option<TypeDescriptor> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.type_index.get(type_name).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn find_in_tree(root: &Entity, ecs_id: Uuid) -> Option<&Entity> {
    if root.ecs_id == ecs_id {
        return Some(root);
    }
    for sub in root.get_sub_entities() {
        if let Some(found) = find_in_tree(sub, ecs_id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::model::FieldValue;

    use super::*;

    fn student() -> Entity {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::Text("Alice".into()));
        fields.insert("age".to_string(), FieldValue::Int(20));
        Entity::new("Student", fields)
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = Registry::new();
        let mut s = student();
        let original = s.ecs_id;
        registry.register(&mut s).unwrap();
        assert!(registry.has(original));
        let fetched = registry.get(original).unwrap();
        assert_eq!(fetched.ecs_id, original);
        assert!(fetched.from_storage);
        assert_ne!(fetched.live_id, s.live_id);
    }

    #[test]
    fn register_twice_unchanged_keeps_ecs_id() {
        let registry = Registry::new();
        let mut s = student();
        let original = s.ecs_id;
        registry.register(&mut s).unwrap();
        registry.register(&mut s).unwrap();
        assert_eq!(s.ecs_id, original);
    }

    #[test]
    fn register_after_mutation_forks() {
        let registry = Registry::new();
        let mut s = student();
        let original = s.ecs_id;
        registry.register(&mut s).unwrap();
        s.fields.insert("age".to_string(), FieldValue::Int(21));
        registry.register(&mut s).unwrap();
        assert_ne!(s.ecs_id, original);
        assert_eq!(s.parent_id, Some(original));
        assert_eq!(registry.lineage_of(s.lineage_id), vec![original, s.ecs_id]);
        assert_eq!(registry.get_cold(original).unwrap().fields["age"].value_eq(&FieldValue::Int(20)), true);
    }

    #[test]
    fn unknown_id_surfaces_error() {
        let registry = Registry::new();
        assert!(registry.get(Uuid::now_v7()).is_err());
    }
}
