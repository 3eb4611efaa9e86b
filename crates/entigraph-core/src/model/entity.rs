//! The versioned entity.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{EntigraphError, Result};

use super::attribute_source::AttributeSource;
use super::identity::IdentityMode;
use super::value::FieldValue;

/// A single version of a logical entity.
///
/// Identity (`PartialEq`/`Eq`/`Hash`) is defined over `(ecs_id, live_id)`
/// only, per the data model's identity-hash rule — never derived, since a
/// derive would also compare `fields` and silently break that contract the
/// moment a field is added.
#[derive(Debug, Clone)]
pub struct Entity {
    pub entity_type: String,
    pub ecs_id: Uuid,
    pub live_id: Uuid,
    pub lineage_id: Uuid,
    pub root_ecs_id: Option<Uuid>,
    pub root_live_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub old_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub from_storage: bool,
    pub fields: BTreeMap<String, FieldValue>,
    pub attribute_source: BTreeMap<String, AttributeSource>,
}

impl Entity {
    /// Construct with fresh identifiers. `attribute_source` defaults to
    /// `None` for every supplied field.
    pub fn new(entity_type: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        let attribute_source = fields
            .keys()
            .map(|k| (k.clone(), AttributeSource::None))
            .collect();
        let ecs_id = Uuid::now_v7();
        Self {
            entity_type: entity_type.into(),
            ecs_id,
            live_id: Uuid::now_v7(),
            lineage_id: Uuid::now_v7(),
            root_ecs_id: None,
            root_live_id: None,
            parent_id: None,
            old_ids: Vec::new(),
            created_at: Utc::now(),
            from_storage: false,
            fields,
            attribute_source,
        }
    }

    pub fn is_root(&self) -> bool {
        self.root_ecs_id == Some(self.ecs_id)
    }

    /// Detach from any owner and become the root of an independent tree.
    pub fn promote_to_root(&mut self) {
        self.root_ecs_id = Some(self.ecs_id);
        self.root_live_id = Some(self.live_id);
    }

    /// Copy `source.source_field`'s value into `self.target_field`, and
    /// record `source.ecs_id` as its provenance.
    pub fn borrow_attribute_from(
        &mut self,
        source: &Entity,
        source_field: &str,
        target_field: &str,
    ) -> Result<()> {
        let value = source
            .fields
            .get(source_field)
            .ok_or_else(|| EntigraphError::BadPath {
                consumed: 0,
                reason: format!("source has no field '{source_field}'"),
            })?
            .clone();
        let provenance = attribute_source_for_value(&value, source.ecs_id);
        self.fields.insert(target_field.to_string(), value);
        self.attribute_source
            .insert(target_field.to_string(), provenance);
        Ok(())
    }

    /// Entities directly reachable by one field hop. Containers (sequences,
    /// mappings) are walked to find the entities they hold, but an entity
    /// found this way is not itself descended into — that would make this
    /// a transitive walk, which is the dependency graph's job, not the
    /// entity's.
    pub fn get_sub_entities(&self) -> Vec<&Entity> {
        let mut out = Vec::new();
        for value in self.fields.values() {
            collect_one_hop(value, &mut out);
        }
        out
    }

    /// Mutable counterpart of [`Entity::get_sub_entities`], used by the fork
    /// algorithm to reassign ids in place without rebuilding the tree.
    pub fn get_sub_entities_mut(&mut self) -> Vec<&mut Entity> {
        let mut out = Vec::new();
        for value in self.fields.values_mut() {
            collect_one_hop_mut(value, &mut out);
        }
        out
    }

    /// Finds the entity with `target` anywhere in this entity's containment
    /// tree (including itself), by mutable reference.
    pub fn find_mut(&mut self, target: Uuid) -> Option<&mut Entity> {
        if self.ecs_id == target {
            return Some(self);
        }
        for child in self.get_sub_entities_mut() {
            if let Some(found) = child.find_mut(target) {
                return Some(found);
            }
        }
        None
    }

    /// Visits every entity in this entity's containment tree (including
    /// itself) by mutable reference.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Entity)) {
        f(self);
        for child in self.get_sub_entities_mut() {
            child.for_each_mut(f);
        }
    }

    /// Every user field has a provenance entry; fields added after
    /// construction without going through `borrow_attribute_from` get one
    /// here so the invariant in spec §4.A holds before hashing or storing.
    pub fn backfill_attribute_source(&mut self) {
        for key in self.fields.keys() {
            self.attribute_source
                .entry(key.clone())
                .or_insert(AttributeSource::None);
        }
    }

    /// A hex-encoded SHA-256 digest. `Default` only folds in `ecs_id`;
    /// `Attributes` additionally folds in every field's value; `Containment`
    /// additionally recurses one level into each directly-held entity.
    pub fn compute_identity_hash(&self, mode: IdentityMode) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.ecs_id.as_bytes());
        if matches!(mode, IdentityMode::Attributes | IdentityMode::Containment) {
            for (key, value) in &self.fields {
                hasher.update(key.as_bytes());
                hash_value(&mut hasher, value, mode);
            }
        }
        hex::encode(hasher.finalize())
    }
}

/// Shape the provenance of a borrowed value to match the value itself: a
/// scalar or entity gets a single source id, a sequence gets one id per
/// element, a mapping gets one id per key — all pointing at the same
/// `source` entity, since the whole value was borrowed from one place.
fn attribute_source_for_value(value: &FieldValue, source: Uuid) -> AttributeSource {
    match value {
        FieldValue::Sequence(items) => {
            AttributeSource::List(items.iter().map(|_| Some(source)).collect())
        }
        FieldValue::Mapping(map) => AttributeSource::Mapping(
            map.keys().map(|key| (key.clone(), Some(source))).collect(),
        ),
        _ => AttributeSource::single(source),
    }
}

fn collect_one_hop<'a>(value: &'a FieldValue, out: &mut Vec<&'a Entity>) {
    match value {
        FieldValue::Entity(e) => out.push(e),
        FieldValue::Sequence(items) => {
            for item in items {
                collect_one_hop(item, out);
            }
        }
        FieldValue::Mapping(map) => {
            for item in map.values() {
                collect_one_hop(item, out);
            }
        }
        _ => {}
    }
}

fn collect_one_hop_mut<'a>(value: &'a mut FieldValue, out: &mut Vec<&'a mut Entity>) {
    match value {
        FieldValue::Entity(e) => out.push(e),
        FieldValue::Sequence(items) => {
            for item in items {
                collect_one_hop_mut(item, out);
            }
        }
        FieldValue::Mapping(map) => {
            for item in map.values_mut() {
                collect_one_hop_mut(item, out);
            }
        }
        _ => {}
    }
}

fn hash_value(hasher: &mut Sha256, value: &FieldValue, mode: IdentityMode) {
    match value {
        FieldValue::Null => hasher.update(b"null"),
        FieldValue::Bool(b) => hasher.update([*b as u8]),
        FieldValue::Int(i) => hasher.update(i.to_le_bytes()),
        FieldValue::Float(f) => hasher.update(f.to_le_bytes()),
        FieldValue::Text(s) => hasher.update(s.as_bytes()),
        FieldValue::Timestamp(t) => hasher.update(t.timestamp_nanos_opt().unwrap_or_default().to_le_bytes()),
        FieldValue::Entity(e) => {
            if matches!(mode, IdentityMode::Containment) {
                hasher.update(e.compute_identity_hash(IdentityMode::Default).as_bytes())
            } else {
                hasher.update(e.ecs_id.as_bytes())
            }
        }
        FieldValue::Sequence(items) => {
            for item in items {
                hash_value(hasher, item, mode);
            }
        }
        FieldValue::Mapping(map) => {
            for (k, v) in map {
                hasher.update(k.as_bytes());
                hash_value(hasher, v, mode);
            }
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ecs_id == other.ecs_id && self.live_id == other.live_id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ecs_id.hash(state);
        self.live_id.hash(state);
    }
}
