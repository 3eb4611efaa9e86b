//! Tagged field values.
//!
//! Entities in the source system hold arbitrarily-typed fields through duck
//! typing (`hasattr(value, "ecs_id")` decides entity-ness at the call site).
//! `FieldValue` is the explicit, statically-dispatched replacement: every
//! value an entity can hold is one of these variants, and code that needs to
//! know "is this an entity" matches on `FieldValue::Entity` instead of
//! probing for an attribute.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// A value held in an entity's user fields.
///
/// There is no dedicated `Set` variant: the source's "sets" are represented
/// here as a [`FieldValue::Sequence`] built through [`FieldValue::set_from`],
/// which dedups on construction. A true `Set` variant would need `FieldValue`
/// to implement `Hash`/`Ord`, which it cannot do uniformly because of the
/// `Float` variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Entity(Box<Entity>),
    Sequence(Vec<FieldValue>),
    Mapping(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Build a deduped sequence, used for fields that model an unordered set.
    pub fn set_from(values: Vec<FieldValue>) -> Self {
        let mut out: Vec<FieldValue> = Vec::with_capacity(values.len());
        for v in values {
            if !out.iter().any(|existing| existing.value_eq(&v)) {
                out.push(v);
            }
        }
        FieldValue::Sequence(out)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            FieldValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            FieldValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, FieldValue::Entity(_))
    }

    /// Structural value equality, per spec §4.C rule 2's "otherwise" branch.
    /// Entities compare by `ecs_id`; sequences of entities compare as a
    /// multiset of `ecs_id`; everything else compares element/field-wise.
    pub fn value_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a == b,
            (FieldValue::Entity(a), FieldValue::Entity(b)) => a.ecs_id == b.ecs_id,
            (FieldValue::Sequence(a), FieldValue::Sequence(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let all_entities = a.iter().all(FieldValue::is_entity)
                    && b.iter().all(FieldValue::is_entity);
                if all_entities {
                    let mut a_ids: Vec<_> =
                        a.iter().filter_map(|v| v.as_entity()).map(|e| e.ecs_id).collect();
                    let mut b_ids: Vec<_> =
                        b.iter().filter_map(|v| v.as_entity()).map(|e| e.ecs_id).collect();
                    a_ids.sort();
                    b_ids.sort();
                    a_ids == b_ids
                } else {
                    a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y))
                }
            }
            (FieldValue::Mapping(a), FieldValue::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.value_eq(bv)))
            }
            _ => false,
        }
    }
}
