//! Address resolution against a [`Registry`].

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::errors::{EntigraphError, Result};
use crate::model::{Entity, FieldValue};
use crate::registry::Registry;

use super::parser::Address;

/// What an address resolved to.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The whole entity, and it is the root of its containment tree.
    Entity(Entity),
    /// The whole entity, but it is contained within a larger tree.
    SubEntity(Entity),
    /// A non-entity value reached by walking through fields/containers.
    FieldValue(FieldValue),
}

impl Resolved {
    pub fn is_entity(&self) -> bool {
        matches!(self, Resolved::Entity(_) | Resolved::SubEntity(_))
    }
}

enum Cursor {
    Entity(Entity),
    Value(FieldValue),
}

fn value_to_cursor(value: FieldValue) -> Cursor {
    match value {
        FieldValue::Entity(e) => Cursor::Entity(*e),
        other => Cursor::Value(other),
    }
}

fn step(cursor: Cursor, seg: &str, consumed: usize) -> Result<Cursor> {
    match cursor {
        Cursor::Entity(entity) => entity
            .fields
            .get(seg)
            .cloned()
            .map(value_to_cursor)
            .ok_or_else(|| EntigraphError::BadPath {
                consumed,
                reason: format!("entity has no field '{seg}'"),
            }),
        Cursor::Value(FieldValue::Sequence(items)) => {
            let idx: usize = seg.parse().map_err(|_| EntigraphError::BadPath {
                consumed,
                reason: format!("'{seg}' is not a valid sequence index"),
            })?;
            items
                .get(idx)
                .cloned()
                .map(value_to_cursor)
                .ok_or_else(|| EntigraphError::BadPath {
                    consumed,
                    reason: format!("index {idx} out of range"),
                })
        }
        Cursor::Value(FieldValue::Mapping(map)) => map
            .get(seg)
            .cloned()
            .map(value_to_cursor)
            .ok_or_else(|| EntigraphError::BadPath {
                consumed,
                reason: format!("no key '{seg}'"),
            }),
        Cursor::Value(_) => Err(EntigraphError::BadPath {
            consumed,
            reason: "value has no further segments".to_string(),
        }),
    }
}

/// Resolve a raw address string against `registry`.
pub fn resolve(registry: &Registry, raw: &str) -> Result<Resolved> {
    let address = Address::parse(raw)?;
    resolve_parsed(registry, &address)
}

/// Resolve an already-parsed [`Address`].
pub fn resolve_parsed(registry: &Registry, address: &Address) -> Result<Resolved> {
    let root_id = registry
        .root_of(address.uuid)
        .ok_or(EntigraphError::UnknownEntity {
            ecs_id: address.uuid,
        })?;

    let entity = if address.uuid == root_id {
        registry.get_cold(root_id)?
    } else {
        registry.get_stored_entity(root_id, address.uuid)?
    };

    if address.segments.is_empty() {
        return Ok(if address.uuid == root_id {
            Resolved::Entity(entity)
        } else {
            Resolved::SubEntity(entity)
        });
    }

    let mut cursor = Cursor::Entity(entity);
    for (i, seg) in address.segments.iter().enumerate() {
        cursor = step(cursor, seg, i + 1)?;
    }

    Ok(match cursor {
        Cursor::Entity(e) => {
            if e.ecs_id == root_id {
                Resolved::Entity(e)
            } else {
                Resolved::SubEntity(e)
            }
        }
        Cursor::Value(v) => Resolved::FieldValue(v),
    })
}

/// Advanced resolution: same as [`resolve`] but also reports whether the
/// final value is an entity, sub-entity, or plain field value as a label,
/// for callers that want the classification without matching on [`Resolved`].
pub fn resolve_advanced(registry: &Registry, raw: &str) -> Result<(Resolved, &'static str)> {
    let resolved = resolve(registry, raw)?;
    let label = match &resolved {
        Resolved::Entity(_) => "entity",
        Resolved::SubEntity(_) => "sub_entity",
        Resolved::FieldValue(_) => "field_value",
    };
    Ok((resolved, label))
}

/// Recursively walk a heterogeneous JSON-like structure, resolving every
/// string that looks like an address, and collect the ids referenced.
pub fn batch_resolve(
    registry: &Registry,
    value: &FieldValue,
) -> Result<(FieldValue, BTreeSet<Uuid>)> {
    let mut referenced = BTreeSet::new();
    let resolved = batch_resolve_inner(registry, value, &mut referenced)?;
    Ok((resolved, referenced))
}

fn batch_resolve_inner(
    registry: &Registry,
    value: &FieldValue,
    referenced: &mut BTreeSet<Uuid>,
) -> Result<FieldValue> {
    match value {
        FieldValue::Text(s) if Address::is_address(s) => {
            let address = Address::parse(s)?;
            referenced.insert(address.uuid);
            Ok(match resolve_parsed(registry, &address)? {
                Resolved::Entity(e) | Resolved::SubEntity(e) => FieldValue::Entity(Box::new(e)),
                Resolved::FieldValue(v) => v,
            })
        }
        FieldValue::Sequence(items) => {
            let resolved = items
                .iter()
                .map(|v| batch_resolve_inner(registry, v, referenced))
                .collect::<Result<Vec<_>>>()?;
            Ok(FieldValue::Sequence(resolved))
        }
        FieldValue::Mapping(map) => {
            let resolved = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), batch_resolve_inner(registry, v, referenced)?)))
                .collect::<Result<_>>()?;
            Ok(FieldValue::Mapping(resolved))
        }
        other => Ok(other.clone()),
    }
}
