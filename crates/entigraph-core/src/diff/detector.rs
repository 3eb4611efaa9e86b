//! The warm-vs-cold diff contract.
//!
//! `Entity::fields` holds only user fields; the implementation fields the
//! spec excludes from comparison (`ecs_id`, `created_at`, `parent_id`, ...)
//! live as separate struct members and are never compared here, so the
//! exclusion rule is automatic rather than something this module filters.

use crate::model::Entity;

/// The names of every user field whose value differs between `warm` and
/// `cold`, including fields present on only one side.
pub fn changed_fields(warm: &Entity, cold: &Entity) -> Vec<String> {
    let mut changed: Vec<String> = Vec::new();
    let mut keys: Vec<&String> = warm.fields.keys().chain(cold.fields.keys()).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        match (warm.fields.get(key), cold.fields.get(key)) {
            (Some(w), Some(c)) if w.value_eq(c) => {}
            _ => changed.push(key.clone()),
        }
    }
    changed
}

/// A diff is significant iff at least one non-implementation field differs.
pub fn is_significant(warm: &Entity, cold: &Entity) -> bool {
    !changed_fields(warm, cold).is_empty()
}
