//! Copy-on-write fork algorithm (spec §4.C).

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use uuid::Uuid;

use crate::errors::Result;
use crate::graph::DependencyGraph;
use crate::model::{AttributeSource, Entity, FieldValue};
use crate::registry::store::RegistryInner;

use super::detector::is_significant;

/// `Registry::register`'s dispatch point: fork an already-known tree, or
/// store a brand new one.
pub(crate) fn register_root(inner: &mut RegistryInner, root: &mut Entity) -> Result<()> {
    if inner.snapshots.contains_key(&root.ecs_id) {
        let cold_root = inner
            .snapshots
            .get(&root.ecs_id)
            .cloned()
            .expect("just checked contains_key");
        if is_significant(root, &cold_root) || subtree_has_drift(inner, root) {
            fork_tree(inner, root);
        }
    } else {
        fresh_register(inner, root);
    }
    reindex_root(inner, root);
    Ok(())
}

/// True if any descendant's `ecs_id` either has no snapshot yet or differs
/// from its snapshot. Used alongside the root-level diff because a change
/// deep in the tree can leave the root's own fields untouched.
fn subtree_has_drift(inner: &RegistryInner, root: &Entity) -> bool {
    let graph = DependencyGraph::build(root);
    graph.topological_order().into_iter().any(|entry| {
        let entity = graph.entity(entry.id).expect("id came from this graph");
        match inner.snapshots.get(&entity.ecs_id) {
            Some(cold) => is_significant(entity, cold),
            None => true,
        }
    })
}

/// Store every entity in a never-before-seen tree as its own first version.
fn fresh_register(inner: &mut RegistryInner, root: &Entity) {
    let graph = DependencyGraph::build(root);
    for entry in graph.topological_order() {
        let entity = graph.entity(entry.id).expect("id came from this graph");
        inner.snapshots.insert(entity.ecs_id, entity.clone());
        inner
            .lineages
            .entry(entity.lineage_id)
            .or_default()
            .push(entity.ecs_id);
    }
    inner.live_ids.insert(root.live_id, root.clone());
}

/// The full 6-step fork algorithm.
fn fork_tree(inner: &mut RegistryInner, root: &mut Entity) {
    let modified = {
        let graph = DependencyGraph::build(root);
        let mut modified: BTreeSet<Uuid> = BTreeSet::new();
        for entry in graph.topological_order() {
            let entity = graph.entity(entry.id).expect("id came from this graph");
            match inner.snapshots.get(&entity.ecs_id) {
                Some(cold) if is_significant(entity, cold) => {
                    modified.insert(entity.ecs_id);
                }
                None => {
                    modified.insert(entity.ecs_id);
                }
                _ => {}
            }
        }
        // Step 3: every transitive dependent of a modified entity must also
        // fork, since its own contents (the modified child) changed.
        let mut expanded = modified.clone();
        for id in &modified {
            expanded.extend(graph.transitive_dependents_of(*id));
        }
        // Step 4: leaves-first order, restricted to the modified closure.
        graph
            .topological_order()
            .into_iter()
            .map(|e| e.id)
            .filter(|id| expanded.contains(id))
            .collect::<Vec<_>>()
    };

    let mut old_to_new: HashMap<Uuid, Uuid> = HashMap::new();
    let mut new_versions: HashMap<Uuid, Entity> = HashMap::new();

    // Step 5: fork each modified entity in topological order.
    for old_id in modified {
        let Some(entity) = root.find_mut(old_id) else {
            continue;
        };
        let old = entity.ecs_id;
        let new_id = Uuid::now_v7();
        entity.old_ids.push(old);
        entity.parent_id = Some(old);
        entity.ecs_id = new_id;
        entity.created_at = Utc::now();
        entity.backfill_attribute_source();

        old_to_new.insert(old, new_id);
        new_versions.insert(old, entity.clone());

        inner.snapshots.insert(new_id, entity.clone());
        inner
            .lineages
            .entry(entity.lineage_id)
            .or_default()
            .push(new_id);
    }

    // Step 5b / circular fix-up: `find_mut` above only reaches the first
    // occurrence of a forked entity, so any other parent holding its own
    // `FieldValue::Entity` copy (direct field, sequence member, or mapping
    // value) still carries the pre-fork ecs_id. Walk every entity's fields
    // and replace any such stale copy with the forked version.
    root.for_each_mut(&mut |entity: &mut Entity| {
        rewrite_stale_entity_references(entity, &old_to_new, &new_versions);
    });

    // Rewrite every attribute_source entry that still points at an old id.
    root.for_each_mut(&mut |entity: &mut Entity| {
        rewrite_attribute_source(entity, &old_to_new);
    });

    // Fallback for references that predate this fork pass entirely (the
    // circular-containment edge case): resolve via lineage -> latest id.
    let lineage_latest = latest_ecs_id_per_lineage(inner);
    let id_to_lineage = id_to_lineage_map(inner);
    root.for_each_mut(&mut |entity: &mut Entity| {
        rewrite_dangling_via_lineage(entity, inner, &id_to_lineage, &lineage_latest);
    });
}

/// Replace any `FieldValue::Entity` still carrying a pre-fork ecs_id with
/// the forked version, wherever it appears: a direct field, a sequence
/// element, or a mapping value.
fn rewrite_stale_entity_references(
    entity: &mut Entity,
    old_to_new: &HashMap<Uuid, Uuid>,
    new_versions: &HashMap<Uuid, Entity>,
) {
    for value in entity.fields.values_mut() {
        rewrite_stale_in_value(value, old_to_new, new_versions);
    }
}

fn rewrite_stale_in_value(
    value: &mut FieldValue,
    old_to_new: &HashMap<Uuid, Uuid>,
    new_versions: &HashMap<Uuid, Entity>,
) {
    match value {
        FieldValue::Entity(boxed) => {
            if old_to_new.contains_key(&boxed.ecs_id) {
                if let Some(replacement) = new_versions.get(&boxed.ecs_id) {
                    **boxed = replacement.clone();
                }
            }
        }
        FieldValue::Sequence(items) => {
            for item in items {
                rewrite_stale_in_value(item, old_to_new, new_versions);
            }
        }
        FieldValue::Mapping(map) => {
            for item in map.values_mut() {
                rewrite_stale_in_value(item, old_to_new, new_versions);
            }
        }
        _ => {}
    }
}

fn rewrite_attribute_source(entity: &mut Entity, old_to_new: &HashMap<Uuid, Uuid>) {
    for source in entity.attribute_source.values_mut() {
        *source = match std::mem::take(source) {
            AttributeSource::Single(id) => {
                AttributeSource::Single(*old_to_new.get(&id).unwrap_or(&id))
            }
            AttributeSource::List(ids) => AttributeSource::List(
                ids.into_iter()
                    .map(|maybe_id| maybe_id.map(|id| *old_to_new.get(&id).unwrap_or(&id)))
                    .collect(),
            ),
            AttributeSource::Mapping(map) => AttributeSource::Mapping(
                map.into_iter()
                    .map(|(k, maybe_id)| {
                        (k, maybe_id.map(|id| *old_to_new.get(&id).unwrap_or(&id)))
                    })
                    .collect(),
            ),
            AttributeSource::None => AttributeSource::None,
        };
    }
}

fn rewrite_dangling_via_lineage(
    entity: &mut Entity,
    inner: &RegistryInner,
    id_to_lineage: &HashMap<Uuid, Uuid>,
    lineage_latest: &HashMap<Uuid, Uuid>,
) {
    let resolve = |id: Uuid| -> Uuid {
        if inner.snapshots.contains_key(&id) {
            return id;
        }
        id_to_lineage
            .get(&id)
            .and_then(|lineage| lineage_latest.get(lineage))
            .copied()
            .unwrap_or(id)
    };
    for source in entity.attribute_source.values_mut() {
        *source = match std::mem::take(source) {
            AttributeSource::Single(id) => AttributeSource::Single(resolve(id)),
            AttributeSource::List(ids) => {
                AttributeSource::List(ids.into_iter().map(|m| m.map(resolve)).collect())
            }
            AttributeSource::Mapping(map) => AttributeSource::Mapping(
                map.into_iter().map(|(k, m)| (k, m.map(resolve))).collect(),
            ),
            AttributeSource::None => AttributeSource::None,
        };
    }
}

fn latest_ecs_id_per_lineage(inner: &RegistryInner) -> HashMap<Uuid, Uuid> {
    inner
        .lineages
        .iter()
        .filter_map(|(lineage, ids)| ids.last().map(|last| (*lineage, *last)))
        .collect()
}

fn id_to_lineage_map(inner: &RegistryInner) -> HashMap<Uuid, Uuid> {
    let mut out = HashMap::new();
    for (lineage, ids) in &inner.lineages {
        for id in ids {
            out.insert(*id, *lineage);
        }
    }
    out
}

/// Step 6: refresh `ecs_id_to_root_id` for the whole tree under its
/// (possibly just-changed) root id.
fn reindex_root(inner: &mut RegistryInner, root: &Entity) {
    let graph = DependencyGraph::build(root);
    for entry in graph.topological_order() {
        inner.ecs_id_to_root_id.insert(entry.id, root.ecs_id);
    }
    inner.ecs_id_to_root_id.insert(root.ecs_id, root.ecs_id);
    inner.live_ids.insert(root.live_id, root.clone());
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
    fn unchanged_reregister_keeps_ecs_id() {
        let mut inner = RegistryInner::default();
        let mut s = student();
        let original = s.ecs_id;
        register_root(&mut inner, &mut s).unwrap();
        register_root(&mut inner, &mut s).unwrap();
        assert_eq!(s.ecs_id, original);
    }

    #[test]
    fn field_edit_forks_and_preserves_the_cold_snapshot() {
        let mut inner = RegistryInner::default();
        let mut s = student();
        let original = s.ecs_id;
        register_root(&mut inner, &mut s).unwrap();

        s.fields.insert("age".to_string(), FieldValue::Int(21));
        register_root(&mut inner, &mut s).unwrap();

        assert_ne!(s.ecs_id, original);
        assert_eq!(s.parent_id, Some(original));
        let cold = inner.snapshots.get(&original).unwrap();
        assert!(cold.fields["age"].value_eq(&FieldValue::Int(20)));
    }

    #[test]
    fn nested_child_edit_forks_parent_too() {
        let mut inner = RegistryInner::default();
        let child = student();
        let child_id = child.ecs_id;
        let mut fields = BTreeMap::new();
        fields.insert("child".to_string(), FieldValue::Entity(Box::new(child)));
        let mut root = Entity::new("Parent", fields);
        let original_root_id = root.ecs_id;
        register_root(&mut inner, &mut root).unwrap();

        root.find_mut(child_id)
            .unwrap()
            .fields
            .insert("age".to_string(), FieldValue::Int(21));
        register_root(&mut inner, &mut root).unwrap();

        assert_ne!(root.ecs_id, original_root_id);
        let new_child = root.fields.get("child").unwrap().as_entity().unwrap();
        assert_ne!(new_child.ecs_id, child_id);
    }

    /// The only way Rust's owned `Box<Entity>` can model a shared reference
    /// is to duplicate the same logical entity into two fields. `find_mut`
    /// only reaches the first such occurrence when reassigning ids, so the
    /// fork pass must separately rewrite every other occurrence still
    /// carrying the pre-fork ecs_id.
    #[test]
    fn fork_rewrites_every_duplicated_occurrence_of_the_same_entity() {
        let mut inner = RegistryInner::default();
        let child = student();
        let child_id = child.ecs_id;

        let mut fields = BTreeMap::new();
        fields.insert(
            "primary".to_string(),
            FieldValue::Entity(Box::new(child.clone())),
        );
        fields.insert(
            "backup".to_string(),
            FieldValue::Sequence(vec![FieldValue::Entity(Box::new(child))]),
        );
        let mut root = Entity::new("Pair", fields);
        register_root(&mut inner, &mut root).unwrap();

        root.find_mut(child_id)
            .unwrap()
            .fields
            .insert("age".to_string(), FieldValue::Int(99));
        register_root(&mut inner, &mut root).unwrap();

        let primary = root.fields.get("primary").unwrap().as_entity().unwrap();
        let backup_seq = match root.fields.get("backup").unwrap() {
            FieldValue::Sequence(items) => items,
            other => panic!("expected a sequence, got {other:?}"),
        };
        let backup = backup_seq[0].as_entity().unwrap();

        assert_ne!(primary.ecs_id, child_id);
        assert_eq!(
            primary.ecs_id, backup.ecs_id,
            "both occurrences must be rewritten to the same forked id"
        );
        assert!(primary.fields["age"].value_eq(&FieldValue::Int(99)));
        assert!(backup.fields["age"].value_eq(&FieldValue::Int(99)));
    }
}
