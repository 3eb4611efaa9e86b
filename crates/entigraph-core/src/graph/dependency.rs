//! Dependency graph over one-hop containment.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::model::Entity;

/// One entry in a [`DependencyGraph::topological_order`] result. `forced`
/// marks a node that could not be reached by normal leaves-first expansion
/// because it sits on a cycle; it was emitted by the lowest-`ecs_id`
/// tie-break instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopoEntry {
    pub id: Uuid,
    pub forced: bool,
}

/// The dependency graph of a root's containment tree, derived purely from
/// [`Entity::get_sub_entities`]. Never persisted; rebuilt for each fork pass.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    entities: BTreeMap<Uuid, &'a Entity>,
    dependencies: BTreeMap<Uuid, BTreeSet<Uuid>>,
    dependents: BTreeMap<Uuid, BTreeSet<Uuid>>,
    cycles: Vec<Vec<Uuid>>,
}

impl<'a> DependencyGraph<'a> {
    /// Build by BFS from `root` over one-hop containment.
    pub fn build(root: &'a Entity) -> Self {
        let mut entities = BTreeMap::new();
        let mut dependencies: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();
        let mut dependents: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(root);
        entities.insert(root.ecs_id, root);

        while let Some(current) = queue.pop_front() {
            let children = current.get_sub_entities();
            let deps = dependencies.entry(current.ecs_id).or_default();
            for child in children {
                deps.insert(child.ecs_id);
                dependents.entry(child.ecs_id).or_default().insert(current.ecs_id);
                if !entities.contains_key(&child.ecs_id) {
                    entities.insert(child.ecs_id, child);
                    queue.push_back(child);
                }
            }
        }

        let cycles = detect_cycles(&entities, &dependencies);

        Self {
            entities,
            dependencies,
            dependents,
            cycles,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity(&self, id: Uuid) -> Option<&'a Entity> {
        self.entities.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids whose fields directly contain `id`.
    pub fn dependents_of(&self, id: Uuid) -> BTreeSet<Uuid> {
        self.dependents.get(&id).cloned().unwrap_or_default()
    }

    /// Every transitive dependent of `id` (parents, grandparents, ...).
    pub fn transitive_dependents_of(&self, id: Uuid) -> BTreeSet<Uuid> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for parent in self.dependents_of(current) {
                if seen.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        seen
    }

    /// Cycles discovered during construction, each as the sequence of ids
    /// visited from the revisited node back to itself.
    pub fn cycles(&self) -> &[Vec<Uuid>] {
        &self.cycles
    }

    /// Leaves first. Entities with no unresolved dependencies are emitted
    /// before any of their dependents. When a cycle leaves no leaf
    /// available, the remaining node with the lowest `ecs_id` is forced
    /// through and marked `forced`.
    pub fn topological_order(&self) -> Vec<TopoEntry> {
        let mut done: BTreeSet<Uuid> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.entities.len());

        while done.len() < self.entities.len() {
            let mut ready: Vec<Uuid> = self
                .dependencies
                .iter()
                .filter(|(id, deps)| {
                    !done.contains(*id) && deps.iter().all(|d| done.contains(d))
                })
                .map(|(id, _)| *id)
                .collect();

            if ready.is_empty() {
                let forced = self
                    .entities
                    .keys()
                    .find(|id| !done.contains(*id))
                    .copied()
                    .expect("done.len() < entities.len() guarantees a remaining id");
                order.push(TopoEntry { id: forced, forced: true });
                done.insert(forced);
                continue;
            }

            ready.sort();
            for id in ready {
                order.push(TopoEntry { id, forced: false });
                done.insert(id);
            }
        }

        order
    }
}

fn detect_cycles(
    entities: &BTreeMap<Uuid, &Entity>,
    dependencies: &BTreeMap<Uuid, BTreeSet<Uuid>>,
) -> Vec<Vec<Uuid>> {
    let mut cycles = Vec::new();
    let mut visited: BTreeSet<Uuid> = BTreeSet::new();

    for &start in entities.keys() {
        if visited.contains(&start) {
            continue;
        }
        let mut path = Vec::new();
        let mut visiting: BTreeSet<Uuid> = BTreeSet::new();
        dfs(start, dependencies, &mut visiting, &mut visited, &mut path, &mut cycles);
    }

    cycles
}

fn dfs(
    node: Uuid,
    dependencies: &BTreeMap<Uuid, BTreeSet<Uuid>>,
    visiting: &mut BTreeSet<Uuid>,
    visited: &mut BTreeSet<Uuid>,
    path: &mut Vec<Uuid>,
    cycles: &mut Vec<Vec<Uuid>>,
) {
    visiting.insert(node);
    path.push(node);

    if let Some(children) = dependencies.get(&node) {
        for &child in children {
            if visiting.contains(&child) {
                let start = path.iter().position(|&id| id == child).unwrap_or(0);
                cycles.push(path[start..].to_vec());
            } else if !visited.contains(&child) {
                dfs(child, dependencies, visiting, visited, path, cycles);
            }
        }
    }

    path.pop();
    visiting.remove(&node);
    visited.insert(node);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::model::FieldValue;

    use super::*;

    fn leaf(name: &str) -> Entity {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::Text(name.to_string()));
        Entity::new("Leaf", fields)
    }

    #[test]
    fn single_node_has_no_dependencies() {
        let root = leaf("solo");
        let graph = DependencyGraph::build(&root);
        assert_eq!(graph.len(), 1);
        assert!(graph.topological_order()[0].id == root.ecs_id);
    }

    #[test]
    fn topological_order_puts_children_before_parents() {
        let child = leaf("child");
        let mut fields = BTreeMap::new();
        fields.insert("child".to_string(), FieldValue::Entity(Box::new(child.clone())));
        let root = Entity::new("Parent", fields);

        let graph = DependencyGraph::build(&root);
        let order = graph.topological_order();
        let child_pos = order.iter().position(|e| e.id == child.ecs_id).unwrap();
        let root_pos = order.iter().position(|e| e.id == root.ecs_id).unwrap();
        assert!(child_pos < root_pos);
    }

    #[test]
    fn dependents_of_reports_direct_parents() {
        let child = leaf("child");
        let mut fields = BTreeMap::new();
        fields.insert("child".to_string(), FieldValue::Entity(Box::new(child.clone())));
        let root = Entity::new("Parent", fields);

        let graph = DependencyGraph::build(&root);
        let parents = graph.dependents_of(child.ecs_id);
        assert_eq!(parents.len(), 1);
        assert!(parents.contains(&root.ecs_id));
    }
}
