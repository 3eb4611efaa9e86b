//! `FunctionExecution`: the entity recorded for every call through a
//! [`super::CallableRegistry`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::{CallPattern, InputPattern};
use crate::model::{Entity, FieldValue};

fn ids_to_sequence<'a>(ids: impl Iterator<Item = &'a Uuid>) -> FieldValue {
    FieldValue::Sequence(ids.map(|id| FieldValue::Text(id.to_string())).collect())
}

pub struct FunctionExecution;

impl FunctionExecution {
    /// Build the execution-record entity for one call. `execution_id` is the
    /// id pushed onto the context stack before the call started, so the
    /// entity's own identity matches what nested executions saw as their
    /// parent frame. `parent_execution` is the innermost frame that was
    /// already active at that moment, if any; it becomes `parent_id` so
    /// nested calls form a tree rather than a flat log.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        execution_id: Uuid,
        function_name: &str,
        input_entity_id: Uuid,
        pattern: CallPattern,
        classification: &BTreeMap<String, InputPattern>,
        dependencies: &BTreeSet<Uuid>,
        output_ids: &[Uuid],
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        success: bool,
        error_kind: Option<&str>,
        parent_execution: Option<Uuid>,
    ) -> Entity {
        let mut fields = BTreeMap::new();
        fields.insert(
            "function_name".to_string(),
            FieldValue::Text(function_name.to_string()),
        );
        fields.insert(
            "input_entity_id".to_string(),
            FieldValue::Text(input_entity_id.to_string()),
        );
        fields.insert("pattern".to_string(), FieldValue::Text(format!("{pattern:?}")));
        fields.insert(
            "classification".to_string(),
            FieldValue::Mapping(
                classification
                    .iter()
                    .map(|(field, pattern)| (field.clone(), FieldValue::Text(format!("{pattern:?}"))))
                    .collect(),
            ),
        );
        fields.insert("dependencies".to_string(), ids_to_sequence(dependencies.iter()));
        fields.insert("output_ids".to_string(), ids_to_sequence(output_ids.iter()));
        fields.insert("started_at".to_string(), FieldValue::Timestamp(started_at));
        fields.insert("ended_at".to_string(), FieldValue::Timestamp(ended_at));
        fields.insert("success".to_string(), FieldValue::Bool(success));
        fields.insert(
            "error_kind".to_string(),
            error_kind
                .map(|k| FieldValue::Text(k.to_string()))
                .unwrap_or(FieldValue::Null),
        );

        let mut entity = Entity::new("FunctionExecution", fields);
        entity.ecs_id = execution_id;
        entity.promote_to_root();
        entity.parent_id = parent_execution;
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_parent_link_from_context_stack() {
        let now = Utc::now();
        let outer_execution_id = Uuid::now_v7();
        let execution_id = Uuid::now_v7();
        let execution = FunctionExecution::record(
            execution_id,
            "inner",
            Uuid::now_v7(),
            CallPattern::Direct,
            &BTreeMap::new(),
            &BTreeSet::new(),
            &[],
            now,
            now,
            true,
            None,
            Some(outer_execution_id),
        );
        assert_eq!(execution.ecs_id, execution_id);
        assert_eq!(execution.parent_id, Some(outer_execution_id));
        assert!(execution.is_root());
        assert!(execution
            .fields
            .get("success")
            .unwrap()
            .value_eq(&FieldValue::Bool(true)));
    }
}
