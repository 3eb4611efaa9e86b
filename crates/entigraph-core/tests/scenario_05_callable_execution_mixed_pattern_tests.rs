//! A call assembled from a mix of borrowed-address and literal kwargs
//! carries per-field provenance through to its output, and the
//! `FunctionExecution` entity written for the call records every entity
//! it depended on.

use std::collections::{BTreeMap, BTreeSet};

use entigraph_core::{CallOutput, CallableRegistry, Entity, FieldValue, Registry};

fn student_alice() -> Entity {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), FieldValue::Text("Alice".into()));
    fields.insert("age".to_string(), FieldValue::Int(20));
    Entity::new("Student", fields)
}

#[test]
fn callable_execution_with_mixed_pattern() {
    let registry = Registry::new();
    let callables = CallableRegistry::new();

    let mut student = student_alice();
    registry.register(&mut student).unwrap();
    let u = student.ecs_id;

    let mut rec_fields = BTreeMap::new();
    rec_fields.insert(
        "grades".to_string(),
        FieldValue::Sequence(vec![
            FieldValue::Float(3.8),
            FieldValue::Float(3.9),
            FieldValue::Float(4.0),
        ]),
    );
    let mut rec = Entity::new("Rec", rec_fields);
    registry.register(&mut rec).unwrap();
    let rec_id = rec.ecs_id;

    callables.register_sync(
        "analyze",
        vec!["name".into(), "grades".into(), "threshold".into()],
        "Result",
        |input, _registry, _callables| {
            let mut fields = BTreeMap::new();
            fields.insert(
                "name".to_string(),
                input.fields.get("name").cloned().unwrap_or(FieldValue::Null),
            );
            fields.insert(
                "grades".to_string(),
                input.fields.get("grades").cloned().unwrap_or(FieldValue::Null),
            );
            Ok(CallOutput::Single(Entity::new("Result", fields)))
        },
    );

    let mut kwargs = BTreeMap::new();
    kwargs.insert("name".to_string(), FieldValue::Text(format!("@{u}.name")));
    kwargs.insert("grades".to_string(), FieldValue::Text(format!("@{rec_id}.grades")));
    kwargs.insert("threshold".to_string(), FieldValue::Float(3.5));

    let (output, execution_id) = callables.execute(&registry, "analyze", kwargs).unwrap();
    let result = match output {
        CallOutput::Single(e) => e,
        CallOutput::Many(_) => panic!("expected a single Result entity"),
    };
    assert_eq!(result.entity_type, "Result");
    assert!(registry.has(result.ecs_id));

    let name_source = result.attribute_source.get("name").unwrap().source_id();
    assert_eq!(name_source, Some(u));
    let grades_source = result.attribute_source.get("grades").unwrap().source_id();
    assert_eq!(grades_source, Some(rec_id));

    let execution = registry.get_cold(execution_id).unwrap();
    let dependencies: BTreeSet<String> = match execution.fields.get("dependencies").unwrap() {
        FieldValue::Sequence(ids) => ids
            .iter()
            .map(|v| match v {
                FieldValue::Text(s) => s.clone(),
                other => panic!("expected a text id, got {other:?}"),
            })
            .collect(),
        other => panic!("expected a sequence, got {other:?}"),
    };
    assert!(dependencies.contains(&u.to_string()));
    assert!(dependencies.contains(&rec_id.to_string()));
}
