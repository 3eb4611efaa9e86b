//! Borrowing a field by address into a composite records its provenance.

use std::collections::BTreeMap;

use entigraph_core::{Composite, Entity, FieldValue, Registry};

fn student_alice() -> Entity {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), FieldValue::Text("Alice".into()));
    fields.insert("age".to_string(), FieldValue::Int(20));
    Entity::new("Student", fields)
}

#[test]
fn borrowing_round_trip() {
    let registry = Registry::new();
    let mut student = student_alice();
    student.promote_to_root();
    registry.register(&mut student).unwrap();
    let u = student.ecs_id;

    let mut mapping = BTreeMap::new();
    mapping.insert("name".to_string(), FieldValue::Text(format!("@{u}.name")));
    mapping.insert("threshold".to_string(), FieldValue::Float(3.5));

    let composite = Composite::create(&registry, "Query", mapping).unwrap();
    assert!(composite
        .entity
        .fields
        .get("name")
        .unwrap()
        .value_eq(&FieldValue::Text("Alice".into())));
    assert_eq!(
        composite.entity.attribute_source.get("name").unwrap().source_id(),
        Some(u)
    );
    assert!(composite
        .entity
        .attribute_source
        .get("threshold")
        .unwrap()
        .is_none());
}
