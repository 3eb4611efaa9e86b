//! Address resolution walks into sequence indices and mapping keys alike.

use std::collections::BTreeMap;

use entigraph_core::address::{resolve, Resolved};
use entigraph_core::{Entity, FieldValue, Registry};

#[test]
fn address_navigation_through_container() {
    let registry = Registry::new();
    let mut fields = BTreeMap::new();
    fields.insert(
        "grades".to_string(),
        FieldValue::Sequence(vec![
            FieldValue::Float(3.8),
            FieldValue::Float(3.9),
            FieldValue::Float(4.0),
        ]),
    );
    let course = Entity::new("Course", BTreeMap::new());
    let mut courses = BTreeMap::new();
    courses.insert("math".to_string(), FieldValue::Entity(Box::new(course)));
    fields.insert("courses".to_string(), FieldValue::Mapping(courses));

    let mut rec = Entity::new("Record", fields);
    registry.register(&mut rec).unwrap();
    let rec_id = rec.ecs_id;

    match resolve(&registry, &format!("@{rec_id}.grades.1")).unwrap() {
        Resolved::FieldValue(FieldValue::Float(f)) => assert!((f - 3.9).abs() < f64::EPSILON),
        other => panic!("expected 3.9, got {other:?}"),
    }

    match resolve(&registry, &format!("@{rec_id}.courses.math")).unwrap() {
        Resolved::SubEntity(_) => {}
        other => panic!("expected sub_entity, got {other:?}"),
    }
}
