//! Address resolution demo command
//!
//! Usage: entigraph resolve [--path <DOTTED_PATH>]

use std::collections::BTreeMap;

use clap::Args;
use entigraph_core::address::{resolve, Resolved};
use entigraph_core::{Entity, FieldValue, Registry};

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Dot-separated path under the sample Record entity, e.g. "grades.1"
    /// or "courses.math". Leave empty to resolve the whole entity.
    #[arg(long, default_value = "")]
    pub path: String,
}

/// Register a sample `Record` entity (a sequence field and a mapping field)
/// and resolve `@<ecs_id>.<path>` against it.
pub fn execute(args: ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
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

    let mut record = Entity::new("Record", fields);
    registry.register(&mut record)?;
    let id = record.ecs_id;

    let address = if args.path.is_empty() {
        format!("@{id}")
    } else {
        format!("@{id}.{}", args.path)
    };
    println!("resolving {address}");

    match resolve(&registry, &address)? {
        Resolved::Entity(e) => println!("-> whole entity {} ({})", e.ecs_id, e.entity_type),
        Resolved::SubEntity(e) => println!("-> sub entity {} ({})", e.ecs_id, e.entity_type),
        Resolved::FieldValue(v) => println!("-> field value {v:?}"),
    }

    Ok(())
}
