//! Fork demo command
//!
//! Usage: entigraph fork [--age <AGE>]

use std::collections::BTreeMap;

use clap::Args;
use entigraph_core::{Entity, FieldValue, Registry};

#[derive(Debug, Args)]
pub struct ForkArgs {
    /// Age to set on the sample Student entity before re-registering it
    #[arg(long, default_value_t = 21)]
    pub age: i64,
}

/// Register a sample `Student` entity, mutate its `age` field in place, and
/// register the mutated copy. Prints the cold snapshot before and after so
/// the copy-on-write fork is visible from the outside.
pub fn execute(args: ForkArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();

    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), FieldValue::Text("Alice".into()));
    fields.insert("age".to_string(), FieldValue::Int(20));
    let mut student = Entity::new("Student", fields);
    registry.register(&mut student)?;
    let original_id = student.ecs_id;
    println!("registered {original_id} age=20");

    student
        .fields
        .insert("age".to_string(), FieldValue::Int(args.age));
    registry.register(&mut student)?;

    if student.ecs_id == original_id {
        println!("no fork (age already {})", args.age);
    } else {
        println!("forked {original_id} -> {}", student.ecs_id);
        println!("lineage: {:?}", registry.lineage_of(student.lineage_id));
        let cold = registry.get_cold(original_id)?;
        println!("cold snapshot of {original_id} still has age={:?}", cold.fields["age"]);
    }

    Ok(())
}
