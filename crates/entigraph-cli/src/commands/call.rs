//! Callable execution demo command
//!
//! Usage: entigraph call [--threshold <FLOAT>]

use std::collections::BTreeMap;

use clap::Args;
use entigraph_core::{CallOutput, CallableRegistry, Entity, FieldValue, Registry};

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Threshold literal passed alongside the two borrowed fields
    #[arg(long, default_value_t = 3.5)]
    pub threshold: f64,
}

/// Register a sample `Student` and `Record`, register a sync "analyze"
/// function, and call it with a mix of borrowed and literal kwargs.
pub fn execute(args: CallArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    let callables = CallableRegistry::new();

    let mut student_fields = BTreeMap::new();
    student_fields.insert("name".to_string(), FieldValue::Text("Alice".into()));
    student_fields.insert("age".to_string(), FieldValue::Int(20));
    let mut student = Entity::new("Student", student_fields);
    registry.register(&mut student)?;

    let mut record_fields = BTreeMap::new();
    record_fields.insert(
        "grades".to_string(),
        FieldValue::Sequence(vec![
            FieldValue::Float(3.8),
            FieldValue::Float(3.9),
            FieldValue::Float(4.0),
        ]),
    );
    let mut record = Entity::new("Rec", record_fields);
    registry.register(&mut record)?;

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
    kwargs.insert(
        "name".to_string(),
        FieldValue::Text(format!("@{}.name", student.ecs_id)),
    );
    kwargs.insert(
        "grades".to_string(),
        FieldValue::Text(format!("@{}.grades", record.ecs_id)),
    );
    kwargs.insert("threshold".to_string(), FieldValue::Float(args.threshold));

    let (output, execution_id) = callables.execute(&registry, "analyze", kwargs)?;
    match output {
        CallOutput::Single(result) => {
            println!("{} registered={}", result.ecs_id, registry.has(result.ecs_id));
            for (field, value) in &result.fields {
                let source = result
                    .attribute_source
                    .get(field)
                    .and_then(|s| s.source_id());
                println!("  {field} = {value:?} (from {source:?})");
            }
        }
        CallOutput::Many(results) => {
            for result in results {
                println!("{} registered={}", result.ecs_id, registry.has(result.ecs_id));
            }
        }
    }
    println!("execution={execution_id}");

    Ok(())
}
