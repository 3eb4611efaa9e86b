//! Function catalog demo command
//!
//! Usage: entigraph functions

use clap::Args;
use entigraph_core::{CallOutput, CallableRegistry, Entity};
use std::collections::BTreeMap;

#[derive(Debug, Args)]
pub struct FunctionsArgs {}

/// Register the same sample functions the `call` command uses and list
/// their declared signatures, exercising `CallableRegistry::list`/`info`.
pub fn execute(_args: FunctionsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let callables = CallableRegistry::new();

    callables.register_sync(
        "analyze",
        vec!["name".into(), "grades".into(), "threshold".into()],
        "Result",
        |_input, _registry, _callables| Ok(CallOutput::Single(Entity::new("Result", BTreeMap::new()))),
    );
    callables.register_async(
        "summarize",
        vec!["record".into()],
        "Summary",
        |_input, _registry: &'static entigraph_core::Registry, _callables: &'static CallableRegistry| async {
            Ok(CallOutput::Single(Entity::new("Summary", BTreeMap::new())))
        },
    );

    for name in callables.list() {
        let info = callables.info(&name).expect("just listed");
        println!(
            "{name} (async={}) inputs={:?} -> {}",
            info.is_async, info.input_fields, info.output_type
        );
    }

    Ok(())
}
