//! Registering and executing callables through the 9-step contract of
//! spec §4.H, sharing the synchronous internals between `execute` and
//! `aexecute`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Utc;
use uuid::Uuid;

use crate::classify::{combine, CallPattern, InputPattern};
use crate::composite::Composite;
use crate::errors::{EntigraphError, Result};
use crate::model::{AttributeSource, Entity, FieldValue};
use crate::registry::Registry;

use super::context;
use super::execution::FunctionExecution;

/// A function's return: either one entity or a set of sibling outputs.
#[derive(Debug, Clone)]
pub enum CallOutput {
    Single(Entity),
    Many(Vec<Entity>),
}

impl CallOutput {
    fn ids(&self) -> Vec<Uuid> {
        match self {
            CallOutput::Single(e) => vec![e.ecs_id],
            CallOutput::Many(es) => es.iter().map(|e| e.ecs_id).collect(),
        }
    }
}

/// Declared shape of a registered function, returned by `list`/`info`.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub input_fields: Vec<String>,
    pub output_type: String,
    pub is_async: bool,
}

type SyncCallable =
    Arc<dyn Fn(&Entity, &Registry, &CallableRegistry) -> Result<CallOutput> + Send + Sync>;
type AsyncCallable = Arc<
    dyn Fn(
            Entity,
            &'static Registry,
            &'static CallableRegistry,
        ) -> Pin<Box<dyn Future<Output = Result<CallOutput>> + Send>>
        + Send
        + Sync,
>;

enum Callable {
    Sync(SyncCallable),
    Async(AsyncCallable),
}

struct FunctionEntry {
    descriptor: FunctionDescriptor,
    callable: Callable,
}

/// Catalog of callables reachable through `execute`/`aexecute`.
#[derive(Default)]
pub struct CallableRegistry {
    functions: Mutex<HashMap<String, FunctionEntry>>,
}

static GLOBAL: OnceLock<CallableRegistry> = OnceLock::new();

impl CallableRegistry {
    pub fn new() -> Self {
        Self {
            functions: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide default instance. Needed by async functions that
    /// recurse into `aexecute` themselves, since the `'static` bound on a
    /// boxed future rules out borrowing a stack-local registry.
    pub fn global() -> &'static CallableRegistry {
        GLOBAL.get_or_init(CallableRegistry::new)
    }

    /// Register a synchronous function.
    pub fn register_sync(
        &self,
        name: impl Into<String>,
        input_fields: Vec<String>,
        output_type: impl Into<String>,
        f: impl Fn(&Entity, &Registry, &CallableRegistry) -> Result<CallOutput> + Send + Sync + 'static,
    ) {
        let name = name.into();
        self.functions.lock().expect("callable registry poisoned").insert(
            name.clone(),
            FunctionEntry {
                descriptor: FunctionDescriptor {
                    name,
                    input_fields,
                    output_type: output_type.into(),
                    is_async: false,
                },
                callable: Callable::Sync(Arc::new(f)),
            },
        );
    }

    /// Register an asynchronous function. Only reachable through `aexecute`.
    pub fn register_async<F>(
        &self,
        name: impl Into<String>,
        input_fields: Vec<String>,
        output_type: impl Into<String>,
        f: impl Fn(Entity, &'static Registry, &'static CallableRegistry) -> F + Send + Sync + 'static,
    ) where
        F: Future<Output = Result<CallOutput>> + Send + 'static,
    {
        let name = name.into();
        self.functions.lock().expect("callable registry poisoned").insert(
            name.clone(),
            FunctionEntry {
                descriptor: FunctionDescriptor {
                    name,
                    input_fields,
                    output_type: output_type.into(),
                    is_async: true,
                },
                callable: Callable::Async(Arc::new(move |e, r, c| Box::pin(f(e, r, c)))),
            },
        );
    }

    pub fn list(&self) -> Vec<String> {
        let functions = self.functions.lock().expect("callable registry poisoned");
        let mut names: Vec<_> = functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn info(&self, name: &str) -> Option<FunctionDescriptor> {
        let functions = self.functions.lock().expect("callable registry poisoned");
        functions.get(name).map(|entry| entry.descriptor.clone())
    }

    /// Execute a synchronously-registered function. Fails with
    /// `InvariantViolation` if `name` was registered via `register_async`.
    ///
    /// Returns the call's output alongside the id of the `FunctionExecution`
    /// entity written for it, so a caller can fetch that entity back out of
    /// `registry` and inspect its `dependencies`/`parent_id` fields.
    pub fn execute(
        &self,
        registry: &Registry,
        name: &str,
        kwargs: BTreeMap<String, FieldValue>,
    ) -> Result<(CallOutput, Uuid)> {
        let (sync_fn, input_fields) = {
            let functions = self.functions.lock().expect("callable registry poisoned");
            let entry = functions
                .get(name)
                .ok_or_else(|| EntigraphError::UnknownFunction { name: name.to_string() })?;
            let sync_fn = match &entry.callable {
                Callable::Sync(f) => f.clone(),
                Callable::Async(_) => {
                    return Err(EntigraphError::InvariantViolation {
                        reason: format!("'{name}' is async; call aexecute"),
                    })
                }
            };
            (sync_fn, entry.descriptor.input_fields.clone())
        };

        let prepared = PreparedCall::assemble(registry, name, &input_fields, kwargs)?;
        let guard = context::push(prepared.execution_id);
        let outcome = sync_fn(&prepared.input.entity, registry, self);
        drop(guard);
        prepared.finish(registry, outcome)
    }

    /// Execute a function registered via either `register_sync` or
    /// `register_async`. Requires `'static` handles because the async path
    /// boxes a future that may itself recurse into `aexecute`.
    ///
    /// Returns the call's output alongside the id of the `FunctionExecution`
    /// entity written for it, so a caller can fetch that entity back out of
    /// `registry` and inspect its `dependencies`/`parent_id` fields.
    pub async fn aexecute(
        &'static self,
        registry: &'static Registry,
        name: &str,
        kwargs: BTreeMap<String, FieldValue>,
    ) -> Result<(CallOutput, Uuid)> {
        let (callable, input_fields) = {
            let functions = self.functions.lock().expect("callable registry poisoned");
            let entry = functions
                .get(name)
                .ok_or_else(|| EntigraphError::UnknownFunction { name: name.to_string() })?;
            let callable = match &entry.callable {
                Callable::Sync(f) => EitherCallable::Sync(f.clone()),
                Callable::Async(f) => EitherCallable::Async(f.clone()),
            };
            (callable, entry.descriptor.input_fields.clone())
        };

        let prepared = PreparedCall::assemble(registry, name, &input_fields, kwargs)?;
        let guard = context::push(prepared.execution_id);
        let outcome = match callable {
            EitherCallable::Sync(f) => f(&prepared.input.entity, registry, self),
            EitherCallable::Async(f) => f(prepared.input.entity.clone(), registry, self).await,
        };
        drop(guard);
        prepared.finish(registry, outcome)
    }

    /// Launch several executions; each gets its own context frame, and
    /// results are returned in request order.
    pub async fn execute_batch(
        &'static self,
        registry: &'static Registry,
        calls: Vec<(String, BTreeMap<String, FieldValue>)>,
    ) -> Vec<Result<(CallOutput, Uuid)>> {
        let mut out = Vec::with_capacity(calls.len());
        for (name, kwargs) in calls {
            let result = context::scope(async { self.aexecute(registry, &name, kwargs).await }).await;
            out.push(result);
        }
        out
    }
}

enum EitherCallable {
    Sync(SyncCallable),
    Async(AsyncCallable),
}

/// The shared synchronous prelude (steps 1-2) and epilogue (steps 4-9) of
/// the execution contract, factored out so `execute` and `aexecute` only
/// differ in how they perform the call itself (step 3).
struct PreparedCall {
    execution_id: Uuid,
    function_name: String,
    input: crate::composite::CompositeResult,
    pattern: CallPattern,
    started_at: chrono::DateTime<Utc>,
}

impl PreparedCall {
    fn assemble(
        registry: &Registry,
        function_name: &str,
        expected_fields: &[String],
        kwargs: BTreeMap<String, FieldValue>,
    ) -> Result<Self> {
        validate_input_shape(function_name, expected_fields, &kwargs)?;

        let started_at = Utc::now();
        // Step 1: input assembly.
        let input = Composite::create(registry, format!("{function_name}Input"), kwargs)?;
        let patterns: Vec<InputPattern> = input.classification.values().copied().collect();
        let pattern = combine(&patterns);

        // Step 2: pre-call versioning of every dependency already registered.
        fork_drifted_dependencies(registry, &input.dependencies)?;

        Ok(Self {
            execution_id: Uuid::now_v7(),
            function_name: function_name.to_string(),
            input,
            pattern,
            started_at,
        })
    }

    fn finish(
        self,
        registry: &Registry,
        outcome: Result<CallOutput>,
    ) -> Result<(CallOutput, Uuid)> {
        let execution_id = self.execution_id;
        let parent_execution = context::current();
        match outcome {
            Ok(mut output) => {
                // Step 4 is implicit: CallOutput already distinguishes
                // single vs sibling outputs.
                // Step 5: output registration.
                register_outputs(registry, &mut output)?;
                // Step 6: post-call versioning of inputs.
                fork_drifted_dependencies(registry, &self.input.dependencies)?;
                // Step 7: provenance completion.
                complete_provenance(&mut output, &self.input.entity);
                // Step 8: execution entity.
                let output_ids = output.ids();
                let mut execution = FunctionExecution::record(
                    self.execution_id,
                    &self.function_name,
                    self.input.entity.ecs_id,
                    self.pattern,
                    &self.input.classification,
                    &self.input.dependencies,
                    &output_ids,
                    self.started_at,
                    Utc::now(),
                    true,
                    None,
                    parent_execution,
                );
                registry.register(&mut execution)?;
                // Step 9: return to caller.
                Ok((output, execution_id))
            }
            Err(err) => {
                let mut execution = FunctionExecution::record(
                    self.execution_id,
                    &self.function_name,
                    self.input.entity.ecs_id,
                    self.pattern,
                    &self.input.classification,
                    &self.input.dependencies,
                    &[],
                    self.started_at,
                    Utc::now(),
                    false,
                    Some(err.kind().code()),
                    parent_execution,
                );
                let _ = registry.register(&mut execution);
                Err(err)
            }
        }
    }
}

/// The assembled kwargs must supply exactly the function's declared input
/// fields, no more and no fewer, before they ever reach `Composite::create`.
fn validate_input_shape(
    function_name: &str,
    expected_fields: &[String],
    kwargs: &BTreeMap<String, FieldValue>,
) -> Result<()> {
    for field in expected_fields {
        if !kwargs.contains_key(field) {
            return Err(EntigraphError::InputAssemblyError {
                field: field.clone(),
                reason: format!("'{function_name}' declares '{field}' but no matching kwarg was supplied"),
            });
        }
    }
    for key in kwargs.keys() {
        if !expected_fields.iter().any(|f| f == key) {
            return Err(EntigraphError::InputAssemblyError {
                field: key.clone(),
                reason: format!("'{function_name}' has no declared input field '{key}'"),
            });
        }
    }
    Ok(())
}

fn fork_drifted_dependencies(registry: &Registry, dependencies: &BTreeSet<Uuid>) -> Result<()> {
    for &id in dependencies {
        if registry.has(id) {
            let mut warm = registry.get(id)?;
            registry.register(&mut warm)?;
        }
    }
    Ok(())
}

fn register_outputs(registry: &Registry, output: &mut CallOutput) -> Result<()> {
    match output {
        CallOutput::Single(e) => register_one(registry, e),
        CallOutput::Many(es) => {
            for e in es {
                register_one(registry, e)?;
            }
            Ok(())
        }
    }
}

fn register_one(registry: &Registry, e: &mut Entity) -> Result<()> {
    if !registry.has(e.ecs_id) {
        e.promote_to_root();
    }
    registry.register(e)
}

/// Best-effort: a field on an output entity whose value matches (by
/// `value_eq`) a field on the input entity inherits that field's
/// provenance. Fields with no match keep whatever `attribute_source` the
/// user function (or its output entity's own construction) already gave
/// them, which defaults to `None`.
fn complete_provenance(output: &mut CallOutput, input: &Entity) {
    match output {
        CallOutput::Single(e) => apply_provenance(e, input),
        CallOutput::Many(es) => {
            for e in es {
                apply_provenance(e, input);
            }
        }
    }
}

fn apply_provenance(e: &mut Entity, input: &Entity) {
    let candidates: Vec<(String, AttributeSource)> = e
        .fields
        .iter()
        .filter(|(field, _)| {
            e.attribute_source
                .get(*field)
                .map(AttributeSource::is_none)
                .unwrap_or(true)
        })
        .filter_map(|(field, value)| {
            input
                .fields
                .iter()
                .find(|(_, input_value)| input_value.value_eq(value))
                .and_then(|(input_field, _)| input.attribute_source.get(input_field))
                .map(|source| (field.clone(), source.clone()))
        })
        .collect();
    for (field, source) in candidates {
        e.attribute_source.insert(field, source);
    }
}
