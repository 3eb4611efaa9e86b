//! entigraph-core - Canonical in-memory entity-component storage kernel
//!
//! This crate provides the foundational data structures and operations for
//! entigraph, including:
//! - Versioned entities identified by `ecs_id`/`live_id`/`lineage_id`
//! - A dependency graph over containment, with cycle detection and
//!   topological ordering
//! - A change detector and copy-on-write fork algorithm
//! - A process-wide registry of entity versions and lineages
//! - An address grammar (`@uuid[.segment]*`) parser and resolver
//! - An input-pattern classifier and composite entity builder
//! - A callable registry with transactional execute/aexecute semantics
//! - A task-local execution context stack

pub mod address;
pub mod callable;
pub mod classify;
pub mod composite;
pub mod diff;
pub mod errors;
pub mod graph;
pub mod logging_facility;
pub mod model;
pub mod registry;

pub use callable::{CallOutput, CallableRegistry, FunctionDescriptor, FunctionExecution};
pub use classify::{CallPattern, InputPattern};
pub use composite::Composite;
pub use errors::{EntigraphError, ExError, ExErrorKind, Result};
pub use model::{AttributeSource, Entity, FieldValue, IdentityMode};
pub use registry::Registry;
