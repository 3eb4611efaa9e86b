//! Dependency graph derived from containment.

mod dependency;

pub use dependency::{DependencyGraph, TopoEntry};
