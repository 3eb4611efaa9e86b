//! The process-wide entity registry.

pub(crate) mod store;

pub use store::{Registry, TypeDescriptor};
