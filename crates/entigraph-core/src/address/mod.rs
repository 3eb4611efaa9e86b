//! The address grammar, parser, and resolver.

mod parser;
mod resolver;

pub use parser::Address;
pub use resolver::{batch_resolve, resolve, resolve_advanced, resolve_parsed, Resolved};
