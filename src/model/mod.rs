//! Schema model built from a schema-only dump

pub mod types;

#[cfg(test)]
pub mod builder;

pub use types::*;
