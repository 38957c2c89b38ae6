//! mm-ready: offline schema-dump parser
//!
//! This library reads a PostgreSQL schema-only dump and reconstructs the
//! structural picture of the database (tables, constraints, indexes,
//! sequences, extensions, enum types, rules) without connecting to a live
//! server. Replication-readiness checks run against the resulting
//! [`SchemaModel`].

pub mod config;
pub mod model;
pub mod parser;

// Re-export commonly used types
pub use config::Config;
pub use model::{
    ColumnDef, ConstraintDef, ConstraintKind, IndexDef, SchemaModel, SequenceDef, TableDef,
};
pub use parser::{DumpError, DumpParser, ParserOptions, parse_dump};
