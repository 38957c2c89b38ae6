//! Schema-dump parsing
//!
//! A dump is processed in one forward pass: the text is cut into
//! statements ([`segment`]), each statement is classified and extracted
//! (`extract`), and the extracted statement is applied to a
//! [`SchemaModel`]. Statements that are not recognized are skipped, so
//! arbitrarily complex SQL in the dump never causes a failure. The only
//! fatal condition is being unable to read the file.

mod body;
mod constraint;
mod extract;
pub mod scan;
pub mod segment;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

use crate::model::SchemaModel;
use extract::{Context, DumpStatement, Outcome, classify};

/// Schemas that never hold user objects.
const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Prefixes of per-session temporary schemas (`pg_temp_3`, `pg_toast_temp_3`).
const TEMP_SCHEMA_PREFIXES: &[&str] = &["pg_temp", "pg_toast_temp"];

/// Error reading a dump.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to read dump {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Knobs that decide how names resolve and which schemas are out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Schema unqualified names resolve to until the dump sets `search_path`.
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Schema (and extension) of the replication system itself. Objects in
    /// it are not user objects.
    #[serde(default = "default_replication_schema")]
    pub replication_schema: String,

    /// Additional schemas to leave out of the model.
    #[serde(default)]
    pub extra_excluded_schemas: Vec<String>,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_replication_schema() -> String {
    "spock".to_string()
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            default_schema: default_schema(),
            replication_schema: default_replication_schema(),
            extra_excluded_schemas: Vec::new(),
        }
    }
}

impl ParserOptions {
    /// Whether objects in `schema` are left out of the model.
    pub fn is_excluded(&self, schema: &str) -> bool {
        SYSTEM_SCHEMAS.contains(&schema)
            || TEMP_SCHEMA_PREFIXES.iter().any(|p| schema.starts_with(p))
            || schema == self.replication_schema
            || self.extra_excluded_schemas.iter().any(|s| s == schema)
    }
}

/// Parses schema-only dumps into a [`SchemaModel`].
#[derive(Debug, Clone, Default)]
pub struct DumpParser {
    options: ParserOptions,
}

impl DumpParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Read and parse the dump at `path`.
    ///
    /// Fails only if the file cannot be read as UTF-8 text.
    pub fn parse_file(&self, path: &Path) -> Result<SchemaModel, DumpError> {
        let text = std::fs::read_to_string(path).map_err(|source| DumpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.parse_str(&text))
    }

    /// Parse dump text that is already in memory.
    #[instrument(skip_all, fields(bytes = text.len()))]
    pub fn parse_str(&self, text: &str) -> SchemaModel {
        let segmented = segment::segment(text, &self.options.default_schema);
        let mut model = SchemaModel::new();

        if let Some(version) = segmented.pg_version {
            model.set_pg_version(version);
        }

        let mut skipped = 0usize;
        for stmt in &segmented.statements {
            let ctx = Context {
                current_schema: &stmt.schema,
                options: &self.options,
            };
            match classify(&stmt.sql, &ctx) {
                Outcome::Extracted(extracted) => apply(&mut model, extracted),
                Outcome::Discarded(reason) => debug!(%reason, "discarded statement"),
                Outcome::NoMatch => {
                    skipped += 1;
                    trace!(statement = first_line(&stmt.sql), "unrecognized statement");
                }
            }
        }

        info!(
            statements = segmented.statements.len(),
            skipped,
            summary = %model.summary(),
            "parsed dump"
        );
        model
    }
}

/// Parse the dump at `path` with default options.
pub fn parse_dump(path: impl AsRef<Path>) -> Result<SchemaModel, DumpError> {
    DumpParser::default().parse_file(path.as_ref())
}

/// Apply one extracted statement to the model. Back-fills that name an
/// unknown table, column or sequence are dropped.
fn apply(model: &mut SchemaModel, stmt: DumpStatement) {
    match stmt {
        DumpStatement::Extension(ext) => model.push_extension(ext),
        DumpStatement::EnumType(def) => model.push_enum_type(def),
        DumpStatement::Sequence(seq) => model.push_sequence(seq),
        DumpStatement::Table { table, constraints } => {
            model.push_table(table);
            for con in constraints {
                model.push_constraint(con);
            }
        }
        DumpStatement::AddConstraint(con) => model.push_constraint(con),
        DumpStatement::CreateIndex(idx) => model.push_index(idx),
        DumpStatement::SetDefault {
            schema,
            table,
            column,
            expr,
        } => {
            if !model.set_column_default(&schema, &table, &column, expr) {
                debug!(%schema, %table, %column, "default for unknown column");
            }
        }
        DumpStatement::AddIdentity {
            schema,
            table,
            column,
            kind,
        } => {
            if !model.set_column_identity(&schema, &table, &column, kind) {
                debug!(%schema, %table, %column, "identity for unknown column");
            }
        }
        DumpStatement::SequenceOwnedBy {
            schema,
            name,
            owner,
        } => {
            if !model.set_sequence_owner(&schema, &name, owner) {
                debug!(%schema, sequence = %name, "owner for unknown sequence");
            }
        }
        DumpStatement::CreateRule(rule) => model.push_rule(rule),
    }
}

fn first_line(sql: &str) -> &str {
    sql.lines().next().unwrap_or_default().trim()
}
