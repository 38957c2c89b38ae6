//! Schema model types
//!
//! The model is the structural picture of a database reconstructed from a
//! schema-only dump. Entities are stored in flat, declaration-ordered
//! containers. Tables and sequences are additionally indexed by
//! `(schema, name)` so that later statements can back-fill them without
//! holding references into the containers.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use strum_macros::EnumIter;

/// Kind of a table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumIter)]
pub enum ConstraintKind {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
    #[serde(rename = "EXCLUDE")]
    Exclude,
    #[serde(rename = "CHECK")]
    Check,
}

impl ConstraintKind {
    /// Parse a constraint keyword such as `PRIMARY  KEY` or `foreign key`.
    /// Case-insensitive, whitespace between words is collapsed.
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_keyword(s).as_str() {
            "PRIMARY KEY" => Some(Self::PrimaryKey),
            "UNIQUE" => Some(Self::Unique),
            "FOREIGN KEY" | "REFERENCES" => Some(Self::ForeignKey),
            "EXCLUDE" => Some(Self::Exclude),
            "CHECK" => Some(Self::Check),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Exclude => "EXCLUDE",
            Self::Check => "CHECK",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ON DELETE` / `ON UPDATE` action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_keyword(s).as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GENERATED { ALWAYS | BY DEFAULT } AS IDENTITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityKind {
    Always,
    ByDefault,
}

impl IdentityKind {
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_keyword(s).as_str() {
            "ALWAYS" => Some(Self::Always),
            "BY DEFAULT" => Some(Self::ByDefault),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "ALWAYS",
            Self::ByDefault => "BY DEFAULT",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event a rule fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleEvent {
    Select,
    Insert,
    Update,
    Delete,
}

impl RuleEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uppercase and collapse inner whitespace: `"set   null"` → `"SET NULL"`.
fn normalize_keyword(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    /// Type text as written in the dump: `integer`, `numeric(10,2)`, `text[]`.
    pub data_type: String,
    pub not_null: bool,
    pub default_expr: Option<String>,
    pub identity: Option<IdentityKind>,
    /// Expression of a `GENERATED ALWAYS AS (...) STORED` column.
    pub generated_expr: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            default_expr: None,
            identity: None,
            generated_expr: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDef {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub unlogged: bool,
    /// Parents from `INHERITS (...)`, each as `schema.name`.
    pub inherits: Vec<String>,
    /// Text after `PARTITION BY`, e.g. `RANGE (created_at)`.
    pub partition_by: Option<String>,
}

impl TableDef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            unlogged: false,
            inherits: Vec::new(),
            partition_by: None,
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDef> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_by.is_some()
    }
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyRef {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    /// `None` when the clause is absent, which PostgreSQL treats as `NO ACTION`.
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyRef {
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    pub fn delete_action(&self) -> ReferentialAction {
        self.on_delete.unwrap_or(ReferentialAction::NoAction)
    }

    pub fn update_action(&self) -> ReferentialAction {
        self.on_update.unwrap_or(ReferentialAction::NoAction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintDef {
    /// Empty for anonymous inline constraints.
    pub name: String,
    pub kind: ConstraintKind,
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    /// Set for foreign keys only.
    pub references: Option<ForeignKeyRef>,
    pub deferrable: bool,
    pub initially_deferred: bool,
    /// Raw expression of a check constraint.
    pub expression: Option<String>,
}

impl ConstraintDef {
    pub fn new(
        name: impl Into<String>,
        kind: ConstraintKind,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            schema: schema.into(),
            table: table.into(),
            columns: Vec::new(),
            references: None,
            deferrable: false,
            initially_deferred: false,
            expression: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDef {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Access method, `btree` unless `USING` says otherwise.
    pub method: String,
}

/// `schema.table.column` a sequence is owned by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.table, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceDef {
    pub schema: String,
    pub name: String,
    pub data_type: String,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cycle: bool,
    pub owned_by: Option<ColumnRef>,
}

impl SequenceDef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            data_type: "bigint".to_string(),
            start: None,
            increment: None,
            min_value: None,
            max_value: None,
            cycle: false,
            owned_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDef {
    pub name: String,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumTypeDef {
    pub schema: String,
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDef {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub event: RuleEvent,
    pub instead: bool,
}

/// Per-kind entity counts of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub tables: usize,
    pub columns: usize,
    pub constraints: usize,
    pub indexes: usize,
    pub sequences: usize,
    pub extensions: usize,
    pub enum_types: usize,
    pub rules: usize,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} table(s), {} column(s), {} constraint(s), {} index(es), {} sequence(s), \
             {} extension(s), {} enum type(s), {} rule(s)",
            self.tables,
            self.columns,
            self.constraints,
            self.indexes,
            self.sequences,
            self.extensions,
            self.enum_types,
            self.rules
        )
    }
}

/// `schema → name → position` lookup into one of the model's containers.
type NameIndex = HashMap<String, HashMap<String, usize>>;

/// Everything extracted from one dump.
///
/// Only the parser mutates a model; callers get read-only accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaModel {
    pg_version: Option<String>,
    tables: Vec<TableDef>,
    constraints: Vec<ConstraintDef>,
    indexes: Vec<IndexDef>,
    sequences: Vec<SequenceDef>,
    extensions: Vec<ExtensionDef>,
    enum_types: Vec<EnumTypeDef>,
    rules: Vec<RuleDef>,
    #[serde(skip)]
    table_index: NameIndex,
    #[serde(skip)]
    sequence_index: NameIndex,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version string from the `Dumped from database version` header line.
    pub fn pg_version(&self) -> Option<&str> {
        self.pg_version.as_deref()
    }

    /// Leading numeric component of the version: `16` for `16.2 (Debian 16.2-1)`.
    pub fn pg_major_version(&self) -> Option<u32> {
        let version = self.pg_version.as_deref()?;
        let digits: String = version
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn constraints(&self) -> &[ConstraintDef] {
        &self.constraints
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    pub fn sequences(&self) -> &[SequenceDef] {
        &self.sequences
    }

    pub fn extensions(&self) -> &[ExtensionDef] {
        &self.extensions
    }

    pub fn enum_types(&self) -> &[EnumTypeDef] {
        &self.enum_types
    }

    pub fn rules(&self) -> &[RuleDef] {
        &self.rules
    }

    /// True when the dump produced no tables. Usually means the input was
    /// not a schema dump at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&TableDef> {
        lookup(&self.table_index, schema, name).map(|i| &self.tables[i])
    }

    pub fn sequence(&self, schema: &str, name: &str) -> Option<&SequenceDef> {
        lookup(&self.sequence_index, schema, name).map(|i| &self.sequences[i])
    }

    pub fn enum_type(&self, schema: &str, name: &str) -> Option<&EnumTypeDef> {
        self.enum_types
            .iter()
            .find(|e| e.schema == schema && e.name == name)
    }

    /// Constraints on a table in declaration order, optionally of one kind.
    pub fn constraints_for(
        &self,
        schema: &str,
        table: &str,
        kind: Option<ConstraintKind>,
    ) -> Vec<&ConstraintDef> {
        self.constraints
            .iter()
            .filter(|c| c.schema == schema && c.table == table)
            .filter(|c| kind.is_none_or(|k| c.kind == k))
            .collect()
    }

    /// Indexes on a table in declaration order.
    pub fn indexes_for(&self, schema: &str, table: &str) -> Vec<&IndexDef> {
        self.indexes
            .iter()
            .filter(|i| i.schema == schema && i.table == table)
            .collect()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            tables: self.tables.len(),
            columns: self.tables.iter().map(|t| t.columns.len()).sum(),
            constraints: self.constraints.len(),
            indexes: self.indexes.len(),
            sequences: self.sequences.len(),
            extensions: self.extensions.len(),
            enum_types: self.enum_types.len(),
            rules: self.rules.len(),
        }
    }

    // --- Mutation, parser only ---

    /// Keeps the first version seen.
    pub(crate) fn set_pg_version(&mut self, version: String) {
        if self.pg_version.is_none() {
            self.pg_version = Some(version);
        }
    }

    /// Append a table. A duplicate `(schema, name)` is kept in the container
    /// but lookups keep resolving to the first declaration.
    pub(crate) fn push_table(&mut self, table: TableDef) {
        register(
            &mut self.table_index,
            &table.schema,
            &table.name,
            self.tables.len(),
        );
        self.tables.push(table);
    }

    pub(crate) fn push_sequence(&mut self, sequence: SequenceDef) {
        register(
            &mut self.sequence_index,
            &sequence.schema,
            &sequence.name,
            self.sequences.len(),
        );
        self.sequences.push(sequence);
    }

    pub(crate) fn push_constraint(&mut self, constraint: ConstraintDef) {
        self.constraints.push(constraint);
    }

    pub(crate) fn push_index(&mut self, index: IndexDef) {
        self.indexes.push(index);
    }

    pub(crate) fn push_extension(&mut self, extension: ExtensionDef) {
        self.extensions.push(extension);
    }

    pub(crate) fn push_enum_type(&mut self, enum_type: EnumTypeDef) {
        self.enum_types.push(enum_type);
    }

    pub(crate) fn push_rule(&mut self, rule: RuleDef) {
        self.rules.push(rule);
    }

    fn column_mut(&mut self, schema: &str, table: &str, column: &str) -> Option<&mut ColumnDef> {
        let idx = lookup(&self.table_index, schema, table)?;
        self.tables[idx].column_mut(column)
    }

    /// Back-fill a column default. Returns `false` if the table or column
    /// is unknown.
    pub(crate) fn set_column_default(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
        expr: String,
    ) -> bool {
        match self.column_mut(schema, table, column) {
            Some(col) => {
                col.default_expr = Some(expr);
                true
            }
            None => false,
        }
    }

    /// Back-fill a column identity kind. Returns `false` if unknown.
    pub(crate) fn set_column_identity(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
        kind: IdentityKind,
    ) -> bool {
        match self.column_mut(schema, table, column) {
            Some(col) => {
                col.identity = Some(kind);
                true
            }
            None => false,
        }
    }

    /// Back-fill sequence ownership. Returns `false` if the sequence is unknown.
    pub(crate) fn set_sequence_owner(&mut self, schema: &str, name: &str, owner: ColumnRef) -> bool {
        match lookup(&self.sequence_index, schema, name) {
            Some(idx) => {
                self.sequences[idx].owned_by = Some(owner);
                true
            }
            None => false,
        }
    }
}

fn lookup(index: &NameIndex, schema: &str, name: &str) -> Option<usize> {
    index.get(schema)?.get(name).copied()
}

fn register(index: &mut NameIndex, schema: &str, name: &str, position: usize) {
    index
        .entry(schema.to_string())
        .or_default()
        .entry(name.to_string())
        .or_insert(position);
}
