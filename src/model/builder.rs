//! Test harness for building schema models
//!
//! A fluent API for constructing a `SchemaModel` directly, without going
//! through the dump parser.
//!
//! # Example
//!
//! ```rust,ignore
//! let model = ModelBuilder::new()
//!     .table("public", "orders", |t| {
//!         t.column("id", "integer", true)
//!          .column("customer_id", "integer", false)
//!          .pk(&["id"])
//!          .fk("orders_customer_fk", &["customer_id"], "public", "customers", &["id"])
//!          .index("orders_customer_idx", &["customer_id"], false);
//!     })
//!     .build();
//! ```

use crate::model::types::{
    ColumnDef, ConstraintDef, ConstraintKind, ForeignKeyRef, IndexDef, SchemaModel, SequenceDef,
    TableDef,
};

/// Builder for constructing a SchemaModel in tests
pub struct ModelBuilder {
    model: SchemaModel,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            model: SchemaModel::new(),
        }
    }

    /// Add a table. The closure receives a TableBuilder to configure
    /// columns, constraints, and indexes.
    pub fn table(mut self, schema: &str, name: &str, f: impl FnOnce(&mut TableBuilder)) -> Self {
        let mut builder = TableBuilder::new(schema, name);
        f(&mut builder);
        let (table, constraints, indexes) = builder.build();
        self.model.push_table(table);
        for constraint in constraints {
            self.model.push_constraint(constraint);
        }
        for index in indexes {
            self.model.push_index(index);
        }
        self
    }

    pub fn sequence(mut self, sequence: SequenceDef) -> Self {
        self.model.push_sequence(sequence);
        self
    }

    pub fn build(self) -> SchemaModel {
        self.model
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a table and the constraints and indexes attached to it
pub struct TableBuilder {
    table: TableDef,
    constraints: Vec<ConstraintDef>,
    indexes: Vec<IndexDef>,
}

impl TableBuilder {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            table: TableDef::new(schema, name),
            constraints: vec![],
            indexes: vec![],
        }
    }

    /// Add a column without a default value
    pub fn column(&mut self, name: &str, data_type: &str, not_null: bool) -> &mut Self {
        let mut col = ColumnDef::new(name, data_type);
        col.not_null = not_null;
        self.table.columns.push(col);
        self
    }

    /// Add a column with a default expression
    pub fn column_with_default(&mut self, name: &str, data_type: &str, default: &str) -> &mut Self {
        let mut col = ColumnDef::new(name, data_type);
        col.default_expr = Some(default.to_string());
        self.table.columns.push(col);
        self
    }

    /// Add an index
    pub fn index(&mut self, name: &str, columns: &[&str], unique: bool) -> &mut Self {
        self.indexes.push(IndexDef {
            name: name.to_string(),
            schema: self.table.schema.clone(),
            table: self.table.name.clone(),
            columns: to_strings(columns),
            unique,
            method: "btree".to_string(),
        });
        self
    }

    /// Add a primary key constraint
    pub fn pk(&mut self, columns: &[&str]) -> &mut Self {
        let name = format!("{}_pkey", self.table.name);
        self.constraint(&name, ConstraintKind::PrimaryKey, columns)
    }

    /// Add a unique constraint
    pub fn unique(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.constraint(name, ConstraintKind::Unique, columns)
    }

    /// Add a foreign key constraint
    pub fn fk(
        &mut self,
        name: &str,
        columns: &[&str],
        ref_schema: &str,
        ref_table: &str,
        ref_columns: &[&str],
    ) -> &mut Self {
        let mut con = self.make_constraint(name, ConstraintKind::ForeignKey, columns);
        con.references = Some(ForeignKeyRef {
            schema: ref_schema.to_string(),
            table: ref_table.to_string(),
            columns: to_strings(ref_columns),
            on_delete: None,
            on_update: None,
        });
        self.constraints.push(con);
        self
    }

    fn constraint(&mut self, name: &str, kind: ConstraintKind, columns: &[&str]) -> &mut Self {
        let con = self.make_constraint(name, kind, columns);
        self.constraints.push(con);
        self
    }

    fn make_constraint(&self, name: &str, kind: ConstraintKind, columns: &[&str]) -> ConstraintDef {
        let mut con = ConstraintDef::new(name, kind, &self.table.schema, &self.table.name);
        con.columns = to_strings(columns);
        con
    }

    pub fn build(self) -> (TableDef, Vec<ConstraintDef>, Vec<IndexDef>) {
        (self.table, self.constraints, self.indexes)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_builder_basic() {
        let model = ModelBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", true).pk(&["id"]);
            })
            .build();

        let table = model.table("public", "users").unwrap();
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].name, "id");
        assert!(table.columns[0].not_null);

        let pks = model.constraints_for("public", "users", Some(ConstraintKind::PrimaryKey));
        assert_eq!(pks.len(), 1);
        assert_eq!(pks[0].name, "users_pkey");
    }

    #[test]
    fn test_model_builder_default_column() {
        let model = ModelBuilder::new()
            .table("public", "events", |t| {
                t.column_with_default("created_at", "timestamptz", "now()");
            })
            .build();

        let col = model.table("public", "events").unwrap().column("created_at").unwrap();
        assert_eq!(col.default_expr.as_deref(), Some("now()"));
        assert!(!col.not_null);
    }
}
