//! Constraint clause parsing
//!
//! Shared by `ALTER TABLE ... ADD CONSTRAINT`, table-level constraints in a
//! `CREATE TABLE` body, and column-level constraints on a single column.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{ConstraintDef, ConstraintKind, ForeignKeyRef, ReferentialAction};
use crate::parser::scan::{
    IDENT, QNAME, extract_paren_content, parse_column_list, split_qualified, unquote_ident,
};

static KIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(PRIMARY\s+KEY|UNIQUE|FOREIGN\s+KEY|EXCLUDE|CHECK|REFERENCES)\b").unwrap()
});

static NAMED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?is)^\s*CONSTRAINT\s+({IDENT})\s+")).unwrap());

static REFERENCES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?is)\bREFERENCES\s+({QNAME})")).unwrap());

static ON_DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bON\s+DELETE\s+(CASCADE|SET\s+NULL|SET\s+DEFAULT|RESTRICT|NO\s+ACTION)\b")
        .unwrap()
});

static ON_UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bON\s+UPDATE\s+(CASCADE|SET\s+NULL|SET\s+DEFAULT|RESTRICT|NO\s+ACTION)\b")
        .unwrap()
});

static DEFERRABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bDEFERRABLE\b").unwrap());
static NOT_DEFERRABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNOT\s+DEFERRABLE\b").unwrap());
static INITIALLY_DEFERRED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINITIALLY\s+DEFERRED\b").unwrap());

/// The table a constraint belongs to, plus the schema unqualified
/// referenced tables resolve to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Owner<'a> {
    pub schema: &'a str,
    pub table: &'a str,
    pub current_schema: &'a str,
}

/// Parse a table-level constraint from a `CREATE TABLE` body segment:
/// `[CONSTRAINT name] PRIMARY KEY (...)`, `FOREIGN KEY (...) REFERENCES ...`, etc.
pub(crate) fn parse_table_constraint(segment: &str, owner: &Owner<'_>) -> Option<ConstraintDef> {
    let (name, clause) = match NAMED_RE.captures(segment) {
        Some(caps) => {
            let whole = caps.get(0)?;
            (unquote_ident(&caps[1]), &segment[whole.end()..])
        }
        None => (String::new(), segment),
    };
    parse_constraint_clause(name, clause, segment, owner, None)
}

/// Parse one constraint clause.
///
/// `clause` starts at the kind keyword. `flags_text` is the text scanned for
/// `DEFERRABLE` / `INITIALLY DEFERRED`; for `ADD CONSTRAINT` that is the
/// whole statement. `column` is set for column-level constraints, whose
/// column list is always that single column.
///
/// Returns `None` when the clause is not a constraint or its column list
/// or referenced table cannot be found.
pub(crate) fn parse_constraint_clause(
    name: String,
    clause: &str,
    flags_text: &str,
    owner: &Owner<'_>,
    column: Option<&str>,
) -> Option<ConstraintDef> {
    let kind_match = KIND_RE.captures(clause)?;
    let kind = ConstraintKind::parse(&kind_match[1])?;
    let after_kind = &clause[kind_match.get(0)?.end()..];

    let mut con = ConstraintDef::new(name, kind, owner.schema, owner.table);

    if kind == ConstraintKind::Check {
        let expr = extract_paren_content(after_kind)?.trim();
        con.expression = Some(expr.to_string());
    }

    con.columns = match column {
        Some(col) => vec![col.to_string()],
        None if kind == ConstraintKind::Exclude => Vec::new(),
        None => parse_column_list(extract_paren_content(after_kind)?),
    };

    if kind == ConstraintKind::ForeignKey {
        con.references = Some(parse_references(clause, owner.current_schema)?);
    }

    con.deferrable =
        DEFERRABLE_RE.is_match(flags_text) && !NOT_DEFERRABLE_RE.is_match(flags_text);
    con.initially_deferred = INITIALLY_DEFERRED_RE.is_match(flags_text);

    Some(con)
}

/// `REFERENCES table [(cols)] [ON DELETE action] [ON UPDATE action]`
fn parse_references(clause: &str, current_schema: &str) -> Option<ForeignKeyRef> {
    let caps = REFERENCES_RE.captures(clause)?;
    let target = caps.get(1)?;
    let (schema, table) = split_qualified(target.as_str(), current_schema);

    let rest = &clause[target.end()..];
    let columns = if rest.trim_start().starts_with('(') {
        extract_paren_content(rest)
            .map(parse_column_list)
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(ForeignKeyRef {
        schema,
        table,
        columns,
        on_delete: action(&ON_DELETE_RE, rest),
        on_update: action(&ON_UPDATE_RE, rest),
    })
}

fn action(re: &Regex, text: &str) -> Option<ReferentialAction> {
    re.captures(text)
        .and_then(|caps| ReferentialAction::parse(&caps[1]))
}
