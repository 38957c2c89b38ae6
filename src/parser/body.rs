//! `CREATE TABLE` body parsing
//!
//! The body (text between the table's outer parentheses) is split on
//! top-level commas. Each segment is either a table-level constraint or a
//! column definition. A column definition is `name type [clauses...]`,
//! where the clauses are found by scanning for keywords at parenthesis
//! depth zero so that `numeric(10,2)` or `DEFAULT f('NOT NULL')` are not
//! mistaken for clause boundaries.

use once_cell::sync::Lazy;
use regex::{Match, Regex};

use crate::model::{ColumnDef, ConstraintDef, IdentityKind};
use crate::parser::constraint::{Owner, parse_constraint_clause, parse_table_constraint};
use crate::parser::scan::{IDENT, paren_span, split_top_level, top_level_matches, unquote_ident};

static TABLE_CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(?:PRIMARY\s+KEY|UNIQUE|FOREIGN\s+KEY|EXCLUDE|CHECK|CONSTRAINT)\b")
        .unwrap()
});

static COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?s)^\s*({IDENT})\s+(.+)$")).unwrap());

static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(CONSTRAINT|PRIMARY\s+KEY|UNIQUE|REFERENCES|CHECK|NOT\s+NULL|NULL|DEFAULT|GENERATED|COLLATE)\b",
    )
    .unwrap()
});

static CONSTRAINT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?is)^CONSTRAINT\s+({IDENT})")).unwrap());

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^GENERATED\s+(ALWAYS|BY\s+DEFAULT)\s+AS\s+IDENTITY\b").unwrap()
});

static STORED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^GENERATED\s+ALWAYS\s+AS\s*\(").unwrap());

/// Columns and constraints declared inside one `CREATE TABLE` body, in
/// declaration order.
#[derive(Debug, Default)]
pub(crate) struct ParsedBody {
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<ConstraintDef>,
}

pub(crate) fn parse_table_body(body: &str, owner: &Owner<'_>) -> ParsedBody {
    let mut parsed = ParsedBody::default();

    for segment in split_top_level(body) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if TABLE_CONSTRAINT_RE.is_match(segment) {
            if let Some(con) = parse_table_constraint(segment, owner) {
                parsed.constraints.push(con);
            }
            continue;
        }
        if let Some(column) = parse_column(segment, owner, &mut parsed.constraints) {
            parsed.columns.push(column);
        }
    }

    parsed
}

/// Parse one column definition. Column-level constraints are appended to
/// `constraints`.
fn parse_column(
    segment: &str,
    owner: &Owner<'_>,
    constraints: &mut Vec<ConstraintDef>,
) -> Option<ColumnDef> {
    let caps = COLUMN_RE.captures(segment)?;
    let name = unquote_ident(&caps[1]);
    let rest = caps.get(2)?.as_str();

    let clauses = clause_starts(rest);
    let type_end = clauses.first().map_or(rest.len(), Match::start);
    let data_type = rest[..type_end].trim().trim_end_matches(',').trim();
    if data_type.is_empty() {
        return None;
    }

    let mut col = ColumnDef::new(name.as_str(), data_type);
    let mut pending_name: Option<String> = None;

    for (i, m) in clauses.iter().enumerate() {
        let end = clauses.get(i + 1).map_or(rest.len(), Match::start);
        let clause = rest[m.start()..end].trim();
        let keyword = normalize(m.as_str());

        match keyword.as_str() {
            "CONSTRAINT" => {
                pending_name = CONSTRAINT_NAME_RE
                    .captures(clause)
                    .map(|c| unquote_ident(&c[1]));
                continue;
            }
            "NOT NULL" => col.not_null = true,
            "NULL" | "COLLATE" => {}
            "DEFAULT" => {
                let expr = clause["DEFAULT".len()..].trim().trim_end_matches(',').trim();
                col.default_expr = (!expr.is_empty()).then(|| expr.to_string());
            }
            "GENERATED" => parse_generated(clause, &mut col),
            _ => {
                if keyword == "PRIMARY KEY" {
                    col.not_null = true;
                }
                let con_name = pending_name.take().unwrap_or_default();
                if let Some(con) =
                    parse_constraint_clause(con_name, clause, clause, owner, Some(&name))
                {
                    constraints.push(con);
                }
            }
        }
        pending_name = None;
    }

    Some(col)
}

/// Top-level clause keywords in a column's text after its name.
///
/// `DEFAULT` after `SET` / `BY` and `NULL` inside an expression belong to
/// the enclosing clause (`ON DELETE SET NULL`, `GENERATED BY DEFAULT`,
/// `DEFAULT NULL`, `CASE WHEN x IS NULL THEN NULL ELSE y END`).
fn clause_starts(rest: &str) -> Vec<Match<'_>> {
    top_level_matches(&CLAUSE_RE, rest)
        .into_iter()
        .filter(|m| {
            let keyword = normalize(m.as_str());
            let prev = previous_word(&rest[..m.start()]);
            match keyword.as_str() {
                "DEFAULT" => !matches!(prev.as_str(), "SET" | "BY"),
                "NULL" => !matches!(prev.as_str(), "SET" | "DEFAULT" | "THEN" | "ELSE" | "IS"),
                "NOT NULL" => prev != "IS",
                _ => true,
            }
        })
        .collect()
}

fn parse_generated(clause: &str, col: &mut ColumnDef) {
    if let Some(caps) = IDENTITY_RE.captures(clause) {
        col.identity = IdentityKind::parse(&caps[1]);
        return;
    }
    if STORED_RE.is_match(clause)
        && let Some((open, close)) = paren_span(clause)
        && clause[close + 1..]
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("STORED")
    {
        col.generated_expr = Some(clause[open + 1..close].trim().to_string());
    }
}

fn previous_word(text: &str) -> String {
    text.split_whitespace()
        .next_back()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

fn normalize(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstraintKind, ReferentialAction};
    use proptest::prelude::*;

    const OWNER: Owner<'static> = Owner {
        schema: "public",
        table: "orders",
        current_schema: "public",
    };

    fn parse(body: &str) -> ParsedBody {
        parse_table_body(body, &OWNER)
    }

    #[test]
    fn test_pg_dump_style_columns() {
        let body = "\n    id integer NOT NULL,\n    amount numeric(10,2),\n    \
                    created_at timestamp with time zone DEFAULT now() NOT NULL\n";
        let parsed = parse(body);
        assert_eq!(parsed.columns.len(), 3);
        assert!(parsed.constraints.is_empty());

        let id = &parsed.columns[0];
        assert_eq!(id.data_type, "integer");
        assert!(id.not_null);

        let amount = &parsed.columns[1];
        assert_eq!(amount.data_type, "numeric(10,2)");
        assert!(!amount.not_null);
        assert!(amount.default_expr.is_none());

        let created = &parsed.columns[2];
        assert_eq!(created.data_type, "timestamp with time zone");
        assert_eq!(created.default_expr.as_deref(), Some("now()"));
        assert!(created.not_null);
    }

    #[test]
    fn test_default_with_cast_and_quoted_keywords() {
        let parsed = parse("status text DEFAULT 'NOT NULL, really'::text NOT NULL");
        let col = &parsed.columns[0];
        assert_eq!(col.data_type, "text");
        assert_eq!(col.default_expr.as_deref(), Some("'NOT NULL, really'::text"));
        assert!(col.not_null);
    }

    #[test]
    fn test_default_null_is_a_default() {
        let parsed = parse("note text DEFAULT NULL");
        assert_eq!(parsed.columns[0].default_expr.as_deref(), Some("NULL"));
        assert!(!parsed.columns[0].not_null);
    }

    #[test]
    fn test_case_default_keeps_inner_nulls() {
        let parsed = parse(
            "flag text DEFAULT CASE WHEN (1 IS NOT NULL) THEN NULL ELSE 'x'::text END NOT NULL",
        );
        let col = &parsed.columns[0];
        assert_eq!(
            col.default_expr.as_deref(),
            Some("CASE WHEN (1 IS NOT NULL) THEN NULL ELSE 'x'::text END")
        );
        assert!(col.not_null);

        let parsed = parse("code text DEFAULT CASE WHEN current_user IS NULL THEN 'a' ELSE NULL END");
        assert_eq!(
            parsed.columns[0].default_expr.as_deref(),
            Some("CASE WHEN current_user IS NULL THEN 'a' ELSE NULL END")
        );
        assert!(!parsed.columns[0].not_null);
    }

    #[test]
    fn test_nextval_default() {
        let parsed = parse("id bigint DEFAULT nextval('public.orders_id_seq'::regclass) NOT NULL");
        assert_eq!(
            parsed.columns[0].default_expr.as_deref(),
            Some("nextval('public.orders_id_seq'::regclass)")
        );
    }

    #[test]
    fn test_quoted_column_name() {
        let parsed = parse("\"Order Total\" numeric(12,2)");
        assert_eq!(parsed.columns[0].name, "Order Total");
        assert_eq!(parsed.columns[0].data_type, "numeric(12,2)");
    }

    #[test]
    fn test_collate_ends_data_type() {
        let parsed = parse("name character varying(100) COLLATE pg_catalog.\"C\" NOT NULL");
        assert_eq!(parsed.columns[0].data_type, "character varying(100)");
        assert!(parsed.columns[0].not_null);
    }

    #[test]
    fn test_identity_columns() {
        let parsed = parse(
            "id bigint GENERATED BY DEFAULT AS IDENTITY (START WITH 1 INCREMENT BY 1) NOT NULL, \
             n integer GENERATED ALWAYS AS IDENTITY",
        );
        assert_eq!(parsed.columns[0].identity, Some(IdentityKind::ByDefault));
        assert!(parsed.columns[0].not_null);
        assert!(parsed.columns[0].default_expr.is_none());
        assert_eq!(parsed.columns[1].identity, Some(IdentityKind::Always));
    }

    #[test]
    fn test_stored_generated_column() {
        let parsed = parse("total numeric GENERATED ALWAYS AS ((price * (qty)::numeric)) STORED");
        let col = &parsed.columns[0];
        assert_eq!(col.data_type, "numeric");
        assert_eq!(col.generated_expr.as_deref(), Some("(price * (qty)::numeric)"));
        assert!(col.identity.is_none());
    }

    #[test]
    fn test_table_level_constraints() {
        let parsed = parse(
            "id integer NOT NULL, customer_id integer, \
             CONSTRAINT orders_pkey PRIMARY KEY (id), \
             FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE SET NULL",
        );
        assert_eq!(parsed.columns.len(), 2);
        assert_eq!(parsed.constraints.len(), 2);
        assert_eq!(parsed.constraints[0].name, "orders_pkey");
        assert_eq!(parsed.constraints[0].kind, ConstraintKind::PrimaryKey);
        let fk = &parsed.constraints[1];
        assert_eq!(fk.kind, ConstraintKind::ForeignKey);
        let r = fk.references.as_ref().unwrap();
        assert_eq!(r.qualified_table(), "public.customers");
        assert_eq!(r.on_delete, Some(ReferentialAction::SetNull));
    }

    #[test]
    fn test_column_level_constraints() {
        let parsed = parse(
            "id serial PRIMARY KEY, \
             customer_id integer REFERENCES public.customers(id) ON DELETE CASCADE, \
             code text CONSTRAINT code_key UNIQUE, \
             qty integer CHECK (qty > 0)",
        );
        assert_eq!(parsed.columns.len(), 4);
        assert!(parsed.columns[0].not_null);
        assert_eq!(parsed.columns[0].data_type, "serial");
        assert_eq!(parsed.columns[1].data_type, "integer");

        let kinds: Vec<ConstraintKind> = parsed.constraints.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstraintKind::PrimaryKey,
                ConstraintKind::ForeignKey,
                ConstraintKind::Unique,
                ConstraintKind::Check
            ]
        );
        assert_eq!(parsed.constraints[0].columns, vec!["id"]);
        assert_eq!(parsed.constraints[1].columns, vec!["customer_id"]);
        assert_eq!(
            parsed.constraints[1].references.as_ref().unwrap().on_delete,
            Some(ReferentialAction::Cascade)
        );
        assert_eq!(parsed.constraints[2].name, "code_key");
        assert_eq!(parsed.constraints[3].expression.as_deref(), Some("qty > 0"));
    }

    #[test]
    fn test_segment_without_type_is_skipped() {
        let parsed = parse("id integer, orphan");
        assert_eq!(parsed.columns.len(), 1);
    }

    #[test]
    fn test_empty_body() {
        let parsed = parse("\n");
        assert!(parsed.columns.is_empty());
        assert!(parsed.constraints.is_empty());
    }

    proptest! {
        #[test]
        fn prop_column_count_matches_declarations(
            cols in prop::collection::vec(
                (
                    "[a-z][a-z0-9_]{0,10}",
                    prop::sample::select(vec![
                        "integer",
                        "text",
                        "numeric(10,2)",
                        "character varying(64)",
                        "timestamp with time zone",
                    ]),
                    any::<bool>(),
                ),
                1..16,
            )
        ) {
            let body = cols
                .iter()
                .map(|(name, ty, nn)| {
                    format!("    c_{name} {ty}{}", if *nn { " NOT NULL" } else { "" })
                })
                .collect::<Vec<_>>()
                .join(",\n");
            let parsed = parse(&body);
            prop_assert_eq!(parsed.columns.len(), cols.len());
            prop_assert!(parsed.constraints.is_empty());
            for (col, (_, ty, nn)) in parsed.columns.iter().zip(&cols) {
                prop_assert_eq!(col.data_type.as_str(), *ty);
                prop_assert_eq!(col.not_null, *nn);
            }
        }
    }
}
