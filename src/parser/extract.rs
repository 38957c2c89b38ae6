//! Entity extraction
//!
//! Every recognized statement shape is a [`StatementKind`]. Each kind owns
//! one anchored recognizer; [`classify`] tries them in declaration order
//! and the first one that claims a statement wins. A recognizer either
//! extracts a [`DumpStatement`], discards the statement (excluded schema,
//! malformed detail), or declines it.

use once_cell::sync::Lazy;
use regex::Regex;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::model::{
    ColumnRef, ConstraintDef, EnumTypeDef, ExtensionDef, IdentityKind, IndexDef, RuleDef,
    RuleEvent, SequenceDef, TableDef,
};
use crate::parser::ParserOptions;
use crate::parser::body::parse_table_body;
use crate::parser::constraint::{Owner, parse_constraint_clause};
use crate::parser::scan::{
    IDENT, QNAME, extract_paren_content, paren_span, parse_column_list, split_qualified,
    split_top_level, unquote_ident, unquote_literal,
};


static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+EXTENSION\s+(?:IF\s+NOT\s+EXISTS\s+)?({IDENT})(?:\s+(?:WITH\s+)?SCHEMA\s+({IDENT}))?"
    ))
    .unwrap()
});

static ENUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)^\s*CREATE\s+TYPE\s+({QNAME})\s+AS\s+ENUM\s*\(")).unwrap()
});

static SEQUENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+(?:UNLOGGED\s+)?SEQUENCE\s+(?:IF\s+NOT\s+EXISTS\s+)?({QNAME})"
    ))
    .unwrap()
});

static SEQ_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAS\s+(smallint|integer|bigint)\b").unwrap());
static SEQ_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSTART\s+(?:WITH\s+)?(-?\d+)").unwrap());
static SEQ_INCREMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINCREMENT\s+(?:BY\s+)?(-?\d+)").unwrap());
static SEQ_MIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bMINVALUE\s+(-?\d+)").unwrap());
static SEQ_MAX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bMAXVALUE\s+(-?\d+)").unwrap());
static SEQ_CYCLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCYCLE\b").unwrap());
static SEQ_NO_CYCLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNO\s+CYCLE\b").unwrap());

static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+(UNLOGGED\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?({QNAME})\s*\("
    ))
    .unwrap()
});

static INHERITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bINHERITS\s*\(").unwrap());
static PARTITION_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bPARTITION\s+BY\s+(.+?)\s*;?\s*$").unwrap());

static ADD_CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*ALTER\s+TABLE\s+(?:ONLY\s+)?({QNAME})\s+ADD\s+CONSTRAINT\s+({IDENT})\s+(PRIMARY\s+KEY|UNIQUE|FOREIGN\s+KEY|EXCLUDE|CHECK)\b"
    ))
    .unwrap()
});

static INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+(UNIQUE\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?({IDENT})\s+ON\s+(?:ONLY\s+)?({QNAME})"
    ))
    .unwrap()
});

static INDEX_METHOD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*USING\s+(\w+)").unwrap());

static SET_DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*ALTER\s+TABLE\s+(?:ONLY\s+)?({QNAME})\s+ALTER\s+COLUMN\s+({IDENT})\s+SET\s+DEFAULT\s+(.+?)\s*;?\s*$"
    ))
    .unwrap()
});

static ADD_IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*ALTER\s+TABLE\s+(?:ONLY\s+)?({QNAME})\s+ALTER\s+COLUMN\s+({IDENT})\s+ADD\s+GENERATED\s+(ALWAYS|BY\s+DEFAULT)\s+AS\s+IDENTITY\b"
    ))
    .unwrap()
});

static SEQ_OWNED_BY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*ALTER\s+SEQUENCE\s+({QNAME})\s+OWNED\s+BY\s+({QNAME})\.({IDENT})"
    ))
    .unwrap()
});

static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?RULE\s+({IDENT})\s+AS\s+ON\s+(\w+)\s+TO\s+({QNAME})"
    ))
    .unwrap()
});

static RULE_DO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bDO\s+(INSTEAD\b)?").unwrap());

/// Where unqualified names resolve and which schemas are out of scope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'a> {
    pub current_schema: &'a str,
    pub options: &'a ParserOptions,
}

/// One extracted statement, ready to be applied to a model.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DumpStatement {
    Extension(ExtensionDef),
    EnumType(EnumTypeDef),
    Sequence(SequenceDef),
    Table {
        table: TableDef,
        constraints: Vec<ConstraintDef>,
    },
    AddConstraint(ConstraintDef),
    CreateIndex(IndexDef),
    SetDefault {
        schema: String,
        table: String,
        column: String,
        expr: String,
    },
    AddIdentity {
        schema: String,
        table: String,
        column: String,
        kind: IdentityKind,
    },
    SequenceOwnedBy {
        schema: String,
        name: String,
        owner: ColumnRef,
    },
    CreateRule(RuleDef),
}

/// What a recognizer made of a statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// Not this shape.
    NoMatch,
    /// This shape, but nothing to record.
    Discarded(String),
    Extracted(DumpStatement),
}

impl Outcome {
    fn excluded(schema: &str, name: &str) -> Self {
        Outcome::Discarded(format!("{schema}.{name} is in an excluded schema"))
    }

    fn malformed(what: &str) -> Self {
        Outcome::Discarded(format!("malformed {what}"))
    }
}

/// Recognized statement shapes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub(crate) enum StatementKind {
    Extension,
    EnumType,
    Sequence,
    Table,
    AddConstraint,
    CreateIndex,
    SetDefault,
    AddIdentity,
    SequenceOwnedBy,
    CreateRule,
}

impl StatementKind {
    pub(crate) fn recognize(self, sql: &str, ctx: &Context<'_>) -> Outcome {
        match self {
            StatementKind::Extension => extension(sql, ctx),
            StatementKind::EnumType => enum_type(sql, ctx),
            StatementKind::Sequence => sequence(sql, ctx),
            StatementKind::Table => table(sql, ctx),
            StatementKind::AddConstraint => add_constraint(sql, ctx),
            StatementKind::CreateIndex => create_index(sql, ctx),
            StatementKind::SetDefault => set_default(sql, ctx),
            StatementKind::AddIdentity => add_identity(sql, ctx),
            StatementKind::SequenceOwnedBy => sequence_owned_by(sql, ctx),
            StatementKind::CreateRule => create_rule(sql, ctx),
        }
    }
}

/// Run the recognizers in order; the first that claims `sql` decides.
pub(crate) fn classify(sql: &str, ctx: &Context<'_>) -> Outcome {
    StatementKind::iter()
        .map(|kind| kind.recognize(sql, ctx))
        .find(|outcome| *outcome != Outcome::NoMatch)
        .unwrap_or(Outcome::NoMatch)
}

/// Every kind whose recognizer claims `sql`. Shapes are meant to be
/// disjoint, so this should never hold more than one entry.
pub(crate) fn matching_kinds(sql: &str, ctx: &Context<'_>) -> Vec<StatementKind> {
    StatementKind::iter()
        .filter(|kind| kind.recognize(sql, ctx) != Outcome::NoMatch)
        .collect()
}

fn extension(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = EXTENSION_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let name = unquote_ident(&caps[1]);
    let schema = caps
        .get(2)
        .map_or_else(|| "public".to_string(), |m| unquote_ident(m.as_str()));

    // Extensions installed into system schemas (plpgsql in pg_catalog) are
    // kept; only the replication extension and excluded names are dropped.
    if ctx.options.is_excluded(&name.to_ascii_lowercase()) {
        return Outcome::Discarded(format!("extension {name} is excluded"));
    }
    Outcome::Extracted(DumpStatement::Extension(ExtensionDef { name, schema }))
}

fn enum_type(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = ENUM_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, name) = split_qualified(&caps[1], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &name);
    }

    let open = caps.get(0).map_or(0, |m| m.end() - 1);
    let Some(content) = extract_paren_content(&sql[open..]) else {
        return Outcome::malformed("enum label list");
    };
    let labels = split_top_level(content)
        .into_iter()
        .map(unquote_literal)
        .filter(|l| !l.is_empty())
        .collect();

    Outcome::Extracted(DumpStatement::EnumType(EnumTypeDef {
        schema,
        name,
        labels,
    }))
}

fn sequence(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = SEQUENCE_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, name) = split_qualified(&caps[1], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &name);
    }

    let options = &sql[caps.get(0).map_or(0, |m| m.end())..];
    let mut seq = SequenceDef::new(schema, name);
    if let Some(c) = SEQ_TYPE_RE.captures(options) {
        seq.data_type = c[1].to_ascii_lowercase();
    }
    seq.start = int_option(&SEQ_START_RE, options);
    seq.increment = int_option(&SEQ_INCREMENT_RE, options);
    seq.min_value = int_option(&SEQ_MIN_RE, options);
    seq.max_value = int_option(&SEQ_MAX_RE, options);
    seq.cycle = SEQ_CYCLE_RE.is_match(options) && !SEQ_NO_CYCLE_RE.is_match(options);

    Outcome::Extracted(DumpStatement::Sequence(seq))
}

/// Integer option value; absent or out of `i64` range is `None`.
fn int_option(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}

fn table(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = TABLE_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, name) = split_qualified(&caps[2], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &name);
    }

    let open = caps.get(0).map_or(0, |m| m.end() - 1);
    let Some((body_open, body_close)) = paren_span(&sql[open..]) else {
        return Outcome::malformed("table body");
    };
    let body = &sql[open + body_open + 1..open + body_close];
    let tail = &sql[open + body_close + 1..];

    let owner = Owner {
        schema: &schema,
        table: &name,
        current_schema: ctx.current_schema,
    };
    let parsed = parse_table_body(body, &owner);

    let mut table = TableDef::new(schema.as_str(), name.as_str());
    table.unlogged = caps.get(1).is_some();
    table.columns = parsed.columns;
    if let Some(m) = INHERITS_RE.find(tail) {
        table.inherits = extract_paren_content(&tail[m.start()..])
            .map(parse_column_list)
            .unwrap_or_default()
            .iter()
            .map(|parent| {
                let (s, n) = split_qualified(parent, ctx.current_schema);
                format!("{s}.{n}")
            })
            .collect();
    }
    table.partition_by = PARTITION_BY_RE
        .captures(tail)
        .map(|c| c[1].to_string());

    Outcome::Extracted(DumpStatement::Table {
        table,
        constraints: parsed.constraints,
    })
}

fn add_constraint(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = ADD_CONSTRAINT_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, table) = split_qualified(&caps[1], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &table);
    }

    let name = unquote_ident(&caps[2]);
    let clause = &sql[caps.get(3).map_or(0, |m| m.start())..];
    let owner = Owner {
        schema: &schema,
        table: &table,
        current_schema: ctx.current_schema,
    };
    match parse_constraint_clause(name, clause, sql, &owner, None) {
        Some(con) => Outcome::Extracted(DumpStatement::AddConstraint(con)),
        None => Outcome::malformed("constraint"),
    }
}

fn create_index(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = INDEX_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, table) = split_qualified(&caps[3], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &table);
    }

    let tail = &sql[caps.get(0).map_or(0, |m| m.end())..];
    let method = INDEX_METHOD_RE
        .captures(tail)
        .map_or_else(|| "btree".to_string(), |c| c[1].to_ascii_lowercase());
    let Some(columns) = extract_paren_content(tail) else {
        return Outcome::malformed("index column list");
    };

    Outcome::Extracted(DumpStatement::CreateIndex(IndexDef {
        name: unquote_ident(&caps[2]),
        schema,
        table,
        columns: parse_column_list(columns),
        unique: caps.get(1).is_some(),
        method,
    }))
}

fn set_default(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = SET_DEFAULT_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, table) = split_qualified(&caps[1], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &table);
    }
    Outcome::Extracted(DumpStatement::SetDefault {
        schema,
        table,
        column: unquote_ident(&caps[2]),
        expr: caps[3].to_string(),
    })
}

fn add_identity(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = ADD_IDENTITY_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, table) = split_qualified(&caps[1], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &table);
    }
    let Some(kind) = IdentityKind::parse(&caps[3]) else {
        return Outcome::malformed("identity kind");
    };
    Outcome::Extracted(DumpStatement::AddIdentity {
        schema,
        table,
        column: unquote_ident(&caps[2]),
        kind,
    })
}

fn sequence_owned_by(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = SEQ_OWNED_BY_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, name) = split_qualified(&caps[1], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &name);
    }
    let (table_schema, table) = split_qualified(&caps[2], ctx.current_schema);
    Outcome::Extracted(DumpStatement::SequenceOwnedBy {
        schema,
        name,
        owner: ColumnRef {
            schema: table_schema,
            table,
            column: unquote_ident(&caps[3]),
        },
    })
}

fn create_rule(sql: &str, ctx: &Context<'_>) -> Outcome {
    let Some(caps) = RULE_RE.captures(sql) else {
        return Outcome::NoMatch;
    };
    let (schema, table) = split_qualified(&caps[3], ctx.current_schema);
    if ctx.options.is_excluded(&schema) {
        return Outcome::excluded(&schema, &table);
    }
    let Some(event) = RuleEvent::parse(&caps[2]) else {
        return Outcome::malformed("rule event");
    };
    let tail = &sql[caps.get(0).map_or(0, |m| m.end())..];
    let Some(action) = RULE_DO_RE.captures(tail) else {
        return Outcome::malformed("rule action");
    };

    Outcome::Extracted(DumpStatement::CreateRule(RuleDef {
        schema,
        table,
        name: unquote_ident(&caps[1]),
        event,
        instead: action.get(1).is_some(),
    }))
}
