//! Statement segmentation
//!
//! Splits dump text into complete top-level statements. A statement ends
//! at a line whose trimmed text ends with `;`, unless that line is inside a
//! dollar-quoted region (`$$ ... $$`, `$body$ ... $body$`). Along the way
//! the segmenter tracks `search_path` so each statement carries the schema
//! that unqualified names in it resolve to, and it picks the server version
//! out of the dump header.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

static PG_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--\s*Dumped from database version\s+(.+)$").unwrap());

static SEARCH_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:SELECT\s+pg_catalog\.set_config\(\s*'search_path'\s*,\s*'([^']*)'|SET\s+search_path\s*=\s*(.+?)\s*;)",
    )
    .unwrap()
});

static DOLLAR_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\w*\$").unwrap());

/// One complete statement and the schema current when it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub sql: String,
    pub schema: String,
}

/// Result of segmenting a whole dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmented {
    pub statements: Vec<Segment>,
    /// Text after `Dumped from database version` in the first header line
    /// that carries it.
    pub pg_version: Option<String>,
}

/// Split `text` into statements. `default_schema` resolves unqualified
/// names until the dump sets its own `search_path`.
pub fn segment(text: &str, default_schema: &str) -> Segmented {
    let mut out = Segmented::default();
    let mut current_schema = default_schema.to_string();
    let mut buf: Vec<&str> = Vec::new();
    let mut dollar_tag: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();

        if dollar_tag.is_none() {
            if stripped.is_empty() {
                continue;
            }
            if stripped.starts_with("--") {
                if out.pg_version.is_none()
                    && let Some(caps) = PG_VERSION_RE.captures(stripped)
                {
                    let version = caps[1].trim_end().to_string();
                    trace!(%version, "found server version in dump header");
                    out.pg_version = Some(version);
                }
                continue;
            }
            if let Some(schema) = search_path_schema(stripped) {
                trace!(%schema, "search_path changed");
                current_schema = schema;
            }
        }

        dollar_tag = match dollar_tag {
            None => opening_dollar_tag(stripped),
            Some(tag) if stripped.contains(tag.as_str()) => None,
            open => open,
        };

        buf.push(line);

        if dollar_tag.is_none() && stripped.ends_with(';') {
            out.statements.push(Segment {
                sql: buf.join("\n"),
                schema: current_schema.clone(),
            });
            buf.clear();
        }
    }

    if !buf.is_empty() {
        out.statements.push(Segment {
            sql: buf.join("\n"),
            schema: current_schema,
        });
    }

    out
}

/// If `line` sets `search_path`, the first listed schema other than
/// `pg_catalog`. An empty list yields `None`.
fn search_path_schema(line: &str) -> Option<String> {
    let caps = SEARCH_PATH_RE.captures(line)?;
    let value = caps.get(1).or_else(|| caps.get(2))?.as_str();
    value
        .split(',')
        .map(|p| p.trim().trim_matches(|c| c == '\'' || c == '"'))
        .find(|p| !p.is_empty() && *p != "pg_catalog")
        .map(str::to_string)
}

/// The tag of a dollar-quoted region left open by `line`: the first `$tag$`
/// on the line, provided it does not appear again later on the same line.
fn opening_dollar_tag(line: &str) -> Option<String> {
    let m = DOLLAR_TAG_RE.find(line)?;
    let tag = m.as_str();
    if line[m.end()..].contains(tag) {
        None
    } else {
        Some(tag.to_string())
    }
}
