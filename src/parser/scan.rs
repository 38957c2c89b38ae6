//! Text scanning primitives
//!
//! Iterative depth counters over the raw statement text: balanced
//! parenthesis extraction, top-level comma splitting, and a "top level"
//! mask used for keyword scans that must ignore nested expressions.
//! Single-quoted literals and double-quoted identifiers are skipped, so a
//! `','` or `'('` inside a string does not change depth or split.
//!
//! All delimiters are ASCII, so byte offsets found here are always valid
//! `str` slice boundaries.

use regex::{Match, Regex};

/// Identifier: either a double-quoted name (with `""` escapes) or a bare word.
pub(crate) const IDENT: &str = r#"(?:"(?:[^"]|"")+"|[\w$]+)"#;

/// Optionally schema-qualified identifier.
pub(crate) const QNAME: &str = r#"(?:"(?:[^"]|"")+"|[\w$]+)(?:\.(?:"(?:[^"]|"")+"|[\w$]+))?"#;

/// Quote state while walking a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

impl Quote {
    /// Advance the quote state over byte `b`. Returns `true` if `b` is part
    /// of quoted text (including the quote characters themselves).
    fn step(&mut self, b: u8) -> bool {
        match (*self, b) {
            (Quote::None, b'\'') => {
                *self = Quote::Single;
                true
            }
            (Quote::None, b'"') => {
                *self = Quote::Double;
                true
            }
            (Quote::None, _) => false,
            (Quote::Single, b'\'') | (Quote::Double, b'"') => {
                *self = Quote::None;
                true
            }
            _ => true,
        }
    }
}

/// Byte range `(open, close)` of the first balanced parenthesis pair:
/// `text[open]` is `(` and `text[close]` is its matching `)`.
pub(crate) fn paren_span(text: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut open = None;
    let mut quote = Quote::None;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if quote.step(b) {
            continue;
        }
        match b {
            b'(' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            b')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|o| (o, i));
                }
            }
            _ => {}
        }
    }
    None
}

/// Content strictly inside the first balanced parenthesis pair.
///
/// `extract_paren_content("numeric(10,2) NOT NULL")` is `Some("10,2")`.
pub fn extract_paren_content(text: &str) -> Option<&str> {
    paren_span(text).map(|(open, close)| &text[open + 1..close])
}

/// Split on commas at parenthesis depth zero.
///
/// Segments are returned untrimmed; a trailing empty segment is dropped.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote = Quote::None;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if quote.step(b) {
            continue;
        }
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if !text[start..].trim().is_empty() {
        parts.push(&text[start..]);
    }
    parts
}

/// For every byte of `text`, whether it sits at parenthesis depth zero and
/// outside quoted text.
pub(crate) fn top_level_mask(text: &str) -> Vec<bool> {
    let mut mask = Vec::with_capacity(text.len());
    let mut depth = 0usize;
    let mut quote = Quote::None;

    for &b in text.as_bytes() {
        if quote.step(b) {
            mask.push(false);
            continue;
        }
        match b {
            b'(' => {
                mask.push(depth == 0);
                depth += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                mask.push(depth == 0);
            }
            _ => mask.push(depth == 0),
        }
    }
    mask
}

/// Matches of `re` in `text` that start at top level.
pub(crate) fn top_level_matches<'t>(re: &Regex, text: &'t str) -> Vec<Match<'t>> {
    let mask = top_level_mask(text);
    re.find_iter(text)
        .filter(|m| mask.get(m.start()).copied().unwrap_or(false))
        .collect()
}

/// Strip double-quote wrappers from an identifier, undoubling `""`.
pub fn unquote_ident(name: &str) -> String {
    let name = name.trim();
    if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
        name[1..name.len() - 1].replace("\"\"", "\"")
    } else {
        name.to_string()
    }
}

/// Split `schema.name` (either part possibly quoted) into its parts,
/// resolving an unqualified name against `default_schema`.
pub fn split_qualified(name: &str, default_schema: &str) -> (String, String) {
    let mut quote = Quote::None;
    for (i, &b) in name.as_bytes().iter().enumerate() {
        if quote.step(b) {
            continue;
        }
        if b == b'.' {
            return (unquote_ident(&name[..i]), unquote_ident(&name[i + 1..]));
        }
    }
    (default_schema.to_string(), unquote_ident(name))
}

/// Parse `a, "B", c` (optionally wrapped in one pair of parentheses) into
/// a list of unquoted entries. Expression entries such as `lower(email)`
/// are kept whole.
pub fn parse_column_list(text: &str) -> Vec<String> {
    let mut text = text.trim();
    if let Some((0, close)) = paren_span(text)
        && close == text.len() - 1
    {
        text = &text[1..close];
    }
    split_top_level(text)
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(unquote_ident)
        .collect()
}

/// Strip a single-quoted literal: `'it''s'` → `it's`.
pub(crate) fn unquote_literal(text: &str) -> String {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        text[1..text.len() - 1].replace("''", "'")
    } else {
        text.to_string()
    }
}
