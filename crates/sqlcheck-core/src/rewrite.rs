//! Rewriting fragments into statements the server can check without running them.
//!
//! Two statements are produced per fragment:
//!
//! | Check     | Statement                                              | Catches                    |
//! |-----------|--------------------------------------------------------|----------------------------|
//! | `Syntax`  | `DO $sqlcheck$ BEGIN RETURN; <fragment> END $sqlcheck$` | syntax errors              |
//! | `Explain` | `EXPLAIN <fragment with $N::type casts>`               | unknown relations, columns, unresolved parameter types |
//!
//! The `DO` body returns before any fragment statement runs. `EXPLAIN` without
//! `ANALYZE` plans the statement but never executes it.
//!
//! Default values are written into the `EXPLAIN` statement as quoted literals,
//! which the server types from context like any string constant. Parameters that
//! remain are bound as NULLs whose type is left to the server.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::overrides::ParamOverrides;

pub const TERMINATOR: char = ';';

const DOLLAR_TAG: &str = "sqlcheck";

/// Which kind of check a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Syntax,
    Explain,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Syntax => write!(f, "syntax"),
            CheckKind::Explain => write!(f, "explain"),
        }
    }
}

/// How one positional parameter is bound. Both kinds bind NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// The server infers the type from the surrounding expression.
    Untyped,
    /// The statement never mentions this position, so there is nothing to infer
    /// from; it is bound with a declared type instead.
    Unreferenced,
}

/// One statement to send to the database, with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckStatement {
    pub kind: CheckKind,
    pub sql: String,
    /// One entry per position `1..=n`.
    pub params: Vec<Param>,
}

/// Turns a fragment into the ordered statements that validate it. Statements
/// run in order and the first failure ends the fragment's checks.
pub trait CheckStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan(&self, fragment: &str, overrides: &ParamOverrides) -> Vec<CheckStatement>;
}

/// Syntax check first, then a planner check with parameter casts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxThenExplain;

impl CheckStrategy for SyntaxThenExplain {
    fn name(&self) -> &'static str {
        "syntax+explain"
    }

    fn plan(&self, fragment: &str, overrides: &ParamOverrides) -> Vec<CheckStatement> {
        vec![syntax_check(fragment), explain_check(fragment, overrides)]
    }
}

/// Trim trailing whitespace and make sure the fragment ends with `;`. After a
/// trailing `--` comment the terminator goes on its own line.
pub fn terminate(fragment: &str) -> String {
    let trimmed = fragment.trim_end();
    let (code, commented) = strip_trailing_comment(trimmed);
    if trimmed.ends_with(TERMINATOR) || code.trim_end().ends_with(TERMINATOR) {
        trimmed.to_string()
    } else if commented {
        format!("{trimmed}\n{TERMINATOR}")
    } else {
        format!("{trimmed}{TERMINATOR}")
    }
}

/// `sql` up to a `--` comment on its last line, and whether there was one.
fn strip_trailing_comment(sql: &str) -> (&str, bool) {
    let line_start = sql.rfind('\n').map_or(0, |i| i + 1);
    match sql[line_start..].find("--") {
        Some(offset) => (&sql[..line_start + offset], true),
        None => (sql, false),
    }
}

/// Wrap the fragment in an anonymous block that returns before its body runs.
pub fn syntax_check(fragment: &str) -> CheckStatement {
    let body = terminate(fragment);
    let tag = dollar_tag(&body);
    CheckStatement {
        kind: CheckKind::Syntax,
        sql: format!("DO {tag} BEGIN RETURN;\n{body}\nEND {tag};"),
        params: Vec::new(),
    }
}

/// `EXPLAIN` the fragment with defaults written in, type casts injected and
/// placeholders bound for every position up to the highest one left.
pub fn explain_check(fragment: &str, overrides: &ParamOverrides) -> CheckStatement {
    let body = substitute_params(&terminate(fragment), overrides);
    let params = bind_params(&positional_params(fragment), &overrides.defaults);
    CheckStatement {
        kind: CheckKind::Explain,
        sql: format!("EXPLAIN {body}"),
        params,
    }
}

/// A dollar-quote tag that does not occur in `body`.
fn dollar_tag(body: &str) -> String {
    let mut tag = format!("${DOLLAR_TAG}$");
    let mut n = 0;
    while body.contains(&tag) {
        n += 1;
        tag = format!("${DOLLAR_TAG}_{n}$");
    }
    tag
}

/// Byte range and index of each `$N` token. A `$` glued to a preceding
/// identifier character is part of that identifier, not a parameter.
fn param_tokens(sql: &str) -> Vec<(usize, usize, u32)> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let glued = i > 0 && {
            let prev = bytes[i - 1];
            prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'$'
        };
        let digits_end = bytes[i + 1..]
            .iter()
            .position(|b| !b.is_ascii_digit())
            .map_or(bytes.len(), |p| i + 1 + p);
        if !glued && digits_end > i + 1 {
            if let Ok(index) = sql[i + 1..digits_end].parse::<u32>() {
                out.push((i, digits_end, index));
            }
            i = digits_end;
        } else {
            i += 1;
        }
    }
    out
}

/// Distinct positional parameter indices referenced by the fragment.
pub fn positional_params(sql: &str) -> BTreeSet<u32> {
    param_tokens(sql)
        .into_iter()
        .map(|(_, _, index)| index)
        .filter(|index| *index > 0)
        .collect()
}

/// Rewrite every `$N` token: a default replaces it with a quoted literal, a type
/// override appends `::<type>`.
pub fn substitute_params(sql: &str, overrides: &ParamOverrides) -> String {
    if overrides.types.is_empty() && overrides.defaults.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for (start, end, index) in param_tokens(sql) {
        out.push_str(&sql[last..start]);
        match overrides.defaults.get(&index) {
            Some(value) => out.push_str(&sql_literal(value)),
            None => out.push_str(&sql[start..end]),
        }
        if let Some(ty) = overrides.types.get(&index) {
            out.push_str("::");
            out.push_str(ty);
        }
        last = end;
    }
    out.push_str(&sql[last..]);
    out
}

/// A default as a string constant of unknown type. `NULL` stays a bare keyword.
pub fn sql_literal(value: &Value) -> String {
    let text = match value {
        Value::Null => return "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let quoted = text.replace('\'', "''");
    if quoted.contains('\\') {
        format!("E'{}'", quoted.replace('\\', "\\\\"))
    } else {
        format!("'{quoted}'")
    }
}

/// One binding per position up to the highest parameter still in the statement.
/// Defaulted positions and gaps are unreferenced.
pub fn bind_params(params: &BTreeSet<u32>, defaults: &BTreeMap<u32, Value>) -> Vec<Param> {
    let max = params
        .iter()
        .rev()
        .find(|index| !defaults.contains_key(*index))
        .copied()
        .unwrap_or(0);
    (1..=max)
        .map(|index| {
            if params.contains(&index) && !defaults.contains_key(&index) {
                Param::Untyped
            } else {
                Param::Unreferenced
            }
        })
        .collect()
}
