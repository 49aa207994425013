//! Named placeholder recognition.
//!
//! Repository SQL uses `:name` placeholders; PostgreSQL wants `$1`, `$2`, ... This module
//! finds the placeholders and renders positional SQL against a [`NamedParameters`] set.
//!
//! Not placeholders: anything inside quoted literals, quoted identifiers, comments or
//! `$$` bodies, `::` casts, and a colon directly after an identifier or `]`
//! (array slices such as `tags[lo:hi]`).

use super::parameters::{NamedParameters, NamedValue};
use crate::executor::LifeError;
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?s)'(?:[^']|'')*'|"(?:[^"]|"")*"|--[^\n]*|/\*.*?\*/|\$\$.*?\$\$|::"#,
        r#"|[A-Za-z0-9_\]]::?[A-Za-z0-9_]*|:([A-Za-z_][A-Za-z0-9_]*)"#,
    ))
        .expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    name: String,
    start: usize,
    end: usize,
}

/// SQL with its named placeholders located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    sql: String,
    placeholders: Vec<Placeholder>,
}

/// Positional SQL and the values for `$1..$n`, in order.
#[derive(Debug)]
pub struct RenderedSql<'p> {
    pub sql: String,
    pub values: Vec<&'p NamedValue>,
}

impl ParsedSql {
    pub fn parse(sql: &str) -> Self {
        let placeholders = PLACEHOLDER
            .captures_iter(sql)
            .filter_map(|caps| {
                caps.get(1).map(|name| Placeholder {
                    name: name.as_str().to_string(),
                    // include the leading ':'
                    start: name.start() - 1,
                    end: name.end(),
                })
            })
            .collect();

        Self {
            sql: sql.to_string(),
            placeholders,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for placeholder in &self.placeholders {
            if !names.contains(&placeholder.name.as_str()) {
                names.push(&placeholder.name);
            }
        }
        names
    }

    /// Replace every placeholder with its positional marker.
    ///
    /// A name used more than once keeps the position of its first use. Values bound with a
    /// SQL type render as `$n::type`: the value is encoded as that type and the server
    /// casts it to whatever the surrounding expression needs.
    pub fn render<'p>(&self, params: &'p NamedParameters) -> Result<RenderedSql<'p>, LifeError> {
        let names = self.parameter_names();
        let mut values = Vec::with_capacity(names.len());
        for name in &names {
            let value = params.get(name).ok_or_else(|| {
                LifeError::Binding(format!("No value supplied for the SQL parameter '{name}'"))
            })?;
            values.push(value);
        }

        let mut sql = String::with_capacity(self.sql.len() + names.len() * 4);
        let mut cursor = 0;
        for placeholder in &self.placeholders {
            let position = names
                .iter()
                .position(|n| *n == placeholder.name)
                .map_or(0, |p| p + 1);
            sql.push_str(&self.sql[cursor..placeholder.start]);
            sql.push('$');
            sql.push_str(&position.to_string());
            if let Some(sql_type) = values.get(position - 1).and_then(|v| v.sql_type.as_ref()) {
                sql.push_str("::");
                sql.push_str(sql_type.name());
            }
            cursor = placeholder.end;
        }
        sql.push_str(&self.sql[cursor..]);

        Ok(RenderedSql { sql, values })
    }
}
