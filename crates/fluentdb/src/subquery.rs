//! Rendered subqueries.

use crate::sql::Sql;
use crate::value::Value;

/// A rendered subquery: SQL text, its bound parameters and an optional alias.
///
/// Produced by the executing verbs of a [`QueryBuilder`](crate::QueryBuilder)
/// (`get`, `get_one`, `get_value`). It carries no connection, so nothing that
/// holds one can ever be executed against the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    sql: String,
    params: Vec<Value>,
    alias: Option<String>,
}

impl SubQuery {
    pub(crate) fn new(rendered: Sql, alias: Option<String>) -> Self {
        let (sql, params) = rendered.into_parts();
        Self { sql, params, alias }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Append `(sql)` and its parameters to `out`.
    pub(crate) fn write_parenthesized(&self, out: &mut Sql) {
        out.push("(").push_raw(&self.sql, &self.params).push(")");
    }

    /// Append `(sql) alias` for use as a join target.
    pub(crate) fn write_as_table(&self, out: &mut Sql) {
        self.write_parenthesized(out);
        if let Some(alias) = &self.alias {
            out.push(" ").push(alias);
        }
    }
}
