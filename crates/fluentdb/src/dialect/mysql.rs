use super::{Dialect, Interval, Limit, StatementKind, push_assignments, render_limit_offset};
use crate::error::{DbError, DbResult};
use crate::sql::Sql;

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

const OPTIONS: &[&str] = &[
    "ALL",
    "DISTINCT",
    "DISTINCTROW",
    "HIGH_PRIORITY",
    "STRAIGHT_JOIN",
    "SQL_SMALL_RESULT",
    "SQL_BIG_RESULT",
    "SQL_BUFFER_RESULT",
    "SQL_CACHE",
    "SQL_NO_CACHE",
    "SQL_CALC_FOUND_ROWS",
    "LOW_PRIORITY",
    "IGNORE",
    "QUICK",
    "MYSQLI_NESTJOIN",
    "FOR UPDATE",
    "LOCK IN SHARE MODE",
];

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn render_limit(
        &self,
        sql: &mut Sql,
        limit: Limit,
        kind: StatementKind,
        _has_order_by: bool,
    ) -> DbResult<()> {
        if matches!(limit, Limit::Range { .. })
            && matches!(kind, StatementKind::Update | StatementKind::Delete)
        {
            return Err(DbError::unsupported(self.name(), "OFFSET on UPDATE/DELETE"));
        }
        render_limit_offset(sql, limit);
        Ok(())
    }

    fn supports_native_row_count(&self) -> bool {
        true
    }

    fn native_row_count_query(&self) -> Option<&'static str> {
        Some("SELECT FOUND_ROWS()")
    }

    fn query_options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn random_function(&self) -> &'static str {
        "RAND()"
    }

    fn now_function(&self) -> &'static str {
        "NOW()"
    }

    fn render_interval(&self, base: Option<&str>, interval: Interval) -> String {
        let base = base.unwrap_or("NOW()");
        let sign = if interval.amount < 0 { '-' } else { '+' };
        format!(
            "{base} {sign} INTERVAL {} {}",
            interval.amount.unsigned_abs(),
            interval.unit.as_sql()
        )
    }

    fn render_negation(&self, column: &str) -> String {
        format!("!{column}")
    }

    fn render_field_order(&self, expr: &str, values: &[&str]) -> String {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("\"{}\"", self.escape_literal(v)))
            .collect();
        format!("FIELD({expr}, {})", quoted.join(","))
    }

    fn render_upsert(
        &self,
        sql: &mut Sql,
        assignments: &[Sql],
        identity: Option<&str>,
    ) -> DbResult<()> {
        sql.push(" ON DUPLICATE KEY UPDATE ");
        if let Some(id) = identity {
            let quoted = self.quote_identifier(id);
            sql.push(&format!("{quoted} = LAST_INSERT_ID({quoted})"));
            if !assignments.is_empty() {
                sql.push(", ");
            }
        }
        push_assignments(sql, assignments);
        Ok(())
    }

    fn supports_replace(&self) -> bool {
        true
    }

    fn escape_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\x1a' => out.push_str("\\Z"),
                '\\' | '\'' | '"' => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        out
    }
}
