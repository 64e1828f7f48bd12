use super::{Dialect, Interval, Limit, StatementKind, push_assignments, render_limit_offset};
use crate::error::{DbError, DbResult};
use crate::sql::Sql;

/// Generic ANSI SQL (PostgreSQL, SQLite).
#[derive(Debug, Clone, Copy, Default)]
pub struct Ansi;

const OPTIONS: &[&str] = &["ALL", "DISTINCT", "FOR UPDATE"];

impl Dialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn render_limit(
        &self,
        sql: &mut Sql,
        limit: Limit,
        kind: StatementKind,
        _has_order_by: bool,
    ) -> DbResult<()> {
        if matches!(kind, StatementKind::Update | StatementKind::Delete) {
            return Err(DbError::unsupported(
                self.name(),
                "LIMIT on UPDATE/DELETE",
            ));
        }
        render_limit_offset(sql, limit);
        Ok(())
    }

    fn query_options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn random_function(&self) -> &'static str {
        "RANDOM()"
    }

    fn now_function(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn render_interval(&self, base: Option<&str>, interval: Interval) -> String {
        let base = base.unwrap_or("CURRENT_TIMESTAMP");
        let sign = if interval.amount < 0 { '-' } else { '+' };
        format!(
            "{base} {sign} INTERVAL '{} {}'",
            interval.amount.unsigned_abs(),
            interval.unit.as_sql().to_lowercase()
        )
    }

    fn render_upsert(
        &self,
        sql: &mut Sql,
        assignments: &[Sql],
        identity: Option<&str>,
    ) -> DbResult<()> {
        let Some(identity) = identity else {
            return Err(DbError::validation(
                "on_duplicate needs a conflict column on ANSI dialects",
            ));
        };
        sql.push(&format!(" ON CONFLICT ({})", self.quote_identifier(identity)));
        if assignments.is_empty() {
            sql.push(" DO NOTHING");
        } else {
            sql.push(" DO UPDATE SET ");
            push_assignments(sql, assignments);
        }
        Ok(())
    }

    fn supports_returning(&self) -> bool {
        true
    }
}
