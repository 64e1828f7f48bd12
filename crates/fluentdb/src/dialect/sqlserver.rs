use super::{Dialect, Interval, IntervalUnit, Limit, StatementKind};
use crate::error::{DbError, DbResult};
use crate::sql::Sql;

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

const OPTIONS: &[&str] = &["ALL", "DISTINCT"];

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn render_top(&self, limit: Limit, kind: StatementKind) -> Option<String> {
        match (limit, kind) {
            (Limit::Count(n), StatementKind::Select) => Some(format!("TOP {n}")),
            (Limit::Count(n), StatementKind::Update | StatementKind::Delete) => {
                Some(format!("TOP ({n})"))
            }
            _ => None,
        }
    }

    fn render_limit(
        &self,
        sql: &mut Sql,
        limit: Limit,
        kind: StatementKind,
        has_order_by: bool,
    ) -> DbResult<()> {
        match limit {
            // Already rendered as TOP after the statement head.
            Limit::Count(_) => Ok(()),
            Limit::Range { offset, count } => {
                if kind != StatementKind::Select {
                    return Err(DbError::unsupported(
                        self.name(),
                        "OFFSET/FETCH outside SELECT",
                    ));
                }
                if !has_order_by {
                    sql.push(" ORDER BY (SELECT NULL)");
                }
                sql.push(&format!(
                    " OFFSET {offset} ROWS FETCH NEXT {count} ROWS ONLY"
                ));
                Ok(())
            }
        }
    }

    fn query_options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn random_function(&self) -> &'static str {
        "NEWID()"
    }

    fn now_function(&self) -> &'static str {
        "GETDATE()"
    }

    fn render_interval(&self, base: Option<&str>, interval: Interval) -> String {
        let part = match interval.unit {
            IntervalUnit::Second => "second",
            IntervalUnit::Minute => "minute",
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
            IntervalUnit::Month => "month",
            IntervalUnit::Year => "year",
        };
        format!(
            "DATEADD({part}, {}, {})",
            interval.amount,
            base.unwrap_or("GETDATE()")
        )
    }

    fn render_upsert(
        &self,
        _sql: &mut Sql,
        _assignments: &[Sql],
        _identity: Option<&str>,
    ) -> DbResult<()> {
        Err(DbError::unsupported(self.name(), "on_duplicate"))
    }
}
