//! INSERT/UPDATE payload rendering.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::operand::{ColumnSource, Operand};
use crate::sql::Sql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PayloadContext {
    Insert,
    Update,
}

/// `(col_a, col_b) VALUES (?, ?)`
pub(crate) fn render_values(dialect: &dyn Dialect, data: &[(String, Operand)]) -> DbResult<Sql> {
    let columns: Vec<String> = data.iter().map(|(c, _)| dialect.quote_column(c)).collect();
    let mut sql = Sql::new(format!("({}) VALUES (", columns.join(", ")));
    for (i, (column, value)) in data.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_sql(&render_value(dialect, column, value, PayloadContext::Insert)?);
    }
    sql.push(")");
    Ok(sql)
}

/// `col = value`, quoting only the trailing part of a dot-qualified column.
pub(crate) fn render_assignment(
    dialect: &dyn Dialect,
    column: &str,
    value: &Operand,
) -> DbResult<Sql> {
    let mut sql = Sql::new(format!("{} = ", dialect.quote_column(column)));
    sql.push_sql(&render_value(dialect, column, value, PayloadContext::Update)?);
    Ok(sql)
}

fn render_value(
    dialect: &dyn Dialect,
    column: &str,
    value: &Operand,
    ctx: PayloadContext,
) -> DbResult<Sql> {
    let mut sql = Sql::empty();
    match value {
        Operand::Literal(v) => {
            sql.push_bind(v.clone());
        }
        Operand::Subquery(sub) => sub.write_parenthesized(&mut sql),
        Operand::Raw(raw) => {
            sql.push_raw(&raw.sql, &raw.params);
        }
        Operand::Increment(n) | Operand::Decrement(n) => {
            if ctx == PayloadContext::Insert {
                return Err(DbError::payload(
                    column,
                    "increment/decrement only applies to UPDATE",
                ));
            }
            if !n.is_finite() {
                return Err(DbError::payload(column, format!("increment amount {n} is not finite")));
            }
            let sign = if matches!(value, Operand::Increment(_)) { '+' } else { '-' };
            sql.push(&format!("{} {sign} {n}", dialect.quote_column(column)));
        }
        Operand::SetFromColumn(source) => {
            let target = match source {
                ColumnSource::Column(name) => name.as_str(),
                ColumnSource::SameColumn if ctx == PayloadContext::Update => column,
                ColumnSource::SameColumn => {
                    return Err(DbError::payload(
                        column,
                        "an inserted row has no current value to refer to",
                    ));
                }
            };
            sql.push(&dialect.render_negation(target));
        }
        Operand::List(_) | Operand::Absent => {
            return Err(DbError::payload(
                column,
                format!("unrecognized payload shape: {}", value.shape()),
            ));
        }
    }
    Ok(sql)
}
