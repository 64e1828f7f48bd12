//! WHERE/HAVING predicate accumulation and rendering.
//!
//! A clause group is an ordered list of [`Condition`] tuples
//! `(connective, expression, operator, value)`. The first tuple of a group
//! always carries [`Connective::None`], so the rendered clause never starts
//! with a dangling `AND`/`OR`.
//!
//! Rendering dispatches on the operator family:
//!
//! | operator | value | output |
//! |---|---|---|
//! | `IN`, `NOT IN` | list | `expr IN (?, ?, ...)` |
//! | `IN`, `NOT IN` | subquery | `expr IN (<sql>)` |
//! | `BETWEEN`, `NOT BETWEEN` | two-element list | `expr BETWEEN ? AND ?` |
//! | `EXISTS`, `NOT EXISTS` | subquery | `EXISTS (<sql>)` |
//! | other | literal | `expr op ?` |
//! | other | null / absent | `expr op NULL` |
//! | other | list | `expr` (the expression carries one `?` per value) |

use crate::error::{DbError, DbResult};
use crate::operand::Operand;
use crate::sql::{Sql, count_placeholders};
use crate::value::Value;

/// Boolean connective joining a condition to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    /// First condition of a clause group.
    None,
    And,
    Or,
}

impl Connective {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::None => "",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Which clause group a condition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Where,
    Having,
}

impl ClauseKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Where => "WHERE",
            Self::Having => "HAVING",
        }
    }
}

/// A single predicate tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub connective: Connective,
    pub expression: String,
    pub operator: String,
    pub value: Operand,
}

/// Append a condition to a clause group, forcing an empty connective on the
/// first entry.
pub(crate) fn push_condition(
    group: &mut Vec<Condition>,
    connective: Connective,
    expression: impl Into<String>,
    operator: impl Into<String>,
    value: Operand,
) {
    let connective = if group.is_empty() {
        Connective::None
    } else if connective == Connective::None {
        Connective::And
    } else {
        connective
    };
    let operator = operator.into();
    group.push(Condition {
        connective,
        expression: expression.into(),
        operator: if operator.trim().is_empty() {
            "=".to_string()
        } else {
            operator
        },
        value,
    });
}

/// Render `<keyword> cond [AND|OR cond ...]`, or nothing for an empty group.
pub(crate) fn render_group(
    sql: &mut Sql,
    keyword: &str,
    group: &[Condition],
) -> DbResult<()> {
    if group.is_empty() {
        return Ok(());
    }
    sql.push(" ").push(keyword);
    render_conditions(sql, group)
}

/// Render a list of conditions joined by their connectives.
pub(crate) fn render_conditions(sql: &mut Sql, group: &[Condition]) -> DbResult<()> {
    for cond in group {
        match cond.connective {
            Connective::None => {}
            other => {
                sql.push(" ").push(other.as_sql());
            }
        }
        sql.push(" ");
        render_condition(sql, cond)?;
    }
    Ok(())
}

/// Render one condition without its connective.
pub(crate) fn render_condition(sql: &mut Sql, cond: &Condition) -> DbResult<()> {
    let op_upper = cond.operator.trim().to_uppercase();
    let op = cond.operator.trim();
    match op_upper.as_str() {
        "IN" | "NOT IN" => render_in(sql, cond, op, &op_upper),
        "BETWEEN" | "NOT BETWEEN" => render_between(sql, cond, op),
        "EXISTS" | "NOT EXISTS" if !cond.expression.trim().is_empty() => {
            Err(DbError::validation(format!(
                "{op_upper} takes no left-hand expression, got '{}'",
                cond.expression
            )))
        }
        "EXISTS" | "NOT EXISTS" => match &cond.value {
            Operand::Subquery(sub) => {
                sql.push(op).push(" ");
                sub.write_parenthesized(sql);
                Ok(())
            }
            other => Err(DbError::validation(format!(
                "{op_upper} requires a subquery, got {}",
                other.shape()
            ))),
        },
        _ => render_default(sql, cond, op),
    }
}

fn render_in(sql: &mut Sql, cond: &Condition, op: &str, op_upper: &str) -> DbResult<()> {
    let values: &[Value] = match &cond.value {
        Operand::Subquery(sub) => {
            sql.push(&cond.expression).push(" ").push(op).push(" ");
            sub.write_parenthesized(sql);
            return Ok(());
        }
        Operand::List(values) => values,
        Operand::Literal(v) => std::slice::from_ref(v),
        other => {
            return Err(DbError::validation(format!(
                "{op_upper} on '{}' requires a list or subquery, got {}",
                cond.expression,
                other.shape()
            )));
        }
    };
    if values.is_empty() {
        // Empty list: IN never matches, NOT IN always does.
        sql.push(if op_upper == "IN" { "1=0" } else { "1=1" });
        return Ok(());
    }
    sql.push(&cond.expression).push(" ").push(op).push(" (");
    sql.push_bind_list(values.iter().cloned());
    sql.push(")");
    Ok(())
}

fn render_between(sql: &mut Sql, cond: &Condition, op: &str) -> DbResult<()> {
    match &cond.value {
        Operand::List(values) if values.len() == 2 => {
            sql.push(&cond.expression).push(" ").push(op).push(" ");
            sql.push_bind(values[0].clone())
                .push(" AND ")
                .push_bind(values[1].clone());
            Ok(())
        }
        other => Err(DbError::validation(format!(
            "{} on '{}' requires exactly two values, got {}",
            op.to_uppercase(),
            cond.expression,
            match other {
                Operand::List(values) => format!("{} values", values.len()),
                shape => shape.shape().to_string(),
            }
        ))),
    }
}

fn render_default(sql: &mut Sql, cond: &Condition, op: &str) -> DbResult<()> {
    sql.push(&cond.expression);
    match &cond.value {
        Operand::List(values) => {
            let placeholders = count_placeholders(&cond.expression);
            if placeholders != values.len() {
                return Err(DbError::validation(format!(
                    "'{}' has {placeholders} placeholders for {} values; use IN for lists",
                    cond.expression,
                    values.len()
                )));
            }
            sql.bind_only(values.iter().cloned());
        }
        Operand::Absent | Operand::Literal(Value::Null) => {
            sql.push(" ").push(op).push(" NULL");
        }
        Operand::Literal(v) => {
            sql.push(" ").push(op).push(" ").push_bind(v.clone());
        }
        Operand::Subquery(sub) => {
            sql.push(" ").push(op).push(" ");
            sub.write_parenthesized(sql);
        }
        Operand::Raw(raw) => {
            sql.push(" ").push(op).push(" ").push_raw(&raw.sql, &raw.params);
        }
        other => {
            return Err(DbError::validation(format!(
                "{} cannot be used in a condition on '{}'",
                other.shape(),
                cond.expression
            )));
        }
    }
    Ok(())
}
