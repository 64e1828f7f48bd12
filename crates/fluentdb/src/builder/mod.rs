//! Fluent statement builder.
//!
//! [`QueryBuilder`] owns the per-statement state (conditions, joins, grouping,
//! ordering, query options, upsert columns). The fluent surface lives on the
//! [`Clauses`] trait so the same calls work on a connection-less builder and on
//! a [`Db`](crate::Db).
//!
//! State is taken out of the builder (and therefore reset) before a statement
//! is rendered, so a failed render or a failed execution never leaks
//! predicates into the next statement.
//!
//! # Example
//!
//! ```ignore
//! use fluentdb::prelude::*;
//!
//! let active = db
//!     .subquery(None)
//!     .where_("active", 1)
//!     .get("users", None, &["id"])?;
//!
//! let rows = db
//!     .where_op("user_id", "IN", active)
//!     .order_by("created_at", "DESC")?
//!     .get("orders", Limit::Count(10), &[])
//!     .await?;
//! ```

mod data;
mod render;

#[cfg(test)]
mod tests;

pub(crate) use render::Renderer;

use crate::condition::{ClauseKind, Condition, Connective, push_condition};
use crate::dialect::{Dialect, DialectKind, Interval, IntervalUnit, Limit, StatementKind};
use crate::error::{DbError, DbResult};
use crate::operand::Operand;
use crate::subquery::SubQuery;
use crate::value::Value;
use regex::Regex;
use std::sync::OnceLock;

fn order_by_sanitizer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[^-a-zA-Z0-9_.(),*'"`]+"#).expect("invalid built-in order-by regex")
    })
}

fn group_by_sanitizer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[^-a-zA-Z0-9_.(),* <>=!]+").expect("invalid built-in group-by regex")
    })
}

fn interval_spec() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([+-]?)\s?([0-9]+)\s?([a-zA-Z]?)\s*$")
            .expect("invalid built-in interval regex")
    })
}

const JOIN_TYPES: &[&str] = &[
    "LEFT",
    "RIGHT",
    "OUTER",
    "INNER",
    "LEFT OUTER",
    "RIGHT OUTER",
    "",
];

/// Row-locking options rendered at the end of a SELECT.
pub(crate) const LOCK_OPTIONS: &[&str] = &["FOR UPDATE", "LOCK IN SHARE MODE"];

/// Target of a JOIN: a table name (optionally with alias) or a subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    Table(String),
    Subquery(SubQuery),
}

impl From<&str> for JoinTarget {
    fn from(v: &str) -> Self {
        JoinTarget::Table(v.to_string())
    }
}

impl From<String> for JoinTarget {
    fn from(v: String) -> Self {
        JoinTarget::Table(v)
    }
}

impl From<SubQuery> for JoinTarget {
    fn from(v: SubQuery) -> Self {
        JoinTarget::Subquery(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub join_type: String,
    pub target: JoinTarget,
    pub condition: String,
    /// Extra predicates appended to the ON condition by `join_where`.
    pub extra: Vec<Condition>,
}

impl Join {
    fn matches(&self, table: &str) -> bool {
        match &self.target {
            JoinTarget::Table(t) => t == table,
            JoinTarget::Subquery(sub) => sub.alias() == Some(table),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Upsert {
    pub columns: Vec<String>,
    pub identity: Option<String>,
    pub overrides: Vec<(String, Operand)>,
}

/// Everything one statement accumulates before it is rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StatementState {
    pub wheres: Vec<Condition>,
    pub havings: Vec<Condition>,
    pub joins: Vec<Join>,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, String)>,
    pub options: Vec<String>,
    pub with_total_count: bool,
    pub upsert: Option<Upsert>,
    pub returning: Option<String>,
}

impl StatementState {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// A connection-less statement builder.
///
/// Obtained from [`Db::subquery`](crate::Db::subquery) or
/// [`Db::copy`](crate::Db::copy), or built directly with [`QueryBuilder::new`].
/// Its "executing" verbs render a [`SubQuery`] instead of running anything.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    dialect: DialectKind,
    prefix: String,
    alias: Option<String>,
    pub(crate) state: StatementState,
}

impl QueryBuilder {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            prefix: String::new(),
            alias: None,
            state: StatementState::default(),
        }
    }

    /// Set the table prefix applied to unqualified table names.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = prefix.into();
        self
    }

    /// Alias used when the rendered subquery is a JOIN target.
    pub fn set_alias(&mut self, alias: Option<String>) -> &mut Self {
        self.alias = alias;
        self
    }

    pub fn dialect(&self) -> DialectKind {
        self.dialect
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// True when no condition, join, grouping, ordering or option is pending.
    pub fn is_reset(&self) -> bool {
        self.state.is_empty()
    }

    /// Drop all pending statement state.
    pub fn reset(&mut self) -> &mut Self {
        self.state = StatementState::default();
        self
    }

    /// A fresh builder sharing dialect, prefix and alias but no pending state.
    pub(crate) fn fork(&self, alias: Option<String>) -> Self {
        Self {
            dialect: self.dialect,
            prefix: self.prefix.clone(),
            alias,
            state: StatementState::default(),
        }
    }

    pub(crate) fn take_state(&mut self) -> StatementState {
        std::mem::take(&mut self.state)
    }

    pub(crate) fn renderer<'a>(&'a self, state: &'a StatementState) -> Renderer<'a> {
        Renderer::new(self.dialect.strategy(), &self.prefix, state)
    }

    /// Render a SELECT as a subquery and reset the builder.
    pub fn get(
        &mut self,
        table: &str,
        limit: impl Into<Option<Limit>>,
        columns: &[&str],
    ) -> DbResult<SubQuery> {
        let state = self.take_state();
        let sql = self
            .renderer(&state)
            .select(table, limit.into(), columns, false)?;
        Ok(SubQuery::new(sql, self.alias.clone()))
    }

    /// Render a single-row SELECT as a subquery.
    pub fn get_one(&mut self, table: &str, columns: &[&str]) -> DbResult<SubQuery> {
        self.get(table, Limit::Count(1), columns)
    }

    /// Render a single-column SELECT as a subquery.
    pub fn get_value(
        &mut self,
        table: &str,
        column: &str,
        limit: impl Into<Option<Limit>>,
    ) -> DbResult<SubQuery> {
        self.get(table, limit, &[column])
    }
}

/// Fluent clause accumulation shared by [`QueryBuilder`] and [`Db`](crate::Db).
pub trait Clauses {
    fn builder(&self) -> &QueryBuilder;
    fn builder_mut(&mut self) -> &mut QueryBuilder;

    /// `AND expr = value`
    fn where_(&mut self, expr: &str, value: impl Into<Operand>) -> &mut Self {
        self.where_op(expr, "=", value)
    }

    /// `AND expr <op> value`
    fn where_op(&mut self, expr: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        add(self, ClauseKind::Where, Connective::And, expr, op, value.into())
    }

    /// `OR expr = value`
    fn or_where(&mut self, expr: &str, value: impl Into<Operand>) -> &mut Self {
        self.or_where_op(expr, "=", value)
    }

    /// `OR expr <op> value`
    fn or_where_op(&mut self, expr: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        add(self, ClauseKind::Where, Connective::Or, expr, op, value.into())
    }

    /// `AND <expr>` where `expr` carries its own `?` placeholders for `params`.
    fn where_expr(&mut self, expr: &str, params: &[Value]) -> &mut Self {
        let value = Operand::List(params.to_vec());
        add(self, ClauseKind::Where, Connective::And, expr, "=", value)
    }

    /// `OR <expr>` where `expr` carries its own `?` placeholders for `params`.
    fn or_where_expr(&mut self, expr: &str, params: &[Value]) -> &mut Self {
        let value = Operand::List(params.to_vec());
        add(self, ClauseKind::Where, Connective::Or, expr, "=", value)
    }

    /// `AND expr = value` in HAVING.
    fn having(&mut self, expr: &str, value: impl Into<Operand>) -> &mut Self {
        self.having_op(expr, "=", value)
    }

    fn having_op(&mut self, expr: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        add(self, ClauseKind::Having, Connective::And, expr, op, value.into())
    }

    fn or_having(&mut self, expr: &str, value: impl Into<Operand>) -> &mut Self {
        self.or_having_op(expr, "=", value)
    }

    fn or_having_op(&mut self, expr: &str, op: &str, value: impl Into<Operand>) -> &mut Self {
        add(self, ClauseKind::Having, Connective::Or, expr, op, value.into())
    }

    /// HAVING counterpart of [`Clauses::where_expr`].
    fn having_expr(&mut self, expr: &str, params: &[Value]) -> &mut Self {
        let value = Operand::List(params.to_vec());
        add(self, ClauseKind::Having, Connective::And, expr, "=", value)
    }

    /// `<type> JOIN target ON condition`.
    ///
    /// A condition containing `USING` is emitted as-is instead of after `ON`.
    fn join(
        &mut self,
        target: impl Into<JoinTarget>,
        condition: &str,
        join_type: &str,
    ) -> DbResult<&mut Self> {
        let join_type = join_type.trim().to_uppercase();
        if !JOIN_TYPES.contains(&join_type.as_str()) {
            return Err(DbError::InvalidJoinType(join_type));
        }
        self.builder_mut().state.joins.push(Join {
            join_type,
            target: target.into(),
            condition: condition.to_string(),
            extra: Vec::new(),
        });
        Ok(self)
    }

    /// `AND expr <op> value` appended to the ON condition of an earlier join.
    ///
    /// `table` names the join target exactly as passed to [`Clauses::join`]
    /// (or the alias of a subquery target).
    fn join_where(
        &mut self,
        table: &str,
        expr: &str,
        op: &str,
        value: impl Into<Operand>,
    ) -> DbResult<&mut Self> {
        add_join_condition(self, table, Connective::And, expr, op, value.into())?;
        Ok(self)
    }

    /// `OR expr <op> value` appended to the ON condition of an earlier join.
    fn join_or_where(
        &mut self,
        table: &str,
        expr: &str,
        op: &str,
        value: impl Into<Operand>,
    ) -> DbResult<&mut Self> {
        add_join_condition(self, table, Connective::Or, expr, op, value.into())?;
        Ok(self)
    }

    /// Add a GROUP BY expression.
    fn group_by(&mut self, expr: &str) -> &mut Self {
        let expr = group_by_sanitizer().replace_all(expr, "").into_owned();
        self.builder_mut().state.group_by.push(expr);
        self
    }

    /// Add an ORDER BY expression. An empty direction means `DESC`.
    ///
    /// `rand()` orders randomly using the dialect's random function.
    /// Ordering again by the same expression replaces its direction.
    fn order_by(&mut self, expr: &str, direction: &str) -> DbResult<&mut Self> {
        let direction = normalize_direction(direction)?;
        let expr = order_by_sanitizer().replace_all(expr, "").into_owned();
        set_order(self, expr, direction);
        Ok(self)
    }

    /// Order by an explicit list of values (`FIELD(expr, "a","b")` on MySQL).
    fn order_by_field(
        &mut self,
        expr: &str,
        direction: &str,
        values: &[&str],
    ) -> DbResult<&mut Self> {
        let direction = normalize_direction(direction)?;
        let expr = order_by_sanitizer().replace_all(expr, "").into_owned();
        let expr = self
            .builder()
            .dialect()
            .strategy()
            .render_field_order(&expr, values);
        set_order(self, expr, direction);
        Ok(self)
    }

    /// Add a dialect query option (`DISTINCT`, `SQL_NO_CACHE`, `FOR UPDATE`...).
    fn set_query_option(&mut self, option: &str) -> DbResult<&mut Self> {
        let option = self
            .builder()
            .dialect()
            .strategy()
            .check_query_option(option)?;
        let options = &mut self.builder_mut().state.options;
        if !options.contains(&option) {
            options.push(option);
        }
        Ok(self)
    }

    fn set_query_options(&mut self, options: &[&str]) -> DbResult<&mut Self> {
        for option in options {
            self.set_query_option(option)?;
        }
        Ok(self)
    }

    /// Also compute the unlimited row count of the next SELECT.
    fn with_total_count(&mut self) -> &mut Self {
        self.builder_mut().state.with_total_count = true;
        self
    }

    /// Turn the next INSERT into an upsert updating `columns` on conflict.
    ///
    /// On MySQL-like dialects `identity` keeps `LAST_INSERT_ID()` pointing at
    /// the existing row; on ANSI dialects it names the conflict column.
    fn on_duplicate(&mut self, columns: &[&str], identity: Option<&str>) -> &mut Self {
        let upsert = self
            .builder_mut()
            .state
            .upsert
            .get_or_insert_with(Upsert::default);
        upsert.columns = columns.iter().map(|c| c.to_string()).collect();
        upsert.identity = identity.map(str::to_string);
        self
    }

    /// Override the value an upsert assigns to `column`.
    fn on_duplicate_value(&mut self, column: &str, value: impl Into<Operand>) -> &mut Self {
        let upsert = self
            .builder_mut()
            .state
            .upsert
            .get_or_insert_with(Upsert::default);
        if !upsert.columns.iter().any(|c| c == column) {
            upsert.columns.push(column.to_string());
        }
        upsert.overrides.retain(|(c, _)| c != column);
        upsert.overrides.push((column.to_string(), value.into()));
        self
    }

    /// `INSERT ... RETURNING column` on dialects that support it.
    fn returning(&mut self, column: &str) -> &mut Self {
        self.builder_mut().state.returning = Some(column.to_string());
        self
    }

    /// `NOW()` shifted by an interval spec such as `"-1d"` or `"+2h"`.
    fn now(&self, diff: &str) -> DbResult<Operand> {
        Ok(Operand::raw(self.interval(diff, None)?))
    }

    /// `base` (default: the current timestamp) shifted by an interval spec.
    ///
    /// Spec format: optional sign, amount, optional unit letter among
    /// `s m h d M Y` (default `d`).
    fn interval(&self, diff: &str, base: Option<&str>) -> DbResult<String> {
        let dialect = self.builder().dialect().strategy();
        if diff.trim().is_empty() {
            return Ok(base.unwrap_or(dialect.now_function()).to_string());
        }
        let interval = parse_interval(diff)?;
        Ok(dialect.render_interval(base, interval))
    }
}

impl Clauses for QueryBuilder {
    fn builder(&self) -> &QueryBuilder {
        self
    }

    fn builder_mut(&mut self) -> &mut QueryBuilder {
        self
    }
}

fn add<'a, T: Clauses + ?Sized>(
    target: &'a mut T,
    kind: ClauseKind,
    connective: Connective,
    expr: &str,
    op: &str,
    value: Operand,
) -> &'a mut T {
    let state = &mut target.builder_mut().state;
    let group = match kind {
        ClauseKind::Where => &mut state.wheres,
        ClauseKind::Having => &mut state.havings,
    };
    push_condition(group, connective, expr, op, value);
    target
}

fn add_join_condition<T: Clauses + ?Sized>(
    target: &mut T,
    table: &str,
    connective: Connective,
    expr: &str,
    op: &str,
    value: Operand,
) -> DbResult<()> {
    let join = target
        .builder_mut()
        .state
        .joins
        .iter_mut()
        .find(|j| j.matches(table))
        .ok_or_else(|| DbError::validation(format!("join_where: no join on '{table}'")))?;
    let op = if op.trim().is_empty() { "=" } else { op };
    join.extra.push(Condition {
        connective,
        expression: expr.to_string(),
        operator: op.to_string(),
        value,
    });
    Ok(())
}

fn set_order<T: Clauses + ?Sized>(target: &mut T, expr: String, direction: String) {
    let order_by = &mut target.builder_mut().state.order_by;
    match order_by.iter_mut().find(|(e, _)| *e == expr) {
        Some(entry) => entry.1 = direction,
        None => order_by.push((expr, direction)),
    }
}

fn normalize_direction(direction: &str) -> DbResult<String> {
    let upper = direction.trim().to_uppercase();
    match upper.as_str() {
        "" => Ok("DESC".to_string()),
        "ASC" | "DESC" => Ok(upper),
        _ => Err(DbError::InvalidOrderDirection(direction.to_string())),
    }
}

pub(crate) fn parse_interval(diff: &str) -> DbResult<Interval> {
    let caps = interval_spec()
        .captures(diff)
        .ok_or_else(|| DbError::InvalidInterval(diff.to_string()))?;
    let amount: i64 = caps[2]
        .parse()
        .map_err(|_| DbError::InvalidInterval(diff.to_string()))?;
    let unit = IntervalUnit::from_letter(&caps[3])
        .ok_or_else(|| DbError::InvalidInterval(diff.to_string()))?;
    let amount = if &caps[1] == "-" { -amount } else { amount };
    Ok(Interval { amount, unit })
}

/// Apply the table prefix unless the name is already schema-qualified.
pub(crate) fn prefixed(prefix: &str, table: &str) -> String {
    let table = table.trim();
    if prefix.is_empty() || table.contains('.') {
        table.to_string()
    } else {
        format!("{prefix}{table}")
    }
}

/// Statement kinds that accept a row limit through the dialect.
pub(crate) fn top_for(
    dialect: &dyn Dialect,
    limit: Option<Limit>,
    kind: StatementKind,
) -> Option<String> {
    limit.and_then(|l| dialect.render_top(l, kind))
}
