//! Clause renderer: statement state + dialect -> SQL text and parameters.
//!
//! Steps run in a fixed order and each is skipped when its state is empty:
//! head, joins, WHERE, GROUP BY, HAVING, ORDER BY, limit, row locking.

use super::data::{render_assignment, render_values};
use super::{JoinTarget, LOCK_OPTIONS, StatementState, prefixed, top_for};
use crate::condition::{ClauseKind, render_condition, render_group};
use crate::dialect::{Dialect, Limit, StatementKind};
use crate::error::{DbError, DbResult};
use crate::operand::Operand;
use crate::sql::Sql;

/// Alias of the derived table wrapped around grouped/distinct count probes.
const PROBE_ALIAS: &str = "total_count_probe";

pub(crate) struct Renderer<'a> {
    dialect: &'static dyn Dialect,
    prefix: &'a str,
    state: &'a StatementState,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(
        dialect: &'static dyn Dialect,
        prefix: &'a str,
        state: &'a StatementState,
    ) -> Self {
        Self {
            dialect,
            prefix,
            state,
        }
    }

    /// `SELECT [options] [TOP n] columns FROM table ...`
    ///
    /// `calc_found_rows` adds the dialect's native total-count option.
    pub(crate) fn select(
        &self,
        table: &str,
        limit: Option<Limit>,
        columns: &[&str],
        calc_found_rows: bool,
    ) -> DbResult<Sql> {
        let mut head = self.head("SELECT", StatementKind::Select, limit);
        if calc_found_rows && !self.state.has_option("SQL_CALC_FOUND_ROWS") {
            head.insert_str("SELECT".len(), " SQL_CALC_FOUND_ROWS");
        }
        let mut sql = Sql::new(format!(
            "{head} {} FROM {}",
            column_list(columns),
            prefixed(self.prefix, table)
        ));
        self.push_joins(&mut sql)?;
        self.push_filters(&mut sql)?;
        let has_order_by = self.push_order_by(&mut sql);
        if let Some(limit) = limit {
            self.dialect
                .render_limit(&mut sql, limit, StatementKind::Select, has_order_by)?;
        }
        for lock in LOCK_OPTIONS {
            if self.state.has_option(lock) {
                sql.push(" ").push(lock);
            }
        }
        Ok(sql)
    }

    /// `COUNT(*)` restatement of the filtered SELECT, without ordering or limit.
    pub(crate) fn count_probe(&self, table: &str, columns: &[&str]) -> DbResult<Sql> {
        let distinct = self.state.has_option("DISTINCT") || self.state.has_option("DISTINCTROW");
        let grouped = !self.state.group_by.is_empty() || !self.state.havings.is_empty();
        let table = prefixed(self.prefix, table);

        if !distinct && !grouped {
            let mut sql = Sql::new(format!("SELECT COUNT(*) FROM {table}"));
            self.push_joins(&mut sql)?;
            render_group(&mut sql, ClauseKind::Where.keyword(), &self.state.wheres)?;
            return Ok(sql);
        }

        let modifier = if distinct { "DISTINCT " } else { "" };
        let mut sql = Sql::new(format!(
            "SELECT COUNT(*) FROM (SELECT {modifier}{} FROM {table}",
            column_list(columns)
        ));
        self.push_joins(&mut sql)?;
        self.push_filters(&mut sql)?;
        sql.push(&format!(") AS {PROBE_ALIAS}"));
        Ok(sql)
    }

    /// `INSERT|REPLACE [options] INTO table (cols) VALUES (...)` plus upsert
    /// and RETURNING tails.
    pub(crate) fn insert(
        &self,
        kind: StatementKind,
        table: &str,
        data: &[(String, Operand)],
    ) -> DbResult<Sql> {
        if data.is_empty() {
            return Err(DbError::validation("insert needs at least one column"));
        }
        let keyword = match kind {
            StatementKind::Replace => {
                if !self.dialect.supports_replace() {
                    return Err(DbError::unsupported(self.dialect.name(), "REPLACE"));
                }
                "REPLACE"
            }
            _ => "INSERT",
        };
        let head = self.head(keyword, kind, None);
        let mut sql = Sql::new(format!("{head} INTO {} ", prefixed(self.prefix, table)));
        sql.push_sql(&render_values(self.dialect, data)?);

        if let Some(upsert) = &self.state.upsert {
            if kind == StatementKind::Replace {
                return Err(DbError::validation("on_duplicate cannot be combined with REPLACE"));
            }
            let mut assignments = Vec::with_capacity(upsert.columns.len());
            for column in &upsert.columns {
                let value = upsert
                    .overrides
                    .iter()
                    .find(|(c, _)| c == column)
                    .or_else(|| data.iter().find(|(c, _)| c == column))
                    .map(|(_, v)| v)
                    .ok_or_else(|| {
                        DbError::payload(column.clone(), "not part of the inserted row")
                    })?;
                assignments.push(render_assignment(self.dialect, column, value)?);
            }
            self.dialect
                .render_upsert(&mut sql, &assignments, upsert.identity.as_deref())?;
        }

        if let Some(column) = &self.state.returning {
            if !self.dialect.supports_returning() {
                return Err(DbError::unsupported(self.dialect.name(), "RETURNING"));
            }
            sql.push(" RETURNING ")
                .push(&self.dialect.quote_column(column));
        }
        Ok(sql)
    }

    /// `UPDATE [options] table [joins] SET col = value, ... [WHERE] [ORDER BY] [limit]`
    pub(crate) fn update(
        &self,
        table: &str,
        data: &[(String, Operand)],
        limit: Option<Limit>,
    ) -> DbResult<Sql> {
        if data.is_empty() {
            return Err(DbError::validation("update needs at least one column"));
        }
        let head = self.head("UPDATE", StatementKind::Update, limit);
        let mut sql = Sql::new(format!("{head} {}", prefixed(self.prefix, table)));
        self.push_joins(&mut sql)?;
        sql.push(" SET ");
        for (i, (column, value)) in data.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push_sql(&render_assignment(self.dialect, column, value)?);
        }
        render_group(&mut sql, ClauseKind::Where.keyword(), &self.state.wheres)?;
        let has_order_by = self.push_order_by(&mut sql);
        if let Some(limit) = limit {
            self.dialect
                .render_limit(&mut sql, limit, StatementKind::Update, has_order_by)?;
        }
        Ok(sql)
    }

    /// `DELETE FROM table ...`, or `DELETE alias FROM table JOIN ...` with joins.
    pub(crate) fn delete(&self, table: &str, limit: Option<Limit>) -> DbResult<Sql> {
        let table = prefixed(self.prefix, table);
        let head = self.head("DELETE", StatementKind::Delete, limit);
        let mut sql = if self.state.joins.is_empty() {
            Sql::new(format!("{head} FROM {table}"))
        } else {
            // Delete from the main table only: its alias is the last word.
            let alias = table.rsplit(' ').next().unwrap_or(table.as_str());
            Sql::new(format!("{head} {alias} FROM {table}"))
        };
        self.push_joins(&mut sql)?;
        render_group(&mut sql, ClauseKind::Where.keyword(), &self.state.wheres)?;
        let has_order_by = self.push_order_by(&mut sql);
        if let Some(limit) = limit {
            self.dialect
                .render_limit(&mut sql, limit, StatementKind::Delete, has_order_by)?;
        }
        Ok(sql)
    }

    /// Statement keyword, query options (minus row locks) and `TOP n`.
    fn head(&self, keyword: &str, kind: StatementKind, limit: Option<Limit>) -> String {
        let mut head = keyword.to_string();
        for option in &self.state.options {
            if !LOCK_OPTIONS.contains(&option.as_str()) {
                head.push(' ');
                head.push_str(option);
            }
        }
        if let Some(top) = top_for(self.dialect, limit, kind) {
            head.push(' ');
            head.push_str(&top);
        }
        head
    }

    fn push_joins(&self, sql: &mut Sql) -> DbResult<()> {
        for join in &self.state.joins {
            sql.push(" ");
            if !join.join_type.is_empty() {
                sql.push(&join.join_type).push(" ");
            }
            sql.push("JOIN ");
            match &join.target {
                JoinTarget::Table(table) => {
                    sql.push(&prefixed(self.prefix, table));
                }
                JoinTarget::Subquery(sub) => sub.write_as_table(sql),
            }
            if join.condition.to_lowercase().contains("using") {
                sql.push(" ").push(&join.condition);
            } else {
                sql.push(" ON ").push(&join.condition);
            }
            for cond in &join.extra {
                sql.push(" ").push(cond.connective.as_sql()).push(" ");
                render_condition(sql, cond)?;
            }
        }
        Ok(())
    }

    /// WHERE, GROUP BY and HAVING.
    fn push_filters(&self, sql: &mut Sql) -> DbResult<()> {
        render_group(sql, ClauseKind::Where.keyword(), &self.state.wheres)?;
        if !self.state.group_by.is_empty() {
            sql.push(" GROUP BY ").push(&self.state.group_by.join(", "));
        }
        render_group(sql, ClauseKind::Having.keyword(), &self.state.havings)
    }

    /// Returns whether an ORDER BY was written.
    fn push_order_by(&self, sql: &mut Sql) -> bool {
        if self.state.order_by.is_empty() {
            return false;
        }
        let entries: Vec<String> = self
            .state
            .order_by
            .iter()
            .map(|(expr, direction)| {
                let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
                if compact.eq_ignore_ascii_case("rand()") {
                    self.dialect.random_function().to_string()
                } else {
                    format!("{expr} {direction}")
                }
            })
            .collect();
        sql.push(" ORDER BY ").push(&entries.join(", "));
        true
    }
}

fn column_list(columns: &[&str]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    }
}
