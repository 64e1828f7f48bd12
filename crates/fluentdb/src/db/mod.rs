//! Execution coordinator.
//!
//! [`Db`] pairs a [`QueryBuilder`] with a [`Connection`]. Every executing verb
//! takes the pending statement state out of the builder first, renders it,
//! runs it and records the outcome (row counts, identity, error). The builder
//! is therefore reset whether rendering or execution succeeds or fails.
//!
//! Construction errors (bad join type, bad payload...) are returned before
//! anything is sent. Execution errors are recorded in [`Db::last_error`] /
//! [`Db::last_error_code`] and then returned, so batch callers can stop and
//! roll back.

#[cfg(test)]
mod tests;

use crate::builder::{Clauses, QueryBuilder};
use crate::client::{Connection, ExecOutcome, RowStream};
use crate::config::DbConfig;
use crate::dialect::{DialectKind, Limit, StatementKind};
use crate::error::{DbError, DbResult};
use crate::operand::Operand;
use crate::row::{FromRow, ResultSet, ReturnType, Row, rows_to_json};
use crate::sql::{Sql, interpolate};
use crate::value::{FromValue, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_PAGE_LIMIT: u64 = 20;

/// One executed statement, recorded when tracing is enabled with
/// [`Db::set_trace`].
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub sql: String,
    pub duration: Duration,
}

/// Outcome of the last statement. Cleared when the next statement starts.
#[derive(Debug, Clone, Default)]
struct Outcome {
    last_error: Option<String>,
    last_error_code: Option<String>,
    count: u64,
    affected_rows: u64,
    last_insert_id: Option<i64>,
    total_count: u64,
    total_pages: u64,
    last_query: String,
}

/// A statement builder bound to a connection.
pub struct Db<C: Connection> {
    conn: Arc<C>,
    query: QueryBuilder,
    return_type: ReturnType,
    streaming: bool,
    page_limit: u64,
    transaction_in_progress: bool,
    returning_column: Option<String>,
    database: Option<String>,
    trace: Option<Vec<TraceEntry>>,
    outcome: Outcome,
}

impl<C: Connection> std::fmt::Debug for Db<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("dialect", &self.query.dialect())
            .field("prefix", &self.query.prefix())
            .field("streaming", &self.streaming)
            .field("transaction_in_progress", &self.transaction_in_progress)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Clauses for Db<C> {
    fn builder(&self) -> &QueryBuilder {
        &self.query
    }

    fn builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.query
    }
}

impl<C: Connection> Db<C> {
    /// Wrap a connection.
    pub fn new(conn: C, dialect: DialectKind) -> Self {
        Self::with_builder(Arc::new(conn), QueryBuilder::new(dialect))
    }

    /// Wrap a connection using a configuration (dialect, prefix, page limit,
    /// returning column).
    pub fn with_config(conn: C, config: &DbConfig) -> DbResult<Self> {
        let dialect = config.require_dialect()?;
        let mut db = Self::new(conn, dialect);
        db.query.set_prefix(config.prefix.clone());
        db.returning_column = config.returning_column.clone();
        db.database = config.database.clone();
        if let Some(limit) = config.page_limit {
            db.set_page_limit(limit)?;
        }
        Ok(db)
    }

    /// Attach a connection to a builder obtained from [`Db::copy`], keeping its
    /// pending state.
    pub fn with_builder(conn: Arc<C>, query: QueryBuilder) -> Self {
        Self {
            conn,
            query,
            return_type: ReturnType::default(),
            streaming: false,
            page_limit: DEFAULT_PAGE_LIMIT,
            transaction_in_progress: false,
            returning_column: None,
            database: None,
            trace: None,
            outcome: Outcome::default(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn shared_connection(&self) -> Arc<C> {
        Arc::clone(&self.conn)
    }

    pub fn dialect(&self) -> DialectKind {
        self.query.dialect()
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.query.set_prefix(prefix);
        self
    }

    /// Shape the next SELECT as rows or JSON.
    pub fn set_return_type(&mut self, return_type: ReturnType) -> &mut Self {
        self.return_type = return_type;
        self
    }

    /// Toggle streaming mode: SELECT results become forward-only row streams.
    pub fn use_stream(&mut self, enabled: bool) -> &mut Self {
        self.streaming = enabled;
        self
    }

    pub fn set_page_limit(&mut self, limit: u64) -> DbResult<&mut Self> {
        if limit == 0 {
            return Err(DbError::validation("page limit must be positive"));
        }
        self.page_limit = limit;
        Ok(self)
    }

    pub fn page_limit(&self) -> u64 {
        self.page_limit
    }

    /// Record every executed statement with its duration.
    pub fn set_trace(&mut self, enabled: bool) -> &mut Self {
        self.trace = enabled.then(Vec::new);
        self
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// A connection-less builder for a subquery, sharing dialect and prefix.
    ///
    /// `alias` names the derived table when the subquery is used as a JOIN target.
    pub fn subquery(&self, alias: Option<&str>) -> QueryBuilder {
        self.query.fork(alias.map(str::to_string))
    }

    /// Connection-less copy of the builder, including pending state.
    pub fn copy(&self) -> QueryBuilder {
        self.query.clone()
    }

    /// Escape a string for use inside a single-quoted SQL literal.
    pub fn escape(&self, value: &str) -> String {
        self.query.dialect().strategy().escape_literal(value)
    }

    // ==================== Outcome ====================

    pub fn last_error(&self) -> Option<&str> {
        self.outcome.last_error.as_deref()
    }

    pub fn last_error_code(&self) -> Option<&str> {
        self.outcome.last_error_code.as_deref()
    }

    /// Rows returned by the last SELECT (0 for streams).
    pub fn count(&self) -> u64 {
        self.outcome.count
    }

    pub fn affected_rows(&self) -> u64 {
        self.outcome.affected_rows
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.outcome.last_insert_id
    }

    /// Unlimited row count of the last SELECT run with `with_total_count`.
    pub fn total_count(&self) -> u64 {
        self.outcome.total_count
    }

    /// Page count computed by the last `paginate`.
    pub fn total_pages(&self) -> u64 {
        self.outcome.total_pages
    }

    /// The last executed statement with its parameters inlined.
    pub fn last_query(&self) -> &str {
        &self.outcome.last_query
    }

    // ==================== SELECT ====================

    /// `SELECT columns FROM table ...` (empty `columns` selects `*`).
    pub async fn get(
        &mut self,
        table: &str,
        limit: impl Into<Option<Limit>>,
        columns: &[&str],
    ) -> DbResult<ResultSet> {
        let return_type = std::mem::take(&mut self.return_type);
        self.select(table, limit.into(), columns, Some(return_type))
            .await
    }

    /// SELECT mapped into `T`.
    pub async fn get_as<T: FromRow>(
        &mut self,
        table: &str,
        limit: impl Into<Option<Limit>>,
        columns: &[&str],
    ) -> DbResult<Vec<T>> {
        let rows = self.select_rows(table, limit.into(), columns).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// First row of a single-row SELECT.
    pub async fn get_one(&mut self, table: &str, columns: &[&str]) -> DbResult<Option<Row>> {
        let rows = self
            .select_rows(table, Some(Limit::Count(1)), columns)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Value of `column` in the first matching row.
    pub async fn get_value(&mut self, table: &str, column: &str) -> DbResult<Option<Value>> {
        let row = self.get_one(table, &[column]).await?;
        Ok(row.and_then(Row::into_first))
    }

    /// Values of `column` in every matching row.
    pub async fn get_values(
        &mut self,
        table: &str,
        column: &str,
        limit: impl Into<Option<Limit>>,
    ) -> DbResult<Vec<Value>> {
        let rows = self.select_rows(table, limit.into(), &[column]).await?;
        Ok(rows.into_iter().filter_map(Row::into_first).collect())
    }

    /// Whether at least one row matches the pending conditions.
    pub async fn has(&mut self, table: &str) -> DbResult<bool> {
        Ok(self.get_one(table, &["1"]).await?.is_some())
    }

    /// Page `page` (1-based) of `table`; also computes total count and pages.
    pub async fn paginate(
        &mut self,
        table: &str,
        page: u64,
        columns: &[&str],
    ) -> DbResult<ResultSet> {
        if page == 0 {
            self.query.reset();
            return Err(DbError::validation("pages are numbered from 1"));
        }
        let Some(offset) = self.page_limit.checked_mul(page - 1) else {
            self.query.reset();
            return Err(DbError::validation(format!(
                "page {page} is out of range for {} rows per page",
                self.page_limit
            )));
        };
        self.with_total_count();
        let limit = Limit::Range {
            offset,
            count: self.page_limit,
        };
        let result = self.get(table, limit, columns).await?;
        self.outcome.total_pages = self.outcome.total_count.div_ceil(self.page_limit);
        Ok(result)
    }

    async fn select_rows(
        &mut self,
        table: &str,
        limit: Option<Limit>,
        columns: &[&str],
    ) -> DbResult<Vec<Row>> {
        match self.select(table, limit, columns, None).await? {
            ResultSet::Rows(rows) => Ok(rows),
            other => other.into_rows().await,
        }
    }

    /// Render and run a SELECT. `shape` of `None` forces materialized rows.
    async fn select(
        &mut self,
        table: &str,
        limit: Option<Limit>,
        columns: &[&str],
        shape: Option<ReturnType>,
    ) -> DbResult<ResultSet> {
        let state = self.query.take_state();
        self.outcome = Outcome::default();
        let streaming = self.streaming && shape.is_some();
        let dialect = self.query.dialect().strategy();
        let native = state.with_total_count && dialect.supports_native_row_count() && !streaming;

        let (sql, probe) = {
            let renderer = self.query.renderer(&state);
            let sql = renderer.select(table, limit, columns, native)?;
            let probe = if state.with_total_count && !native {
                Some(renderer.count_probe(table, columns)?)
            } else {
                None
            };
            (sql, probe)
        };

        if let Some(probe) = probe {
            let total = self.query_rows(&probe).await?;
            self.outcome.total_count = first_count(total)?;
        }

        let result = if streaming {
            ResultSet::Stream(self.query_stream(&sql).await?)
        } else {
            let rows = self.query_rows(&sql).await?;
            self.outcome.count = rows.len() as u64;
            match shape {
                Some(ReturnType::Json) => ResultSet::Json(rows_to_json(&rows)),
                _ => ResultSet::Rows(rows),
            }
        };
        self.outcome.last_query = interpolate(sql.as_str(), sql.params());

        if native {
            if let Some(found_rows) = dialect.native_row_count_query() {
                let total = self.query_rows(&Sql::new(found_rows)).await?;
                self.outcome.total_count = first_count(total)?;
            }
        }
        Ok(result)
    }

    // ==================== INSERT / UPDATE / DELETE ====================

    /// INSERT one row. Returns the generated identity when there is one.
    pub async fn insert<I, K, V>(&mut self, table: &str, data: I) -> DbResult<Option<i64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        let data = collect_payload(data);
        self.write_row(StatementKind::Insert, table, data).await
    }

    /// REPLACE one row (MySQL-like dialects).
    pub async fn replace<I, K, V>(&mut self, table: &str, data: I) -> DbResult<Option<i64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        let data = collect_payload(data);
        self.write_row(StatementKind::Replace, table, data).await
    }

    /// INSERT several rows in one transaction, all or nothing.
    ///
    /// A transaction is started (and committed or rolled back) here unless the
    /// caller already has one open. Pending options such as `on_duplicate`
    /// apply to every row.
    pub async fn insert_multi<R, K, V>(
        &mut self,
        table: &str,
        rows: impl IntoIterator<Item = R>,
    ) -> DbResult<Vec<Option<i64>>>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        let rows: Vec<Vec<(String, Operand)>> = rows.into_iter().map(collect_payload).collect();
        self.insert_batch(table, rows).await
    }

    /// [`Db::insert_multi`] with the column list given once.
    pub async fn insert_multi_with_keys(
        &mut self,
        table: &str,
        keys: &[&str],
        rows: impl IntoIterator<Item = Vec<Operand>>,
    ) -> DbResult<Vec<Option<i64>>> {
        let mut batch = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != keys.len() {
                self.query.reset();
                return Err(DbError::payload(
                    format!("row {i}"),
                    format!("{} values for {} columns", row.len(), keys.len()),
                ));
            }
            batch.push(keys.iter().map(|k| k.to_string()).zip(row).collect());
        }
        self.insert_batch(table, batch).await
    }

    async fn insert_batch(
        &mut self,
        table: &str,
        rows: Vec<Vec<(String, Operand)>>,
    ) -> DbResult<Vec<Option<i64>>> {
        let template = self.query.take_state();
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let auto_commit = !self.transaction_in_progress;
        if auto_commit {
            self.start_transaction().await?;
        }
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            self.query.state = template.clone();
            match self.write_row(StatementKind::Insert, table, row).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    if auto_commit {
                        if let Err(rollback_err) = self.rollback().await {
                            tracing::warn!(
                                target: "fluentdb.sql",
                                error = %rollback_err,
                                "rollback after failed batch insert failed"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }
        if auto_commit {
            self.commit().await?;
        }
        Ok(ids)
    }

    async fn write_row(
        &mut self,
        kind: StatementKind,
        table: &str,
        data: Vec<(String, Operand)>,
    ) -> DbResult<Option<i64>> {
        let mut state = self.query.take_state();
        self.outcome = Outcome::default();
        let dialect = self.query.dialect().strategy();
        if kind == StatementKind::Insert
            && state.returning.is_none()
            && dialect.supports_returning()
        {
            state.returning = self.returning_column.clone();
        }
        let sql = self.query.renderer(&state).insert(kind, table, &data)?;
        self.outcome.last_query = interpolate(sql.as_str(), sql.params());

        if state.returning.is_some() {
            let rows = self.query_rows(&sql).await?;
            self.outcome.affected_rows = rows.len() as u64;
            self.outcome.last_insert_id = rows
                .into_iter()
                .next()
                .and_then(Row::into_first)
                .and_then(|v| Option::<i64>::from_value(&v).ok().flatten());
        } else {
            let outcome = self.exec(&sql).await?;
            self.outcome.affected_rows = outcome.affected_rows;
            self.outcome.last_insert_id = outcome.last_insert_id;
        }
        Ok(self.outcome.last_insert_id.filter(|id| *id > 0))
    }

    /// UPDATE matching rows. Returns whether any row was affected.
    pub async fn update<I, K, V>(
        &mut self,
        table: &str,
        data: I,
        limit: impl Into<Option<Limit>>,
    ) -> DbResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        let data = collect_payload(data);
        let state = self.query.take_state();
        self.outcome = Outcome::default();
        let sql = self.query.renderer(&state).update(table, &data, limit.into())?;
        self.run_write(sql).await
    }

    /// DELETE matching rows. Returns whether any row was affected.
    pub async fn delete(
        &mut self,
        table: &str,
        limit: impl Into<Option<Limit>>,
    ) -> DbResult<bool> {
        let state = self.query.take_state();
        self.outcome = Outcome::default();
        let sql = self.query.renderer(&state).delete(table, limit.into())?;
        self.run_write(sql).await
    }

    async fn run_write(&mut self, sql: Sql) -> DbResult<bool> {
        self.outcome.last_query = interpolate(sql.as_str(), sql.params());
        let outcome = self.exec(&sql).await?;
        self.outcome.affected_rows = outcome.affected_rows;
        Ok(outcome.affected_rows > 0)
    }

    // ==================== Raw statements ====================

    /// Run caller-supplied SQL with `?` placeholders, shaped like [`Db::get`].
    ///
    /// Pending builder state is discarded.
    pub async fn raw_query(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        let return_type = std::mem::take(&mut self.return_type);
        self.raw(sql, params, Some(return_type)).await
    }

    /// First row of a raw query.
    pub async fn raw_query_one(&mut self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        let rows = self.raw(sql, params, None).await?.into_rows().await?;
        Ok(rows.into_iter().next())
    }

    /// First value of the first row of a raw query.
    pub async fn raw_query_value(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> DbResult<Option<Value>> {
        Ok(self
            .raw_query_one(sql, params)
            .await?
            .and_then(Row::into_first))
    }

    async fn raw(
        &mut self,
        sql: &str,
        params: &[Value],
        shape: Option<ReturnType>,
    ) -> DbResult<ResultSet> {
        self.query.reset();
        self.outcome = Outcome::default();
        let mut statement = Sql::empty();
        statement.push_raw(sql, params);
        self.outcome.last_query = interpolate(sql, params);

        if self.streaming && shape.is_some() {
            return Ok(ResultSet::Stream(self.query_stream(&statement).await?));
        }
        let rows = self.query_rows(&statement).await?;
        self.outcome.count = rows.len() as u64;
        Ok(match shape {
            Some(ReturnType::Json) => ResultSet::Json(rows_to_json(&rows)),
            _ => ResultSet::Rows(rows),
        })
    }

    // ==================== Transactions ====================

    pub async fn start_transaction(&mut self) -> DbResult<()> {
        if self.transaction_in_progress {
            return Err(DbError::Transaction("a transaction is already open".into()));
        }
        let result = self.conn.begin().await;
        self.record(result)?;
        self.transaction_in_progress = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        let result = self.conn.commit().await;
        self.transaction_in_progress = false;
        self.record(result)
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        let result = self.conn.rollback().await;
        self.transaction_in_progress = false;
        self.record(result)
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_in_progress
    }

    // ==================== Connection ====================

    pub async fn ping(&mut self) -> DbResult<()> {
        let result = self.conn.ping().await;
        self.record(result)
    }

    /// Close the connection, rolling back an open transaction first.
    pub async fn disconnect(&mut self) -> DbResult<()> {
        if self.transaction_in_progress {
            self.rollback().await?;
        }
        let result = self.conn.close().await;
        self.record(result)
    }

    /// Whether all `tables` (prefix applied) exist.
    pub async fn table_exists(&mut self, tables: &[&str]) -> DbResult<bool> {
        if tables.is_empty() {
            return Ok(true);
        }
        let names: Vec<Value> = tables
            .iter()
            .map(|t| Value::from(crate::builder::prefixed(self.query.prefix(), t)))
            .collect();
        let mut scope = self.query.fork(None);
        if let Some(database) = &self.database {
            match self.query.dialect() {
                DialectKind::MySql => scope.where_("table_schema", database.as_str()),
                _ => scope.where_("table_catalog", database.as_str()),
            };
        }
        scope.where_op("table_name", "IN", names);
        let state = scope.take_state();
        self.outcome = Outcome::default();
        let sql = scope
            .renderer(&state)
            .count_probe("information_schema.tables", &[])?;
        self.outcome.last_query = interpolate(sql.as_str(), sql.params());
        let rows = self.query_rows(&sql).await?;
        Ok(first_count(rows)? == tables.len() as u64)
    }

    // ==================== Plumbing ====================

    async fn query_rows(&mut self, sql: &Sql) -> DbResult<Vec<Row>> {
        log_statement(self.query.dialect(), sql);
        let started = Instant::now();
        let result = self.conn.query(sql.as_str(), sql.params()).await;
        self.push_trace(sql, started);
        self.record(result)
    }

    async fn query_stream(&mut self, sql: &Sql) -> DbResult<RowStream> {
        log_statement(self.query.dialect(), sql);
        let started = Instant::now();
        let result = self.conn.query_stream(sql.as_str(), sql.params()).await;
        self.push_trace(sql, started);
        self.record(result)
    }

    async fn exec(&mut self, sql: &Sql) -> DbResult<ExecOutcome> {
        log_statement(self.query.dialect(), sql);
        let started = Instant::now();
        let result = self.conn.execute(sql.as_str(), sql.params()).await;
        self.push_trace(sql, started);
        self.record(result)
    }

    fn push_trace(&mut self, sql: &Sql, started: Instant) {
        if let Some(trace) = &mut self.trace {
            trace.push(TraceEntry {
                sql: interpolate(sql.as_str(), sql.params()),
                duration: started.elapsed(),
            });
        }
    }

    /// Record an execution error into the outcome before handing it back.
    fn record<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(err) = &result {
            tracing::warn!(
                target: "fluentdb.sql",
                code = err.code().unwrap_or("-"),
                error = %err,
                "statement failed"
            );
            self.outcome.last_error = Some(err.to_string());
            self.outcome.last_error_code = err.code().map(str::to_string);
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn pending_state(&self) -> &crate::builder::StatementState {
        &self.query.state
    }
}

impl<C: Connection> Drop for Db<C> {
    fn drop(&mut self) {
        if !self.transaction_in_progress {
            return;
        }
        tracing::warn!(
            target: "fluentdb.sql",
            "Db dropped with an open transaction; rolling back"
        );
        let conn = Arc::clone(&self.conn);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = conn.rollback().await {
                        tracing::warn!(
                            target: "fluentdb.sql",
                            error = %err,
                            "rollback on drop failed"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    target: "fluentdb.sql",
                    "no tokio runtime available; open transaction left to the server"
                );
            }
        }
    }
}

fn log_statement(dialect: DialectKind, sql: &Sql) {
    tracing::debug!(
        target: "fluentdb.sql",
        dialect = dialect.as_str(),
        param_count = sql.params().len(),
        sql = %sql.as_str(),
        "executing"
    );
}

fn collect_payload<I, K, V>(data: I) -> Vec<(String, Operand)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Operand>,
{
    data.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

fn first_count(rows: Vec<Row>) -> DbResult<u64> {
    match rows.into_iter().next().and_then(Row::into_first) {
        Some(v) => u64::from_value(&v),
        None => Ok(0),
    }
}
