//! SQL dialect strategies.
//!
//! Every piece of dialect-specific text the renderer emits comes from a
//! [`Dialect`] implementation selected once when the builder is created:
//! identifier quoting, LIMIT/OFFSET versus TOP/FETCH, the allowed query
//! options, the native "found rows" facility, upsert syntax and the handful
//! of functions (`NOW()`, `RAND()`) whose spelling differs between engines.

mod ansi;
mod mysql;
mod sqlserver;

pub use ansi::Ansi;
pub use mysql::MySql;
pub use sqlserver::SqlServer;

use crate::error::{DbError, DbResult};
use crate::sql::Sql;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Row limit of a statement: `n` rows, or `count` rows after skipping `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    Range { offset: u64, count: u64 },
}

impl From<u64> for Limit {
    fn from(n: u64) -> Self {
        Limit::Count(n)
    }
}

impl From<u32> for Limit {
    fn from(n: u32) -> Self {
        Limit::Count(u64::from(n))
    }
}

/// Signed row counts; negative values are rejected.
impl TryFrom<i64> for Limit {
    type Error = DbError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        u64::try_from(n)
            .map(Limit::Count)
            .map_err(|_| DbError::validation(format!("row limit must not be negative, got {n}")))
    }
}

/// `(offset, count)`
impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Range { offset, count }
    }
}

/// `[offset, count]`
impl From<[u64; 2]> for Limit {
    fn from([offset, count]: [u64; 2]) -> Self {
        Limit::Range { offset, count }
    }
}

/// Statement kinds, as far as dialect rendering cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Replace,
    Update,
    Delete,
}

/// The unit of an interval expression, see [`Dialect::render_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl IntervalUnit {
    /// Parse the one-letter unit used by `interval("-1d")`-style specs.
    pub fn from_letter(letter: &str) -> Option<Self> {
        Some(match letter {
            "s" => Self::Second,
            "m" => Self::Minute,
            "h" => Self::Hour,
            "" | "d" => Self::Day,
            "M" => Self::Month,
            "Y" => Self::Year,
            _ => return None,
        })
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }
}

/// A signed interval relative to a base timestamp expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub amount: i64,
    pub unit: IntervalUnit,
}

/// Dialect-specific SQL rendering.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Dialect name, used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Quote a single identifier.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Modifier placed right after the statement keyword for a plain row
    /// count, if the dialect limits rows that way (`TOP n`).
    fn render_top(&self, _limit: Limit, _kind: StatementKind) -> Option<String> {
        None
    }

    /// Append the trailing LIMIT clause.
    ///
    /// `has_order_by` tells whether the statement already carries an ORDER BY.
    fn render_limit(
        &self,
        sql: &mut Sql,
        limit: Limit,
        kind: StatementKind,
        has_order_by: bool,
    ) -> DbResult<()>;

    /// Whether the engine can report the unlimited row count of the previous
    /// SELECT (`SQL_CALC_FOUND_ROWS` / `FOUND_ROWS()`).
    fn supports_native_row_count(&self) -> bool {
        false
    }

    /// Query that reads the native row count, when supported.
    fn native_row_count_query(&self) -> Option<&'static str> {
        None
    }

    /// Query options accepted by [`set_query_option`](crate::Clauses::set_query_option).
    fn query_options(&self) -> &'static [&'static str];

    /// Validate a query option, returning its canonical upper-case form.
    fn check_query_option(&self, option: &str) -> DbResult<String> {
        let upper = option.trim().to_uppercase();
        if self.query_options().contains(&upper.as_str()) {
            Ok(upper)
        } else {
            Err(DbError::InvalidQueryOption {
                dialect: self.name(),
                option: option.to_string(),
            })
        }
    }

    /// Random-ordering function.
    fn random_function(&self) -> &'static str;

    /// Current timestamp expression.
    fn now_function(&self) -> &'static str;

    /// `base` shifted by `interval`.
    fn render_interval(&self, base: Option<&str>, interval: Interval) -> String;

    /// The `!<column>` token of a column-reference payload.
    fn render_negation(&self, column: &str) -> String {
        format!("NOT {column}")
    }

    /// Append the upsert tail of an INSERT.
    ///
    /// `assignments` holds already-rendered `col = value` fragments.
    fn render_upsert(
        &self,
        sql: &mut Sql,
        assignments: &[Sql],
        identity: Option<&str>,
    ) -> DbResult<()>;

    /// Ordering by an explicit list of values (`order_by_field`).
    fn render_field_order(&self, expr: &str, values: &[&str]) -> String {
        let mut out = format!("CASE {expr}");
        for (i, v) in values.iter().enumerate() {
            out.push_str(&format!(" WHEN '{}' THEN {i}", self.escape_literal(v)));
        }
        out.push_str(&format!(" ELSE {} END", values.len()));
        out
    }

    /// Whether `INSERT ... RETURNING col` is available.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Whether `REPLACE INTO` is available.
    fn supports_replace(&self) -> bool {
        false
    }

    /// Escape a string for inclusion inside a single-quoted literal.
    fn escape_literal(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// Quote a possibly dot-qualified column, quoting only the trailing part.
    fn quote_column(&self, column: &str) -> String {
        match column.rsplit_once('.') {
            Some((qualifier, name)) => format!("{qualifier}.{}", self.quote_identifier(name)),
            None => self.quote_identifier(column),
        }
    }
}

/// Supported dialect families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DialectKind {
    /// Generic ANSI (PostgreSQL, SQLite).
    #[default]
    Ansi,
    /// MySQL, MariaDB.
    MySql,
    /// Microsoft SQL Server.
    SqlServer,
}

static ANSI: Ansi = Ansi;
static MYSQL: MySql = MySql;
static SQLSERVER: SqlServer = SqlServer;

impl DialectKind {
    /// The rendering strategy for this dialect.
    pub fn strategy(self) -> &'static dyn Dialect {
        match self {
            Self::Ansi => &ANSI,
            Self::MySql => &MYSQL,
            Self::SqlServer => &SQLSERVER,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.strategy().name()
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "ansi" | "pgsql" | "postgres" | "postgresql" | "sqlite" => Ok(Self::Ansi),
            "sqlsrv" | "mssql" | "sqlserver" => Ok(Self::SqlServer),
            other => Err(DbError::config(format!("unknown dialect '{other}'"))),
        }
    }
}

impl TryFrom<String> for DialectKind {
    type Error = DbError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Shared `LIMIT n` / `LIMIT count OFFSET offset` rendering.
pub(crate) fn render_limit_offset(sql: &mut Sql, limit: Limit) {
    match limit {
        Limit::Count(n) => {
            sql.push(&format!(" LIMIT {n}"));
        }
        Limit::Range { offset, count } => {
            sql.push(&format!(" LIMIT {count} OFFSET {offset}"));
        }
    }
}

/// Shared `<sep>col = value, ...` joining of upsert assignments.
pub(crate) fn push_assignments(sql: &mut Sql, assignments: &[Sql]) {
    for (i, assignment) in assignments.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_sql(assignment);
    }
}
