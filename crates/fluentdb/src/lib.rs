//! # fluentdb
//!
//! A fluent, multi-dialect SQL statement builder with a thin async
//! data-access layer.
//!
//! ## Features
//!
//! - **Fluent clauses**: conditions, joins, grouping, ordering and query
//!   options accumulate on the builder and render into one statement
//! - **Dialect strategies**: ANSI, MySQL-like and SQL-Server-like rendering of
//!   identifiers, row limits, pagination, upserts and native row counts
//! - **Positional parameters**: every value is bound through a `?`
//!   placeholder, never inlined into the SQL text
//! - **Subqueries**: a connection-less builder renders a [`SubQuery`] usable as
//!   a condition value, a payload value or a JOIN target
//! - **Execution outcome**: affected rows, generated identity, total count and
//!   the last error are recorded on the [`Db`] after every statement
//!
//! ## Example
//!
//! ```ignore
//! use fluentdb::prelude::*;
//!
//! let config = DbConfig::new(DialectKind::Ansi)
//!     .host("localhost")
//!     .username("app")
//!     .database("app");
//! let mut db = fluentdb::connect(&config).await?;
//!
//! let rows = db
//!     .where_("active", true)
//!     .order_by("created_at", "DESC")?
//!     .get("users", Limit::Count(10), &["id", "login"])
//!     .await?
//!     .into_rows()
//!     .await?;
//!
//! db.where_("id", 1)
//!     .update("users", record! { "visits" => Operand::increment(1) }, None)
//!     .await?;
//! ```

pub mod builder;
pub mod client;
pub mod condition;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod operand;
pub mod pg;
pub mod prelude;
pub mod row;
pub mod sql;
pub mod subquery;
pub mod value;

pub use builder::{Clauses, JoinTarget, QueryBuilder};
pub use client::{Connection, ExecOutcome, RowStream};
pub use condition::{ClauseKind, Condition, Connective};
pub use config::DbConfig;
pub use db::{Db, TraceEntry};
pub use dialect::{Dialect, DialectKind, Interval, IntervalUnit, Limit, StatementKind};
pub use error::{DbError, DbResult};
pub use operand::{ColumnSource, Operand, RawExpr};
pub use pg::{PgConnection, connect};
pub use row::{FromRow, ResultSet, ReturnType, Row};
pub use sql::Sql;
pub use subquery::SubQuery;
pub use value::{FromValue, Value};
