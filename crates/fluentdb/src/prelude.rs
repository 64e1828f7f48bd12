//! Convenient imports for typical `fluentdb` usage.
//!
//! ```ignore
//! use fluentdb::prelude::*;
//! ```

pub use crate::{
    Clauses, Db, DbConfig, DbError, DbResult, DialectKind, FromRow, FromValue, Limit, Operand,
    PgConnection, QueryBuilder, ResultSet, ReturnType, Row, SubQuery, Value, record,
};
