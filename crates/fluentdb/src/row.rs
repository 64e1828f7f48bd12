//! Result rows and result shaping.

use crate::client::RowStream;
use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value};
use futures_core::Stream;
use serde::Serialize;
use serde::ser::SerializeMap;
use std::pin::Pin;
use std::sync::Arc;

/// One result row: ordered column names and their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Column names are shared between rows of the same result.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> DbResult<Self> {
        if columns.len() != values.len() {
            return Err(DbError::decode(
                "",
                format!(
                    "row has {} columns but {} values",
                    columns.len(),
                    values.len()
                ),
            ));
        }
        Ok(Self { columns, values })
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a column by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value of a column by position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Typed value of a column by name.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DbError::decode(column, "no such column"))?;
        T::from_value(value).map_err(|e| match e {
            DbError::Decode { message, .. } => DbError::decode(column, message),
            other => other,
        })
    }

    /// First value of the row, if any.
    pub fn into_first(self) -> Option<Value> {
        self.values.into_iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    /// JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Map a [`Row`] into a user type.
///
/// ```ignore
/// struct User { id: i64, login: String }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> DbResult<Self> {
///         Ok(Self { id: row.try_get("id")?, login: row.try_get("login")? })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DbResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.clone())
    }
}

/// How SELECT results are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    /// Materialized rows.
    #[default]
    Rows,
    /// A JSON array of objects.
    Json,
}

/// Result of a SELECT or raw query.
pub enum ResultSet {
    /// Fully materialized rows.
    Rows(Vec<Row>),
    /// A JSON array of row objects.
    Json(serde_json::Value),
    /// Rows pulled one at a time (streaming mode). Forward-only, not restartable.
    Stream(RowStream),
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows(rows) => f.debug_tuple("Rows").field(rows).finish(),
            Self::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl ResultSet {
    /// Collect into rows, draining a stream if needed.
    pub async fn into_rows(self) -> DbResult<Vec<Row>> {
        match self {
            Self::Rows(rows) => Ok(rows),
            Self::Stream(mut stream) => {
                let mut rows = Vec::new();
                while let Some(row) =
                    std::future::poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await
                {
                    rows.push(row?);
                }
                Ok(rows)
            }
            Self::Json(_) => Err(DbError::validation(
                "result was shaped as JSON; use into_json()",
            )),
        }
    }

    /// JSON array of row objects.
    pub async fn into_json(self) -> DbResult<serde_json::Value> {
        match self {
            Self::Json(json) => Ok(json),
            other => {
                let rows = other.into_rows().await?;
                Ok(rows_to_json(&rows))
            }
        }
    }

    /// A stream over the rows.
    pub fn into_stream(self) -> DbResult<RowStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            Self::Rows(rows) => Ok(RowStream::from_rows(rows)),
            Self::Json(_) => Err(DbError::validation(
                "result was shaped as JSON; use into_json()",
            )),
        }
    }

    /// Number of materialized rows; `None` for streams.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Rows(rows) => Some(rows.len()),
            Self::Json(serde_json::Value::Array(items)) => Some(items.len()),
            Self::Json(_) => Some(1),
            Self::Stream(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

pub(crate) fn rows_to_json(rows: &[Row]) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(Row::to_json).collect())
}
