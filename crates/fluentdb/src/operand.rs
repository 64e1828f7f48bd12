//! Values accepted by conditions and INSERT/UPDATE payloads.
//!
//! [`Operand`] is a closed set of shapes: a literal, a list, a raw SQL
//! expression with its own parameters, an increment/decrement marker, a
//! column-reference marker or a rendered subquery. The renderers match on it
//! exhaustively, so a shape that makes no sense in a given position is a
//! construction error instead of silently producing SQL.

use crate::error::{DbError, DbResult};
use crate::subquery::SubQuery;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Raw SQL with `?` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExpr {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Column a [`Operand::SetFromColumn`] marker refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// The column being assigned.
    SameColumn,
    /// A named column.
    Column(String),
}

/// A condition value or payload entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Operand {
    /// A single bound value.
    Literal(Value),
    /// An ordered list (IN, BETWEEN, multi-value equality).
    List(Vec<Value>),
    /// Raw SQL carrying its own parameters.
    Raw(RawExpr),
    /// `col = col + n`
    Increment(f64),
    /// `col = col - n`
    Decrement(f64),
    /// Unquoted column token prefixed with the dialect's `!` operator.
    SetFromColumn(ColumnSource),
    /// A rendered subquery, inlined in parentheses.
    Subquery(SubQuery),
    /// No value supplied.
    #[default]
    Absent,
}

impl Operand {
    /// `col = col + amount`
    pub fn increment(amount: impl Into<f64>) -> Self {
        Self::Increment(amount.into())
    }

    /// `col = col - amount`
    pub fn decrement(amount: impl Into<f64>) -> Self {
        Self::Decrement(amount.into())
    }

    /// Raw SQL expression without parameters, e.g. `NOW()`.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(RawExpr {
            sql: sql.into(),
            params: Vec::new(),
        })
    }

    /// Raw SQL expression with its own `?` parameters.
    pub fn raw_with<I>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::Raw(RawExpr {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        })
    }

    /// Assign from another column, rendered as `!<column>` (`NOT <column>`
    /// outside MySQL-like dialects).
    ///
    /// An empty name is rejected; use [`Operand::negate_self`] to refer to the
    /// column being assigned.
    pub fn set_from_column(column: impl Into<String>) -> DbResult<Self> {
        let column = column.into();
        if column.trim().is_empty() {
            return Err(DbError::validation(
                "set_from_column requires a column name; use negate_self() for the assigned column",
            ));
        }
        Ok(Self::SetFromColumn(ColumnSource::Column(column)))
    }

    /// `col = !col`: flip the column being assigned.
    pub fn negate_self() -> Self {
        Self::SetFromColumn(ColumnSource::SameColumn)
    }

    /// Short name of the shape, for error messages.
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::List(_) => "list",
            Self::Raw(_) => "raw expression",
            Self::Increment(_) => "increment",
            Self::Decrement(_) => "decrement",
            Self::SetFromColumn(_) => "column reference",
            Self::Subquery(_) => "subquery",
            Self::Absent => "absent value",
        }
    }
}

macro_rules! impl_literal_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Literal(Value::from(v))
                }
            }
        )*
    };
}

impl_literal_from!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    &String,
    bytes::Bytes,
    NaiveDateTime,
    NaiveDate,
    DateTime<Utc>
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Literal(Value::from(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(v: Vec<T>) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Operand {
    fn from(v: [T; N]) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Operand {
    fn from(v: &[T]) -> Self {
        Operand::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl From<SubQuery> for Operand {
    fn from(v: SubQuery) -> Self {
        Operand::Subquery(v)
    }
}

impl From<RawExpr> for Operand {
    fn from(v: RawExpr) -> Self {
        Operand::Raw(v)
    }
}

/// Build an INSERT/UPDATE payload of `(column, Operand)` pairs.
///
/// ```ignore
/// use fluentdb::{record, Operand};
///
/// let row = record! {
///     "login" => "admin",
///     "visits" => Operand::increment(1),
///     "updated_at" => Operand::raw("NOW()"),
/// };
/// db.update("users", row, None).await?;
/// ```
#[macro_export]
macro_rules! record {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Operand)>::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        ::std::vec![
            $((::std::string::String::from($column), $crate::Operand::from($value))),+
        ]
    };
}
