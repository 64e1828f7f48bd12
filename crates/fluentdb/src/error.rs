//! Error types for fluentdb

use thiserror::Error;

/// Result type alias for fluentdb operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for statement construction and execution.
///
/// Variants fall into three families:
/// - configuration (`Config`), raised when a connection is opened
/// - construction (bad join type, bad ordering, bad payload...), raised
///   immediately by the builder and never retried
/// - execution (`Connection`, `Query`, `Decode`, `Transaction`), recorded on
///   the [`Db`](crate::Db) outcome and returned to the caller
#[derive(Debug, Error)]
pub enum DbError {
    /// Missing or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Join type outside the supported set
    #[error("Invalid join type: '{0}'")]
    InvalidJoinType(String),

    /// Order direction outside ASC/DESC
    #[error("Invalid order direction: '{0}'")]
    InvalidOrderDirection(String),

    /// Query option not allowed by the active dialect
    #[error("Invalid query option '{option}' for dialect {dialect}")]
    InvalidQueryOption { dialect: &'static str, option: String },

    /// INSERT/UPDATE payload value with an unsupported shape
    #[error("Invalid payload for column '{column}': {reason}")]
    InvalidPayload { column: String, reason: String },

    /// Interval specification that does not parse
    #[error("Invalid interval specification: '{0}'")]
    InvalidInterval(String),

    /// Misuse of the builder API
    #[error("Validation error: {0}")]
    Validation(String),

    /// Feature not available on the active dialect
    #[error("{feature} is not supported by dialect {dialect}")]
    Unsupported {
        dialect: &'static str,
        feature: String,
    },

    /// Statement execution failed on the server
    #[error("Query error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Query {
        code: Option<String>,
        message: String,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Transaction control error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a payload error for a specific column
    pub fn payload(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an execution error without a server code
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            code: None,
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(dialect: &'static str, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// Check if this error comes from statement construction (programmer misuse).
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidJoinType(_)
                | Self::InvalidOrderDirection(_)
                | Self::InvalidQueryOption { .. }
                | Self::InvalidPayload { .. }
                | Self::InvalidInterval(_)
                | Self::Validation(_)
                | Self::Unsupported { .. }
        )
    }

    /// Check if this error comes from talking to the database.
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Query { .. } | Self::Decode { .. } | Self::Transaction(_)
        )
    }

    /// Server error code (SQLSTATE or vendor code), if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Map a tokio_postgres error, keeping the SQLSTATE code when the server sent one.
    pub fn from_pg(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            return Self::Query {
                code: Some(db_err.code().code().to_string()),
                message: db_err.message().to_string(),
            };
        }
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::query(err.to_string())
    }
}
