//! Connection and builder configuration.

use crate::dialect::DialectKind;
use crate::error::{DbError, DbResult};
use serde::Deserialize;

/// Configuration for a [`Db`](crate::Db).
///
/// Can be built in code or loaded from TOML:
///
/// ```toml
/// dialect = "pgsql"
/// host = "localhost"
/// port = 5432
/// username = "app"
/// password = "secret"
/// database = "app"
/// prefix = "app_"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// SQL dialect. Required.
    pub dialect: Option<DialectKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub charset: Option<String>,
    /// Prefix applied to unqualified table names.
    pub prefix: String,
    /// Column returned by INSERTs on dialects with `RETURNING`.
    pub returning_column: Option<String>,
    /// Rows per page for `paginate` (default 20).
    pub page_limit: Option<u64>,
}

impl DbConfig {
    /// Create a configuration for a dialect.
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect: Some(dialect),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> DbResult<Self> {
        toml::from_str(s).map_err(|e| DbError::config(e.to_string()))
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn returning_column(mut self, column: impl Into<String>) -> Self {
        self.returning_column = Some(column.into());
        self
    }

    pub fn page_limit(mut self, limit: u64) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// The configured dialect, or a configuration error.
    pub fn require_dialect(&self) -> DbResult<DialectKind> {
        self.dialect
            .ok_or_else(|| DbError::config("no dialect configured"))
    }

    /// Check that everything needed to open a network connection is present.
    pub fn validate(&self) -> DbResult<()> {
        self.require_dialect()?;
        let missing: Vec<&str> = [
            ("host", self.host.is_none()),
            ("username", self.username.is_none()),
            ("database", self.database.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(DbError::config(format!(
                "missing connection settings: {}",
                missing.join(", ")
            )));
        }
        if self.page_limit == Some(0) {
            return Err(DbError::config("page_limit must be positive"));
        }
        Ok(())
    }

    /// Translate into a tokio-postgres connection configuration.
    pub fn to_pg_config(&self) -> DbResult<tokio_postgres::Config> {
        self.validate()?;
        let mut config = tokio_postgres::Config::new();
        if let Some(host) = &self.host {
            config.host(host.as_str());
        }
        if let Some(port) = self.port {
            config.port(port);
        }
        if let Some(user) = &self.username {
            config.user(user.as_str());
        }
        if let Some(password) = &self.password {
            config.password(password.as_str());
        }
        if let Some(database) = &self.database {
            config.dbname(database.as_str());
        }
        if let Some(charset) = &self.charset {
            config.options(format!("-c client_encoding={charset}").as_str());
        }
        Ok(config)
    }
}
