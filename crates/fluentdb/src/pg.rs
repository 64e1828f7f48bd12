//! PostgreSQL connection over `tokio-postgres`.
//!
//! Statements arrive with `?` placeholders and are rewritten to `$n` before
//! they reach the server. [`Value`] parameters adapt to the type the server
//! inferred for each placeholder, so an integer bound to a `TEXT` column or a
//! timestamp string bound to a `TIMESTAMPTZ` column both work.

use crate::client::{Connection, ExecOutcome, RowStream};
use crate::config::DbConfig;
use crate::db::Db;
use crate::dialect::DialectKind;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::sql::to_numbered;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_core::Stream;
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls, Row as PgRow};

type BoxError = Box<dyn StdError + Sync + Send>;

/// A [`Connection`] backed by a single `tokio_postgres::Client`.
pub struct PgConnection {
    client: Client,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl PgConnection {
    /// Wrap an already connected client. Its connection future must be driven
    /// by the caller.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            driver: Mutex::new(None),
        }
    }

    /// Open a connection (without TLS) and drive it on the current runtime.
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let pg_config = config.to_pg_config()?;
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "fluentdb.sql", error = %e, "postgres connection error");
            }
        });
        Ok(Self {
            client,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// Open a connection from a `postgres://` URL.
    pub async fn connect_url(database_url: &str) -> DbResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "fluentdb.sql", error = %e, "postgres connection error");
            }
        });
        Ok(Self {
            client,
            driver: Mutex::new(Some(driver)),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Connection for PgConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let sql = to_numbered(sql);
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(&sql, &refs)
            .await
            .map_err(DbError::from_pg)?;
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns = column_names(first);
        rows.iter().map(|row| decode_row(row, &columns)).collect()
    }

    async fn query_stream(&self, sql: &str, params: &[Value]) -> DbResult<RowStream> {
        let sql = to_numbered(sql);
        let stream = self
            .client
            .query_raw(&sql, params.iter())
            .await
            .map_err(DbError::from_pg)?;
        Ok(RowStream::new(DecodeRowStream::new(stream)))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        let sql = to_numbered(sql);
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let affected_rows = self
            .client
            .execute(&sql, &refs)
            .await
            .map_err(DbError::from_pg)?;
        Ok(ExecOutcome {
            affected_rows,
            last_insert_id: None,
        })
    }

    async fn begin(&self) -> DbResult<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(DbError::from_pg)
    }

    async fn commit(&self) -> DbResult<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(DbError::from_pg)
    }

    async fn rollback(&self) -> DbResult<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(DbError::from_pg)
    }

    async fn ping(&self) -> DbResult<()> {
        if self.client.is_closed() {
            return Err(DbError::Connection("connection is closed".into()));
        }
        self.client
            .batch_execute("SELECT 1")
            .await
            .map_err(DbError::from_pg)
    }

    async fn close(&self) -> DbResult<()> {
        let driver = self
            .driver
            .lock()
            .map_err(|_| DbError::Other("connection driver lock poisoned".into()))?
            .take();
        if let Some(driver) = driver {
            driver.abort();
        }
        Ok(())
    }
}

/// Connect with the configured settings and wrap the connection in a [`Db`].
///
/// PostgreSQL speaks the ANSI dialect; any other configured dialect is
/// rejected.
pub async fn connect(config: &DbConfig) -> DbResult<Db<PgConnection>> {
    let dialect = config.require_dialect()?;
    if dialect != DialectKind::Ansi {
        return Err(DbError::config(format!(
            "PostgreSQL connections need the ansi dialect, not {dialect}"
        )));
    }
    let conn = PgConnection::connect(config).await?;
    Db::with_config(conn, config)
}

// ==================== Encoding ====================

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => encode_bool(*b, ty, out),
            Value::Int(n) => encode_int(*n, ty, out),
            Value::Float(f) => encode_float(*f, ty, out),
            Value::Text(s) => encode_text(s, ty, out),
            Value::Bytes(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ if is_text(ty) => String::from_utf8(b.clone())?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {} parameter to {ty}", value.type_name()).into()
}

fn encode_bool(b: bool, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::BOOL => b.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 => encode_int(i64::from(b), ty, out),
        _ if is_text(ty) => b.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Value::Bool(b), ty)),
    }
}

fn encode_int(n: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(n)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(n)?.to_sql(ty, out),
        Type::INT8 => n.to_sql(ty, out),
        Type::OID => u32::try_from(n)?.to_sql(ty, out),
        Type::FLOAT4 => (n as f32).to_sql(ty, out),
        Type::FLOAT8 => (n as f64).to_sql(ty, out),
        Type::BOOL => (n != 0).to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::from(n).to_sql(ty, out),
        _ if is_text(ty) => n.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Value::Int(n), ty)),
    }
}

fn encode_float(f: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::from(f).to_sql(ty, out),
        _ if is_text(ty) => f.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Value::Float(f), ty)),
    }
}

fn encode_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            encode_int(s.trim().parse()?, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => encode_float(s.trim().parse()?, ty, out),
        Type::BOOL => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "on" => true.to_sql(ty, out),
            "0" | "f" | "false" | "no" | "off" => false.to_sql(ty, out),
            _ => Err(format!("'{s}' is not a boolean").into()),
        },
        Type::JSON | Type::JSONB => {
            let json = serde_json::from_str(s)
                .unwrap_or_else(|_| serde_json::Value::String(s.to_string()));
            json.to_sql(ty, out)
        }
        Type::TIMESTAMP => parse_naive_datetime(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc).to_sql(ty, out),
            Err(_) => parse_naive_datetime(s)?.and_utc().to_sql(ty, out),
        },
        Type::DATE => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime, BoxError> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| format!("'{s}' is not a timestamp: {e}").into())
}

// ==================== Decoding ====================

fn column_names(row: &PgRow) -> Arc<[String]> {
    row.columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into()
}

fn decode_row(row: &PgRow, columns: &Arc<[String]>) -> DbResult<Row> {
    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| decode_value(row, i, column.type_()))
        .collect::<DbResult<Vec<_>>>()?;
    Row::new(Arc::clone(columns), values)
}

fn decode_value(row: &PgRow, idx: usize, ty: &Type) -> DbResult<Value> {
    fn get<'a, T>(row: &'a PgRow, idx: usize) -> DbResult<Option<T>>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(idx).map_err(|e| {
            let name = row.columns()[idx].name();
            DbError::decode(name, e.to_string())
        })
    }

    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, idx)?.map(|j| Value::Text(j.to_string()))
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(Value::from),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?.map(Value::from),
        Type::DATE => get::<NaiveDate>(row, idx)?.map(Value::from),
        _ => get::<String>(row, idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decodes rows of a `query_raw` stream, sharing one column list.
struct DecodeRowStream<S> {
    inner: Pin<Box<S>>,
    columns: Option<Arc<[String]>>,
}

impl<S> DecodeRowStream<S> {
    fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
            columns: None,
        }
    }
}

impl<S> Stream for DecodeRowStream<S>
where
    S: Stream<Item = Result<PgRow, tokio_postgres::Error>> + Send + 'static,
{
    type Item = DbResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => {
                let columns = self
                    .columns
                    .get_or_insert_with(|| column_names(&row))
                    .clone();
                Poll::Ready(Some(decode_row(&row, &columns)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(DbError::from_pg(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
