//! Connection trait the builder executes through.
//!
//! The builder never talks to a driver directly: it hands rendered SQL (with
//! positional `?` placeholders) and [`Value`] parameters to a [`Connection`].
//! [`PgConnection`](crate::PgConnection) is the provided implementation; any
//! other driver can be plugged in by implementing the trait.

use crate::error::DbResult;
use crate::row::Row;
use crate::value::Value;
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted.
    pub affected_rows: u64,
    /// Identity generated by an INSERT, if the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// A database connection.
pub trait Connection: Send + Sync + 'static {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Execute a query and return its rows as a stream.
    ///
    /// The default implementation materializes the rows first.
    fn query_stream(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<RowStream>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(RowStream::from_rows(rows))
        }
    }

    /// Execute a statement and return its affected-row count and identity.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ExecOutcome>> + Send;

    fn begin(&self) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.execute("BEGIN", &[]).await.map(|_| ()) }
    }

    fn commit(&self) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.execute("COMMIT", &[]).await.map(|_| ()) }
    }

    fn rollback(&self) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.execute("ROLLBACK", &[]).await.map(|_| ()) }
    }

    /// Check that the connection is alive.
    fn ping(&self) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.query("SELECT 1", &[]).await.map(|_| ()) }
    }

    /// Close the connection. Further calls may fail.
    fn close(&self) -> impl Future<Output = DbResult<()>> + Send {
        async { Ok(()) }
    }
}

/// A stream of rows, consumed one at a time.
#[must_use]
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = DbResult<Row>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DbResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Stream over already materialized rows.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(VecRowStream {
            rows: rows.into_iter(),
        })
    }
}

impl Stream for RowStream {
    type Item = DbResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct VecRowStream {
    rows: std::vec::IntoIter<Row>,
}

impl Stream for VecRowStream {
    type Item = DbResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.rows.next().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
