//! Database drivers.
//!
//! The [`Driver`] trait is the minimal database-operations contract the
//! adapter runs on: one underlying query-execution call that `exec`,
//! [`fetch_one`](Driver::fetch_one) and [`fetch_all`](Driver::fetch_all) all
//! route through, plus a way to check out a dedicated connection for a
//! transaction.
//!
//! Two shims satisfy the contract: [`PoolDriver`] over a connection pool and
//! [`ClientDriver`] over a single direct connection. They produce identical
//! SQL and identical error behavior, differing only in how the transactional
//! connection is obtained (pool checkout versus an exclusive lock on the one
//! connection).

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgConnection, PgPool, Postgres};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::AdapterError;
use crate::value::{bind_value, decode_row, SqlRow, SqlValue};

/// The single query-execution path both drivers and [`TxOps`] share.
async fn run_query<'e, E>(
    executor: E,
    sql: &str,
    args: &[SqlValue],
) -> Result<Vec<SqlRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let mut query = sqlx::query(sql);
    for value in args {
        query = bind_value(query, value);
    }
    let rows = query.fetch_all(executor).await?;
    rows.iter().map(decode_row).collect()
}

/// The database-operations contract the adapter is generic over.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Runs a statement and returns every result row. All other operations
    /// route through this call.
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, sqlx::Error>;

    /// Checks out a dedicated connection and opens a transaction on it.
    async fn begin(&self) -> Result<TxOps, sqlx::Error>;

    /// Runs a statement for its side effect.
    async fn exec(&self, sql: &str, args: &[SqlValue]) -> Result<(), sqlx::Error> {
        self.query(sql, args).await.map(|_| ())
    }

    /// Returns the first result row, or `None` for an empty result set.
    async fn fetch_one(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Option<SqlRow>, sqlx::Error> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    /// Returns all result rows in result order.
    async fn fetch_all(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, sqlx::Error> {
        self.query(sql, args).await
    }
}

/// Connection-pool driver. Plain queries run on pooled connections;
/// transactions check a connection out for their whole lifetime.
#[derive(Debug, Clone)]
pub struct PoolDriver {
    pool: PgPool,
}

impl PoolDriver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the given database URL.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self::new(PgPool::connect(url).await?))
    }
}

#[async_trait]
impl Driver for PoolDriver {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, sqlx::Error> {
        run_query(&self.pool, sql, args).await
    }

    async fn begin(&self) -> Result<TxOps, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN").execute(&mut *conn).await?;
        Ok(TxOps {
            conn: TxConn::Pooled(conn),
        })
    }
}

/// Direct-client driver over one shared connection. Statements serialize on
/// an async mutex; a transaction holds the lock until commit or rollback, so
/// no other operation can interleave statements on the connection.
#[derive(Debug, Clone)]
pub struct ClientDriver {
    conn: Arc<Mutex<PgConnection>>,
}

impl ClientDriver {
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens a single connection to the given database URL.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self::new(PgConnection::connect(url).await?))
    }
}

#[async_trait]
impl Driver for ClientDriver {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<SqlRow>, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        run_query(&mut *conn, sql, args).await
    }

    async fn begin(&self) -> Result<TxOps, sqlx::Error> {
        let mut guard = Arc::clone(&self.conn).lock_owned().await;
        sqlx::query("BEGIN").execute(&mut *guard).await?;
        Ok(TxOps {
            conn: TxConn::Direct(guard),
        })
    }
}

enum TxConn {
    Pooled(PoolConnection<Postgres>),
    Direct(OwnedMutexGuard<PgConnection>),
}

/// Operations handle scoped to one open transaction.
///
/// Holds the dedicated connection for the transaction's lifetime. Dropping
/// the handle without calling [`commit`](TxOps::commit) releases the
/// connection with the transaction unfinished; the server rolls it back when
/// the connection is reused or closed.
pub struct TxOps {
    conn: TxConn,
}

impl TxOps {
    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            TxConn::Pooled(conn) => &mut **conn,
            TxConn::Direct(guard) => &mut **guard,
        }
    }

    /// Runs a statement inside the transaction for its side effect.
    pub async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<(), sqlx::Error> {
        run_query(self.conn(), sql, args).await.map(|_| ())
    }

    /// Returns the first result row inside the transaction, or `None`.
    pub async fn fetch_one(
        &mut self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Option<SqlRow>, sqlx::Error> {
        Ok(run_query(self.conn(), sql, args).await?.into_iter().next())
    }

    /// Returns all result rows inside the transaction.
    pub async fn fetch_all(
        &mut self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Vec<SqlRow>, sqlx::Error> {
        run_query(self.conn(), sql, args).await
    }

    /// Commits the transaction and releases its connection.
    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("COMMIT").execute(self.conn()).await.map(|_| ())
    }

    /// Rolls the transaction back, best effort. A rollback failure is logged
    /// and swallowed so the caller's original error is the one that
    /// propagates.
    pub async fn rollback(mut self) {
        if let Err(error) = sqlx::query("ROLLBACK").execute(self.conn()).await {
            tracing::warn!(%error, "transaction rollback failed");
        }
    }
}

/// Runs `callback` inside a transaction on a dedicated connection: commits on
/// success, rolls back and returns the callback's error on failure. At most
/// one transaction is opened per invocation, and nothing the callback writes
/// is visible to other connections before commit.
pub async fn run_in_transaction<D, F, T>(driver: &D, callback: F) -> Result<T, AdapterError>
where
    D: Driver + ?Sized,
    F: for<'t> FnOnce(&'t mut TxOps) -> BoxFuture<'t, Result<T, AdapterError>> + Send,
    T: Send,
{
    let mut tx = driver.begin().await?;
    match callback(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            tx.rollback().await;
            Err(error)
        }
    }
}
