//! Execution dispatch.
//!
//! [`Executor`] renders a [`Stmt`] and hands the SQL to a [`Driver`]. Multi-row
//! inserts go through a prepared statement and one pipelined batch entry per
//! row; everything else is a single driver call.

mod pg;
mod registry;
mod row;

pub use pg::{PgDriver, PgStatement};
pub use row::{FromRow, RowSource, ValueRow};

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::config::{ExecConfig, LogLevel};
use crate::error::{BatchError, RowFailure, SqlError, SqlResult};
use crate::stmt::{Stmt, StmtKind};
use crate::value::Value;
use crate::writer::Writer;

/// A prepared statement handle with one queued argument group per row.
#[derive(Debug, Clone)]
pub struct Batch<'a, S> {
    pub statement: &'a S,
    pub entries: Vec<&'a [Value]>,
}

impl<'a, S> Batch<'a, S> {
    pub fn new(statement: &'a S) -> Self {
        Self {
            statement,
            entries: Vec::new(),
        }
    }

    pub fn queue(&mut self, args: &'a [Value]) {
        self.entries.push(args);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The database capability consumed by [`Executor`].
///
/// Placeholders in `sql` are already rewritten for the driver's dialect.
pub trait Driver: Send + Sync {
    type Row: RowSource + Send;

    /// Handle of a prepared statement, owned by the caller that prepared it.
    type Statement: Send + Sync;

    /// Execute a statement and return the number of affected rows.
    fn exec(&self, sql: &str, args: &[Value]) -> impl Future<Output = SqlResult<u64>> + Send;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = SqlResult<Vec<Self::Row>>> + Send;

    /// Prepare `sql` under `name` and return a handle to it.
    ///
    /// Preparing a name twice is not an error. Each call returns its own
    /// handle, which stays usable until it is passed to
    /// [`deallocate`](Self::deallocate) even if other callers release theirs.
    fn prepare(
        &self,
        name: &str,
        sql: &str,
    ) -> impl Future<Output = SqlResult<Self::Statement>> + Send;

    /// Send every queued entry of `batch`.
    ///
    /// The outer error is for failures that prevent sending the batch at all;
    /// the inner results are per entry, in queue order.
    fn send_batch(
        &self,
        batch: &Batch<'_, Self::Statement>,
    ) -> impl Future<Output = SqlResult<Vec<SqlResult<u64>>>> + Send;

    /// Release `statement`. Handles returned to other callers are unaffected.
    fn deallocate(&self, statement: Self::Statement)
    -> impl Future<Output = SqlResult<()>> + Send;

    fn begin(&self) -> impl Future<Output = SqlResult<()>> + Send {
        async move { self.exec("BEGIN", &[]).await.map(|_| ()) }
    }

    fn commit(&self) -> impl Future<Output = SqlResult<()>> + Send {
        async move { self.exec("COMMIT", &[]).await.map(|_| ()) }
    }

    fn rollback(&self) -> impl Future<Output = SqlResult<()>> + Send {
        async move { self.exec("ROLLBACK", &[]).await.map(|_| ()) }
    }
}

/// Renders statements and dispatches them to a [`Driver`].
///
/// # Example
///
/// ```ignore
/// use sqlstmt::{Executor, PgDriver, insert_bulk};
///
/// let driver = PgDriver::new(client);
/// let executor = Executor::new(&driver);
///
/// let stmt = insert_bulk(&students);
/// let affected = executor.exec(&stmt).await?;
/// ```
pub struct Executor<'d, D> {
    driver: &'d D,
    config: ExecConfig,
}

impl<'d, D: Driver> Executor<'d, D> {
    pub fn new(driver: &'d D) -> Self {
        Self::with_config(driver, ExecConfig::default())
    }

    pub fn with_config(driver: &'d D, config: ExecConfig) -> Self {
        Self { driver, config }
    }

    pub fn driver(&self) -> &'d D {
        self.driver
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Execute `stmt` and return the number of affected rows.
    ///
    /// For a SELECT this is the number of rows returned. For a multi-row insert
    /// it is the sum over all rows; if any row fails the result is
    /// [`SqlError::Batch`] carrying the partial count and every row failure.
    pub async fn exec(&self, stmt: &Stmt) -> SqlResult<u64> {
        let mut w = Writer::acquire();
        stmt.render(&mut w, self.config.dialect)?;
        self.log(stmt.kind(), &w);

        if !w.bulk_args().is_empty() {
            return self.exec_batch(&w).await;
        }

        match stmt.kind() {
            StmtKind::Select => {
                let rows = self.driver.query(w.as_str(), w.args()).await?;
                Ok(rows.len() as u64)
            }
            _ => self.driver.exec(w.as_str(), w.args()).await,
        }
    }

    /// Fetch every row of a SELECT.
    pub async fn fetch_all<T: FromRow>(&self, stmt: &Stmt) -> SqlResult<Vec<T>> {
        let rows = self.query_rows(stmt).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Fetch the first row of a SELECT.
    ///
    /// Returns [`SqlError::RowNotFound`] when the query yields no rows.
    pub async fn fetch_one<T: FromRow>(&self, stmt: &Stmt) -> SqlResult<T> {
        let rows = self.query_rows(stmt).await?;
        match rows.first() {
            Some(row) => T::from_row(row),
            None => Err(SqlError::RowNotFound),
        }
    }

    /// Fetch every row of a SELECT as a column-name keyed map.
    pub async fn fetch_maps(&self, stmt: &Stmt) -> SqlResult<Vec<BTreeMap<String, Value>>> {
        self.fetch_all(stmt).await
    }

    /// Fetch every row of a SELECT as values in column order.
    pub async fn fetch_arrays(&self, stmt: &Stmt) -> SqlResult<Vec<Vec<Value>>> {
        self.fetch_all(stmt).await
    }

    pub async fn begin(&self) -> SqlResult<()> {
        self.driver.begin().await
    }

    pub async fn commit(&self) -> SqlResult<()> {
        self.driver.commit().await
    }

    pub async fn rollback(&self) -> SqlResult<()> {
        self.driver.rollback().await
    }

    async fn query_rows(&self, stmt: &Stmt) -> SqlResult<Vec<D::Row>> {
        if stmt.kind() != StmtKind::Select {
            return Err(SqlError::not_supported(format!(
                "cannot fetch rows from a {} statement",
                stmt.kind()
            )));
        }

        let mut w = Writer::acquire();
        stmt.render(&mut w, self.config.dialect)?;
        self.log(stmt.kind(), &w);
        self.driver.query(w.as_str(), w.args()).await
    }

    async fn exec_batch(&self, w: &Writer) -> SqlResult<u64> {
        let name = statement_name(&self.config.statement_prefix, w.as_str());
        let statement = self.driver.prepare(&name, w.as_str()).await?;

        let (rows, results) = {
            let mut batch = Batch::new(&statement);
            for group in w.bulk_args() {
                batch.queue(group.as_slice());
            }
            (batch.len(), self.driver.send_batch(&batch).await)
        };

        if self.config.deallocate_after_batch {
            if let Err(err) = self.driver.deallocate(statement).await {
                tracing::warn!(
                    target: "sqlstmt.exec",
                    statement = %name,
                    error = %err,
                    "failed to deallocate batch statement"
                );
            }
        }

        let mut report = BatchError::default();
        for (index, result) in results?.into_iter().enumerate() {
            match result {
                Ok(n) => report.affected += n,
                Err(error) => report.failures.push(RowFailure { index, error }),
            }
        }

        if report.is_empty() {
            return Ok(report.affected);
        }
        tracing::warn!(
            target: "sqlstmt.exec",
            statement = %name,
            rows,
            failed = report.failures.len(),
            affected = report.affected,
            "batch insert had failing rows"
        );
        Err(report.into())
    }

    fn log(&self, kind: StmtKind, w: &Writer) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    LogLevel::Off => {}
                    LogLevel::Error => tracing::error!($($field)*),
                    LogLevel::Warn => tracing::warn!($($field)*),
                    LogLevel::Info => tracing::info!($($field)*),
                    LogLevel::Debug => tracing::debug!($($field)*),
                    LogLevel::Trace => tracing::trace!($($field)*),
                }
            };
        }

        let sql = match self.config.max_sql_length {
            Some(max) => truncate_sql(w.as_str(), max),
            None => Cow::Borrowed(w.as_str()),
        };
        emit_at_level!(
            self.config.log_level,
            target: "sqlstmt.sql",
            kind = %kind,
            param_count = w.args().len(),
            rows = w.bulk_args().len(),
            sql = %sql,
        );
    }
}

/// Deterministic prepared statement name for `sql`.
pub(crate) fn statement_name(prefix: &str, sql: &str) -> String {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    format!("{prefix}{:016x}", hasher.finish())
}

/// Truncate `sql` to at most `max_bytes`, stepping back to a char boundary.
pub(crate) fn truncate_sql(sql: &str, max_bytes: usize) -> Cow<'_, str> {
    if sql.len() <= max_bytes {
        return Cow::Borrowed(sql);
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}...", &sql[..end]))
}

#[cfg(test)]
mod tests;
