//! [`Driver`] over a `tokio_postgres::Client`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::future::join_all;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Row, Statement};
use uuid::Uuid;

use super::registry::{Lookup, StatementRegistry};
use super::{Batch, Driver, RowSource};
use crate::error::{SqlError, SqlResult};
use crate::value::Value;

/// A statement prepared through [`PgDriver`].
///
/// The server-side statement is closed once the last handle, including the
/// driver's registry entry, is dropped.
#[derive(Debug, Clone)]
pub struct PgStatement {
    name: String,
    id: u64,
    statement: Statement,
}

impl PgStatement {
    /// Registry name the statement was prepared under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

/// PostgreSQL driver.
///
/// Prepared statements live in a name-keyed registry that also records their
/// SQL, so a name is only reused for the text it was prepared from.
pub struct PgDriver {
    client: Client,
    prepared: StatementRegistry<PgStatement>,
    next_id: AtomicU64,
}

impl PgDriver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            prepared: StatementRegistry::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Number of statements currently registered by this driver.
    pub fn prepared_count(&self) -> usize {
        self.prepared.len()
    }
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Driver for PgDriver {
    type Row = Row;
    type Statement = PgStatement;

    async fn exec(&self, sql: &str, args: &[Value]) -> SqlResult<u64> {
        self.client
            .execute(sql, &params(args))
            .await
            .map_err(SqlError::from_db_error)
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqlResult<Vec<Row>> {
        self.client
            .query(sql, &params(args))
            .await
            .map_err(SqlError::from_db_error)
    }

    async fn prepare(&self, name: &str, sql: &str) -> SqlResult<PgStatement> {
        let register = match self.prepared.get(name, sql) {
            Lookup::Hit(statement) => return Ok(statement),
            Lookup::Miss => true,
            Lookup::Collision => {
                tracing::warn!(
                    target: "sqlstmt.exec",
                    statement = %name,
                    "statement name already holds different SQL, preparing unregistered"
                );
                false
            }
        };

        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(SqlError::from_db_error)?;
        let statement = PgStatement {
            name: name.to_string(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            statement,
        };
        if register {
            Ok(self.prepared.insert_if_absent(name, sql, statement))
        } else {
            Ok(statement)
        }
    }

    async fn send_batch(&self, batch: &Batch<'_, PgStatement>) -> SqlResult<Vec<SqlResult<u64>>> {
        let statement = &batch.statement.statement;
        let pending = batch.entries.iter().map(|args| async move {
            self.client
                .execute(statement, &params(args))
                .await
                .map_err(SqlError::from_db_error)
        });
        Ok(join_all(pending).await)
    }

    async fn deallocate(&self, statement: PgStatement) -> SqlResult<()> {
        // Another caller may have re-registered the name since; leave theirs.
        self.prepared
            .remove_if(&statement.name, |registered| registered.id == statement.id);
        Ok(())
    }

    async fn begin(&self) -> SqlResult<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(SqlError::from_db_error)
    }

    async fn commit(&self) -> SqlResult<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(SqlError::from_db_error)
    }

    async fn rollback(&self) -> SqlResult<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(SqlError::from_db_error)
    }
}

impl RowSource for Row {
    fn len(&self) -> usize {
        Row::len(self)
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns().get(index).map(|c| c.name())
    }

    fn value(&self, index: usize) -> SqlResult<Value> {
        let column = self
            .columns()
            .get(index)
            .ok_or_else(|| SqlError::decode(index.to_string(), "column index out of range"))?;

        macro_rules! get {
            ($ty:ty) => {
                self.try_get::<_, Option<$ty>>(index)
                    .map(Value::from)
                    .map_err(|e| SqlError::decode(column.name(), e.to_string()))
            };
        }

        match *column.type_() {
            Type::BOOL => get!(bool),
            Type::INT2 => get!(i16),
            Type::INT4 => get!(i32),
            Type::INT8 => get!(i64),
            Type::OID => get!(u32),
            Type::FLOAT4 => get!(f32),
            Type::FLOAT8 => get!(f64),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                get!(String)
            }
            Type::BYTEA => get!(Vec<u8>),
            Type::DATE => get!(NaiveDate),
            Type::TIMESTAMP => get!(NaiveDateTime),
            Type::TIMESTAMPTZ => get!(DateTime<Utc>),
            Type::UUID => get!(Uuid),
            Type::JSON | Type::JSONB => get!(serde_json::Value),
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get!(Vec<String>),
            Type::INT8_ARRAY => get!(Vec<i64>),
            ref other => Err(SqlError::decode(
                column.name(),
                format!("unsupported column type {other}"),
            )),
        }
    }
}
