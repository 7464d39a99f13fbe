//! # sqlstmt
//!
//! A SQL statement and condition compiler with dialect-aware placeholders.
//!
//! ## Features
//!
//! - **Fluent statements**: INSERT / DELETE / UPDATE / SELECT assembled from tables,
//!   records, maps, positional rows and sub-statements
//! - **Condition algebra**: composable AND/OR trees that simplify as they are built
//! - **Two-pass rendering**: dialect-neutral `??` markers rewritten to `?` or `$n`
//! - **Pooled buffers**: writers, argument lists, condition nodes and statements are recycled
//! - **Batched inserts**: multi-row inserts run as one prepared statement per batch
//!
//! ## Example
//!
//! ```ignore
//! use sqlstmt::{Data, Dialect, Executor, FromRow, PgDriver, Record, Writer, expr, select};
//!
//! #[derive(Record, FromRow)]
//! #[orm(table = "student")]
//! struct Student {
//!     uid: i64,
//!     username: String,
//!     #[orm(column = "nick")]
//!     nickname: String,
//! }
//!
//! let mut stmt = select(Data::of::<Student>());
//! stmt.where_(expr("uid = ??", [100])).limit(10);
//!
//! let mut w = Writer::acquire();
//! let (sql, args) = stmt.build(&mut w, Dialect::Postgres)?;
//! // SELECT uid,username,nick FROM student WHERE uid = $1 LIMIT 10
//!
//! let driver = PgDriver::new(client);
//! let students: Vec<Student> = Executor::new(&driver).fetch_all(&stmt).await?;
//! ```

pub mod cache;
pub mod cond;
pub mod config;
pub mod error;
pub mod exec;
pub mod pool;
pub mod stmt;
pub mod value;
pub mod writer;

pub use cache::{AnyRecord, ColumnCache, Field, Record, RecordType};
pub use cond::{Cond, CondList, Expr, and, expr, or, raw};
pub use config::{ExecConfig, LogLevel, PoolConfig};
pub use error::{BatchError, RowFailure, SqlError, SqlResult};
pub use exec::{Batch, Driver, Executor, FromRow, PgDriver, PgStatement, RowSource, ValueRow};
pub use pool::{ArgList, Pool, Pooled, Recycle, Shared, arg_list};
pub use stmt::{
    Data, FromItem, Map, Operand, Query, Stmt, StmtKind, delete, insert, insert_bulk, select, sql,
    update,
};
pub use value::{FromValue, ToValue, Value, ValueError};
pub use writer::{Dialect, PLACEHOLDER, Writer};

#[cfg(feature = "derive")]
pub use sqlstmt_derive::{FromRow, Record};
