//! Execution and pool configuration.

use serde::Deserialize;
use tracing::Level;

use crate::pool::{ARG_LISTS, COND_LISTS, EXPR_NODES, ROWS, STMTS, SUB_STMTS, WRITERS};
use crate::writer::Dialect;

/// Level of the per-statement SQL event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Configuration for [`Executor`](crate::Executor).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Placeholder syntax of the target database.
    pub dialect: Dialect,
    /// Prefix of the prepared statement name used for batched inserts.
    pub statement_prefix: String,
    /// Deallocate the batch statement once the batch completes.
    pub deallocate_after_batch: bool,
    /// Level of the per-statement SQL event.
    pub log_level: LogLevel,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            statement_prefix: "sql_".to_string(),
            deallocate_after_batch: true,
            log_level: LogLevel::Debug,
            max_sql_length: Some(200),
        }
    }
}

impl ExecConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn statement_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.statement_prefix = prefix.into();
        self
    }

    /// Keep batch statements prepared after the batch completes.
    pub fn keep_batch_statements(mut self) -> Self {
        self.deallocate_after_batch = false;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

/// Idle limits of the process-wide pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub writers: usize,
    pub arg_lists: usize,
    pub exprs: usize,
    pub cond_lists: usize,
    pub rows: usize,
    pub stmts: usize,
    pub sub_stmts: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            writers: 256,
            arg_lists: 1024,
            exprs: 1024,
            cond_lists: 1024,
            rows: 1024,
            stmts: 256,
            sub_stmts: 256,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the limits to the process-wide pools.
    pub fn apply(&self) {
        WRITERS.set_max_idle(self.writers);
        ARG_LISTS.set_max_idle(self.arg_lists);
        EXPR_NODES.set_max_idle(self.exprs);
        COND_LISTS.set_max_idle(self.cond_lists);
        ROWS.set_max_idle(self.rows);
        STMTS.set_max_idle(self.stmts);
        SUB_STMTS.set_max_idle(self.sub_stmts);
        tracing::debug!(
            target: "sqlstmt.pool",
            writers = self.writers,
            arg_lists = self.arg_lists,
            exprs = self.exprs,
            cond_lists = self.cond_lists,
            rows = self.rows,
            stmts = self.stmts,
            sub_stmts = self.sub_stmts,
            "pool limits applied"
        );
    }
}
