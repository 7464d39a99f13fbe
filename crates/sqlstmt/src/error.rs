//! Error types for sqlstmt

use thiserror::Error;

/// Result type alias for sqlstmt operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Error types for statement generation and execution
#[derive(Debug, Error)]
pub enum SqlError {
    /// The statement has no target table (INSERT) or no from-item (DELETE/UPDATE/SELECT)
    #[error("no table name")]
    NoTableName,

    /// INSERT without columns and without an insert-select source
    #[error("no column to insert")]
    NoColumnToInsert,

    /// INSERT without any row of values
    #[error("no value to insert")]
    NoValueToInsert,

    /// Negative LIMIT or OFFSET
    #[error("invalid limitation: limit and offset must be non-negative")]
    InvalidLimitation,

    /// A builder method received an input shape it cannot use, or the
    /// statement kind cannot be rendered
    #[error("not supported type: {0}")]
    NotSupportedType(String),

    /// A single-row fetch returned no rows
    #[error("row not found")]
    RowNotFound,

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// One or more rows of a batched multi-row insert failed
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SqlError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-input error
    pub fn not_supported(what: impl Into<String>) -> Self {
        Self::NotSupportedType(what.into())
    }

    /// Check if this is a row-not-found error
    pub fn is_row_not_found(&self) -> bool {
        matches!(self, Self::RowNotFound)
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this error was raised while assembling SQL text, before any
    /// driver call.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NoTableName
                | Self::NoColumnToInsert
                | Self::NoValueToInsert
                | Self::InvalidLimitation
                | Self::NotSupportedType(_)
        )
    }

    /// Parse a tokio_postgres error into a more specific SqlError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

/// A failed row of a batched insert.
#[derive(Debug, Error)]
#[error("row {index}: {error}")]
pub struct RowFailure {
    /// Zero-based position of the row in the batch.
    pub index: usize,
    #[source]
    pub error: SqlError,
}

/// Aggregated outcome of a batch in which at least one row failed.
///
/// Rows that succeeded still count towards `affected`, so a partial success is
/// observable by the caller.
#[derive(Debug, Default, Error)]
#[error(
    "batch failed for {} row(s), {} row(s) affected{}",
    .failures.len(),
    .affected,
    FailureList(.failures)
)]
pub struct BatchError {
    pub affected: u64,
    pub failures: Vec<RowFailure>,
}

impl BatchError {
    /// Indexes of the rows that failed, in batch order.
    pub fn failed_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.failures.iter().map(|f| f.index)
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

// "; row 1: ...; row 4: ..." suffix of the batch message.
struct FailureList<'a>(&'a [RowFailure]);

impl std::fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for failure in self.0 {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_error_lists_failed_rows() {
        let err = BatchError {
            affected: 2,
            failures: vec![RowFailure {
                index: 1,
                error: SqlError::UniqueViolation("student_pkey: duplicate key".to_string()),
            }],
        };
        assert_eq!(err.failed_rows().collect::<Vec<_>>(), vec![1]);
        assert_eq!(
            err.to_string(),
            "batch failed for 1 row(s), 2 row(s) affected; row 1: Unique constraint violation: student_pkey: duplicate key"
        );
    }

    #[test]
    fn batch_error_wraps_row_failures() {
        let err = SqlError::from(BatchError {
            affected: 1,
            failures: vec![
                RowFailure {
                    index: 0,
                    error: SqlError::CheckViolation("age_check: negative".to_string()),
                },
                RowFailure {
                    index: 2,
                    error: SqlError::RowNotFound,
                },
            ],
        });
        assert_eq!(
            err.to_string(),
            "batch failed for 2 row(s), 1 row(s) affected; \
             row 0: Check constraint violation: age_check: negative; row 2: row not found"
        );

        let SqlError::Batch(report) = &err else {
            panic!("expected a batch error");
        };
        let source = std::error::Error::source(&report.failures[0]);
        assert!(source.is_some_and(|e| e.to_string().starts_with("Check constraint")));
        assert_eq!(
            BatchError::default().to_string(),
            "batch failed for 0 row(s), 0 row(s) affected"
        );
    }

    #[test]
    fn structural_errors() {
        assert!(SqlError::NoTableName.is_structural());
        assert!(SqlError::not_supported("map").is_structural());
        assert!(!SqlError::RowNotFound.is_structural());
        assert!(SqlError::RowNotFound.is_row_not_found());
    }
}
