//! Row decoding traits.

use std::collections::BTreeMap;

use crate::error::{SqlError, SqlResult};
use crate::value::{FromValue, Value};

/// A fetched row whose columns decode into [`Value`]s.
pub trait RowSource {
    /// Number of columns.
    fn len(&self) -> usize;

    /// Name of the column at `index`.
    fn column_name(&self, index: usize) -> Option<&str>;

    /// Decoded value of the column at `index`.
    fn value(&self, index: usize) -> SqlResult<Value>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the first column named `name`.
    fn index_of(&self, name: &str) -> Option<usize> {
        (0..self.len()).find(|&i| self.column_name(i) == Some(name))
    }

    /// Decode the column named `column`, returning [`SqlError::Decode`] on failure.
    fn try_get_column<T: FromValue>(&self, column: &str) -> SqlResult<T>
    where
        Self: Sized,
    {
        let index = self
            .index_of(column)
            .ok_or_else(|| SqlError::decode(column, "column not found"))?;
        let value = self.value(index)?;
        T::from_value(value).map_err(|e| SqlError::decode(column, e.to_string()))
    }
}

/// Trait for converting a fetched row into a Rust struct.
///
/// This trait should typically be derived using `#[derive(FromRow)]`. Each
/// field reads the column named by its `#[orm(column = "...")]` tag, or by the
/// field name when the tag is absent.
///
/// # Example
///
/// ```ignore
/// use sqlstmt::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     username: String,
///     email: Option<String>,
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row<R: RowSource>(row: &R) -> SqlResult<Self>;
}

impl FromRow for BTreeMap<String, Value> {
    fn from_row<R: RowSource>(row: &R) -> SqlResult<Self> {
        let mut map = BTreeMap::new();
        for i in 0..row.len() {
            let name = row
                .column_name(i)
                .ok_or_else(|| SqlError::decode(i.to_string(), "column has no name"))?;
            map.insert(name.to_string(), row.value(i)?);
        }
        Ok(map)
    }
}

impl FromRow for Vec<Value> {
    fn from_row<R: RowSource>(row: &R) -> SqlResult<Self> {
        (0..row.len()).map(|i| row.value(i)).collect()
    }
}

/// An owned row of named values.
///
/// Useful for drivers that materialize results eagerly, and for tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRow {
    columns: Vec<(String, Value)>,
}

impl ValueRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }
}

impl RowSource for ValueRow {
    fn len(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|(name, _)| name.as_str())
    }

    fn value(&self, index: usize) -> SqlResult<Value> {
        self.columns
            .get(index)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| SqlError::decode(index.to_string(), "column index out of range"))
    }
}
