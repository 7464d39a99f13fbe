//! Record metadata and the per-type column cache.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::value::Value;

/// Column metadata for one field of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Rust field identifier.
    pub ident: &'static str,
    /// Explicit column tag (`#[orm(column = "...")]`), if any.
    pub column: Option<&'static str>,
}

impl Field {
    pub const fn new(ident: &'static str, column: Option<&'static str>) -> Self {
        Self { ident, column }
    }

    /// The column tag when present and non-empty, otherwise the field identifier.
    pub fn column_name(&self) -> &'static str {
        match self.column {
            Some(column) if !column.is_empty() => column,
            _ => self.ident,
        }
    }
}

/// A struct whose fields map onto the columns of one table.
///
/// Usually derived with `#[derive(Record)]`.
pub trait Record {
    /// Table name from `#[orm(table = "...")]`.
    const TABLE: Option<&'static str> = None;

    /// Fields in declaration order.
    const FIELDS: &'static [Field];

    /// Visit every field value in declaration order.
    fn visit_values(&self, f: &mut dyn FnMut(Value));
}

/// A copyable descriptor of a [`Record`] type.
#[derive(Debug, Clone, Copy)]
pub struct RecordType {
    key: &'static str,
    fields: &'static [Field],
    table: Option<&'static str>,
}

impl RecordType {
    pub fn of<T: Record + ?Sized>() -> Self {
        Self {
            key: type_name::<T>(),
            fields: T::FIELDS,
            table: T::TABLE,
        }
    }

    /// Fully-qualified type name, the cache key.
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    pub fn table(&self) -> Option<&'static str> {
        self.table
    }
}

/// Object-safe view of a record instance.
pub trait AnyRecord {
    fn record_type(&self) -> RecordType;
    fn each_value(&self, f: &mut dyn FnMut(Value));
}

impl<T: Record> AnyRecord for T {
    fn record_type(&self) -> RecordType {
        RecordType::of::<T>()
    }

    fn each_value(&self, f: &mut dyn FnMut(Value)) {
        self.visit_values(f)
    }
}

/// Ordered column lists keyed by record type.
///
/// Entries are written once per type and read many times. Concurrent first
/// lookups of the same type may both compute the list; the first insert wins.
#[derive(Debug, Default)]
pub struct ColumnCache {
    entries: RwLock<HashMap<&'static str, Arc<[&'static str]>>>,
}

impl ColumnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used by statements without an injected one.
    pub fn global() -> &'static ColumnCache {
        static GLOBAL: OnceLock<ColumnCache> = OnceLock::new();
        GLOBAL.get_or_init(ColumnCache::new)
    }

    /// Column names of `ty` in field declaration order.
    pub fn resolve(&self, ty: RecordType) -> Arc<[&'static str]> {
        if let Some(columns) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty.key)
        {
            return Arc::clone(columns);
        }

        let columns: Arc<[&'static str]> = ty.fields.iter().map(Field::column_name).collect();
        tracing::trace!(
            target: "sqlstmt.cache",
            record = ty.key,
            columns = columns.len(),
            "column cache populated"
        );

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(ty.key).or_insert(columns))
    }

    pub fn resolve_for<T: Record + ?Sized>(&self) -> Arc<[&'static str]> {
        self.resolve(RecordType::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
