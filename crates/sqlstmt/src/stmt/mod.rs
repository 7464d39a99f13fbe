//! The mutable statement model and its fluent builder.
//!
//! ```ignore
//! use sqlstmt::{Dialect, Writer, select, Map};
//!
//! let mut stmt = select(&student);
//! stmt.where_(Map::new().with("uid", 100)).limit(10);
//!
//! let mut w = Writer::acquire();
//! let (sql, args) = stmt.build(&mut w, Dialect::Postgres)?;
//! // SELECT uid,username,... FROM student WHERE uid = $1 LIMIT 10
//! ```

mod input;
mod render;

use std::borrow::Cow;
use std::fmt;
use std::iter;
use std::sync::Arc;

pub use input::{Data, FromItem, Map, Operand, Query};

use crate::cache::{AnyRecord, ColumnCache, Record, RecordType};
use crate::cond::{self, Cond};
use crate::pool::{Pooled, ROWS, Recycle, STMTS};
use crate::value::Value;
use crate::writer::PLACEHOLDER;

/// Statement kind, fixed by the first `insert/delete/update/select` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StmtKind {
    #[default]
    Raw,
    Insert,
    Delete,
    Update,
    Select,
}

impl StmtKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StmtKind::Raw => "RAW",
            StmtKind::Insert => "INSERT",
            StmtKind::Delete => "DELETE",
            StmtKind::Update => "UPDATE",
            StmtKind::Select => "SELECT",
        }
    }
}

impl fmt::Display for StmtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SQL operation under construction.
///
/// Rendering borrows the statement immutably, so a statement can be rendered
/// any number of times.
#[derive(Debug, Default)]
pub struct Stmt {
    kind: StmtKind,
    into: Cow<'static, str>,
    from: Vec<FromItem>,
    where_cond: Cond,
    group_by: String,
    having: Cond,
    order_by: String,
    limit: i64,
    offset: i64,
    insert_cols: Vec<Cow<'static, str>>,
    insert_rows: Vec<Pooled<Vec<Operand>>>,
    set_cols: Vec<(Cow<'static, str>, Operand)>,
    select_cols: Vec<Cow<'static, str>>,
    cache: Option<Arc<ColumnCache>>,
    build_error: Option<String>,
}

/// Acquire an empty statement from the process-wide pool.
pub fn sql() -> Pooled<Stmt> {
    STMTS.acquire()
}

/// `INSERT` statement. See [`Stmt::insert`].
pub fn insert<'a>(data: impl Into<Data<'a>>) -> Pooled<Stmt> {
    let mut stmt = sql();
    stmt.insert(data);
    stmt
}

/// Multi-row `INSERT` statement. See [`Stmt::insert_bulk`].
pub fn insert_bulk<'a, I>(rows: I) -> Pooled<Stmt>
where
    I: IntoIterator,
    I::Item: Into<Data<'a>>,
{
    let mut stmt = sql();
    stmt.insert_bulk(rows);
    stmt
}

/// `DELETE` statement. See [`Stmt::delete`].
pub fn delete<'a>(data: impl Into<Data<'a>>) -> Pooled<Stmt> {
    let mut stmt = sql();
    stmt.delete(data);
    stmt
}

/// `UPDATE` statement. See [`Stmt::update`].
pub fn update<'a>(data: impl Into<Data<'a>>) -> Pooled<Stmt> {
    let mut stmt = sql();
    stmt.update(data);
    stmt
}

/// `SELECT` statement. See [`Stmt::select`].
pub fn select<'a>(data: impl Into<Data<'a>>) -> Pooled<Stmt> {
    let mut stmt = sql();
    stmt.select(data);
    stmt
}

#[derive(Clone, Copy)]
enum Combine {
    And,
    Or,
}

impl Combine {
    fn apply<I: IntoIterator<Item = Cond>>(self, conds: I) -> Cond {
        match self {
            Combine::And => cond::and(conds),
            Combine::Or => cond::or(conds),
        }
    }
}

impl Stmt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> StmtKind {
        self.kind
    }

    /// Number of value rows queued for INSERT.
    pub fn row_count(&self) -> usize {
        self.insert_rows.len()
    }

    /// Resolve record columns through `cache` instead of the process-wide one.
    pub fn with_cache(&mut self, cache: Arc<ColumnCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    /// Return to the freshly-acquired state, keeping allocated capacity.
    pub fn reset(&mut self) {
        self.kind = StmtKind::Raw;
        self.into = Cow::Borrowed("");
        self.from.clear();
        self.where_cond.reset();
        self.group_by.clear();
        self.having.reset();
        self.order_by.clear();
        self.limit = 0;
        self.offset = 0;
        self.insert_cols.clear();
        self.insert_rows.clear();
        self.set_cols.clear();
        self.select_cols.clear();
        self.cache = None;
        self.build_error = None;
    }

    fn mark(&mut self, kind: StmtKind) {
        if self.kind == StmtKind::Raw {
            self.kind = kind;
        }
    }

    fn fail(&mut self, message: String) {
        // the first error wins
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    fn columns(&self, ty: RecordType) -> Arc<[&'static str]> {
        match &self.cache {
            Some(cache) => cache.resolve(ty),
            None => ColumnCache::global().resolve(ty),
        }
    }

    fn record_row(record: &dyn AnyRecord) -> Pooled<Vec<Operand>> {
        let mut row = ROWS.acquire();
        record.each_value(&mut |v| row.push(Operand::Value(v)));
        row
    }

    // ==================== INSERT ====================

    /// Set the INSERT target table from a table name, record or record type.
    pub fn into_table<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Table(name) => self.into = name,
            Data::Record(record) => self.into_record_table(record.record_type()),
            Data::Type(ty) => self.into_record_table(ty),
            other => self.fail(format!("into_table does not accept a {}", other.shape())),
        }
        self
    }

    fn into_record_table(&mut self, ty: RecordType) {
        match ty.table() {
            Some(table) => self.into = Cow::Borrowed(table),
            None => self.fail(format!("record type {} has no table name", ty.key())),
        }
    }

    pub fn into_columns<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.insert_cols.extend(cols.into_iter().map(Into::into));
        self
    }

    /// Append the columns of record type `T`.
    pub fn into_columns_of<T: Record>(&mut self) -> &mut Self {
        let cols = self.columns(RecordType::of::<T>());
        self.insert_cols.extend(cols.iter().map(|c| Cow::Borrowed(*c)));
        self
    }

    /// Add one row of values.
    ///
    /// A [`Map`] replaces the insert columns with its sorted keys. A record
    /// supplies the columns when none are set yet. A sub-statement makes this
    /// an insert-select.
    pub fn values<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Empty => {}
            Data::Row(values) => {
                let mut row = ROWS.acquire();
                row.extend(values);
                self.insert_rows.push(row);
            }
            Data::Map(map) => {
                self.insert_cols.clear();
                let mut row = ROWS.acquire();
                for (col, value) in map {
                    self.insert_cols.push(col);
                    row.push(value);
                }
                self.insert_rows.push(row);
            }
            Data::Record(record) => {
                if self.insert_cols.is_empty() {
                    let cols = self.columns(record.record_type());
                    self.insert_cols.extend(cols.iter().map(|c| Cow::Borrowed(*c)));
                }
                self.insert_rows.push(Self::record_row(record));
            }
            Data::Stmt(stmt) => self.from.push(FromItem::Stmt { stmt, alias: None }),
            other => self.fail(format!("values does not accept a {}", other.shape())),
        }
        self
    }

    /// Add several rows. The columns are derived once, from the first row.
    pub fn values_bulk<'a, I>(&mut self, rows: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Data<'a>>,
    {
        self.values_bulk_inner(rows);
        self
    }

    // Returns the table of the first row when it is a record.
    fn values_bulk_inner<'a, I>(&mut self, rows: I) -> Option<&'static str>
    where
        I: IntoIterator,
        I::Item: Into<Data<'a>>,
    {
        let mut table = None;
        for (i, data) in rows.into_iter().enumerate() {
            let data = data.into();
            if i == 0 {
                match &data {
                    Data::Map(map) if self.insert_cols.is_empty() => {
                        self.insert_cols.extend(map.keys().cloned());
                    }
                    Data::Record(record) => {
                        let ty = record.record_type();
                        table = ty.table();
                        if self.insert_cols.is_empty() {
                            let cols = self.columns(ty);
                            self.insert_cols.extend(cols.iter().map(|c| Cow::Borrowed(*c)));
                        }
                    }
                    _ => {}
                }
            }

            match data {
                Data::Row(values) => {
                    let mut row = ROWS.acquire();
                    row.extend(values);
                    self.insert_rows.push(row);
                }
                Data::Map(map) => {
                    let mut row = ROWS.acquire();
                    for col in &self.insert_cols {
                        let value = map
                            .get(col)
                            .cloned()
                            .unwrap_or(Operand::Value(Value::Null));
                        row.push(value);
                    }
                    self.insert_rows.push(row);
                }
                Data::Record(record) => self.insert_rows.push(Self::record_row(record)),
                Data::Stmt(stmt) => self.from.push(FromItem::Stmt { stmt, alias: None }),
                other => self.fail(format!("values_bulk does not accept a {}", other.shape())),
            }
        }
        table
    }

    /// Start an INSERT.
    ///
    /// A table name sets the target. A record sets the target, the columns
    /// and one row. A row, map or sub-statement is passed to [`values`](Self::values).
    pub fn insert<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Empty => {}
            Data::Table(name) => self.into = name,
            Data::Record(record) => {
                self.values(Data::Record(record));
                self.into_record_table(record.record_type());
            }
            Data::Type(ty) => {
                let cols = self.columns(ty);
                self.insert_cols.extend(cols.iter().map(|c| Cow::Borrowed(*c)));
                self.into_record_table(ty);
            }
            other => {
                self.values(other);
            }
        }
        self.mark(StmtKind::Insert);
        self
    }

    /// Start a multi-row INSERT. Record rows also set the target table.
    pub fn insert_bulk<'a, I>(&mut self, rows: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Data<'a>>,
    {
        self.mark(StmtKind::Insert);
        if let Some(table) = self.values_bulk_inner(rows) {
            self.into = Cow::Borrowed(table);
        }
        self
    }

    // ==================== FROM ====================

    pub fn from<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        self.push_from(data.into(), None);
        self
    }

    pub fn from_as<'a>(
        &mut self,
        data: impl Into<Data<'a>>,
        alias: impl Into<Cow<'static, str>>,
    ) -> &mut Self {
        self.push_from(data.into(), Some(alias.into()));
        self
    }

    fn push_from(&mut self, data: Data<'_>, alias: Option<Cow<'static, str>>) {
        let ty = match data {
            Data::Table(name) => {
                self.from.push(FromItem::Table { name, alias });
                return;
            }
            Data::Stmt(stmt) => {
                self.from.push(FromItem::Stmt { stmt, alias });
                return;
            }
            Data::Record(record) => record.record_type(),
            Data::Type(ty) => ty,
            other => {
                self.fail(format!("from does not accept a {}", other.shape()));
                return;
            }
        };
        match ty.table() {
            Some(table) => self.from.push(FromItem::Table {
                name: Cow::Borrowed(table),
                alias,
            }),
            None => self.fail(format!("record type {} has no table name", ty.key())),
        }
    }

    // ==================== DELETE / UPDATE / SELECT ====================

    /// Start a DELETE from a table name or record.
    pub fn delete<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Empty => {}
            other => self.push_from(other, None),
        }
        self.mark(StmtKind::Delete);
        self
    }

    /// Start an UPDATE.
    ///
    /// A record sets every field and the table. A map sets its columns only.
    pub fn update<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Empty => {}
            Data::Record(record) => {
                self.set_all(Data::Record(record));
                self.push_from(Data::Record(record), None);
            }
            Data::Map(map) => {
                self.set_all(map);
            }
            other => self.push_from(other, None),
        }
        self.mark(StmtKind::Update);
        self
    }

    /// Start a SELECT.
    ///
    /// A record or record type selects its columns from its table. A table
    /// name or sub-statement becomes a from-item.
    pub fn select<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Empty => {}
            Data::Record(record) => {
                let ty = record.record_type();
                self.select_record_columns(ty);
                self.push_from(Data::Type(ty), None);
            }
            Data::Type(ty) => {
                self.select_record_columns(ty);
                self.push_from(Data::Type(ty), None);
            }
            other => self.push_from(other, None),
        }
        self.mark(StmtKind::Select);
        self
    }

    fn select_record_columns(&mut self, ty: RecordType) {
        let cols = self.columns(ty);
        self.select_cols.extend(cols.iter().map(|c| Cow::Borrowed(*c)));
    }

    pub fn select_columns<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.select_cols.extend(cols.into_iter().map(Into::into));
        self
    }

    /// Append the columns of record type `T`.
    pub fn select_columns_of<T: Record>(&mut self) -> &mut Self {
        self.select_record_columns(RecordType::of::<T>());
        self
    }

    // ==================== SET ====================

    /// `col = operand`.
    pub fn set(&mut self, col: impl Into<Cow<'static, str>>, value: impl Into<Operand>) -> &mut Self {
        self.set_cols.push((col.into(), value.into()));
        self
    }

    /// `col = <sql>` with `args` bound to the placeholders in `sql`.
    pub fn set_expr<S, I>(&mut self, col: impl Into<Cow<'static, str>>, sql: S, args: I) -> &mut Self
    where
        S: Into<Cow<'static, str>>,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.set(col, Operand::expr(sql, args))
    }

    /// Set every entry of a map, or every field of a record.
    pub fn set_all<'a>(&mut self, data: impl Into<Data<'a>>) -> &mut Self {
        match data.into() {
            Data::Map(map) => self.set_cols.extend(map),
            Data::Record(record) => {
                let cols = self.columns(record.record_type());
                let mut i = 0;
                record.each_value(&mut |v| {
                    if let Some(col) = cols.get(i) {
                        self.set_cols.push((Cow::Borrowed(*col), Operand::Value(v)));
                    }
                    i += 1;
                });
            }
            other => self.fail(format!("set_all does not accept a {}", other.shape())),
        }
        self
    }

    /// `col = col + 1`.
    pub fn incr(&mut self, col: impl Into<Cow<'static, str>>) -> &mut Self {
        self.incr_by(col, 1)
    }

    /// `col = col + n`.
    pub fn incr_by(&mut self, col: impl Into<Cow<'static, str>>, n: impl Into<Value>) -> &mut Self {
        self.step(col.into(), " + ", n.into())
    }

    /// `col = col - 1`.
    pub fn decr(&mut self, col: impl Into<Cow<'static, str>>) -> &mut Self {
        self.decr_by(col, 1)
    }

    /// `col = col - n`.
    pub fn decr_by(&mut self, col: impl Into<Cow<'static, str>>, n: impl Into<Value>) -> &mut Self {
        self.step(col.into(), " - ", n.into())
    }

    fn step(&mut self, col: Cow<'static, str>, op: &str, n: Value) -> &mut Self {
        let mut sql = String::with_capacity(col.len() + op.len() + PLACEHOLDER.len());
        sql.push_str(&col);
        sql.push_str(op);
        sql.push_str(PLACEHOLDER);
        self.set_cols.push((col, Operand::expr(sql, [n])));
        self
    }

    // ==================== WHERE / HAVING ====================

    /// AND `query` into the WHERE condition.
    pub fn where_(&mut self, query: impl Into<Query>) -> &mut Self {
        self.and_where(query)
    }

    pub fn and_where(&mut self, query: impl Into<Query>) -> &mut Self {
        let current = std::mem::take(&mut self.where_cond);
        self.where_cond = self.cat_cond(current, Combine::And, query.into());
        self
    }

    pub fn or_where(&mut self, query: impl Into<Query>) -> &mut Self {
        let current = std::mem::take(&mut self.where_cond);
        self.where_cond = self.cat_cond(current, Combine::Or, query.into());
        self
    }

    /// AND `query` into the HAVING condition.
    pub fn having(&mut self, query: impl Into<Query>) -> &mut Self {
        self.and_having(query)
    }

    pub fn and_having(&mut self, query: impl Into<Query>) -> &mut Self {
        let current = std::mem::take(&mut self.having);
        self.having = self.cat_cond(current, Combine::And, query.into());
        self
    }

    pub fn or_having(&mut self, query: impl Into<Query>) -> &mut Self {
        let current = std::mem::take(&mut self.having);
        self.having = self.cat_cond(current, Combine::Or, query.into());
        self
    }

    fn cat_cond(&mut self, current: Cond, op: Combine, query: Query) -> Cond {
        match query {
            Query::Cond(c) => op.apply([current, c]),
            Query::Conds(conds) => op.apply(iter::once(current).chain(conds)),
            Query::Map(map) => {
                let mut conds = Vec::with_capacity(map.len() + 1);
                conds.push(current);
                for (col, value) in map {
                    match value {
                        Operand::Value(v) => conds.push(Cond::eq(&col, v)),
                        Operand::Expr(e) => {
                            let mut sql = String::with_capacity(col.len() + 3 + e.sql().len());
                            sql.push_str(&col);
                            sql.push_str(" = ");
                            sql.push_str(e.sql());
                            conds.push(cond::expr(sql, e.args().iter().cloned()));
                        }
                        Operand::Stmt(_) => {
                            self.fail(format!("condition on {col} cannot hold a sub-statement"));
                        }
                    }
                }
                op.apply(conds)
            }
        }
    }

    // ==================== GROUP BY / ORDER BY / LIMIT ====================

    pub fn group_by<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        append_list(&mut self.group_by, keys, "");
        self
    }

    /// Append raw ORDER BY items, e.g. `"uid ASC"`.
    pub fn order_by<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        append_list(&mut self.order_by, items, "");
        self
    }

    pub fn asc<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        append_list(&mut self.order_by, cols, " ASC");
        self
    }

    pub fn desc<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        append_list(&mut self.order_by, cols, " DESC");
        self
    }

    /// `LIMIT n`. Zero means no limit, a negative value fails rendering.
    pub fn limit(&mut self, n: i64) -> &mut Self {
        self.limit = n;
        self
    }

    pub fn limit_offset(&mut self, n: i64, offset: i64) -> &mut Self {
        self.limit = n;
        self.offset = offset;
        self
    }
}

// Append `items` to `buf` separated by ", ", each followed by `suffix`.
fn append_list<I, S>(buf: &mut String, items: I, suffix: &str)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for item in items {
        if !buf.is_empty() {
            buf.push_str(", ");
        }
        buf.push_str(item.as_ref());
        buf.push_str(suffix);
    }
}

impl Recycle for Stmt {
    fn recycle(&mut self) {
        self.reset();
    }
}
