//! Input shapes accepted by the statement builder.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use super::Stmt;
use crate::cache::{AnyRecord, Record, RecordType};
use crate::cond::{Cond, Expr};
use crate::error::SqlResult;
use crate::pool::{Pooled, SUB_STMTS, Shared};
use crate::value::Value;
use crate::writer::{PLACEHOLDER, Writer};

/// A value-position item: a bound value, a raw expression or a sub-select.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Expr(Shared<Expr>),
    Stmt(Shared<Stmt>),
}

impl Operand {
    /// Raw SQL written in place of the value, e.g. `Operand::expr("col || ??", ["x"])`.
    pub fn expr<S, I>(sql: S, args: I) -> Self
    where
        S: Into<Cow<'static, str>>,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Operand::Expr(Expr::shared(sql.into(), args))
    }

    /// Raw SQL without arguments, e.g. `Operand::raw("NOW()")`.
    pub fn raw(sql: impl Into<Cow<'static, str>>) -> Self {
        Operand::Expr(Expr::shared(sql.into(), std::iter::empty::<Value>()))
    }

    pub(crate) fn write_to(&self, w: &mut Writer) -> SqlResult<()> {
        match self {
            Operand::Value(v) => {
                w.write_str(PLACEHOLDER);
                w.push_arg(v.clone());
            }
            Operand::Expr(e) => e.write_to(w),
            Operand::Stmt(s) => {
                w.write_char('(');
                s.write_to(w)?;
                w.write_char(')');
            }
        }
        Ok(())
    }
}

macro_rules! impl_operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_operand_from_value!(
    bool,
    i16,
    i32,
    i64,
    u32,
    u64,
    f32,
    f64,
    &str,
    String,
    Arc<str>,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
    serde_json::Value,
    Vec<String>,
    Vec<i64>,
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(Value::from(v))
    }
}

impl From<Shared<Expr>> for Operand {
    fn from(e: Shared<Expr>) -> Self {
        Operand::Expr(e)
    }
}

impl From<Shared<Stmt>> for Operand {
    fn from(s: Shared<Stmt>) -> Self {
        Operand::Stmt(s)
    }
}

impl From<Pooled<Stmt>> for Operand {
    fn from(s: Pooled<Stmt>) -> Self {
        Operand::Stmt(share_stmt(s))
    }
}

// Move the statement into a pooled shared node. The emptied handle goes back
// to the statement pool.
fn share_stmt(mut stmt: Pooled<Stmt>) -> Shared<Stmt> {
    SUB_STMTS.share(|node| mem::swap(node, &mut *stmt))
}

/// Column to operand mapping, iterated in sorted key order.
#[derive(Debug, Clone, Default)]
pub struct Map(BTreeMap<Cow<'static, str>, Operand>);

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Operand>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Operand>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Operand> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Cow<'static, str>> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Cow<'static, str>, &Operand)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Map
where
    K: Into<Cow<'static, str>>,
    V: Into<Operand>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Map(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

impl IntoIterator for Map {
    type Item = (Cow<'static, str>, Operand);
    type IntoIter = std::collections::btree_map::IntoIter<Cow<'static, str>, Operand>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Builder input: whatever a table, column or value position accepts.
pub enum Data<'a> {
    /// No input. Only sets the statement kind.
    Empty,
    /// A table name.
    Table(Cow<'static, str>),
    /// A record instance: its table, columns and field values.
    Record(&'a dyn AnyRecord),
    /// A record type: its table and columns.
    Type(RecordType),
    /// Columns and values keyed by column name.
    Map(Map),
    /// Positional values.
    Row(Vec<Operand>),
    /// A sub-statement.
    Stmt(Shared<Stmt>),
}

impl Data<'_> {
    /// The columns and table of `T` without an instance.
    pub fn of<T: Record>() -> Data<'static> {
        Data::Type(RecordType::of::<T>())
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Data::Empty => "nothing",
            Data::Table(_) => "table name",
            Data::Record(_) => "record",
            Data::Type(_) => "record type",
            Data::Map(_) => "map",
            Data::Row(_) => "row",
            Data::Stmt(_) => "sub-statement",
        }
    }
}

impl From<()> for Data<'_> {
    fn from(_: ()) -> Self {
        Data::Empty
    }
}

impl From<&'static str> for Data<'_> {
    fn from(name: &'static str) -> Self {
        Data::Table(Cow::Borrowed(name))
    }
}

impl From<String> for Data<'_> {
    fn from(name: String) -> Self {
        Data::Table(Cow::Owned(name))
    }
}

impl<'a, T: Record> From<&'a T> for Data<'a> {
    fn from(record: &'a T) -> Self {
        Data::Record(record)
    }
}

impl From<RecordType> for Data<'_> {
    fn from(ty: RecordType) -> Self {
        Data::Type(ty)
    }
}

impl From<Map> for Data<'_> {
    fn from(map: Map) -> Self {
        Data::Map(map)
    }
}

impl From<Vec<Operand>> for Data<'_> {
    fn from(row: Vec<Operand>) -> Self {
        Data::Row(row)
    }
}

impl<const N: usize> From<[Operand; N]> for Data<'_> {
    fn from(row: [Operand; N]) -> Self {
        Data::Row(row.into())
    }
}

impl From<Shared<Stmt>> for Data<'_> {
    fn from(stmt: Shared<Stmt>) -> Self {
        Data::Stmt(stmt)
    }
}

impl From<Pooled<Stmt>> for Data<'_> {
    fn from(stmt: Pooled<Stmt>) -> Self {
        Data::Stmt(share_stmt(stmt))
    }
}

/// A WHERE/HAVING input.
#[derive(Debug)]
pub enum Query {
    Cond(Cond),
    Conds(Vec<Cond>),
    /// `key = ??` equalities in sorted key order.
    Map(Map),
}

impl From<&'static str> for Query {
    fn from(sql: &'static str) -> Self {
        Query::Cond(crate::cond::raw(sql))
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::Cond(crate::cond::raw(sql))
    }
}

impl From<Cond> for Query {
    fn from(cond: Cond) -> Self {
        Query::Cond(cond)
    }
}

impl From<Vec<Cond>> for Query {
    fn from(conds: Vec<Cond>) -> Self {
        Query::Conds(conds)
    }
}

impl<const N: usize> From<[Cond; N]> for Query {
    fn from(conds: [Cond; N]) -> Self {
        Query::Conds(conds.into())
    }
}

impl From<Map> for Query {
    fn from(map: Map) -> Self {
        Query::Map(map)
    }
}

/// One item of a FROM list.
#[derive(Debug)]
pub enum FromItem {
    Table {
        name: Cow<'static, str>,
        alias: Option<Cow<'static, str>>,
    },
    Stmt {
        stmt: Shared<Stmt>,
        alias: Option<Cow<'static, str>>,
    },
}

impl FromItem {
    pub fn alias(&self) -> Option<&str> {
        match self {
            FromItem::Table { alias, .. } | FromItem::Stmt { alias, .. } => alias.as_deref(),
        }
    }

    pub(crate) fn write_to(&self, w: &mut Writer) -> SqlResult<()> {
        match self {
            FromItem::Table { name, alias } => {
                w.write_str(name);
                if let Some(alias) = alias {
                    w.write_str(" AS ");
                    w.write_str(alias);
                }
            }
            FromItem::Stmt { stmt, alias } => {
                w.write_char('(');
                stmt.write_to(w)?;
                w.write_char(')');
                if let Some(alias) = alias {
                    w.write_str(" AS ");
                    w.write_str(alias);
                }
            }
        }
        Ok(())
    }
}
