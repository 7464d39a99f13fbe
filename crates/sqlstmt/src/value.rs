//! Bound argument values.

use std::error::Error;
use std::sync::Arc;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

/// A bound argument.
///
/// Numeric and boolean kinds are stored inline. Heap-backed kinds are shared
/// (`Arc`), so cloning a `Value` never allocates.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(Arc<serde_json::Value>),
    TextArray(Arc<[String]>),
    I64Array(Arc<[i64]>),
}

impl Value {
    /// Short name of the variant, used in decode errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::TextArray(_) => "text[]",
            Value::I64Array(_) => "i64[]",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any integer kind to `i64`. `U64` values above `i64::MAX` yield `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I16(v) => Some(i64::from(v)),
            Value::I32(v) => Some(i64::from(v)),
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u64 => U64,
    u32 => I64,
    f32 => F32,
    f64 => F64,
    &str => Text,
    String => Text,
    Arc<str> => Text,
    &[u8] => Bytes,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
    Vec<String> => TextArray,
    Vec<i64> => I64Array,
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(Arc::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Borrowing conversion into a [`Value`], used when reading record fields.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

macro_rules! impl_to_value_copy {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToValue for $ty {
                #[inline]
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

impl_to_value_copy!(bool, i16, i32, i64, u32, u64, f32, f64, NaiveDate, NaiveDateTime, DateTime<Utc>, Uuid);

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.into())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.as_str().into())
    }
}

impl ToValue for Arc<str> {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.as_slice().into())
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Json(Arc::new(self.clone()))
    }
}

impl ToValue for Vec<String> {
    fn to_value(&self) -> Value {
        Value::TextArray(self.as_slice().into())
    }
}

impl ToValue for Vec<i64> {
    fn to_value(&self) -> Value {
        Value::I64Array(self.as_slice().into())
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

/// Error converting a decoded [`Value`] into a Rust type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("cannot decode {found} as {expected}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value out of range for {0}")]
    OutOfRange(&'static str),
}

/// Conversion from a decoded [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn wrong_type<T>(expected: &'static str, value: &Value) -> Result<T, ValueError> {
    Err(ValueError::WrongType {
        expected,
        found: value.kind_name(),
    })
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let narrowed = match value {
                        Value::I16(v) => $ty::try_from(v).ok(),
                        Value::I32(v) => $ty::try_from(v).ok(),
                        Value::I64(v) => $ty::try_from(v).ok(),
                        Value::U64(v) => $ty::try_from(v).ok(),
                        other => return wrong_type(stringify!($ty), &other),
                    };
                    narrowed.ok_or(ValueError::OutOfRange(stringify!($ty)))
                }
            }
        )*
    };
}

impl_from_value_int!(i16, i32, i64, u32, u64);

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => wrong_type("bool", &other),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::F32(v) => Ok(v),
            other => wrong_type("f32", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::F64(v) => Ok(v),
            Value::F32(v) => Ok(f64::from(v)),
            other => wrong_type("f64", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(String::from(&*v)),
            other => wrong_type("text", &other),
        }
    }
}

impl FromValue for Arc<str> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(v),
            other => wrong_type("text", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(v) => Ok(v.to_vec()),
            other => wrong_type("bytes", &other),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(v) => Ok(v),
            other => wrong_type("date", &other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Timestamp(v) => Ok(v),
            Value::TimestampTz(v) => Ok(v.naive_utc()),
            other => wrong_type("timestamp", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::TimestampTz(v) => Ok(v),
            Value::Timestamp(v) => Ok(v.and_utc()),
            other => wrong_type("timestamptz", &other),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Uuid(v) => Ok(v),
            other => wrong_type("uuid", &other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Json(v) => Ok(Arc::unwrap_or_clone(v)),
            other => wrong_type("json", &other),
        }
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::TextArray(v) => Ok(v.to_vec()),
            other => wrong_type("text[]", &other),
        }
    }
}

impl FromValue for Vec<i64> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::I64Array(v) => Ok(v.to_vec()),
            other => wrong_type("i64[]", &other),
        }
    }
}

// Integer kinds follow the declared parameter type so that an `i64` bound to
// an INT4 column encodes as four bytes.
fn int_to_sql(
    v: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        _ => v.to_sql_checked(ty, out),
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::I16(v) => int_to_sql(i64::from(*v), ty, out),
            Value::I32(v) => int_to_sql(i64::from(*v), ty, out),
            Value::I64(v) => int_to_sql(*v, ty, out),
            Value::U64(v) => int_to_sql(i64::try_from(*v)?, ty, out),
            Value::F32(v) => match *ty {
                Type::FLOAT8 => f64::from(*v).to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::F64(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Text(v) => {
                let s: &str = v;
                s.to_sql_checked(ty, out)
            }
            Value::Bytes(v) => {
                let b: &[u8] = v;
                b.to_sql_checked(ty, out)
            }
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => (**v).to_sql_checked(ty, out),
            Value::TextArray(v) => {
                let items: &[String] = v;
                items.to_sql_checked(ty, out)
            }
            Value::I64Array(v) => {
                let items: &[i64] = v;
                items.to_sql_checked(ty, out)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}
