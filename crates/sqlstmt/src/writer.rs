//! SQL text and argument accumulator.

use std::fmt;

use serde::Deserialize;

use crate::pool::{ARG_LISTS, ArgList, Pooled, Recycle, WRITERS};
use crate::value::Value;

/// Dialect-neutral marker written wherever a bound value is referenced.
pub const PLACEHOLDER: &str = "??";

/// Target placeholder syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `?` placeholders.
    #[default]
    Generic,
    /// `?` placeholders.
    #[serde(alias = "mariadb")]
    MySql,
    /// `$1, $2, ...` placeholders.
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

/// A growable SQL buffer with its flat and per-row argument lists.
#[derive(Debug, Default)]
pub struct Writer {
    buf: String,
    scratch: String,
    args: Vec<Value>,
    bulk: Vec<ArgList>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a writer from the process-wide pool.
    pub fn acquire() -> Pooled<Writer> {
        WRITERS.acquire()
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    #[inline]
    pub fn write_char(&mut self, c: char) {
        self.buf.push(c);
    }

    /// Append arguments to the flat list.
    pub fn append(&mut self, args: &[Value]) {
        self.args.extend_from_slice(args);
    }

    pub fn push_arg(&mut self, value: Value) {
        self.args.push(value);
    }

    /// Append one row's argument group.
    pub fn append_bulk(&mut self, group: ArgList) {
        self.bulk.push(group);
    }

    pub fn write_i64(&mut self, n: i64) {
        use std::fmt::Write as _;
        // Writing into a String cannot fail.
        let _ = write!(self.buf, "{n}");
    }

    /// Drop text written after `len` bytes.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Move the flat arguments from `start` onwards into a pooled group.
    pub(crate) fn split_args(&mut self, start: usize) -> ArgList {
        let mut group = ARG_LISTS.acquire();
        group.extend(self.args.drain(start..));
        group
    }

    /// Write `items` separated by `sep`.
    pub fn join<S: AsRef<str>>(&mut self, items: &[S], sep: &str) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(sep);
            }
            self.buf.push_str(item.as_ref());
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn bulk_args(&self) -> &[ArgList] {
        &self.bulk
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Clear text and arguments. Capacity is retained.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scratch.clear();
        self.args.clear();
        self.bulk.clear();
    }

    /// Rewrite every [`PLACEHOLDER`] left to right into the dialect's syntax.
    pub fn rewrite_placeholders(&mut self, dialect: Dialect) {
        let Some(first) = self.buf.find(PLACEHOLDER) else {
            return;
        };

        self.scratch.clear();
        self.scratch.reserve(self.buf.len());

        let mut rest = self.buf.as_str();
        let mut index = first;
        let mut n = 0usize;
        loop {
            self.scratch.push_str(&rest[..index]);
            n += 1;
            match dialect {
                Dialect::Postgres => {
                    use std::fmt::Write as _;
                    let _ = write!(self.scratch, "${n}");
                }
                Dialect::Generic | Dialect::MySql => self.scratch.push('?'),
            }
            rest = &rest[index + PLACEHOLDER.len()..];
            match rest.find(PLACEHOLDER) {
                Some(next) => index = next,
                None => break,
            }
        }
        self.scratch.push_str(rest);

        std::mem::swap(&mut self.buf, &mut self.scratch);
        self.scratch.clear();
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

impl fmt::Display for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}

impl Recycle for Writer {
    fn recycle(&mut self) {
        self.reset();
    }
}
