//! Boolean condition trees.
//!
//! A [`Cond`] is a cheap [`Shared`] handle to one pooled node: an empty condition, a raw
//! SQL fragment with its arguments, or an ordered AND/OR list. Combining never
//! leaves a list with fewer than two children: zero valid operands collapse to
//! [`Cond::Empty`], one collapses to that operand.
//!
//! ```ignore
//! use sqlstmt::{and, expr};
//!
//! let uid = expr("uid = ??", [100]);
//! let name = expr("username = ??", ["Alice"]);
//! let cond = and([uid, name]);
//! // (uid = ??) AND (username = ??)
//! ```

use std::borrow::Cow;
use std::iter;

use crate::pool::{COND_LISTS, EXPR_NODES, Recycle, Shared};
use crate::value::Value;
use crate::writer::{PLACEHOLDER, Writer};

/// A raw SQL fragment and the values its placeholders refer to.
#[derive(Debug, Default)]
pub struct Expr {
    sql: Cow<'static, str>,
    args: Vec<Value>,
}

impl Expr {
    /// A pooled leaf node holding `sql` and `args`.
    pub(crate) fn shared<I>(sql: Cow<'static, str>, args: I) -> Shared<Expr>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        EXPR_NODES.share(|node| {
            node.sql = sql;
            node.args.extend(args.into_iter().map(Into::into));
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn write_to(&self, w: &mut Writer) {
        w.write_str(&self.sql);
        w.append(&self.args);
    }
}

impl Recycle for Expr {
    fn recycle(&mut self) {
        self.sql = Cow::Borrowed("");
        self.args.clear();
    }
}

/// Children of an AND/OR node. The storage is reused with the node.
#[derive(Debug, Default)]
pub struct CondList(Vec<Cond>);

impl CondList {
    pub fn as_slice(&self) -> &[Cond] {
        &self.0
    }
}

impl Recycle for CondList {
    fn recycle(&mut self) {
        self.0.clear();
    }
}

/// A node of a boolean condition tree.
#[derive(Debug, Clone, Default)]
pub enum Cond {
    #[default]
    Empty,
    Expr(Shared<Expr>),
    And(Shared<CondList>),
    Or(Shared<CondList>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

impl Op {
    fn separator(self) -> &'static str {
        match self {
            Op::And => " AND ",
            Op::Or => " OR ",
        }
    }

    fn wrap(self, list: Shared<CondList>) -> Cond {
        match self {
            Op::And => Cond::And(list),
            Op::Or => Cond::Or(list),
        }
    }
}

/// Raw SQL fragment with positional arguments. An empty fragment yields
/// [`Cond::Empty`].
pub fn expr<S, I>(sql: S, args: I) -> Cond
where
    S: Into<Cow<'static, str>>,
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let sql = sql.into();
    if sql.is_empty() {
        return Cond::Empty;
    }
    Cond::Expr(Expr::shared(sql, args))
}

/// Raw SQL fragment without arguments.
pub fn raw(sql: impl Into<Cow<'static, str>>) -> Cond {
    expr(sql, iter::empty::<Value>())
}

/// Conjunction of every valid operand.
pub fn and<I: IntoIterator<Item = Cond>>(conds: I) -> Cond {
    combine(Op::And, conds)
}

/// Disjunction of every valid operand.
pub fn or<I: IntoIterator<Item = Cond>>(conds: I) -> Cond {
    combine(Op::Or, conds)
}

fn combine<I: IntoIterator<Item = Cond>>(op: Op, conds: I) -> Cond {
    let mut valid = conds.into_iter().filter(Cond::is_valid);
    let Some(first) = valid.next() else {
        return Cond::Empty;
    };
    let Some(second) = valid.next() else {
        return first;
    };

    let list = COND_LISTS.share(|list| {
        list.0.push(first);
        list.0.push(second);
        list.0.extend(valid);
    });
    op.wrap(list)
}

impl Cond {
    /// `col = ??` bound to `value`.
    pub fn eq(col: &str, value: impl Into<Value>) -> Cond {
        if col.is_empty() {
            return Cond::Empty;
        }
        let mut sql = String::with_capacity(col.len() + 3 + PLACEHOLDER.len());
        sql.push_str(col);
        sql.push_str(" = ");
        sql.push_str(PLACEHOLDER);
        expr(sql, [value.into()])
    }

    /// Combine `self` with `more` using AND. `self` is returned unchanged when
    /// `more` is empty.
    pub fn and<I: IntoIterator<Item = Cond>>(self, more: I) -> Cond {
        self.combine_with(Op::And, more)
    }

    /// Combine `self` with `more` using OR. `self` is returned unchanged when
    /// `more` is empty.
    pub fn or<I: IntoIterator<Item = Cond>>(self, more: I) -> Cond {
        self.combine_with(Op::Or, more)
    }

    fn combine_with<I: IntoIterator<Item = Cond>>(self, op: Op, more: I) -> Cond {
        let mut more = more.into_iter().peekable();
        if more.peek().is_none() {
            return self;
        }
        combine(op, iter::once(self).chain(more))
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Cond::Empty => false,
            Cond::Expr(e) => !e.sql.is_empty(),
            Cond::And(_) | Cond::Or(_) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.is_valid()
    }

    /// Drop this handle's share of the node and become [`Cond::Empty`].
    pub fn reset(&mut self) {
        *self = Cond::Empty;
    }

    /// Children of an AND/OR node, empty for leaves.
    pub fn children(&self) -> &[Cond] {
        match self {
            Cond::And(list) | Cond::Or(list) => list.as_slice(),
            Cond::Empty | Cond::Expr(_) => &[],
        }
    }

    /// Write the condition text and append its arguments.
    pub fn write_to(&self, w: &mut Writer) {
        match self {
            Cond::Empty => {}
            Cond::Expr(e) => e.write_to(w),
            Cond::And(list) => write_list(list, Op::And, w),
            Cond::Or(list) => write_list(list, Op::Or, w),
        }
    }

    /// Render a standalone condition into `w`, replacing its contents.
    pub fn to_sql<'w>(&self, w: &'w mut Writer) -> (&'w str, &'w [Value]) {
        w.reset();
        self.write_to(w);
        (w.as_str(), w.args())
    }
}

fn write_list(list: &CondList, op: Op, w: &mut Writer) {
    for (i, child) in list.as_slice().iter().enumerate() {
        if i > 0 {
            w.write_str(op.separator());
        }
        let parens = match child {
            Cond::Expr(_) => true,
            Cond::And(_) => op == Op::Or,
            Cond::Or(_) => op == Op::And,
            Cond::Empty => false,
        };
        if parens {
            w.write_char('(');
            child.write_to(w);
            w.write_char(')');
        } else {
            child.write_to(w);
        }
    }
}

impl From<&'static str> for Cond {
    fn from(sql: &'static str) -> Self {
        raw(sql)
    }
}
