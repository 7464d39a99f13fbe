//! Statement rendering.
//!
//! Pass 1 (`write_to`) writes dialect-neutral text with the `??` marker and
//! collects arguments. Pass 2 (`render`) rewrites the markers for a dialect.

use super::{FromItem, Operand, Stmt, StmtKind};
use crate::error::{SqlError, SqlResult};
use crate::value::Value;
use crate::writer::{Dialect, Writer};

impl Stmt {
    /// Append the dialect-neutral text and arguments to `w`.
    pub fn write_to(&self, w: &mut Writer) -> SqlResult<()> {
        if let Some(message) = &self.build_error {
            return Err(SqlError::NotSupportedType(message.clone()));
        }
        match self.kind {
            StmtKind::Insert => self.write_insert(w),
            StmtKind::Delete => self.write_delete(w),
            StmtKind::Update => self.write_update(w),
            StmtKind::Select => self.write_select(w),
            StmtKind::Raw => Err(SqlError::not_supported("statement kind is not set")),
        }
    }

    /// Reset `w` and render the statement for `dialect`.
    pub fn render(&self, w: &mut Writer, dialect: Dialect) -> SqlResult<()> {
        w.reset();
        self.write_to(w)?;
        w.rewrite_placeholders(dialect);
        Ok(())
    }

    /// Render and return the SQL text and flat arguments held by `w`.
    pub fn build<'w>(&self, w: &'w mut Writer, dialect: Dialect) -> SqlResult<(&'w str, &'w [Value])> {
        self.render(w, dialect)?;
        Ok((w.as_str(), w.args()))
    }

    fn write_insert(&self, w: &mut Writer) -> SqlResult<()> {
        if self.into.is_empty() {
            return Err(SqlError::NoTableName);
        }
        if !self.from.is_empty() {
            return self.write_insert_select(w);
        }
        if self.insert_cols.is_empty() {
            return Err(SqlError::NoColumnToInsert);
        }

        let (first, rest) = match self.insert_rows.split_first() {
            Some(split) => split,
            None => return Err(SqlError::NoValueToInsert),
        };

        w.write_str("INSERT INTO ");
        w.write_str(&self.into);
        w.write_str(" (");
        w.join(&self.insert_cols, ",");
        w.write_str(") VALUES (");

        self.check_row_len(0, first)?;
        if rest.is_empty() {
            write_row(first, w)?;
        } else {
            // The first row is the template; every row contributes one
            // argument group and must render to the same text.
            let template_start = w.as_str().len();
            let start = w.args().len();
            write_row(first, w)?;
            let template_end = w.as_str().len();
            let group = w.split_args(start);
            w.append_bulk(group);

            for (i, row) in rest.iter().enumerate() {
                let index = i + 1;
                self.check_row_len(index, row)?;
                let start = w.args().len();
                write_row(row, w)?;
                let text = w.as_str();
                let matches = text[template_end..] == text[template_start..template_end];
                w.truncate(template_end);
                if !matches {
                    return Err(SqlError::NotSupportedType(format!(
                        "row {index} of a multi-row INSERT differs in shape from row 0"
                    )));
                }
                let group = w.split_args(start);
                w.append_bulk(group);
            }
        }

        w.write_char(')');
        Ok(())
    }

    fn check_row_len(&self, index: usize, row: &[Operand]) -> SqlResult<()> {
        if row.len() == self.insert_cols.len() {
            return Ok(());
        }
        Err(SqlError::NotSupportedType(format!(
            "row {index} has {} values for {} INSERT columns",
            row.len(),
            self.insert_cols.len()
        )))
    }

    fn write_insert_select(&self, w: &mut Writer) -> SqlResult<()> {
        w.write_str("INSERT INTO ");
        w.write_str(&self.into);
        if self.insert_cols.is_empty() {
            w.write_char(' ');
        } else {
            w.write_str(" (");
            w.join(&self.insert_cols, ",");
            w.write_str(") ");
        }

        match self.from.first() {
            Some(item @ FromItem::Stmt { .. }) => item.write_to(w),
            _ => self.write_select(w),
        }
    }

    fn write_delete(&self, w: &mut Writer) -> SqlResult<()> {
        let Some(table) = self.from.first() else {
            return Err(SqlError::NoTableName);
        };

        w.write_str("DELETE FROM ");
        table.write_to(w)?;
        self.write_where(w);
        Ok(())
    }

    fn write_update(&self, w: &mut Writer) -> SqlResult<()> {
        let Some(table) = self.from.first() else {
            return Err(SqlError::NoTableName);
        };
        if self.set_cols.is_empty() {
            return Err(SqlError::not_supported("UPDATE without SET columns"));
        }

        w.write_str("UPDATE ");
        table.write_to(w)?;
        w.write_str(" SET ");
        for (i, (col, value)) in self.set_cols.iter().enumerate() {
            if i > 0 {
                w.write_char(',');
            }
            w.write_str(col);
            w.write_str(" = ");
            value.write_to(w)?;
        }
        self.write_where(w);
        Ok(())
    }

    fn write_select(&self, w: &mut Writer) -> SqlResult<()> {
        if self.from.is_empty() {
            return Err(SqlError::NoTableName);
        }
        if self.limit < 0 || self.offset < 0 {
            return Err(SqlError::InvalidLimitation);
        }

        w.write_str("SELECT ");
        if self.select_cols.is_empty() {
            w.write_char('*');
        } else {
            w.join(&self.select_cols, ",");
        }

        w.write_str(" FROM ");
        for (i, item) in self.from.iter().enumerate() {
            if i > 0 {
                w.write_char(',');
            }
            item.write_to(w)?;
        }

        self.write_where(w);

        if !self.group_by.is_empty() {
            w.write_str(" GROUP BY ");
            w.write_str(&self.group_by);
        }

        if self.having.is_valid() {
            w.write_str(" HAVING ");
            self.having.write_to(w);
        }

        if !self.order_by.is_empty() {
            w.write_str(" ORDER BY ");
            w.write_str(&self.order_by);
        }

        if self.limit > 0 {
            w.write_str(" LIMIT ");
            w.write_i64(self.limit);
            if self.offset != 0 {
                w.write_str(" OFFSET ");
                w.write_i64(self.offset);
            }
        }
        Ok(())
    }

    fn write_where(&self, w: &mut Writer) {
        if self.where_cond.is_valid() {
            w.write_str(" WHERE ");
            self.where_cond.write_to(w);
        }
    }
}

fn write_row(row: &[Operand], w: &mut Writer) -> SqlResult<()> {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            w.write_char(',');
        }
        value.write_to(w)?;
    }
    Ok(())
}
