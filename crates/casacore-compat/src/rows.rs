//! Row and column views over an open [`Table`].

use std::ops::{Bound, Range, RangeBounds};

use casa_engine::{Record, Value};

use crate::errors::Result;
use crate::intercept::normalized;
use crate::tables::Table;

/// Clamp `bounds` to `0..len`. An inverted range selects nothing.
fn resolve_range(bounds: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match bounds.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    }
    .min(len);
    let end = match bounds.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    }
    .min(len);
    start..end.max(start)
}

/// Whole rows of a table, restricted to a set of columns.
#[derive(Debug)]
pub struct RowView<'a> {
    table: &'a Table,
    columns: Vec<String>,
    exclude: bool,
}

impl<'a> RowView<'a> {
    pub(crate) fn new(table: &'a Table, columns: Vec<String>, exclude: bool) -> Self {
        RowView {
            table,
            columns,
            exclude,
        }
    }

    /// Columns each row record contains, in table order when derived from
    /// the table and in request order otherwise.
    pub fn column_names(&self) -> Result<Vec<String>> {
        if !self.exclude && !self.columns.is_empty() {
            // still fails on a closed table
            self.table.backend()?;
            return Ok(self.columns.clone());
        }
        let all = self.table.column_names()?;
        Ok(all
            .into_iter()
            .filter(|name| !self.exclude || !self.columns.contains(name))
            .collect())
    }

    /// Number of rows in the underlying table.
    pub fn len(&self) -> Result<usize> {
        self.table.nrows()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn fetch(&self, names: &[String], row: usize) -> Result<Record> {
        names
            .iter()
            .map(|name| Ok((name.clone(), self.table.raw_cell(name, row)?)))
            .collect()
    }

    normalized! {
        /// One row as a record of column name to cell value.
        pub fn get(&self, row: usize) -> Result<Record> {
            self.fetch(&self.column_names()?, row)
        }

        /// The rows in `rows`, clamped to the table length.
        pub fn slice(&self, rows: impl RangeBounds<usize>) -> Result<Vec<Record>> {
            let names = self.column_names()?;
            resolve_range(rows, self.len()?)
                .map(|row| self.fetch(&names, row))
                .collect()
        }
    }
}

/// The cells of a single column.
#[derive(Debug)]
pub struct ColumnView<'a> {
    table: &'a Table,
    column: String,
}

impl<'a> ColumnView<'a> {
    pub(crate) fn new(table: &'a Table, column: &str) -> Self {
        ColumnView {
            table,
            column: column.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.column
    }

    pub fn len(&self) -> Result<usize> {
        self.table.nrows()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    normalized! {
        /// The cell in `row`.
        pub fn get(&self, row: usize) -> Result<Value> {
            self.table.raw_cell(&self.column, row)
        }

        /// The cells of the rows in `rows`, clamped to the table length.
        pub fn slice(&self, rows: impl RangeBounds<usize>) -> Result<Vec<Value>> {
            resolve_range(rows, self.len()?)
                .map(|row| self.table.raw_cell(&self.column, row))
                .collect()
        }
    }
}
