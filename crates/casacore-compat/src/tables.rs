use std::path::Path;
use std::rc::Rc;

use casa_engine::{OpenOptions, TableBackend, TableStore, Value};

use crate::errors::{Error, Result, ResultExt};
use crate::intercept::normalized;
use crate::normalize::reverse_axes;
use crate::rows::{ColumnView, RowView};

/// Query placeholder for the main table.
pub const MAIN_TABLE_PLACEHOLDER: &str = "$mtable";
/// Query placeholder for the given table.
pub const GIVEN_TABLE_PLACEHOLDER: &str = "$gtable";

/// Suffix of the temporary copy used to query a closed table.
const COPY_SUFFIX: &str = "_copy";

/// Rows a cell-slice request applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelection {
    Single(usize),
    Many(Vec<usize>),
}

impl From<usize> for RowSelection {
    fn from(row: usize) -> Self {
        RowSelection::Single(row)
    }
}

impl From<Vec<usize>> for RowSelection {
    fn from(rows: Vec<usize>) -> Self {
        RowSelection::Many(rows)
    }
}

impl From<&[usize]> for RowSelection {
    fn from(rows: &[usize]) -> Self {
        RowSelection::Many(rows.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for RowSelection {
    fn from(rows: [usize; N]) -> Self {
        RowSelection::Many(rows.to_vec())
    }
}

/// Step between selected elements: one value for every axis, or one per axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stride {
    Scalar(i64),
    PerAxis(Vec<i64>),
}

impl Default for Stride {
    fn default() -> Self {
        Stride::Scalar(1)
    }
}

impl From<i64> for Stride {
    fn from(step: i64) -> Self {
        Stride::Scalar(step)
    }
}

impl From<Vec<i64>> for Stride {
    fn from(steps: Vec<i64>) -> Self {
        Stride::PerAxis(steps)
    }
}

impl From<&[i64]> for Stride {
    fn from(steps: &[i64]) -> Self {
        Stride::PerAxis(steps.to_vec())
    }
}

impl Stride {
    /// Expand to one step per axis. A per-axis stride must already have
    /// `ndim` entries.
    pub fn per_axis(self, ndim: usize) -> Result<Vec<i64>> {
        match self {
            Stride::Scalar(step) => Ok(vec![step; ndim]),
            Stride::PerAxis(steps) if steps.len() == ndim => Ok(steps),
            Stride::PerAxis(steps) => Err(Error::InvalidArgument(format!(
                "stride has {} entries for {ndim} axes",
                steps.len()
            ))),
        }
    }
}

/// Whether a table exists at `path`. Only the directory is checked.
pub fn table_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

/// A table handle presenting python-casacore conventions.
///
/// Arrays come back row-major with their axes reversed relative to the
/// engine; shapes and slice bounds are given innermost axis first.
pub struct Table {
    store: Rc<dyn TableStore>,
    name: String,
    backend: Option<Box<dyn TableBackend>>,
    options: OpenOptions,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("options", &self.options)
            .finish()
    }
}

impl Table {
    /// Open the table stored at `path`.
    pub fn open(store: Rc<dyn TableStore>, path: &str, options: OpenOptions) -> Result<Table> {
        if !options.is_read_only() {
            log::warn!("opening {path} for writing; writes go straight to the engine");
        }
        let backend = store
            .open_table(path, &options)
            .context(|| format!("opening table {path}"))?;
        Ok(Table::from_backend(store, backend, options))
    }

    fn from_backend(
        store: Rc<dyn TableStore>,
        backend: Box<dyn TableBackend>,
        options: OpenOptions,
    ) -> Table {
        Table {
            store,
            name: backend.name().to_string(),
            backend: Some(backend),
            options,
        }
    }

    /// The name (path) the table was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Release the engine handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut backend) = self.backend.take() {
            backend
                .close()
                .context(|| format!("closing table {}", self.name))?;
        }
        Ok(())
    }

    pub(crate) fn backend(&self) -> Result<&dyn TableBackend> {
        self.backend.as_deref().ok_or_else(|| Error::ClosedHandle {
            name: self.name.clone(),
        })
    }

    pub fn nrows(&self) -> Result<usize> {
        self.backend()?
            .nrows()
            .context(|| format!("counting rows of {}", self.name))
    }

    pub fn column_names(&self) -> Result<Vec<String>> {
        self.backend()?
            .column_names()
            .context(|| format!("listing columns of {}", self.name))
    }

    pub(crate) fn raw_cell(&self, column: &str, row: usize) -> Result<Value> {
        self.backend()?
            .get_cell(column, row)
            .context(|| format!("reading {}[{column}][{row}]", self.name))
    }

    normalized! {
        /// Contents of one cell.
        pub fn get_cell(&self, column: &str, row: usize) -> Result<Value> {
            self.raw_cell(column, row)
        }

        /// Shapes of the array cells of `column`, innermost axis first,
        /// rendered as text such as `[10, 5]`.
        pub fn column_shapes_as_text(
            &self,
            column: &str,
            start_row: usize,
            nrow: Option<usize>,
            row_incr: usize,
        ) -> Result<Vec<String>> {
            let native = self
                .backend()?
                .column_shape_strings(column, start_row, nrow, row_incr)
                .context(|| format!("reading cell shapes of {}[{column}]", self.name))?;
            native.iter().map(String::as_str).map(reverse_shape_text).collect()
        }

        /// A rectangular slice of the array cell(s) of `column`.
        ///
        /// `blc` and `trc` are inclusive corners, innermost axis first. A
        /// single row yields the slice itself; several rows yield a list of
        /// slices in the requested order.
        pub fn get_cell_slice(
            &self,
            column: &str,
            rows: impl Into<RowSelection>,
            blc: &[i64],
            trc: &[i64],
            stride: impl Into<Stride>,
        ) -> Result<Value> {
            if blc.len() != trc.len() {
                return Err(Error::InvalidArgument(format!(
                    "blc has {} entries but trc has {}",
                    blc.len(),
                    trc.len()
                )));
            }
            let stride: Stride = stride.into();
            let incr = reverse_axes(stride.per_axis(blc.len())?);
            let blc = reverse_axes(blc.to_vec());
            let trc = reverse_axes(trc.to_vec());
            let backend = self.backend()?;
            let slice = |row: usize| {
                backend
                    .get_cell_slice(column, row, &blc, &trc, &incr)
                    .context(|| format!("slicing {}[{column}][{row}]", self.name))
            };
            let rows: RowSelection = rows.into();
            match rows {
                RowSelection::Single(row) => slice(row),
                RowSelection::Many(rows) => rows
                    .into_iter()
                    .map(slice)
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
            }
        }
    }

    /// A row view over `columns`. With `exclude` set the view covers every
    /// column except those listed; an empty list means all columns.
    pub fn row(&self, columns: &[&str], exclude: bool) -> RowView<'_> {
        RowView::new(
            self,
            columns.iter().map(|c| c.to_string()).collect(),
            exclude,
        )
    }

    /// A view over the cells of one column.
    pub fn col(&self, column: &str) -> ColumnView<'_> {
        ColumnView::new(self, column)
    }

    /// Execute query text against this table and return the result table.
    ///
    /// `$mtable` and `$gtable` are replaced by the name of the table being
    /// queried. A closed table is queried through a temporary copy named
    /// `<name>_copy`, which is closed and deleted again whatever the
    /// outcome of the query. The result is named after this table either
    /// way.
    pub fn execute_query(&self, query: &str) -> Result<Table> {
        match self.backend.as_deref() {
            Some(backend) => self.run_query(backend, &self.name, query),
            None => self.query_through_copy(query),
        }
    }

    fn run_query(&self, from: &dyn TableBackend, target: &str, query: &str) -> Result<Table> {
        let text = substitute_placeholders(query, target);
        log::debug!("query source: {}", from.name());
        log::debug!("query text: {text}");
        let result = from.query(&text, &self.name).map_err(|source| Error::Query {
            query: text.clone(),
            source,
        })?;
        log::debug!("query result: {}", result.name());
        Ok(Table::from_backend(
            Rc::clone(&self.store),
            result,
            OpenOptions::new(),
        ))
    }

    fn query_through_copy(&self, query: &str) -> Result<Table> {
        let copy_name = format!("{}{COPY_SUFFIX}", self.name);
        if Path::new(&copy_name).exists() {
            return Err(Error::InvalidArgument(format!(
                "cannot query closed table {}: {copy_name} already exists",
                self.name
            )));
        }
        let copy = match self.store.copy_table(&self.name, &copy_name, false) {
            Ok(copy) => copy,
            Err(source) => {
                // Anything at the copy path now was left by this failed copy.
                if Path::new(&copy_name).exists() {
                    if let Err(err) = std::fs::remove_dir_all(&copy_name) {
                        log::warn!("could not remove partial copy {copy_name}: {err}");
                    }
                }
                return Err(Error::Engine {
                    context: format!("copying {} to {copy_name}", self.name),
                    source,
                });
            }
        };

        let outcome = self.run_query(copy.as_ref(), &copy_name, query);
        let cleanup = discard_copy(self.store.as_ref(), copy, &copy_name);
        match (outcome, cleanup) {
            (Ok(table), Ok(())) => Ok(table),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                log::warn!("{cleanup_err}");
                Err(err)
            }
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("{err}");
        }
    }
}

/// Close the temporary copy and have the engine delete it. Both steps are
/// attempted; the first failure is reported.
fn discard_copy(
    store: &dyn TableStore,
    mut copy: Box<dyn TableBackend>,
    path: &str,
) -> Result<()> {
    let closed = copy
        .close()
        .context(|| format!("closing temporary copy {path}"));
    drop(copy);
    let removed = store.delete_table(path).map_err(|source| Error::Cleanup {
        path: path.into(),
        source,
    });
    closed.and(removed)
}

fn substitute_placeholders(query: &str, name: &str) -> String {
    query
        .replace(MAIN_TABLE_PLACEHOLDER, name)
        .replace(GIVEN_TABLE_PLACEHOLDER, name)
}

/// Turn the engine's `[5, 10]` into `[10, 5]`.
fn reverse_shape_text(text: &str) -> Result<String> {
    let malformed = || Error::MalformedRecord(format!("cell shape {text:?}"));
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let dims = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner
            .split(',')
            .map(|d| d.trim().parse::<usize>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>>>()?
    };
    let dims: Vec<String> = reverse_axes(dims).iter().map(|d| d.to_string()).collect();
    Ok(format!("[{}]", dims.join(", ")))
}
