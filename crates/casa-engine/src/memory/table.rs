use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ndarray::Slice;

use super::query::{parse_query, Query};
use super::{is_materialised, materialise, shape_string};
use crate::error::{EngineError, Result};
use crate::map_array;
use crate::table::{OpenOptions, TableBackend, TableStore};
use crate::value::{to_column_major, Value};

/// One named column and its cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    pub name: String,
    pub cells: Vec<Value>,
}

/// Contents of a table: equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    columns: Vec<ColumnData>,
    nrows: usize,
}

impl TableData {
    /// An empty table with `nrows` rows and no columns yet.
    pub fn new(nrows: usize) -> Self {
        TableData {
            columns: Vec::new(),
            nrows,
        }
    }

    /// Add a column. Its length must match the row count.
    pub fn add_column(&mut self, name: &str, cells: Vec<Value>) -> Result<()> {
        if cells.len() != self.nrows {
            return Err(EngineError::TypeMismatch(format!(
                "column {name} has {} cells, table has {} rows",
                cells.len(),
                self.nrows
            )));
        }
        if self.column(name).is_ok() {
            return Err(EngineError::TypeMismatch(format!(
                "duplicate column {name}"
            )));
        }
        self.columns.push(ColumnData {
            name: name.to_string(),
            cells,
        });
        Ok(())
    }

    /// Builder-style [`add_column`](Self::add_column).
    pub fn with_column(mut self, name: &str, cells: Vec<Value>) -> Result<Self> {
        self.add_column(name, cells)?;
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| EngineError::NoSuchColumn(name.to_string()))
    }

    fn cell(&self, column: &str, row: usize) -> Result<&Value> {
        let col = self.column(column)?;
        col.cells.get(row).ok_or(EngineError::RowOutOfRange {
            row,
            nrows: self.nrows,
        })
    }

    /// Keep the rows whose index passes `keep` and the listed columns.
    fn select(&self, columns: Option<&[String]>, keep: &[usize]) -> Result<TableData> {
        let names = match columns {
            Some(names) => names.to_vec(),
            None => self.column_names(),
        };
        let mut out = TableData::new(keep.len());
        for name in &names {
            let col = self.column(name)?;
            let cells = keep.iter().map(|&r| col.cells[r].clone()).collect();
            out.add_column(name, cells)?;
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct Catalog {
    tables: HashMap<String, Rc<TableData>>,
    open: HashMap<String, usize>,
    queries: usize,
}

impl Catalog {
    fn mark_open(&mut self, name: &str) {
        *self.open.entry(name.to_string()).or_insert(0) += 1;
    }

    fn mark_closed(&mut self, name: &str) {
        if let Some(count) = self.open.get_mut(name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.open.remove(name);
            }
        }
    }
}

/// A catalog of tables shared by every handle opened through it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    catalog: Rc<RefCell<Catalog>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        MemoryTableStore::default()
    }

    /// Register a persistent table at `path` and create its directory.
    pub fn create_table(&self, path: &str, data: TableData) -> Result<()> {
        if self.catalog.borrow().tables.contains_key(path) && is_materialised(path) {
            return Err(EngineError::AlreadyExists(path.into()));
        }
        materialise(path)?;
        self.catalog
            .borrow_mut()
            .tables
            .insert(path.to_string(), Rc::new(data));
        Ok(())
    }

    fn handle(&self, name: &str, data: Rc<TableData>, persistent: bool) -> MemoryTable {
        if persistent {
            self.catalog.borrow_mut().mark_open(name);
        }
        MemoryTable {
            catalog: Rc::clone(&self.catalog),
            name: name.to_string(),
            data,
            open: true,
            persistent,
        }
    }
}

impl TableStore for MemoryTableStore {
    fn open_table(&self, path: &str, options: &OpenOptions) -> Result<Box<dyn TableBackend>> {
        let data = self.catalog.borrow().tables.get(path).cloned();
        match data {
            Some(data) if is_materialised(path) => {
                log::trace!("opening {path} with lock mode {}", options.lock.as_str());
                Ok(Box::new(self.handle(path, data, true)))
            }
            _ => Err(EngineError::NotFound(path.into())),
        }
    }

    fn is_open(&self, path: &str) -> bool {
        self.catalog.borrow().open.contains_key(path)
    }

    fn copy_table(&self, src: &str, dst: &str, deep: bool) -> Result<Box<dyn TableBackend>> {
        let data = self
            .catalog
            .borrow()
            .tables
            .get(src)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(src.into()))?;
        // A shallow copy shares the cell storage of its source.
        let data = if deep {
            Rc::new(TableData::clone(&data))
        } else {
            data
        };
        materialise(dst)?;
        self.catalog
            .borrow_mut()
            .tables
            .insert(dst.to_string(), Rc::clone(&data));
        Ok(Box::new(self.handle(dst, data, true)))
    }

    fn delete_table(&self, path: &str) -> Result<()> {
        let known = {
            let mut catalog = self.catalog.borrow_mut();
            catalog.open.remove(path);
            catalog.tables.remove(path).is_some()
        };
        if !known && !is_materialised(path) {
            return Err(EngineError::NotFound(path.into()));
        }
        log::trace!("deleting {path}");
        std::fs::remove_dir_all(path)?;
        Ok(())
    }
}

/// An open handle on a table in a [`MemoryTableStore`].
#[derive(Debug)]
pub struct MemoryTable {
    catalog: Rc<RefCell<Catalog>>,
    name: String,
    data: Rc<TableData>,
    open: bool,
    persistent: bool,
}

impl MemoryTable {
    fn data(&self) -> Result<&TableData> {
        if self.open {
            Ok(&self.data)
        } else {
            Err(EngineError::Closed(self.name.clone()))
        }
    }

    fn resolve_source(&self, from: &str) -> Result<Rc<TableData>> {
        if from == self.name {
            return Ok(Rc::clone(&self.data));
        }
        self.catalog
            .borrow()
            .tables
            .get(from)
            .cloned()
            .ok_or_else(|| EngineError::Query(format!("unknown table {from}")))
    }

    fn run(&self, query: &Query) -> Result<TableData> {
        let source = self.resolve_source(&query.from)?;
        let keep = match &query.filter {
            Some(filter) => {
                let col = source.column(&filter.column)?;
                let mut keep = Vec::new();
                for (row, cell) in col.cells.iter().enumerate() {
                    if filter.matches(cell)? {
                        keep.push(row);
                    }
                }
                keep
            }
            None => (0..source.nrows()).collect(),
        };
        source.select(query.columns.as_deref(), &keep)
    }
}

impl TableBackend for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn nrows(&self) -> Result<usize> {
        Ok(self.data()?.nrows())
    }

    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.data()?.column_names())
    }

    fn get_cell(&self, column: &str, row: usize) -> Result<Value> {
        Ok(self.data()?.cell(column, row)?.clone())
    }

    fn get_cell_slice(
        &self,
        column: &str,
        row: usize,
        blc: &[i64],
        trc: &[i64],
        incr: &[i64],
    ) -> Result<Value> {
        let array = match self.data()?.cell(column, row)? {
            Value::Array(a) => a,
            _ => return Err(EngineError::NotAnArray(column.to_string())),
        };
        let shape = array.shape().to_vec();
        if blc.len() != shape.len() || trc.len() != shape.len() || incr.len() != shape.len() {
            return Err(EngineError::InvalidSlice(format!(
                "bounds of length {}/{}/{} for a {}-dimensional cell",
                blc.len(),
                trc.len(),
                incr.len(),
                shape.len()
            )));
        }
        let mut slices = Vec::with_capacity(shape.len());
        for (axis, &len) in shape.iter().enumerate() {
            let (b, t, s) = (blc[axis], trc[axis], incr[axis]);
            if b < 0 || t < b || t >= len as i64 || s < 1 {
                return Err(EngineError::InvalidSlice(format!(
                    "axis {axis}: blc={b} trc={t} incr={s} for length {len}"
                )));
            }
            slices.push(Slice::new(b as isize, Some(t as isize + 1), s as isize));
        }
        let sliced = map_array!(array, a => {
            to_column_major(a.slice_each_axis(|ax| slices[ax.axis.index()]))?
        });
        Ok(Value::Array(sliced))
    }

    fn column_shape_strings(
        &self,
        column: &str,
        start_row: usize,
        nrow: Option<usize>,
        row_incr: usize,
    ) -> Result<Vec<String>> {
        let data = self.data()?;
        let col = data.column(column)?;
        let end = match nrow {
            Some(n) => start_row.saturating_add(n).min(data.nrows()),
            None => data.nrows(),
        };
        col.cells[start_row.min(end)..end]
            .iter()
            .step_by(row_incr.max(1))
            .map(|cell| match cell {
                Value::Array(a) => Ok(shape_string(a.shape())),
                _ => Err(EngineError::NotAnArray(column.to_string())),
            })
            .collect()
    }

    fn query(&self, query: &str, source_name: &str) -> Result<Box<dyn TableBackend>> {
        self.data()?;
        let parsed = parse_query(query)?;
        let result = self.run(&parsed)?;
        let name = {
            let mut catalog = self.catalog.borrow_mut();
            catalog.queries += 1;
            format!("{source_name}.query{}", catalog.queries)
        };
        log::trace!("query produced {} rows in {name}", result.nrows());
        Ok(Box::new(MemoryTable {
            catalog: Rc::clone(&self.catalog),
            name,
            data: Rc::new(result),
            open: true,
            persistent: false,
        }))
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            if self.persistent {
                self.catalog.borrow_mut().mark_closed(&self.name);
            }
        }
        Ok(())
    }
}

impl Drop for MemoryTable {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::column_major_from_vec;

    fn sample(nrows: usize) -> TableData {
        let ids = (0..nrows).map(|i| Value::Int(i as i64)).collect();
        let data = (0..nrows)
            .map(|r| {
                let cells: Vec<f64> = (0..6).map(|i| (r * 100 + i) as f64).collect();
                Value::from(column_major_from_vec(&[2, 3], cells).unwrap())
            })
            .collect();
        TableData::new(nrows)
            .with_column("ID", ids)
            .unwrap()
            .with_column("DATA", data)
            .unwrap()
    }

    fn store_with(path: &str, nrows: usize) -> MemoryTableStore {
        let store = MemoryTableStore::new();
        store.create_table(path, sample(nrows)).unwrap();
        store
    }

    #[test]
    fn add_column_checks_length() {
        let mut t = TableData::new(2);
        assert!(t.add_column("X", vec![Value::Int(1)]).is_err());
        t.add_column("X", vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert!(t.add_column("X", vec![Value::Int(1), Value::Int(2)]).is_err());
    }

    #[test]
    fn open_missing_table_fails() {
        let store = MemoryTableStore::new();
        let err = store
            .open_table("/nonexistent/table", &OpenOptions::new())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn open_tracks_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 3);
        assert!(!store.is_open(path));
        let mut t = store.open_table(path, &OpenOptions::new()).unwrap();
        assert!(store.is_open(path));
        assert_eq!(t.nrows().unwrap(), 3);
        t.close().unwrap();
        assert!(!store.is_open(path));
        assert!(matches!(t.nrows(), Err(EngineError::Closed(_))));
    }

    #[test]
    fn get_cell_returns_column_major_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 2);
        let t = store.open_table(path, &OpenOptions::new()).unwrap();
        let cell = t.get_cell("DATA", 1).unwrap();
        let arr = cell.as_array().unwrap();
        assert_eq!(arr.shape(), &[2, 3]);
        assert!(arr.is_column_major());
        assert!(matches!(
            t.get_cell("DATA", 5),
            Err(EngineError::RowOutOfRange { row: 5, nrows: 2 })
        ));
        assert!(matches!(
            t.get_cell("NOPE", 0),
            Err(EngineError::NoSuchColumn(_))
        ));
    }

    #[test]
    fn cell_slice_native_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 2);
        let t = store.open_table(path, &OpenOptions::new()).unwrap();
        let v = t.get_cell_slice("DATA", 1, &[0, 1], &[1, 2], &[1, 1]).unwrap();
        let arr = v.as_array().unwrap().as_double().unwrap();
        assert_eq!(arr.shape(), &[2, 2]);
        // element [i, j] of the cell is 100 + i + 2 * j
        assert_eq!(arr[[0, 0]], 102.0);
        assert_eq!(arr[[1, 1]], 105.0);
        assert!(v.as_array().unwrap().is_column_major());
    }

    #[test]
    fn cell_slice_rejects_bad_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 1);
        let t = store.open_table(path, &OpenOptions::new()).unwrap();
        assert!(matches!(
            t.get_cell_slice("DATA", 0, &[0], &[1], &[1]),
            Err(EngineError::InvalidSlice(_))
        ));
        assert!(matches!(
            t.get_cell_slice("DATA", 0, &[0, 0], &[2, 0], &[1, 1]),
            Err(EngineError::InvalidSlice(_))
        ));
        assert!(matches!(
            t.get_cell_slice("ID", 0, &[0], &[0], &[1]),
            Err(EngineError::NotAnArray(_))
        ));
    }

    #[test]
    fn shape_strings_are_native() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 4);
        let t = store.open_table(path, &OpenOptions::new()).unwrap();
        let shapes = t.column_shape_strings("DATA", 1, Some(2), 1).unwrap();
        assert_eq!(shapes, vec!["[2, 3]", "[2, 3]"]);
        let shapes = t.column_shape_strings("DATA", 0, None, 2).unwrap();
        assert_eq!(shapes.len(), 2);
        assert!(t.column_shape_strings("ID", 0, None, 1).is_err());
    }

    #[test]
    fn shallow_copy_is_materialised_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("vis.ms");
        let dst = dir.path().join("vis.ms_copy");
        let (src, dst) = (src.to_str().unwrap(), dst.to_str().unwrap());
        let store = store_with(src, 2);
        let copy = store.copy_table(src, dst, false).unwrap();
        assert!(is_materialised(dst));
        assert!(store.is_open(dst));
        assert_eq!(copy.name(), dst);
        assert_eq!(copy.nrows().unwrap(), 2);
    }

    #[test]
    fn delete_forgets_and_removes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("vis.ms");
        let dst = dir.path().join("vis.ms_copy");
        let (src, dst) = (src.to_str().unwrap(), dst.to_str().unwrap());
        let store = store_with(src, 3);
        let mut copy = store.copy_table(src, dst, false).unwrap();
        copy.close().unwrap();
        store.delete_table(dst).unwrap();
        assert!(!std::path::Path::new(dst).exists());
        assert!(matches!(
            store.open_table(dst, &OpenOptions::new()),
            Err(EngineError::NotFound(_))
        ));
        let t = store.open_table(src, &OpenOptions::new()).unwrap();
        assert!(matches!(
            t.query(&format!("SELECT * FROM {dst}"), src),
            Err(EngineError::Query(_))
        ));
        assert!(matches!(store.delete_table(dst), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn query_result_is_named_after_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("vis.ms");
        let dst = dir.path().join("vis.ms_copy");
        let (src, dst) = (src.to_str().unwrap(), dst.to_str().unwrap());
        let store = store_with(src, 3);
        let copy = store.copy_table(src, dst, false).unwrap();
        let q = copy.query(&format!("SELECT * FROM {dst}"), src).unwrap();
        assert!(q.name().starts_with(&format!("{src}.query")));
        let again = q.query(&format!("SELECT ID FROM {}", q.name()), q.name()).unwrap();
        assert_eq!(again.nrows().unwrap(), 3);
    }

    #[test]
    fn query_filters_and_projects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 5);
        let t = store.open_table(path, &OpenOptions::new()).unwrap();
        let q = t
            .query(&format!("SELECT ID FROM {path} WHERE ID >= 3"), path)
            .unwrap();
        assert_eq!(q.nrows().unwrap(), 2);
        assert_eq!(q.column_names().unwrap(), vec!["ID"]);
        assert_eq!(q.get_cell("ID", 0).unwrap(), Value::Int(3));
        assert!(!store.is_open(q.name()));
    }

    #[test]
    fn query_unknown_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.ms");
        let path = path.to_str().unwrap();
        let store = store_with(path, 1);
        let t = store.open_table(path, &OpenOptions::new()).unwrap();
        assert!(matches!(
            t.query("SELECT * FROM elsewhere", path),
            Err(EngineError::Query(_))
        ));
    }
}
