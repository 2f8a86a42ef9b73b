//! Table capabilities consumed by the facades.
//!
//! All axis-ordered arguments and results here are in the engine's native
//! order: outermost axis first, arrays stored column-major.

use crate::error::Result;
use crate::value::Value;

/// Whether a table is opened for reading or writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

/// Table locking strategies, named as casacore names them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    #[default]
    Default,
    Auto,
    AutoNoRead,
    User,
    UserNoRead,
    Permanent,
    PermanentWait,
}

impl LockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::Default => "default",
            LockMode::Auto => "auto",
            LockMode::AutoNoRead => "autonoread",
            LockMode::User => "user",
            LockMode::UserNoRead => "usernoread",
            LockMode::Permanent => "permanent",
            LockMode::PermanentWait => "permanentwait",
        }
    }
}

/// Options for opening an existing table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub mode: OpenMode,
    pub lock: LockMode,
}

impl OpenOptions {
    /// Read-only access with the default lock mode.
    pub fn new() -> Self {
        OpenOptions::default()
    }

    /// Request write access.
    pub fn writable(mut self) -> Self {
        self.mode = OpenMode::ReadWrite;
        self
    }

    /// Set the lock mode.
    pub fn lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == OpenMode::ReadOnly
    }
}

/// Opens tables by name and tracks which ones are currently open.
pub trait TableStore {
    /// Open the table stored at `path`.
    fn open_table(&self, path: &str, options: &OpenOptions) -> Result<Box<dyn TableBackend>>;

    /// Whether any handle on `path` is currently open.
    fn is_open(&self, path: &str) -> bool;

    /// Copy the table at `src` to `dst` and return an open handle on the copy.
    ///
    /// A shallow copy (`deep == false`) shares data managers with the source
    /// where the engine supports it.
    fn copy_table(&self, src: &str, dst: &str, deep: bool) -> Result<Box<dyn TableBackend>>;

    /// Forget the table at `path` and delete its backing storage. Handles
    /// on it should be closed first.
    fn delete_table(&self, path: &str) -> Result<()>;
}

/// An open table.
pub trait TableBackend {
    /// Resolved name of the table (its path for persistent tables).
    fn name(&self) -> &str;

    fn nrows(&self) -> Result<usize>;

    fn column_names(&self) -> Result<Vec<String>>;

    /// Full contents of one cell.
    fn get_cell(&self, column: &str, row: usize) -> Result<Value>;

    /// Inclusive rectangular slice `blc..=trc` with step `incr` of one
    /// array cell. All three bounds have one entry per native axis.
    fn get_cell_slice(
        &self,
        column: &str,
        row: usize,
        blc: &[i64],
        trc: &[i64],
        incr: &[i64],
    ) -> Result<Value>;

    /// Per-row cell shapes as text such as `"[5, 10]"`, covering `nrow` rows
    /// (all remaining when `None`) from `start_row`, every `row_incr` rows.
    fn column_shape_strings(
        &self,
        column: &str,
        start_row: usize,
        nrow: Option<usize>,
        row_incr: usize,
    ) -> Result<Vec<String>>;

    /// Execute query text and return a handle over the result set. The
    /// result is named after `source_name`, the table the caller asked to
    /// query, even when the text names some other table.
    fn query(&self, query: &str, source_name: &str) -> Result<Box<dyn TableBackend>>;

    fn close(&mut self) -> Result<()>;
}
