//! python-casacore style facades over a column-major CASA engine.
//!
//! The engine ([`casa_engine`]) hands out arrays outermost-axis-first in
//! column-major order and describes shapes, slice bounds and coordinate
//! axes in the same order. The types here present the opposite convention:
//! row-major arrays and axis lists ordered innermost axis first.
//!
//! ```no_run
//! use std::rc::Rc;
//! use casacore_compat::{casa_engine, OpenOptions, Table};
//!
//! let store = Rc::new(casa_engine::memory::MemoryTableStore::new());
//! let table = Table::open(store, "/data/vis.ms", OpenOptions::new())?;
//! let shapes = table.column_shapes_as_text("DATA", 0, Some(10), 1)?;
//! let selected = table.execute_query("SELECT * FROM $mtable WHERE ANTENNA1 == 0")?;
//! # Ok::<(), casacore_compat::Error>(())
//! ```

pub use casa_engine;

pub mod coordinates;
pub mod errors;
pub mod images;
pub mod intercept;
pub mod normalize;
pub mod rows;
pub mod tables;

pub use casa_engine::{LockMode, OpenMode, OpenOptions};
pub use coordinates::{AxisNames, CoordinateSystem, DirectionCoordinate};
pub use errors::{Error, Result};
pub use images::{Image, ImageSource};
pub use normalize::{normalize, Normalize};
pub use rows::{ColumnView, RowView};
pub use tables::{table_exists, RowSelection, Stride, Table};
