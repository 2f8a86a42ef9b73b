//! Engine seam for casacore-style tables and images.
//!
//! Defines the dynamic [`Value`] model, the capability traits a table or
//! image engine exposes, and (with the `memory` feature) an in-memory
//! reference engine. Everything on this side of the seam uses the engine's
//! native axis order: outermost axis first, arrays stored column-major.

pub mod coordsys;
pub mod error;
pub mod image;
#[cfg(feature = "memory")]
pub mod memory;
pub mod table;
pub mod value;

pub use coordsys::{CoordinateAxes, CoordinateBackend};
pub use error::{EngineError, Result};
pub use image::{ImageBackend, ImageStore, PixelBuffer, PixelType};
pub use table::{LockMode, OpenMode, OpenOptions, TableBackend, TableStore};
pub use value::{ArrayValue, Record, Value};
