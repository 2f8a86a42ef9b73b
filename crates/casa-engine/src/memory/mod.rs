//! In-memory reference engine.
//!
//! Stores cells and pixels in native order (outermost axis first,
//! column-major) exactly as a real engine hands them out. Persistent tables
//! and images also get a directory with a marker file at their path, so the
//! filesystem sees the same footprint a real dataset would leave.

mod coordsys;
mod image;
mod query;
mod table;

use std::path::Path;

pub use coordsys::{CoordinateKind, CoordinateSpec, MemoryCoordinates};
pub use image::{Beam, MemoryImage, MemoryImageStore, PerPlaneBeams};
pub use table::{ColumnData, MemoryTableStore, TableData};

use crate::error::Result;

/// Name of the marker file written inside every materialised dataset.
pub const MARKER_FILE: &str = "table.dat";

fn materialise(path: &str) -> Result<()> {
    let dir = Path::new(path);
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(MARKER_FILE), b"casa-engine memory dataset\n")?;
    Ok(())
}

fn is_materialised(path: &str) -> bool {
    Path::new(path).join(MARKER_FILE).is_file()
}

/// Render a shape the way the engine prints it, e.g. `[5, 10]`.
pub fn shape_string(shape: &[usize]) -> String {
    let parts: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Resolve one axis of an inclusive `blc..=trc` request against its length.
/// Negative or missing bounds select the full extent.
fn resolve_axis(
    len: usize,
    blc: Option<i64>,
    trc: Option<i64>,
    inc: Option<i64>,
) -> Option<(isize, isize, isize)> {
    let last = len.checked_sub(1)? as i64;
    let start = blc.filter(|&b| b >= 0).unwrap_or(0);
    let end = trc.filter(|&t| t >= 0 && t <= last).unwrap_or(last);
    let step = inc.filter(|&s| s > 0).unwrap_or(1);
    if start > end {
        return None;
    }
    Some((start as isize, end as isize + 1, step as isize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_string_format() {
        assert_eq!(shape_string(&[5, 10]), "[5, 10]");
        assert_eq!(shape_string(&[3]), "[3]");
        assert_eq!(shape_string(&[]), "[]");
    }

    #[test]
    fn resolve_axis_defaults() {
        assert_eq!(resolve_axis(4, None, None, None), Some((0, 4, 1)));
        assert_eq!(resolve_axis(4, Some(-1), Some(-1), Some(1)), Some((0, 4, 1)));
        assert_eq!(resolve_axis(4, Some(1), Some(2), Some(2)), Some((1, 3, 2)));
        assert_eq!(resolve_axis(4, Some(3), Some(1), None), None);
        assert_eq!(resolve_axis(0, None, None, None), None);
    }

    #[test]
    fn materialise_creates_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.ms");
        let path = path.to_str().unwrap();
        assert!(!is_materialised(path));
        materialise(path).unwrap();
        assert!(is_materialised(path));
    }
}
