use crate::error::Result;
use crate::value::Record;

/// Pixel and world axes that belong to one coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateAxes {
    pub pixel: Vec<usize>,
    pub world: Vec<usize>,
}

/// Read access to a coordinate system, in native axis order.
pub trait CoordinateBackend {
    /// Axis names, one per world axis.
    fn axis_names(&self) -> Result<Vec<String>>;

    /// Type of each coordinate, spelled as the engine spells it
    /// (`"Direction"`, `"Spectral"`, ...).
    fn coordinate_types(&self) -> Result<Vec<String>>;

    /// Axes of the first coordinate of the given type, matched
    /// case-insensitively, or `None` when there is no such coordinate.
    fn find_coordinate(&self, kind: &str) -> Result<Option<CoordinateAxes>>;

    fn reference_pixel(&self) -> Result<Vec<f64>>;

    fn reference_value(&self) -> Result<Vec<f64>>;

    fn increment(&self) -> Result<Vec<f64>>;

    fn units(&self) -> Result<Vec<String>>;

    /// The engine's full record form of the coordinate system.
    fn to_record(&self) -> Result<Record>;
}
