use ndarray::Array1;

use crate::coordsys::{CoordinateAxes, CoordinateBackend};
use crate::error::{EngineError, Result};
use crate::value::{Record, Value};

/// The kinds of coordinate the reference engine models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateKind {
    Direction,
    Spectral,
    Stokes,
    Linear,
}

impl CoordinateKind {
    /// Type name in engine spelling.
    pub fn type_name(self) -> &'static str {
        match self {
            CoordinateKind::Direction => "Direction",
            CoordinateKind::Spectral => "Spectral",
            CoordinateKind::Stokes => "Stokes",
            CoordinateKind::Linear => "Linear",
        }
    }

    fn record_prefix(self) -> &'static str {
        match self {
            CoordinateKind::Direction => "direction",
            CoordinateKind::Spectral => "spectral",
            CoordinateKind::Stokes => "stokes",
            CoordinateKind::Linear => "linear",
        }
    }
}

/// One coordinate and the world axes it spans.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSpec {
    pub kind: CoordinateKind,
    pub axis_names: Vec<String>,
    pub units: Vec<String>,
    pub reference_pixel: Vec<f64>,
    pub reference_value: Vec<f64>,
    pub increment: Vec<f64>,
    pub projection: Option<String>,
}

impl CoordinateSpec {
    fn new(kind: CoordinateKind, names: &[&str], units: &[&str]) -> Self {
        let n = names.len();
        CoordinateSpec {
            kind,
            axis_names: names.iter().map(|s| s.to_string()).collect(),
            units: units.iter().map(|s| s.to_string()).collect(),
            reference_pixel: vec![0.0; n],
            reference_value: vec![0.0; n],
            increment: vec![1.0; n],
            projection: None,
        }
    }

    /// Right ascension and declination in radians.
    pub fn direction(projection: &str) -> Self {
        let mut spec = CoordinateSpec::new(
            CoordinateKind::Direction,
            &["Right Ascension", "Declination"],
            &["rad", "rad"],
        );
        spec.projection = Some(projection.to_string());
        spec
    }

    /// A frequency axis in Hz.
    pub fn spectral() -> Self {
        CoordinateSpec::new(CoordinateKind::Spectral, &["Frequency"], &["Hz"])
    }

    pub fn stokes() -> Self {
        CoordinateSpec::new(CoordinateKind::Stokes, &["Stokes"], &[""])
    }

    /// `n` unitless linear axes.
    pub fn linear(n: usize) -> Self {
        let names: Vec<String> = (0..n).map(|i| format!("Linear Axis {i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        CoordinateSpec::new(CoordinateKind::Linear, &names, &vec![""; n])
    }

    pub fn with_reference_pixel(mut self, values: Vec<f64>) -> Self {
        self.reference_pixel = values;
        self
    }

    pub fn with_reference_value(mut self, values: Vec<f64>) -> Self {
        self.reference_value = values;
        self
    }

    pub fn with_increment(mut self, values: Vec<f64>) -> Self {
        self.increment = values;
        self
    }

    pub fn naxes(&self) -> usize {
        self.axis_names.len()
    }

    fn to_record(&self) -> Record {
        let mut rec = Record::new()
            .with("axes", strings(&self.axis_names))
            .with("units", strings(&self.units))
            .with("crval", doubles(&self.reference_value))
            .with("crpix", doubles(&self.reference_pixel))
            .with("cdelt", doubles(&self.increment));
        if let Some(projection) = &self.projection {
            rec.insert("projection", projection.as_str());
        }
        rec
    }
}

fn strings(values: &[String]) -> Value {
    Value::from(Array1::from_vec(values.to_vec()).into_dyn())
}

fn doubles(values: &[f64]) -> Value {
    Value::from(Array1::from_vec(values.to_vec()).into_dyn())
}

/// An ordered list of coordinates. Coordinate `i` owns the pixel axes that
/// follow those of coordinate `i - 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryCoordinates {
    coordinates: Vec<CoordinateSpec>,
}

impl MemoryCoordinates {
    pub fn new() -> Self {
        MemoryCoordinates::default()
    }

    pub fn with(mut self, spec: CoordinateSpec) -> Self {
        self.coordinates.push(spec);
        self
    }

    /// The layout a freshly allocated image of `ndim` axes receives:
    /// direction, then stokes, then spectral, then linear for the rest.
    pub fn default_for_ndim(ndim: usize) -> Self {
        let mut cs = MemoryCoordinates::new();
        match ndim {
            0 => {}
            1 => cs = cs.with(CoordinateSpec::linear(1)),
            2 => cs = cs.with(CoordinateSpec::direction("SIN")),
            3 => {
                cs = cs
                    .with(CoordinateSpec::direction("SIN"))
                    .with(CoordinateSpec::spectral())
            }
            n => {
                cs = cs
                    .with(CoordinateSpec::direction("SIN"))
                    .with(CoordinateSpec::stokes())
                    .with(CoordinateSpec::spectral());
                if n > 4 {
                    cs = cs.with(CoordinateSpec::linear(n - 4));
                }
            }
        }
        cs
    }

    pub fn naxes(&self) -> usize {
        self.coordinates.iter().map(CoordinateSpec::naxes).sum()
    }

    fn concat<T: Clone>(&self, field: impl Fn(&CoordinateSpec) -> &Vec<T>) -> Vec<T> {
        self.coordinates
            .iter()
            .flat_map(|c| field(c).iter().cloned())
            .collect()
    }

    fn axes_of(&self, index: usize) -> Vec<usize> {
        let start: usize = self.coordinates[..index].iter().map(CoordinateSpec::naxes).sum();
        (start..start + self.coordinates[index].naxes()).collect()
    }
}

impl CoordinateBackend for MemoryCoordinates {
    fn axis_names(&self) -> Result<Vec<String>> {
        Ok(self.concat(|c| &c.axis_names))
    }

    fn coordinate_types(&self) -> Result<Vec<String>> {
        Ok(self
            .coordinates
            .iter()
            .map(|c| c.kind.type_name().to_string())
            .collect())
    }

    fn find_coordinate(&self, kind: &str) -> Result<Option<CoordinateAxes>> {
        let found = self
            .coordinates
            .iter()
            .position(|c| c.kind.type_name().eq_ignore_ascii_case(kind));
        Ok(found.map(|i| {
            let axes = self.axes_of(i);
            CoordinateAxes {
                pixel: axes.clone(),
                world: axes,
            }
        }))
    }

    fn reference_pixel(&self) -> Result<Vec<f64>> {
        Ok(self.concat(|c| &c.reference_pixel))
    }

    fn reference_value(&self) -> Result<Vec<f64>> {
        Ok(self.concat(|c| &c.reference_value))
    }

    fn increment(&self) -> Result<Vec<f64>> {
        Ok(self.concat(|c| &c.increment))
    }

    fn units(&self) -> Result<Vec<String>> {
        Ok(self.concat(|c| &c.units))
    }

    fn to_record(&self) -> Result<Record> {
        let mut rec = Record::new();
        for (i, coord) in self.coordinates.iter().enumerate() {
            if coord.units.len() != coord.naxes() {
                return Err(EngineError::TypeMismatch(format!(
                    "coordinate {i} has {} units for {} axes",
                    coord.units.len(),
                    coord.naxes()
                )));
            }
            let axes: Vec<i32> = self.axes_of(i).iter().map(|&a| a as i32).collect();
            let map = Array1::from_vec(axes).into_dyn();
            rec.insert(
                format!("{}{i}", coord.kind.record_prefix()),
                coord.to_record(),
            );
            rec.insert(format!("pixelmap{i}"), map.clone());
            rec.insert(format!("worldmap{i}"), map);
        }
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> MemoryCoordinates {
        MemoryCoordinates::new()
            .with(
                CoordinateSpec::direction("SIN")
                    .with_reference_pixel(vec![50.0, 60.0])
                    .with_increment(vec![-1e-5, 1e-5]),
            )
            .with(CoordinateSpec::stokes())
            .with(CoordinateSpec::spectral().with_reference_value(vec![1.4e9]))
    }

    #[test]
    fn native_order_accessors() {
        let cs = cube();
        assert_eq!(cs.naxes(), 4);
        assert_eq!(
            cs.axis_names().unwrap(),
            vec!["Right Ascension", "Declination", "Stokes", "Frequency"]
        );
        assert_eq!(
            cs.coordinate_types().unwrap(),
            vec!["Direction", "Stokes", "Spectral"]
        );
        assert_eq!(cs.reference_pixel().unwrap(), vec![50.0, 60.0, 0.0, 0.0]);
        assert_eq!(cs.units().unwrap(), vec!["rad", "rad", "", "Hz"]);
    }

    #[test]
    fn find_coordinate_axes() {
        let cs = cube();
        let dir = cs.find_coordinate("direction").unwrap().unwrap();
        assert_eq!(dir.pixel, vec![0, 1]);
        let spec = cs.find_coordinate("Spectral").unwrap().unwrap();
        assert_eq!(spec.pixel, vec![3]);
        assert!(cs.find_coordinate("tabular").unwrap().is_none());
    }

    #[test]
    fn record_form() {
        let rec = cube().to_record().unwrap();
        let dir = rec.get("direction0").and_then(Value::as_record).unwrap();
        assert_eq!(dir.get("projection").and_then(Value::as_str), Some("SIN"));
        assert!(rec.contains_key("stokes1"));
        assert!(rec.contains_key("spectral2"));
        assert!(rec.contains_key("pixelmap2"));
    }

    #[test]
    fn default_layouts() {
        assert_eq!(MemoryCoordinates::default_for_ndim(2).naxes(), 2);
        assert_eq!(MemoryCoordinates::default_for_ndim(3).naxes(), 3);
        assert_eq!(MemoryCoordinates::default_for_ndim(4).naxes(), 4);
        assert_eq!(MemoryCoordinates::default_for_ndim(6).naxes(), 6);
    }
}
