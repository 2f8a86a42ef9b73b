//! Coordinate system view with python-casacore axis ordering.
//!
//! Axis-ordered accessors return the engine's lists reversed, so that axis
//! `i` here matches axis `i` of [`Image::shape`](crate::images::Image::shape).
//! [`CoordinateSystem::as_mapping`] is the exception: it is the engine's own
//! record, untouched, for round-tripping.

use casa_engine::{CoordinateBackend, Record, Value};

use crate::errors::{Error, Result, ResultExt};
use crate::images::Image;
use crate::normalize::reverse_axes;

/// Coordinate type whose axes are reported as a bare name.
const SPECTRAL: &str = "spectral";

/// Axis names of one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisNames {
    /// Spectral coordinates have exactly one axis.
    Single(String),
    Many(Vec<String>),
}

/// A view of a coordinate system, either standalone or belonging to an
/// open [`Image`].
pub struct CoordinateSystem<'a> {
    cs: Box<dyn CoordinateBackend>,
    image: Option<&'a Image>,
}

impl std::fmt::Debug for CoordinateSystem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateSystem")
            .field("image", &self.image.map(Image::name))
            .finish()
    }
}

impl CoordinateSystem<'static> {
    /// Wrap a coordinate system not tied to any image.
    pub fn standalone(cs: Box<dyn CoordinateBackend>) -> Self {
        CoordinateSystem { cs, image: None }
    }
}

impl<'a> CoordinateSystem<'a> {
    pub(crate) fn of_image(image: &'a Image, cs: Box<dyn CoordinateBackend>) -> Self {
        CoordinateSystem {
            cs,
            image: Some(image),
        }
    }

    fn backend(&self) -> Result<&dyn CoordinateBackend> {
        match self.image {
            Some(image) if !image.is_open() => Err(Error::ClosedHandle {
                name: image.name().to_string(),
            }),
            _ => Ok(self.cs.as_ref()),
        }
    }

    fn describe(&self) -> String {
        match self.image {
            Some(image) => format!("coordinates of {}", image.name()),
            None => "coordinates".to_string(),
        }
    }

    /// For each coordinate, in reversed order, the names of its axes in
    /// reversed order. A spectral coordinate yields its single axis name.
    pub fn axis_names_by_type(&self) -> Result<Vec<AxisNames>> {
        let cs = self.backend()?;
        let names = cs
            .axis_names()
            .context(|| format!("reading axis names of {}", self.describe()))?;
        let mut out = Vec::new();
        for kind in self.type_names()? {
            let axes = cs
                .find_coordinate(&kind)
                .context(|| format!("locating {kind} axes in {}", self.describe()))?
                .ok_or_else(|| Error::MalformedRecord(format!("no {kind} coordinate")))?;
            let mut axis_names = Vec::with_capacity(axes.pixel.len());
            for &idx in axes.pixel.iter().rev() {
                let name = names.get(idx).ok_or_else(|| {
                    Error::MalformedRecord(format!("{kind} axis {idx} has no name"))
                })?;
                axis_names.push(name.clone());
            }
            if kind == SPECTRAL {
                let name = axis_names.into_iter().next().ok_or_else(|| {
                    Error::MalformedRecord("spectral coordinate without axes".to_string())
                })?;
                out.push(AxisNames::Single(name));
            } else {
                out.push(AxisNames::Many(axis_names));
            }
        }
        Ok(out)
    }

    pub fn reference_pixel(&self) -> Result<Vec<f64>> {
        self.backend()?
            .reference_pixel()
            .map(reverse_axes)
            .context(|| format!("reading reference pixel of {}", self.describe()))
    }

    pub fn reference_value(&self) -> Result<Vec<f64>> {
        self.backend()?
            .reference_value()
            .map(reverse_axes)
            .context(|| format!("reading reference value of {}", self.describe()))
    }

    pub fn increment(&self) -> Result<Vec<f64>> {
        self.backend()?
            .increment()
            .map(reverse_axes)
            .context(|| format!("reading increment of {}", self.describe()))
    }

    pub fn units(&self) -> Result<Vec<String>> {
        self.backend()?
            .units()
            .map(reverse_axes)
            .context(|| format!("reading units of {}", self.describe()))
    }

    /// Coordinate type names, lowercased, in reversed order.
    pub fn type_names(&self) -> Result<Vec<String>> {
        let types = self
            .backend()?
            .coordinate_types()
            .context(|| format!("reading coordinate types of {}", self.describe()))?;
        Ok(types.iter().rev().map(|t| t.to_lowercase()).collect())
    }

    /// The engine's record form of the coordinate system, in native order.
    pub fn as_mapping(&self) -> Result<Record> {
        self.backend()?
            .to_record()
            .context(|| format!("serializing {}", self.describe()))
    }

    /// The first direction coordinate, if there is one.
    pub fn direction_coordinate(&self) -> Result<Option<DirectionCoordinate>> {
        let record = self.as_mapping()?;
        for (key, value) in record.iter() {
            if key.starts_with("direction") {
                let rec = value.as_record().ok_or_else(|| {
                    Error::MalformedRecord(format!("{key} is not a record"))
                })?;
                return Ok(Some(DirectionCoordinate::from_record(rec.clone())));
            }
        }
        Ok(None)
    }
}

/// A direction coordinate built from its record form.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionCoordinate {
    record: Record,
}

impl DirectionCoordinate {
    pub fn from_record(record: Record) -> Self {
        DirectionCoordinate { record }
    }

    /// Projection code, e.g. `SIN`.
    pub fn projection(&self) -> Result<&str> {
        self.record
            .get("projection")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedRecord("direction coordinate without projection".into()))
    }

    pub fn record(&self) -> &Record {
        &self.record
    }
}
