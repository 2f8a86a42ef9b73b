use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytemuck::{cast_slice, pod_collect_to_vec};
use ndarray::{Array1, Slice};

use super::coordsys::MemoryCoordinates;
use super::{is_materialised, materialise, resolve_axis};
use crate::coordsys::CoordinateBackend;
use crate::error::{EngineError, Result};
use crate::image::{ImageBackend, ImageStore, PixelBuffer, PixelType};
use crate::map_array;
use crate::value::{column_major_from_vec, to_column_major, ArrayValue, Record, Value};

/// A restoring beam. Axes in arcsec, position angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    pub major: f64,
    pub minor: f64,
    pub position_angle: f64,
}

fn quantity(value: f64, unit: &str) -> Record {
    Record::new().with("unit", unit).with("value", value)
}

impl Beam {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("major", quantity(self.major, "arcsec"))
            .with("minor", quantity(self.minor, "arcsec"))
            .with("positionangle", quantity(self.position_angle, "deg"))
    }
}

/// One beam per (channel, polarization) plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PerPlaneBeams {
    nchan: usize,
    nstokes: usize,
    // channel-major: beams[chan * nstokes + stokes]
    beams: Vec<Beam>,
}

impl PerPlaneBeams {
    /// Build the beam set by evaluating `beam(channel, stokes)` for each plane.
    pub fn new(nchan: usize, nstokes: usize, beam: impl Fn(usize, usize) -> Beam) -> Self {
        let mut beams = Vec::with_capacity(nchan * nstokes);
        for c in 0..nchan {
            for p in 0..nstokes {
                beams.push(beam(c, p));
            }
        }
        PerPlaneBeams {
            nchan,
            nstokes,
            beams,
        }
    }

    pub fn beam(&self, channel: usize, stokes: usize) -> Option<&Beam> {
        if channel >= self.nchan || stokes >= self.nstokes {
            return None;
        }
        self.beams.get(channel * self.nstokes + stokes)
    }

    /// Engine record form: beams nested by `"*<channel>"` then `"*<stokes>"`.
    pub fn to_record(&self) -> Record {
        let mut beams = Record::new();
        for c in 0..self.nchan {
            let mut per_chan = Record::new();
            for p in 0..self.nstokes {
                if let Some(beam) = self.beam(c, p) {
                    per_chan.insert(format!("*{p}"), beam.to_record());
                }
            }
            beams.insert(format!("*{c}"), per_chan);
        }
        Record::new()
            .with("nChannels", self.nchan)
            .with("nStokes", self.nstokes)
            .with("beams", beams)
    }
}

/// Contents of one image held by a [`MemoryImageStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryImage {
    shape: Vec<usize>,
    pixel_type: PixelType,
    raw: Vec<u8>,
    unit: String,
    coordinates: MemoryCoordinates,
    misc: Record,
    beams: Option<PerPlaneBeams>,
}

impl MemoryImage {
    /// An image from a column-major pixel buffer in native shape.
    pub fn new(shape: &[usize], pixels: PixelBuffer) -> Result<Self> {
        let npix: usize = shape.iter().product();
        if pixels.len() != npix {
            return Err(EngineError::TypeMismatch(format!(
                "{} pixels for shape {:?}",
                pixels.len(),
                shape
            )));
        }
        let pixel_type = pixels.pixel_type();
        let raw = match &pixels {
            PixelBuffer::Float(v) => cast_slice::<f32, u8>(v).to_vec(),
            PixelBuffer::Double(v) => cast_slice::<f64, u8>(v).to_vec(),
        };
        Ok(MemoryImage {
            shape: shape.to_vec(),
            pixel_type,
            raw,
            unit: String::new(),
            coordinates: MemoryCoordinates::default_for_ndim(shape.len()),
            misc: Record::new(),
            beams: None,
        })
    }

    /// A zero-filled `float` image.
    pub fn zeros(shape: &[usize]) -> Self {
        let npix: usize = shape.iter().product();
        MemoryImage {
            shape: shape.to_vec(),
            pixel_type: PixelType::Float,
            raw: vec![0u8; npix * PixelType::Float.width()],
            unit: String::new(),
            coordinates: MemoryCoordinates::default_for_ndim(shape.len()),
            misc: Record::new(),
            beams: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_coordinates(mut self, coordinates: MemoryCoordinates) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn with_misc_info(mut self, misc: Record) -> Self {
        self.misc = misc;
        self
    }

    pub fn with_beams(mut self, beams: PerPlaneBeams) -> Self {
        self.beams = Some(beams);
        self
    }

    /// All pixels as a column-major array in native shape.
    fn pixels(&self) -> Result<ArrayValue> {
        Ok(match self.pixel_type {
            PixelType::Float => {
                let v: Vec<f32> = pod_collect_to_vec(&self.raw);
                ArrayValue::Float(column_major_from_vec(&self.shape, v)?)
            }
            PixelType::Double => {
                let v: Vec<f64> = pod_collect_to_vec(&self.raw);
                ArrayValue::Double(column_major_from_vec(&self.shape, v)?)
            }
        })
    }

    fn summary(&self) -> Result<Record> {
        let shape = self
            .shape
            .iter()
            .map(|&d| {
                i64::try_from(d)
                    .map_err(|_| EngineError::TypeMismatch(format!("axis length {d} overflows")))
            })
            .collect::<Result<Vec<i64>>>()?;
        let strings = |v: Vec<String>| Value::from(Array1::from_vec(v).into_dyn());
        let doubles = |v: Vec<f64>| Value::from(Array1::from_vec(v).into_dyn());
        let cs = &self.coordinates;
        let mut rec = Record::new()
            .with("ndim", self.shape.len())
            .with("shape", Array1::from_vec(shape).into_dyn())
            .with("unit", self.unit.as_str())
            .with("axisnames", strings(cs.axis_names()?))
            .with("axisunits", strings(cs.units()?))
            .with("refpix", doubles(cs.reference_pixel()?))
            .with("refval", doubles(cs.reference_value()?))
            .with("incr", doubles(cs.increment()?))
            .with("hasmask", false)
            .with("imagetype", "Intensity");
        if let Some(beams) = &self.beams {
            rec.insert("perplanebeams", beams.to_record());
        }
        Ok(rec)
    }
}

/// A catalog of images shared by every handle opened through it.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageStore {
    images: Rc<RefCell<HashMap<String, Rc<MemoryImage>>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        MemoryImageStore::default()
    }

    /// Register an image at `path`, replacing any previous one.
    pub fn insert_image(&self, path: &str, image: MemoryImage) -> Result<()> {
        materialise(path)?;
        self.images
            .borrow_mut()
            .insert(path.to_string(), Rc::new(image));
        Ok(())
    }

    fn create(
        &self,
        path: &str,
        image: MemoryImage,
        overwrite: bool,
    ) -> Result<Box<dyn ImageBackend>> {
        if !overwrite && is_materialised(path) {
            return Err(EngineError::AlreadyExists(path.into()));
        }
        self.insert_image(path, image)?;
        self.open_image(path)
    }
}

impl ImageStore for MemoryImageStore {
    fn open_image(&self, path: &str) -> Result<Box<dyn ImageBackend>> {
        let image = self.images.borrow().get(path).cloned();
        match image {
            Some(image) if is_materialised(path) => Ok(Box::new(MemoryImageHandle {
                name: path.to_string(),
                image,
                open: true,
            })),
            _ => Err(EngineError::NotFound(path.into())),
        }
    }

    fn create_from_shape(
        &self,
        path: &str,
        shape: &[usize],
        overwrite: bool,
    ) -> Result<Box<dyn ImageBackend>> {
        self.create(path, MemoryImage::zeros(shape), overwrite)
    }

    fn create_from_pixels(
        &self,
        path: &str,
        shape: &[usize],
        pixels: PixelBuffer,
        overwrite: bool,
    ) -> Result<Box<dyn ImageBackend>> {
        self.create(path, MemoryImage::new(shape, pixels)?, overwrite)
    }
}

/// An open handle on an image in a [`MemoryImageStore`].
#[derive(Debug)]
pub struct MemoryImageHandle {
    name: String,
    image: Rc<MemoryImage>,
    open: bool,
}

impl MemoryImageHandle {
    fn image(&self) -> Result<&MemoryImage> {
        if self.open {
            Ok(&self.image)
        } else {
            Err(EngineError::Closed(self.name.clone()))
        }
    }
}

impl ImageBackend for MemoryImageHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> Result<Vec<usize>> {
        Ok(self.image()?.shape.clone())
    }

    fn get_chunk(&self, blc: &[i64], trc: &[i64], inc: &[i64]) -> Result<ArrayValue> {
        let image = self.image()?;
        let mut slices = Vec::with_capacity(image.shape.len());
        for (axis, &len) in image.shape.iter().enumerate() {
            let (start, end, step) = resolve_axis(
                len,
                blc.get(axis).copied(),
                trc.get(axis).copied(),
                inc.get(axis).copied(),
            )
            .ok_or_else(|| {
                EngineError::InvalidSlice(format!(
                    "axis {axis}: blc={blc:?} trc={trc:?} for length {len}"
                ))
            })?;
            slices.push(Slice::new(start, Some(end), step));
        }
        let full = image.pixels()?;
        Ok(map_array!(&full, a => {
            to_column_major(a.slice_each_axis(|ax| slices[ax.axis.index()]))?
        }))
    }

    fn brightness_unit(&self) -> Result<String> {
        Ok(self.image()?.unit.clone())
    }

    fn summary(&self) -> Result<Record> {
        self.image()?.summary()
    }

    fn coordinate_system(&self) -> Result<Box<dyn CoordinateBackend>> {
        Ok(Box::new(self.image()?.coordinates.clone()))
    }

    fn misc_info(&self) -> Result<Record> {
        Ok(self.image()?.misc.clone())
    }

    fn pixel_type(&self) -> Result<PixelType> {
        Ok(self.image()?.pixel_type)
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
