//! Image capabilities consumed by the facades.

use crate::coordsys::CoordinateBackend;
use crate::error::{EngineError, Result};
use crate::value::{ArrayValue, Record};

/// The pixel data type of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Float,
    Double,
}

impl PixelType {
    /// Type code as the engine reports it.
    pub fn as_str(self) -> &'static str {
        match self {
            PixelType::Float => "float",
            PixelType::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "float" | "f" => Ok(PixelType::Float),
            "double" | "d" => Ok(PixelType::Double),
            other => Err(EngineError::TypeMismatch(format!(
                "unsupported pixel type: {other}"
            ))),
        }
    }

    /// Bytes per pixel.
    pub fn width(self) -> usize {
        match self {
            PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }
}

/// A pixel buffer in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl PixelBuffer {
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::Float(v) => v.len(),
            PixelBuffer::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelBuffer::Float(_) => PixelType::Float,
            PixelBuffer::Double(_) => PixelType::Double,
        }
    }
}

/// Opens and allocates images.
pub trait ImageStore {
    fn open_image(&self, path: &str) -> Result<Box<dyn ImageBackend>>;

    /// Allocate a zero-filled `float` image with the given native shape.
    fn create_from_shape(
        &self,
        path: &str,
        shape: &[usize],
        overwrite: bool,
    ) -> Result<Box<dyn ImageBackend>>;

    /// Allocate an image from a column-major pixel buffer.
    fn create_from_pixels(
        &self,
        path: &str,
        shape: &[usize],
        pixels: PixelBuffer,
        overwrite: bool,
    ) -> Result<Box<dyn ImageBackend>>;
}

/// An open image.
pub trait ImageBackend {
    fn name(&self) -> &str;

    /// Native shape, outermost axis first.
    fn shape(&self) -> Result<Vec<usize>>;

    /// Read the inclusive region `blc..=trc` with step `inc`. Missing
    /// entries and negative values select the full extent of that axis.
    fn get_chunk(&self, blc: &[i64], trc: &[i64], inc: &[i64]) -> Result<ArrayValue>;

    fn brightness_unit(&self) -> Result<String>;

    fn summary(&self) -> Result<Record>;

    fn coordinate_system(&self) -> Result<Box<dyn CoordinateBackend>>;

    fn misc_info(&self) -> Result<Record>;

    fn pixel_type(&self) -> Result<PixelType>;

    fn close(&mut self) -> Result<()>;
}
