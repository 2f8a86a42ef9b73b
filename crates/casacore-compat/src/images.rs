use casa_engine::{ArrayValue, ImageBackend, ImageStore, PixelBuffer, Record, Value};

use crate::coordinates::CoordinateSystem;
use crate::errors::{Error, Result, ResultExt};
use crate::intercept::normalized;
use crate::normalize::reverse_axes;
use crate::tables::Stride;

/// Key of the per-plane beam sub-record in an image summary.
const PER_PLANE_BEAMS: &str = "perplanebeams";

/// How an [`Image`] comes into being.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Open the existing image at the path.
    Open,
    /// Create a zero-filled image of this shape, innermost axis first.
    Shape(Vec<usize>),
    /// Create an image holding these pixels, innermost axis first.
    Array(ArrayValue),
}

/// An image handle presenting python-casacore conventions.
pub struct Image {
    name: String,
    backend: Option<Box<dyn ImageBackend>>,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Image {
    /// Open or create the image at `path`. Creation replaces any image
    /// already stored there.
    pub fn new(store: &dyn ImageStore, path: &str, source: ImageSource) -> Result<Image> {
        let backend = match source {
            ImageSource::Open => store
                .open_image(path)
                .context(|| format!("opening image {path}"))?,
            ImageSource::Shape(shape) => {
                let native = reverse_axes(shape);
                log::debug!("creating image {path} with native shape {native:?}");
                store
                    .create_from_shape(path, &native, true)
                    .context(|| format!("creating image {path}"))?
            }
            ImageSource::Array(array) => {
                let (native, pixels) = rasterize(&array)?;
                log::debug!("creating image {path} from {} pixels", pixels.len());
                store
                    .create_from_pixels(path, &native, pixels, true)
                    .context(|| format!("creating image {path}"))?
            }
        };
        Ok(Image {
            name: backend.name().to_string(),
            backend: Some(backend),
        })
    }

    pub fn open(store: &dyn ImageStore, path: &str) -> Result<Image> {
        Image::new(store, path, ImageSource::Open)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Release the engine handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut backend) = self.backend.take() {
            backend
                .close()
                .context(|| format!("closing image {}", self.name))?;
        }
        Ok(())
    }

    pub(crate) fn backend(&self) -> Result<&dyn ImageBackend> {
        self.backend.as_deref().ok_or_else(|| Error::ClosedHandle {
            name: self.name.clone(),
        })
    }

    /// The coordinate system of this image.
    pub fn coordinates(&self) -> Result<CoordinateSystem<'_>> {
        let cs = self
            .backend()?
            .coordinate_system()
            .context(|| format!("reading coordinates of {}", self.name))?;
        Ok(CoordinateSystem::of_image(self, cs))
    }

    normalized! {
        /// Pixels between the inclusive corners `blc` and `trc`, innermost
        /// axis first. Missing corners select the whole image and a missing
        /// stride steps by one. A corner shorter than the image rank covers
        /// the leading axes; the remaining axes are read in full.
        pub fn get_data(
            &self,
            blc: Option<&[i64]>,
            trc: Option<&[i64]>,
            stride: Option<Stride>,
        ) -> Result<ArrayValue> {
            let backend = self.backend()?;
            let ndim = self.ndim(backend)?;
            let blc = native_corner("blc", blc, ndim)?;
            let trc = native_corner("trc", trc, ndim)?;
            let inc = reverse_axes(stride.unwrap_or_default().per_axis(ndim)?);
            backend
                .get_chunk(&blc, &trc, &inc)
                .context(|| format!("reading pixels of {}", self.name))
        }

        /// Image shape, innermost axis first.
        pub fn shape(&self) -> Result<Vec<usize>> {
            let native = self
                .backend()?
                .shape()
                .context(|| format!("reading shape of {}", self.name))?;
            Ok(reverse_axes(native))
        }

        /// Brightness unit, e.g. `Jy/beam`.
        pub fn unit(&self) -> Result<String> {
            self.backend()?
                .brightness_unit()
                .context(|| format!("reading unit of {}", self.name))
        }

        /// Image metadata: `imageinfo` (summary with per-plane beams
        /// flattened), `coordinates` and `miscinfo`.
        pub fn info(&self) -> Result<Record> {
            let backend = self.backend()?;
            let mut summary = backend
                .summary()
                .context(|| format!("reading summary of {}", self.name))?;
            if let Some(beams) = summary.get_mut(PER_PLANE_BEAMS) {
                let beams = beams.as_record_mut().ok_or_else(|| {
                    Error::MalformedRecord(format!("{PER_PLANE_BEAMS} is not a record"))
                })?;
                flatten_beams(beams)?;
            }
            let coordinates = backend
                .coordinate_system()
                .and_then(|cs| cs.to_record())
                .context(|| format!("reading coordinates of {}", self.name))?;
            let misc = backend
                .misc_info()
                .context(|| format!("reading misc info of {}", self.name))?;
            Ok(Record::new()
                .with("imageinfo", summary)
                .with("coordinates", coordinates)
                .with("miscinfo", misc))
        }

        /// Pixel type name, `float` or `double`.
        pub fn datatype(&self) -> Result<String> {
            let pixel_type = self
                .backend()?
                .pixel_type()
                .context(|| format!("reading pixel type of {}", self.name))?;
            Ok(pixel_type.as_str().to_string())
        }
    }

    fn ndim(&self, backend: &dyn ImageBackend) -> Result<usize> {
        backend
            .shape()
            .map(|s| s.len())
            .context(|| format!("reading shape of {}", self.name))
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("{err}");
        }
    }
}

/// Pad a caller corner to `ndim` entries with `-1` (full extent) and put it
/// in native order.
fn native_corner(label: &str, corner: Option<&[i64]>, ndim: usize) -> Result<Vec<i64>> {
    let mut corner = corner.map(<[i64]>::to_vec).unwrap_or_default();
    if corner.len() > ndim {
        return Err(Error::InvalidArgument(format!(
            "{label} has {} entries for a {ndim}-dimensional image",
            corner.len()
        )));
    }
    corner.resize(ndim, -1);
    Ok(reverse_axes(corner))
}

/// Lay out `array` as the engine's pixel buffer. Reading the array in
/// row-major order gives the column-major buffer of the reversed shape.
fn rasterize(array: &ArrayValue) -> Result<(Vec<usize>, PixelBuffer)> {
    let native = reverse_axes(array.shape().to_vec());
    let pixels = match array {
        ArrayValue::Float(a) => PixelBuffer::Float(a.iter().copied().collect()),
        ArrayValue::Double(a) => PixelBuffer::Double(a.iter().copied().collect()),
        ArrayValue::Int32(a) => PixelBuffer::Double(a.iter().map(|&v| f64::from(v)).collect()),
        ArrayValue::Int64(a) => PixelBuffer::Double(a.iter().map(|&v| v as f64).collect()),
        other => {
            return Err(Error::InvalidArgument(format!(
                "cannot create an image from {} pixels",
                other.type_name()
            )))
        }
    };
    Ok((native, pixels))
}

fn count(record: &Record, key: &str) -> Result<usize> {
    record
        .get(key)
        .and_then(Value::as_int)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::MalformedRecord(format!("{PER_PLANE_BEAMS}.{key} is not a count")))
}

/// Replace the nested `beams` sub-record (`"*<channel>"` then
/// `"*<stokes>"`) by flat entries keyed `"*<nchan * stokes + channel>"`.
fn flatten_beams(beams: &mut Record) -> Result<()> {
    let nchan = count(beams, "nChannels")?;
    let nstokes = count(beams, "nStokes")?;
    let nested = beams
        .get("beams")
        .and_then(Value::as_record)
        .ok_or_else(|| Error::MalformedRecord(format!("{PER_PLANE_BEAMS}.beams is missing")))?;

    let mut flat = Vec::with_capacity(nchan * nstokes);
    for c in 0..nchan {
        let channel = nested
            .get(&format!("*{c}"))
            .and_then(Value::as_record)
            .ok_or_else(|| Error::MalformedRecord(format!("no beams for channel {c}")))?;
        for p in 0..nstokes {
            let beam = channel.get(&format!("*{p}")).ok_or_else(|| {
                Error::MalformedRecord(format!("no beam for channel {c} stokes {p}"))
            })?;
            flat.push((format!("*{}", nchan * p + c), beam.clone()));
        }
    }
    beams.remove("beams");
    beams.extend(flat);
    Ok(())
}
