//! End-to-end tests of the python-casacore conventions over the in-memory
//! reference engine.
//!
//! Tables and images live in a temporary directory so that temporary query
//! copies leave an observable footprint on disk.

use std::path::Path;
use std::rc::Rc;

use casacore_compat::casa_engine::memory::{
    Beam, CoordinateSpec, MemoryCoordinates, MemoryImage, MemoryImageStore, MemoryTableStore,
    PerPlaneBeams, TableData,
};
use casacore_compat::casa_engine::value::column_major_from_vec;
use casacore_compat::casa_engine::{PixelBuffer, Value};
use casacore_compat::{
    normalize, AxisNames, Error, Image, ImageSource, OpenOptions, Stride, Table,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const NROWS: usize = 6;
const NCHAN: usize = 10;
const NCORR: usize = 5;

/// Native `DATA` cells are (NCORR, NCHAN): element `[corr, chan]` of row
/// `r` is `1000 * r + 10 * chan + corr`.
fn visibility_cell(row: usize) -> Value {
    let mut cells = Vec::with_capacity(NCORR * NCHAN);
    for chan in 0..NCHAN {
        for corr in 0..NCORR {
            cells.push((1000 * row + 10 * chan + corr) as f32);
        }
    }
    Value::from(column_major_from_vec(&[NCORR, NCHAN], cells).unwrap())
}

fn main_table(nrows: usize) -> TableData {
    let antenna1 = (0..nrows).map(|r| Value::Int((r % 3) as i64)).collect();
    let time = (0..nrows).map(|r| Value::Float(4.5e9 + r as f64)).collect();
    let data = (0..nrows).map(visibility_cell).collect();
    TableData::new(nrows)
        .with_column("ANTENNA1", antenna1)
        .unwrap()
        .with_column("TIME", time)
        .unwrap()
        .with_column("DATA", data)
        .unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: MemoryTableStore,
    path: String,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.ms").to_str().unwrap().to_string();
        let store = MemoryTableStore::new();
        store.create_table(&path, main_table(NROWS)).unwrap();
        Fixture {
            _dir: dir,
            store,
            path,
        }
    }

    fn open(&self) -> Table {
        Table::open(Rc::new(self.store.clone()), &self.path, OpenOptions::new()).unwrap()
    }
}

fn f32_at(v: &Value, idx: [usize; 2]) -> f32 {
    v.as_array().unwrap().as_float().unwrap()[idx]
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[test]
fn cell_shape_and_contents_are_reversed() {
    let fx = Fixture::new();
    let t = fx.open();
    let cell = t.get_cell("DATA", 2).unwrap();
    assert_eq!(cell.as_array().unwrap().shape(), &[NCHAN, NCORR]);
    assert_eq!(f32_at(&cell, [7, 3]), 2073.0);
    assert_eq!(
        t.column_shapes_as_text("DATA", 0, None, 1).unwrap(),
        vec!["[10, 5]"; NROWS]
    );
}

#[test]
fn cell_slice_in_caller_order() {
    let fx = Fixture::new();
    let t = fx.open();
    // channels 2..=4, correlations 1..=2
    let v = t
        .get_cell_slice("DATA", 1usize, &[2, 1], &[4, 2], 1i64)
        .unwrap();
    assert_eq!(v.as_array().unwrap().shape(), &[3, 2]);
    assert_eq!(f32_at(&v, [0, 0]), 1021.0);
    assert_eq!(f32_at(&v, [2, 1]), 1042.0);

    let strided = t
        .get_cell_slice("DATA", 1usize, &[0, 0], &[9, 4], Stride::PerAxis(vec![3, 2]))
        .unwrap();
    assert_eq!(strided.as_array().unwrap().shape(), &[4, 3]);
    assert_eq!(f32_at(&strided, [3, 2]), 1094.0);
}

#[test]
fn views_agree_with_cells() {
    let fx = Fixture::new();
    let t = fx.open();
    let rows = t.row(&["DATA"], true);
    assert_eq!(rows.column_names().unwrap(), vec!["ANTENNA1", "TIME"]);
    let slice = rows.slice(2..4).unwrap();
    assert_eq!(slice, vec![rows.get(2).unwrap(), rows.get(3).unwrap()]);

    let data = t.col("DATA");
    assert_eq!(data.len().unwrap(), NROWS);
    for (i, cell) in data.slice(..).unwrap().iter().enumerate() {
        assert_eq!(cell, &t.get_cell("DATA", i).unwrap());
    }
}

#[test]
fn query_on_open_and_closed_tables() {
    let fx = Fixture::new();
    let mut t = fx.open();
    let open_result = t
        .execute_query("SELECT TIME, DATA FROM $mtable WHERE ANTENNA1 == 0")
        .unwrap();
    assert_eq!(open_result.nrows().unwrap(), 2);
    assert_eq!(open_result.column_names().unwrap(), vec!["TIME", "DATA"]);

    t.close().unwrap();
    let closed_result = t
        .execute_query("SELECT * FROM $gtable WHERE ANTENNA1 == 0")
        .unwrap();
    assert_eq!(closed_result.nrows().unwrap(), 2);
    assert_eq!(
        closed_result.get_cell("DATA", 1).unwrap(),
        open_result.get_cell("DATA", 1).unwrap()
    );
    assert!(!Path::new(&format!("{}_copy", fx.path)).exists());
    assert!(!t.is_open());
}

#[test]
fn failed_query_on_closed_table_leaves_no_copy() {
    let fx = Fixture::new();
    let mut t = fx.open();
    t.close().unwrap();
    let err = t.execute_query("SELECT * FROM $mtable WHERE TIME ~ 0").unwrap_err();
    assert!(matches!(err, Error::Query { .. }));
    assert!(!Path::new(&format!("{}_copy", fx.path)).exists());
}

#[test]
fn closed_table_rejects_reads() {
    let fx = Fixture::new();
    let mut t = fx.open();
    t.close().unwrap();
    assert!(matches!(t.get_cell("TIME", 0), Err(Error::ClosedHandle { .. })));
    assert!(matches!(
        t.column_shapes_as_text("DATA", 0, None, 1),
        Err(Error::ClosedHandle { .. })
    ));
    assert!(matches!(t.col("TIME").get(0), Err(Error::ClosedHandle { .. })));
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn cube_coordinates() -> MemoryCoordinates {
    MemoryCoordinates::new()
        .with(CoordinateSpec::direction("SIN").with_reference_pixel(vec![8.0, 8.0]))
        .with(CoordinateSpec::stokes())
        .with(CoordinateSpec::spectral().with_increment(vec![2.5e5]))
}

#[test]
fn image_cube_conventions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.image").to_str().unwrap().to_string();
    let store = MemoryImageStore::new();
    let native = [16usize, 16, 2, 3];
    let npix: usize = native.iter().product();
    let image = MemoryImage::new(&native, PixelBuffer::Double((0..npix).map(|i| i as f64).collect()))
        .unwrap()
        .with_unit("Jy/beam")
        .with_coordinates(cube_coordinates())
        .with_beams(PerPlaneBeams::new(3, 2, |c, p| Beam {
            major: 2.0 + c as f64,
            minor: 1.0 + p as f64,
            position_angle: 0.0,
        }));
    store.insert_image(&path, image).unwrap();

    let img = Image::open(&store, &path).unwrap();
    assert_eq!(img.shape().unwrap(), vec![3, 2, 16, 16]);
    assert_eq!(img.datatype().unwrap(), "double");
    assert_eq!(img.unit().unwrap(), "Jy/beam");

    // one spectral plane, both stokes, a 2x2 corner
    let chunk = img
        .get_data(Some(&[1, 0, 0, 0][..]), Some(&[1, 1, 1, 1][..]), None)
        .unwrap();
    assert_eq!(chunk.shape(), &[1, 2, 2, 2]);
    // caller [0, s, y, x] is native [x, y, s, 1]
    let a = chunk.as_double().unwrap();
    let native_index = |x: usize, y: usize, s: usize, c: usize| x + 16 * (y + 16 * (s + 2 * c));
    assert_eq!(a[[0, 1, 1, 0]], native_index(0, 1, 1, 1) as f64);

    let cs = img.coordinates().unwrap();
    assert_eq!(
        cs.axis_names_by_type().unwrap()[0],
        AxisNames::Single("Frequency".into())
    );
    assert_eq!(cs.increment().unwrap()[0], 2.5e5);

    let info = img.info().unwrap();
    let beams = info
        .get("imageinfo")
        .and_then(Value::as_record)
        .and_then(|s| s.get("perplanebeams"))
        .and_then(Value::as_record)
        .unwrap();
    let major = |key: &str| {
        beams
            .get(key)
            .and_then(Value::as_record)
            .and_then(|b| b.get("major"))
            .and_then(Value::as_record)
            .and_then(|q| q.get("value"))
            .and_then(Value::as_float)
            .unwrap()
    };
    // "*<3 * stokes + channel>"
    assert_eq!(major("*4"), 3.0);
    assert_eq!(major("*2"), 4.0);
}

#[test]
fn image_from_array_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("made.image").to_str().unwrap().to_string();
    let store = MemoryImageStore::new();
    let pixels = ndarray::Array::from_shape_fn(ndarray::IxDyn(&[2, 3, 4]), |ix| {
        (100 * ix[0] + 10 * ix[1] + ix[2]) as f32
    });
    let img = Image::new(&store, &path, ImageSource::Array(pixels.clone().into())).unwrap();
    assert_eq!(img.shape().unwrap(), vec![2, 3, 4]);
    let back = img.get_data(None, None, None).unwrap();
    assert_eq!(back.as_float().unwrap(), &pixels);
    let plane = img
        .get_data(Some(&[1, 0, 0][..]), Some(&[1, 2, 3][..]), Some(Stride::Scalar(1)))
        .unwrap();
    assert_eq!(plane.as_float().unwrap()[[0, 2, 3]], 123.0);
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[test]
fn normalizer_walks_engine_records() {
    let fx = Fixture::new();
    let t = fx.open();
    let mut rec = casacore_compat::casa_engine::Record::new();
    for r in 0..2 {
        rec.insert(format!("r{r}"), visibility_cell(r));
    }
    let out = normalize(Value::List(vec![Value::Record(rec)]));
    let row0 = out.as_list().unwrap()[0]
        .as_record()
        .and_then(|r| r.get("r0"))
        .unwrap()
        .clone();
    assert_eq!(row0, t.get_cell("DATA", 0).unwrap());
}
