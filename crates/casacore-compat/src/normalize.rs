//! Conversion from the engine's axis convention to the python-casacore one.
//!
//! The engine hands out arrays outermost-axis-first in column-major memory
//! order. Callers of this crate expect innermost-axis-first, row-major
//! arrays. Reversing all axes of a column-major array yields exactly that
//! row-major array without moving any element.

use casa_engine::{ArrayValue, Record, Value};

/// Rewrite `value` so that every column-major array inside it, at any
/// depth, has its axes reversed. Containers keep their keys, order and
/// length; every other value passes through untouched.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(a) => Value::Array(normalize_array(a)),
        Value::List(items) => Value::List(items.into_iter().map(normalize).collect()),
        Value::Record(rec) => Value::Record(normalize_record(rec)),
        other => other,
    }
}

/// Reverse the axes of a column-major array; leave anything else alone.
pub fn normalize_array(array: ArrayValue) -> ArrayValue {
    if array.is_column_major() {
        log::trace!("transposing {} array of shape {:?}", array.type_name(), array.shape());
        array.reversed_axes()
    } else {
        array
    }
}

pub fn normalize_record(record: Record) -> Record {
    record.into_iter().map(|(k, v)| (k, normalize(v))).collect()
}

/// Reverse an axis-ordered list (shape, axis names, per-axis bounds).
pub fn reverse_axes<T>(mut axes: Vec<T>) -> Vec<T> {
    axes.reverse();
    axes
}

/// Results that can pass through the normalizer.
pub trait Normalize {
    fn normalize(self) -> Self;
}

impl Normalize for Value {
    fn normalize(self) -> Self {
        normalize(self)
    }
}

impl Normalize for ArrayValue {
    fn normalize(self) -> Self {
        normalize_array(self)
    }
}

impl Normalize for Record {
    fn normalize(self) -> Self {
        normalize_record(self)
    }
}

impl<T: Normalize> Normalize for Vec<T> {
    fn normalize(self) -> Self {
        self.into_iter().map(Normalize::normalize).collect()
    }
}

impl<T: Normalize> Normalize for Option<T> {
    fn normalize(self) -> Self {
        self.map(Normalize::normalize)
    }
}

macro_rules! impl_normalize_identity {
    ($($t:ty),* $(,)?) => {
        $(
            impl Normalize for $t {
                fn normalize(self) -> Self {
                    self
                }
            }
        )*
    };
}

impl_normalize_identity!(bool, i64, usize, f64, String, ());
