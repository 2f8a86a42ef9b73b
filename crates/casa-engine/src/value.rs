//! Dynamic values exchanged with the engine.
//!
//! Cells, records and query results all travel as [`Value`]. Arrays keep the
//! strides the engine produced them with, so whether an array is stored
//! outermost-axis-first (column-major) stays observable after it leaves the
//! engine.

use ndarray::{Array, ArrayD, ArrayViewD, ShapeBuilder};

use crate::error::{EngineError, Result};

/// An n-dimensional array of one of the engine's element types.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Logical(ArrayD<bool>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
    String(ArrayD<String>),
}

/// Apply an expression to the array inside any `ArrayValue` variant,
/// rebuilding the same variant from the result.
#[macro_export]
macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::value::ArrayValue::Logical($arr) => $crate::value::ArrayValue::Logical($body),
            $crate::value::ArrayValue::Int32($arr) => $crate::value::ArrayValue::Int32($body),
            $crate::value::ArrayValue::Int64($arr) => $crate::value::ArrayValue::Int64($body),
            $crate::value::ArrayValue::Float($arr) => $crate::value::ArrayValue::Float($body),
            $crate::value::ArrayValue::Double($arr) => $crate::value::ArrayValue::Double($body),
            $crate::value::ArrayValue::String($arr) => $crate::value::ArrayValue::String($body),
        }
    };
}

/// Evaluate an expression against the array inside any `ArrayValue` variant.
#[macro_export]
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::value::ArrayValue::Logical($arr) => $body,
            $crate::value::ArrayValue::Int32($arr) => $body,
            $crate::value::ArrayValue::Int64($arr) => $body,
            $crate::value::ArrayValue::Float($arr) => $body,
            $crate::value::ArrayValue::Double($arr) => $body,
            $crate::value::ArrayValue::String($arr) => $body,
        }
    };
}

macro_rules! impl_array_conversions {
    ($($variant:ident => $t:ty, $getter:ident);* $(;)?) => {
        $(
            impl From<ArrayD<$t>> for ArrayValue {
                fn from(arr: ArrayD<$t>) -> Self {
                    ArrayValue::$variant(arr)
                }
            }

            impl From<ArrayD<$t>> for Value {
                fn from(arr: ArrayD<$t>) -> Self {
                    Value::Array(ArrayValue::$variant(arr))
                }
            }

            impl ArrayValue {
                /// Borrow the array if it holds this element type.
                pub fn $getter(&self) -> Option<&ArrayD<$t>> {
                    match self {
                        ArrayValue::$variant(a) => Some(a),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_array_conversions! {
    Logical => bool, as_logical;
    Int32 => i32, as_int32;
    Int64 => i64, as_int64;
    Float => f32, as_float;
    Double => f64, as_double;
    String => String, as_string;
}

impl ArrayValue {
    /// Logical shape in the order the strides describe.
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Element type name, as the engine spells it.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArrayValue::Logical(_) => "boolean",
            ArrayValue::Int32(_) => "int",
            ArrayValue::Int64(_) => "int64",
            ArrayValue::Float(_) => "float",
            ArrayValue::Double(_) => "double",
            ArrayValue::String(_) => "string",
        }
    }

    /// True when the elements are laid out outermost-axis-first in memory
    /// (Fortran order). Zero- and one-dimensional arrays count as both orders.
    pub fn is_column_major(&self) -> bool {
        with_array!(self, a => a.view().reversed_axes().is_standard_layout())
    }

    /// True when the elements are laid out innermost-axis-first (C order).
    pub fn is_row_major(&self) -> bool {
        with_array!(self, a => a.is_standard_layout())
    }

    /// Reverse the order of all axes without moving any element.
    pub fn reversed_axes(self) -> Self {
        map_array!(self, a => a.reversed_axes())
    }
}

/// Copy a view into a freshly allocated column-major array of the same
/// logical shape.
pub fn to_column_major<T: Clone>(view: ArrayViewD<'_, T>) -> Result<ArrayD<T>> {
    let dim = view.raw_dim();
    // Iterating the transposed view visits elements first-axis-fastest.
    let data: Vec<T> = view.t().iter().cloned().collect();
    Array::from_shape_vec(dim.f(), data).map_err(|e| EngineError::TypeMismatch(e.to_string()))
}

/// Build a column-major array from a buffer already in column-major order.
pub fn column_major_from_vec<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>> {
    Array::from_shape_vec(shape.f(), data).map_err(|e| EngineError::TypeMismatch(e.to_string()))
}

/// Key-unique mapping that keeps fields in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a field. An existing key keeps its position and the previous
    /// value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut rec = Record::new();
        rec.extend(iter);
        rec
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Record {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// A dynamically typed engine value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(ArrayValue),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ArrayValue> for Value {
    fn from(a: ArrayValue) -> Self {
        Value::Array(a)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}
