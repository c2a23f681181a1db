//! Attribute values.
//!
//! Sample and feature attributes are homogeneous 1D vectors ([`AttrArray`]),
//! one entry per item. Dataset-level attributes ([`DatasetAttr`]) may also be
//! single values or the mapper that produced the dataset's feature space.
//!
//! Arrays are stored as [`ArcArray1`], so a shallow copy shares the element
//! buffer while a deep copy allocates a new one.

use std::cmp::Ordering;
use std::sync::Arc;

use ndarray::{ArcArray1, Array1, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::collection::{AttributeValue, CollectionError};
use super::selection::Resolved;
use crate::mapper::SharedMapper;

// =============================================================================
// Scalar
// =============================================================================

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Scalar {
    /// Broadcast into a constant vector of `n` items.
    pub fn repeat(&self, n: usize) -> AttrArray {
        match self {
            Scalar::Int(v) => AttrArray::Int(ArcArray1::from_elem(n, *v)),
            Scalar::Float(v) => AttrArray::Float(ArcArray1::from_elem(n, *v)),
            Scalar::Bool(v) => AttrArray::Bool(ArcArray1::from_elem(n, *v)),
            Scalar::Str(v) => AttrArray::Str(ArcArray1::from_elem(n, v.clone())),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

// =============================================================================
// AttrArray
// =============================================================================

/// Homogeneous per-item attribute vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrArray {
    Int(ArcArray1<i64>),
    Float(ArcArray1<f64>),
    Bool(ArcArray1<bool>),
    Str(ArcArray1<String>),
}

/// Apply the same expression to whichever typed array is inside.
macro_rules! map_typed {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            AttrArray::Int($arr) => AttrArray::Int($body),
            AttrArray::Float($arr) => AttrArray::Float($body),
            AttrArray::Bool($arr) => AttrArray::Bool($body),
            AttrArray::Str($arr) => AttrArray::Str($body),
        }
    };
}

impl AttrArray {
    /// Number of items.
    pub fn len(&self) -> usize {
        match self {
            AttrArray::Int(a) => a.len(),
            AttrArray::Float(a) => a.len(),
            AttrArray::Bool(a) => a.len(),
            AttrArray::Str(a) => a.len(),
        }
    }

    /// Returns true if there are no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the element type.
    pub fn kind(&self) -> &'static str {
        match self {
            AttrArray::Int(_) => "int",
            AttrArray::Float(_) => "float",
            AttrArray::Bool(_) => "bool",
            AttrArray::Str(_) => "str",
        }
    }

    /// Item at position `i`.
    pub fn get(&self, i: usize) -> Option<Scalar> {
        match self {
            AttrArray::Int(a) => a.get(i).map(|v| Scalar::Int(*v)),
            AttrArray::Float(a) => a.get(i).map(|v| Scalar::Float(*v)),
            AttrArray::Bool(a) => a.get(i).map(|v| Scalar::Bool(*v)),
            AttrArray::Str(a) => a.get(i).map(|v| Scalar::Str(v.clone())),
        }
    }

    pub fn as_ints(&self) -> Option<ArrayView1<'_, i64>> {
        match self {
            AttrArray::Int(a) => Some(a.view()),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<ArrayView1<'_, f64>> {
        match self {
            AttrArray::Float(a) => Some(a.view()),
            _ => None,
        }
    }

    pub fn as_bools(&self) -> Option<ArrayView1<'_, bool>> {
        match self {
            AttrArray::Bool(a) => Some(a.view()),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<ArrayView1<'_, String>> {
        match self {
            AttrArray::Str(a) => Some(a.view()),
            _ => None,
        }
    }

    /// Whether both arrays start at the same element in memory.
    ///
    /// True for shallow copies and for windows starting at the first item.
    pub fn shares_data_with(&self, other: &AttrArray) -> bool {
        match (self, other) {
            (AttrArray::Int(a), AttrArray::Int(b)) => a.as_ptr() == b.as_ptr(),
            (AttrArray::Float(a), AttrArray::Float(b)) => a.as_ptr() == b.as_ptr(),
            (AttrArray::Bool(a), AttrArray::Bool(b)) => a.as_ptr() == b.as_ptr(),
            (AttrArray::Str(a), AttrArray::Str(b)) => a.as_ptr() == b.as_ptr(),
            _ => false,
        }
    }

    /// Copy into a freshly allocated buffer.
    pub fn deep_copy(&self) -> AttrArray {
        map_typed!(self, a => a.to_owned().into_shared())
    }

    /// Select items; windows share the buffer, index lists copy.
    pub(crate) fn select(&self, sel: &Resolved) -> AttrArray {
        match sel {
            Resolved::Window(w) => {
                let slice = w.to_slice();
                map_typed!(self, a => a.clone().slice_axis_move(Axis(0), slice))
            }
            Resolved::Indices(idx) => map_typed!(self, a => a.select(Axis(0), idx).into_shared()),
        }
    }

    /// Append `other` after `self`; `None` if the element types differ.
    pub fn concat(&self, other: &AttrArray) -> Option<AttrArray> {
        fn join<T: Clone>(a: &ArcArray1<T>, b: &ArcArray1<T>) -> ArcArray1<T> {
            a.iter().chain(b.iter()).cloned().collect::<Array1<T>>().into_shared()
        }
        match (self, other) {
            (AttrArray::Int(a), AttrArray::Int(b)) => Some(AttrArray::Int(join(a, b))),
            (AttrArray::Float(a), AttrArray::Float(b)) => Some(AttrArray::Float(join(a, b))),
            (AttrArray::Bool(a), AttrArray::Bool(b)) => Some(AttrArray::Bool(join(a, b))),
            (AttrArray::Str(a), AttrArray::Str(b)) => Some(AttrArray::Str(join(a, b))),
            _ => None,
        }
    }

    /// Sorted unique values.
    pub fn unique(&self) -> AttrArray {
        fn sorted_unique<T: Clone, F>(a: &ArcArray1<T>, cmp: F) -> ArcArray1<T>
        where
            F: Fn(&T, &T) -> Ordering,
        {
            let mut values: Vec<T> = a.iter().cloned().collect();
            values.sort_by(&cmp);
            values.dedup_by(|x, y| cmp(x, y) == Ordering::Equal);
            Array1::from(values).into_shared()
        }
        match self {
            AttrArray::Int(a) => AttrArray::Int(sorted_unique(a, Ord::cmp)),
            AttrArray::Float(a) => AttrArray::Float(sorted_unique(a, f64::total_cmp)),
            AttrArray::Bool(a) => AttrArray::Bool(sorted_unique(a, Ord::cmp)),
            AttrArray::Str(a) => AttrArray::Str(sorted_unique(a, Ord::cmp)),
        }
    }

    /// For every item, whether it occurs in `values`; `None` if the element
    /// types differ.
    pub fn isin(&self, values: &AttrArray) -> Option<Vec<bool>> {
        fn member<T: PartialEq>(a: &ArcArray1<T>, b: &ArcArray1<T>) -> Vec<bool> {
            a.iter().map(|x| b.iter().any(|y| y == x)).collect()
        }
        match (self, values) {
            (AttrArray::Int(a), AttrArray::Int(b)) => Some(member(a, b)),
            (AttrArray::Float(a), AttrArray::Float(b)) => Some(member(a, b)),
            (AttrArray::Bool(a), AttrArray::Bool(b)) => Some(member(a, b)),
            (AttrArray::Str(a), AttrArray::Str(b)) => Some(member(a, b)),
            _ => None,
        }
    }
}

impl AttributeValue for AttrArray {
    fn item_count(&self) -> Option<usize> {
        Some(self.len())
    }

    fn deep_copy(&self) -> Self {
        AttrArray::deep_copy(self)
    }
}

macro_rules! attr_array_from {
    ($variant:ident, $t:ty) => {
        impl From<Vec<$t>> for AttrArray {
            fn from(v: Vec<$t>) -> Self {
                AttrArray::$variant(Array1::from(v).into_shared())
            }
        }

        impl From<Array1<$t>> for AttrArray {
            fn from(v: Array1<$t>) -> Self {
                AttrArray::$variant(v.into_shared())
            }
        }

        impl From<ArcArray1<$t>> for AttrArray {
            fn from(v: ArcArray1<$t>) -> Self {
                AttrArray::$variant(v)
            }
        }
    };
}

attr_array_from!(Int, i64);
attr_array_from!(Float, f64);
attr_array_from!(Bool, bool);
attr_array_from!(Str, String);

impl From<Vec<i32>> for AttrArray {
    fn from(v: Vec<i32>) -> Self {
        AttrArray::Int(v.into_iter().map(i64::from).collect::<Array1<_>>().into_shared())
    }
}

impl From<Vec<usize>> for AttrArray {
    fn from(v: Vec<usize>) -> Self {
        AttrArray::Int(v.into_iter().map(|x| x as i64).collect::<Array1<_>>().into_shared())
    }
}

impl From<Vec<&str>> for AttrArray {
    fn from(v: Vec<&str>) -> Self {
        AttrArray::Str(v.into_iter().map(str::to_string).collect::<Array1<_>>().into_shared())
    }
}

// =============================================================================
// AttrInput: the expand-attribute policy
// =============================================================================

/// Value offered for a per-item attribute.
///
/// A scalar is broadcast to the collection length; an array must match it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrInput {
    Scalar(Scalar),
    Array(AttrArray),
}

impl AttrInput {
    /// Turn into a vector of exactly `length` items.
    pub fn expand(self, length: usize, name: &str) -> Result<AttrArray, CollectionError> {
        match self {
            AttrInput::Scalar(s) => Ok(s.repeat(length)),
            AttrInput::Array(a) if a.len() == length => Ok(a),
            AttrInput::Array(a) => Err(CollectionError::LengthMismatch {
                name: name.to_string(),
                expected: length,
                got: a.len(),
            }),
        }
    }
}

macro_rules! attr_input_from {
    ($kind:ident: $($t:ty),*) => {
        $(
            impl From<$t> for AttrInput {
                fn from(v: $t) -> Self {
                    AttrInput::$kind(v.into())
                }
            }
        )*
    };
}

attr_input_from!(Scalar: i64, i32, usize, f64, bool, &str, String, Scalar);
attr_input_from!(
    Array: Vec<i64>, Vec<i32>, Vec<usize>, Vec<f64>, Vec<bool>, Vec<&str>, Vec<String>,
    Array1<i64>, Array1<f64>, Array1<bool>, Array1<String>, AttrArray
);

// =============================================================================
// DatasetAttr
// =============================================================================

/// Value of a dataset-level attribute.
#[derive(Debug, Clone)]
pub enum DatasetAttr {
    Scalar(Scalar),
    Array(AttrArray),
    /// Mapper that produced the dataset's feature space; shared by reference.
    Mapper(SharedMapper),
}

impl DatasetAttr {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            DatasetAttr::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&AttrArray> {
        match self {
            DatasetAttr::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_mapper(&self) -> Option<&SharedMapper> {
        match self {
            DatasetAttr::Mapper(m) => Some(m),
            _ => None,
        }
    }
}

impl AttributeValue for DatasetAttr {
    fn item_count(&self) -> Option<usize> {
        None
    }

    fn deep_copy(&self) -> Self {
        match self {
            DatasetAttr::Scalar(s) => DatasetAttr::Scalar(s.clone()),
            DatasetAttr::Array(a) => DatasetAttr::Array(a.deep_copy()),
            DatasetAttr::Mapper(m) => DatasetAttr::Mapper(Arc::from(m.clone_box())),
        }
    }
}

macro_rules! dataset_attr_from {
    ($kind:ident: $($t:ty),*) => {
        $(
            impl From<$t> for DatasetAttr {
                fn from(v: $t) -> Self {
                    DatasetAttr::$kind(v.into())
                }
            }
        )*
    };
}

dataset_attr_from!(Scalar: i64, i32, usize, f64, bool, &str, String, Scalar);
dataset_attr_from!(Array: AttrArray);
dataset_attr_from!(Mapper: SharedMapper);
