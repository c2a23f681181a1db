//! Length-checked attribute collections.
//!
//! An [`AttributeCollection`] maps attribute names to values that describe
//! every item of some owner: samples (`sa`), features (`fa`) or the dataset
//! as a whole (`a`). When the collection has a length, every per-item value
//! must have exactly that many entries; this is checked on insert, on
//! [`update`](AttributeCollection::update) and when the length itself changes.
//!
//! # Copy modes
//!
//! [`CopyMode::Shallow`] copies the map but shares every value's buffer.
//! [`CopyMode::Deep`] allocates fresh buffers for every value.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::attributes::{AttrArray, AttrInput, DatasetAttr};
use super::selection::Resolved;

// =============================================================================
// Errors
// =============================================================================

/// Attribute collection errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectionError {
    #[error("attribute '{name}' has {got} items, collection requires {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("attribute '{name}' holds {got} values, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

// =============================================================================
// Values
// =============================================================================

/// How values are carried into a new collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CopyMode {
    /// Share the underlying buffers.
    Shallow,
    /// Duplicate the underlying buffers.
    #[default]
    Deep,
}

/// Value stored in an [`AttributeCollection`].
pub trait AttributeValue: Clone + fmt::Debug {
    /// Number of items described, or `None` if the value is not per-item.
    fn item_count(&self) -> Option<usize>;

    /// Copy with freshly allocated buffers.
    fn deep_copy(&self) -> Self;

    /// Copy according to `mode`.
    fn copy_with(&self, mode: CopyMode) -> Self {
        match mode {
            CopyMode::Shallow => self.clone(),
            CopyMode::Deep => self.deep_copy(),
        }
    }
}

// =============================================================================
// AttributeCollection
// =============================================================================

/// Named attribute values with an optional fixed item count.
///
/// Serializable for exchange; deserialized collections are not re-checked,
/// run [`set_length_check`](Self::set_length_check) on them before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeCollection<V> {
    length: Option<usize>,
    values: BTreeMap<String, V>,
}

/// Sample or feature attributes.
pub type ItemAttributes = AttributeCollection<AttrArray>;

/// Dataset-level attributes.
pub type DatasetAttributes = AttributeCollection<DatasetAttr>;

impl<V> Default for AttributeCollection<V> {
    fn default() -> Self {
        Self {
            length: None,
            values: BTreeMap::new(),
        }
    }
}

impl<V: AttributeValue> AttributeCollection<V> {
    /// Empty collection whose values must have `length` items.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: Some(length),
            values: BTreeMap::new(),
        }
    }

    /// Empty collection without a length constraint.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Required item count, if any.
    #[inline]
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    /// Number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.values.get(name)
    }

    /// Like [`get`](Self::get), but a missing name is an error.
    pub fn require(&self, name: &str) -> Result<&V, CollectionError> {
        self.values
            .get(name)
            .ok_or_else(|| CollectionError::UnknownAttribute {
                name: name.to_string(),
            })
    }

    /// Attribute names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether both collections hold the same attribute names.
    pub fn same_keys(&self, other: &AttributeCollection<V>) -> bool {
        self.keys().eq(other.keys())
    }

    /// Insert a value after checking its item count.
    ///
    /// Returns the value previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Result<Option<V>, CollectionError> {
        let name = name.into();
        self.check(&name, &value)?;
        Ok(self.values.insert(name, value))
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.values.remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Change the required item count, re-validating every value.
    ///
    /// On failure the collection is left untouched.
    pub fn set_length_check(&mut self, length: usize) -> Result<(), CollectionError> {
        for (name, value) in &self.values {
            Self::check_against(Some(length), name, value)?;
        }
        self.length = Some(length);
        Ok(())
    }

    /// Copy every attribute of `source` into `self`.
    ///
    /// Either all values are accepted or none is.
    pub fn update(&mut self, source: &AttributeCollection<V>, mode: CopyMode) -> Result<(), CollectionError> {
        for (name, value) in &source.values {
            self.check(name, value)?;
        }
        for (name, value) in &source.values {
            self.values.insert(name.clone(), value.copy_with(mode));
        }
        Ok(())
    }

    /// New collection with the same length and copied values.
    pub fn copy(&self, mode: CopyMode) -> Self {
        Self {
            length: self.length,
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.copy_with(mode)))
                .collect(),
        }
    }

    /// Empty collection with the same length constraint.
    pub fn empty_like(&self) -> Self {
        Self {
            length: self.length,
            values: BTreeMap::new(),
        }
    }

    fn check(&self, name: &str, value: &V) -> Result<(), CollectionError> {
        Self::check_against(self.length, name, value)
    }

    fn check_against(length: Option<usize>, name: &str, value: &V) -> Result<(), CollectionError> {
        match (length, value.item_count()) {
            (Some(expected), Some(got)) if expected != got => Err(CollectionError::LengthMismatch {
                name: name.to_string(),
                expected,
                got,
            }),
            _ => Ok(()),
        }
    }
}

impl ItemAttributes {
    /// Set an attribute, broadcasting scalars to the collection length.
    ///
    /// ```
    /// use mvpa::data::ItemAttributes;
    ///
    /// let mut sa = ItemAttributes::with_length(3);
    /// sa.set("targets", "rest").unwrap();
    /// sa.set("chunks", vec![0, 0, 1]).unwrap();
    /// assert!(sa.set("bad", vec![1, 2]).is_err());
    /// ```
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrInput>) -> Result<(), CollectionError> {
        let name = name.into();
        let array = match (value.into(), self.length) {
            (input, Some(length)) => input.expand(length, &name)?,
            (AttrInput::Scalar(s), None) => s.repeat(1),
            (AttrInput::Array(a), None) => a,
        };
        self.values.insert(name, array);
        Ok(())
    }

    /// Every attribute restricted to the selected items.
    pub(crate) fn select(&self, sel: &Resolved) -> Self {
        Self {
            length: Some(sel.len()),
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.select(sel)))
                .collect(),
        }
    }

    pub fn ints(&self, name: &str) -> Result<ArrayView1<'_, i64>, CollectionError> {
        let value = self.require(name)?;
        value.as_ints().ok_or_else(|| type_mismatch(name, "int", value))
    }

    pub fn floats(&self, name: &str) -> Result<ArrayView1<'_, f64>, CollectionError> {
        let value = self.require(name)?;
        value.as_floats().ok_or_else(|| type_mismatch(name, "float", value))
    }

    pub fn bools(&self, name: &str) -> Result<ArrayView1<'_, bool>, CollectionError> {
        let value = self.require(name)?;
        value.as_bools().ok_or_else(|| type_mismatch(name, "bool", value))
    }

    pub fn strs(&self, name: &str) -> Result<ArrayView1<'_, String>, CollectionError> {
        let value = self.require(name)?;
        value.as_strs().ok_or_else(|| type_mismatch(name, "str", value))
    }
}

impl DatasetAttributes {
    /// Set a dataset-level attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<DatasetAttr>) {
        self.values.insert(name.into(), value.into());
    }
}

fn type_mismatch(name: &str, expected: &'static str, value: &AttrArray) -> CollectionError {
    CollectionError::TypeMismatch {
        name: name.to_string(),
        expected,
        got: value.kind(),
    }
}
