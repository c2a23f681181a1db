//! The dataset container.
//!
//! A [`Dataset`] is a `[n_samples, n_features]` matrix of `f64` plus three
//! attribute collections:
//!
//! - `sa`: per-sample attributes, every value has `n_samples` entries
//! - `fa`: per-feature attributes, every value has `n_features` entries
//! - `a`: dataset-level attributes, unconstrained (this is where the
//!   [`mapper`](Dataset::mapper) that produced the feature space lives)
//!
//! # Selection and sharing
//!
//! [`Dataset::select`] indexes samples and features independently. When both
//! axes use slice-like selections the result views the parent's sample
//! buffer; otherwise the selected values are copied. Attribute collections are
//! always rebuilt for the result, never aliased.
//!
//! ```
//! use mvpa::data::Dataset;
//! use ndarray::array;
//!
//! let ds = Dataset::new(array![[0., 1., 2.], [3., 4., 5.], [6., 7., 8.], [9., 10., 11.]]);
//! assert_eq!(ds.shape(), (4, 3));
//!
//! let sub = ds.select(.., 1..3).unwrap();
//! assert_eq!(sub.samples().to_array(), array![[1., 2.], [4., 5.], [7., 8.], [10., 11.]]);
//! assert!(sub.samples().shares_buffer(ds.samples()));
//!
//! let picked = ds.select(vec![1usize, 2], ..).unwrap();
//! assert!(!picked.samples().shares_buffer(ds.samples()));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{concatenate, Array1, Array2, ArrayD, Axis, Ix1, Ix2};
use tracing::debug;

use super::attributes::{AttrArray, AttrInput, DatasetAttr};
use super::collection::{CollectionError, CopyMode, DatasetAttributes, ItemAttributes};
use super::samples::Samples;
use super::selection::{Resolved, Selection};
use crate::mapper::SharedMapper;

/// Name of the dataset attribute holding the mapper.
pub const MAPPER_ATTR: &str = "mapper";

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Errors
// =============================================================================

/// Dataset integrity errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DatasetError {
    #[error("samples must have at least one axis")]
    ZeroDimensional,

    #[error("samples must have one or two axes, got {ndim}")]
    TooManyDimensions { ndim: usize },

    #[error("too many selections ({count}), at most one for samples and one for features")]
    TooManySelections { count: usize },

    #[error("{axis} index {index} is out of bounds for length {len}")]
    IndexOutOfBounds {
        index: isize,
        len: usize,
        axis: &'static str,
    },

    #[error("{axis} mask has {got} entries, expected {expected}")]
    MaskLength {
        expected: usize,
        got: usize,
        axis: &'static str,
    },

    #[error("slice step must not be zero")]
    ZeroStep,

    #[error("cannot merge datasets: {got} features, expected {expected}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("cannot merge datasets: sample attributes {ours:?} do not match {theirs:?}")]
    SampleAttributeKeys {
        ours: Vec<String>,
        theirs: Vec<String>,
    },

    #[error("cannot merge datasets: attribute '{name}' has different value types")]
    AttributeTypeMismatch { name: String },

    #[error("no sample or feature attribute named '{name}'")]
    UnknownAttribute { name: String },

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

// =============================================================================
// Small enums
// =============================================================================

/// Attribute collection of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrSpace {
    /// Sample attributes.
    Sa,
    /// Feature attributes.
    Fa,
    /// Dataset attributes.
    A,
}

impl fmt::Display for AttrSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrSpace::Sa => "sa",
            AttrSpace::Fa => "fa",
            AttrSpace::A => "a",
        })
    }
}

/// Which axis [`Dataset::init_origids`] stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrigIdTarget {
    Samples,
    Features,
    Both,
}

// =============================================================================
// Dataset
// =============================================================================

/// Sample matrix with sample, feature and dataset attributes.
///
/// There is no `Clone`: use [`Dataset::copy`] to choose between sharing and
/// duplicating the underlying buffers.
#[derive(Debug)]
pub struct Dataset {
    samples: Samples,
    sa: ItemAttributes,
    fa: ItemAttributes,
    a: DatasetAttributes,
    instance_id: u64,
}

impl Dataset {
    /// Wrap a sample matrix with empty attribute collections.
    pub fn new(samples: Array2<f64>) -> Self {
        Self::from_samples(Samples::from_array(samples))
    }

    /// Wrap a vector as a single-feature dataset (one sample per element).
    pub fn from_1d(samples: Array1<f64>) -> Self {
        Self::new(samples.insert_axis(Axis(1)))
    }

    /// Wrap an array of dynamic rank.
    ///
    /// # Errors
    ///
    /// [`DatasetError::ZeroDimensional`] for a 0-d array,
    /// [`DatasetError::TooManyDimensions`] for more than two axes.
    pub fn from_array(samples: ArrayD<f64>) -> Result<Self, DatasetError> {
        match samples.ndim() {
            0 => Err(DatasetError::ZeroDimensional),
            1 => Ok(Self::from_1d(samples.into_dimensionality::<Ix1>()?)),
            2 => Ok(Self::new(samples.into_dimensionality::<Ix2>()?)),
            ndim => Err(DatasetError::TooManyDimensions { ndim }),
        }
    }

    /// Start building a dataset with attributes.
    pub fn builder(samples: Array2<f64>) -> DatasetBuilder {
        DatasetBuilder::new(samples)
    }

    /// Dataset with `labels` and `chunks` sample attributes.
    ///
    /// Scalars are broadcast to every sample.
    pub fn from_basic(
        samples: Array2<f64>,
        labels: impl Into<AttrInput>,
        chunks: impl Into<AttrInput>,
    ) -> Result<Self, DatasetError> {
        Self::builder(samples)
            .sa("labels", labels)
            .sa("chunks", chunks)
            .build()
    }

    /// Assemble from existing collections.
    ///
    /// `sa`/`fa` are re-validated against the sample matrix shape.
    pub fn with_attributes(
        samples: Array2<f64>,
        mut sa: ItemAttributes,
        mut fa: ItemAttributes,
        a: DatasetAttributes,
    ) -> Result<Self, DatasetError> {
        let (n_samples, n_features) = samples.dim();
        sa.set_length_check(n_samples)?;
        fa.set_length_check(n_features)?;
        Ok(Self::from_parts(Samples::from_array(samples), sa, fa, a))
    }

    fn from_samples(samples: Samples) -> Self {
        let (n_samples, n_features) = samples.shape();
        Self::from_parts(
            samples,
            ItemAttributes::with_length(n_samples),
            ItemAttributes::with_length(n_features),
            DatasetAttributes::unbounded(),
        )
    }

    fn from_parts(samples: Samples, sa: ItemAttributes, fa: ItemAttributes, a: DatasetAttributes) -> Self {
        debug_assert_eq!(sa.length(), Some(samples.nrows()));
        debug_assert_eq!(fa.length(), Some(samples.ncols()));
        Self {
            samples,
            sa,
            fa,
            a,
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    #[inline]
    pub fn nsamples(&self) -> usize {
        self.samples.nrows()
    }

    #[inline]
    pub fn nfeatures(&self) -> usize {
        self.samples.ncols()
    }

    /// `(n_samples, n_features)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.samples.shape()
    }

    pub fn sa(&self) -> &ItemAttributes {
        &self.sa
    }

    /// Mutable sample attributes.
    ///
    /// The collection length is tied to the sample count; changing it with
    /// [`set_length_check`](ItemAttributes::set_length_check) breaks the
    /// dataset.
    pub fn sa_mut(&mut self) -> &mut ItemAttributes {
        &mut self.sa
    }

    pub fn fa(&self) -> &ItemAttributes {
        &self.fa
    }

    /// Mutable feature attributes; see [`sa_mut`](Self::sa_mut).
    pub fn fa_mut(&mut self) -> &mut ItemAttributes {
        &mut self.fa
    }

    pub fn a(&self) -> &DatasetAttributes {
        &self.a
    }

    pub fn a_mut(&mut self) -> &mut DatasetAttributes {
        &mut self.a
    }

    /// Process-unique identity of this instance.
    #[inline]
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Mapper that produced this dataset's feature space.
    pub fn mapper(&self) -> Option<&SharedMapper> {
        self.a.get(MAPPER_ATTR).and_then(DatasetAttr::as_mapper)
    }

    pub fn set_mapper(&mut self, mapper: SharedMapper) {
        self.a.set(MAPPER_ATTR, mapper);
    }

    /// Find a sample or feature attribute (sample attributes win).
    pub fn get_attr(&self, name: &str) -> Result<(&AttrArray, AttrSpace), DatasetError> {
        if let Some(value) = self.sa.get(name) {
            return Ok((value, AttrSpace::Sa));
        }
        if let Some(value) = self.fa.get(name) {
            return Ok((value, AttrSpace::Fa));
        }
        Err(DatasetError::UnknownAttribute {
            name: name.to_string(),
        })
    }

    /// Sorted unique values of a sample or feature attribute.
    pub fn unique(&self, name: &str) -> Result<AttrArray, DatasetError> {
        Ok(self.get_attr(name)?.0.unique())
    }

    // -------------------------------------------------------------------------
    // Copying
    // -------------------------------------------------------------------------

    /// Copy the dataset.
    ///
    /// A shallow copy has its own collections but shares the sample buffer,
    /// every attribute array and the mapper. A deep copy shares nothing.
    pub fn copy(&self, mode: CopyMode) -> Dataset {
        let samples = match mode {
            CopyMode::Shallow => self.samples.clone(),
            CopyMode::Deep => self.samples.deep_copy(),
        };
        Self::from_parts(samples, self.sa.copy(mode), self.fa.copy(mode), self.a.copy(mode))
    }

    /// Shallow copy with the samples replaced.
    ///
    /// Dataset attributes are kept. Sample and feature attributes are kept
    /// when their axis keeps its length; otherwise that collection starts
    /// out empty.
    pub fn with_samples(&self, samples: Array2<f64>) -> Dataset {
        let (n_samples, n_features) = samples.dim();
        let sa = if n_samples == self.nsamples() {
            self.sa.copy(CopyMode::Shallow)
        } else {
            ItemAttributes::with_length(n_samples)
        };
        let fa = if n_features == self.nfeatures() {
            self.fa.copy(CopyMode::Shallow)
        } else {
            ItemAttributes::with_length(n_features)
        };
        Self::from_parts(Samples::from_array(samples), sa, fa, self.a.copy(CopyMode::Shallow))
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Select samples and features independently.
    ///
    /// # Errors
    ///
    /// Out-of-bounds indices, masks of the wrong length and zero slice steps.
    pub fn select(&self, rows: impl Into<Selection>, cols: impl Into<Selection>) -> Result<Dataset, DatasetError> {
        self.select_pair(&rows.into(), &cols.into())
    }

    /// Select samples, keeping every feature.
    pub fn select_samples(&self, rows: impl Into<Selection>) -> Result<Dataset, DatasetError> {
        self.select_pair(&rows.into(), &Selection::All)
    }

    /// Select features, keeping every sample.
    pub fn select_features(&self, cols: impl Into<Selection>) -> Result<Dataset, DatasetError> {
        self.select_pair(&Selection::All, &cols.into())
    }

    /// Select with a list of up to two specs (samples, then features).
    pub fn select_specs(&self, specs: &[Selection]) -> Result<Dataset, DatasetError> {
        match specs {
            [] => self.select_pair(&Selection::All, &Selection::All),
            [rows] => self.select_pair(rows, &Selection::All),
            [rows, cols] => self.select_pair(rows, cols),
            _ => Err(DatasetError::TooManySelections { count: specs.len() }),
        }
    }

    fn select_pair(&self, rows: &Selection, cols: &Selection) -> Result<Dataset, DatasetError> {
        let rows = rows.resolve(self.nsamples(), "samples")?;
        let cols = cols.resolve(self.nfeatures(), "features")?;

        let samples = match (&rows, &cols) {
            (Resolved::Window(r), Resolved::Window(c)) => self.samples.window(r, c),
            _ => self.samples.gather(&rows, &cols),
        };

        Ok(Self::from_parts(
            samples,
            self.sa.select(&rows),
            self.fa.select(&cols),
            self.a.copy(CopyMode::Shallow),
        ))
    }

    // -------------------------------------------------------------------------
    // Merging
    // -------------------------------------------------------------------------

    /// Append the samples of `other` in place.
    ///
    /// Requires the same feature count and the same sample attribute names.
    /// Samples and sample attributes are concatenated; feature and dataset
    /// attributes of `other` are ignored. Nothing changes on error.
    ///
    /// After a merge the samples live in a new buffer that is no longer
    /// shared with datasets this one was sliced from.
    pub fn merge(&mut self, other: &Dataset) -> Result<(), DatasetError> {
        if other.nfeatures() != self.nfeatures() {
            return Err(DatasetError::FeatureCountMismatch {
                expected: self.nfeatures(),
                got: other.nfeatures(),
            });
        }
        if !self.sa.same_keys(&other.sa) {
            return Err(DatasetError::SampleAttributeKeys {
                ours: self.sa.keys().map(str::to_string).collect(),
                theirs: other.sa.keys().map(str::to_string).collect(),
            });
        }

        let n_samples = self.nsamples() + other.nsamples();
        let mut sa = ItemAttributes::with_length(n_samples);
        for (name, ours) in self.sa.iter() {
            let theirs = other.sa.require(name)?;
            let joined = ours
                .concat(theirs)
                .ok_or_else(|| DatasetError::AttributeTypeMismatch {
                    name: name.to_string(),
                })?;
            sa.insert(name, joined)?;
        }

        let theirs = other.samples.to_array();
        let joined = {
            let ours = self.samples.read();
            concatenate(Axis(0), &[ours.view(), theirs.view()])?
        };

        debug!(
            added = other.nsamples(),
            n_samples,
            n_features = self.nfeatures(),
            "merged dataset"
        );
        self.samples = Samples::from_array(joined);
        self.sa = sa;
        Ok(())
    }

    /// Merge into a shallow copy of `self`.
    pub fn merged(&self, other: &Dataset) -> Result<Dataset, DatasetError> {
        let mut out = self.copy(CopyMode::Shallow);
        out.merge(other)?;
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Identity tracking
    // -------------------------------------------------------------------------

    /// Stamp samples and/or features with ids `"{instance}-{index}"`.
    ///
    /// Overwrites any attribute already called `attr`.
    pub fn init_origids(&mut self, which: OrigIdTarget, attr: &str) -> Result<(), DatasetError> {
        let id = self.instance_id;
        let make = |n: usize| -> AttrArray {
            (0..n).map(|i| format!("{id}-{i}")).collect::<Array1<String>>().into()
        };
        if matches!(which, OrigIdTarget::Samples | OrigIdTarget::Both) {
            self.sa.insert(attr, make(self.nsamples()))?;
        }
        if matches!(which, OrigIdTarget::Features | OrigIdTarget::Both) {
            self.fa.insert(attr, make(self.nfeatures()))?;
        }
        Ok(())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset f64 {} x {}", self.nsamples(), self.nfeatures())?;
        if let Some(mapper) = self.mapper() {
            write!(f, " mapper: {}", mapper.name())?;
        }
        Ok(())
    }
}

// =============================================================================
// DatasetBuilder
// =============================================================================

/// Builder attaching attributes to a sample matrix.
///
/// ```
/// use mvpa::data::Dataset;
/// use ndarray::Array2;
///
/// let ds = Dataset::builder(Array2::zeros((4, 2)))
///     .sa("targets", vec!["a", "b", "a", "b"])
///     .sa("chunks", 0)
///     .fa("roi", vec![true, false])
///     .a("subject", "s01")
///     .build()
///     .unwrap();
/// assert_eq!(ds.sa().len(), 2);
/// ```
#[derive(Debug)]
pub struct DatasetBuilder {
    samples: Array2<f64>,
    sa: Vec<(String, AttrInput)>,
    fa: Vec<(String, AttrInput)>,
    a: Vec<(String, DatasetAttr)>,
}

impl DatasetBuilder {
    fn new(samples: Array2<f64>) -> Self {
        Self {
            samples,
            sa: Vec::new(),
            fa: Vec::new(),
            a: Vec::new(),
        }
    }

    /// Add a sample attribute; scalars are broadcast.
    pub fn sa(mut self, name: impl Into<String>, value: impl Into<AttrInput>) -> Self {
        self.sa.push((name.into(), value.into()));
        self
    }

    /// Add a feature attribute; scalars are broadcast.
    pub fn fa(mut self, name: impl Into<String>, value: impl Into<AttrInput>) -> Self {
        self.fa.push((name.into(), value.into()));
        self
    }

    /// Add a dataset attribute.
    pub fn a(mut self, name: impl Into<String>, value: impl Into<DatasetAttr>) -> Self {
        self.a.push((name.into(), value.into()));
        self
    }

    /// Attach the mapper that produced the feature space.
    pub fn mapper(self, mapper: SharedMapper) -> Self {
        self.a(MAPPER_ATTR, mapper)
    }

    /// Build the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Collection`] if any attribute array does not
    /// match the number of samples or features.
    pub fn build(self) -> Result<Dataset, DatasetError> {
        let mut ds = Dataset::new(self.samples);
        for (name, value) in self.sa {
            ds.sa.set(name, value)?;
        }
        for (name, value) in self.fa {
            ds.fa.set(name, value)?;
        }
        for (name, value) in self.a {
            ds.a.set(name, value);
        }
        Ok(ds)
    }
}
