//! Bidirectional feature-space mappers.
//!
//! A [`Mapper`] transforms data from an IN space to an OUT space
//! ([`forward`](Mapper::forward)) and back ([`reverse`](Mapper::reverse)).
//! Input is a [`MapperData`]: a plain array, a [`Dataset`] or a sequence of
//! either, dispatched by pattern matching.
//!
//! # Implementations
//!
//! - [`MaskMapper`]: selects the nonzero elements of an N-d mask
//! - [`ProjectionMapper`]: linear projection, trained by a [`ProjectionTrainer`]
//! - [`CombinedMapper`]: one child per input block, outputs stacked
//! - [`ChainMapper`]: children applied in sequence
//!
//! # Ids
//!
//! OUT ids are feature indices in `0..out_size()`. IN ids are coordinates
//! ([`Coord`]); flat IN spaces use one-element coordinates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, ArrayD, ArrayViewD, Ix2};
use tracing::debug;

use crate::data::{Dataset, DatasetError};

mod chain;
mod combined;
mod mask;
mod metric;
mod projection;
mod svd;

pub use chain::ChainMapper;
pub use combined::CombinedMapper;
pub use mask::MaskMapper;
pub use metric::{Distance, GridMetric, Metric};
pub use projection::{
    ConfigError, FixedProjection, Projection, ProjectionConfig, ProjectionMapper, ProjectionTrainer,
};
pub use svd::SvdProjection;

/// Coordinate in a mapper's IN space.
pub type Coord = Vec<usize>;

/// Per-space coordinate constraints for [`Mapper::out_ids`], keyed by space name.
pub type SpaceConstraints = BTreeMap<String, Vec<Coord>>;

/// Mapper shared by reference, e.g. from a dataset attribute.
pub type SharedMapper = Arc<dyn Mapper>;

// =============================================================================
// Errors
// =============================================================================

/// Mapper errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MapperError {
    #[error("{mapper}: needs to be trained before use")]
    NotTrained { mapper: String },

    #[error("{mapper}: no metric assigned, neighborhood information unavailable")]
    NoMetric { mapper: String },

    #[error("{mapper}: {op} is not implemented")]
    NotImplemented { mapper: String, op: &'static str },

    #[error("{mapper}: invalid input id/coordinate {id:?}")]
    InvalidInId { mapper: String, id: Coord },

    #[error("{mapper}: invalid output id {id}")]
    InvalidOutId { mapper: String, id: usize },

    #[error("{mapper}: no feature at coordinate {coord:?}")]
    NoFeatureAtCoordinate { mapper: String, coord: Coord },

    #[error("{mapper}: data shape {got:?} does not match {expected:?}")]
    ShapeMismatch {
        mapper: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("{mapper}: cannot handle data with {ndim} axes (supported: {supported})")]
    UnsupportedRank {
        mapper: String,
        ndim: usize,
        supported: String,
    },

    #[error("{mapper}: got {got} data blocks for {expected} mappers")]
    SequenceLength {
        mapper: String,
        expected: usize,
        got: usize,
    },

    #[error("{mapper}: embedded mappers produced {got} samples, expected {expected}")]
    SampleCountMismatch {
        mapper: String,
        expected: usize,
        got: usize,
    },

    #[error("{mapper}: unsupported input ({kind})")]
    UnsupportedInput { mapper: String, kind: &'static str },

    #[error("{mapper}: training data has {got} features, expected {expected}")]
    TrainingFeatureMismatch {
        mapper: String,
        expected: usize,
        got: usize,
    },

    #[error("mask must have at least one axis")]
    EmptyMask,

    #[error("{mapper} needs at least one embedded mapper")]
    NoMappers { mapper: &'static str },

    #[error("linear algebra failure: {0}")]
    Linalg(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

// =============================================================================
// MapperData
// =============================================================================

/// Input or output of [`Mapper::forward`] / [`Mapper::reverse`].
#[derive(Debug)]
pub enum MapperData {
    Array(ArrayD<f64>),
    Dataset(Dataset),
    /// One entry per embedded mapper of a [`CombinedMapper`].
    Sequence(Vec<MapperData>),
}

impl MapperData {
    pub fn kind(&self) -> &'static str {
        match self {
            MapperData::Array(_) => "array",
            MapperData::Dataset(_) => "dataset",
            MapperData::Sequence(_) => "sequence",
        }
    }

    pub fn as_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            MapperData::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayD<f64>> {
        match self {
            MapperData::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_dataset(self) -> Option<Dataset> {
        match self {
            MapperData::Dataset(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn into_sequence(self) -> Option<Vec<MapperData>> {
        match self {
            MapperData::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Number of samples (leading axis length).
    pub(crate) fn nsamples(&self) -> Option<usize> {
        match self {
            MapperData::Array(a) if a.ndim() > 0 => Some(a.shape()[0]),
            MapperData::Dataset(ds) => Some(ds.nsamples()),
            _ => None,
        }
    }
}

impl<D: ndarray::Dimension> From<ndarray::Array<f64, D>> for MapperData {
    fn from(a: ndarray::Array<f64, D>) -> Self {
        MapperData::Array(a.into_dyn())
    }
}

impl From<Dataset> for MapperData {
    fn from(ds: Dataset) -> Self {
        MapperData::Dataset(ds)
    }
}

impl From<Vec<MapperData>> for MapperData {
    fn from(seq: Vec<MapperData>) -> Self {
        MapperData::Sequence(seq)
    }
}

// =============================================================================
// MapperBase
// =============================================================================

/// State shared by every mapper: optional IN-space metric and space name.
#[derive(Clone, Default)]
pub struct MapperBase {
    pub metric: Option<Arc<dyn Metric>>,
    pub inspace: Option<String>,
}

impl MapperBase {
    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_inspace(mut self, inspace: impl Into<String>) -> Self {
        self.inspace = Some(inspace.into());
        self
    }
}

impl fmt::Debug for MapperBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MapperBase");
        if let Some(metric) = &self.metric {
            s.field("metric", metric);
        }
        if let Some(inspace) = &self.inspace {
            s.field("inspace", inspace);
        }
        s.finish()
    }
}

// =============================================================================
// Mapper trait
// =============================================================================

/// Object-safe cloning for boxed mappers.
pub trait MapperClone {
    fn clone_box(&self) -> Box<dyn Mapper>;
}

impl<T: Mapper + Clone + 'static> MapperClone for T {
    fn clone_box(&self) -> Box<dyn Mapper> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Mapper> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Transform between an IN and an OUT feature space.
///
/// Implementors provide the plain-array transforms and the sizes; the
/// dataset handling, dispatch, training sequence, id translation and
/// neighborhood queries have default implementations built on top.
pub trait Mapper: MapperClone + fmt::Debug + Send + Sync {
    /// Short name used in error messages and logs.
    fn name(&self) -> &str;

    fn base(&self) -> &MapperBase;

    fn base_mut(&mut self) -> &mut MapperBase;

    // -------------------------------------------------------------------------
    // Mapping
    // -------------------------------------------------------------------------

    /// Forward-map a plain array.
    fn forward_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError>;

    /// Reverse-map a plain array.
    fn reverse_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError>;

    /// Forward-map the samples of a dataset.
    ///
    /// Returns a shallow copy carrying the mapped samples; see
    /// [`Dataset::with_samples`] for which attributes survive.
    fn forward_dataset(&self, ds: &Dataset) -> Result<Dataset, MapperError> {
        let mapped = {
            let samples = ds.samples().read();
            self.forward_data(samples.view().into_dyn())?
        };
        Ok(ds.with_samples(into_matrix(self.name(), mapped)?))
    }

    /// Reverse-map the samples of a dataset.
    fn reverse_dataset(&self, ds: &Dataset) -> Result<Dataset, MapperError> {
        let mapped = {
            let samples = ds.samples().read();
            self.reverse_data(samples.view().into_dyn())?
        };
        Ok(ds.with_samples(into_matrix(self.name(), mapped)?))
    }

    fn forward_sequence(&self, _seq: Vec<MapperData>) -> Result<MapperData, MapperError> {
        Err(MapperError::UnsupportedInput {
            mapper: self.name().to_string(),
            kind: "sequence",
        })
    }

    fn reverse_sequence(&self, _seq: Vec<MapperData>) -> Result<MapperData, MapperError> {
        Err(MapperError::UnsupportedInput {
            mapper: self.name().to_string(),
            kind: "sequence",
        })
    }

    /// Map from IN to OUT space.
    fn forward(&self, data: MapperData) -> Result<MapperData, MapperError> {
        match data {
            MapperData::Array(a) => self.forward_data(a.view()).map(MapperData::Array),
            MapperData::Dataset(ds) => self.forward_dataset(&ds).map(MapperData::Dataset),
            MapperData::Sequence(seq) => self.forward_sequence(seq),
        }
    }

    /// Map from OUT back to IN space.
    fn reverse(&self, data: MapperData) -> Result<MapperData, MapperError> {
        match data {
            MapperData::Array(a) => self.reverse_data(a.view()).map(MapperData::Array),
            MapperData::Dataset(ds) => self.reverse_dataset(&ds).map(MapperData::Dataset),
            MapperData::Sequence(seq) => self.reverse_sequence(seq),
        }
    }

    // -------------------------------------------------------------------------
    // Training
    // -------------------------------------------------------------------------

    /// Run `pretrain`, `train_impl` and `posttrain`, in that order.
    fn train(&mut self, ds: &Dataset) -> Result<(), MapperError> {
        debug!(
            mapper = self.name(),
            n_samples = ds.nsamples(),
            n_features = ds.nfeatures(),
            "training mapper"
        );
        self.pretrain(ds)?;
        self.train_impl(ds)?;
        self.posttrain(ds)
    }

    fn pretrain(&mut self, _ds: &Dataset) -> Result<(), MapperError> {
        Ok(())
    }

    /// Core training step.
    fn train_impl(&mut self, _ds: &Dataset) -> Result<(), MapperError> {
        Err(MapperError::NotImplemented {
            mapper: self.name().to_string(),
            op: "train",
        })
    }

    fn posttrain(&mut self, _ds: &Dataset) -> Result<(), MapperError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Sizes and selection
    // -------------------------------------------------------------------------

    /// Number of elements in IN space.
    fn in_size(&self) -> usize;

    /// Number of features in OUT space.
    fn out_size(&self) -> usize;

    /// Keep only the given OUT features, in the given order.
    fn select_out(&mut self, _ids: &[usize]) -> Result<(), MapperError> {
        Err(MapperError::NotImplemented {
            mapper: self.name().to_string(),
            op: "select_out",
        })
    }

    // -------------------------------------------------------------------------
    // Ids
    // -------------------------------------------------------------------------

    fn is_valid_outid(&self, id: usize) -> bool {
        id < self.out_size()
    }

    /// Default: flat IN space of `in_size()` elements.
    fn is_valid_inid(&self, coord: &[usize]) -> bool {
        matches!(coord, [i] if *i < self.in_size())
    }

    /// IN coordinate of an OUT feature.
    fn in_id(&self, _out_id: usize) -> Result<Coord, MapperError> {
        Err(MapperError::NotImplemented {
            mapper: self.name().to_string(),
            op: "in_id",
        })
    }

    /// OUT feature at an IN coordinate.
    fn out_id(&self, _coord: &[usize]) -> Result<usize, MapperError> {
        Err(MapperError::NotImplemented {
            mapper: self.name().to_string(),
            op: "out_id",
        })
    }

    /// Translate validated IN ids to OUT ids.
    ///
    /// The default returns nothing, meaning there is no element-wise
    /// correspondence between the spaces.
    fn map_in_ids(&self, _in_ids: &[Coord]) -> Result<Vec<usize>, MapperError> {
        Ok(Vec::new())
    }

    /// OUT ids for the given IN ids.
    ///
    /// If this mapper has an `inspace` name and `constraints` holds an entry
    /// for it, that entry restricts `in_ids` (or replaces it when `None`) and
    /// is removed. All other constraints are returned untouched.
    fn out_ids(
        &self,
        in_ids: Option<Vec<Coord>>,
        mut constraints: SpaceConstraints,
    ) -> Result<(Vec<usize>, SpaceConstraints), MapperError> {
        let mut in_ids = in_ids;
        if let Some(space) = self.base().inspace.as_deref() {
            if let Some(allowed) = constraints.remove(space) {
                in_ids = Some(match in_ids {
                    None => allowed,
                    Some(ids) => ids.into_iter().filter(|id| allowed.contains(id)).collect(),
                });
            }
        }

        let Some(in_ids) = in_ids else {
            return Ok((Vec::new(), constraints));
        };
        if let Some(bad) = in_ids.iter().find(|id| !self.is_valid_inid(id)) {
            return Err(MapperError::InvalidInId {
                mapper: self.name().to_string(),
                id: bad.clone(),
            });
        }
        Ok((self.map_in_ids(&in_ids)?, constraints))
    }

    // -------------------------------------------------------------------------
    // Neighborhoods
    // -------------------------------------------------------------------------

    /// Valid IN-space neighbors of `coord` according to the metric.
    fn neighbors_in(&self, coord: &[usize], radius: f64) -> Result<Vec<Coord>, MapperError> {
        let metric = self.base().metric.as_ref().ok_or_else(|| MapperError::NoMetric {
            mapper: self.name().to_string(),
        })?;
        if !self.is_valid_inid(coord) {
            return Ok(Vec::new());
        }
        Ok(metric
            .neighbors(coord, radius)
            .into_iter()
            .filter(|c| self.is_valid_inid(c))
            .collect())
    }

    /// OUT-space neighbors of an OUT feature.
    ///
    /// Neighbors are found in IN space and mapped back lazily; coordinates
    /// without an OUT feature are skipped. An invalid `out_id` yields nothing.
    fn neighbor(&self, out_id: usize, radius: f64) -> Result<Box<dyn Iterator<Item = usize> + '_>, MapperError> {
        if self.base().metric.is_none() {
            return Err(MapperError::NoMetric {
                mapper: self.name().to_string(),
            });
        }
        if !self.is_valid_outid(out_id) {
            return Ok(Box::new(std::iter::empty()));
        }
        let center = self.in_id(out_id)?;
        let around = self.neighbors_in(&center, radius)?;
        Ok(Box::new(around.into_iter().filter_map(move |c| self.out_id(&c).ok())))
    }

    /// [`neighbor`](Mapper::neighbor), collected.
    fn neighbors(&self, out_id: usize, radius: f64) -> Result<Vec<usize>, MapperError> {
        Ok(self.neighbor(out_id, radius)?.collect())
    }
}

/// Reshape a mapped sample block into a `[n_samples, n_features]` matrix.
pub(crate) fn into_matrix(mapper: &str, data: ArrayD<f64>) -> Result<Array2<f64>, MapperError> {
    match data.ndim() {
        1 => {
            let n = data.len();
            Ok(data.into_shape_with_order((n, 1)).map_err(DatasetError::from)?)
        }
        2 => Ok(data.into_dimensionality::<Ix2>().map_err(DatasetError::from)?),
        ndim => Err(MapperError::UnsupportedRank {
            mapper: mapper.to_string(),
            ndim,
            supported: "1 or 2 for dataset samples".to_string(),
        }),
    }
}
