//! Linear projection mappers.
//!
//! [`ProjectionMapper`] maps `[n_samples, n_in]` data through a projection
//! matrix `[n_in, n_out]`. The matrix comes from a [`ProjectionTrainer`];
//! the mapper owns everything around it:
//!
//! - the input-space mean, computed before training and subtracted when
//!   demeaning is enabled
//! - the optional output-space offset returned by the trainer
//! - the reconstruction matrix used by `reverse`, computed lazily (by default
//!   as the pseudo-inverse of the projection) and dropped whenever the
//!   projection changes
//! - component selection after training, via [`ProjectionConfig::selector`]

use std::fmt;
use std::sync::{Arc, OnceLock};

use bon::Builder;
use nalgebra::{DMatrix, SVD};
use ndarray::{Array1, Array2, ArrayD, ArrayView2, ArrayViewD, Axis, Ix1, Ix2};
use serde::{Deserialize, Serialize};

use super::{Mapper, MapperBase, MapperError, Metric};
use crate::data::{Dataset, DatasetError};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors from [`ProjectionConfig`] validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A selector was given but lists no component.
    EmptySelector,
    /// A component id appears more than once in the selector.
    DuplicateSelector(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySelector => write!(f, "selector must list at least one component"),
            Self::DuplicateSelector(id) => write!(f, "component {} selected more than once", id),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// ProjectionConfig
// =============================================================================

/// Settings of a [`ProjectionMapper`].
///
/// ```
/// use mvpa::mapper::ProjectionConfig;
///
/// let config = ProjectionConfig::builder().selector(vec![0, 2]).build().unwrap();
/// assert!(config.demean);
/// assert!(ProjectionConfig::builder().selector(vec![]).build().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct ProjectionConfig {
    /// Subtract the input mean before projecting and add it back after
    /// reconstruction. Default: `true`.
    #[builder(default = true)]
    pub demean: bool,

    /// Components to keep after training. `None` keeps all.
    pub selector: Option<Vec<usize>>,
}

impl<S: projection_config_builder::IsComplete> ProjectionConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty selector or a repeated id.
    pub fn build(self) -> Result<ProjectionConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ProjectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(selector) = &self.selector {
            if selector.is_empty() {
                return Err(ConfigError::EmptySelector);
            }
            let mut seen = selector.clone();
            seen.sort_unstable();
            if let Some(w) = seen.windows(2).find(|w| w[0] == w[1]) {
                return Err(ConfigError::DuplicateSelector(w[0]));
            }
        }
        Ok(())
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            demean: true,
            selector: None,
        }
    }
}

// =============================================================================
// Trainers
// =============================================================================

/// Result of fitting a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// `[n_in, n_out]`.
    pub proj: Array2<f64>,
    /// Offset added in output space after projecting.
    pub offset_out: Option<Array1<f64>>,
}

/// Computes the projection matrix of a [`ProjectionMapper`].
pub trait ProjectionTrainer: fmt::Debug + Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Fit on training samples, already demeaned if the mapper demeans.
    fn fit(&mut self, samples: ArrayView2<'_, f64>) -> Result<Projection, MapperError>;

    /// Reconstruction matrix `[n_out, n_in]` for `proj`.
    fn compute_recon(&self, proj: &Array2<f64>) -> Result<Array2<f64>, MapperError> {
        pinv(proj)
    }
}

/// A projection known up front; fitting just hands it out.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedProjection {
    pub projection: Projection,
}

impl FixedProjection {
    pub fn new(proj: Array2<f64>) -> Self {
        Self {
            projection: Projection {
                proj,
                offset_out: None,
            },
        }
    }

    pub fn with_offset_out(mut self, offset: Array1<f64>) -> Self {
        self.projection.offset_out = Some(offset);
        self
    }
}

impl ProjectionTrainer for FixedProjection {
    fn name(&self) -> &str {
        "FixedProjection"
    }

    fn fit(&mut self, _samples: ArrayView2<'_, f64>) -> Result<Projection, MapperError> {
        Ok(self.projection.clone())
    }
}

/// Moore-Penrose pseudo-inverse.
///
/// Singular values below `1e-15 * max` are treated as zero.
pub fn pinv(a: &Array2<f64>) -> Result<Array2<f64>, MapperError> {
    let (rows, cols) = a.dim();
    if rows == 0 || cols == 0 {
        return Ok(Array2::zeros((cols, rows)));
    }
    let m = DMatrix::from_fn(rows, cols, |i, j| a[[i, j]]);
    let svd = SVD::new(m, true, true);
    let cutoff = svd.singular_values.max() * 1e-15;
    let inv = svd.pseudo_inverse(cutoff).map_err(|e| MapperError::Linalg(e.to_string()))?;
    Ok(Array2::from_shape_fn((cols, rows), |(i, j)| inv[(i, j)]))
}

// =============================================================================
// ProjectionMapper
// =============================================================================

/// Linear mapper `x -> (x - offset_in) * proj + offset_out`.
#[derive(Debug, Clone)]
pub struct ProjectionMapper<T> {
    base: MapperBase,
    config: ProjectionConfig,
    trainer: T,
    proj: Option<Array2<f64>>,
    recon: OnceLock<Array2<f64>>,
    offset_in: Option<Array1<f64>>,
    offset_out: Option<Array1<f64>>,
}

impl<T: ProjectionTrainer> ProjectionMapper<T> {
    /// Untrained mapper.
    pub fn new(trainer: T, config: ProjectionConfig) -> Self {
        Self {
            base: MapperBase::default(),
            config,
            trainer,
            proj: None,
            recon: OnceLock::new(),
            offset_in: None,
            offset_out: None,
        }
    }

    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Self {
        self.base.metric = Some(metric);
        self
    }

    #[inline]
    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    #[inline]
    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    #[inline]
    pub fn is_trained(&self) -> bool {
        self.proj.is_some()
    }

    /// Projection matrix `[n_in, n_out]`.
    pub fn proj(&self) -> Result<&Array2<f64>, MapperError> {
        self.proj.as_ref().ok_or_else(|| self.not_trained())
    }

    /// Reconstruction matrix `[n_out, n_in]`, computed on first use.
    pub fn recon(&self) -> Result<&Array2<f64>, MapperError> {
        if let Some(recon) = self.recon.get() {
            return Ok(recon);
        }
        let recon = self.trainer.compute_recon(self.proj()?)?;
        Ok(self.recon.get_or_init(|| recon))
    }

    pub fn offset_in(&self) -> Option<&Array1<f64>> {
        self.offset_in.as_ref()
    }

    pub fn offset_out(&self) -> Option<&Array1<f64>> {
        self.offset_out.as_ref()
    }

    /// Forward-map, overriding the configured demeaning for this call.
    pub fn forward_with(&self, data: ArrayViewD<'_, f64>, demean: Option<bool>) -> Result<ArrayD<f64>, MapperError> {
        let demean = demean.unwrap_or(self.config.demean);
        let proj = self.proj()?;
        let (rows, was_1d) = self.as_rows(data, proj.nrows())?;

        let mut res = match (demean, &self.offset_in) {
            (true, Some(offset)) => (&rows - offset).dot(proj),
            _ => rows.dot(proj),
        };
        if let (true, Some(offset)) = (demean, &self.offset_out) {
            res += offset;
        }
        Ok(Self::restore_rank(res, was_1d))
    }

    fn as_rows<'a>(&self, data: ArrayViewD<'a, f64>, width: usize) -> Result<(ArrayView2<'a, f64>, bool), MapperError> {
        let (rows, was_1d) = match data.ndim() {
            1 => (data.into_dimensionality::<Ix1>().map_err(DatasetError::from)?.insert_axis(Axis(0)), true),
            2 => (data.into_dimensionality::<Ix2>().map_err(DatasetError::from)?, false),
            ndim => {
                return Err(MapperError::UnsupportedRank {
                    mapper: self.name().to_string(),
                    ndim,
                    supported: "1 or 2".to_string(),
                })
            }
        };
        if rows.ncols() != width {
            return Err(MapperError::ShapeMismatch {
                mapper: self.name().to_string(),
                expected: vec![width],
                got: vec![rows.ncols()],
            });
        }
        Ok((rows, was_1d))
    }

    fn restore_rank(res: Array2<f64>, was_1d: bool) -> ArrayD<f64> {
        if was_1d {
            res.index_axis_move(Axis(0), 0).into_dyn()
        } else {
            res.into_dyn()
        }
    }

    fn not_trained(&self) -> MapperError {
        MapperError::NotTrained {
            mapper: self.name().to_string(),
        }
    }
}

impl<T: ProjectionTrainer> Mapper for ProjectionMapper<T> {
    fn name(&self) -> &str {
        self.trainer.name()
    }

    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    fn forward_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        self.forward_with(data, None)
    }

    fn reverse_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        let recon = self.recon()?;
        let (rows, was_1d) = self.as_rows(data, recon.nrows())?;
        let demean = self.config.demean;

        let mut res = match (demean, &self.offset_out) {
            (true, Some(offset)) => (&rows - offset).dot(recon),
            _ => rows.dot(recon),
        };
        if let (true, Some(offset)) = (demean, &self.offset_in) {
            res += offset;
        }
        Ok(Self::restore_rank(res, was_1d))
    }

    /// Records the input-space mean.
    fn pretrain(&mut self, ds: &Dataset) -> Result<(), MapperError> {
        let samples = ds.samples().read();
        let mean = samples.view().mean_axis(Axis(0)).ok_or_else(|| MapperError::UnsupportedInput {
            mapper: self.name().to_string(),
            kind: "dataset without samples",
        })?;
        self.offset_in = Some(mean);
        Ok(())
    }

    fn train_impl(&mut self, ds: &Dataset) -> Result<(), MapperError> {
        let fitted = {
            let samples = ds.samples().read();
            let view = samples.view();
            match (self.config.demean, &self.offset_in) {
                (true, Some(offset)) => {
                    let centered = &view - offset;
                    self.trainer.fit(centered.view())?
                }
                _ => self.trainer.fit(view)?,
            }
        };
        self.proj = Some(fitted.proj);
        self.offset_out = fitted.offset_out;
        self.recon = OnceLock::new();
        Ok(())
    }

    /// Applies the configured component selection.
    fn posttrain(&mut self, _ds: &Dataset) -> Result<(), MapperError> {
        if let Some(selector) = self.config.selector.clone() {
            self.select_out(&selector)?;
        }
        Ok(())
    }

    fn in_size(&self) -> usize {
        self.proj.as_ref().map_or(0, |p| p.nrows())
    }

    fn out_size(&self) -> usize {
        self.proj.as_ref().map_or(0, |p| p.ncols())
    }

    /// Keep the given projection columns; the reconstruction is recomputed
    /// on next use.
    fn select_out(&mut self, ids: &[usize]) -> Result<(), MapperError> {
        let proj = self.proj()?;
        if let Some(&bad) = ids.iter().find(|&&id| id >= proj.ncols()) {
            return Err(MapperError::InvalidOutId {
                mapper: self.name().to_string(),
                id: bad,
            });
        }
        let proj = proj.select(Axis(1), ids);
        self.offset_out = self.offset_out.as_ref().map(|o| o.select(Axis(0), ids));
        self.proj = Some(proj);
        self.recon = OnceLock::new();
        Ok(())
    }
}
