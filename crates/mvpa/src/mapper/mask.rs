//! Mask-based feature selection.
//!
//! [`MaskMapper`] turns the nonzero elements of an N-d mask into a flat
//! feature vector and back. The nonzero coordinates are computed once when
//! the mask is set, so [`Mapper::in_id`] is a lookup per mask axis. The
//! opposite direction ([`Mapper::out_id`]) scans every feature and is meant
//! for occasional use only.
//!
//! ```
//! use mvpa::mapper::{MaskMapper, Mapper};
//! use ndarray::array;
//!
//! let mapper = MaskMapper::new(array![1.0, 0.0, 1.0]).unwrap();
//! let out = mapper.forward_data(array![5.0, 6.0, 7.0].into_dyn().view()).unwrap();
//! assert_eq!(out, array![5.0, 7.0].into_dyn());
//! let back = mapper.reverse_data(out.view()).unwrap();
//! assert_eq!(back, array![5.0, 0.0, 7.0].into_dyn());
//! ```

use std::sync::Arc;

use ndarray::{Array, Array1, Array2, ArrayD, ArrayViewD, Axis, Dimension, Ix2, IxDyn};

use super::{Coord, Mapper, MapperBase, MapperError, Metric};
use crate::data::{CopyMode, Dataset, DatasetError, Resolved};
use crate::utils::Parallelism;

/// Mapper selecting the nonzero elements of a mask.
#[derive(Debug, Clone)]
pub struct MaskMapper {
    base: MapperBase,
    mask: ArrayD<f64>,
    /// Nonzero coordinates, one vector per mask axis.
    nonzero: Vec<Vec<usize>>,
    /// C-order flat position of every feature inside the mask.
    flat: Vec<usize>,
    parallelism: Parallelism,
}

impl MaskMapper {
    /// Build from a mask; nonzero elements become features in C order.
    ///
    /// # Errors
    ///
    /// [`MapperError::EmptyMask`] for a 0-d mask.
    pub fn new<D: Dimension>(mask: Array<f64, D>) -> Result<Self, MapperError> {
        let mut mapper = Self {
            base: MapperBase::default(),
            mask: ArrayD::zeros(IxDyn(&[0])),
            nonzero: Vec::new(),
            flat: Vec::new(),
            parallelism: Parallelism::default(),
        };
        mapper.set_mask(mask)?;
        Ok(mapper)
    }

    /// Build from a boolean mask.
    pub fn from_bools<D: Dimension>(mask: Array<bool, D>) -> Result<Self, MapperError> {
        Self::new(mask.mapv(f64::from))
    }

    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Self {
        self.base.metric = Some(metric);
        self
    }

    pub fn with_inspace(mut self, inspace: impl Into<String>) -> Self {
        self.base.inspace = Some(inspace.into());
        self
    }

    /// Allow reverse-mapping of many samples on the rayon pool.
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Replace the mask and rebuild the coordinate caches.
    pub fn set_mask<D: Dimension>(&mut self, mask: Array<f64, D>) -> Result<(), MapperError> {
        let mask = mask.into_dyn();
        if mask.ndim() == 0 {
            return Err(MapperError::EmptyMask);
        }

        let mut nonzero = vec![Vec::new(); mask.ndim()];
        let mut flat = Vec::new();
        for (pos, (idx, &v)) in mask.indexed_iter().enumerate() {
            if v != 0.0 {
                for (axis, &i) in idx.slice().iter().enumerate() {
                    nonzero[axis].push(i);
                }
                flat.push(pos);
            }
        }

        self.mask = mask;
        self.nonzero = nonzero;
        self.flat = flat;
        Ok(())
    }

    #[inline]
    pub fn mask(&self) -> &ArrayD<f64> {
        &self.mask
    }

    /// Shape of the IN space.
    #[inline]
    pub fn mask_shape(&self) -> &[usize] {
        self.mask.shape()
    }

    /// Coordinates of all features, `[n_features, mask_ndim]`.
    pub fn in_ids(&self) -> Array2<usize> {
        let ndim = self.mask.ndim();
        Array2::from_shape_fn((self.flat.len(), ndim), |(j, axis)| self.nonzero[axis][j])
    }

    /// Mask in IN space marking the given features.
    pub fn build_mask_from_feature_ids(&self, ids: &[usize]) -> Result<ArrayD<bool>, MapperError> {
        let mut marked = vec![false; self.mask.len()];
        for &id in ids {
            marked[self.flat_of(id)?] = true;
        }
        Ok(ArrayD::from_shape_vec(IxDyn(self.mask.shape()), marked).map_err(DatasetError::from)?)
    }

    fn flat_of(&self, id: usize) -> Result<usize, MapperError> {
        self.flat.get(id).copied().ok_or_else(|| MapperError::InvalidOutId {
            mapper: self.name().to_string(),
            id,
        })
    }

    fn check_trailing(&self, data: &ArrayViewD<'_, f64>, lead: usize) -> Result<(), MapperError> {
        if &data.shape()[lead..] != self.mask.shape() {
            return Err(MapperError::ShapeMismatch {
                mapper: self.name().to_string(),
                expected: self.mask.shape().to_vec(),
                got: data.shape()[lead..].to_vec(),
            });
        }
        Ok(())
    }

    fn check_features(&self, got: usize) -> Result<(), MapperError> {
        if got != self.flat.len() {
            return Err(MapperError::ShapeMismatch {
                mapper: self.name().to_string(),
                expected: vec![self.flat.len()],
                got: vec![got],
            });
        }
        Ok(())
    }
}

impl Mapper for MaskMapper {
    fn name(&self) -> &str {
        "MaskMapper"
    }

    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    /// Accepts the mask's rank (one sample) or one extra leading samples axis.
    fn forward_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        let maskdim = self.mask.ndim();
        let lead = match data.ndim() {
            d if d == maskdim => 0,
            d if d == maskdim + 1 => 1,
            ndim => {
                return Err(MapperError::UnsupportedRank {
                    mapper: self.name().to_string(),
                    ndim,
                    supported: format!("{} or {}", maskdim, maskdim + 1),
                })
            }
        };
        self.check_trailing(&data, lead)?;

        let n_samples = if lead == 1 { data.shape()[0] } else { 1 };
        let standard = data.as_standard_layout();
        let rows = standard
            .view()
            .into_shape_with_order((n_samples, self.mask.len()))
            .map_err(DatasetError::from)?;

        if lead == 0 {
            let out: Array1<f64> = self.flat.iter().map(|&f| rows[[0, f]]).collect();
            return Ok(out.into_dyn());
        }
        let out = Array2::from_shape_fn((n_samples, self.flat.len()), |(i, j)| rows[[i, self.flat[j]]]);
        Ok(out.into_dyn())
    }

    /// Accepts one feature vector or a `[n_samples, n_features]` matrix.
    fn reverse_data(&self, data: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, MapperError> {
        match data.ndim() {
            1 => {
                self.check_features(data.len())?;
                let mut out = vec![0.0; self.mask.len()];
                for (&f, &v) in self.flat.iter().zip(data.iter()) {
                    out[f] = v;
                }
                Ok(ArrayD::from_shape_vec(IxDyn(self.mask.shape()), out).map_err(DatasetError::from)?)
            }
            2 => {
                let data = data.into_dimensionality::<Ix2>().map_err(DatasetError::from)?;
                self.check_features(data.ncols())?;
                let n_samples = data.nrows();
                let mut out = Array2::<f64>::zeros((n_samples, self.mask.len()));
                let flat = &self.flat;
                self.parallelism.maybe_par_bridge_for_each(
                    out.axis_iter_mut(Axis(0)).zip(data.axis_iter(Axis(0))),
                    |(mut dst, src)| {
                        for (&f, &v) in flat.iter().zip(src.iter()) {
                            dst[f] = v;
                        }
                    },
                );
                let mut shape = Vec::with_capacity(self.mask.ndim() + 1);
                shape.push(n_samples);
                shape.extend_from_slice(self.mask.shape());
                Ok(out.into_shape_with_order(IxDyn(&shape)).map_err(DatasetError::from)?)
            }
            ndim => Err(MapperError::UnsupportedRank {
                mapper: self.name().to_string(),
                ndim,
                supported: "1 or 2".to_string(),
            }),
        }
    }

    /// With a 1-d mask the feature attributes are selected along with the
    /// features.
    fn forward_dataset(&self, ds: &Dataset) -> Result<Dataset, MapperError> {
        let mapped = {
            let samples = ds.samples().read();
            self.forward_data(samples.view().into_dyn())?
        };
        let mut out = ds.with_samples(super::into_matrix(self.name(), mapped)?);
        if self.mask.ndim() == 1 && !ds.fa().is_empty() && out.fa().is_empty() {
            let kept = ds.fa().select(&Resolved::Indices(self.flat.clone()));
            out.fa_mut()
                .update(&kept, CopyMode::Shallow)
                .map_err(DatasetError::from)?;
        }
        Ok(out)
    }

    /// Nothing to learn; the mask is fixed at construction.
    fn train_impl(&mut self, _ds: &Dataset) -> Result<(), MapperError> {
        Ok(())
    }

    fn in_size(&self) -> usize {
        self.mask.len()
    }

    fn out_size(&self) -> usize {
        self.flat.len()
    }

    /// Shrink the mask to the given features.
    ///
    /// Features keep their C order in the mask, whatever the order of `ids`.
    fn select_out(&mut self, ids: &[usize]) -> Result<(), MapperError> {
        let src: Vec<f64> = self.mask.iter().copied().collect();
        let mut kept = vec![0.0; src.len()];
        for &id in ids {
            let f = self.flat_of(id)?;
            kept[f] = src[f];
        }
        let mask = ArrayD::from_shape_vec(IxDyn(self.mask.shape()), kept).map_err(DatasetError::from)?;
        self.set_mask(mask)
    }

    fn is_valid_inid(&self, coord: &[usize]) -> bool {
        coord.len() == self.mask.ndim() && coord.iter().zip(self.mask.shape()).all(|(c, n)| c < n)
    }

    fn in_id(&self, out_id: usize) -> Result<Coord, MapperError> {
        if !self.is_valid_outid(out_id) {
            return Err(MapperError::InvalidOutId {
                mapper: self.name().to_string(),
                id: out_id,
            });
        }
        Ok(self.nonzero.iter().map(|axis| axis[out_id]).collect())
    }

    /// Linear scan over all features.
    fn out_id(&self, coord: &[usize]) -> Result<usize, MapperError> {
        if coord.len() == self.mask.ndim() {
            for j in 0..self.flat.len() {
                if self.nonzero.iter().zip(coord).all(|(axis, &c)| axis[j] == c) {
                    return Ok(j);
                }
            }
        }
        Err(MapperError::NoFeatureAtCoordinate {
            mapper: self.name().to_string(),
            coord: coord.to_vec(),
        })
    }

    /// Coordinates outside the mask have no feature and are dropped.
    fn map_in_ids(&self, in_ids: &[Coord]) -> Result<Vec<usize>, MapperError> {
        Ok(in_ids.iter().filter_map(|c| self.out_id(c).ok()).collect())
    }
}
