//! Principal-component projection via singular value decomposition.

use nalgebra::{DMatrix, SVD};
use ndarray::{Array1, Array2, ArrayView2};
use tracing::debug;

use super::projection::{Projection, ProjectionTrainer};
use super::MapperError;

/// Projects onto the right singular vectors of the training samples,
/// ordered by decreasing singular value.
///
/// With demeaning enabled this is a PCA. The projection is orthonormal, so
/// reconstruction is its transpose.
///
/// ```
/// use mvpa::data::Dataset;
/// use mvpa::mapper::{Mapper, ProjectionConfig, ProjectionMapper, SvdProjection};
/// use ndarray::array;
///
/// let ds = Dataset::new(array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
/// let mut pca = ProjectionMapper::new(SvdProjection::default(), ProjectionConfig::default());
/// pca.train(&ds).unwrap();
/// assert_eq!(pca.out_size(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SvdProjection {
    singular_values: Option<Array1<f64>>,
}

impl SvdProjection {
    /// Singular values of the last fit, in decreasing order.
    pub fn singular_values(&self) -> Option<&Array1<f64>> {
        self.singular_values.as_ref()
    }

    /// Fraction of total variance carried by each component.
    pub fn explained_variance_ratio(&self) -> Option<Array1<f64>> {
        let sv = self.singular_values.as_ref()?;
        let var = sv.mapv(|s| s * s);
        let total = var.sum();
        if total > 0.0 {
            Some(var / total)
        } else {
            None
        }
    }
}

impl ProjectionTrainer for SvdProjection {
    fn name(&self) -> &str {
        "SVDMapper"
    }

    fn fit(&mut self, samples: ArrayView2<'_, f64>) -> Result<Projection, MapperError> {
        let (rows, cols) = samples.dim();
        if rows == 0 || cols == 0 {
            return Err(MapperError::UnsupportedInput {
                mapper: self.name().to_string(),
                kind: "empty sample matrix",
            });
        }
        let m = DMatrix::from_fn(rows, cols, |i, j| samples[[i, j]]);
        let svd = SVD::new(m, false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| MapperError::Linalg("SVD did not produce right singular vectors".to_string()))?;

        let k = svd.singular_values.len();
        debug!(rows, cols, components = k, "fitted SVD projection");
        self.singular_values = Some(Array1::from_iter(svd.singular_values.iter().copied()));

        // v_t is [k, cols]; the projection is its transpose.
        let proj = Array2::from_shape_fn((cols, k), |(i, j)| v_t[(j, i)]);
        Ok(Projection { proj, offset_out: None })
    }

    fn compute_recon(&self, proj: &Array2<f64>) -> Result<Array2<f64>, MapperError> {
        Ok(proj.t().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::mapper::{Mapper, ProjectionConfig, ProjectionMapper};
    use crate::testing::{assert_arrays_close, random_samples};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn singular_values_are_descending() {
        let mut svd = SvdProjection::default();
        svd.fit(random_samples(20, 5, 7).view()).unwrap();
        let sv = svd.singular_values().unwrap();
        assert_eq!(sv.len(), 5);
        assert!(sv.windows(2).into_iter().all(|w| w[0] >= w[1]));
        let ratio = svd.explained_variance_ratio().unwrap();
        assert_abs_diff_eq!(ratio.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn projection_is_orthonormal() {
        let mut svd = SvdProjection::default();
        let p = svd.fit(random_samples(10, 4, 3).view()).unwrap().proj;
        let gram = p.t().dot(&p);
        assert_arrays_close(&gram.into_dyn(), &Array2::<f64>::eye(4).into_dyn());
    }

    #[test]
    fn full_rank_pca_round_trips() {
        let ds = Dataset::new(random_samples(12, 3, 11));
        let mut pca = ProjectionMapper::new(SvdProjection::default(), ProjectionConfig::default());
        pca.train(&ds).unwrap();

        let x = ds.samples().to_array().into_dyn();
        let y = pca.forward_data(x.view()).unwrap();
        let back = pca.reverse_data(y.view()).unwrap();
        assert_arrays_close(&back, &x);
    }

    #[test]
    fn first_component_follows_the_line() {
        let ds = Dataset::new(array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]]);
        let config = ProjectionConfig::builder().selector(vec![0]).build().unwrap();
        let mut pca = ProjectionMapper::new(SvdProjection::default(), config);
        pca.train(&ds).unwrap();
        assert_eq!(pca.out_size(), 1);

        let y = pca.forward_data(array![[3.5, 3.5]].into_dyn().view()).unwrap();
        assert_abs_diff_eq!(y[[0, 0]].abs(), 2.0_f64.sqrt(), epsilon = 1e-9);
    }
}
