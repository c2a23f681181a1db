//! Fixtures and float assertions shared by unit and integration tests.

use approx::AbsDiffEq;
use ndarray::{Array2, ArrayD};
use rand::prelude::*;

use crate::data::Dataset;

/// Absolute tolerance for float comparisons in tests.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// `[rows, cols]` matrix with values `i * cols + j`.
pub fn arange(rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(i, j)| (i * cols + j) as f64)
}

/// Dataset over [`arange`] samples, without attributes.
pub fn arange_dataset(rows: usize, cols: usize) -> Dataset {
    Dataset::new(arange(rows, cols))
}

/// Seeded samples, uniform in `[-1, 1)`.
pub fn random_samples(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(-1.0..1.0))
}

/// Assert equal shapes and element-wise closeness within [`DEFAULT_TOLERANCE`].
#[track_caller]
pub fn assert_arrays_close(actual: &ArrayD<f64>, expected: &ArrayD<f64>) {
    assert_eq!(actual.shape(), expected.shape(), "shape mismatch");
    assert!(
        actual.abs_diff_eq(expected, DEFAULT_TOLERANCE),
        "arrays differ:\n  actual: {actual}\nexpected: {expected}"
    );
}
