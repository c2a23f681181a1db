//! Shared sample storage.
//!
//! [`Samples`] is the sample matrix of a dataset: a reference-counted 2D
//! buffer plus one [`AxisWindow`] per axis. Slicing a dataset with slice-like
//! selections on both axes produces a new `Samples` over the *same* buffer,
//! so writes through one handle are visible through the other. Any other
//! selection gathers the chosen rows/columns into a fresh buffer.
//!
//! # Aliasing
//!
//! The buffer sits behind a [`parking_lot::RwLock`], which is not
//! re-entrant. Holding a guard from [`Samples::read`] while calling
//! [`Samples::write`] on any handle sharing the buffer deadlocks the thread.
//!
//! Prefer [`Samples::get`], [`Samples::set`] and [`Samples::to_array`]: each
//! takes the lock for a single call and releases it before returning.
//! Take a guard only for bulk work, and drop it before touching another
//! handle over the same buffer.
//!
//! ```
//! use mvpa::data::Dataset;
//! use ndarray::array;
//!
//! let ds = Dataset::new(array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]]);
//! let tail = ds.select_samples(1..).unwrap();
//!
//! let x = tail.samples().get(0, 1);
//! tail.samples().set(0, 1, x * 10.0);
//! assert_eq!(ds.samples().get(1, 1), 30.0);
//!
//! // Bulk write: the guard lives only for this statement.
//! tail.samples().write().view_mut().fill(0.0);
//! assert_eq!(ds.samples().to_array(), array![[0.0, 1.0], [0.0, 0.0], [0.0, 0.0]]);
//! ```

use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::selection::{AxisWindow, Resolved};

/// Sample matrix (`[n_samples, n_features]`) with view semantics.
#[derive(Clone)]
pub struct Samples {
    buffer: Arc<RwLock<Array2<f64>>>,
    rows: AxisWindow,
    cols: AxisWindow,
}

impl Samples {
    /// Wrap an owned matrix; the new handle is the only owner of its buffer.
    pub fn from_array(data: Array2<f64>) -> Self {
        let (n_rows, n_cols) = data.dim();
        Self {
            buffer: Arc::new(RwLock::new(data)),
            rows: AxisWindow::full(n_rows),
            cols: AxisWindow::full(n_cols),
        }
    }

    /// Number of samples (rows).
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows.len
    }

    /// Number of features (columns).
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols.len
    }

    /// `(n_samples, n_features)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len, self.cols.len)
    }

    /// Lock the buffer for reading.
    pub fn read(&self) -> SamplesRead<'_> {
        SamplesRead {
            guard: self.buffer.read(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Lock the buffer for in-place writing.
    ///
    /// Writes are visible through every handle that shares this buffer.
    pub fn write(&self) -> SamplesWrite<'_> {
        SamplesWrite {
            guard: self.buffer.write(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Copy the visible window into a new owned matrix.
    pub fn to_array(&self) -> Array2<f64> {
        self.read().view().to_owned()
    }

    /// Value at `(sample, feature)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.read().view()[[sample, feature]]
    }

    /// Overwrite the value at `(sample, feature)` in the shared buffer.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn set(&self, sample: usize, feature: usize, value: f64) {
        self.write().view_mut()[[sample, feature]] = value;
    }

    /// Whether both handles point into the same buffer.
    #[inline]
    pub fn shares_buffer(&self, other: &Samples) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Independent copy of the visible window.
    pub fn deep_copy(&self) -> Self {
        Self::from_array(self.to_array())
    }

    /// A window into this handle's window, sharing the buffer.
    pub(crate) fn window(&self, rows: &AxisWindow, cols: &AxisWindow) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            rows: self.rows.compose(rows),
            cols: self.cols.compose(cols),
        }
    }

    /// Gather an arbitrary row/column selection into a fresh buffer.
    pub(crate) fn gather(&self, rows: &Resolved, cols: &Resolved) -> Self {
        let guard = self.read();
        let view = guard.view();
        let picked = match rows {
            Resolved::Window(w) => view.slice_axis(Axis(0), w.to_slice()).to_owned(),
            Resolved::Indices(idx) => view.select(Axis(0), idx),
        };
        let picked = match cols {
            Resolved::Window(w) => picked.slice_axis(Axis(1), w.to_slice()).to_owned(),
            Resolved::Indices(idx) => picked.select(Axis(1), idx),
        };
        Self::from_array(picked)
    }
}

impl fmt::Debug for Samples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Samples")
            .field("shape", &self.shape())
            .field("data", &self.read().view())
            .finish()
    }
}

impl From<Array2<f64>> for Samples {
    fn from(data: Array2<f64>) -> Self {
        Self::from_array(data)
    }
}

/// Read guard over a [`Samples`] window.
pub struct SamplesRead<'a> {
    guard: RwLockReadGuard<'a, Array2<f64>>,
    rows: AxisWindow,
    cols: AxisWindow,
}

impl SamplesRead<'_> {
    /// View of the visible window, shape `[n_samples, n_features]`.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.guard
            .slice_axis(Axis(0), self.rows.to_slice())
            .slice_axis_move(Axis(1), self.cols.to_slice())
    }
}

/// Write guard over a [`Samples`] window.
pub struct SamplesWrite<'a> {
    guard: RwLockWriteGuard<'a, Array2<f64>>,
    rows: AxisWindow,
    cols: AxisWindow,
}

impl SamplesWrite<'_> {
    /// Mutable view of the visible window.
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        let (rows, cols) = (self.rows.to_slice(), self.cols.to_slice());
        self.guard
            .slice_axis_mut(Axis(0), rows)
            .slice_axis_move(Axis(1), cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Slice};

    fn windows(rows: Slice, cols: Slice, shape: (usize, usize)) -> (AxisWindow, AxisWindow) {
        (
            AxisWindow::from_slice(rows, shape.0).unwrap(),
            AxisWindow::from_slice(cols, shape.1).unwrap(),
        )
    }

    #[test]
    fn window_shares_and_aliases() {
        let base = Samples::from_array(array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0]]);
        let (r, c) = windows(Slice::from(1..3), Slice::from(..), base.shape());
        let sub = base.window(&r, &c);

        assert!(sub.shares_buffer(&base));
        assert_eq!(sub.to_array(), array![[3.0, 4.0, 5.0], [6.0, 7.0, 8.0]]);

        sub.set(0, 1, -1.0);
        assert_eq!(base.get(1, 1), -1.0);
    }

    #[test]
    fn nested_windows_compose() {
        let base = Samples::from_array(Array2::from_shape_fn((6, 4), |(i, j)| (i * 4 + j) as f64));
        let (r, c) = windows(Slice::new(0, None, 2), Slice::from(1..4), base.shape());
        let first = base.window(&r, &c); // rows 0,2,4 ; cols 1,2,3
        let (r2, c2) = windows(Slice::from(1..), Slice::new(0, None, 2), first.shape());
        let second = first.window(&r2, &c2); // rows 2,4 ; cols 1,3

        assert_eq!(second.to_array(), array![[9.0, 11.0], [17.0, 19.0]]);
        assert!(second.shares_buffer(&base));
    }

    #[test]
    fn gather_copies() {
        let base = Samples::from_array(array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]]);
        let picked = base.gather(
            &Resolved::Indices(vec![2, 0]),
            &Resolved::Window(AxisWindow::full(2)),
        );
        assert!(!picked.shares_buffer(&base));
        assert_eq!(picked.to_array(), array![[4.0, 5.0], [0.0, 1.0]]);
    }

    #[test]
    fn helpers_interleave_across_sharers() {
        let base = Samples::from_array(array![[0.0, 1.0], [2.0, 3.0]]);
        let (r, c) = windows(Slice::from(1..), Slice::from(..), base.shape());
        let tail = base.window(&r, &c);

        for j in 0..2 {
            let v = base.get(1, j);
            tail.set(0, j, v + 1.0);
        }
        assert_eq!(base.to_array(), array![[0.0, 1.0], [3.0, 4.0]]);

        let total: f64 = base.read().view().sum();
        tail.write().view_mut().fill(total);
        assert_eq!(base.get(1, 0), 8.0);
    }

    #[test]
    fn deep_copy_is_independent() {
        let base = Samples::from_array(array![[1.0, 2.0]]);
        let copy = base.deep_copy();
        copy.set(0, 0, 9.0);
        assert_eq!(base.get(0, 0), 1.0);
    }
}
