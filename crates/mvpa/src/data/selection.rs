//! Per-axis selection specs.
//!
//! A [`Dataset`](super::Dataset) is indexed independently along its sample
//! and feature axes. Each axis takes one [`Selection`]; selections are first
//! resolved against the axis length into either a window (slice-like, the
//! result can share storage with its parent) or an explicit list of indices
//! (the result is always a copy).

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use ndarray::{Array1, Slice};

use super::dataset::DatasetError;

/// Selection along one axis of a dataset.
///
/// Integers are kept as single-element selections so that selecting one
/// sample never drops the sample axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Everything along the axis.
    All,
    /// A strided range with ndarray semantics (negative start/end count from
    /// the back, a negative step walks the range backwards).
    Slice(Slice),
    /// A single position; negative values count from the back.
    Index(isize),
    /// Explicit positions, in the given order. Duplicates are allowed.
    Indices(Vec<usize>),
    /// Boolean mask; must have exactly one entry per item on the axis.
    Mask(Vec<bool>),
}

impl Selection {
    /// Whether this selection can be expressed as a window into the parent
    /// buffer.
    #[inline]
    pub fn is_slice_like(&self) -> bool {
        matches!(self, Selection::All | Selection::Slice(_))
    }

    /// Resolve against an axis of `len` items.
    pub(crate) fn resolve(&self, len: usize, axis: &'static str) -> Result<Resolved, DatasetError> {
        match self {
            Selection::All => Ok(Resolved::Window(AxisWindow::full(len))),
            Selection::Slice(slice) => AxisWindow::from_slice(*slice, len).map(Resolved::Window),
            Selection::Index(index) => {
                let pos = if *index < 0 { *index + len as isize } else { *index };
                if pos < 0 || pos as usize >= len {
                    return Err(DatasetError::IndexOutOfBounds {
                        index: *index,
                        len,
                        axis,
                    });
                }
                Ok(Resolved::Indices(vec![pos as usize]))
            }
            Selection::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
                    return Err(DatasetError::IndexOutOfBounds {
                        index: bad as isize,
                        len,
                        axis,
                    });
                }
                Ok(Resolved::Indices(indices.clone()))
            }
            Selection::Mask(mask) => {
                if mask.len() != len {
                    return Err(DatasetError::MaskLength {
                        expected: len,
                        got: mask.len(),
                        axis,
                    });
                }
                let indices = mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &keep)| keep.then_some(i))
                    .collect();
                Ok(Resolved::Indices(indices))
            }
        }
    }
}

impl From<RangeFull> for Selection {
    fn from(_: RangeFull) -> Self {
        Selection::All
    }
}

impl From<Range<usize>> for Selection {
    fn from(r: Range<usize>) -> Self {
        Selection::Slice(Slice::from(r))
    }
}

impl From<RangeFrom<usize>> for Selection {
    fn from(r: RangeFrom<usize>) -> Self {
        Selection::Slice(Slice::from(r))
    }
}

impl From<RangeTo<usize>> for Selection {
    fn from(r: RangeTo<usize>) -> Self {
        Selection::Slice(Slice::from(r))
    }
}

impl From<Slice> for Selection {
    fn from(s: Slice) -> Self {
        Selection::Slice(s)
    }
}

impl From<usize> for Selection {
    fn from(i: usize) -> Self {
        Selection::Index(i as isize)
    }
}

impl From<Vec<usize>> for Selection {
    fn from(v: Vec<usize>) -> Self {
        Selection::Indices(v)
    }
}

impl From<&[usize]> for Selection {
    fn from(v: &[usize]) -> Self {
        Selection::Indices(v.to_vec())
    }
}

impl From<Vec<bool>> for Selection {
    fn from(m: Vec<bool>) -> Self {
        Selection::Mask(m)
    }
}

impl From<&[bool]> for Selection {
    fn from(m: &[bool]) -> Self {
        Selection::Mask(m.to_vec())
    }
}

impl From<Array1<bool>> for Selection {
    fn from(m: Array1<bool>) -> Self {
        Selection::Mask(m.to_vec())
    }
}

// =============================================================================
// Resolved selections
// =============================================================================

/// A selection resolved against a concrete axis length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolved {
    Window(AxisWindow),
    Indices(Vec<usize>),
}

impl Resolved {
    /// Number of selected items.
    pub(crate) fn len(&self) -> usize {
        match self {
            Resolved::Window(w) => w.len,
            Resolved::Indices(idx) => idx.len(),
        }
    }

    /// Materialize into explicit positions.
    pub(crate) fn to_indices(&self) -> Vec<usize> {
        match self {
            Resolved::Window(w) => w.indices().collect(),
            Resolved::Indices(idx) => idx.clone(),
        }
    }
}

/// Strided window over an axis: item `k` lives at `start + k * step`.
///
/// Windows compose, so a window of a window is again a window into the
/// original buffer. This is what lets repeated slicing keep sharing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AxisWindow {
    pub(crate) start: usize,
    pub(crate) len: usize,
    pub(crate) step: isize,
}

impl AxisWindow {
    pub(crate) fn full(len: usize) -> Self {
        Self {
            start: 0,
            len,
            step: 1,
        }
    }

    /// Resolve an ndarray [`Slice`] over `len` items.
    ///
    /// Out-of-range bounds are clamped rather than rejected.
    pub(crate) fn from_slice(slice: Slice, len: usize) -> Result<Self, DatasetError> {
        if slice.step == 0 {
            return Err(DatasetError::ZeroStep);
        }
        let clamp = |v: isize| -> usize {
            let v = if v < 0 { v + len as isize } else { v };
            v.clamp(0, len as isize) as usize
        };
        let start = clamp(slice.start);
        let end = slice.end.map_or(len, clamp);
        let count = end.saturating_sub(start).div_ceil(slice.step.unsigned_abs());
        let first = if count > 0 && slice.step < 0 { end - 1 } else { start };
        Ok(Self {
            start: first,
            len: count,
            step: slice.step,
        })
    }

    /// Position in the underlying axis of the `k`-th selected item.
    #[inline]
    pub(crate) fn at(&self, k: usize) -> usize {
        (self.start as isize + k as isize * self.step) as usize
    }

    /// Window of `inner` (expressed relative to `self`) in parent coordinates.
    pub(crate) fn compose(&self, inner: &AxisWindow) -> AxisWindow {
        let start = if inner.len == 0 { 0 } else { self.at(inner.start) };
        AxisWindow {
            start,
            len: inner.len,
            step: self.step * inner.step,
        }
    }

    pub(crate) fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(move |k| self.at(k))
    }

    /// Equivalent ndarray slice over the parent axis.
    pub(crate) fn to_slice(&self) -> Slice {
        if self.len == 0 {
            return Slice::new(0, Some(0), 1);
        }
        if self.step > 0 {
            let end = self.at(self.len - 1) + 1;
            Slice::new(self.start as isize, Some(end as isize), self.step)
        } else {
            let last = self.at(self.len - 1);
            Slice::new(last as isize, Some(self.start as isize + 1), self.step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array1, Axis};

    fn window(slice: Slice, len: usize) -> Vec<usize> {
        AxisWindow::from_slice(slice, len).unwrap().indices().collect()
    }

    #[test]
    fn positive_step_window() {
        assert_eq!(window(Slice::from(1..3), 4), vec![1, 2]);
        assert_eq!(window(Slice::new(0, None, 2), 5), vec![0, 2, 4]);
    }

    #[test]
    fn negative_bounds_count_from_back() {
        assert_eq!(window(Slice::new(-2, None, 1), 4), vec![2, 3]);
    }

    #[test]
    fn negative_step_matches_ndarray() {
        let data = Array1::from_iter(0..5usize);
        let expected: Vec<usize> = data.slice(s![0..5;-2]).to_vec();
        assert_eq!(window(Slice::new(0, Some(5), -2), 5), expected);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(window(Slice::from(2..10), 4), vec![2, 3]);
        assert!(window(Slice::from(5..9), 4).is_empty());
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = AxisWindow::from_slice(Slice { start: 0, end: None, step: 0 }, 3).unwrap_err();
        assert!(matches!(err, DatasetError::ZeroStep));
    }

    #[test]
    fn composed_window_maps_to_parent() {
        let outer = AxisWindow::from_slice(Slice::new(1, None, 2), 10).unwrap(); // 1,3,5,7,9
        let inner = AxisWindow::from_slice(Slice::from(1..4), outer.len).unwrap(); // 3,5,7
        let both = outer.compose(&inner);
        assert_eq!(both.indices().collect::<Vec<_>>(), vec![3, 5, 7]);
    }

    #[test]
    fn to_slice_round_trips_through_ndarray() {
        let data = Array1::from_iter(0..10usize);
        for slice in [
            Slice::from(2..7),
            Slice::new(1, None, 3),
            Slice::new(0, None, -1),
            Slice::new(2, Some(9), -3),
        ] {
            let w = AxisWindow::from_slice(slice, 10).unwrap();
            let via_ndarray = data.slice_axis(Axis(0), w.to_slice()).to_vec();
            assert_eq!(via_ndarray, w.indices().collect::<Vec<_>>());
        }
    }

    #[test]
    fn index_is_promoted_to_list() {
        let r = Selection::Index(-1).resolve(4, "samples").unwrap();
        assert_eq!(r, Resolved::Indices(vec![3]));
    }

    #[test]
    fn index_out_of_bounds() {
        let err = Selection::from(7usize).resolve(4, "samples").unwrap_err();
        assert!(matches!(err, DatasetError::IndexOutOfBounds { index: 7, len: 4, .. }));
    }

    #[test]
    fn mask_must_match_length() {
        let err = Selection::from(vec![true, false]).resolve(3, "features").unwrap_err();
        assert!(matches!(err, DatasetError::MaskLength { expected: 3, got: 2, .. }));
        let r = Selection::from(vec![false, true, true]).resolve(3, "features").unwrap();
        assert_eq!(r.to_indices(), vec![1, 2]);
    }
}
