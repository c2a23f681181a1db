//! Common utilities used across the crate.
//!
//! Currently this is the parallelism switch honoured by mappers that touch
//! every sample of large arrays.

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// This is a simple flag carried by the components that may process samples
/// independently. When `Parallel`, they may use `rayon` iterators; when
/// `Sequential`, they must iterate in order on the calling thread.
///
/// Components never build their own thread pool: the global rayon pool (or
/// whatever pool the caller installs) is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Run `f` on every item, bridging a plain iterator onto rayon when allowed.
    ///
    /// Useful for ndarray lane iterators (`outer_iter_mut` and friends) that do
    /// not implement `IntoParallelIterator` themselves.
    #[inline]
    pub fn maybe_par_bridge_for_each<T, I, F>(self, iter: I, f: F)
    where
        T: Send,
        I: Iterator<Item = T> + Send,
        F: Fn(T) + Sync + Send,
    {
        if self.is_parallel() {
            iter.par_bridge().for_each(f);
        } else {
            iter.for_each(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn from_threads_one_is_sequential() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert!(Parallelism::from_threads(4).is_parallel());
    }

    #[test]
    fn bridge_visits_every_item() {
        for mode in [Parallelism::Sequential, Parallelism::Parallel] {
            let count = AtomicUsize::new(0);
            mode.maybe_par_bridge_for_each(0..100, |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(count.load(Ordering::Relaxed), 100);
        }
    }
}
