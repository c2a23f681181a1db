//! Dataset generators used when resampling for cross-validation.
//!
//! - [`Repeater`]: yields shallow copies of a dataset, each tagged with its
//!   repetition number
//! - [`Sifter`]: lets a dataset through only if selected attribute values
//!   are all present

use tracing::trace;

use crate::data::{AttrArray, AttrSpace, CopyMode, Dataset, DatasetError, Resolved};

/// Default dataset attribute stamped by [`Repeater`].
pub const DEFAULT_REPEAT_SPACE: &str = "repetitions";

// =============================================================================
// Repeater
// =============================================================================

/// Yields the same dataset `count` times.
///
/// Every yielded dataset is a shallow copy carrying dataset attribute
/// `space` set to the repetition index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeater {
    pub count: usize,
    pub space: String,
}

impl Repeater {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            space: DEFAULT_REPEAT_SPACE.to_string(),
        }
    }

    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = space.into();
        self
    }

    pub fn generate<'a>(&'a self, ds: &'a Dataset) -> impl Iterator<Item = Dataset> + 'a {
        (0..self.count).map(move |i| {
            let mut out = ds.copy(CopyMode::Shallow);
            out.a_mut().set(self.space.as_str(), i as i64);
            out
        })
    }
}

// =============================================================================
// Sifter
// =============================================================================

/// Filters datasets on the values of sample or feature attributes.
///
/// Rules are applied in order. Each rule keeps the samples (or features)
/// whose attribute value is one of the rule's values, on top of what earlier
/// rules on the same axis kept. The dataset passes only if, after every
/// rule, the kept items carry exactly the rule's set of values.
///
/// ```
/// use mvpa::data::{AttrArray, Dataset};
/// use mvpa::generators::Sifter;
/// use ndarray::Array2;
///
/// let ds = Dataset::builder(Array2::zeros((4, 1)))
///     .sa("targets", vec!["c", "c", "p", "p"])
///     .sa("partitions", vec![1i64, 2, 2, 1])
///     .build()
///     .unwrap();
///
/// let sifter = Sifter::new()
///     .include("partitions", vec![2i64])
///     .include("targets", vec!["c", "p"]);
/// assert!(sifter.generate(&ds).unwrap().is_some());
///
/// let strict = Sifter::new().include("targets", vec!["c", "x"]);
/// assert!(strict.generate(&ds).unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sifter {
    pub includes: Vec<(String, AttrArray)>,
}

impl Sifter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule requiring all of `values` for attribute `name`.
    pub fn include(mut self, name: impl Into<String>, values: impl Into<AttrArray>) -> Self {
        self.includes.push((name.into(), values.into()));
        self
    }

    /// The dataset (shallow copy) if it passes every rule, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Unknown attributes, and rules whose values differ in type from the
    /// attribute.
    pub fn generate(&self, ds: &Dataset) -> Result<Option<Dataset>, DatasetError> {
        let mut sa_mask = vec![true; ds.nsamples()];
        let mut fa_mask = vec![true; ds.nfeatures()];

        for (name, values) in &self.includes {
            let wanted = values.unique();
            let (attr, space) = ds.get_attr(name)?;
            let mask = match space {
                AttrSpace::Sa => &mut sa_mask,
                AttrSpace::Fa => &mut fa_mask,
                AttrSpace::A => return Err(DatasetError::UnknownAttribute { name: name.clone() }),
            };

            let hits = attr
                .isin(&wanted)
                .ok_or_else(|| DatasetError::AttributeTypeMismatch { name: name.clone() })?;
            for (keep, hit) in mask.iter_mut().zip(hits) {
                *keep &= hit;
            }

            let kept: Vec<usize> = mask.iter().enumerate().filter_map(|(i, &k)| k.then_some(i)).collect();
            let found = attr.select(&Resolved::Indices(kept)).unique();
            if found.is_empty() || found != wanted {
                trace!(attr = name.as_str(), ?found, ?wanted, "dataset sifted out");
                return Ok(None);
            }
        }
        Ok(Some(ds.copy(CopyMode::Shallow)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Scalar;
    use ndarray::Array2;

    fn partitioned(partitions: Vec<i64>) -> Dataset {
        Dataset::builder(Array2::zeros((4, 2)))
            .sa("chunks", vec![0i64, 1, 2, 3])
            .sa("targets", vec!["c", "c", "p", "p"])
            .sa("partitions", partitions)
            .fa("roi", vec!["v1", "v2"])
            .build()
            .unwrap()
    }

    #[test]
    fn repeater_stamps_each_copy() {
        let ds = partitioned(vec![1, 1, 2, 2]);
        let copies: Vec<_> = Repeater::new(3).with_space("rep").generate(&ds).collect();
        assert_eq!(copies.len(), 3);
        for (i, copy) in copies.iter().enumerate() {
            let stamp = copy.a().get("rep").and_then(|v| v.as_scalar()).cloned();
            assert_eq!(stamp, Some(Scalar::Int(i as i64)));
            assert!(copy.samples().shares_buffer(ds.samples()));
        }
        assert!(ds.a().get("rep").is_none());
    }

    #[test]
    fn balanced_partitions_pass() {
        let sifter = Sifter::new()
            .include("partitions", vec![2i64])
            .include("targets", vec!["c", "p"]);
        // Testing partition holds one 'c' and one 'p'.
        assert!(sifter.generate(&partitioned(vec![2, 1, 2, 1])).unwrap().is_some());
        // Testing partition holds only 'c'.
        assert!(sifter.generate(&partitioned(vec![2, 2, 1, 1])).unwrap().is_none());
    }

    #[test]
    fn feature_rules_use_the_feature_mask() {
        let ds = partitioned(vec![1, 1, 1, 1]);
        assert!(Sifter::new().include("roi", vec!["v2"]).generate(&ds).unwrap().is_some());
        assert!(Sifter::new().include("roi", vec!["v3"]).generate(&ds).unwrap().is_none());
    }

    #[test]
    fn rule_errors() {
        let ds = partitioned(vec![1, 1, 1, 1]);
        assert!(matches!(
            Sifter::new().include("nope", vec![1i64]).generate(&ds),
            Err(DatasetError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            Sifter::new().include("targets", vec![1i64]).generate(&ds),
            Err(DatasetError::AttributeTypeMismatch { .. })
        ));
    }
}
