//! Contracts for the learners that consume datasets.
//!
//! Classifiers and feature-wise measures live outside this crate. They see
//! a [`Dataset`] through its samples and attributes, and project per-feature
//! results back into the original data space through the dataset's mapper
//! (see [`reverse_map_features`]).
//!
//! Learners advertise their capabilities through [`Tagged`], which is what
//! the [`Warehouse`] registry selects on.

use ndarray::{Array1, ArrayD};

use crate::data::{AttrArray, Dataset, DatasetError};
use crate::mapper::MapperError;

mod warehouse;

pub use warehouse::{Warehouse, WarehouseError, KNOWN_TAGS};

/// Default sample attribute holding the targets.
pub const DEFAULT_TARGETS: &str = "labels";

/// Learner errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LearnerError {
    #[error("{learner}: needs to be trained before use")]
    NotTrained { learner: String },

    #[error("dataset has no attribute '{name}'")]
    MissingAttribute { name: String },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

/// Something described by a set of capability tags.
pub trait Tagged {
    /// Human-readable description.
    fn descr(&self) -> &str;

    /// Capability tags, e.g. `["linear", "binary"]`.
    fn tags(&self) -> &[&str];
}

impl<T: Tagged + ?Sized> Tagged for Box<T> {
    fn descr(&self) -> &str {
        (**self).descr()
    }

    fn tags(&self) -> &[&str] {
        (**self).tags()
    }
}

/// Supervised classifier or regression.
pub trait Classifier: Tagged + Send + Sync {
    /// Sample attribute used as targets.
    fn targets_attr(&self) -> &str {
        DEFAULT_TARGETS
    }

    fn train(&mut self, ds: &Dataset) -> Result<(), LearnerError>;

    /// One prediction per sample.
    fn predict(&self, ds: &Dataset) -> Result<AttrArray, LearnerError>;

    /// Targets of `ds` for this classifier.
    fn targets<'a>(&self, ds: &'a Dataset) -> Result<&'a AttrArray, LearnerError> {
        let name = self.targets_attr();
        ds.sa().get(name).ok_or_else(|| LearnerError::MissingAttribute { name: name.to_string() })
    }
}

/// Computes one value per feature, e.g. a sensitivity or a univariate score.
pub trait Measure: Send + Sync {
    fn measure(&mut self, ds: &Dataset) -> Result<Array1<f64>, LearnerError>;
}

/// Project per-feature values back through the dataset's mapper.
///
/// Returns the values unchanged (as a 1-D array) when the dataset carries
/// no mapper.
pub fn reverse_map_features(ds: &Dataset, values: &Array1<f64>) -> Result<ArrayD<f64>, LearnerError> {
    if values.len() != ds.nfeatures() {
        return Err(DatasetError::FeatureCountMismatch {
            expected: ds.nfeatures(),
            got: values.len(),
        }
        .into());
    }
    match ds.mapper() {
        Some(mapper) => Ok(mapper.reverse_data(values.view().into_dyn())?),
        None => Ok(values.clone().into_dyn()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{MaskMapper, SharedMapper};
    use ndarray::array;
    use std::sync::Arc;

    /// Predicts the most frequent training label.
    #[derive(Debug, Default)]
    struct Majority {
        label: Option<i64>,
    }

    impl Tagged for Majority {
        fn descr(&self) -> &str {
            "majority vote"
        }
        fn tags(&self) -> &[&str] {
            &["binary", "multiclass"]
        }
    }

    impl Classifier for Majority {
        fn train(&mut self, ds: &Dataset) -> Result<(), LearnerError> {
            let labels = self.targets(ds)?;
            let ints = labels.as_ints().ok_or(DatasetError::AttributeTypeMismatch {
                name: DEFAULT_TARGETS.to_string(),
            })?;
            let mut counts = std::collections::BTreeMap::new();
            for &l in ints {
                *counts.entry(l).or_insert(0usize) += 1;
            }
            self.label = counts.into_iter().max_by_key(|&(l, c)| (c, std::cmp::Reverse(l))).map(|(l, _)| l);
            Ok(())
        }

        fn predict(&self, ds: &Dataset) -> Result<AttrArray, LearnerError> {
            let label = self.label.ok_or_else(|| LearnerError::NotTrained {
                learner: self.descr().to_string(),
            })?;
            Ok(AttrArray::from(vec![label; ds.nsamples()]))
        }
    }

    #[test]
    fn classifier_contract() {
        let ds = Dataset::from_basic(ndarray::Array2::zeros((4, 2)), vec![1i64, 2, 2, 3], vec![0i64, 0, 1, 1]).unwrap();
        let mut clf = Majority::default();
        assert!(matches!(clf.predict(&ds), Err(LearnerError::NotTrained { .. })));
        clf.train(&ds).unwrap();
        assert_eq!(clf.predict(&ds).unwrap(), AttrArray::from(vec![2i64; 4]));
    }

    #[test]
    fn missing_targets() {
        let ds = Dataset::new(ndarray::Array2::zeros((2, 2)));
        let err = Majority::default().train(&ds).unwrap_err();
        assert!(matches!(err, LearnerError::MissingAttribute { ref name } if name == "labels"));
    }

    #[test]
    fn feature_values_map_back_through_the_mask() {
        let mask: SharedMapper = Arc::new(MaskMapper::new(array![1.0, 0.0, 1.0]).unwrap());
        let mut ds = Dataset::new(array![[5.0, 7.0]]);
        ds.set_mapper(mask);

        let back = reverse_map_features(&ds, &array![0.5, 2.0]).unwrap();
        assert_eq!(back, array![0.5, 0.0, 2.0].into_dyn());

        assert!(reverse_map_features(&ds, &array![1.0]).is_err());
    }
}
