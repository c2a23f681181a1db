//! Attribute extraction by collection and name.

use std::fmt;

use super::attributes::{AttrArray, DatasetAttr};
use super::collection::CollectionError;
use super::dataset::{AttrSpace, Dataset};

/// Pulls one named attribute out of a dataset.
///
/// ```
/// use mvpa::data::{AttrExtractor, AttrArray, Dataset};
/// use ndarray::Array2;
///
/// let ds = Dataset::builder(Array2::zeros((4, 3)))
///     .sa("labels", vec![0, 1, 2, 3])
///     .fa("foo", vec![0, 0, 1])
///     .build()
///     .unwrap();
/// let labels = AttrExtractor::sa("labels").extract(&ds).unwrap();
/// assert_eq!(labels, AttrArray::from(vec![0, 1, 2, 3]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrExtractor {
    pub space: AttrSpace,
    pub key: String,
}

impl AttrExtractor {
    pub fn new(space: AttrSpace, key: impl Into<String>) -> Self {
        Self {
            space,
            key: key.into(),
        }
    }

    pub fn sa(key: impl Into<String>) -> Self {
        Self::new(AttrSpace::Sa, key)
    }

    pub fn fa(key: impl Into<String>) -> Self {
        Self::new(AttrSpace::Fa, key)
    }

    pub fn a(key: impl Into<String>) -> Self {
        Self::new(AttrSpace::A, key)
    }

    /// Shallow copy of the attribute value.
    pub fn extract(&self, ds: &Dataset) -> Result<AttrArray, CollectionError> {
        match self.space {
            AttrSpace::Sa => ds.sa().require(&self.key).cloned(),
            AttrSpace::Fa => ds.fa().require(&self.key).cloned(),
            AttrSpace::A => match ds.a().require(&self.key)? {
                DatasetAttr::Array(a) => Ok(a.clone()),
                DatasetAttr::Scalar(s) => Ok(s.repeat(1)),
                DatasetAttr::Mapper(_) => Err(CollectionError::TypeMismatch {
                    name: self.key.clone(),
                    expected: "array",
                    got: "mapper",
                }),
            },
        }
    }
}

impl fmt::Display for AttrExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.space, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn extracts_from_each_space() {
        let ds = Dataset::builder(Array2::zeros((2, 3)))
            .sa("labels", vec![1, 2])
            .fa("foo", vec![0, 0, 1])
            .a("run", 3)
            .build()
            .unwrap();
        assert_eq!(AttrExtractor::fa("foo").extract(&ds).unwrap(), AttrArray::from(vec![0, 0, 1]));
        assert_eq!(AttrExtractor::a("run").extract(&ds).unwrap(), AttrArray::from(vec![3]));
        assert!(AttrExtractor::sa("foo").extract(&ds).is_err());
        assert_eq!(AttrExtractor::sa("labels").to_string(), "sa.labels");
    }
}
