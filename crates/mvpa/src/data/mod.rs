//! Dataset and attribute containers.
//!
//! - [`Dataset`]: sample matrix plus sample/feature/dataset attributes
//! - [`AttributeCollection`]: length-checked attribute maps
//! - [`Samples`]: shared sample storage with view windows
//! - [`Selection`]: per-axis selection specs

mod attributes;
mod collection;
mod dataset;
mod extract;
mod samples;
mod selection;

pub use attributes::{AttrArray, AttrInput, DatasetAttr, Scalar};
pub use collection::{
    AttributeCollection, AttributeValue, CollectionError, CopyMode, DatasetAttributes, ItemAttributes,
};
pub use dataset::{AttrSpace, Dataset, DatasetBuilder, DatasetError, OrigIdTarget, MAPPER_ATTR};
pub use extract::AttrExtractor;
pub use samples::{Samples, SamplesRead, SamplesWrite};
pub use selection::Selection;

pub(crate) use selection::Resolved;
