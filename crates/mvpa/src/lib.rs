//! mvpa: the data model of multivariate pattern analysis.
//!
//! Samples with per-sample, per-feature and dataset-level attributes, and
//! bidirectional mappers between an original data space (e.g. a 3-D volume)
//! and the flat feature space learners work in.
//!
//! # Key Types
//!
//! - [`Dataset`] - sample matrix plus attribute collections, with sharing
//!   slices and copying selections
//! - [`AttributeCollection`] - named values validated against an item count
//! - [`Mapper`] - forward/reverse transforms, training and id translation
//! - [`MaskMapper`] / [`ProjectionMapper`] - concrete mappers
//! - [`CombinedMapper`] / [`ChainMapper`] - composition
//! - [`Warehouse`] - learner registry keyed by capability tags
//!
//! # Logging
//!
//! Diagnostics go through [`tracing`]; nothing is emitted unless the
//! application installs a subscriber.

// Re-export approx traits for users who want to compare mapped data
pub use approx;

pub mod data;
pub mod generators;
pub mod learner;
pub mod mapper;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{
    AttrArray, AttrInput, AttributeCollection, CollectionError, CopyMode, Dataset, DatasetBuilder,
    DatasetError, Scalar, Selection,
};

pub use mapper::{
    ChainMapper, CombinedMapper, MaskMapper, Mapper, MapperData, MapperError, ProjectionConfig,
    ProjectionMapper, SvdProjection,
};

pub use learner::{Classifier, Measure, Tagged, Warehouse};

pub use utils::Parallelism;
