//! Registry of learners keyed by capability tags.
//!
//! ```
//! use mvpa::learner::{Tagged, Warehouse};
//!
//! struct Learner(&'static str, &'static [&'static str]);
//!
//! impl Tagged for Learner {
//!     fn descr(&self) -> &str { self.0 }
//!     fn tags(&self) -> &[&str] { self.1 }
//! }
//!
//! let mut clfs = Warehouse::new();
//! clfs.register(Learner("linear svm", &["svm", "linear", "binary"])).unwrap();
//! clfs.register(Learner("knn", &["knn", "non-linear", "multiclass"])).unwrap();
//!
//! let linear = clfs.select(&["linear"]).unwrap();
//! assert_eq!(linear.len(), 1);
//! assert_eq!(clfs.select(&["!svm"]).unwrap()[0].descr(), "knn");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use super::Tagged;

/// Default tag vocabulary.
pub const KNOWN_TAGS: &[&str] = &[
    "knn",
    "binary",
    "svm",
    "linear",
    "smlr",
    "does_feature_selection",
    "has_sensitivity",
    "multiclass",
    "non-linear",
    "kernel-based",
    "lars",
    "regression",
    "libsvm",
    "sg",
    "meta",
    "retrainable",
    "gpr",
    "notrain2predict",
    "ridge",
    "blr",
];

/// Registration and query errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WarehouseError {
    #[error("cannot register '{descr}' which has no tags")]
    EmptyTags { descr: String },

    #[error("unknown tags {tags:?}")]
    UnknownTags { tags: Vec<String> },
}

/// Learners selectable by tag.
///
/// A query is a list of tags. Every plain tag must be carried by an item
/// (or one of the tags it matches, see [`Warehouse::with_matches`]); a tag
/// prefixed with `!` must not be. An empty query selects everything.
pub struct Warehouse<T> {
    known: BTreeSet<String>,
    matches: BTreeMap<String, Vec<String>>,
    items: Vec<T>,
    internals: BTreeSet<String>,
}

impl<T: Tagged> Warehouse<T> {
    /// Empty warehouse accepting [`KNOWN_TAGS`].
    pub fn new() -> Self {
        Self::with_known_tags(KNOWN_TAGS.iter().copied())
    }

    pub fn with_known_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: tags.into_iter().map(Into::into).collect(),
            matches: BTreeMap::new(),
            items: Vec::new(),
            internals: BTreeSet::new(),
        }
    }

    /// Let a query for `tag` also accept items carrying any of `alternatives`,
    /// e.g. `binary` satisfied by `regression`.
    pub fn with_matches<I, S>(mut self, tag: impl Into<String>, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matches
            .insert(tag.into(), alternatives.into_iter().map(Into::into).collect());
        self
    }

    pub fn add_known_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(tags.into_iter().map(Into::into));
    }

    fn check_item(&self, item: &T) -> Result<(), WarehouseError> {
        let tags = item.tags();
        if tags.is_empty() {
            return Err(WarehouseError::EmptyTags {
                descr: item.descr().to_string(),
            });
        }
        self.check_known(tags.iter().copied())
    }

    fn check_known<'a>(&self, tags: impl Iterator<Item = &'a str>) -> Result<(), WarehouseError> {
        let unknown: BTreeSet<String> = tags
            .filter(|t| !self.known.contains(*t))
            .map(str::to_string)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(WarehouseError::UnknownTags {
                tags: unknown.into_iter().collect(),
            })
        }
    }

    /// Add one item. Its tags must be non-empty and known.
    pub fn register(&mut self, item: T) -> Result<(), WarehouseError> {
        self.check_item(&item)?;
        debug!(descr = item.descr(), tags = ?item.tags(), "registered learner");
        self.internals.extend(item.tags().iter().map(|t| t.to_string()));
        self.items.push(item);
        Ok(())
    }

    /// Add several items; nothing is added unless all of them are valid.
    pub fn register_all(&mut self, items: impl IntoIterator<Item = T>) -> Result<(), WarehouseError> {
        let items: Vec<T> = items.into_iter().collect();
        for item in &items {
            self.check_item(item)?;
        }
        for item in items {
            self.register(item)?;
        }
        Ok(())
    }

    /// Items satisfying every tag in `query`, in registration order.
    pub fn select(&self, query: &[&str]) -> Result<Vec<&T>, WarehouseError> {
        self.check_known(query.iter().map(|q| q.trim_start_matches('!')))?;
        Ok(self.items.iter().filter(|item| self.accepts(item.tags(), query)).collect())
    }

    fn accepts(&self, tags: &[&str], query: &[&str]) -> bool {
        query.iter().all(|q| match q.strip_prefix('!') {
            Some(excluded) => !tags.contains(&excluded),
            None => {
                tags.contains(q)
                    || self
                        .matches
                        .get(*q)
                        .is_some_and(|alts| alts.iter().any(|a| tags.contains(&a.as_str())))
            }
        })
    }

    /// Union of the tags of all registered items.
    pub fn internals(&self) -> &BTreeSet<String> {
        &self.internals
    }

    pub fn known_tags(&self) -> &BTreeSet<String> {
        &self.known
    }

    /// `(descr, tags)` of every item.
    pub fn listing(&self) -> Vec<(String, Vec<String>)> {
        self.items
            .iter()
            .map(|i| (i.descr().to_string(), i.tags().iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Tagged> Default for Warehouse<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tagged> fmt::Debug for Warehouse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Warehouse")
            .field("items", &self.listing())
            .field("matches", &self.matches)
            .finish()
    }
}
