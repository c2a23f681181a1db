//! Registering boxed classifiers and selecting them by capability.

use ndarray::Array2;

use mvpa::data::{AttrArray, Dataset};
use mvpa::generators::Repeater;
use mvpa::learner::{Classifier, LearnerError, Tagged, Warehouse, WarehouseError};

/// Always predicts the same label.
struct Constant {
    descr: String,
    tags: Vec<&'static str>,
    label: i64,
}

impl Tagged for Constant {
    fn descr(&self) -> &str {
        &self.descr
    }

    fn tags(&self) -> &[&str] {
        &self.tags
    }
}

impl Classifier for Constant {
    fn train(&mut self, ds: &Dataset) -> Result<(), LearnerError> {
        self.targets(ds)?;
        Ok(())
    }

    fn predict(&self, ds: &Dataset) -> Result<AttrArray, LearnerError> {
        Ok(vec![self.label; ds.nsamples()].into())
    }
}

fn constant(label: i64, tags: &[&'static str]) -> Box<dyn Classifier> {
    Box::new(Constant {
        descr: format!("constant({label})"),
        tags: tags.to_vec(),
        label,
    })
}

#[test]
fn boxed_classifiers_are_selectable() {
    let mut clfs: Warehouse<Box<dyn Classifier>> = Warehouse::new().with_matches("binary", ["regression"]);
    clfs.register_all([
        constant(0, &["binary", "linear"]),
        constant(1, &["multiclass", "non-linear"]),
        constant(2, &["regression", "linear"]),
    ])
    .unwrap();

    let binary: Vec<&str> = clfs.select(&["binary"]).unwrap().into_iter().map(|c| c.descr()).collect();
    assert_eq!(binary, vec!["constant(0)", "constant(2)"]);

    let nonlinear = clfs.select(&["!linear"]).unwrap();
    assert_eq!(nonlinear.len(), 1);

    let ds = Dataset::from_basic(Array2::zeros((3, 2)), vec![0i64, 1, 1], 0i64).unwrap();
    for clf in clfs.items() {
        assert_eq!(clf.predict(&ds).unwrap().len(), 3);
    }
}

#[test]
fn unknown_tags_are_reported() {
    let mut clfs: Warehouse<Box<dyn Classifier>> = Warehouse::new();
    let err = clfs.register(constant(0, &["quantum"])).unwrap_err();
    assert_eq!(err, WarehouseError::UnknownTags { tags: vec!["quantum".into()] });
    assert!(clfs.internals().is_empty());
}

#[test]
fn each_repetition_trains_independently() {
    let ds = Dataset::from_basic(Array2::zeros((4, 1)), vec![1i64, 1, 2, 2], 0i64).unwrap();
    let mut clf = constant(1, &["binary"]);
    let runs: Vec<_> = Repeater::new(3)
        .generate(&ds)
        .map(|rep| clf.train(&rep).map(|_| rep.a().get("repetitions").is_some()))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(runs, vec![true; 3]);
}
