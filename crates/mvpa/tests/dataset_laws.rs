//! Dataset invariants: shapes, sharing, selection equivalence and merging.

use ndarray::{array, s, Array2, Slice};
use rstest::rstest;

use mvpa::data::{AttrArray, CopyMode, Dataset, DatasetError, ItemAttributes, OrigIdTarget, Selection};
use mvpa::testing::{arange, arange_dataset};

// =============================================================================
// Helpers
// =============================================================================

fn labelled(rows: usize, cols: usize) -> Dataset {
    let labels: Vec<i64> = (0..rows as i64).map(|i| i % 2).collect();
    let chunks: Vec<i64> = (0..rows as i64).collect();
    let mut ds = Dataset::from_basic(arange(rows, cols), labels, chunks).unwrap();
    ds.fa_mut()
        .set("roi", (0..cols).map(|j| format!("f{j}")).collect::<Vec<_>>())
        .unwrap();
    ds
}

fn assert_consistent(ds: &Dataset) {
    let (n, m) = ds.samples().shape();
    assert_eq!(ds.nsamples(), n);
    assert_eq!(ds.nfeatures(), m);
    for (_, v) in ds.sa().iter() {
        assert_eq!(v.len(), n);
    }
    for (_, v) in ds.fa().iter() {
        assert_eq!(v.len(), m);
    }
}

// =============================================================================
// Shape invariants
// =============================================================================

#[rstest]
#[case(Selection::All, Selection::All)]
#[case(Selection::Slice(Slice::new(1, Some(3), 1)), Selection::All)]
#[case(Selection::Indices(vec![3, 0, 0]), Selection::Slice(Slice::new(0, None, 2)))]
#[case(Selection::Mask(vec![true, false, true, true]), Selection::Index(-1))]
#[case(Selection::Slice(Slice::new(0, None, -1)), Selection::Indices(vec![2, 1]))]
fn selections_keep_attributes_consistent(#[case] rows: Selection, #[case] cols: Selection) {
    let ds = labelled(4, 3);
    let sub = ds.select(rows, cols).unwrap();
    assert_consistent(&sub);
}

#[test]
fn concrete_scenario() {
    let ds = arange_dataset(4, 3);
    assert_eq!(ds.nsamples(), 4);
    assert_eq!(ds.nfeatures(), 3);
    let sub = ds.select(.., 1..3).unwrap();
    assert_eq!(sub.samples().to_array(), array![[1., 2.], [4., 5.], [7., 8.], [10., 11.]]);
}

// =============================================================================
// Sharing
// =============================================================================

#[test]
fn slices_share_storage() {
    let ds = arange_dataset(4, 3);
    let sliced = ds.select_samples(1..3).unwrap();
    assert!(sliced.samples().shares_buffer(ds.samples()));

    sliced.samples().write().view_mut().fill(-1.0);
    let seen = ds.samples().to_array();
    assert_eq!(seen.slice(s![1..3, ..]), Array2::from_elem((2, 3), -1.0));
    assert_eq!(seen.row(0), arange(1, 3).row(0));
}

#[test]
fn fancy_selection_copies() {
    let ds = arange_dataset(4, 3);
    let picked = ds.select_samples(vec![1usize, 2]).unwrap();
    assert!(!picked.samples().shares_buffer(ds.samples()));

    picked.samples().set(0, 0, 100.0);
    assert_eq!(ds.samples().get(1, 0), 3.0);
}

#[test]
fn nested_slices_compose() {
    let ds = arange_dataset(6, 4);
    let outer = ds.select(1..5, 1..).unwrap();
    let inner = outer.select(Slice::new(0, None, 2), 1..3).unwrap();
    assert!(inner.samples().shares_buffer(ds.samples()));
    assert_eq!(inner.samples().to_array(), ds.samples().to_array().slice(s![1..5;2, 2..4]).to_owned());
}

#[test]
fn copy_modes() {
    let ds = labelled(3, 2);
    let shallow = ds.copy(CopyMode::Shallow);
    let deep = ds.copy(CopyMode::Deep);
    assert!(shallow.samples().shares_buffer(ds.samples()));
    assert!(!deep.samples().shares_buffer(ds.samples()));

    let labels = ds.sa().get("labels").unwrap();
    assert!(shallow.sa().get("labels").unwrap().shares_data_with(labels));
    assert!(!deep.sa().get("labels").unwrap().shares_data_with(labels));
}

// =============================================================================
// Selection equivalence
// =============================================================================

#[test]
fn mask_indices_and_slice_agree() {
    let ds = labelled(5, 3);
    let by_mask = ds.select_samples(vec![false, true, true, true, false]).unwrap();
    let by_index = ds.select_samples(vec![1usize, 2, 3]).unwrap();
    let by_slice = ds.select_samples(1..4).unwrap();

    assert_eq!(by_mask.samples().to_array(), by_index.samples().to_array());
    assert_eq!(by_index.samples().to_array(), by_slice.samples().to_array());
    assert_eq!(by_mask.sa(), by_slice.sa());
}

#[rstest]
#[case(Selection::Indices(vec![4]))]
#[case(Selection::Index(-5))]
#[case(Selection::Mask(vec![true; 3]))]
#[case(Selection::Slice(Slice { start: 0, end: None, step: 0 }))]
fn bad_selections_are_dataset_errors(#[case] rows: Selection) {
    let ds = arange_dataset(4, 2);
    let err = ds.select_samples(rows).unwrap_err();
    assert!(matches!(
        err,
        DatasetError::IndexOutOfBounds { .. } | DatasetError::MaskLength { .. } | DatasetError::ZeroStep
    ));
}

#[test]
fn too_many_specs() {
    let ds = arange_dataset(2, 2);
    let err = ds.select_specs(&[Selection::All, Selection::All, Selection::All]).unwrap_err();
    assert!(matches!(err, DatasetError::TooManySelections { count: 3 }));
}

// =============================================================================
// Merging
// =============================================================================

#[test]
fn merge_law() {
    let a = labelled(3, 2);
    let b = labelled(2, 2);
    let ab = a.merged(&b).unwrap();
    assert_eq!(ab.nsamples(), a.nsamples() + b.nsamples());
    assert_eq!(ab.samples().to_array().slice(s![..3, ..]), a.samples().to_array());
    assert_eq!(ab.sa().get("chunks").unwrap(), &AttrArray::from(vec![0i64, 1, 2, 0, 1]));
    assert_consistent(&ab);
}

#[test]
fn failed_merge_leaves_dataset_untouched() {
    let mut a = labelled(3, 2);
    let before = a.samples().to_array();

    let mut wrong_type = labelled(2, 2);
    wrong_type.sa_mut().set("labels", vec!["x", "y"]).unwrap();
    assert!(matches!(a.merge(&wrong_type), Err(DatasetError::AttributeTypeMismatch { .. })));

    let other_keys = Dataset::new(Array2::zeros((1, 2)));
    assert!(matches!(a.merge(&other_keys), Err(DatasetError::SampleAttributeKeys { .. })));

    let wide = labelled(1, 3);
    assert!(matches!(a.merge(&wide), Err(DatasetError::FeatureCountMismatch { expected: 2, got: 3 })));

    assert_eq!(a.samples().to_array(), before);
    assert_eq!(a.nsamples(), 3);
}

// =============================================================================
// Attributes
// =============================================================================

#[test]
fn collections_reject_wrong_lengths() {
    let mut ds = arange_dataset(3, 2);
    assert!(ds.sa_mut().set("labels", vec![1i64, 2]).is_err());
    assert!(ds.fa_mut().set("roi", vec![true, false]).is_ok());

    let mut sa = ItemAttributes::with_length(2);
    sa.set("labels", vec![1i64, 2]).unwrap();
    assert!(Dataset::with_attributes(arange(3, 2), sa, ItemAttributes::unbounded(), Default::default()).is_err());
}

#[test]
fn origids_are_unique_across_datasets() {
    let mut a = arange_dataset(2, 2);
    let mut b = arange_dataset(2, 2);
    a.init_origids(OrigIdTarget::Both, "origids").unwrap();
    b.init_origids(OrigIdTarget::Samples, "origids").unwrap();

    let ids_a = a.sa().strs("origids").unwrap().to_vec();
    let ids_b = b.sa().strs("origids").unwrap().to_vec();
    assert!(ids_a.iter().all(|id| !ids_b.contains(id)));
    assert_eq!(a.fa().get("origids").unwrap().len(), 2);
    assert!(b.fa().get("origids").is_none());
}

#[test]
fn attributes_exchange_as_json() {
    let ds = labelled(2, 2);
    let json = serde_json::to_string(ds.sa()).unwrap();
    let back: ItemAttributes = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, ds.sa());
}
