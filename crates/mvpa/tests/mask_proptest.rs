//! Property-based tests for mask mapping.
//!
//! For any mask and compatible data, reverse(forward(x)) keeps `x` at the
//! mask's nonzero coordinates and is zero elsewhere.

use ndarray::{ArrayD, IxDyn};
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use mvpa::mapper::{Mapper, MaskMapper};
use mvpa::utils::Parallelism;

// =============================================================================
// Strategies
// =============================================================================

/// A mask shape of 1-3 axes with 1-4 elements each, plus a mask over it.
fn arb_mask() -> impl Strategy<Value = ArrayD<f64>> {
    prop_vec(1usize..=4, 1..=3).prop_flat_map(|shape| {
        let size: usize = shape.iter().product();
        prop_vec(prop::bool::ANY, size).prop_map(move |bits| {
            let values = bits.into_iter().map(f64::from).collect();
            ArrayD::from_shape_vec(IxDyn(&shape), values).expect("shape matches length")
        })
    })
}

/// A mask with `n` samples of data over it.
fn arb_mask_and_data() -> impl Strategy<Value = (ArrayD<f64>, ArrayD<f64>)> {
    (arb_mask(), 1usize..=5).prop_flat_map(|(mask, n)| {
        let mut shape = vec![n];
        shape.extend_from_slice(mask.shape());
        let size: usize = shape.iter().product();
        prop_vec(-1e3f64..1e3, size).prop_map(move |values| {
            let data = ArrayD::from_shape_vec(IxDyn(&shape), values).expect("shape matches length");
            (mask.clone(), data)
        })
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn round_trip_keeps_masked_values((mask, data) in arb_mask_and_data(), parallel in any::<bool>()) {
        let parallelism = if parallel { Parallelism::Parallel } else { Parallelism::Sequential };
        let mapper = MaskMapper::new(mask.clone()).unwrap().with_parallelism(parallelism);

        let forward = mapper.forward_data(data.view()).unwrap();
        prop_assert_eq!(forward.shape(), &[data.shape()[0], mapper.out_size()][..]);

        let back = mapper.reverse_data(forward.view()).unwrap();
        prop_assert_eq!(back.shape(), data.shape());

        for (sample, original) in back.outer_iter().zip(data.outer_iter()) {
            for ((restored, &x), &m) in sample.iter().zip(original.iter()).zip(mask.iter()) {
                let expected = if m != 0.0 { x } else { 0.0 };
                prop_assert_eq!(*restored, expected);
            }
        }
    }

    #[test]
    fn ids_round_trip(mask in arb_mask()) {
        let mapper = MaskMapper::new(mask).unwrap();
        for out_id in 0..mapper.out_size() {
            let coord = mapper.in_id(out_id).unwrap();
            prop_assert_eq!(mapper.out_id(&coord).unwrap(), out_id);
        }
    }
}
