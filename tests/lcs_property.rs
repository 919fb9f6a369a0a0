//! Property test: banded LCS must never overstate and must track plain LCS
//! closely when the true alignment stays near the diagonal. Gated behind
//! `property-testing` so a default `cargo test` run doesn't pay the proptest
//! shrinking cost unless explicitly asked for.

#![cfg(feature = "property-testing")]

use evoclone::similarity::{lcs_length, lcs_length_banded};
use proptest::prelude::*;

proptest! {
    #[test]
    fn banded_lcs_never_exceeds_plain_lcs(
        a in prop::collection::vec(0i64..20, 0..60),
        b in prop::collection::vec(0i64..20, 0..60),
        band in 1usize..15,
    ) {
        let exact = lcs_length(&a, &b);
        let banded = lcs_length_banded(&a, &b, band);
        prop_assert!(banded <= exact);
    }

    #[test]
    fn banded_lcs_matches_plain_lcs_for_a_wide_enough_band(
        a in prop::collection::vec(0i64..50, 0..80),
        b in prop::collection::vec(0i64..50, 0..80),
    ) {
        let band = a.len().max(b.len()).max(1);
        let exact = lcs_length(&a, &b);
        let banded = lcs_length_banded(&a, &b, band);
        prop_assert_eq!(exact, banded);
    }
}
