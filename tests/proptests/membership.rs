// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property-based tests for the membership model.

use amt_membership::protocols::{decode_exp16, decode_exp8, encode_exp16, encode_exp8, EXP8_MAX};
use amt_membership::{FilterMode, MembershipQuery, SourceFilter};
use proptest::prelude::*;
use std::net::Ipv4Addr;

fn arb_addr() -> impl Strategy<Value = Ipv4Addr> {
    prop_oneof![
        1 => Just(Ipv4Addr::UNSPECIFIED),
        4 => any::<u32>().prop_map(Ipv4Addr::from),
    ]
}

fn arb_mode() -> impl Strategy<Value = FilterMode> {
    prop_oneof![Just(FilterMode::Include), Just(FilterMode::Exclude)]
}

proptest! {
    #[test]
    fn test_exactly_one_query_kind(
        group in arb_addr(),
        sources in proptest::collection::vec(any::<u32>().prop_map(Ipv4Addr::from), 0..4),
        delay in any::<u32>(),
    ) {
        let query = MembershipQuery::new(group, delay).with_sources(sources);
        let kinds = [query.is_general_query(), query.is_group_query(), query.is_source_query()];
        prop_assert_eq!(kinds.iter().filter(|k| **k).count(), 1);
    }

    #[test]
    fn test_listed_sources_are_included_or_excluded(
        mode in arb_mode(),
        sources in proptest::collection::btree_set(any::<u32>().prop_map(Ipv4Addr::from), 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let listed = **pick.get(&sources.iter().collect::<Vec<_>>());
        let filter = SourceFilter::with_state(Ipv4Addr::new(232, 1, 1, 1), mode, sources.iter().copied());
        prop_assert_ne!(filter.is_included(&listed), filter.is_excluded(&listed));
        prop_assert_eq!(filter.is_filtered(&listed), mode == FilterMode::Exclude);
    }

    #[test]
    fn test_empty_filter_wildcards(mode in arb_mode(), source in any::<u32>().prop_map(Ipv4Addr::from)) {
        let filter = SourceFilter::with_state(Ipv4Addr::new(232, 1, 1, 1), mode, []);
        match mode {
            FilterMode::Include => {
                prop_assert!(filter.is_excluded(&source));
                prop_assert!(!filter.is_included(&source));
                prop_assert!(filter.is_filtered(&source));
            }
            FilterMode::Exclude => {
                prop_assert!(filter.is_included(&source));
                prop_assert!(!filter.is_excluded(&source));
                prop_assert!(!filter.is_filtered(&source));
            }
        }
    }

    /// Encoding never rounds up, and exactly representable values survive.
    #[test]
    fn test_exp8_rounds_down(value in 0u32..=EXP8_MAX) {
        let decoded = decode_exp8(encode_exp8(value));
        prop_assert!(decoded <= value);
        prop_assert_eq!(encode_exp8(decoded), encode_exp8(value));
    }

    #[test]
    fn test_exp16_rounds_down(value in 0u32..=(0x1fff << 10)) {
        let decoded = decode_exp16(encode_exp16(value));
        prop_assert!(decoded <= value);
        prop_assert_eq!(encode_exp16(decoded), encode_exp16(value));
    }
}
