//! Scenario space properties:
//! 1. Restartable: two walks over the same inputs agree element for element
//! 2. Exact product: a full walk yields `len()` distinct scenarios
//! 3. Fixed dimensions never change across the walk
//! 4. Truncation is reported exactly when the limit is below the space size

use std::collections::HashSet;

use caprobe_analyze::generator::ScenarioSpace;
use caprobe_contracts::scenario::{Dimension, Scenario, Target};
use proptest::prelude::*;

/// A base scenario with a random subset of dimensions fixed to random values.
fn base() -> impl Strategy<Value = Scenario> {
    prop::collection::vec((any::<bool>(), 0usize..5), Dimension::CANONICAL.len()).prop_map(|picks| {
        let mut s = Scenario::new(Target::Resource("All".to_string()));
        for (dim, (fixed, value)) in Dimension::CANONICAL.into_iter().zip(picks) {
            if fixed {
                let _ = s.set_domain_value(dim, value % dim.domain_size());
            }
        }
        s
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_walk_is_restartable(b in base(), limit in 1u64..300) {
        let space = ScenarioSpace::new(b);
        let first: Vec<_> = space.bounded(limit).collect();
        let second: Vec<_> = space.bounded(limit).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_full_walk_is_exact_product(b in base()) {
        let space = ScenarioSpace::new(b)
            .holding([Dimension::DeviceCompliant, Dimension::DeviceHybridJoined]);
        prop_assume!(space.len() <= 2_000);
        let all: Vec<Scenario> = space.bounded(u64::MAX).map(|(_, s)| s).collect();
        prop_assert_eq!(all.len() as u64, space.len());
        let unique: HashSet<&Scenario> = all.iter().collect();
        prop_assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn prop_fixed_dimensions_stay_fixed(b in base(), limit in 1u64..200) {
        let space = ScenarioSpace::new(b.clone());
        for (_, s) in space.bounded(limit) {
            for dim in Dimension::CANONICAL {
                if b.is_specified(dim) {
                    prop_assert_eq!(s.value_label(dim), b.value_label(dim));
                } else {
                    prop_assert!(s.is_specified(dim));
                }
            }
        }
    }

    #[test]
    fn prop_truncation_flag(b in base(), limit in 1u64..20_000) {
        let space = ScenarioSpace::new(b);
        prop_assert_eq!(space.bounded(limit).is_truncated(), limit < space.len());
    }
}
