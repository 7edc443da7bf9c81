//! The scenario space: a mixed-radix Cartesian product over free dimensions.
//!
//! Dimensions the base scenario already specifies are fixed. Dimensions the
//! caller holds stay unspecified. Every other dimension is free and ranges
//! over its whole domain. Free dimensions are ordered canonically with the
//! most significant varying slowest, so index `i` always names the same
//! scenario for the same inputs and the space can be addressed directly
//! instead of walked.

use std::collections::BTreeSet;

use caprobe_contracts::{
    error::{CaError, CaResult},
    scenario::{Dimension, Scenario},
};

/// All scenarios reachable from one base scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSpace {
    base: Scenario,
    free: Vec<Dimension>,
}

impl ScenarioSpace {
    /// Every dimension `base` leaves unspecified is free.
    pub fn new(base: Scenario) -> Self {
        let free = Dimension::CANONICAL
            .into_iter()
            .filter(|d| !base.is_specified(*d))
            .collect();
        Self { base, free }
    }

    /// Keep `dims` unspecified instead of enumerating them.
    pub fn holding<I: IntoIterator<Item = Dimension>>(mut self, dims: I) -> Self {
        let held: BTreeSet<Dimension> = dims.into_iter().collect();
        self.free.retain(|d| !held.contains(d));
        self
    }

    pub fn base(&self) -> &Scenario {
        &self.base
    }

    pub fn free_dimensions(&self) -> &[Dimension] {
        &self.free
    }

    /// Number of scenarios in the full product (1 when nothing is free).
    pub fn len(&self) -> u64 {
        self.free
            .iter()
            .fold(1u64, |acc, d| acc.saturating_mul(d.domain_size() as u64))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scenario at position `index` in canonical order.
    ///
    /// # Errors
    ///
    /// Returns `CaError::InvalidScenario` if `index` is past the end.
    pub fn scenario_at(&self, index: u64) -> CaResult<Scenario> {
        if index >= self.len() {
            return Err(CaError::invalid_scenario(format!(
                "scenario index {index} outside a space of {}",
                self.len()
            )));
        }
        let mut scenario = self.base.clone();
        let mut rest = index;
        for dim in self.free.iter().rev() {
            let radix = dim.domain_size() as u64;
            scenario.set_domain_value(*dim, (rest % radix) as usize)?;
            rest /= radix;
        }
        Ok(scenario)
    }

    /// Lazily walk the first `limit` scenarios.
    pub fn bounded(&self, limit: u64) -> Bounded<'_> {
        Bounded {
            space: self,
            next: 0,
            end: self.len().min(limit),
        }
    }
}

/// A lazy walk over a prefix of the scenario space. Re-creating it from the
/// same space and limit yields the same sequence.
#[derive(Debug, Clone)]
pub struct Bounded<'a> {
    space: &'a ScenarioSpace,
    next: u64,
    end: u64,
}

impl Bounded<'_> {
    /// True when the limit cut the space short.
    pub fn is_truncated(&self) -> bool {
        self.end < self.space.len()
    }
}

impl Iterator for Bounded<'_> {
    type Item = (u64, Scenario);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        // `end <= len`, so every index in the walk resolves. Stop rather
        // than skip if that ever breaks.
        let scenario = self.space.scenario_at(index);
        debug_assert!(scenario.is_ok(), "scenario {index} failed to resolve: {scenario:?}");
        match scenario {
            Ok(s) => Some((index, s)),
            Err(_) => {
                self.next = self.end;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}
