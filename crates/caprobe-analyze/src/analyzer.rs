//! The gap analyzer: classify every scenario of a bounded space in parallel.
//!
//! Scenario evaluations share nothing but the read-only catalog and identity,
//! so the index range is split across a rayon pool. Findings are sorted by
//! scenario index afterwards; completion order never leaks into the result.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use caprobe_contracts::{
    analysis::{AnalysisResult, Classification, Finding},
    error::{CaError, CaResult},
    identity::Identity,
    scenario::{Dimension, Scenario},
};
use caprobe_core::{catalog::PolicyCatalog, evaluator::Evaluator};

use crate::classify::Classifier;
use crate::config::AnalyzerConfig;
use crate::generator::ScenarioSpace;

/// Runs gap analyses against one catalog.
#[derive(Debug, Clone)]
pub struct GapAnalyzer<'a> {
    catalog: &'a PolicyCatalog,
    config: AnalyzerConfig,
}

impl<'a> GapAnalyzer<'a> {
    pub fn new(catalog: &'a PolicyCatalog, config: AnalyzerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze every scenario reachable from `base`.
    ///
    /// Dimensions `base` specifies stay fixed, dimensions in `hold` stay
    /// unspecified, and all others are enumerated. At most
    /// `config.max_scenarios` scenarios are evaluated; `truncated` reports
    /// whether that cut the space short.
    ///
    /// # Errors
    ///
    /// - `CaError::InvalidScenario` for a blank target
    /// - `CaError::ConfigError` for a zero scenario limit
    /// - `CaError::Analysis` if the worker pool cannot be built
    pub fn analyze(
        &self,
        identity: &Identity,
        base: &Scenario,
        hold: &[Dimension],
    ) -> CaResult<AnalysisResult> {
        base.validate()?;
        self.config.validate()?;

        let space = ScenarioSpace::new(base.clone()).holding(hold.iter().copied());
        let total = space.len();
        let evaluated = total.min(self.config.max_scenarios);
        let truncated = evaluated < total;

        info!(
            user = identity.upn(),
            target = %base.target,
            free = space.free_dimensions().len(),
            total,
            evaluated,
            rule = %self.config.trusted_location_rule,
            "gap analysis starting"
        );
        if truncated {
            warn!(
                total,
                max_scenarios = self.config.max_scenarios,
                "scenario space truncated; coverage is partial"
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| CaError::Analysis {
                reason: format!("failed to build worker pool: {e}"),
            })?;

        let classifier = Classifier::new(
            Evaluator::new(self.catalog),
            identity,
            self.config.trusted_location_rule,
        );

        let classified: Vec<(Classification, Option<Finding>)> = pool.install(|| {
            (0..evaluated)
                .into_par_iter()
                .map(|index| {
                    let scenario = space.scenario_at(index)?;
                    let c = classifier.classify(&scenario);
                    let finding = (c.classification != Classification::Enforced).then(|| Finding {
                        index,
                        scenario,
                        classification: c.classification,
                        reason: c.reason,
                        definitive: c.definitive,
                        signal_dependent: c.signal_dependent,
                    });
                    Ok((c.classification, finding))
                })
                .collect::<CaResult<Vec<_>>>()
        })?;

        let mut counts: BTreeMap<Classification, u64> =
            Classification::ALL.iter().map(|c| (*c, 0)).collect();
        let mut gaps = Vec::new();
        let mut signal_dependent = Vec::new();
        for (classification, finding) in classified {
            *counts.entry(classification).or_insert(0) += 1;
            match finding {
                Some(f) if classification.is_gap() => gaps.push(f),
                Some(f) => signal_dependent.push(f),
                None => {}
            }
        }
        gaps.sort_by_key(|f| f.index);
        signal_dependent.sort_by_key(|f| f.index);

        let warnings: BTreeSet<String> = self
            .catalog
            .all()
            .iter()
            .flat_map(|p| {
                p.warnings
                    .iter()
                    .map(move |w| format!("{}: {w}", p.display_name))
            })
            .collect();

        debug!(?counts, gaps = gaps.len(), "gap analysis finished");

        Ok(AnalysisResult {
            user: identity.upn().to_string(),
            target: base.target.clone(),
            scenarios_total: total,
            scenarios_evaluated: evaluated,
            max_scenarios: self.config.max_scenarios,
            truncated,
            counts,
            gaps,
            signal_dependent,
            warnings: warnings.into_iter().collect(),
        })
    }
}
