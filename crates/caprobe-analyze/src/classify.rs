//! Scenario classification.
//!
//! Priority, first hit wins:
//!
//! 1. `Enforced`: an enabled policy applies definitively with a real control.
//! 2. `GapTrustedLocationBypass`: the sign-in is from a trusted location and
//!    the configured rule finds a control the trusted flag switched off.
//! 3. `GapNoPolicy`: no applying policy carries a real control.
//! 4. `GapReportOnly`: every applying, controlling policy is report-only.
//! 5. `SignalDependentOnly`: what remains are enabled policies that apply
//!    only for some values of unspecified signals.

use caprobe_contracts::{
    analysis::{Classification, PolicySummary},
    identity::Identity,
    policy::{LocationRef, Policy, PolicyState},
    scenario::Scenario,
    verdict::{Applicability, Verdict},
};
use caprobe_core::evaluator::{evaluate, Evaluator};

use crate::config::TrustedLocationRule;

/// The classification of one scenario plus the policies behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub classification: Classification,
    pub reason: String,
    pub definitive: Vec<PolicySummary>,
    pub signal_dependent: Vec<PolicySummary>,
}

/// Classifies scenarios for one identity against one catalog.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    evaluator: Evaluator<'a>,
    identity: &'a Identity,
    rule: TrustedLocationRule,
}

impl<'a> Classifier<'a> {
    pub fn new(evaluator: Evaluator<'a>, identity: &'a Identity, rule: TrustedLocationRule) -> Self {
        Self {
            evaluator,
            identity,
            rule,
        }
    }

    pub fn classify(&self, scenario: &Scenario) -> Classified {
        let verdicts = self.evaluator.evaluate_all(self.identity, scenario);

        let definitive: Vec<PolicySummary> = verdicts
            .iter()
            .filter(|v| v.applicability == Applicability::AppliesDefinitive)
            .map(PolicySummary::from)
            .collect();
        let signal_dependent: Vec<PolicySummary> = verdicts
            .iter()
            .filter(|v| v.applicability == Applicability::AppliesSignalDependent)
            .map(PolicySummary::from)
            .collect();
        let done = |classification, reason: String| Classified {
            classification,
            reason,
            definitive: definitive.clone(),
            signal_dependent: signal_dependent.clone(),
        };

        let enforcing: Vec<&Verdict> = verdicts.iter().filter(|v| v.enforces()).collect();
        if !enforcing.is_empty() {
            return done(
                Classification::Enforced,
                format!("Enforced by: {}", names(&enforcing)),
            );
        }

        if scenario.trusted_location == Some(true) {
            if let Some(reason) = self.trusted_bypass(scenario) {
                return done(Classification::GapTrustedLocationBypass, reason);
            }
        }

        let controlling: Vec<&Verdict> = verdicts.iter().filter(|v| v.is_controlling()).collect();
        if controlling.is_empty() {
            return done(
                Classification::GapNoPolicy,
                "No policy applies with an MFA, compliance or block control".to_string(),
            );
        }
        if controlling.iter().all(|v| v.is_report_only()) {
            return done(
                Classification::GapReportOnly,
                format!("Only report-only policies apply: {}", names(&controlling)),
            );
        }

        let pending: Vec<&Verdict> = controlling
            .iter()
            .copied()
            .filter(|v| v.state == PolicyState::Enabled)
            .collect();
        let mut signals: Vec<String> = pending
            .iter()
            .flat_map(|v| v.pending_signals.iter().map(|d| d.to_string()))
            .collect();
        signals.sort();
        signals.dedup();
        done(
            Classification::SignalDependentOnly,
            format!(
                "Enforcement depends on unspecified signals ({}): {}",
                signals.join(", "),
                names(&pending)
            ),
        )
    }

    /// Explain a trusted-location bypass, if the configured rule finds one.
    fn trusted_bypass(&self, scenario: &Scenario) -> Option<String> {
        if self.rule == TrustedLocationRule::AnyTrusted {
            return Some("No enforcement when signing in from a trusted location".to_string());
        }

        let untrusted = Scenario {
            trusted_location: Some(false),
            ..scenario.clone()
        };
        let flipped: Vec<Verdict> = match self.rule {
            TrustedLocationRule::ExplicitExclusion => self
                .evaluator
                .catalog()
                .active()
                .filter(|p| excludes_trusted(p))
                .map(|p| evaluate(p, self.identity, &untrusted))
                .filter(Verdict::enforces)
                .collect(),
            _ => self
                .evaluator
                .evaluate_all(self.identity, &untrusted)
                .into_iter()
                .filter(Verdict::enforces)
                .collect(),
        };
        if flipped.is_empty() {
            return None;
        }
        let refs: Vec<&Verdict> = flipped.iter().collect();
        Some(format!(
            "Trusted location switches off: {}",
            names(&refs)
        ))
    }
}

fn excludes_trusted(policy: &Policy) -> bool {
    policy.state == PolicyState::Enabled
        && policy
            .conditions
            .locations
            .as_ref()
            .is_some_and(|l| l.exclude.contains(&LocationRef::AllTrusted))
}

fn names(verdicts: &[&Verdict]) -> String {
    verdicts
        .iter()
        .map(|v| v.display_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
