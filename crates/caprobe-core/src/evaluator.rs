//! The policy evaluator: scope plus conditions, per policy and in aggregate.
//!
//! Evaluation is a pure function of (policy, identity, scenario). Nothing here
//! touches storage, so the analyzer can fan evaluation out across threads.

use serde::Serialize;
use tracing::debug;

use caprobe_contracts::{
    error::CaResult,
    identity::Identity,
    logic::Tri,
    policy::{GrantControl, Policy, PolicyState, ResourceCondition},
    scenario::Scenario,
    verdict::{Applicability, ControlClause, Requirement, Scope, Verdict},
};

use crate::catalog::PolicyCatalog;
use crate::conditions::match_conditions;
use crate::scope::resolve_scope;

/// Evaluate one policy for one identity and scenario.
///
/// Disabled policies never apply. An excluded identity yields `Excluded`
/// whatever the conditions say.
pub fn evaluate(policy: &Policy, identity: &Identity, scenario: &Scenario) -> Verdict {
    let mut verdict = Verdict {
        policy_id: policy.id.clone(),
        display_name: policy.display_name.clone(),
        state: policy.state,
        applicability: Applicability::DoesNotApply,
        reason: String::new(),
        blockers: Vec::new(),
        pending_signals: Vec::new(),
        grant: None,
        session_controls: policy.session_controls.clone(),
        warnings: policy.warnings.clone(),
    };

    if policy.state == PolicyState::Disabled {
        verdict.reason = "Policy is disabled".to_string();
        return verdict;
    }

    let scope = resolve_scope(&policy.assignment, identity);
    verdict.reason = scope.reason();
    match scope {
        Scope::Excluded(_) => {
            verdict.applicability = Applicability::Excluded;
            return verdict;
        }
        Scope::NotTargeted => return verdict,
        Scope::Targeted(_) => {}
    }

    let report = match_conditions(&policy.conditions, scenario);
    verdict.blockers = report.blockers();
    verdict.applicability = match report.result() {
        Tri::Match => Applicability::AppliesDefinitive,
        Tri::Unknown => {
            verdict.pending_signals = report.pending_signals();
            Applicability::AppliesSignalDependent
        }
        Tri::NoMatch => Applicability::DoesNotApply,
    };
    if verdict.applicability.applies() {
        verdict.grant = Some(policy.grant.clone());
    }
    verdict
}

/// Combine verdicts into the net access requirement.
///
/// Only enabled policies that apply definitively with some grant control
/// count, weak ones such as terms of use included. Any block wins; otherwise
/// each policy contributes one clause and the clauses are ANDed.
pub fn net_requirement(verdicts: &[Verdict]) -> Requirement {
    let required: Vec<&Verdict> = verdicts.iter().filter(|v| v.requires_controls()).collect();

    let blocking: Vec<String> = required
        .iter()
        .filter(|v| v.is_block())
        .map(|v| v.policy_id.clone())
        .collect();
    if !blocking.is_empty() {
        return Requirement::Block {
            policy_ids: blocking,
        };
    }

    let clauses: Vec<ControlClause> = required
        .iter()
        .filter_map(|v| {
            v.grant.as_ref().map(|g| ControlClause {
                policy_id: v.policy_id.clone(),
                operator: g.operator,
                controls: g.controls.clone(),
            })
        })
        .collect();
    if clauses.is_empty() {
        Requirement::Allow
    } else {
        Requirement::Require { clauses }
    }
}

// ── What-if ──────────────────────────────────────────────────────────────────

/// Every verdict for one scenario plus the net requirement.
#[derive(Debug, Clone, Serialize)]
pub struct WhatIfReport {
    pub user: String,
    pub scenario: Scenario,
    /// One verdict per enabled or report-only policy, in catalog order.
    pub verdicts: Vec<Verdict>,
    pub requirement: Requirement,
}

// ── Policy listing ───────────────────────────────────────────────────────────

/// Which scoped policies `get_policies` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultsMode {
    /// Policies that target the identity.
    #[default]
    Applied,
    /// Policies that exclude the identity.
    Exclusions,
    /// Both.
    All,
}

/// Filters for `get_policies`.
#[derive(Debug, Clone, Default)]
pub struct PolicyQuery {
    pub results: ResultsMode,
    /// Keep only policies whose resource condition covers this app id.
    pub app: Option<String>,
    /// Also list disabled policies that would target the identity.
    pub include_disabled: bool,
}

/// A policy as it relates to one identity, without a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScopedPolicy {
    pub policy_id: String,
    pub display_name: String,
    pub state: PolicyState,
    pub scope: Scope,
    pub reason: String,
    pub controls: Vec<GrantControl>,
    pub session_controls: Vec<String>,
    pub warnings: Vec<String>,
}

impl ScopedPolicy {
    fn new(policy: &Policy, scope: Scope) -> Self {
        Self {
            policy_id: policy.id.clone(),
            display_name: policy.display_name.clone(),
            state: policy.state,
            reason: scope.reason(),
            scope,
            controls: policy.grant.controls.clone(),
            session_controls: policy.session_controls.clone(),
            warnings: policy.warnings.clone(),
        }
    }
}

/// Output of `get_policies`.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyListing {
    pub user: String,
    pub applied: Vec<ScopedPolicy>,
    pub excluded: Vec<ScopedPolicy>,
    /// Disabled policies targeting the identity; filled only on request.
    pub disabled: Vec<ScopedPolicy>,
}

// ── Evaluator ────────────────────────────────────────────────────────────────

/// Runs evaluations against a borrowed catalog.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    catalog: &'a PolicyCatalog,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalog: &'a PolicyCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a PolicyCatalog {
        self.catalog
    }

    /// Verdicts of every enabled and report-only policy, in catalog order.
    pub fn evaluate_all(&self, identity: &Identity, scenario: &Scenario) -> Vec<Verdict> {
        self.catalog
            .active()
            .map(|p| evaluate(p, identity, scenario))
            .collect()
    }

    /// Evaluate one fully described scenario.
    ///
    /// # Errors
    ///
    /// Returns `CaError::InvalidScenario` for a scenario whose target is blank.
    pub fn what_if(&self, identity: &Identity, scenario: &Scenario) -> CaResult<WhatIfReport> {
        scenario.validate()?;
        let verdicts = self.evaluate_all(identity, scenario);
        for v in &verdicts {
            debug!(
                policy_id = %v.policy_id,
                applicability = ?v.applicability,
                pending = v.pending_signals.len(),
                "policy evaluated"
            );
        }
        let requirement = net_requirement(&verdicts);
        debug!(user = identity.upn(), %scenario, ?requirement, "what-if complete");
        Ok(WhatIfReport {
            user: identity.upn().to_string(),
            scenario: scenario.clone(),
            verdicts,
            requirement,
        })
    }

    /// List the policies that target or exclude `identity`, scope only.
    pub fn get_policies(&self, identity: &Identity, query: &PolicyQuery) -> PolicyListing {
        let covers_app = |p: &Policy| match (&query.app, &p.conditions.resource) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(app), Some(ResourceCondition::Apps(apps))) => apps.admits(app),
            (Some(_), Some(ResourceCondition::UserActions(_))) => false,
        };

        let mut listing = PolicyListing {
            user: identity.upn().to_string(),
            applied: Vec::new(),
            excluded: Vec::new(),
            disabled: Vec::new(),
        };

        for policy in self.catalog.all().iter().filter(|p| covers_app(p)) {
            let scope = resolve_scope(&policy.assignment, identity);
            if policy.state == PolicyState::Disabled {
                if query.include_disabled && scope.is_targeted() {
                    listing.disabled.push(ScopedPolicy::new(policy, scope));
                }
                continue;
            }
            match (&scope, query.results) {
                (Scope::Targeted(_), ResultsMode::Applied | ResultsMode::All) => {
                    listing.applied.push(ScopedPolicy::new(policy, scope));
                }
                (Scope::Excluded(_), ResultsMode::Exclusions | ResultsMode::All) => {
                    listing.excluded.push(ScopedPolicy::new(policy, scope));
                }
                _ => {}
            }
        }

        debug!(
            user = identity.upn(),
            applied = listing.applied.len(),
            excluded = listing.excluded.len(),
            disabled = listing.disabled.len(),
            "policy listing built"
        );
        listing
    }
}
