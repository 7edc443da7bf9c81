//! What-if presentation: verdicts bucketed by how they apply.

use std::fmt;

use serde::Serialize;

use caprobe_contracts::{
    policy::{GrantControl, GrantOperator, PolicyState},
    scenario::{Dimension, Scenario},
    verdict::{Applicability, Requirement, Verdict},
};
use caprobe_core::evaluator::WhatIfReport;

/// One verdict as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyView<'a> {
    pub policy_id: &'a str,
    pub policy_name: &'a str,
    pub state: PolicyState,
    pub applicability: Applicability,
    pub controls: &'a [GrantControl],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<GrantOperator>,
    pub reason: &'a str,
    #[serde(skip_serializing_if = "crate::is_empty")]
    pub blockers: &'a [String],
    #[serde(skip_serializing_if = "crate::is_empty")]
    pub depends_on: &'a [Dimension],
    #[serde(skip_serializing_if = "crate::is_empty")]
    pub session_controls: &'a [String],
    #[serde(skip_serializing_if = "crate::is_empty")]
    pub warnings: &'a [String],
}

impl<'a> From<&'a Verdict> for PolicyView<'a> {
    fn from(v: &'a Verdict) -> Self {
        Self {
            policy_id: &v.policy_id,
            policy_name: &v.display_name,
            state: v.state,
            applicability: v.applicability,
            controls: v.grant.as_ref().map_or(&[][..], |g| g.controls.as_slice()),
            operator: v.grant.as_ref().map(|g| g.operator),
            reason: &v.reason,
            blockers: &v.blockers,
            depends_on: &v.pending_signals,
            session_controls: &v.session_controls,
            warnings: &v.warnings,
        }
    }
}

/// A what-if report split into the buckets a reader cares about.
///
/// In strict mode the signal-dependent bucket is left empty so only
/// policies that apply no matter what the unknown signals are remain.
#[derive(Debug, Clone, Serialize)]
pub struct WhatIfView<'a> {
    pub user: &'a str,
    pub scenario: &'a Scenario,
    pub strict: bool,
    pub requirement: &'a Requirement,
    pub applied_definitive: Vec<PolicyView<'a>>,
    pub applied_signal_dependent: Vec<PolicyView<'a>>,
    pub excluded: Vec<PolicyView<'a>>,
    pub total_policies: usize,
    pub applied_count: usize,
    pub definitive_count: usize,
    pub signal_dependent_count: usize,
    pub excluded_count: usize,
}

impl<'a> WhatIfView<'a> {
    pub fn new(report: &'a WhatIfReport, strict: bool) -> Self {
        let bucket = move |a: Applicability| -> Vec<PolicyView<'a>> {
            report
                .verdicts
                .iter()
                .filter(|v| v.applicability == a)
                .map(PolicyView::from)
                .collect()
        };
        let applied_definitive = bucket(Applicability::AppliesDefinitive);
        let applied_signal_dependent = if strict {
            Vec::new()
        } else {
            bucket(Applicability::AppliesSignalDependent)
        };
        let excluded = bucket(Applicability::Excluded);

        Self {
            user: &report.user,
            scenario: &report.scenario,
            strict,
            requirement: &report.requirement,
            total_policies: report.verdicts.len(),
            applied_count: applied_definitive.len() + applied_signal_dependent.len(),
            definitive_count: applied_definitive.len(),
            signal_dependent_count: applied_signal_dependent.len(),
            excluded_count: excluded.len(),
            applied_definitive,
            applied_signal_dependent,
            excluded,
        }
    }
}

impl fmt::Display for WhatIfView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "User:        {}", self.user)?;
        writeln!(f, "Scenario:    {}", self.scenario)?;
        writeln!(f, "Requirement: {}", describe_requirement(self.requirement))?;

        section(f, "Applied (definitive)", &self.applied_definitive)?;
        if !self.strict {
            section(f, "Applied (signal-dependent)", &self.applied_signal_dependent)?;
        }
        section(f, "Excluded", &self.excluded)?;

        writeln!(
            f,
            "{} policies evaluated: {} definitive, {} signal-dependent, {} excluded",
            self.total_policies,
            self.definitive_count,
            self.signal_dependent_count,
            self.excluded_count
        )
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str, policies: &[PolicyView<'_>]) -> fmt::Result {
    writeln!(f, "\n=== {title} ===\n")?;
    if policies.is_empty() {
        return writeln!(f, "(none)\n");
    }
    for p in policies {
        writeln!(f, "- {} ({})", p.policy_name, p.policy_id)?;
        writeln!(f, "  State:      {}", p.state.as_str())?;
        if !p.controls.is_empty() {
            let op = p.operator.unwrap_or(GrantOperator::Or);
            writeln!(f, "  Controls:   {}", join_controls(p.controls, op))?;
        }
        writeln!(f, "  Reason:     {}", p.reason)?;
        if !p.depends_on.is_empty() {
            let dims: Vec<&str> = p.depends_on.iter().map(|d| d.name()).collect();
            writeln!(f, "  Depends on: {}", dims.join(", "))?;
        }
        for b in p.blockers {
            writeln!(f, "  Blocked:    {b}")?;
        }
        if !p.session_controls.is_empty() {
            writeln!(f, "  Session:    {}", p.session_controls.join(", "))?;
        }
        for w in p.warnings {
            writeln!(f, "  Warning:    {w}")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

/// One-line rendering of a net requirement, e.g.
/// `REQUIRE mfa AND (compliantDevice OR domainJoinedDevice)`.
pub fn describe_requirement(requirement: &Requirement) -> String {
    match requirement {
        Requirement::Allow => "ALLOW (no enforced control)".to_string(),
        Requirement::Block { policy_ids } => format!("BLOCK (by {})", policy_ids.join(", ")),
        Requirement::Require { clauses } => {
            let parts: Vec<String> = clauses
                .iter()
                .map(|c| {
                    let joined = join_controls(&c.controls, c.operator);
                    if c.controls.len() > 1 && clauses.len() > 1 {
                        format!("({joined})")
                    } else {
                        joined
                    }
                })
                .collect();
            format!("REQUIRE {}", parts.join(" AND "))
        }
    }
}

fn join_controls(controls: &[GrantControl], operator: GrantOperator) -> String {
    let sep = match operator {
        GrantOperator::And => " AND ",
        GrantOperator::Or => " OR ",
    };
    controls
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}
