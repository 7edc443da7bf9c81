//! Per-policy verdicts and the aggregated access requirement.
//!
//! Verdicts are derived values: they exist for the duration of one
//! evaluation call and are never persisted.

use serde::{Deserialize, Serialize};

use crate::policy::{GrantControl, GrantControls, GrantOperator, PolicyState};
use crate::scenario::Dimension;

// ── Scope ────────────────────────────────────────────────────────────────────

/// Which part of an assignment matched the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMatch {
    AllUsers,
    User,
    Groups(Vec<String>),
    Roles(Vec<String>),
    GuestsOrExternalUsers,
}

/// Result of resolving a policy's assignment against one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Targeted(ScopeMatch),
    Excluded(ScopeMatch),
    NotTargeted,
}

impl Scope {
    pub fn is_targeted(&self) -> bool {
        matches!(self, Scope::Targeted(_))
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Scope::Excluded(_))
    }

    /// Human-readable explanation, e.g. "Excluded: user in excluded group(s): g1".
    pub fn reason(&self) -> String {
        match self {
            Scope::Targeted(via) => format!("Included: {}", describe(via, "targeted")),
            Scope::Excluded(via) => format!("Excluded: {}", describe(via, "excluded")),
            Scope::NotTargeted => {
                "Not included: user/group/role did not match any include rules".to_string()
            }
        }
    }
}

fn describe(via: &ScopeMatch, side: &str) -> String {
    match via {
        ScopeMatch::AllUsers => "All users".to_string(),
        ScopeMatch::User => format!("user explicitly {side}"),
        ScopeMatch::Groups(ids) => format!("user in {side} group(s): {}", abbreviate(ids)),
        ScopeMatch::Roles(ids) => format!("user has {side} role(s): {}", abbreviate(ids)),
        ScopeMatch::GuestsOrExternalUsers => "guest or external user".to_string(),
    }
}

fn abbreviate(ids: &[String]) -> String {
    let shown = ids.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    if ids.len() > 3 {
        format!("{shown}, ...")
    } else {
        shown
    }
}

// ── Verdict ──────────────────────────────────────────────────────────────────

/// Whether a policy applies to a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// Applies regardless of any unspecified signal.
    AppliesDefinitive,
    /// Applies only if unspecified signals take particular values.
    AppliesSignalDependent,
    /// The identity is excluded by the assignment.
    Excluded,
    DoesNotApply,
}

impl Applicability {
    pub fn applies(self) -> bool {
        matches!(
            self,
            Applicability::AppliesDefinitive | Applicability::AppliesSignalDependent
        )
    }
}

/// The verdict of one policy for one identity and scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub policy_id: String,
    pub display_name: String,
    pub state: PolicyState,
    pub applicability: Applicability,
    /// Targeting explanation from scope resolution.
    pub reason: String,
    /// Condition dimensions that definitively did not match.
    pub blockers: Vec<String>,
    /// Dimensions whose unspecified value left the verdict open.
    pub pending_signals: Vec<Dimension>,
    /// The policy's grant requirement, present only when it applies.
    pub grant: Option<GrantControls>,
    pub session_controls: Vec<String>,
    pub warnings: Vec<String>,
}

impl Verdict {
    pub fn is_report_only(&self) -> bool {
        self.state == PolicyState::ReportOnly
    }

    /// True when the policy applies with an enforcing control requirement.
    pub fn is_controlling(&self) -> bool {
        self.applicability.applies()
            && self.grant.as_ref().is_some_and(GrantControls::is_enforcing)
    }

    /// Applies definitively and is enabled, with any grant control at all.
    pub fn requires_controls(&self) -> bool {
        self.applicability == Applicability::AppliesDefinitive
            && self.state == PolicyState::Enabled
            && self.grant.as_ref().is_some_and(|g| !g.controls.is_empty())
    }

    /// Applies definitively, is enabled, and requires an enforcing control.
    pub fn enforces(&self) -> bool {
        self.applicability == Applicability::AppliesDefinitive
            && self.state == PolicyState::Enabled
            && self.is_controlling()
    }

    pub fn is_block(&self) -> bool {
        self.grant.as_ref().is_some_and(GrantControls::is_block)
    }
}

// ── Aggregated requirement ───────────────────────────────────────────────────

/// One applying policy's contribution to the net requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlClause {
    pub policy_id: String,
    pub operator: GrantOperator,
    pub controls: Vec<GrantControl>,
}

/// What a sign-in must satisfy across every definitively applying, enforced
/// policy. Clauses are ANDed together; each clause uses its own operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// No enforced policy demands anything.
    Allow,
    /// At least one enforced policy blocks access.
    Block { policy_ids: Vec<String> },
    Require { clauses: Vec<ControlClause> },
}
