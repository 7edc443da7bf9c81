//! Gap analysis results.
//!
//! An `AnalysisResult` is owned by one analyze invocation and handed to the
//! caller. It carries no timestamps so identical inputs produce identical
//! serialized output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::policy::{GrantControl, PolicyState};
use crate::scenario::{Scenario, Target};
use crate::verdict::Verdict;

/// How a single scenario is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// An enabled policy definitively enforces a control.
    Enforced,
    /// Nothing applies with a real control: access is unconditional.
    GapNoPolicy,
    /// Only report-only policies would control this sign-in.
    GapReportOnly,
    /// A trusted location switches off a policy that would otherwise apply.
    GapTrustedLocationBypass,
    /// Only signal-dependent verdicts apply; reflects missing signal data.
    SignalDependentOnly,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Enforced,
        Classification::GapNoPolicy,
        Classification::GapReportOnly,
        Classification::GapTrustedLocationBypass,
        Classification::SignalDependentOnly,
    ];

    /// True for the three real gap kinds.
    pub fn is_gap(self) -> bool {
        matches!(
            self,
            Classification::GapNoPolicy
                | Classification::GapReportOnly
                | Classification::GapTrustedLocationBypass
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Enforced => "ENFORCED",
            Classification::GapNoPolicy => "GAP_NO_POLICY",
            Classification::GapReportOnly => "GAP_REPORT_ONLY",
            Classification::GapTrustedLocationBypass => "GAP_TRUSTED_LOCATION_BYPASS",
            Classification::SignalDependentOnly => "SIGNAL_DEPENDENT_ONLY",
        }
    }
}

/// A compact view of a policy verdict, retained inside findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub policy_id: String,
    pub display_name: String,
    pub state: PolicyState,
    pub controls: Vec<GrantControl>,
    pub reason: String,
}

impl From<&Verdict> for PolicySummary {
    fn from(v: &Verdict) -> Self {
        Self {
            policy_id: v.policy_id.clone(),
            display_name: v.display_name.clone(),
            state: v.state,
            controls: v
                .grant
                .as_ref()
                .map(|g| g.controls.clone())
                .unwrap_or_default(),
            reason: v.reason.clone(),
        }
    }
}

/// One classified scenario retained in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Position of the scenario in canonical enumeration order.
    pub index: u64,
    pub scenario: Scenario,
    pub classification: Classification,
    pub reason: String,
    pub definitive: Vec<PolicySummary>,
    pub signal_dependent: Vec<PolicySummary>,
}

/// Aggregate outcome of one analyze run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub user: String,
    pub target: Target,
    /// Size of the full scenario space before truncation.
    pub scenarios_total: u64,
    pub scenarios_evaluated: u64,
    pub max_scenarios: u64,
    /// True when `max_scenarios` cut the space short; coverage is partial.
    pub truncated: bool,
    /// Scenario count per classification, every classification present.
    pub counts: BTreeMap<Classification, u64>,
    /// Real gaps, sorted by scenario index.
    pub gaps: Vec<Finding>,
    /// Signal-dependent-only scenarios, sorted by scenario index.
    pub signal_dependent: Vec<Finding>,
    /// Normalization warnings of every policy involved, deduplicated.
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    pub fn count(&self, classification: Classification) -> u64 {
        self.counts.get(&classification).copied().unwrap_or(0)
    }
}
