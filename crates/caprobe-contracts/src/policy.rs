//! Normalized Conditional Access policy model.
//!
//! Raw policy documents are parsed once, at catalog-build time, into these
//! closed types. Every condition is optional: `None` means the policy does
//! not constrain that dimension, so every value matches.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::scenario::{AuthFlow, ClientApp, Platform, RiskLevel};

/// Lifecycle state of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    Enabled,
    Disabled,
    /// Evaluated and logged by the directory, never enforced.
    ReportOnly,
}

impl PolicyState {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyState::Enabled => "enabled",
            PolicyState::Disabled => "disabled",
            PolicyState::ReportOnly => "report-only",
        }
    }
}

// ── Assignment ───────────────────────────────────────────────────────────────

/// One side (include or exclude) of a user assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSet {
    /// The "All users" marker.
    pub all_users: bool,
    /// The guest / external users marker.
    pub guests_or_external: bool,
    pub users: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    /// Directory role object ids or role template ids.
    pub roles: BTreeSet<String>,
}

impl SubjectSet {
    pub fn is_empty(&self) -> bool {
        !self.all_users
            && !self.guests_or_external
            && self.users.is_empty()
            && self.groups.is_empty()
            && self.roles.is_empty()
    }
}

/// Who a policy targets. Exclusion always wins over inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub include: SubjectSet,
    pub exclude: SubjectSet,
}

// ── Set-valued conditions ────────────────────────────────────────────────────

/// The include side of an include/exclude condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    pub fn contains(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(value),
        }
    }
}

/// A condition of the form "included and not excluded".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeExclude<T: Ord> {
    pub include: Selection<T>,
    pub exclude: BTreeSet<T>,
}

impl<T: Ord> IncludeExclude<T> {
    pub fn new(include: Selection<T>, exclude: BTreeSet<T>) -> Self {
        Self { include, exclude }
    }

    /// True if `value` is in the include side and not in the exclude side.
    pub fn admits(&self, value: &T) -> bool {
        self.include.contains(value) && !self.exclude.contains(value)
    }

    /// True when the condition admits every possible value.
    pub fn is_universal(&self) -> bool {
        matches!(self.include, Selection::All) && self.exclude.is_empty()
    }
}

/// What a policy is scoped to on the resource side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCondition {
    /// Cloud apps / resources. `Selection::Only(∅)` is the "None" target.
    Apps(IncludeExclude<String>),
    /// User actions / authentication context class references.
    UserActions(BTreeSet<String>),
}

/// An entry in a location condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationRef {
    /// The "all trusted locations" pseudo-set.
    AllTrusted,
    /// A specific named location id.
    Named(String),
}

/// Whether a device filter selects matching devices in or out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Include,
    Exclude,
}

/// A device filter rule. The rule text is opaque; whether a device satisfies
/// it is a scenario signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub mode: FilterMode,
    pub rule: String,
}

/// Legacy device-state condition: the policy skips devices in these states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStateCondition {
    pub exclude_compliant: bool,
    pub exclude_hybrid_joined: bool,
}

/// All condition dimensions of a policy. `None` = unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub resource: Option<ResourceCondition>,
    pub platforms: Option<IncludeExclude<Platform>>,
    pub client_apps: Option<IncludeExclude<ClientApp>>,
    pub locations: Option<IncludeExclude<LocationRef>>,
    pub signin_risk: Option<BTreeSet<RiskLevel>>,
    pub user_risk: Option<BTreeSet<RiskLevel>>,
    pub auth_flows: Option<BTreeSet<AuthFlow>>,
    pub device_filter: Option<DeviceFilter>,
    pub device_states: Option<DeviceStateCondition>,
}

// ── Grant controls ───────────────────────────────────────────────────────────

/// A grant control a policy can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantControl {
    Block,
    Mfa,
    CompliantDevice,
    HybridJoinedDevice,
    ApprovedApp,
    CompliantApp,
    PasswordChange,
    AuthenticationStrength,
    TermsOfUse,
}

impl GrantControl {
    /// Parse a control name in either RoadRecon or Graph spelling.
    pub fn parse(name: &str) -> Option<Self> {
        let control = match name.trim().to_ascii_lowercase().as_str() {
            "block" => GrantControl::Block,
            "mfa" | "requiremfa" => GrantControl::Mfa,
            "requirecompliantdevice" | "compliantdevice" => GrantControl::CompliantDevice,
            "requiredomainjoineddevice"
            | "domainjoineddevice"
            | "requirehybridazureadjoineddevice" => GrantControl::HybridJoinedDevice,
            "requireapprovedapp" | "approvedapplication" => GrantControl::ApprovedApp,
            "requirecompliantapp" | "compliantapplication" => GrantControl::CompliantApp,
            "requirepasswordchange" | "passwordchange" => GrantControl::PasswordChange,
            "authstrength" | "authenticationstrength" => GrantControl::AuthenticationStrength,
            "termsofuse" => GrantControl::TermsOfUse,
            _ => return None,
        };
        Some(control)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GrantControl::Block => "block",
            GrantControl::Mfa => "mfa",
            GrantControl::CompliantDevice => "compliantDevice",
            GrantControl::HybridJoinedDevice => "domainJoinedDevice",
            GrantControl::ApprovedApp => "approvedApplication",
            GrantControl::CompliantApp => "compliantApplication",
            GrantControl::PasswordChange => "passwordChange",
            GrantControl::AuthenticationStrength => "authenticationStrength",
            GrantControl::TermsOfUse => "termsOfUse",
        }
    }

    /// Controls that count as enforcement on their own: block, MFA and the
    /// device or app compliance checks. Terms of use and password change
    /// do not.
    pub fn is_strong(self) -> bool {
        matches!(
            self,
            GrantControl::Block
                | GrantControl::Mfa
                | GrantControl::AuthenticationStrength
                | GrantControl::CompliantDevice
                | GrantControl::HybridJoinedDevice
                | GrantControl::ApprovedApp
                | GrantControl::CompliantApp
        )
    }
}

/// How a policy combines its own grant controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOperator {
    And,
    Or,
}

/// The grant side of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantControls {
    pub operator: GrantOperator,
    pub controls: Vec<GrantControl>,
}

impl GrantControls {
    pub fn none() -> Self {
        Self {
            operator: GrantOperator::Or,
            controls: Vec::new(),
        }
    }

    /// Block is exclusive in Conditional Access: if present, access is denied.
    pub fn is_block(&self) -> bool {
        self.controls.contains(&GrantControl::Block)
    }

    /// True when the grant requires MFA, compliance or block.
    ///
    /// An `Or` set enforces only when every alternative is strong, since the
    /// user may satisfy it with the weakest one. An `And` set enforces when
    /// any member is strong.
    pub fn is_enforcing(&self) -> bool {
        if self.is_block() {
            return true;
        }
        match self.operator {
            GrantOperator::Or => {
                !self.controls.is_empty() && self.controls.iter().all(|c| c.is_strong())
            }
            GrantOperator::And => self.controls.iter().any(|c| c.is_strong()),
        }
    }
}

impl Default for GrantControls {
    fn default() -> Self {
        Self::none()
    }
}

// ── Policy ───────────────────────────────────────────────────────────────────

/// One Conditional Access policy after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub display_name: String,
    pub state: PolicyState,
    pub assignment: Assignment,
    pub conditions: Conditions,
    pub grant: GrantControls,
    /// Session controls, kept for display only; they never gate access.
    pub session_controls: Vec<String>,
    /// Problems found while normalizing the raw document.
    pub warnings: Vec<String>,
}

impl Policy {
    /// An enabled policy targeting nobody, with no conditions or controls.
    /// Loaders and tests fill in the rest.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            state: PolicyState::Enabled,
            assignment: Assignment::default(),
            conditions: Conditions::default(),
            grant: GrantControls::none(),
            session_controls: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
