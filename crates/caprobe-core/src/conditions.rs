//! Condition matching: one policy's conditions against one scenario.
//!
//! Each dimension answers with a three-valued `Tri`:
//!
//! - an absent constraint always answers `Match`
//! - a present constraint against an unspecified scenario value answers
//!   `Unknown`, never a guess
//! - otherwise the constraint is evaluated as "included and not excluded"
//!
//! The overall result is the three-valued AND of every dimension. Risk levels
//! are compared by set membership only.

use std::collections::BTreeSet;

use caprobe_contracts::{
    logic::Tri,
    policy::{
        Conditions, DeviceFilter, DeviceStateCondition, FilterMode, IncludeExclude, LocationRef,
        ResourceCondition, Selection,
    },
    scenario::{Dimension, Scenario, Target},
};

/// The condition families a policy can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    Resource,
    Platform,
    ClientApp,
    Location,
    SignInRisk,
    UserRisk,
    AuthFlow,
    DeviceFilter,
    DeviceState,
}

impl ConditionKind {
    pub fn label(self) -> &'static str {
        match self {
            ConditionKind::Resource => "Resource",
            ConditionKind::Platform => "Platform",
            ConditionKind::ClientApp => "Client app",
            ConditionKind::Location => "Location",
            ConditionKind::SignInRisk => "Sign-in risk",
            ConditionKind::UserRisk => "User risk",
            ConditionKind::AuthFlow => "Auth flow",
            ConditionKind::DeviceFilter => "Device filter",
            ConditionKind::DeviceState => "Device state",
        }
    }
}

/// How one condition family answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub kind: ConditionKind,
    pub result: Tri,
    pub reason: String,
    /// Scenario dimensions whose missing value made the answer `Unknown`.
    pub signals: Vec<Dimension>,
}

impl ConditionOutcome {
    fn new(kind: ConditionKind, result: Tri, reason: impl Into<String>) -> Self {
        Self {
            kind,
            result,
            reason: reason.into(),
            signals: Vec::new(),
        }
    }

    fn pending(kind: ConditionKind, signals: Vec<Dimension>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            result: Tri::Unknown,
            reason: reason.into(),
            signals,
        }
    }
}

/// All condition outcomes for one policy and scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionReport {
    pub outcomes: Vec<ConditionOutcome>,
}

impl ConditionReport {
    /// Three-valued AND over every outcome.
    pub fn result(&self) -> Tri {
        Tri::all(self.outcomes.iter().map(|o| o.result))
    }

    /// Reasons of the conditions that definitively failed.
    pub fn blockers(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_no_match())
            .map(|o| format!("{}: {}", o.kind.label(), o.reason))
            .collect()
    }

    /// Unspecified dimensions the verdict depends on, deduplicated and in
    /// canonical order.
    pub fn pending_signals(&self) -> Vec<Dimension> {
        let set: BTreeSet<Dimension> = self
            .outcomes
            .iter()
            .filter(|o| o.result.is_unknown())
            .flat_map(|o| o.signals.iter().copied())
            .collect();
        set.into_iter().collect()
    }
}

/// Match every condition of a policy against `scenario`.
pub fn match_conditions(conditions: &Conditions, scenario: &Scenario) -> ConditionReport {
    let outcomes = vec![
        match_resource(conditions.resource.as_ref(), &scenario.target),
        match_dimension(
            ConditionKind::Platform,
            Dimension::Platform,
            conditions.platforms.as_ref(),
            scenario.platform.as_ref(),
        ),
        match_dimension(
            ConditionKind::ClientApp,
            Dimension::ClientApp,
            conditions.client_apps.as_ref(),
            scenario.client_app.as_ref(),
        ),
        match_location(conditions.locations.as_ref(), scenario.trusted_location),
        match_levels(
            ConditionKind::SignInRisk,
            Dimension::SignInRisk,
            conditions.signin_risk.as_ref(),
            scenario.signin_risk.as_ref(),
        ),
        match_levels(
            ConditionKind::UserRisk,
            Dimension::UserRisk,
            conditions.user_risk.as_ref(),
            scenario.user_risk.as_ref(),
        ),
        match_levels(
            ConditionKind::AuthFlow,
            Dimension::AuthFlow,
            conditions.auth_flows.as_ref(),
            scenario.auth_flow.as_ref(),
        ),
        match_device_filter(conditions.device_filter.as_ref(), scenario.device_filter),
        match_device_state(
            conditions.device_states.as_ref(),
            scenario.device_compliant,
            scenario.device_hybrid_joined,
        ),
    ];
    ConditionReport { outcomes }
}

// ── Primitives ───────────────────────────────────────────────────────────────

/// Match an include/exclude constraint against an optional value.
pub fn match_set<T: Ord>(constraint: Option<&IncludeExclude<T>>, value: Option<&T>) -> Tri {
    match (constraint, value) {
        (None, _) => Tri::Match,
        (Some(_), None) => Tri::Unknown,
        (Some(c), Some(v)) => Tri::from_bool(c.admits(v)),
    }
}

/// Match an include-only set of levels against an optional value.
pub fn match_one_of<T: Ord>(constraint: Option<&BTreeSet<T>>, value: Option<&T>) -> Tri {
    match (constraint, value) {
        (None, _) => Tri::Match,
        (Some(_), None) => Tri::Unknown,
        (Some(set), Some(v)) => Tri::from_bool(set.contains(v)),
    }
}

// ── Per-dimension matchers ───────────────────────────────────────────────────

fn match_dimension<T: Ord + std::fmt::Debug>(
    kind: ConditionKind,
    dim: Dimension,
    constraint: Option<&IncludeExclude<T>>,
    value: Option<&T>,
) -> ConditionOutcome {
    let Some(c) = constraint else {
        return ConditionOutcome::new(kind, Tri::Match, "no condition");
    };
    let Some(v) = value else {
        return ConditionOutcome::pending(kind, vec![dim], format!("{dim} unspecified"));
    };
    let result = match_set(Some(c), Some(v));
    let reason = if c.exclude.contains(v) {
        format!("excluded value matched ({v:?})")
    } else if result.is_match() {
        format!("included value matched ({v:?})")
    } else {
        format!("value not included ({v:?})")
    };
    ConditionOutcome::new(kind, result, reason)
}

fn match_levels<T: Ord + std::fmt::Debug>(
    kind: ConditionKind,
    dim: Dimension,
    constraint: Option<&BTreeSet<T>>,
    value: Option<&T>,
) -> ConditionOutcome {
    let Some(set) = constraint else {
        return ConditionOutcome::new(kind, Tri::Match, "no condition");
    };
    let Some(v) = value else {
        return ConditionOutcome::pending(kind, vec![dim], format!("{dim} unspecified"));
    };
    let result = match_one_of(Some(set), Some(v));
    let reason = if result.is_match() {
        format!("{v:?} is a targeted level")
    } else {
        format!("{v:?} is not a targeted level")
    };
    ConditionOutcome::new(kind, result, reason)
}

/// Resource / user-action matching.
///
/// A policy targets either cloud apps or user actions. A scenario aimed at
/// the other family never matches; a policy with no resource condition
/// covers every cloud app but no user action.
pub fn match_resource(condition: Option<&ResourceCondition>, target: &Target) -> ConditionOutcome {
    let kind = ConditionKind::Resource;
    match (condition, target) {
        (None, Target::Resource(_)) => ConditionOutcome::new(kind, Tri::Match, "no condition"),
        (None, Target::Acr(_)) => ConditionOutcome::new(
            kind,
            Tri::NoMatch,
            "policy targets cloud apps, scenario is a user action",
        ),
        (Some(ResourceCondition::Apps(_)), Target::Acr(_)) => ConditionOutcome::new(
            kind,
            Tri::NoMatch,
            "policy targets cloud apps, scenario is a user action",
        ),
        (Some(ResourceCondition::UserActions(_)), Target::Resource(_)) => ConditionOutcome::new(
            kind,
            Tri::NoMatch,
            "policy targets user actions, scenario is a cloud app",
        ),
        (Some(ResourceCondition::Apps(apps)), Target::Resource(id)) => {
            if apps.exclude.contains(id) {
                ConditionOutcome::new(kind, Tri::NoMatch, format!("resource {id} is excluded"))
            } else {
                match &apps.include {
                    Selection::All => {
                        ConditionOutcome::new(kind, Tri::Match, "policy includes all resources")
                    }
                    Selection::Only(set) if set.is_empty() => {
                        ConditionOutcome::new(kind, Tri::NoMatch, "policy targets no resources")
                    }
                    Selection::Only(set) if set.contains(id) => ConditionOutcome::new(
                        kind,
                        Tri::Match,
                        format!("resource {id} is included"),
                    ),
                    Selection::Only(_) => ConditionOutcome::new(
                        kind,
                        Tri::NoMatch,
                        format!("resource {id} is not included"),
                    ),
                }
            }
        }
        (Some(ResourceCondition::UserActions(actions)), Target::Acr(acr)) => {
            if actions.is_empty() || actions.contains(acr) {
                ConditionOutcome::new(kind, Tri::Match, format!("user action {acr} is targeted"))
            } else {
                ConditionOutcome::new(
                    kind,
                    Tri::NoMatch,
                    format!("user action {acr} is not targeted"),
                )
            }
        }
    }
}

/// Location matching.
///
/// The scenario only says whether the sign-in comes from a trusted location.
/// That decides the "all trusted locations" pseudo-set exactly; a specific
/// named location cannot be decided from it and answers `Unknown`.
pub fn match_location(
    condition: Option<&IncludeExclude<LocationRef>>,
    trusted: Option<bool>,
) -> ConditionOutcome {
    let kind = ConditionKind::Location;
    let Some(c) = condition else {
        return ConditionOutcome::new(kind, Tri::Match, "no condition");
    };
    let Some(trusted) = trusted else {
        return ConditionOutcome::pending(
            kind,
            vec![Dimension::TrustedLocation],
            "trusted location unspecified",
        );
    };

    let included = match &c.include {
        Selection::All => Tri::Match,
        Selection::Only(set) => location_hit(set, trusted),
    };
    let excluded = location_hit(&c.exclude, trusted);
    let result = included & !excluded;

    let place = if trusted { "trusted" } else { "untrusted" };
    let reason = match (included, excluded) {
        (_, Tri::Match) => format!("{place} location is excluded"),
        (Tri::NoMatch, _) => format!("{place} location is not included"),
        (Tri::Match, Tri::NoMatch) => format!("{place} location is included"),
        _ => format!("{place} location may fall in a named location"),
    };

    if result.is_unknown() {
        ConditionOutcome::pending(kind, vec![Dimension::TrustedLocation], reason)
    } else {
        ConditionOutcome::new(kind, result, reason)
    }
}

fn location_hit(set: &BTreeSet<LocationRef>, trusted: bool) -> Tri {
    if trusted && set.contains(&LocationRef::AllTrusted) {
        return Tri::Match;
    }
    if set.iter().any(|l| matches!(l, LocationRef::Named(_))) {
        Tri::Unknown
    } else {
        Tri::NoMatch
    }
}

fn match_device_filter(filter: Option<&DeviceFilter>, value: Option<bool>) -> ConditionOutcome {
    let kind = ConditionKind::DeviceFilter;
    let Some(f) = filter else {
        return ConditionOutcome::new(kind, Tri::Match, "no condition");
    };
    let Some(satisfies) = value else {
        return ConditionOutcome::pending(
            kind,
            vec![Dimension::DeviceFilter],
            "device filter outcome unspecified",
        );
    };
    let applies = match f.mode {
        FilterMode::Include => satisfies,
        FilterMode::Exclude => !satisfies,
    };
    let reason = match (f.mode, satisfies) {
        (FilterMode::Include, true) => "device matches the include filter",
        (FilterMode::Include, false) => "device does not match the include filter",
        (FilterMode::Exclude, true) => "device matches the exclude filter",
        (FilterMode::Exclude, false) => "device does not match the exclude filter",
    };
    ConditionOutcome::new(kind, Tri::from_bool(applies), reason)
}

fn match_device_state(
    states: Option<&DeviceStateCondition>,
    compliant: Option<bool>,
    hybrid_joined: Option<bool>,
) -> ConditionOutcome {
    let kind = ConditionKind::DeviceState;
    let Some(s) = states else {
        return ConditionOutcome::new(kind, Tri::Match, "no condition");
    };

    let mut parts = Vec::new();
    let mut signals = Vec::new();
    let mut reasons = Vec::new();

    if s.exclude_compliant {
        match compliant {
            None => {
                parts.push(Tri::Unknown);
                signals.push(Dimension::DeviceCompliant);
                reasons.push("device compliance unspecified");
            }
            Some(true) => {
                parts.push(Tri::NoMatch);
                reasons.push("compliant devices are excluded");
            }
            Some(false) => parts.push(Tri::Match),
        }
    }
    if s.exclude_hybrid_joined {
        match hybrid_joined {
            None => {
                parts.push(Tri::Unknown);
                signals.push(Dimension::DeviceHybridJoined);
                reasons.push("hybrid join state unspecified");
            }
            Some(true) => {
                parts.push(Tri::NoMatch);
                reasons.push("hybrid joined devices are excluded");
            }
            Some(false) => parts.push(Tri::Match),
        }
    }

    let result = Tri::all(parts);
    let reason = if reasons.is_empty() {
        "device state not excluded".to_string()
    } else {
        reasons.join("; ")
    };
    if result.is_unknown() {
        ConditionOutcome::pending(kind, signals, reason)
    } else {
        ConditionOutcome::new(kind, result, reason)
    }
}
