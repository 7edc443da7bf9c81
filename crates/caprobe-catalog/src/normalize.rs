//! Raw detail documents → normalized `Policy` values.
//!
//! Normalization runs once per catalog build. Unrecognized tokens are dropped
//! from the set they appear in and recorded as policy warnings; they never
//! abort the load. Constraints that admit every value of their domain
//! collapse to "absent".

use std::collections::BTreeSet;
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use caprobe_contracts::{
    error::CaError,
    policy::{
        Assignment, Conditions, DeviceFilter, DeviceStateCondition, FilterMode, GrantControl,
        GrantControls, GrantOperator, IncludeExclude, LocationRef, Policy, PolicyState,
        ResourceCondition, Selection, SubjectSet,
    },
    scenario::{AuthFlow, ClientApp, Platform, RiskLevel},
};

use crate::raw::{parse_details, RawBlock, RawConditions, RawControlBlock, RawDetail, RawIncludeExclude, Tokens};

const ALL: &str = "All";
const NONE: &str = "None";
const GUESTS: &str = "GuestsOrExternalUsers";
const ALL_TRUSTED: &str = "AllTrusted";

/// Build the policies of one snapshot record.
///
/// A record with several detail documents yields one policy per document;
/// ids get a `#n` suffix from the second document on. A document that fails
/// to parse becomes a disabled placeholder carrying the parse error as a
/// warning, so the policy stays visible in listings and analysis warnings.
pub fn policies_from_record(object_id: &str, display_name: &str, policy_detail: &Value) -> Vec<Policy> {
    let mut policies = Vec::new();
    for (i, parsed) in parse_details(policy_detail).into_iter().enumerate() {
        let id = if i == 0 {
            object_id.to_string()
        } else {
            format!("{object_id}#{}", i + 1)
        };
        match parsed {
            Ok(detail) => policies.push(normalize_policy(&id, display_name, &detail)),
            Err(e) => {
                warn!(policy_id = %id, policy = display_name, error = %e, "unreadable policy detail");
                policies.push(unreadable_policy(&id, display_name, &e));
            }
        }
    }
    policies
}

fn unreadable_policy(id: &str, display_name: &str, error: &CaError) -> Policy {
    let reason = match error {
        CaError::ConfigError { reason } => reason.clone(),
        other => other.to_string(),
    };
    let mut policy = Policy::new(id, display_name);
    policy.state = PolicyState::Disabled;
    policy.warnings.push(format!("{reason}; not evaluated"));
    policy
}

/// Normalize one detail document.
pub fn normalize_policy(id: &str, display_name: &str, detail: &RawDetail) -> Policy {
    let mut warnings = Vec::new();
    let cond = &detail.conditions;

    let state = normalize_state(detail.state.as_deref(), &mut warnings);
    let assignment = normalize_assignment(cond.users.as_ref(), &mut warnings);
    let conditions = Conditions {
        resource: normalize_resource(cond.applications.as_ref()),
        platforms: normalize_platforms(cond, &mut warnings),
        client_apps: normalize_client_apps(cond, &mut warnings),
        locations: normalize_locations(cond.locations.as_ref()),
        signin_risk: normalize_levels(cond.sign_in_risks.as_ref(), |b| &b.sign_in_risks, "sign-in risk", &mut warnings),
        user_risk: normalize_levels(cond.user_risks.as_ref(), |b| &b.user_risks, "user risk", &mut warnings),
        auth_flows: normalize_auth_flows(cond.auth_flows.as_ref(), &mut warnings),
        device_filter: normalize_device_filter(cond),
        device_states: normalize_device_states(cond.device_states.as_ref(), &mut warnings),
    };
    let (grant, mut session_controls) = normalize_controls(&detail.controls, &mut warnings);
    for s in detail.session_controls.iter() {
        if !session_controls.iter().any(|c| c == s) {
            session_controls.push(s.to_string());
        }
    }

    debug!(policy_id = id, state = state.as_str(), warnings = warnings.len(), "policy normalized");

    Policy {
        id: id.to_string(),
        display_name: display_name.to_string(),
        state,
        assignment,
        conditions,
        grant,
        session_controls,
        warnings,
    }
}

// ── State ────────────────────────────────────────────────────────────────────

fn normalize_state(raw: Option<&str>, warnings: &mut Vec<String>) -> PolicyState {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("enabled") => PolicyState::Enabled,
        Some("reporting") | Some("enabledforreportingbutnotenforced") => PolicyState::ReportOnly,
        Some("disabled") => PolicyState::Disabled,
        Some(other) => {
            warnings.push(format!("unrecognized state '{other}', treated as disabled"));
            PolicyState::Disabled
        }
        None => {
            warnings.push("policy has no state, treated as disabled".to_string());
            PolicyState::Disabled
        }
    }
}

// ── Users ────────────────────────────────────────────────────────────────────

fn normalize_assignment(users: Option<&RawIncludeExclude>, warnings: &mut Vec<String>) -> Assignment {
    let Some(users) = users else {
        return Assignment {
            include: SubjectSet {
                all_users: true,
                ..SubjectSet::default()
            },
            exclude: SubjectSet::default(),
        };
    };

    let mut include = subjects(&users.include);
    if users.include.is_empty() {
        include.all_users = true;
    }
    let exclude = subjects(&users.exclude);
    if exclude.all_users {
        warnings.push("policy excludes all users and can never apply".to_string());
    }
    Assignment { include, exclude }
}

fn subjects(blocks: &[RawBlock]) -> SubjectSet {
    let mut set = SubjectSet::default();
    for b in blocks {
        for user in b.users.iter() {
            match user {
                u if u.eq_ignore_ascii_case(ALL) => set.all_users = true,
                u if u.eq_ignore_ascii_case(GUESTS) => set.guests_or_external = true,
                u if u.eq_ignore_ascii_case(NONE) => {}
                u => {
                    set.users.insert(u.to_string());
                }
            }
        }
        for group in b.groups.iter() {
            if group.eq_ignore_ascii_case(ALL) {
                set.all_users = true;
            } else {
                set.groups.insert(group.to_string());
            }
        }
        let roles = b
            .directory_roles
            .iter()
            .chain(b.roles.iter())
            .chain(b.role_template_ids.iter());
        for role in roles {
            if role.eq_ignore_ascii_case(ALL) {
                set.all_users = true;
            } else {
                set.roles.insert(role.to_string());
            }
        }
    }
    set
}

// ── Resources ────────────────────────────────────────────────────────────────

fn normalize_resource(apps: Option<&RawIncludeExclude>) -> Option<ResourceCondition> {
    let apps = apps?;

    let actions: BTreeSet<String> = apps
        .include
        .iter()
        .flat_map(|b| b.acrs.iter().chain(b.user_actions.iter()))
        .map(str::to_string)
        .collect();
    if !actions.is_empty() {
        return Some(ResourceCondition::UserActions(actions));
    }

    let include = tokens_of(&apps.include, |b| &b.applications);
    let exclude = tokens_of(&apps.exclude, |b| &b.applications);
    if include.is_empty() && exclude.is_empty() {
        return None;
    }

    let nothing = || {
        Some(ResourceCondition::Apps(IncludeExclude::new(
            Selection::Only(BTreeSet::new()),
            BTreeSet::new(),
        )))
    };
    if include.contains(NONE) || exclude.contains(ALL) {
        return nothing();
    }

    let selection = if include.is_empty() || include.contains(ALL) {
        Selection::All
    } else {
        Selection::Only(include)
    };
    let cond = IncludeExclude::new(selection, exclude);
    if cond.is_universal() {
        None
    } else {
        Some(ResourceCondition::Apps(cond))
    }
}

// ── Locations ────────────────────────────────────────────────────────────────

fn normalize_locations(locs: Option<&RawIncludeExclude>) -> Option<IncludeExclude<LocationRef>> {
    let locs = locs?;
    let include = tokens_of(&locs.include, |b| &b.locations);
    let exclude = tokens_of(&locs.exclude, |b| &b.locations);
    if include.is_empty() && exclude.is_empty() {
        return None;
    }

    let to_ref = |t: &String| {
        if t.eq_ignore_ascii_case(ALL_TRUSTED) {
            LocationRef::AllTrusted
        } else {
            LocationRef::Named(t.clone())
        }
    };
    let selection = if include.is_empty() || include.iter().any(|t| t.eq_ignore_ascii_case(ALL)) {
        Selection::All
    } else {
        Selection::Only(include.iter().map(to_ref).collect())
    };
    let cond = IncludeExclude::new(
        selection,
        exclude
            .iter()
            .filter(|t| !t.eq_ignore_ascii_case(ALL))
            .map(to_ref)
            .collect(),
    );
    if cond.is_universal() {
        None
    } else {
        Some(cond)
    }
}

// ── Enumerated dimensions ────────────────────────────────────────────────────

fn normalize_platforms(cond: &RawConditions, warnings: &mut Vec<String>) -> Option<IncludeExclude<Platform>> {
    let raw = match (&cond.device_platforms, &cond.platforms) {
        (Some(dp), _) if !dp.include.is_empty() || !dp.exclude.is_empty() => dp,
        (_, Some(p)) => p,
        (Some(dp), None) => dp,
        (None, None) => return None,
    };
    let pick = |b: &RawBlock| b.platforms.iter().chain(b.device_platforms.iter()).map(str::to_string).collect::<Vec<_>>();
    let include: Vec<String> = raw.include.iter().flat_map(pick).collect();
    let exclude: Vec<String> = raw.exclude.iter().flat_map(pick).collect();
    enum_condition(&include, &exclude, "platform", &Platform::ALL, warnings)
}

fn normalize_client_apps(cond: &RawConditions, warnings: &mut Vec<String>) -> Option<IncludeExclude<ClientApp>> {
    let (include, exclude): (Vec<String>, Vec<String>) = match &cond.client_types {
        Some(ct) if !ct.include.is_empty() || !ct.exclude.is_empty() => (
            tokens_of(&ct.include, |b| &b.client_types).into_iter().collect(),
            tokens_of(&ct.exclude, |b| &b.client_types).into_iter().collect(),
        ),
        _ => (cond.client_app_types.0.clone(), Vec::new()),
    };
    enum_condition(&include, &exclude, "client app type", &ClientApp::ALL, warnings)
}

/// Build an include/exclude condition over a closed enum domain.
fn enum_condition<T>(
    include: &[String],
    exclude: &[String],
    what: &str,
    domain: &[T],
    warnings: &mut Vec<String>,
) -> Option<IncludeExclude<T>>
where
    T: FromStr + Ord + Copy,
{
    if include.is_empty() && exclude.is_empty() {
        return None;
    }
    let include_all = include.is_empty() || include.iter().any(|t| t.eq_ignore_ascii_case(ALL));

    let mut parse_all = |tokens: &[String]| -> BTreeSet<T> {
        let mut out = BTreeSet::new();
        for t in tokens.iter().filter(|t| !t.eq_ignore_ascii_case(ALL)) {
            match t.parse::<T>() {
                Ok(v) => {
                    out.insert(v);
                }
                Err(_) => warnings.push(format!("unrecognized {what} '{t}' ignored")),
            }
        }
        out
    };

    let selection = if include_all {
        Selection::All
    } else {
        let only = parse_all(include);
        if domain.iter().all(|v| only.contains(v)) {
            Selection::All
        } else {
            Selection::Only(only)
        }
    };
    let cond = IncludeExclude::new(selection, parse_all(exclude));
    if cond.is_universal() {
        None
    } else {
        Some(cond)
    }
}

fn normalize_levels(
    raw: Option<&RawIncludeExclude>,
    field: fn(&RawBlock) -> &Tokens,
    what: &str,
    warnings: &mut Vec<String>,
) -> Option<BTreeSet<RiskLevel>> {
    let tokens = tokens_of(&raw?.include, field);
    if tokens.is_empty() {
        return None;
    }
    let mut levels = BTreeSet::new();
    for t in &tokens {
        match t.parse::<RiskLevel>() {
            Ok(level) => {
                levels.insert(level);
            }
            Err(_) => warnings.push(format!("unrecognized {what} level '{t}' ignored")),
        }
    }
    if RiskLevel::ALL.iter().all(|l| levels.contains(l)) {
        None
    } else {
        Some(levels)
    }
}

fn normalize_auth_flows(raw: Option<&RawIncludeExclude>, warnings: &mut Vec<String>) -> Option<BTreeSet<AuthFlow>> {
    let tokens = tokens_of(&raw?.include, |b| &b.auth_flows);
    if tokens.is_empty() {
        return None;
    }
    let mut flows = BTreeSet::new();
    for t in &tokens {
        match t.parse::<AuthFlow>() {
            Ok(flow) => {
                flows.insert(flow);
            }
            Err(_) => warnings.push(format!("unrecognized auth flow '{t}' ignored")),
        }
    }
    Some(flows)
}

// ── Devices ──────────────────────────────────────────────────────────────────

fn normalize_device_filter(cond: &RawConditions) -> Option<DeviceFilter> {
    let devices = cond.devices.as_ref()?;

    if let Some(filter) = &devices.filter {
        if let Some(rule) = filter.rule.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            let mode = match filter.mode.as_deref().map(str::trim) {
                Some(m) if m.eq_ignore_ascii_case("exclude") => FilterMode::Exclude,
                _ => FilterMode::Include,
            };
            return Some(DeviceFilter {
                mode,
                rule: rule.to_string(),
            });
        }
    }

    let rule_in = |blocks: &[RawBlock]| {
        blocks
            .iter()
            .filter_map(|b| b.device_rule.as_deref().map(str::trim))
            .find(|r| !r.is_empty())
            .map(str::to_string)
    };
    if let Some(rule) = rule_in(&devices.include) {
        return Some(DeviceFilter {
            mode: FilterMode::Include,
            rule,
        });
    }
    rule_in(&devices.exclude).map(|rule| DeviceFilter {
        mode: FilterMode::Exclude,
        rule,
    })
}

fn normalize_device_states(raw: Option<&RawIncludeExclude>, warnings: &mut Vec<String>) -> Option<DeviceStateCondition> {
    let raw = raw?;
    let mut states = DeviceStateCondition::default();
    for t in tokens_of(&raw.exclude, |b| &b.device_states) {
        match t.to_ascii_lowercase().as_str() {
            "compliant" => states.exclude_compliant = true,
            "domainjoined" | "hybridazureadjoined" => states.exclude_hybrid_joined = true,
            _ => warnings.push(format!("unrecognized device state '{t}' ignored")),
        }
    }
    for t in tokens_of(&raw.include, |b| &b.device_states) {
        if !t.eq_ignore_ascii_case(ALL) {
            warnings.push(format!("device state include '{t}' is not modelled"));
        }
    }
    if states.exclude_compliant || states.exclude_hybrid_joined {
        Some(states)
    } else {
        None
    }
}

// ── Controls ─────────────────────────────────────────────────────────────────

fn normalize_controls(blocks: &[RawControlBlock], warnings: &mut Vec<String>) -> (GrantControls, Vec<String>) {
    let mut controls: Vec<GrantControl> = Vec::new();
    let mut session: Vec<String> = Vec::new();
    let mut explicit: Option<GrantOperator> = None;
    let mut granting_blocks = 0usize;

    for b in blocks {
        let before = controls.len();
        for name in b.control.iter().chain(b.grant_controls.iter()) {
            match GrantControl::parse(name) {
                Some(c) if !controls.contains(&c) => controls.push(c),
                Some(_) => {}
                None => warnings.push(format!("unrecognized grant control '{name}' ignored")),
            }
        }
        if !b.auth_strength_ids.is_empty() && !controls.contains(&GrantControl::AuthenticationStrength) {
            controls.push(GrantControl::AuthenticationStrength);
        }
        if controls.len() > before {
            granting_blocks += 1;
        }
        for s in b.session_controls.iter() {
            if !session.iter().any(|x| x == s) {
                session.push(s.to_string());
            }
        }
        if explicit.is_none() {
            explicit = match b.operator.as_deref().map(|o| o.trim().to_ascii_uppercase()).as_deref() {
                Some("AND") => Some(GrantOperator::And),
                Some("OR") => Some(GrantOperator::Or),
                _ => None,
            };
        }
    }

    let operator = explicit.unwrap_or(if granting_blocks > 1 {
        GrantOperator::And
    } else {
        GrantOperator::Or
    });
    (GrantControls { operator, controls }, session)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn tokens_of(blocks: &[RawBlock], field: impl Fn(&RawBlock) -> &Tokens) -> BTreeSet<String> {
    blocks
        .iter()
        .flat_map(|b| field(b).iter().map(str::to_string).collect::<Vec<_>>())
        .collect()
}
