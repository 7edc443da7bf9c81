//! # caprobe-core
//!
//! Scope resolution, three-valued condition matching, and policy evaluation.
//!
//! The engine is storage-agnostic: it reads policies and identities through
//! the [`traits::CatalogLoader`] seam and otherwise works on in-memory values.
//!
//! ```text
//! Policy + Identity ──► resolve_scope ──► Targeted / Excluded / NotTargeted
//!                                              │
//! Scenario ─────────► match_conditions ────────┴──► Verdict ──► net_requirement
//! ```

pub mod catalog;
pub mod conditions;
pub mod evaluator;
pub mod scope;
pub mod traits;

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use caprobe_contracts::{
        error::CaError,
        identity::Identity,
        logic::Tri,
        policy::{
            DeviceStateCondition, GrantControl, GrantControls, GrantOperator, IncludeExclude,
            LocationRef, Policy, PolicyState, ResourceCondition, Selection,
        },
        scenario::{Dimension, Platform, RiskLevel, Scenario, Target},
        verdict::{Applicability, Requirement, Scope, ScopeMatch},
    };
    use catalog::PolicyCatalog;
    use conditions::{match_conditions, match_location, match_resource, match_set};
    use evaluator::{evaluate, net_requirement, Evaluator, PolicyQuery, ResultsMode};
    use scope::resolve_scope;

    fn alice() -> Identity {
        Identity::new("u-alice", "alice@contoso.com")
            .unwrap()
            .with_groups(["g-staff", "g-finance"])
            .with_roles(["r-helpdesk"])
    }

    fn all_users_policy(id: &str, controls: &[GrantControl]) -> Policy {
        let mut p = Policy::new(id, format!("Policy {id}"));
        p.assignment.include.all_users = true;
        p.grant = GrantControls {
            operator: GrantOperator::Or,
            controls: controls.to_vec(),
        };
        p
    }

    fn scenario_all() -> Scenario {
        Scenario::new(Target::Resource("All".to_string()))
    }

    fn set<T: Ord, const N: usize>(items: [T; N]) -> BTreeSet<T> {
        items.into_iter().collect()
    }

    // ── Scope resolution ─────────────────────────────────────────────────────

    #[test]
    fn scope_targets_all_users() {
        let p = all_users_policy("p1", &[GrantControl::Mfa]);
        assert_eq!(
            resolve_scope(&p.assignment, &alice()),
            Scope::Targeted(ScopeMatch::AllUsers)
        );
    }

    #[test]
    fn scope_exclusion_wins_over_inclusion() {
        let mut p = all_users_policy("p1", &[GrantControl::Mfa]);
        p.assignment.exclude.groups.insert("g-finance".to_string());
        match resolve_scope(&p.assignment, &alice()) {
            Scope::Excluded(ScopeMatch::Groups(ids)) => assert_eq!(ids, vec!["g-finance"]),
            other => panic!("expected Excluded via group, got {:?}", other),
        }
    }

    #[test]
    fn scope_excluded_even_when_not_included() {
        let mut p = Policy::new("p1", "Only bob");
        p.assignment.include.users.insert("u-bob".to_string());
        p.assignment.exclude.roles.insert("r-helpdesk".to_string());
        assert!(resolve_scope(&p.assignment, &alice()).is_excluded());
    }

    #[test]
    fn scope_empty_include_is_not_targeted() {
        let p = Policy::new("p1", "Nobody");
        assert_eq!(resolve_scope(&p.assignment, &alice()), Scope::NotTargeted);
    }

    #[test]
    fn scope_guest_marker_needs_guest_identity() {
        let mut p = Policy::new("p1", "Guests");
        p.assignment.include.guests_or_external = true;
        assert_eq!(resolve_scope(&p.assignment, &alice()), Scope::NotTargeted);
        let guest = alice().guest(true);
        assert_eq!(
            resolve_scope(&p.assignment, &guest),
            Scope::Targeted(ScopeMatch::GuestsOrExternalUsers)
        );
    }

    // ── Condition matching ───────────────────────────────────────────────────

    #[test]
    fn absent_constraint_always_matches() {
        let none: Option<&IncludeExclude<Platform>> = None;
        assert_eq!(match_set(none, None), Tri::Match);
        assert_eq!(match_set(none, Some(&Platform::Linux)), Tri::Match);
    }

    #[test]
    fn unspecified_value_against_constraint_is_unknown() {
        let c = IncludeExclude::new(Selection::All, BTreeSet::new());
        assert_eq!(match_set(Some(&c), None::<&Platform>), Tri::Unknown);
    }

    #[test]
    fn resource_family_mismatch_is_no_match() {
        let apps = ResourceCondition::Apps(IncludeExclude::new(Selection::All, BTreeSet::new()));
        let acr = Target::Acr("urn:user:registersecurityinfo".to_string());
        assert_eq!(match_resource(Some(&apps), &acr).result, Tri::NoMatch);

        let actions = ResourceCondition::UserActions(set(["urn:user:registersecurityinfo".to_string()]));
        let res = Target::Resource("All".to_string());
        assert_eq!(match_resource(Some(&actions), &res).result, Tri::NoMatch);
        assert_eq!(match_resource(Some(&actions), &acr).result, Tri::Match);
    }

    #[test]
    fn resource_none_target_never_matches() {
        let none = ResourceCondition::Apps(IncludeExclude::new(
            Selection::Only(BTreeSet::new()),
            BTreeSet::new(),
        ));
        let res = Target::Resource("All".to_string());
        assert_eq!(match_resource(Some(&none), &res).result, Tri::NoMatch);
    }

    #[test]
    fn resource_excluded_app_does_not_match() {
        let apps = ResourceCondition::Apps(IncludeExclude::new(
            Selection::All,
            set(["app-portal".to_string()]),
        ));
        let portal = Target::Resource("app-portal".to_string());
        let other = Target::Resource("app-mail".to_string());
        assert_eq!(match_resource(Some(&apps), &portal).result, Tri::NoMatch);
        assert_eq!(match_resource(Some(&apps), &other).result, Tri::Match);
    }

    #[test]
    fn location_all_trusted_exclusion() {
        let c = IncludeExclude::new(Selection::All, set([LocationRef::AllTrusted]));
        assert_eq!(match_location(Some(&c), Some(true)).result, Tri::NoMatch);
        assert_eq!(match_location(Some(&c), Some(false)).result, Tri::Match);
        let pending = match_location(Some(&c), None);
        assert_eq!(pending.result, Tri::Unknown);
        assert_eq!(pending.signals, vec![Dimension::TrustedLocation]);
    }

    #[test]
    fn location_named_include_is_undecidable() {
        let c = IncludeExclude::new(
            Selection::Only(set([LocationRef::Named("loc-hq".to_string())])),
            BTreeSet::new(),
        );
        assert_eq!(match_location(Some(&c), Some(false)).result, Tri::Unknown);
    }

    #[test]
    fn device_state_exclusion_needs_compliance_signal() {
        let mut p = all_users_policy("p1", &[GrantControl::Mfa]);
        p.conditions.device_states = Some(DeviceStateCondition {
            exclude_compliant: true,
            exclude_hybrid_joined: false,
        });
        let unspecified = match_conditions(&p.conditions, &scenario_all());
        assert_eq!(unspecified.result(), Tri::Unknown);
        assert_eq!(unspecified.pending_signals(), vec![Dimension::DeviceCompliant]);

        let compliant = Scenario {
            device_compliant: Some(true),
            ..scenario_all()
        };
        assert_eq!(match_conditions(&p.conditions, &compliant).result(), Tri::NoMatch);
    }

    #[test]
    fn no_match_dominates_unknown_across_dimensions() {
        let mut p = all_users_policy("p1", &[GrantControl::Mfa]);
        p.conditions.platforms = Some(IncludeExclude::new(
            Selection::Only(set([Platform::Ios])),
            BTreeSet::new(),
        ));
        p.conditions.signin_risk = Some(set([RiskLevel::High]));
        let s = Scenario {
            platform: Some(Platform::Windows),
            ..scenario_all()
        };
        let report = match_conditions(&p.conditions, &s);
        assert_eq!(report.result(), Tri::NoMatch);
        assert_eq!(report.blockers().len(), 1);
        assert!(report.blockers()[0].starts_with("Platform:"));
    }

    // ── Evaluation ───────────────────────────────────────────────────────────

    #[test]
    fn evaluate_definitive_when_all_conditions_match() {
        let p = all_users_policy("p1", &[GrantControl::Mfa]);
        let v = evaluate(&p, &alice(), &scenario_all());
        assert_eq!(v.applicability, Applicability::AppliesDefinitive);
        assert!(v.enforces());
        assert_eq!(v.reason, "Included: All users");
    }

    #[test]
    fn evaluate_signal_dependent_on_unspecified_risk() {
        let mut p = all_users_policy("p1", &[GrantControl::Mfa]);
        p.conditions.signin_risk = Some(set([RiskLevel::High]));
        let v = evaluate(&p, &alice(), &scenario_all());
        assert_eq!(v.applicability, Applicability::AppliesSignalDependent);
        assert_eq!(v.pending_signals, vec![Dimension::SignInRisk]);
        assert!(!v.enforces());
    }

    #[test]
    fn evaluate_excluded_identity_never_applies() {
        let mut p = all_users_policy("p1", &[GrantControl::Block]);
        p.assignment.exclude.users.insert("u-alice".to_string());
        let v = evaluate(&p, &alice(), &scenario_all());
        assert_eq!(v.applicability, Applicability::Excluded);
        assert!(v.grant.is_none());
    }

    #[test]
    fn evaluate_disabled_policy_does_not_apply() {
        let mut p = all_users_policy("p1", &[GrantControl::Block]);
        p.state = PolicyState::Disabled;
        let v = evaluate(&p, &alice(), &scenario_all());
        assert_eq!(v.applicability, Applicability::DoesNotApply);
    }

    #[test]
    fn weak_controls_apply_without_enforcing() {
        for controls in [
            &[GrantControl::TermsOfUse][..],
            &[GrantControl::PasswordChange][..],
            &[GrantControl::Mfa, GrantControl::TermsOfUse][..],
        ] {
            let p = all_users_policy("p1", controls);
            let v = evaluate(&p, &alice(), &scenario_all());
            assert_eq!(v.applicability, Applicability::AppliesDefinitive);
            assert!(!v.is_controlling(), "controls {:?}", controls);
            assert!(!v.enforces(), "controls {:?}", controls);
            assert!(v.requires_controls());
        }
    }

    #[test]
    fn and_set_with_one_strong_control_enforces() {
        let mut p = all_users_policy("p1", &[GrantControl::TermsOfUse, GrantControl::Mfa]);
        p.grant.operator = GrantOperator::And;
        assert!(evaluate(&p, &alice(), &scenario_all()).enforces());
    }

    #[test]
    fn net_requirement_still_lists_weak_controls() {
        let tou = all_users_policy("p-tou", &[GrantControl::TermsOfUse]);
        let verdicts = vec![evaluate(&tou, &alice(), &scenario_all())];
        match net_requirement(&verdicts) {
            Requirement::Require { clauses } => {
                assert_eq!(clauses[0].policy_id, "p-tou");
                assert_eq!(clauses[0].controls, vec![GrantControl::TermsOfUse]);
            }
            other => panic!("expected Require, got {:?}", other),
        }
    }

    #[test]
    fn net_requirement_block_wins() {
        let block = all_users_policy("p-block", &[GrantControl::Block]);
        let mfa = all_users_policy("p-mfa", &[GrantControl::Mfa]);
        let verdicts = vec![
            evaluate(&mfa, &alice(), &scenario_all()),
            evaluate(&block, &alice(), &scenario_all()),
        ];
        match net_requirement(&verdicts) {
            Requirement::Block { policy_ids } => assert_eq!(policy_ids, vec!["p-block"]),
            other => panic!("expected Block, got {:?}", other),
        }
    }

    #[test]
    fn net_requirement_ignores_report_only() {
        let mut p = all_users_policy("p1", &[GrantControl::Mfa]);
        p.state = PolicyState::ReportOnly;
        let verdicts = vec![evaluate(&p, &alice(), &scenario_all())];
        assert_eq!(net_requirement(&verdicts), Requirement::Allow);
    }

    #[test]
    fn net_requirement_ands_policy_clauses() {
        let mfa = all_users_policy("p-mfa", &[GrantControl::Mfa]);
        let mut device = all_users_policy(
            "p-device",
            &[GrantControl::CompliantDevice, GrantControl::HybridJoinedDevice],
        );
        device.grant.operator = GrantOperator::Or;
        let verdicts = vec![
            evaluate(&mfa, &alice(), &scenario_all()),
            evaluate(&device, &alice(), &scenario_all()),
        ];
        match net_requirement(&verdicts) {
            Requirement::Require { clauses } => {
                assert_eq!(clauses.len(), 2);
                assert_eq!(clauses[1].operator, GrantOperator::Or);
            }
            other => panic!("expected Require, got {:?}", other),
        }
    }

    // ── Evaluator ────────────────────────────────────────────────────────────

    fn catalog() -> PolicyCatalog {
        let mfa = all_users_policy("p-mfa", &[GrantControl::Mfa]);

        let mut excl = all_users_policy("p-excl", &[GrantControl::Block]);
        excl.assignment.exclude.groups.insert("g-finance".to_string());

        let mut off = all_users_policy("p-off", &[GrantControl::Block]);
        off.state = PolicyState::Disabled;

        let mut portal = all_users_policy("p-portal", &[GrantControl::CompliantDevice]);
        portal.conditions.resource = Some(ResourceCondition::Apps(IncludeExclude::new(
            Selection::Only(set(["app-portal".to_string()])),
            BTreeSet::new(),
        )));

        PolicyCatalog::new(vec![mfa, excl, off, portal])
    }

    #[test]
    fn what_if_skips_disabled_policies() {
        let cat = catalog();
        let report = Evaluator::new(&cat).what_if(&alice(), &scenario_all()).unwrap();
        assert_eq!(report.verdicts.len(), 3);
        assert!(report.verdicts.iter().all(|v| v.policy_id != "p-off"));
        match report.requirement {
            Requirement::Require { clauses } => {
                assert_eq!(clauses.len(), 1);
                assert_eq!(clauses[0].policy_id, "p-mfa");
            }
            other => panic!("expected Require, got {:?}", other),
        }
    }

    #[test]
    fn what_if_rejects_blank_target() {
        let cat = catalog();
        let blank = Scenario::new(Target::Resource("  ".to_string()));
        assert!(matches!(
            Evaluator::new(&cat).what_if(&alice(), &blank),
            Err(CaError::InvalidScenario { .. })
        ));
    }

    #[test]
    fn get_policies_applied_and_exclusions() {
        let cat = catalog();
        let ev = Evaluator::new(&cat);

        let applied = ev.get_policies(&alice(), &PolicyQuery::default());
        let ids: Vec<&str> = applied.applied.iter().map(|p| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["p-mfa", "p-portal"]);
        assert!(applied.excluded.is_empty());
        assert!(applied.disabled.is_empty());

        let all = ev.get_policies(
            &alice(),
            &PolicyQuery {
                results: ResultsMode::All,
                include_disabled: true,
                ..PolicyQuery::default()
            },
        );
        assert_eq!(all.excluded.len(), 1);
        assert_eq!(all.excluded[0].policy_id, "p-excl");
        assert_eq!(all.disabled.len(), 1);
    }

    #[test]
    fn get_policies_filters_by_app() {
        let cat = catalog();
        let listing = Evaluator::new(&cat).get_policies(
            &alice(),
            &PolicyQuery {
                app: Some("app-mail".to_string()),
                ..PolicyQuery::default()
            },
        );
        let ids: Vec<&str> = listing.applied.iter().map(|p| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["p-mfa"]);
    }

    #[test]
    fn catalog_orders_by_display_name() {
        let cat = catalog();
        let names: Vec<&str> = cat.all().iter().map(|p| p.display_name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(cat.active().count(), 3);
        assert_eq!(cat.disabled().count(), 1);
        assert!(cat.get("p-portal").is_some());
    }
}
