//! # caprobe-analyze
//!
//! Bounded scenario-space enumeration and gap classification.
//!
//! ```text
//! base Scenario ──► ScenarioSpace ──► (index, Scenario)* ──► Classifier ──► AnalysisResult
//!                    (mixed radix)        rayon pool         (per scenario)   (sorted by index)
//! ```

pub mod analyzer;
pub mod classify;
pub mod config;
pub mod generator;

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use analyzer::GapAnalyzer;
    use caprobe_contracts::{
        analysis::Classification,
        error::CaError,
        identity::Identity,
        policy::{
            GrantControl, GrantControls, GrantOperator, IncludeExclude, LocationRef, Policy,
            PolicyState, Selection,
        },
        scenario::{Dimension, Platform, RiskLevel, Scenario, Target},
    };
    use caprobe_core::catalog::PolicyCatalog;
    use config::{AnalyzerConfig, TrustedLocationRule};
    use generator::ScenarioSpace;

    fn alice() -> Identity {
        Identity::new("u-alice", "alice@contoso.com")
            .unwrap()
            .with_groups(["g-staff"])
    }

    fn mfa_policy(id: &str) -> Policy {
        let mut p = Policy::new(id, format!("MFA {id}"));
        p.assignment.include.all_users = true;
        p.grant = GrantControls {
            operator: GrantOperator::Or,
            controls: vec![GrantControl::Mfa],
        };
        p
    }

    fn grant_policy(id: &str, operator: GrantOperator, controls: &[GrantControl]) -> Policy {
        let mut p = mfa_policy(id);
        p.grant = GrantControls {
            operator,
            controls: controls.to_vec(),
        };
        p
    }

    fn untrusted_only(mut p: Policy) -> Policy {
        p.conditions.locations = Some(IncludeExclude::new(
            Selection::All,
            [LocationRef::AllTrusted].into_iter().collect(),
        ));
        p
    }

    fn windows_trusted() -> Scenario {
        Scenario {
            platform: Some(Platform::Windows),
            trusted_location: Some(true),
            ..Scenario::new(Target::Resource("All".to_string()))
        }
    }

    fn run(catalog: &PolicyCatalog, base: &Scenario, hold: &[Dimension]) -> caprobe_contracts::analysis::AnalysisResult {
        GapAnalyzer::new(catalog, AnalyzerConfig::default())
            .analyze(&alice(), base, hold)
            .unwrap()
    }

    // ── Scenario space ───────────────────────────────────────────────────────

    #[test]
    fn space_size_is_product_of_free_domains() {
        let space = ScenarioSpace::new(windows_trusted());
        // client_app 4, signin 4, user 4, auth 3, filter 2, compliant 2, joined 2
        assert_eq!(space.len(), 4 * 4 * 4 * 3 * 2 * 2 * 2);
        assert!(!space.free_dimensions().contains(&Dimension::Platform));
    }

    #[test]
    fn space_holds_dimensions_unspecified() {
        let space = ScenarioSpace::new(windows_trusted()).holding([
            Dimension::SignInRisk,
            Dimension::UserRisk,
            Dimension::AuthFlow,
            Dimension::DeviceFilter,
            Dimension::DeviceCompliant,
            Dimension::DeviceHybridJoined,
        ]);
        assert_eq!(space.len(), 4);
        let scenarios: Vec<Scenario> = space.bounded(u64::MAX).map(|(_, s)| s).collect();
        assert_eq!(scenarios.len(), 4);
        assert!(scenarios.iter().all(|s| s.signin_risk.is_none()));
        assert!(scenarios.iter().all(|s| s.platform == Some(Platform::Windows)));
    }

    #[test]
    fn most_significant_dimension_varies_slowest() {
        let base = Scenario::new(Target::Resource("All".to_string()));
        let space = ScenarioSpace::new(base);
        let first = space.scenario_at(0).unwrap();
        let second = space.scenario_at(1).unwrap();
        assert_eq!(first.platform, Some(Platform::Windows));
        assert_eq!(second.platform, Some(Platform::Windows));
        assert_eq!(first.device_hybrid_joined, Some(true));
        assert_eq!(second.device_hybrid_joined, Some(false));
        let last = space.scenario_at(space.len() - 1).unwrap();
        assert_eq!(last.platform, Some(Platform::Android));
    }

    #[test]
    fn bounded_walk_reports_truncation() {
        let space = ScenarioSpace::new(windows_trusted());
        let walk = space.bounded(10);
        assert!(walk.is_truncated());
        assert_eq!(walk.count(), 10);
        assert!(!space.bounded(space.len()).is_truncated());
        assert!(space.scenario_at(space.len()).is_err());
    }

    #[test]
    fn bounded_walk_yields_every_index_in_order() {
        let space = ScenarioSpace::new(windows_trusted());
        assert!(!space.is_empty());
        let indices: Vec<u64> = space.bounded(u64::MAX).map(|(i, _)| i).collect();
        assert_eq!(indices.len() as u64, space.len());
        assert!(indices.iter().enumerate().all(|(n, &i)| n as u64 == i));
    }

    #[test]
    fn fully_specified_space_has_one_scenario() {
        let base = Scenario {
            client_app: Some(caprobe_contracts::scenario::ClientApp::Browser),
            signin_risk: Some(RiskLevel::None),
            user_risk: Some(RiskLevel::None),
            auth_flow: Some(caprobe_contracts::scenario::AuthFlow::Standard),
            device_filter: Some(false),
            device_compliant: Some(false),
            device_hybrid_joined: Some(false),
            ..windows_trusted()
        };
        let space = ScenarioSpace::new(base.clone());
        assert_eq!(space.len(), 1);
        assert!(!space.is_empty());
        assert_eq!(space.bounded(5).collect::<Vec<_>>(), vec![(0, base)]);
    }

    // ── Classification ───────────────────────────────────────────────────────

    #[test]
    fn trusted_location_exclusion_is_bypass() {
        let catalog = PolicyCatalog::new(vec![untrusted_only(mfa_policy("p1"))]);
        let base = windows_trusted();
        let result = run(&catalog, &base, &[]);
        assert_eq!(result.count(Classification::GapTrustedLocationBypass), result.scenarios_evaluated);
        assert!(result.gaps[0].reason.contains("MFA p1"));
    }

    #[test]
    fn untrusted_sign_in_is_enforced() {
        let catalog = PolicyCatalog::new(vec![untrusted_only(mfa_policy("p1"))]);
        let base = Scenario {
            trusted_location: Some(false),
            ..windows_trusted()
        };
        let result = run(&catalog, &base, &[]);
        assert_eq!(result.count(Classification::Enforced), result.scenarios_evaluated);
        assert!(result.gaps.is_empty());
    }

    #[test]
    fn enforced_wins_over_report_only() {
        let mut report = mfa_policy("p-report");
        report.state = PolicyState::ReportOnly;
        let catalog = PolicyCatalog::new(vec![report.clone(), mfa_policy("p-enforced")]);
        let result = run(&catalog, &windows_trusted(), &[]);
        assert_eq!(result.count(Classification::Enforced), result.scenarios_evaluated);

        let only_report = PolicyCatalog::new(vec![report]);
        let result = run(&only_report, &windows_trusted(), &[]);
        assert_eq!(result.count(Classification::GapReportOnly), result.scenarios_evaluated);
        assert_eq!(result.gaps.len() as u64, result.scenarios_evaluated);
    }

    #[test]
    fn weak_controls_leave_a_no_policy_gap() {
        let weak = [
            ("p-tou", GrantOperator::Or, &[GrantControl::TermsOfUse][..]),
            ("p-pwd", GrantOperator::Or, &[GrantControl::PasswordChange][..]),
            ("p-mfa-or-tou", GrantOperator::Or, &[GrantControl::Mfa, GrantControl::TermsOfUse][..]),
        ];
        for (id, operator, controls) in weak {
            let catalog = PolicyCatalog::new(vec![grant_policy(id, operator, controls)]);
            let result = run(&catalog, &windows_trusted(), &[]);
            assert_eq!(result.count(Classification::Enforced), 0, "{id}");
            assert_eq!(result.count(Classification::GapNoPolicy), result.scenarios_evaluated, "{id}");
        }
    }

    #[test]
    fn and_with_mfa_is_enforced() {
        let p = grant_policy("p-and", GrantOperator::And, &[GrantControl::Mfa, GrantControl::TermsOfUse]);
        let catalog = PolicyCatalog::new(vec![p]);
        let result = run(&catalog, &windows_trusted(), &[]);
        assert_eq!(result.count(Classification::Enforced), result.scenarios_evaluated);
    }

    #[test]
    fn trusted_exclusion_of_terms_of_use_policy_is_not_bypass() {
        let p = untrusted_only(grant_policy("p-tou", GrantOperator::Or, &[GrantControl::TermsOfUse]));
        let catalog = PolicyCatalog::new(vec![p]);
        let result = run(&catalog, &windows_trusted(), &[]);
        assert_eq!(result.count(Classification::GapTrustedLocationBypass), 0);
        assert_eq!(result.count(Classification::GapNoPolicy), result.scenarios_evaluated);
    }

    #[test]
    fn disabled_policy_warnings_reach_the_result() {
        let mut broken = Policy::new("p-broken", "Broken");
        broken.state = PolicyState::Disabled;
        broken.warnings.push("malformed policy detail: expected value".to_string());
        let catalog = PolicyCatalog::new(vec![broken, mfa_policy("p1")]);
        let result = run(&catalog, &windows_trusted(), &[]);
        assert_eq!(result.warnings, vec!["Broken: malformed policy detail: expected value"]);
    }

    #[test]
    fn empty_catalog_is_no_policy_gap() {
        let catalog = PolicyCatalog::new(Vec::new());
        let result = run(&catalog, &windows_trusted(), &[]);
        assert_eq!(result.count(Classification::GapNoPolicy), result.scenarios_evaluated);
        for c in Classification::ALL {
            assert!(result.counts.contains_key(&c), "missing count for {c:?}");
        }
    }

    #[test]
    fn held_risk_signal_is_signal_dependent_only() {
        let mut p = mfa_policy("p-risk");
        p.conditions.signin_risk = Some([RiskLevel::High].into_iter().collect::<BTreeSet<_>>());
        let catalog = PolicyCatalog::new(vec![p]);
        let base = Scenario {
            trusted_location: Some(false),
            ..windows_trusted()
        };
        let result = run(&catalog, &base, &[Dimension::SignInRisk]);
        assert_eq!(result.count(Classification::SignalDependentOnly), result.scenarios_evaluated);
        assert!(result.gaps.is_empty());
        assert!(result.signal_dependent[0].reason.contains("signin_risk"));
    }

    #[test]
    fn any_trusted_rule_flags_every_unenforced_trusted_scenario() {
        let catalog = PolicyCatalog::new(Vec::new());
        let config = AnalyzerConfig {
            trusted_location_rule: TrustedLocationRule::AnyTrusted,
            ..AnalyzerConfig::default()
        };
        let result = GapAnalyzer::new(&catalog, config)
            .analyze(&alice(), &windows_trusted(), &[])
            .unwrap();
        assert_eq!(result.count(Classification::GapTrustedLocationBypass), result.scenarios_evaluated);
    }

    #[test]
    fn truncation_and_sorted_gaps() {
        let catalog = PolicyCatalog::new(Vec::new());
        let config = AnalyzerConfig {
            max_scenarios: 25,
            workers: 3,
            ..AnalyzerConfig::default()
        };
        let base = Scenario::new(Target::Resource("All".to_string()));
        let result = GapAnalyzer::new(&catalog, config)
            .analyze(&alice(), &base, &[])
            .unwrap();
        assert!(result.truncated);
        assert_eq!(result.scenarios_evaluated, 25);
        assert_eq!(result.gaps.len(), 25);
        let indices: Vec<u64> = result.gaps.iter().map(|f| f.index).collect();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn analysis_is_idempotent() {
        let mut report = mfa_policy("p-report");
        report.state = PolicyState::ReportOnly;
        let catalog = PolicyCatalog::new(vec![untrusted_only(mfa_policy("p1")), report]);
        let base = Scenario::new(Target::Resource("All".to_string()));
        let a = run(&catalog, &base, &[]);
        let b = run(&catalog, &base, &[]);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn analyze_rejects_blank_target() {
        let catalog = PolicyCatalog::new(Vec::new());
        let base = Scenario::new(Target::Acr(String::new()));
        assert!(matches!(
            GapAnalyzer::new(&catalog, AnalyzerConfig::default()).analyze(&alice(), &base, &[]),
            Err(CaError::InvalidScenario { .. })
        ));
    }

    // ── Config ───────────────────────────────────────────────────────────────

    #[test]
    fn config_parses_kebab_case_rule() {
        let cfg = AnalyzerConfig::from_toml_str(
            r#"
            max_scenarios = 50
            workers = 2
            trusted_location_rule = "location-flip"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_scenarios, 50);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.trusted_location_rule, TrustedLocationRule::LocationFlip);
    }

    #[test]
    fn config_defaults_when_empty() {
        assert_eq!(AnalyzerConfig::from_toml_str("").unwrap(), AnalyzerConfig::default());
    }

    #[test]
    fn config_rejects_unknown_keys_and_zero_limit() {
        match AnalyzerConfig::from_toml_str("max_scenarioz = 5") {
            Err(CaError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse analyzer TOML"), "got: {reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
        assert!(matches!(
            AnalyzerConfig::from_toml_str("max_scenarios = 0"),
            Err(CaError::ConfigError { .. })
        ));
    }

    #[test]
    fn config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caprobe.toml");
        std::fs::write(&path, "trusted_location_rule = \"any-trusted\"\n").unwrap();
        let cfg = AnalyzerConfig::from_file(&path).unwrap();
        assert_eq!(cfg.trusted_location_rule, TrustedLocationRule::AnyTrusted);
        assert!(AnalyzerConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn rule_parses_from_cli_spelling() {
        assert_eq!(
            "explicit_exclusion".parse::<TrustedLocationRule>().unwrap(),
            TrustedLocationRule::ExplicitExclusion
        );
        assert!("sometimes".parse::<TrustedLocationRule>().is_err());
    }
}
