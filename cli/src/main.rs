//! caprobe: offline Conditional Access what-if and gap analysis.
//!
//! Reads a RoadRecon database (or a JSON snapshot) and answers three
//! questions about one user without touching the tenant.
//!
//! Usage:
//!   caprobe get-policies -u alice@contoso.com --results all
//!   caprobe what-if -u alice@contoso.com --platform windows --trusted-location false
//!   caprobe analyze -u alice@contoso.com --resource All --hold signin_risk --output alice

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use caprobe_analyze::{
    analyzer::GapAnalyzer,
    config::{AnalyzerConfig, TrustedLocationRule},
};
use caprobe_catalog::open_store;
use caprobe_contracts::{
    error::{CaError, CaResult},
    identity::Identity,
    scenario::{Dimension, Scenario, Target},
};
use caprobe_core::{
    catalog::PolicyCatalog,
    evaluator::{Evaluator, PolicyQuery, ResultsMode},
    traits::CatalogLoader,
};
use caprobe_report::{
    analysis::{write_outputs, AnalysisText},
    listing::ListingView,
    what_if::WhatIfView,
};

/// Gaps listed in text output before the rest are elided.
const MAX_LISTED_FINDINGS: usize = 20;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Offline Conditional Access policy analysis.
#[derive(Parser)]
#[command(
    name = "caprobe",
    version,
    about = "Offline Conditional Access what-if and gap analysis",
    long_about = "Evaluates Conditional Access policies from a RoadRecon snapshot against\n\
                  hypothetical sign-ins. Unspecified signals are never guessed: a policy that\n\
                  depends on one is reported as signal-dependent."
)]
struct Cli {
    /// JSON snapshot to read instead of the RoadRecon database.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// RoadRecon SQLite database.
    #[arg(long, global = true, default_value = "roadrecon.db")]
    db: PathBuf,

    /// Analyzer configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the policies that target or exclude a user (scope only).
    GetPolicies(GetPoliciesArgs),
    /// Evaluate one hypothetical sign-in.
    WhatIf(WhatIfArgs),
    /// Enumerate sign-in scenarios and report coverage gaps.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct UserArgs {
    /// User principal name.
    #[arg(short = 'u', long = "user")]
    user: String,

    /// Treat the user as a member of this group as well (repeatable).
    #[arg(long = "assume-group", value_name = "GROUP_ID")]
    assume_groups: Vec<String>,

    /// Treat the user as holding this directory role as well (repeatable).
    #[arg(long = "assume-role", value_name = "ROLE_ID")]
    assume_roles: Vec<String>,
}

#[derive(Args)]
struct TargetArgs {
    /// Cloud app / resource id, or `All`.
    #[arg(long, conflicts_with = "acr")]
    resource: Option<String>,

    /// Authentication context (user action) id.
    #[arg(long)]
    acr: Option<String>,
}

/// Sign-in signals. `unknown` or `unset` leaves a signal unspecified.
#[derive(Args)]
struct SignalArgs {
    #[arg(long, value_name = "true|false")]
    trusted_location: Option<String>,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    client_app: Option<String>,
    #[arg(long)]
    signin_risk: Option<String>,
    #[arg(long)]
    user_risk: Option<String>,
    #[arg(long)]
    auth_flow: Option<String>,
    /// Whether the device satisfies the policy's device filter.
    #[arg(long, value_name = "true|false")]
    device_filter: Option<String>,
    #[arg(long, value_name = "true|false")]
    device_compliant: Option<String>,
    #[arg(long, value_name = "true|false")]
    hybrid_joined: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResultsArg {
    Applied,
    Exclusions,
    All,
}

impl From<ResultsArg> for ResultsMode {
    fn from(r: ResultsArg) -> Self {
        match r {
            ResultsArg::Applied => ResultsMode::Applied,
            ResultsArg::Exclusions => ResultsMode::Exclusions,
            ResultsArg::All => ResultsMode::All,
        }
    }
}

#[derive(Args)]
struct GetPoliciesArgs {
    #[command(flatten)]
    user: UserArgs,

    /// Only policies whose application condition covers this app id.
    #[arg(long)]
    app: Option<String>,

    #[arg(long, value_enum, default_value = "applied")]
    results: ResultsArg,

    /// Also list disabled policies that would target the user.
    #[arg(long)]
    include_disabled: bool,
}

#[derive(Args)]
struct WhatIfArgs {
    #[command(flatten)]
    user: UserArgs,

    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    signals: SignalArgs,

    /// Only show policies that apply whatever the unspecified signals are.
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    user: UserArgs,

    #[command(flatten)]
    target: TargetArgs,

    // Fixed signals; every other dimension is enumerated.
    #[command(flatten)]
    signals: SignalArgs,

    /// Keep this dimension unspecified instead of enumerating it (repeatable).
    #[arg(long = "hold", value_name = "DIMENSION")]
    hold: Vec<String>,

    #[arg(long)]
    max_scenarios: Option<u64>,

    /// Worker threads (0 = one per core).
    #[arg(long)]
    workers: Option<usize>,

    /// explicit-exclusion, location-flip or any-trusted.
    #[arg(long)]
    trusted_location_rule: Option<String>,

    /// Write PREFIX.summary.json and PREFIX.gaps.jsonl.
    #[arg(long, value_name = "PREFIX")]
    output: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for per-policy evaluation logs.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("caprobe: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CaResult<()> {
    let store = open_store(cli.snapshot.as_deref(), &cli.db)?;
    let catalog = PolicyCatalog::load(store.as_ref())?;
    debug!(policies = catalog.len(), "catalog ready");

    match cli.command {
        Command::GetPolicies(args) => get_policies(store.as_ref(), &catalog, &args, cli.json),
        Command::WhatIf(args) => what_if(store.as_ref(), &catalog, &args, cli.json),
        Command::Analyze(args) => analyze(
            store.as_ref(),
            &catalog,
            &args,
            cli.config.as_deref(),
            cli.json,
        ),
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn get_policies(
    store: &dyn CatalogLoader,
    catalog: &PolicyCatalog,
    args: &GetPoliciesArgs,
    json: bool,
) -> CaResult<()> {
    let identity = load_identity(store, &args.user)?;
    let query = PolicyQuery {
        results: args.results.into(),
        app: args.app.clone(),
        include_disabled: args.include_disabled,
    };
    let listing = Evaluator::new(catalog).get_policies(&identity, &query);
    emit(&ListingView::new(&listing, query.results), json)
}

fn what_if(
    store: &dyn CatalogLoader,
    catalog: &PolicyCatalog,
    args: &WhatIfArgs,
    json: bool,
) -> CaResult<()> {
    let target = match (&args.target.resource, &args.target.acr) {
        (None, None) => Target::Resource("All".to_string()),
        (resource, acr) => Target::from_parts(resource.as_deref(), acr.as_deref())?,
    };
    let scenario = build_scenario(target, &args.signals)?;
    let identity = load_identity(store, &args.user)?;
    let report = Evaluator::new(catalog).what_if(&identity, &scenario)?;
    emit(&WhatIfView::new(&report, args.strict), json)
}

fn analyze(
    store: &dyn CatalogLoader,
    catalog: &PolicyCatalog,
    args: &AnalyzeArgs,
    config_path: Option<&std::path::Path>,
    json: bool,
) -> CaResult<()> {
    let mut config = match config_path {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::default(),
    };
    if let Some(n) = args.max_scenarios {
        config.max_scenarios = n;
    }
    if let Some(n) = args.workers {
        config.workers = n;
    }
    if let Some(rule) = &args.trusted_location_rule {
        config.trusted_location_rule = rule.parse::<TrustedLocationRule>()?;
    }

    let target = Target::from_parts(args.target.resource.as_deref(), args.target.acr.as_deref())?;
    let base = build_scenario(target, &args.signals)?;
    let hold = args
        .hold
        .iter()
        .map(|d| d.parse::<Dimension>())
        .collect::<CaResult<Vec<_>>>()?;
    let identity = load_identity(store, &args.user)?;

    let result = GapAnalyzer::new(catalog, config).analyze(&identity, &base, &hold)?;

    if let Some(prefix) = &args.output {
        let paths = write_outputs(prefix, &result, Utc::now())?;
        if !json {
            println!("Wrote {}", paths.summary.display());
            println!("Wrote {}", paths.gaps.display());
            println!();
        }
    }

    if json {
        print_json(&result)
    } else {
        print!("{}", AnalysisText::new(&result, MAX_LISTED_FINDINGS));
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_identity(store: &dyn CatalogLoader, args: &UserArgs) -> CaResult<Identity> {
    Ok(store
        .load_identity(&args.user)?
        .with_assumed_groups(args.assume_groups.iter().cloned())
        .with_assumed_roles(args.assume_roles.iter().cloned()))
}

fn build_scenario(target: Target, s: &SignalArgs) -> CaResult<Scenario> {
    Ok(Scenario {
        trusted_location: flag("trusted-location", s.trusted_location.as_deref())?,
        platform: signal(s.platform.as_deref())?,
        client_app: signal(s.client_app.as_deref())?,
        signin_risk: signal(s.signin_risk.as_deref())?,
        user_risk: signal(s.user_risk.as_deref())?,
        auth_flow: signal(s.auth_flow.as_deref())?,
        device_filter: flag("device-filter", s.device_filter.as_deref())?,
        device_compliant: flag("device-compliant", s.device_compliant.as_deref())?,
        device_hybrid_joined: flag("hybrid-joined", s.hybrid_joined.as_deref())?,
        ..Scenario::new(target)
    })
}

fn is_unset(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("unknown") || raw.eq_ignore_ascii_case("unset")
}

fn signal<T: FromStr<Err = CaError>>(raw: Option<&str>) -> CaResult<Option<T>> {
    match raw.map(str::trim) {
        None => Ok(None),
        Some(v) if is_unset(v) => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

fn flag(name: &str, raw: Option<&str>) -> CaResult<Option<bool>> {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if is_unset(&v) => Ok(None),
        Some(v) => match v.as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(CaError::invalid_scenario(format!(
                "--{name} expects true, false or unknown, got '{v}'"
            ))),
        },
    }
}

fn emit<T: Serialize + std::fmt::Display>(value: &T, json: bool) -> CaResult<()> {
    if json {
        return print_json(value);
    }
    print!("{value}");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> CaResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CaError::Output {
        path: "stdout".to_string(),
        reason: e.to_string(),
    })?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caprobe_contracts::scenario::{Platform, RiskLevel};

    fn no_signals() -> SignalArgs {
        SignalArgs {
            trusted_location: None,
            platform: None,
            client_app: None,
            signin_risk: None,
            user_risk: None,
            auth_flow: None,
            device_filter: None,
            device_compliant: None,
            hybrid_joined: None,
        }
    }

    #[test]
    fn unknown_and_unset_leave_signals_unspecified() {
        let signals = SignalArgs {
            platform: Some("unknown".to_string()),
            trusted_location: Some("UNSET".to_string()),
            signin_risk: Some("high".to_string()),
            ..no_signals()
        };
        let s = build_scenario(Target::Resource("All".to_string()), &signals).unwrap();
        assert_eq!(s.platform, None);
        assert_eq!(s.trusted_location, None);
        assert_eq!(s.signin_risk, Some(RiskLevel::High));
    }

    #[test]
    fn false_is_a_value_not_unspecified() {
        let signals = SignalArgs {
            device_compliant: Some("false".to_string()),
            platform: Some("Windows".to_string()),
            ..no_signals()
        };
        let s = build_scenario(Target::Resource("All".to_string()), &signals).unwrap();
        assert_eq!(s.device_compliant, Some(false));
        assert_eq!(s.platform, Some(Platform::Windows));
    }

    #[test]
    fn bad_values_are_invalid_scenarios() {
        match flag("trusted-location", Some("maybe")) {
            Err(CaError::InvalidScenario { reason }) => {
                assert!(reason.contains("--trusted-location"), "got: {reason}")
            }
            other => panic!("expected InvalidScenario, got {:?}", other),
        }
        assert!(signal::<Platform>(Some("beos")).is_err());
    }

    #[test]
    fn cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "caprobe",
            "--snapshot",
            "tenant.json",
            "analyze",
            "-u",
            "alice@contoso.com",
            "--acr",
            "c1",
            "--hold",
            "signin_risk",
            "--hold",
            "user-risk",
            "--max-scenarios",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("tenant.json")));
        match cli.command {
            Command::Analyze(args) => {
                assert_eq!(args.hold.len(), 2);
                assert_eq!(args.max_scenarios, Some(50));
                assert_eq!(args.target.acr.as_deref(), Some("c1"));
            }
            _ => panic!("expected analyze subcommand"),
        }
    }

    #[test]
    fn cli_rejects_resource_with_acr() {
        assert!(Cli::try_parse_from([
            "caprobe", "what-if", "-u", "a@b.c", "--resource", "All", "--acr", "c1",
        ])
        .is_err());
    }
}
