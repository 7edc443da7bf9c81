//! Get-policies presentation.

use std::fmt;

use serde::Serialize;

use caprobe_contracts::policy::GrantControl;
use caprobe_core::evaluator::{PolicyListing, ResultsMode, ScopedPolicy};

/// A policy listing plus the counts shown alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView<'a> {
    pub user: &'a str,
    pub results: &'static str,
    pub applied: &'a [ScopedPolicy],
    pub excluded: &'a [ScopedPolicy],
    #[serde(skip_serializing_if = "crate::is_empty")]
    pub disabled: &'a [ScopedPolicy],
    pub applied_count: usize,
    pub excluded_count: usize,
    pub disabled_count: usize,
    #[serde(skip)]
    mode: ResultsMode,
}

impl<'a> ListingView<'a> {
    pub fn new(listing: &'a PolicyListing, mode: ResultsMode) -> Self {
        Self {
            user: &listing.user,
            results: mode_name(mode),
            applied: &listing.applied,
            excluded: &listing.excluded,
            disabled: &listing.disabled,
            applied_count: listing.applied.len(),
            excluded_count: listing.excluded.len(),
            disabled_count: listing.disabled.len(),
            mode,
        }
    }
}

pub fn mode_name(mode: ResultsMode) -> &'static str {
    match mode {
        ResultsMode::Applied => "applied",
        ResultsMode::Exclusions => "exclusions",
        ResultsMode::All => "all",
    }
}

impl fmt::Display for ListingView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "User: {}", self.user)?;
        if matches!(self.mode, ResultsMode::Applied | ResultsMode::All) {
            section(f, "Applied", self.applied)?;
        }
        if matches!(self.mode, ResultsMode::Exclusions | ResultsMode::All) {
            section(f, "Excluded", self.excluded)?;
        }
        if !self.disabled.is_empty() {
            section(f, "Disabled (would apply if enabled)", self.disabled)?;
        }
        writeln!(
            f,
            "{} applied, {} excluded, {} disabled",
            self.applied_count, self.excluded_count, self.disabled_count
        )
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str, policies: &[ScopedPolicy]) -> fmt::Result {
    writeln!(f, "\n=== {title} ===\n")?;
    if policies.is_empty() {
        return writeln!(f, "(none)\n");
    }
    for p in policies {
        writeln!(f, "- {} ({})", p.display_name, p.policy_id)?;
        writeln!(f, "  State:    {}", p.state.as_str())?;
        if !p.controls.is_empty() {
            let names: Vec<&str> = p.controls.iter().map(|c: &GrantControl| c.as_str()).collect();
            writeln!(f, "  Controls: {}", names.join(", "))?;
        }
        writeln!(f, "  Reason:   {}", p.reason)?;
        for w in &p.warnings {
            writeln!(f, "  Warning:  {w}")?;
        }
        writeln!(f)?;
    }
    Ok(())
}
