//! Gap analysis presentation and the `--output` report files.
//!
//! `PREFIX.summary.json` holds an `AnalysisSummary` (pretty JSON).
//! `PREFIX.gaps.jsonl` holds one gap `Finding` per line, in scenario order.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use caprobe_contracts::{
    analysis::{AnalysisResult, Classification, Finding},
    error::{CaError, CaResult},
    scenario::Target,
};

/// Headline numbers of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary<'a> {
    pub generated_at: DateTime<Utc>,
    pub user: &'a str,
    pub target: &'a Target,
    pub scenarios_total: u64,
    pub scenarios_evaluated: u64,
    pub max_scenarios: u64,
    pub truncated: bool,
    pub gap_count: usize,
    pub signal_dependent_count: usize,
    pub counts: &'a BTreeMap<Classification, u64>,
    pub warnings: &'a [String],
}

impl<'a> AnalysisSummary<'a> {
    pub fn new(result: &'a AnalysisResult, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            user: &result.user,
            target: &result.target,
            scenarios_total: result.scenarios_total,
            scenarios_evaluated: result.scenarios_evaluated,
            max_scenarios: result.max_scenarios,
            truncated: result.truncated,
            gap_count: result.gaps.len(),
            signal_dependent_count: result.signal_dependent.len(),
            counts: &result.counts,
            warnings: &result.warnings,
        }
    }
}

/// Paths of the files `write_outputs` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub summary: PathBuf,
    pub gaps: PathBuf,
}

/// Write `PREFIX.summary.json` and `PREFIX.gaps.jsonl`.
///
/// # Errors
///
/// Returns `CaError::Output` when either file cannot be created or written.
pub fn write_outputs(
    prefix: &Path,
    result: &AnalysisResult,
    generated_at: DateTime<Utc>,
) -> CaResult<OutputPaths> {
    let paths = OutputPaths {
        summary: with_suffix(prefix, "summary.json"),
        gaps: with_suffix(prefix, "gaps.jsonl"),
    };

    let summary = AnalysisSummary::new(result, generated_at);
    let json = serde_json::to_string_pretty(&summary).map_err(|e| output_error(&paths.summary, e))?;
    fs::write(&paths.summary, json + "\n").map_err(|e| output_error(&paths.summary, e))?;

    let file = fs::File::create(&paths.gaps).map_err(|e| output_error(&paths.gaps, e))?;
    let mut out = BufWriter::new(file);
    for gap in &result.gaps {
        serde_json::to_writer(&mut out, gap).map_err(|e| output_error(&paths.gaps, e))?;
        out.write_all(b"\n")
            .map_err(|e| output_error(&paths.gaps, e))?;
    }
    out.flush().map_err(|e| output_error(&paths.gaps, e))?;

    info!(
        summary = %paths.summary.display(),
        gaps = %paths.gaps.display(),
        findings = result.gaps.len(),
        "analysis outputs written"
    );
    Ok(paths)
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn output_error(path: &Path, e: impl fmt::Display) -> CaError {
    CaError::Output {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

// ── Text ─────────────────────────────────────────────────────────────────────

/// Plain-text rendering of an analysis result, listing at most
/// `max_findings` gaps.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisText<'a> {
    result: &'a AnalysisResult,
    max_findings: usize,
}

impl<'a> AnalysisText<'a> {
    pub fn new(result: &'a AnalysisResult, max_findings: usize) -> Self {
        Self {
            result,
            max_findings,
        }
    }
}

impl fmt::Display for AnalysisText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;
        writeln!(f, "User:      {}", r.user)?;
        writeln!(f, "Target:    {}", r.target)?;
        writeln!(
            f,
            "Scenarios: {} of {} evaluated (limit {})",
            r.scenarios_evaluated, r.scenarios_total, r.max_scenarios
        )?;
        if r.truncated {
            writeln!(f, "WARNING: scenario space truncated; coverage is partial")?;
        }

        writeln!(f, "\n=== Classification counts ===\n")?;
        for c in Classification::ALL {
            writeln!(f, "  {:<28} {}", c.as_str(), r.count(c))?;
        }

        writeln!(f, "\n=== Gaps ===\n")?;
        if r.gaps.is_empty() {
            writeln!(f, "(none)")?;
        }
        for gap in r.gaps.iter().take(self.max_findings) {
            finding(f, gap)?;
        }
        if r.gaps.len() > self.max_findings {
            writeln!(
                f,
                "... {} more gap(s); use --output to write them all",
                r.gaps.len() - self.max_findings
            )?;
        }

        if !r.warnings.is_empty() {
            writeln!(f, "\n=== Policy warnings ===\n")?;
            for w in &r.warnings {
                writeln!(f, "  {w}")?;
            }
        }
        Ok(())
    }
}

fn finding(f: &mut fmt::Formatter<'_>, gap: &Finding) -> fmt::Result {
    writeln!(f, "#{} {}", gap.index, gap.classification.as_str())?;
    writeln!(f, "  Scenario: {}", gap.scenario)?;
    writeln!(f, "  Reason:   {}", gap.reason)?;
    writeln!(f)
}
