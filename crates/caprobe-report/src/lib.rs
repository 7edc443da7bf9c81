//! # caprobe-report
//!
//! Read-only projections of engine results for people and scripts. Every
//! view borrows from the result it presents; nothing here evaluates.
//!
//! - [`what_if::WhatIfView`]: verdicts bucketed into definitive,
//!   signal-dependent and excluded policies
//! - [`listing::ListingView`]: the get-policies listing with counts
//! - [`analysis::AnalysisSummary`] / [`analysis::AnalysisText`]: analysis
//!   headline and text rendering, plus [`analysis::write_outputs`]
//!
//! Views serialize with `serde_json` for `--json` and implement `Display`
//! for the plain-text form.

pub mod analysis;
pub mod listing;
pub mod what_if;

pub(crate) fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}
