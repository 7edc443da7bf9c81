//! # caprobe-contracts
//!
//! Shared types, verdicts, and errors for the caprobe Conditional Access
//! analyzer.
//!
//! All crates in the workspace import from here. Apart from the three-valued
//! logic operators and small value helpers, no evaluation logic lives in this
//! crate.

pub mod analysis;
pub mod error;
pub mod identity;
pub mod logic;
pub mod policy;
pub mod scenario;
pub mod verdict;
