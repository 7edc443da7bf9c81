//! Error types shared by every caprobe crate.
//!
//! All fallible operations return `CaResult<T>`. Per-policy problems found
//! while normalizing a snapshot are NOT errors: they travel as warnings on the
//! policy and its verdicts so one malformed policy cannot hide the rest.

use thiserror::Error;

/// The unified error type for caprobe.
#[derive(Debug, Error)]
pub enum CaError {
    /// The sign-in scenario is malformed: both or neither of resource and ACR
    /// were given, or a dimension carries a value outside its domain.
    #[error("invalid scenario: {reason}")]
    InvalidScenario { reason: String },

    /// No user with this UPN exists in the snapshot.
    #[error("identity '{upn}' not found in snapshot")]
    IdentityNotFound { upn: String },

    /// An identity record is missing the fields scope resolution needs.
    #[error("invalid identity: {reason}")]
    InvalidIdentity { reason: String },

    /// The snapshot store is missing, unreadable, or corrupt.
    #[error("snapshot store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Analyzer configuration is malformed or out of range.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The analyzer could not run (e.g. its worker pool failed to start).
    #[error("analysis failed: {reason}")]
    Analysis { reason: String },

    /// A report file could not be written.
    #[error("failed to write output '{path}': {reason}")]
    Output { path: String, reason: String },
}

impl CaError {
    /// Shorthand for an `InvalidScenario` error.
    pub fn invalid_scenario(reason: impl Into<String>) -> Self {
        Self::InvalidScenario {
            reason: reason.into(),
        }
    }

    /// Shorthand for a `StoreUnavailable` error.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the caprobe crates.
pub type CaResult<T> = Result<T, CaError>;
