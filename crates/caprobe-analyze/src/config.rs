//! Analyzer configuration, loaded from TOML.
//!
//! ```toml
//! max_scenarios = 1000
//! workers = 0                               # 0 = one per core
//! trusted_location_rule = "explicit-exclusion"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use caprobe_contracts::error::{CaError, CaResult};

/// Default scenario cap per analyze run.
pub const DEFAULT_MAX_SCENARIOS: u64 = 1000;

/// When a trusted-location sign-in counts as a bypass.
///
/// Every rule only fires for scenarios with `trusted_location = true` that
/// are not already enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustedLocationRule {
    /// An enabled policy that excludes "all trusted locations" would enforce
    /// a control if the sign-in were untrusted.
    #[default]
    ExplicitExclusion,
    /// Any enabled policy would enforce a control if the sign-in were
    /// untrusted, whatever its location condition names.
    LocationFlip,
    /// Every unenforced trusted-location scenario is a bypass.
    AnyTrusted,
}

impl TrustedLocationRule {
    pub fn as_str(self) -> &'static str {
        match self {
            TrustedLocationRule::ExplicitExclusion => "explicit-exclusion",
            TrustedLocationRule::LocationFlip => "location-flip",
            TrustedLocationRule::AnyTrusted => "any-trusted",
        }
    }
}

impl fmt::Display for TrustedLocationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustedLocationRule {
    type Err = CaError;

    fn from_str(s: &str) -> CaResult<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "explicit-exclusion" => Ok(TrustedLocationRule::ExplicitExclusion),
            "location-flip" => Ok(TrustedLocationRule::LocationFlip),
            "any-trusted" => Ok(TrustedLocationRule::AnyTrusted),
            other => Err(CaError::ConfigError {
                reason: format!("unknown trusted location rule '{other}'"),
            }),
        }
    }
}

/// Settings for one analyze run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub max_scenarios: u64,
    /// Worker threads; 0 lets the pool pick one per core.
    pub workers: usize,
    pub trusted_location_rule: TrustedLocationRule,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_scenarios: DEFAULT_MAX_SCENARIOS,
            workers: 0,
            trusted_location_rule: TrustedLocationRule::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `CaError::ConfigError` if the TOML is malformed, names an
    /// unknown key, or sets `max_scenarios` to zero.
    pub fn from_toml_str(s: &str) -> CaResult<Self> {
        let config: AnalyzerConfig = toml::from_str(s).map_err(|e| CaError::ConfigError {
            reason: format!("failed to parse analyzer TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as analyzer configuration.
    ///
    /// # Errors
    ///
    /// Returns `CaError::ConfigError` if the file cannot be read or is not
    /// valid configuration.
    pub fn from_file(path: &Path) -> CaResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CaError::ConfigError {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> CaResult<()> {
        if self.max_scenarios == 0 {
            return Err(CaError::ConfigError {
                reason: "max_scenarios must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
