//! Tolerant serde structures for RoadRecon `policyDetail` documents.
//!
//! Every field is optional and every value list accepts either a single
//! string or an array, because real snapshots mix both shapes. Interpretation
//! of the tokens happens in `normalize`, not here.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use caprobe_contracts::error::{CaError, CaResult};

/// A string-or-list value. Non-string array entries are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens(pub Vec<String>);

impl Tokens {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Case-insensitive membership test.
    pub fn has(&self, token: &str) -> bool {
        self.iter().any(|t| t.eq_ignore_ascii_case(token))
    }
}

impl<'de> Deserialize<'de> for Tokens {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let tokens = match value {
            Value::String(s) => vec![s],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(Tokens(
            tokens
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        ))
    }
}

/// One policy detail document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawDetail {
    pub state: Option<String>,
    pub conditions: RawConditions,
    pub controls: Vec<RawControlBlock>,
    pub session_controls: Tokens,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawConditions {
    pub users: Option<RawIncludeExclude>,
    pub applications: Option<RawIncludeExclude>,
    pub locations: Option<RawIncludeExclude>,
    /// Graph-style platform key.
    pub platforms: Option<RawIncludeExclude>,
    /// RoadRecon-style platform key; wins over `Platforms` when present.
    pub device_platforms: Option<RawIncludeExclude>,
    pub client_types: Option<RawIncludeExclude>,
    /// Graph-style flat client app list.
    pub client_app_types: Tokens,
    pub sign_in_risks: Option<RawIncludeExclude>,
    pub user_risks: Option<RawIncludeExclude>,
    pub auth_flows: Option<RawIncludeExclude>,
    pub devices: Option<RawDevices>,
    pub device_states: Option<RawIncludeExclude>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawIncludeExclude {
    pub include: Vec<RawBlock>,
    pub exclude: Vec<RawBlock>,
}

/// A condition block. Each condition uses only the keys relevant to it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawBlock {
    pub users: Tokens,
    pub groups: Tokens,
    pub directory_roles: Tokens,
    pub roles: Tokens,
    pub role_template_ids: Tokens,
    pub applications: Tokens,
    pub acrs: Tokens,
    pub user_actions: Tokens,
    pub locations: Tokens,
    pub platforms: Tokens,
    pub device_platforms: Tokens,
    pub client_types: Tokens,
    pub sign_in_risks: Tokens,
    pub user_risks: Tokens,
    pub auth_flows: Tokens,
    pub device_states: Tokens,
    pub device_rule: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawDevices {
    pub include: Vec<RawBlock>,
    pub exclude: Vec<RawBlock>,
    pub filter: Option<RawDeviceFilter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawDeviceFilter {
    pub mode: Option<String>,
    pub rule: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawControlBlock {
    pub control: Tokens,
    pub grant_controls: Tokens,
    pub auth_strength_ids: Tokens,
    pub session_controls: Tokens,
    pub operator: Option<String>,
}

/// Parse a `policyDetail` column value into its detail documents.
///
/// RoadRecon stores a JSON list of JSON-encoded strings; snapshot files may
/// hold the documents inline. Both, and a bare single document, are accepted.
/// Each document parses independently so one broken entry does not hide the
/// others.
pub fn parse_details(value: &Value) -> Vec<CaResult<RawDetail>> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(parse_one).collect(),
        other => vec![parse_one(other)],
    }
}

fn parse_one(value: &Value) -> CaResult<RawDetail> {
    let parsed = match value {
        Value::String(text) => serde_json::from_str::<RawDetail>(text),
        other => RawDetail::deserialize(other),
    };
    parsed.map_err(|e| CaError::ConfigError {
        reason: format!("malformed policy detail: {e}"),
    })
}
