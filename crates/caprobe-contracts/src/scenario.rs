//! Sign-in scenarios and their condition dimensions.
//!
//! A `Scenario` is an immutable value describing one hypothetical sign-in.
//! Every condition dimension is an `Option`: `None` means "unspecified",
//! which is distinct from any concrete value (including `Some(false)`).
//! Matching an unspecified value against a real constraint yields
//! `Tri::Unknown`, never a guess.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CaError, CaResult};

// ── Dimension value domains ──────────────────────────────────────────────────

/// Device platform reported at sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
    Ios,
    Android,
}

impl Platform {
    /// Enumeration domain, in canonical order.
    pub const ALL: [Platform; 5] = [
        Platform::Windows,
        Platform::Macos,
        Platform::Linux,
        Platform::Ios,
        Platform::Android,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Macos => "macos",
            Platform::Linux => "linux",
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl FromStr for Platform {
    type Err = CaError;

    fn from_str(s: &str) -> CaResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "macos" | "mac" | "osx" => Ok(Platform::Macos),
            "linux" => Ok(Platform::Linux),
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(CaError::invalid_scenario(format!(
                "unrecognized platform '{other}'"
            ))),
        }
    }
}

/// Client application type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientApp {
    Browser,
    MobileAppsAndDesktopClients,
    ExchangeActiveSync,
    Other,
}

impl ClientApp {
    pub const ALL: [ClientApp; 4] = [
        ClientApp::Browser,
        ClientApp::MobileAppsAndDesktopClients,
        ClientApp::ExchangeActiveSync,
        ClientApp::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClientApp::Browser => "browser",
            ClientApp::MobileAppsAndDesktopClients => "mobileAppsAndDesktopClients",
            ClientApp::ExchangeActiveSync => "exchangeActiveSync",
            ClientApp::Other => "other",
        }
    }
}

impl FromStr for ClientApp {
    type Err = CaError;

    /// Accepts both Graph names and the RoadRecon internal client types.
    fn from_str(s: &str) -> CaResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(ClientApp::Browser),
            "mobileappsanddesktopclients" | "native" | "modern" => {
                Ok(ClientApp::MobileAppsAndDesktopClients)
            }
            "exchangeactivesync" | "eas" | "eassupported" | "easunsupported" => {
                Ok(ClientApp::ExchangeActiveSync)
            }
            "other" | "otherlegacy" | "otherclients" => Ok(ClientApp::Other),
            other => Err(CaError::invalid_scenario(format!(
                "unrecognized client app type '{other}'"
            ))),
        }
    }
}

/// Sign-in or user risk level. Compared by set membership, never magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::None,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = CaError;

    fn from_str(s: &str) -> CaResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "norisk" => Ok(RiskLevel::None),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(CaError::invalid_scenario(format!(
                "unrecognized risk level '{other}'"
            ))),
        }
    }
}

/// Authentication flow used by the sign-in. `Standard` is an ordinary
/// interactive sign-in that uses neither special flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    Standard,
    DeviceCode,
    AuthenticationTransfer,
}

impl AuthFlow {
    pub const ALL: [AuthFlow; 3] = [
        AuthFlow::Standard,
        AuthFlow::DeviceCode,
        AuthFlow::AuthenticationTransfer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuthFlow::Standard => "standard",
            AuthFlow::DeviceCode => "devicecodeflow",
            AuthFlow::AuthenticationTransfer => "authtransfer",
        }
    }
}

impl FromStr for AuthFlow {
    type Err = CaError;

    fn from_str(s: &str) -> CaResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "none" => Ok(AuthFlow::Standard),
            "devicecodeflow" | "devicecode" => Ok(AuthFlow::DeviceCode),
            "authtransfer" | "authenticationtransfer" => Ok(AuthFlow::AuthenticationTransfer),
            other => Err(CaError::invalid_scenario(format!(
                "unrecognized auth flow '{other}'"
            ))),
        }
    }
}

// ── Target ───────────────────────────────────────────────────────────────────

/// What the sign-in is for: a cloud app / resource, or a user action (ACR).
/// A scenario always carries exactly one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Resource(String),
    Acr(String),
}

impl Target {
    /// Build a target from the two optional front-end inputs.
    ///
    /// Blank strings count as absent. Returns `CaError::InvalidScenario` when
    /// both or neither are present.
    pub fn from_parts(resource: Option<&str>, acr: Option<&str>) -> CaResult<Self> {
        let resource = resource.map(str::trim).filter(|s| !s.is_empty());
        let acr = acr.map(str::trim).filter(|s| !s.is_empty());
        match (resource, acr) {
            (Some(_), Some(_)) => Err(CaError::invalid_scenario(
                "resource and acr are mutually exclusive (choose one)",
            )),
            (None, None) => Err(CaError::invalid_scenario(
                "a scenario needs either a resource or an acr",
            )),
            (Some(r), None) => Ok(Target::Resource(r.to_string())),
            (None, Some(a)) => Ok(Target::Acr(a.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Resource(r) => write!(f, "resource={r}"),
            Target::Acr(a) => write!(f, "acr={a}"),
        }
    }
}

// ── Dimensions ───────────────────────────────────────────────────────────────

/// A scenario condition dimension, listed in canonical enumeration order
/// (most significant first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Platform,
    ClientApp,
    TrustedLocation,
    #[serde(rename = "signin_risk")]
    SignInRisk,
    UserRisk,
    AuthFlow,
    DeviceFilter,
    DeviceCompliant,
    DeviceHybridJoined,
}

impl Dimension {
    pub const CANONICAL: [Dimension; 9] = [
        Dimension::Platform,
        Dimension::ClientApp,
        Dimension::TrustedLocation,
        Dimension::SignInRisk,
        Dimension::UserRisk,
        Dimension::AuthFlow,
        Dimension::DeviceFilter,
        Dimension::DeviceCompliant,
        Dimension::DeviceHybridJoined,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Platform => "platform",
            Dimension::ClientApp => "client_app",
            Dimension::TrustedLocation => "trusted_location",
            Dimension::SignInRisk => "signin_risk",
            Dimension::UserRisk => "user_risk",
            Dimension::AuthFlow => "auth_flow",
            Dimension::DeviceFilter => "device_filter",
            Dimension::DeviceCompliant => "device_compliant",
            Dimension::DeviceHybridJoined => "device_hybrid_joined",
        }
    }

    /// Number of concrete values the dimension can take.
    pub fn domain_size(self) -> usize {
        match self {
            Dimension::Platform => Platform::ALL.len(),
            Dimension::ClientApp => ClientApp::ALL.len(),
            Dimension::SignInRisk | Dimension::UserRisk => RiskLevel::ALL.len(),
            Dimension::AuthFlow => AuthFlow::ALL.len(),
            Dimension::TrustedLocation
            | Dimension::DeviceFilter
            | Dimension::DeviceCompliant
            | Dimension::DeviceHybridJoined => 2,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = CaError;

    fn from_str(s: &str) -> CaResult<Self> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Dimension::CANONICAL
            .into_iter()
            .find(|d| d.name() == key)
            .ok_or_else(|| CaError::invalid_scenario(format!("unrecognized dimension '{s}'")))
    }
}

// ── Scenario ─────────────────────────────────────────────────────────────────

/// Boolean domain in canonical order.
pub const BOOL_DOMAIN: [bool; 2] = [true, false];

/// One hypothetical sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scenario {
    /// The resource or user action being accessed.
    pub target: Target,
    pub platform: Option<Platform>,
    pub client_app: Option<ClientApp>,
    /// Whether the sign-in originates from a trusted named location.
    pub trusted_location: Option<bool>,
    pub signin_risk: Option<RiskLevel>,
    pub user_risk: Option<RiskLevel>,
    pub auth_flow: Option<AuthFlow>,
    /// Whether the device satisfies the policy's device filter rule.
    pub device_filter: Option<bool>,
    pub device_compliant: Option<bool>,
    pub device_hybrid_joined: Option<bool>,
}

impl Scenario {
    /// A scenario for `target` with every dimension unspecified.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            platform: None,
            client_app: None,
            trusted_location: None,
            signin_risk: None,
            user_risk: None,
            auth_flow: None,
            device_filter: None,
            device_compliant: None,
            device_hybrid_joined: None,
        }
    }

    /// Reject scenarios whose target names nothing.
    ///
    /// `Target::from_parts` already guarantees exactly one of resource and
    /// ACR; this catches targets built directly with a blank id.
    pub fn validate(&self) -> CaResult<()> {
        let id = match &self.target {
            Target::Resource(r) => r,
            Target::Acr(a) => a,
        };
        if id.trim().is_empty() {
            return Err(CaError::invalid_scenario("scenario target is blank"));
        }
        Ok(())
    }

    /// True when the caller supplied a value for `dim`.
    pub fn is_specified(&self, dim: Dimension) -> bool {
        match dim {
            Dimension::Platform => self.platform.is_some(),
            Dimension::ClientApp => self.client_app.is_some(),
            Dimension::TrustedLocation => self.trusted_location.is_some(),
            Dimension::SignInRisk => self.signin_risk.is_some(),
            Dimension::UserRisk => self.user_risk.is_some(),
            Dimension::AuthFlow => self.auth_flow.is_some(),
            Dimension::DeviceFilter => self.device_filter.is_some(),
            Dimension::DeviceCompliant => self.device_compliant.is_some(),
            Dimension::DeviceHybridJoined => self.device_hybrid_joined.is_some(),
        }
    }

    /// Set `dim` to the `index`-th value of its canonical domain.
    ///
    /// Returns `CaError::InvalidScenario` when `index` is outside the domain.
    pub fn set_domain_value(&mut self, dim: Dimension, index: usize) -> CaResult<()> {
        if index >= dim.domain_size() {
            return Err(CaError::invalid_scenario(format!(
                "index {index} is outside the {dim} domain"
            )));
        }
        match dim {
            Dimension::Platform => self.platform = Some(Platform::ALL[index]),
            Dimension::ClientApp => self.client_app = Some(ClientApp::ALL[index]),
            Dimension::TrustedLocation => self.trusted_location = Some(BOOL_DOMAIN[index]),
            Dimension::SignInRisk => self.signin_risk = Some(RiskLevel::ALL[index]),
            Dimension::UserRisk => self.user_risk = Some(RiskLevel::ALL[index]),
            Dimension::AuthFlow => self.auth_flow = Some(AuthFlow::ALL[index]),
            Dimension::DeviceFilter => self.device_filter = Some(BOOL_DOMAIN[index]),
            Dimension::DeviceCompliant => self.device_compliant = Some(BOOL_DOMAIN[index]),
            Dimension::DeviceHybridJoined => {
                self.device_hybrid_joined = Some(BOOL_DOMAIN[index])
            }
        }
        Ok(())
    }

    /// Render the value of `dim`, or `unspecified`.
    pub fn value_label(&self, dim: Dimension) -> String {
        fn opt<T>(v: Option<T>, f: impl Fn(T) -> String) -> String {
            v.map(f).unwrap_or_else(|| "unspecified".to_string())
        }
        match dim {
            Dimension::Platform => opt(self.platform, |p| p.as_str().to_string()),
            Dimension::ClientApp => opt(self.client_app, |c| c.as_str().to_string()),
            Dimension::TrustedLocation => opt(self.trusted_location, |b| b.to_string()),
            Dimension::SignInRisk => opt(self.signin_risk, |r| r.as_str().to_string()),
            Dimension::UserRisk => opt(self.user_risk, |r| r.as_str().to_string()),
            Dimension::AuthFlow => opt(self.auth_flow, |a| a.as_str().to_string()),
            Dimension::DeviceFilter => opt(self.device_filter, |b| b.to_string()),
            Dimension::DeviceCompliant => opt(self.device_compliant, |b| b.to_string()),
            Dimension::DeviceHybridJoined => opt(self.device_hybrid_joined, |b| b.to_string()),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        for dim in Dimension::CANONICAL {
            if self.is_specified(dim) {
                write!(f, " {}={}", dim, self.value_label(dim))?;
            }
        }
        Ok(())
    }
}
