//! Target platform enumeration
//!
//! The closed set of deployment targets the harness knows about. The value
//! is chosen once when a suite is configured and used as the dispatch key
//! when wiring concrete operators.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Deployment target of the system under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformType {
    /// Deployed on a Kubernetes cluster (default)
    Kubernetes,
    /// Deployed directly on hosts
    BareMetal,
    /// Single-process standalone deployment
    StandAlone,
    /// No platform
    None,
}

impl PlatformType {
    /// Every platform in declaration order
    pub const ALL: [PlatformType; 4] = [
        PlatformType::Kubernetes,
        PlatformType::BareMetal,
        PlatformType::StandAlone,
        PlatformType::None,
    ];

    /// Canonical name of the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Kubernetes => "Kubernetes",
            PlatformType::BareMetal => "BareMetal",
            PlatformType::StandAlone => "StandAlone",
            PlatformType::None => "None",
        }
    }
}

impl Default for PlatformType {
    fn default() -> Self {
        PlatformType::Kubernetes
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = Error;

    /// Case-insensitive lookup over the closed set
    fn from_str(name: &str) -> Result<Self> {
        PlatformType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnsupportedPlatform(name.to_string()))
    }
}

impl TryFrom<String> for PlatformType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PlatformType> for String {
    fn from(platform: PlatformType) -> Self {
        platform.as_str().to_string()
    }
}
