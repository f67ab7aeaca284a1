use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Credentials and endpoints for the optional threat-intelligence lookups.
///
/// A provider is enabled only when its API key is present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelSettings {
    pub safe_browsing_api_key: Option<String>,
    pub safe_browsing_endpoint: Option<String>,
    pub virustotal_api_key: Option<String>,
    pub virustotal_endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for IntelSettings {
    fn default() -> Self {
        Self {
            safe_browsing_api_key: None,
            safe_browsing_endpoint: None,
            virustotal_api_key: None,
            virustotal_endpoint: None,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl IntelSettings {
    pub const SAFE_BROWSING_KEY_ENV: &'static str = "GOOGLE_SAFE_BROWSING_API_KEY";
    pub const VIRUSTOTAL_KEY_ENV: &'static str = "VIRUSTOTAL_API_KEY";
    pub const SAFE_BROWSING_ENDPOINT_ENV: &'static str = "QRIOUS_SAFE_BROWSING_ENDPOINT";
    pub const VIRUSTOTAL_ENDPOINT_ENV: &'static str = "QRIOUS_VIRUSTOTAL_ENDPOINT";
    pub const TIMEOUT_ENV: &'static str = "QRIOUS_INTEL_TIMEOUT_SECS";
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Load settings from environment variables.
    ///
    /// * `GOOGLE_SAFE_BROWSING_API_KEY` enables the Safe Browsing lookup.
    /// * `VIRUSTOTAL_API_KEY` enables the VirusTotal lookup.
    /// * `QRIOUS_SAFE_BROWSING_ENDPOINT` / `QRIOUS_VIRUSTOTAL_ENDPOINT` override base URLs.
    /// * `QRIOUS_INTEL_TIMEOUT_SECS` bounds each lookup (default: 10).
    pub fn from_env() -> Self {
        Self::from_map(&std::env::vars().collect())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        let value = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            safe_browsing_api_key: value(Self::SAFE_BROWSING_KEY_ENV),
            safe_browsing_endpoint: value(Self::SAFE_BROWSING_ENDPOINT_ENV),
            virustotal_api_key: value(Self::VIRUSTOTAL_KEY_ENV),
            virustotal_endpoint: value(Self::VIRUSTOTAL_ENDPOINT_ENV),
            timeout_secs: value(Self::TIMEOUT_ENV)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Fill unset fields from the process environment; explicit values win.
    pub fn with_env_fallback(self) -> Self {
        self.merge(Self::from_env())
    }

    fn merge(self, fallback: Self) -> Self {
        let timeout_secs = if self.timeout_secs == Self::DEFAULT_TIMEOUT_SECS {
            fallback.timeout_secs
        } else {
            self.timeout_secs
        };
        Self {
            safe_browsing_api_key: non_blank(self.safe_browsing_api_key)
                .or(fallback.safe_browsing_api_key),
            safe_browsing_endpoint: non_blank(self.safe_browsing_endpoint)
                .or(fallback.safe_browsing_endpoint),
            virustotal_api_key: non_blank(self.virustotal_api_key).or(fallback.virustotal_api_key),
            virustotal_endpoint: non_blank(self.virustotal_endpoint)
                .or(fallback.virustotal_endpoint),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn safe_browsing_enabled(&self) -> bool {
        non_blank(self.safe_browsing_api_key.clone()).is_some()
    }

    pub fn virustotal_enabled(&self) -> bool {
        non_blank(self.virustotal_api_key.clone()).is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
