use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::intel::IntelSettings;
use crate::scorer::ScoringConfig;

pub const DEFAULT_USER_AGENT: &str = "QRious/1.0";
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Everything needed to construct an analyzer, typically loaded by the CLI via `config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub resolver: ResolverConfig,
    pub scoring: ScoringConfig,
    pub cache: CacheConfig,
    pub intel: IntelSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of redirect transitions to follow.
    pub max_depth: usize,
    /// Per-hop timeout; doubled for shortener hosts.
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Cap on bytes read when scanning a body for client-side redirects.
    pub max_body_bytes: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            timeout_ms: 5_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 60 * 60,
            sweep_interval_secs: 10 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Clamped to `1s..=1 day` so the sweeper timer always fits the clock.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.clamp(1, MAX_SWEEP_INTERVAL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.resolver.max_depth, 10);
        assert_eq!(config.resolver.timeout_ms, 5_000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3_600));
        assert_eq!(config.scoring.external_penalty, 30);
        assert!(config.intel.safe_browsing_api_key.is_none());
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{"resolver": {"max_depth": 3}, "cache": {"enabled": false}}"#)
                .unwrap();
        assert_eq!(config.resolver.max_depth, 3);
        assert_eq!(config.resolver.timeout_ms, 5_000);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(600));
    }

    #[test]
    fn extreme_cache_settings_stay_in_range() {
        let cache = CacheConfig {
            enabled: true,
            ttl_secs: u64::MAX,
            sweep_interval_secs: u64::MAX,
        };
        assert_eq!(cache.ttl(), Duration::from_secs(u64::MAX));
        assert_eq!(cache.sweep_interval(), Duration::from_secs(24 * 60 * 60));
        let zero = CacheConfig {
            sweep_interval_secs: 0,
            ..CacheConfig::default()
        };
        assert_eq!(zero.sweep_interval(), Duration::from_secs(1));
    }
}
