use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::resolver::{RedirectChainItem, ResolutionResult};

pub mod default_scorer;
/// Static URL checks evaluated without network access.
pub mod heuristics;

/// Score thresholds that map a clamped trust score into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictThresholds {
    pub safe: u8,
    pub suspicious: u8,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            safe: 80,
            suspicious: 50,
        }
    }
}

/// Categorical safety classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Suspicious,
    Dangerous,
}

impl Verdict {
    /// Map a trust score (0–100) into a verdict using the default thresholds.
    pub fn from_score(score: u8) -> Self {
        Self::from_score_with_thresholds(score, &VerdictThresholds::default())
    }

    pub fn from_score_with_thresholds(score: u8, thresholds: &VerdictThresholds) -> Self {
        if score >= thresholds.safe {
            Self::Safe
        } else if score >= thresholds.suspicious {
            Self::Suspicious
        } else {
            Self::Dangerous
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Suspicious => "suspicious",
            Self::Dangerous => "dangerous",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a heuristic and carries its point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicKind {
    Https,
    SuspiciousTld,
    IpLiteralHost,
    ShortenerPattern,
    RedirectDepth,
    Obfuscation,
    DomainReputation,
    /// Replaces every other heuristic when the URL cannot be parsed.
    UrlValidity,
}

impl HeuristicKind {
    pub const fn weight(self) -> u32 {
        match self {
            Self::Https => 20,
            Self::SuspiciousTld => 15,
            Self::IpLiteralHost => 25,
            Self::ShortenerPattern => 10,
            Self::RedirectDepth => 10,
            Self::Obfuscation => 10,
            Self::DomainReputation => 10,
            Self::UrlValidity => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::SuspiciousTld => "suspicious_tld",
            Self::IpLiteralHost => "ip_literal_host",
            Self::ShortenerPattern => "shortener_pattern",
            Self::RedirectDepth => "redirect_depth",
            Self::Obfuscation => "obfuscation",
            Self::DomainReputation => "domain_reputation",
            Self::UrlValidity => "url_validity",
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one heuristic. `reason` is set only on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicCheck {
    pub name: HeuristicKind,
    pub weight: u32,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HeuristicCheck {
    pub fn pass(kind: HeuristicKind) -> Self {
        Self {
            name: kind,
            weight: kind.weight(),
            passed: true,
            reason: None,
        }
    }

    pub fn fail(kind: HeuristicKind, reason: Option<String>) -> Self {
        Self {
            name: kind,
            weight: kind.weight(),
            passed: false,
            reason,
        }
    }

    /// Pass when `passed`, otherwise fail with the lazily built reason.
    pub fn evaluate(kind: HeuristicKind, passed: bool, reason: impl FnOnce() -> String) -> Self {
        if passed {
            Self::pass(kind)
        } else {
            Self::fail(kind, Some(reason()))
        }
    }
}

/// Outcome of one external threat-intelligence lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCheckResult {
    pub provider: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExternalCheckResult {
    pub fn pass(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            passed: true,
            reason: None,
        }
    }

    pub fn fail(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Every check that contributed to a score, for explainability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub heuristics: Vec<HeuristicCheck>,
    pub external: Vec<ExternalCheckResult>,
    /// Score before clamping to 0..=100.
    pub raw_score: i64,
}

/// Tunable configuration for trust scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: VerdictThresholds,
    /// Points deducted per failed external check.
    pub external_penalty: u32,
    /// A failed heuristic at or above this weight forces a dangerous verdict.
    pub critical_weight: u32,
    /// Chains longer than this fail the redirect-depth heuristic.
    pub max_redirect_hops: usize,
    pub max_path_len: usize,
    /// Limit on `%`, `&`, `?` and `=` characters in the URL.
    pub max_special_chars: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thresholds: VerdictThresholds::default(),
            external_penalty: 30,
            critical_weight: 20,
            max_redirect_hops: 3,
            max_path_len: 200,
            max_special_chars: 10,
        }
    }
}

/// Score, verdict and reasons for a single URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustAssessment {
    pub trust_score: u8,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

/// End-to-end result: the assessment plus the resolver output it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub trust_score: u8,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub expanded_url: String,
    pub redirect_chain: Vec<RedirectChainItem>,
    #[serde(default)]
    pub breakdown: ScoreBreakdown,
}

impl AnalysisResult {
    pub fn new(assessment: TrustAssessment, resolution: ResolutionResult) -> Self {
        Self {
            trust_score: assessment.trust_score,
            verdict: assessment.verdict,
            reasons: assessment.reasons,
            expanded_url: resolution.final_url,
            redirect_chain: resolution.redirect_chain,
            breakdown: assessment.breakdown,
        }
    }
}

/// Scores a resolved URL. Implementations never fail; errors degrade into check outcomes.
#[async_trait]
pub trait UrlScorer: Send + Sync {
    async fn score(&self, final_url: &str, redirect_chain: &[RedirectChainItem])
        -> TrustAssessment;
}
