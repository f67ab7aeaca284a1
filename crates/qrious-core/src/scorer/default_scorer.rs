use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use super::heuristics::run_heuristics;
use super::{
    ExternalCheckResult, HeuristicCheck, HeuristicKind, ScoreBreakdown, ScoringConfig,
    TrustAssessment, UrlScorer, Verdict,
};
use crate::domains::DomainClassifier;
use crate::intel::ExternalCheck;
use crate::resolver::RedirectChainItem;

const NO_ISSUES_REASON: &str = "No security issues detected";

/// Scorer combining static heuristics with any configured external checks.
pub struct DefaultTrustScorer {
    domains: Arc<DomainClassifier>,
    checks: Vec<Arc<dyn ExternalCheck>>,
    config: ScoringConfig,
}

impl DefaultTrustScorer {
    pub fn new(domains: Arc<DomainClassifier>) -> Self {
        Self::with_config(domains, ScoringConfig::default())
    }

    pub fn with_config(domains: Arc<DomainClassifier>, config: ScoringConfig) -> Self {
        Self {
            domains,
            checks: Vec::new(),
            config,
        }
    }

    pub fn with_external_checks(mut self, checks: Vec<Arc<dyn ExternalCheck>>) -> Self {
        self.checks = checks;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Every check runs concurrently under its own timeout; a timeout counts as a pass.
    async fn run_external_checks(&self, url: &str) -> Vec<ExternalCheckResult> {
        let pending = self.checks.iter().map(|check| async move {
            match tokio::time::timeout(check.timeout(), check.invoke(url)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(provider = check.name(), "external check timed out; treating as pass");
                    ExternalCheckResult::pass(check.name())
                }
            }
        });
        join_all(pending).await
    }

    pub(crate) fn assess(
        &self,
        heuristics: Vec<HeuristicCheck>,
        external: Vec<ExternalCheckResult>,
    ) -> TrustAssessment {
        let heuristic_penalty: i64 = heuristics
            .iter()
            .filter(|check| !check.passed)
            .map(|check| i64::from(check.weight))
            .sum();
        let failed_external = external.iter().filter(|check| !check.passed).count() as i64;
        let raw_score =
            100 - heuristic_penalty - failed_external * i64::from(self.config.external_penalty);
        let trust_score = raw_score.clamp(0, 100) as u8;

        let verdict = if failed_external > 0 {
            Verdict::Dangerous
        } else if heuristics
            .iter()
            .any(|check| !check.passed && check.weight >= self.config.critical_weight)
        {
            Verdict::Dangerous
        } else {
            Verdict::from_score_with_thresholds(trust_score, &self.config.thresholds)
        };

        let reasons = collect_reasons(&heuristics, &external, verdict);
        TrustAssessment {
            trust_score,
            verdict,
            reasons,
            breakdown: ScoreBreakdown {
                heuristics,
                external,
                raw_score,
            },
        }
    }
}

/// Failure reasons in evaluation order. A safe verdict adds positive notes drawn from
/// the checks that actually passed.
fn collect_reasons(
    heuristics: &[HeuristicCheck],
    external: &[ExternalCheckResult],
    verdict: Verdict,
) -> Vec<String> {
    let mut reasons: Vec<String> = heuristics
        .iter()
        .filter(|check| !check.passed)
        .filter_map(|check| check.reason.clone())
        .chain(
            external
                .iter()
                .filter(|check| !check.passed)
                .filter_map(|check| check.reason.clone()),
        )
        .collect();

    if verdict == Verdict::Safe && reasons.is_empty() {
        let passed = |kind: HeuristicKind| {
            heuristics
                .iter()
                .any(|check| check.name == kind && check.passed)
        };
        reasons.push(NO_ISSUES_REASON.to_string());
        if passed(HeuristicKind::Https) {
            reasons.push("HTTPS enabled".to_string());
        }
        if passed(HeuristicKind::IpLiteralHost) {
            reasons.push("Valid domain name".to_string());
        }
    }
    reasons
}

#[async_trait]
impl UrlScorer for DefaultTrustScorer {
    #[instrument(name = "score_url", skip(self, redirect_chain), fields(hops = redirect_chain.len()))]
    async fn score(&self, final_url: &str, redirect_chain: &[RedirectChainItem]) -> TrustAssessment {
        let heuristics = run_heuristics(final_url, redirect_chain, &self.domains, &self.config);
        let external = self.run_external_checks(final_url).await;
        let assessment = self.assess(heuristics, external);
        debug!(
            trust_score = assessment.trust_score,
            verdict = %assessment.verdict,
            raw_score = assessment.breakdown.raw_score,
            "url scored"
        );
        assessment
    }
}
