mod safe_browsing;
mod settings;
mod virustotal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::scorer::ExternalCheckResult;

pub use safe_browsing::SafeBrowsingCheck;
pub use settings::IntelSettings;
pub use virustotal::VirusTotalCheck;

/// A third-party reputation lookup consulted by the trust scorer.
///
/// Implementations never fail: transport errors, non-2xx replies and inconclusive
/// reports all come back as a pass so an unavailable provider cannot penalize a URL.
#[async_trait]
pub trait ExternalCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Upper bound the scorer applies to [`ExternalCheck::invoke`].
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn invoke(&self, url: &str) -> ExternalCheckResult;
}

/// Shared outcome mapping for providers: `Ok(Some(reason))` is a detection.
pub(crate) fn into_result(provider: &str, lookup: Result<Option<String>>) -> ExternalCheckResult {
    match lookup {
        Ok(Some(reason)) => ExternalCheckResult::fail(provider, reason),
        Ok(None) => ExternalCheckResult::pass(provider),
        Err(err) => {
            tracing::warn!(provider, error = %err, "external check failed; treating as pass");
            ExternalCheckResult::pass(provider)
        }
    }
}

/// Build the enabled checks. A provider is included only when its key is set.
pub fn build_checks(settings: &IntelSettings) -> Result<Vec<Arc<dyn ExternalCheck>>> {
    let mut checks: Vec<Arc<dyn ExternalCheck>> = Vec::new();
    if settings.safe_browsing_enabled() {
        checks.push(Arc::new(SafeBrowsingCheck::new(settings)?));
    }
    if settings.virustotal_enabled() {
        checks.push(Arc::new(VirusTotalCheck::new(settings)?));
    }
    tracing::debug!(
        providers = ?checks.iter().map(|check| check.name().to_string()).collect::<Vec<_>>(),
        "external checks configured"
    );
    Ok(checks)
}
