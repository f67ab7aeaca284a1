use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::cache::{cache_key, CacheOp, CachedResult, ResultCache};
use crate::config::AnalyzerConfig;
use crate::domains::DomainClassifier;
use crate::intel::build_checks;
use crate::resolver::transport::ReqwestTransport;
use crate::resolver::{canonicalize, normalize_input, RedirectResolver, ResolutionResult};
use crate::scorer::default_scorer::DefaultTrustScorer;
use crate::scorer::{AnalysisResult, UrlScorer};

/// Resolve-then-score pipeline with an optional result cache in front of both stages.
pub struct UrlAnalyzer {
    resolver: RedirectResolver,
    scorer: Arc<dyn UrlScorer>,
    cache: Option<Arc<ResultCache<CachedResult>>>,
}

impl UrlAnalyzer {
    pub fn new(resolver: RedirectResolver, scorer: Arc<dyn UrlScorer>) -> Self {
        Self {
            resolver,
            scorer,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache<CachedResult>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wire the production transport, external checks and cache from configuration.
    ///
    /// The cache sweeper is started only when called inside a Tokio runtime.
    pub fn from_config(config: &AnalyzerConfig, domains: DomainClassifier) -> Result<Self> {
        let domains = Arc::new(domains);
        let transport = ReqwestTransport::new(&config.resolver)
            .context("failed to construct redirect transport")?;
        let resolver = RedirectResolver::with_config(
            Arc::new(transport),
            Arc::clone(&domains),
            config.resolver.clone(),
        );
        let checks =
            build_checks(&config.intel).context("failed to construct external checks")?;
        let scorer = DefaultTrustScorer::with_config(domains, config.scoring.clone())
            .with_external_checks(checks);

        let analyzer = Self::new(resolver, Arc::new(scorer));
        if !config.cache.enabled {
            return Ok(analyzer);
        }
        let cache = Arc::new(ResultCache::new(config.cache.ttl()));
        if tokio::runtime::Handle::try_current().is_ok() {
            cache.spawn_sweeper(config.cache.sweep_interval());
        }
        Ok(analyzer.with_cache(cache))
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache<CachedResult>>> {
        self.cache.as_ref()
    }

    /// Follow redirects only.
    #[instrument(name = "expand_url", skip(self))]
    pub async fn expand(&self, input: &str) -> ResolutionResult {
        let key = cache_key(CacheOp::Resolve, &cache_subject(input));
        if let Some(CachedResult::Resolution(hit)) = self.cached(&key).await {
            debug!(%key, "resolution served from cache");
            return hit;
        }
        let resolution = self.resolver.resolve(input).await;
        self.store(key, CachedResult::Resolution(resolution.clone()))
            .await;
        resolution
    }

    /// Follow redirects, then score the final destination.
    #[instrument(name = "analyze_url", skip(self))]
    pub async fn analyze(&self, input: &str) -> AnalysisResult {
        let key = cache_key(CacheOp::Analyze, &cache_subject(input));
        if let Some(CachedResult::Analysis(hit)) = self.cached(&key).await {
            debug!(%key, "analysis served from cache");
            return *hit;
        }
        let resolution = self.resolver.resolve(input).await;
        let assessment = self
            .scorer
            .score(&resolution.final_url, &resolution.redirect_chain)
            .await;
        let result = AnalysisResult::new(assessment, resolution);
        self.store(key, CachedResult::Analysis(Box::new(result.clone())))
            .await;
        result
    }

    async fn cached(&self, key: &str) -> Option<CachedResult> {
        self.cache.as_ref()?.get(key).await
    }

    async fn store(&self, key: String, value: CachedResult) {
        if let Some(cache) = &self.cache {
            cache.set(key, value, None).await;
        }
    }
}

/// Equivalent inputs (`example.com`, `https://EXAMPLE.com`) share one cache entry.
fn cache_subject(input: &str) -> String {
    let normalized = normalize_input(input);
    canonicalize(&normalized).unwrap_or(normalized)
}
