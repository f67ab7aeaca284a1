pub mod analyzer;
pub mod cache;
pub mod config;
pub mod domains;
pub mod intel;
pub mod payload;
pub mod report;
pub mod resolver;
pub mod scorer;

pub use analyzer::UrlAnalyzer;
pub use cache::{CacheOp, CachedResult, ResultCache};
pub use config::{AnalyzerConfig, CacheConfig, ResolverConfig};
pub use domains::{
    file_repository::FileListRepository, DomainClassifier, DomainListRepository, DomainLists,
    ListValidationError, UrlPattern,
};
pub use intel::{ExternalCheck, IntelSettings};
pub use payload::{extract_url, PayloadError};
pub use report::{render_analysis, render_resolution, OutputFormat};
pub use resolver::{
    transport::{HttpTransport, ReqwestTransport},
    RedirectChainItem, RedirectResolver, ResolutionResult, Termination,
};
pub use scorer::{
    default_scorer::DefaultTrustScorer, AnalysisResult, ExternalCheckResult, HeuristicCheck,
    HeuristicKind, ScoringConfig, TrustAssessment, UrlScorer, Verdict, VerdictThresholds,
};
