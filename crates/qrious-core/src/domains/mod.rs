use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loads list overrides from `shorteners.txt`, `suspicious_tlds.txt`, `trusted_domains.txt` and `patterns.json`.
pub mod file_repository;

/// Hosts whose main purpose is redirecting a short link to a longer destination.
pub const DEFAULT_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "rebrand.ly",
    "cutt.ly",
    "shorturl.at",
    "tiny.cc",
    "bl.ink",
    "lnkd.in",
    "rb.gy",
    "s.id",
    "t.ly",
    "v.gd",
    "qrco.de",
    "shorte.st",
    "adf.ly",
];

pub const DEFAULT_SUSPICIOUS_TLDS: &[&str] = &[
    "tk", "ml", "ga", "cf", "gq", "xyz", "top", "click", "download", "stream",
];

pub const DEFAULT_TRUSTED_DOMAINS: &[&str] =
    &["google.com", "github.com", "microsoft.com", "apple.com"];

const DEFAULT_PATTERNS: &[(&str, &str, &str)] = &[
    ("SHORTENER_BITLY", "bit.ly short link", r"(?i)\bbit\.ly\b"),
    ("SHORTENER_TINYURL", "tinyurl.com short link", r"(?i)\btinyurl\.com\b"),
    ("SHORTENER_TCO", "t.co short link", r"(?i)\bt\.co\b"),
    ("SHORTENER_GOOGL", "goo.gl short link", r"(?i)\bgoo\.gl\b"),
    ("SHORTENER_OWLY", "ow.ly short link", r"(?i)\bow\.ly\b"),
];

/// Regex flagging a URL that still points at a generic shortener service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPattern {
    /// Unique identifier (e.g. `SHORTENER_BITLY`).
    pub id: String,
    pub description: String,
    /// Regex source matched against the full URL string.
    pub pattern: String,
}

impl UrlPattern {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, ListValidationError> {
        let pattern = Self {
            id: id.into(),
            description: description.into(),
            pattern: pattern.into(),
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<(), ListValidationError> {
        if self.id.trim().is_empty() {
            return Err(ListValidationError::EmptyPatternId);
        }
        if self.pattern.is_empty() {
            return Err(ListValidationError::EmptyPattern {
                pattern_id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn compile(&self) -> Result<Regex, ListValidationError> {
        Regex::new(&self.pattern).map_err(|err| ListValidationError::InvalidRegex {
            pattern_id: self.id.clone(),
            message: err.to_string(),
        })
    }
}

/// Errors emitted while validating domain lists and URL patterns.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListValidationError {
    #[error("pattern id must not be blank")]
    EmptyPatternId,
    #[error("pattern `{pattern_id}` must not be empty")]
    EmptyPattern { pattern_id: String },
    #[error("pattern `{pattern_id}` is not a valid regex: {message}")]
    InvalidRegex { pattern_id: String, message: String },
    #[error("duplicate pattern id `{pattern_id}`")]
    DuplicatePatternId { pattern_id: String },
    #[error("{list} entries must not be blank")]
    BlankEntry { list: String },
    #[error("failed to build domain matcher: {message}")]
    Matcher { message: String },
}

/// Raw domain classification data shared by the resolver and the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainLists {
    /// Hosts the resolver treats as shorteners (GET first, doubled timeout).
    pub shorteners: Vec<String>,
    /// Final host labels that cost trust points.
    pub suspicious_tlds: Vec<String>,
    /// Domains whose presence in the host passes the reputation check.
    pub trusted_domains: Vec<String>,
    /// Shortener URL patterns used as a mild negative signal by the scorer.
    pub patterns: Vec<UrlPattern>,
}

impl Default for DomainLists {
    fn default() -> Self {
        Self {
            shorteners: to_owned_list(DEFAULT_SHORTENERS),
            suspicious_tlds: to_owned_list(DEFAULT_SUSPICIOUS_TLDS),
            trusted_domains: to_owned_list(DEFAULT_TRUSTED_DOMAINS),
            patterns: default_patterns(),
        }
    }
}

pub fn default_patterns() -> Vec<UrlPattern> {
    DEFAULT_PATTERNS
        .iter()
        .map(|(id, description, pattern)| UrlPattern {
            id: (*id).to_string(),
            description: (*description).to_string(),
            pattern: (*pattern).to_string(),
        })
        .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Compiled view over [`DomainLists`] answering host and URL classification questions.
#[derive(Debug, Clone)]
pub struct DomainClassifier {
    lists: DomainLists,
    trusted: AhoCorasick,
    patterns: Vec<(Regex, UrlPattern)>,
}

impl DomainClassifier {
    pub fn new(lists: DomainLists) -> Result<Self, ListValidationError> {
        let lists = DomainLists {
            shorteners: normalize_entries("shorteners", &lists.shorteners)?,
            suspicious_tlds: normalize_entries("suspicious_tlds", &lists.suspicious_tlds)?
                .into_iter()
                .map(|tld| tld.trim_start_matches('.').to_string())
                .collect(),
            trusted_domains: normalize_entries("trusted_domains", &lists.trusted_domains)?,
            patterns: lists.patterns,
        };

        let trusted = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(&lists.trusted_domains)
            .map_err(|err| ListValidationError::Matcher {
                message: err.to_string(),
            })?;

        let mut patterns = Vec::with_capacity(lists.patterns.len());
        let mut seen = std::collections::HashSet::new();
        for pattern in &lists.patterns {
            pattern.validate()?;
            if !seen.insert(pattern.id.as_str()) {
                return Err(ListValidationError::DuplicatePatternId {
                    pattern_id: pattern.id.clone(),
                });
            }
            patterns.push((pattern.compile()?, pattern.clone()));
        }

        Ok(Self {
            lists,
            trusted,
            patterns,
        })
    }

    pub fn lists(&self) -> &DomainLists {
        &self.lists
    }

    /// True when `host` is a listed shortener or one of its subdomains.
    pub fn is_shortener(&self, host: &str) -> bool {
        let host = normalize_host(host);
        self.lists.shorteners.iter().any(|entry| {
            host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Returns the host's last label when it is a suspicious TLD.
    pub fn suspicious_tld<'a>(&self, host: &'a str) -> Option<&'a str> {
        let tld = host.trim_end_matches('.').rsplit('.').next()?;
        self.lists
            .suspicious_tlds
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(tld))
            .then_some(tld)
    }

    /// Substring match against the trusted-domain allow-list.
    pub fn is_trusted_host(&self, host: &str) -> bool {
        self.trusted.is_match(host)
    }

    /// First shortener pattern matching the URL string, in list order.
    pub fn matching_pattern(&self, url: &str) -> Option<&UrlPattern> {
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(url))
            .map(|(_, pattern)| pattern)
    }
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new(DomainLists::default()).expect("built-in domain lists are valid")
    }
}

fn normalize_entries(list: &str, entries: &[String]) -> Result<Vec<String>, ListValidationError> {
    entries
        .iter()
        .map(|entry| {
            let entry = normalize_host(entry);
            if entry.is_empty() {
                Err(ListValidationError::BlankEntry {
                    list: list.to_string(),
                })
            } else {
                Ok(entry)
            }
        })
        .collect()
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Abstraction over list loading so built-in and file-backed lists can be swapped.
#[async_trait]
pub trait DomainListRepository: Send + Sync {
    async fn load_lists(&self) -> AnyResult<DomainLists>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_compile() {
        let classifier = DomainClassifier::new(DomainLists::default()).unwrap();
        assert_eq!(classifier.lists().patterns.len(), 5);
        assert!(classifier.lists().suspicious_tlds.contains(&"tk".to_string()));
    }

    #[test]
    fn shortener_matches_host_and_subdomains_only() {
        let classifier = DomainClassifier::default();
        assert!(classifier.is_shortener("bit.ly"));
        assert!(classifier.is_shortener("BIT.LY."));
        assert!(classifier.is_shortener("links.bit.ly"));
        assert!(!classifier.is_shortener("rabbit.ly"));
        assert!(!classifier.is_shortener("example.com"));
    }

    #[test]
    fn suspicious_tld_uses_last_label() {
        let classifier = DomainClassifier::default();
        assert_eq!(classifier.suspicious_tld("free-prizes.tk"), Some("tk"));
        assert_eq!(classifier.suspicious_tld("login.example.XYZ"), Some("XYZ"));
        assert_eq!(classifier.suspicious_tld("example.com"), None);
        assert_eq!(classifier.suspicious_tld("top.example.com"), None);
    }

    #[test]
    fn trusted_hosts_match_by_substring() {
        let classifier = DomainClassifier::default();
        assert!(classifier.is_trusted_host("docs.github.com"));
        assert!(classifier.is_trusted_host("www.google.com"));
        assert!(!classifier.is_trusted_host("example.org"));
    }

    #[test]
    fn shortener_patterns_respect_word_boundaries() {
        let classifier = DomainClassifier::default();
        assert_eq!(
            classifier
                .matching_pattern("https://t.co/abc")
                .map(|pattern| pattern.id.as_str()),
            Some("SHORTENER_TCO")
        );
        assert!(classifier
            .matching_pattern("https://www.microsoft.com/")
            .is_none());
        assert!(classifier
            .matching_pattern("https://www.reddit.com/r/rust")
            .is_none());
        assert!(classifier
            .matching_pattern("https://BIT.LY/xyz")
            .is_some());
    }

    #[test]
    fn rejects_duplicate_pattern_ids() {
        let mut lists = DomainLists::default();
        lists.patterns.push(lists.patterns[0].clone());
        let err = DomainClassifier::new(lists).expect_err("duplicate id should fail");
        assert!(matches!(
            err,
            ListValidationError::DuplicatePatternId { pattern_id } if pattern_id == "SHORTENER_BITLY"
        ));
    }

    #[test]
    fn rejects_invalid_regex_and_blank_entries() {
        let lists = DomainLists {
            patterns: vec![UrlPattern::new("BROKEN", "unbalanced", "(").unwrap()],
            ..DomainLists::default()
        };
        assert!(matches!(
            DomainClassifier::new(lists),
            Err(ListValidationError::InvalidRegex { .. })
        ));

        let lists = DomainLists {
            trusted_domains: vec!["  ".into()],
            ..DomainLists::default()
        };
        assert!(matches!(
            DomainClassifier::new(lists),
            Err(ListValidationError::BlankEntry { list }) if list == "trusted_domains"
        ));
    }

    #[test]
    fn url_pattern_new_enforces_invariants() {
        assert_eq!(
            UrlPattern::new(" ", "blank", "x"),
            Err(ListValidationError::EmptyPatternId)
        );
        assert!(matches!(
            UrlPattern::new("EMPTY", "empty", ""),
            Err(ListValidationError::EmptyPattern { .. })
        ));
    }
}
