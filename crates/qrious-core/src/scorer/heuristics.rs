use once_cell::sync::Lazy;
use regex::Regex;
use url::{Host, Url};

use super::{HeuristicCheck, HeuristicKind, ScoringConfig};
use crate::domains::DomainClassifier;
use crate::resolver::RedirectChainItem;

static IPV4_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("valid IPv4 literal regex"));

/// Evaluate every heuristic in table order. An unparseable URL yields only `url_validity`.
pub fn run_heuristics(
    url: &str,
    redirect_chain: &[RedirectChainItem],
    domains: &DomainClassifier,
    config: &ScoringConfig,
) -> Vec<HeuristicCheck> {
    let Ok(parsed) = Url::parse(url) else {
        return vec![HeuristicCheck::fail(
            HeuristicKind::UrlValidity,
            Some("Invalid URL format".to_string()),
        )];
    };
    let host = parsed.host_str().unwrap_or_default();

    let mut checks = Vec::with_capacity(7);
    checks.push(HeuristicCheck::evaluate(
        HeuristicKind::Https,
        parsed.scheme() == "https",
        || "URL does not use HTTPS".to_string(),
    ));

    let tld = domains.suspicious_tld(host);
    checks.push(HeuristicCheck::evaluate(
        HeuristicKind::SuspiciousTld,
        tld.is_none(),
        || format!("Suspicious TLD: .{}", tld.unwrap_or_default().to_ascii_lowercase()),
    ));

    checks.push(HeuristicCheck::evaluate(
        HeuristicKind::IpLiteralHost,
        !is_ip_literal(&parsed, host),
        || "URL uses IP address instead of domain name".to_string(),
    ));

    let pattern = domains.matching_pattern(url);
    if let Some(pattern) = pattern {
        tracing::trace!(pattern_id = %pattern.id, "shortener pattern matched");
    }
    checks.push(HeuristicCheck::evaluate(
        HeuristicKind::ShortenerPattern,
        pattern.is_none(),
        || "URL matches known suspicious patterns".to_string(),
    ));

    let hops = redirect_chain.len();
    checks.push(HeuristicCheck::evaluate(
        HeuristicKind::RedirectDepth,
        hops <= config.max_redirect_hops,
        || format!("Deep redirect chain ({hops} hops)"),
    ));

    let special_chars = url
        .chars()
        .filter(|c| matches!(c, '%' | '&' | '?' | '='))
        .count();
    checks.push(HeuristicCheck::evaluate(
        HeuristicKind::Obfuscation,
        parsed.path().len() <= config.max_path_len && special_chars <= config.max_special_chars,
        || "URL appears obfuscated".to_string(),
    ));

    // Allow-list only: an unknown domain loses the points without a reason.
    checks.push(if domains.is_trusted_host(host) {
        HeuristicCheck::pass(HeuristicKind::DomainReputation)
    } else {
        HeuristicCheck::fail(HeuristicKind::DomainReputation, None)
    });

    checks
}

fn is_ip_literal(url: &Url, host: &str) -> bool {
    matches!(url.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_))) || IPV4_LITERAL.is_match(host)
}
