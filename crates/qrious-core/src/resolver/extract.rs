//! Client-side redirect detection for HTML bodies.
//!
//! Strategies are tried in order and the first match wins. This is pattern matching over
//! markup and script text, not an HTML or JavaScript parser, so it is best-effort only.

use once_cell::sync::Lazy;
use regex::Regex;

type Strategy = fn(&str) -> Option<String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("meta_refresh", meta_refresh),
    ("script_location", script_location),
];

static META_REFRESH_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*\bhttp-equiv\s*=\s*["']?refresh\b[^>]*>"#)
        .expect("valid meta refresh regex")
});

static META_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid content regex")
});

static REFRESH_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\burl\s*=\s*['"]?([^'"\s]+)"#).expect("valid refresh url regex")
});

/// JavaScript navigation idioms, most specific first.
static SCRIPT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)window\.location\.href\s*=\s*["']([^"']+)["']"#,
        r#"(?i)window\.location\s*=\s*["']([^"']+)["']"#,
        r#"(?i)window\.location\.replace\(\s*["']([^"']+)["']"#,
        r#"(?i)\blocation\.href\s*=\s*["']([^"']+)["']"#,
        r#"(?i)\blocation\.replace\(\s*["']([^"']+)["']"#,
        r#"(?i)\blocation\.assign\(\s*["']([^"']+)["']"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid script redirect regex"))
    .collect()
});

/// Finds the first client-side redirect target in `body`, unresolved.
pub fn client_side_redirect(body: &str) -> Option<String> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let target = strategy(body)?;
        tracing::trace!(strategy = name, %target, "client-side redirect found");
        Some(target)
    })
}

fn meta_refresh(body: &str) -> Option<String> {
    META_REFRESH_TAG.find_iter(body).find_map(|tag| {
        let content = META_CONTENT.captures(tag.as_str())?;
        let value = content.get(1).or_else(|| content.get(2))?.as_str();
        let target = REFRESH_URL.captures(value)?.get(1)?.as_str();
        clean_target(target)
    })
}

fn script_location(body: &str) -> Option<String> {
    SCRIPT_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(body)
            .find_map(|captures| clean_target(captures.get(1)?.as_str()))
    })
}

fn clean_target(raw: &str) -> Option<String> {
    let target = raw
        .trim()
        .trim_end_matches(';')
        .replace("&amp;", "&")
        .replace("\\/", "/");
    (!target.is_empty() && target != "#").then_some(target)
}
