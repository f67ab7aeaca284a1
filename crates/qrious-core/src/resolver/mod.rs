use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::domains::DomainClassifier;

/// Ordered, best-effort extraction of meta-refresh and script redirects.
pub mod extract;
pub mod transport;

use transport::{BodyPolicy, HopMethod, HopRequest, HopResponse, HttpTransport};

/// One HTTP exchange recorded while following redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectChainItem {
    pub url: String,
    pub status_code: u16,
    pub method: HopMethod,
}

/// Why the resolution loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A response that neither redirects nor carries a client-side redirect.
    FinalDestination,
    CycleDetected,
    SelfRedirect,
    MaxDepthReached,
    RequestFailed,
    /// The cursor could not be parsed as a URL.
    InvalidUrl,
    /// The cursor uses a scheme the transport cannot fetch (e.g. an app deep link).
    UnsupportedScheme,
    /// A 3xx response without a `Location` header.
    MissingLocation,
}

/// Final destination plus every hop taken to reach it.
///
/// `depth` counts transitions; the chain may hold one extra terminal entry, so
/// `depth <= redirect_chain.len() <= depth + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub final_url: String,
    pub redirect_chain: Vec<RedirectChainItem>,
    pub depth: usize,
    pub termination: Termination,
}

/// Prefix `https://` unless the input already names an http(s) scheme.
pub fn normalize_input(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.get(..8).unwrap_or(trimmed).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Parse-and-reserialize form used for cycle detection and cache keys.
pub fn canonicalize(url: &str) -> Option<String> {
    Url::parse(url).ok().map(String::from)
}

/// Resolve a `Location` (or client-side) target against the URL that produced it.
pub fn resolve_location(base: &str, location: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(location)) {
        Ok(url) => url.into(),
        Err(_) if location.starts_with("http://") || location.starts_with("https://") => {
            location.to_string()
        }
        Err(_) => base.to_string(),
    }
}

fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Per-call state: cursor, visited set and the chain built so far.
struct RedirectSession {
    current: String,
    chain: Vec<RedirectChainItem>,
    visited: HashSet<String>,
    depth: usize,
}

impl RedirectSession {
    fn new(start: String) -> Self {
        Self {
            current: start,
            chain: Vec::new(),
            visited: HashSet::new(),
            depth: 0,
        }
    }

    fn record(&mut self, method: HopMethod, response: &HopResponse) {
        self.chain.push(RedirectChainItem {
            url: self.current.clone(),
            status_code: response.status,
            method,
        });
    }

    fn advance(&mut self, next: String) {
        self.current = next;
        self.depth += 1;
    }

    fn finish(self, termination: Termination) -> ResolutionResult {
        ResolutionResult {
            final_url: self.current,
            redirect_chain: self.chain,
            depth: self.depth,
            termination,
        }
    }
}

enum Step {
    Following,
    Stop(Termination),
}

/// Follows HTTP and client-side redirects one hop at a time until a terminal condition.
pub struct RedirectResolver {
    transport: Arc<dyn HttpTransport>,
    domains: Arc<DomainClassifier>,
    config: ResolverConfig,
}

impl RedirectResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, domains: Arc<DomainClassifier>) -> Self {
        Self::with_config(transport, domains, ResolverConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn HttpTransport>,
        domains: Arc<DomainClassifier>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            transport,
            domains,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Never fails: every exit path returns the furthest URL reached.
    #[instrument(name = "resolve_url", skip(self), fields(max_depth = self.config.max_depth))]
    pub async fn resolve(&self, input: &str) -> ResolutionResult {
        let mut session = RedirectSession::new(normalize_input(input));
        let termination = loop {
            match self.step(&mut session).await {
                Step::Following => continue,
                Step::Stop(termination) => break termination,
            }
        };
        debug!(
            final_url = %session.current,
            depth = session.depth,
            hops = session.chain.len(),
            ?termination,
            "resolution finished"
        );
        session.finish(termination)
    }

    async fn step(&self, session: &mut RedirectSession) -> Step {
        if session.depth >= self.config.max_depth {
            return Step::Stop(Termination::MaxDepthReached);
        }
        let Ok(parsed) = Url::parse(&session.current) else {
            return Step::Stop(Termination::InvalidUrl);
        };
        let canonical = String::from(parsed.clone());
        if !session.visited.insert(canonical.clone()) {
            return Step::Stop(Termination::CycleDetected);
        }
        if !is_fetchable(&parsed) {
            return Step::Stop(Termination::UnsupportedScheme);
        }

        let shortener = self.domains.is_shortener(parsed.host_str().unwrap_or_default());
        let first_hop = session.chain.is_empty();
        let Some((method, response)) =
            self.request_hop(&session.current, shortener, first_hop).await
        else {
            return Step::Stop(Termination::RequestFailed);
        };
        session.record(method, &response);

        if response.is_redirect() {
            let Some(location) = response.location.as_deref() else {
                return Step::Stop(Termination::MissingLocation);
            };
            let next = resolve_location(&session.current, location);
            if next == canonical {
                return Step::Stop(Termination::SelfRedirect);
            }
            session.advance(next);
            return Step::Following;
        }

        if method == HopMethod::Get && (response.is_html() || shortener) {
            if let Some(next) = response
                .body
                .as_deref()
                .and_then(extract::client_side_redirect)
                .map(|target| resolve_location(&session.current, &target))
                .filter(|next| *next != canonical)
                .filter(|next| Url::parse(next).is_ok_and(|url| is_fetchable(&url)))
            {
                debug!(from = %session.current, to = %next, "following client-side redirect");
                session.advance(next);
                return Step::Following;
            }
        }

        Step::Stop(Termination::FinalDestination)
    }

    /// Issue one hop. Shorteners get `GET` with a doubled timeout; everything else starts with
    /// `HEAD`, retried as `GET` when the first hop fails or the server rejects `HEAD`.
    async fn request_hop(
        &self,
        url: &str,
        shortener: bool,
        first_hop: bool,
    ) -> Option<(HopMethod, HopResponse)> {
        let timeout = self.hop_timeout(shortener);
        if shortener {
            return match self.send(url, HopMethod::Get, BodyPolicy::Always, timeout).await {
                Ok(response) => Some((HopMethod::Get, response)),
                Err(err) => {
                    warn!(url, error = %err, "shortener request failed");
                    None
                }
            };
        }

        match self.send(url, HopMethod::Head, BodyPolicy::Skip, timeout).await {
            Ok(response) if matches!(response.status, 405 | 501) => {
                debug!(url, status = response.status, "HEAD rejected; retrying with GET");
                match self.send(url, HopMethod::Get, BodyPolicy::IfHtml, timeout).await {
                    Ok(retried) => Some((HopMethod::Get, retried)),
                    Err(_) => Some((HopMethod::Head, response)),
                }
            }
            Ok(response) => Some((HopMethod::Head, response)),
            Err(err) if first_hop => {
                debug!(url, error = %err, "HEAD failed on first hop; retrying with GET");
                match self.send(url, HopMethod::Get, BodyPolicy::IfHtml, timeout).await {
                    Ok(response) => Some((HopMethod::Get, response)),
                    Err(err) => {
                        warn!(url, error = %err, "GET retry failed");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(url, error = %err, "request failed mid-chain");
                None
            }
        }
    }

    async fn send(
        &self,
        url: &str,
        method: HopMethod,
        body: BodyPolicy,
        timeout: Duration,
    ) -> Result<HopResponse> {
        let request = HopRequest {
            url,
            method,
            timeout,
            body,
        };
        match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("{method} {url} timed out after {timeout:?}")),
        }
    }

    fn hop_timeout(&self, shortener: bool) -> Duration {
        let base = Duration::from_millis(self.config.timeout_ms);
        if shortener {
            base.saturating_mul(2)
        } else {
            base
        }
    }
}
