use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Method, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ResolverConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// HTTP method used for a single hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HopMethod {
    Head,
    Get,
}

impl HopMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Get => "GET",
        }
    }
}

impl fmt::Display for HopMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the transport should read the response body of a `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    Skip,
    IfHtml,
    Always,
}

#[derive(Debug, Clone)]
pub struct HopRequest<'a> {
    pub url: &'a str,
    pub method: HopMethod,
    pub timeout: Duration,
    pub body: BodyPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopResponse {
    pub status: u16,
    pub location: Option<String>,
    pub content_type: Option<String>,
    /// Capped, lossily decoded body; `None` when not requested or unreadable.
    pub body: Option<String>,
}

impl HopResponse {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| {
                let value = value.to_ascii_lowercase();
                value.contains("text/html") || value.contains("application/xhtml")
            })
            .unwrap_or(false)
    }
}

/// Transport used by the resolver. Implementations must never follow redirects themselves.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HopRequest<'_>) -> Result<HopResponse>;
}

/// `reqwest`-backed transport with automatic redirects disabled.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build redirect-resolution HTTP client")?;
        Ok(Self {
            http,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HopRequest<'_>) -> Result<HopResponse> {
        let method = match request.method {
            HopMethod::Head => Method::HEAD,
            HopMethod::Get => Method::GET,
        };
        let mut response = self
            .http
            .request(method, request.url)
            .header(ACCEPT, ACCEPT_HTML)
            .timeout(request.timeout)
            .send()
            .await
            .with_context(|| format!("{} {} failed", request.method, request.url))?;

        let mut hop = HopResponse {
            status: response.status().as_u16(),
            location: header_value(response.headers(), LOCATION.as_str()),
            content_type: header_value(response.headers(), CONTENT_TYPE.as_str()),
            body: None,
        };

        let wants_body = match (request.method, request.body) {
            (HopMethod::Head, _) | (_, BodyPolicy::Skip) => false,
            (_, BodyPolicy::Always) => true,
            (_, BodyPolicy::IfHtml) => hop.is_html(),
        };
        if wants_body {
            match read_capped(&mut response, self.max_body_bytes).await {
                Ok(body) => hop.body = Some(body),
                Err(err) => debug!(url = request.url, error = %err, "failed to read response body"),
            }
        }
        Ok(hop)
    }
}

/// Header lookup tolerant of casing (`location` vs `Location`).
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn read_capped(response: &mut Response, max_bytes: usize) -> Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
        if buf.len() >= max_bytes {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&ResolverConfig::default()).unwrap()
    }

    #[test]
    fn html_detection_ignores_case_and_parameters() {
        let response = HopResponse {
            status: 200,
            content_type: Some("Text/HTML; charset=utf-8".into()),
            ..HopResponse::default()
        };
        assert!(response.is_html());
        assert!(!HopResponse::default().is_html());
    }

    #[test]
    fn redirect_range_is_3xx() {
        let mut response = HopResponse {
            status: 301,
            ..HopResponse::default()
        };
        assert!(response.is_redirect());
        response.status = 200;
        assert!(!response.is_redirect());
        response.status = 400;
        assert!(!response.is_redirect());
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn does_not_follow_redirects() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::HEAD).path("/short");
            then.status(301).header("location", "/landing");
        });

        let url = server.url("/short");
        let response = transport()
            .send(HopRequest {
                url: &url,
                method: HopMethod::Head,
                timeout: Duration::from_secs(5),
                body: BodyPolicy::Skip,
            })
            .await
            .unwrap();
        assert_eq!(response.status, 301);
        assert_eq!(response.location.as_deref(), Some("/landing"));
        assert!(response.body.is_none());
        mock.assert();
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn reads_html_body_when_requested() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><body>hello</body></html>");
        });

        let url = server.url("/page");
        let response = transport()
            .send(HopRequest {
                url: &url,
                method: HopMethod::Get,
                timeout: Duration::from_secs(5),
                body: BodyPolicy::IfHtml,
            })
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.unwrap().contains("hello"));
    }
}
