use super::{into_result, ExternalCheck, IntelSettings};
use crate::config::DEFAULT_USER_AGENT;
use crate::scorer::ExternalCheckResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "google_safe_browsing";
const DEFAULT_ENDPOINT: &str = "https://safebrowsing.googleapis.com";
const THREAT_TYPES: [&str; 3] = ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"];

/// Google Safe Browsing v4 `threatMatches:find` lookup.
#[derive(Debug, Clone)]
pub struct SafeBrowsingCheck {
    http: Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl SafeBrowsingCheck {
    pub fn new(settings: &IntelSettings) -> Result<Self> {
        let api_key = settings
            .safe_browsing_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .with_context(|| {
                format!(
                    "{} must be set to enable Safe Browsing",
                    IntelSettings::SAFE_BROWSING_KEY_ENV
                )
            })?;
        let base = settings
            .safe_browsing_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let url = format!("{}/v4/threatMatches:find", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(settings.timeout())
            .build()
            .context("failed to build Safe Browsing HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key,
            timeout: settings.timeout(),
        })
    }

    async fn lookup(&self, url: &str) -> Result<Option<String>> {
        let payload = FindRequest::for_url(url);
        let response = self
            .http
            .post(&self.url)
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await
            .context("failed to call Safe Browsing API")?;

        if !response.status().is_success() {
            bail!("Safe Browsing API error ({})", response.status());
        }

        let body: FindResponse = response
            .json()
            .await
            .context("failed to parse Safe Browsing response")?;
        Ok(summarize(&body))
    }
}

#[async_trait]
impl ExternalCheck for SafeBrowsingCheck {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, url: &str) -> ExternalCheckResult {
        into_result(PROVIDER, self.lookup(url).await)
    }
}

/// Threat types in first-seen order, without duplicates.
fn summarize(response: &FindResponse) -> Option<String> {
    let mut threats: Vec<&str> = Vec::new();
    for threat in response.matches.iter().map(|m| m.threat_type.as_str()) {
        if !threats.contains(&threat) {
            threats.push(threat);
        }
    }
    (!threats.is_empty())
        .then(|| format!("Flagged by Google Safe Browsing: {}", threats.join(", ")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindRequest<'a> {
    client: ClientInfo,
    threat_info: ThreatInfo<'a>,
}

impl<'a> FindRequest<'a> {
    fn for_url(url: &'a str) -> Self {
        Self {
            client: ClientInfo {
                client_id: "qrious",
                client_version: "1.0",
            },
            threat_info: ThreatInfo {
                threat_types: &THREAT_TYPES,
                platform_types: &["ANY_PLATFORM"],
                threat_entry_types: &["URL"],
                threat_entries: vec![ThreatEntry { url }],
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
    client_id: &'static str,
    client_version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: &'static [&'static str],
    platform_types: &'static [&'static str],
    threat_entry_types: &'static [&'static str],
    threat_entries: Vec<ThreatEntry<'a>>,
}

#[derive(Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct FindResponse {
    #[serde(default)]
    matches: Vec<ThreatMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreatMatch {
    threat_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(endpoint: String) -> IntelSettings {
        IntelSettings {
            safe_browsing_api_key: Some("test-key".into()),
            safe_browsing_endpoint: Some(endpoint),
            timeout_secs: 5,
            ..IntelSettings::default()
        }
    }

    #[test]
    fn request_body_matches_lookup_contract() {
        let body = serde_json::to_value(FindRequest::for_url("http://prize.tk/")).unwrap();
        assert_eq!(
            body,
            json!({
                "client": {"clientId": "qrious", "clientVersion": "1.0"},
                "threatInfo": {
                    "threatTypes": ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"],
                    "platformTypes": ["ANY_PLATFORM"],
                    "threatEntryTypes": ["URL"],
                    "threatEntries": [{"url": "http://prize.tk/"}]
                }
            })
        );
    }

    #[test]
    fn summarize_dedups_threat_types() {
        let response: FindResponse = serde_json::from_value(json!({
            "matches": [
                {"threatType": "MALWARE", "platformType": "ANY_PLATFORM"},
                {"threatType": "SOCIAL_ENGINEERING"},
                {"threatType": "MALWARE"}
            ]
        }))
        .unwrap();
        assert_eq!(
            summarize(&response).as_deref(),
            Some("Flagged by Google Safe Browsing: MALWARE, SOCIAL_ENGINEERING")
        );
    }

    #[test]
    fn empty_response_is_clean() {
        let response: FindResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(summarize(&response), None);
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = SafeBrowsingCheck::new(&IntelSettings::default()).unwrap_err();
        assert!(err.to_string().contains(IntelSettings::SAFE_BROWSING_KEY_ENV));
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn flags_matches_from_api() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v4/threatMatches:find")
                .query_param("key", "test-key");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"matches": [{"threatType": "MALWARE"}]}));
        });

        let check = SafeBrowsingCheck::new(&settings(server.base_url())).unwrap();
        let result = check.invoke("http://prize.tk/").await;
        assert!(!result.passed);
        assert_eq!(
            result.reason.as_deref(),
            Some("Flagged by Google Safe Browsing: MALWARE")
        );
        mock.assert();
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn api_errors_pass() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v4/threatMatches:find");
            then.status(500);
        });

        let check = SafeBrowsingCheck::new(&settings(server.base_url())).unwrap();
        let result = check.invoke("https://github.com/").await;
        assert_eq!(result, ExternalCheckResult::pass(PROVIDER));
    }
}
