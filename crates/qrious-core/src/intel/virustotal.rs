use super::{into_result, ExternalCheck, IntelSettings};
use crate::config::DEFAULT_USER_AGENT;
use crate::scorer::ExternalCheckResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "virustotal";
const DEFAULT_ENDPOINT: &str = "https://www.virustotal.com";

/// VirusTotal v2 lookup: submit the URL for scanning, then read the existing report.
#[derive(Debug, Clone)]
pub struct VirusTotalCheck {
    http: Client,
    base: String,
    api_key: String,
    timeout: Duration,
}

impl VirusTotalCheck {
    pub fn new(settings: &IntelSettings) -> Result<Self> {
        let api_key = settings
            .virustotal_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .with_context(|| {
                format!(
                    "{} must be set to enable VirusTotal",
                    IntelSettings::VIRUSTOTAL_KEY_ENV
                )
            })?;
        let base = settings
            .virustotal_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(settings.timeout())
            .build()
            .context("failed to build VirusTotal HTTP client")?;
        Ok(Self {
            http,
            base,
            api_key,
            timeout: settings.timeout(),
        })
    }

    async fn lookup(&self, url: &str) -> Result<Option<String>> {
        let submit = self
            .http
            .post(format!("{}/vtapi/v2/url/scan", self.base))
            .form(&[("apikey", self.api_key.as_str()), ("url", url)])
            .send()
            .await
            .context("failed to submit URL to VirusTotal")?;
        if !submit.status().is_success() {
            bail!("VirusTotal scan submission error ({})", submit.status());
        }

        let report = self
            .http
            .get(format!("{}/vtapi/v2/url/report", self.base))
            .query(&[("apikey", self.api_key.as_str()), ("resource", url)])
            .send()
            .await
            .context("failed to fetch VirusTotal report")?;
        if !report.status().is_success() {
            bail!("VirusTotal report error ({})", report.status());
        }

        let report: UrlReport = report
            .json()
            .await
            .context("failed to parse VirusTotal report")?;
        Ok(summarize(&report))
    }
}

#[async_trait]
impl ExternalCheck for VirusTotalCheck {
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

/// Only a completed report (`response_code == 1`) with detections counts.
fn summarize(report: &UrlReport) -> Option<String> {
    match (report.response_code, report.positives) {
        (1, Some(positives)) if positives > 0 => Some(format!(
            "Flagged by {positives} security vendors on VirusTotal"
        )),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct UrlReport {
    response_code: i64,
    #[serde(default)]
    positives: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn report(value: serde_json::Value) -> UrlReport {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn positives_on_completed_report_flag() {
        let flagged = report(json!({"response_code": 1, "positives": 4, "total": 70}));
        assert_eq!(
            summarize(&flagged).as_deref(),
            Some("Flagged by 4 security vendors on VirusTotal")
        );
    }

    #[test]
    fn pending_or_clean_reports_pass() {
        assert_eq!(summarize(&report(json!({"response_code": 0}))), None);
        assert_eq!(
            summarize(&report(json!({"response_code": -2, "positives": 3}))),
            None
        );
        assert_eq!(
            summarize(&report(json!({"response_code": 1, "positives": 0}))),
            None
        );
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn submits_then_reads_report() {
        let server = MockServer::start();
        let scan = server.mock(|when, then| {
            when.method(POST)
                .path("/vtapi/v2/url/scan")
                .body_contains("apikey=vt-key");
            then.status(200).json_body(json!({"response_code": 1}));
        });
        let report = server.mock(|when, then| {
            when.method(GET)
                .path("/vtapi/v2/url/report")
                .query_param("apikey", "vt-key")
                .query_param("resource", "http://prize.tk/");
            then.status(200)
                .json_body(json!({"response_code": 1, "positives": 2, "total": 70}));
        });

        let settings = IntelSettings {
            virustotal_api_key: Some("vt-key".into()),
            virustotal_endpoint: Some(server.base_url()),
            timeout_secs: 5,
            ..IntelSettings::default()
        };
        let check = VirusTotalCheck::new(&settings).unwrap();
        let result = check.invoke("http://prize.tk/").await;
        assert!(!result.passed);
        assert_eq!(
            result.reason.as_deref(),
            Some("Flagged by 2 security vendors on VirusTotal")
        );
        scan.assert();
        report.assert();
    }
}
