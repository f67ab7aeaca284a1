use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::resolver::{RedirectChainItem, ResolutionResult};
use crate::scorer::AnalysisResult;

/// Format styles supported by the default renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Produce a report string for a full analysis.
pub fn render_analysis(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_analysis_human(result),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(result)?),
    }
}

/// Produce a report string for a redirect expansion.
pub fn render_resolution(
    resolution: &ResolutionResult,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_resolution_human(resolution),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(resolution)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(resolution)?),
    }
}

fn render_analysis_human(result: &AnalysisResult) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "Trust Score: {} ({})",
        result.trust_score, result.verdict
    )?;
    writeln!(out, "Expanded URL: {}", result.expanded_url)?;
    writeln!(out)?;

    if result.reasons.is_empty() {
        writeln!(out, "No reasons reported.")?;
    } else {
        writeln!(out, "Reasons:")?;
        for reason in &result.reasons {
            writeln!(out, "  - {reason}")?;
        }
    }

    writeln!(out)?;
    write_chain(&mut out, &result.redirect_chain)?;

    let failed: Vec<_> = result
        .breakdown
        .heuristics
        .iter()
        .filter(|check| !check.passed)
        .collect();
    if !failed.is_empty() {
        writeln!(out)?;
        writeln!(out, "Deductions:")?;
        for check in failed {
            writeln!(out, "  - {:>18}: -{}", check.name.as_str(), check.weight)?;
        }
    }
    for external in &result.breakdown.external {
        writeln!(
            out,
            "External {}: {}",
            external.provider,
            if external.passed { "clean" } else { "flagged" }
        )?;
    }
    Ok(out)
}

fn render_resolution_human(resolution: &ResolutionResult) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Final URL: {}", resolution.final_url)?;
    writeln!(
        out,
        "Depth: {} • Stopped: {}",
        resolution.depth,
        termination_label(resolution)
    )?;
    writeln!(out)?;
    write_chain(&mut out, &resolution.redirect_chain)?;
    Ok(out)
}

fn write_chain(out: &mut String, chain: &[RedirectChainItem]) -> std::fmt::Result {
    if chain.is_empty() {
        return writeln!(out, "Redirect Chain: (no requests completed)");
    }
    writeln!(out, "Redirect Chain:")?;
    for (idx, hop) in chain.iter().enumerate() {
        writeln!(
            out,
            "  {step:>2}. [{status}] {method} {url}",
            step = idx + 1,
            status = hop.status_code,
            method = hop.method,
            url = hop.url
        )?;
    }
    Ok(())
}

fn termination_label(resolution: &ResolutionResult) -> String {
    serde_json::to_value(resolution.termination)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", resolution.termination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::transport::HopMethod;
    use crate::resolver::Termination;
    use crate::scorer::{
        HeuristicCheck, HeuristicKind, ScoreBreakdown, TrustAssessment, Verdict,
    };

    fn sample_resolution() -> ResolutionResult {
        ResolutionResult {
            final_url: "http://example.com/page".into(),
            redirect_chain: vec![
                RedirectChainItem {
                    url: "https://bit.ly/abc".into(),
                    status_code: 301,
                    method: HopMethod::Get,
                },
                RedirectChainItem {
                    url: "http://example.com/page".into(),
                    status_code: 200,
                    method: HopMethod::Head,
                },
            ],
            depth: 1,
            termination: Termination::FinalDestination,
        }
    }

    fn sample_analysis() -> AnalysisResult {
        AnalysisResult::new(
            TrustAssessment {
                trust_score: 70,
                verdict: Verdict::Dangerous,
                reasons: vec!["URL does not use HTTPS".into()],
                breakdown: ScoreBreakdown {
                    heuristics: vec![
                        HeuristicCheck::fail(
                            HeuristicKind::Https,
                            Some("URL does not use HTTPS".into()),
                        ),
                        HeuristicCheck::fail(HeuristicKind::DomainReputation, None),
                    ],
                    external: vec![],
                    raw_score: 70,
                },
            },
            sample_resolution(),
        )
    }

    #[test]
    fn human_analysis_lists_reasons_and_chain() {
        let output = render_analysis(&sample_analysis(), OutputFormat::Human).unwrap();
        assert!(output.contains("Trust Score: 70 (dangerous)"));
        assert!(output.contains("  - URL does not use HTTPS"));
        assert!(output.contains(" 1. [301] GET https://bit.ly/abc"));
        assert!(output.contains("domain_reputation: -10"));
    }

    #[test]
    fn human_resolution_names_termination() {
        let output = render_resolution(&sample_resolution(), OutputFormat::Human).unwrap();
        assert!(output.contains("Final URL: http://example.com/page"));
        assert!(output.contains("Stopped: final_destination"));
        assert!(output.contains(" 2. [200] HEAD http://example.com/page"));
    }

    #[test]
    fn json_analysis_uses_camel_case() {
        let output = render_analysis(&sample_analysis(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["trustScore"], serde_json::json!(70));
        assert_eq!(value["verdict"], "dangerous");
        assert_eq!(value["redirectChain"][0]["statusCode"], 301);
    }

    #[test]
    fn yaml_resolution_serializes() {
        let output = render_resolution(&sample_resolution(), OutputFormat::Yaml).unwrap();
        assert!(output.contains("finalUrl:"));
        assert!(output.contains("http://example.com/page"));
        assert!(output.contains("termination: final_destination"));
    }
}
