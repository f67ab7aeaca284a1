//! Turn a decoded QR payload into a URL the analyzer can follow.

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("QR payload is empty")]
    Empty,
    #[error("QR payload uses unsupported scheme `{scheme}`")]
    UnsupportedScheme { scheme: String },
}

/// Accept `http(s)` URLs as-is and bare hosts with an implied `https://`.
///
/// Anything carrying another scheme (`javascript:`, `data:`, `mailto:`, `WIFI:` and so on)
/// is rejected rather than guessed at.
pub fn extract_url(payload: &str) -> Result<String, PayloadError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(PayloadError::Empty);
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.into()),
        Ok(url) if is_host_with_port(trimmed, url.scheme()) => Ok(format!("https://{trimmed}")),
        Ok(url) => Err(PayloadError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        }),
        Err(_) => Ok(format!("https://{trimmed}")),
    }
}

/// `example.com:8080/path` parses with scheme `example.com`; treat it as a host.
fn is_host_with_port(raw: &str, scheme: &str) -> bool {
    scheme.contains('.')
        && raw[scheme.len()..]
            .strip_prefix(':')
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_http_urls() {
        assert_eq!(
            extract_url("  https://bit.ly/abc \n").unwrap(),
            "https://bit.ly/abc"
        );
        assert_eq!(
            extract_url("HTTP://Example.com").unwrap(),
            "http://example.com/"
        );
    }

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(extract_url("example.com/menu").unwrap(), "https://example.com/menu");
        assert_eq!(
            extract_url("example.com:8080/menu").unwrap(),
            "https://example.com:8080/menu"
        );
    }

    #[test]
    fn rejects_non_web_payloads() {
        for (payload, scheme) in [
            ("javascript:alert(1)", "javascript"),
            ("data:text/html,<b>x</b>", "data"),
            ("mailto:someone@example.com", "mailto"),
            ("WIFI:S:home;T:WPA;P:secret;;", "wifi"),
        ] {
            assert_eq!(
                extract_url(payload),
                Err(PayloadError::UnsupportedScheme {
                    scheme: scheme.to_string()
                }),
                "{payload}"
            );
        }
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert_eq!(extract_url("   "), Err(PayloadError::Empty));
    }
}
