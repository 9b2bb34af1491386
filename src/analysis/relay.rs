//! HTTP client for the companion relay.
//!
//! The relay proxies analysis calls to the vision provider and injects the
//! server-held credential, so this client sends no API key. It is the
//! production implementation of [`AnalysisClient`]; the core never talks to
//! the provider directly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use super::client::{AnalysisClient, AnalysisContext, ImagePayload};
use super::repair::parse_analysis_response;
use super::AnalysisError;
use crate::models::{AnalysisResult, Language};

/// Blocking HTTP client for the relay's analyze endpoint. Drive it through
/// `tokio::task::spawn_blocking`; the job runner does this.
pub struct RelayClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl RelayClient {
    /// Create a client for the relay at `base_url`. Timeout policy lives
    /// here; the core applies none of its own.
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Relay on the same host with a 2-minute timeout (multi-page vision
    /// calls are slow).
    pub fn default_local() -> Self {
        Self::new("http://localhost:8787", 120)
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    images: Vec<RequestImage>,
    context: &'a AnalysisContext,
    language: &'a str,
}

#[derive(Serialize)]
struct RequestImage {
    mime: String,
    data: String,
}

impl AnalysisClient for RelayClient {
    fn analyze(
        &self,
        images: &[ImagePayload],
        context: &AnalysisContext,
        language: Language,
    ) -> Result<AnalysisResult, AnalysisError> {
        let url = format!("{}/api/analyze", self.base_url);
        let body = AnalyzeRequest {
            images: images
                .iter()
                .map(|img| RequestImage {
                    mime: img.mime.clone(),
                    data: BASE64.encode(&img.bytes),
                })
                .collect(),
            context,
            language: language.as_str(),
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                AnalysisError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AnalysisError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                AnalysisError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .map_err(|e| AnalysisError::Http(e.to_string()))?;
        parse_analysis_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = RelayClient::new("http://relay.local:8787/", 30);
        assert_eq!(client.base_url, "http://relay.local:8787");
    }

    #[test]
    fn request_body_shape() {
        let context = AnalysisContext {
            age: Some(60),
            gender: Some("male".into()),
            condition: None,
            report_date: Some("2024-03-01".into()),
        };
        let body = AnalyzeRequest {
            images: vec![RequestImage {
                mime: "image/jpeg".into(),
                data: BASE64.encode([0xFF, 0xD8]),
            }],
            context: &context,
            language: Language::Zh.as_str(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["language"], "zh");
        assert_eq!(json["context"]["reportDate"], "2024-03-01");
        assert_eq!(json["images"][0]["mime"], "image/jpeg");
    }
}
