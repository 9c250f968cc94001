//! Translation capability for non-target-language transcripts.
//!
//! Translation is additive: when it fails the original transcript is still
//! delivered, so every implementation error here is recoverable by callers.

use crate::error::Result;

#[cfg(feature = "http-translate")]
use crate::error::ScribedError;
#[cfg(feature = "http-translate")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "http-translate")]
use std::time::Duration;

/// Trait for the text translation capability.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` into `target` (ISO 639-1 codes).
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Short name of the backing service, for logs.
    fn name(&self) -> &str;
}

#[cfg(feature = "http-translate")]
#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[cfg(feature = "http-translate")]
#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Translator backed by a LibreTranslate-compatible HTTP endpoint.
///
/// Speaks the `POST /translate` JSON shape: `{"q","source","target","format"}`
/// in, `{"translatedText"}` out.
#[cfg(feature = "http-translate")]
#[derive(Debug)]
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[cfg(feature = "http-translate")]
impl HttpTranslator {
    /// Build a translator against `endpoint`, e.g. `http://localhost:5000/translate`.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| ScribedError::Translation {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[cfg(feature = "http-translate")]
#[async_trait::async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let request = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScribedError::Translation {
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error response".to_string());
            return Err(ScribedError::Translation {
                message: format!("service returned {}: {}", status, body),
            });
        }

        let body: TranslateResponse =
            response.json().await.map_err(|e| ScribedError::Translation {
                message: format!("malformed response: {}", e),
            })?;

        Ok(body.translated_text)
    }

    fn name(&self) -> &str {
        "libretranslate"
    }
}

/// Mock translator for testing.
///
/// By default wraps input as `"<text> [<target>]"` so tests can see both the
/// original text and the target language in the output. Calls are recorded
/// and failures can be scripted.
#[derive(Debug, Default)]
pub struct MockTranslator {
    fail: bool,
    calls: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every translate call fail
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Calls received so far, as (text, source, target) tuples
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((text.to_string(), source.to_string(), target.to_string()));
        }
        if self.fail {
            return Err(crate::error::ScribedError::Translation {
                message: "mock translation failure".to_string(),
            });
        }
        Ok(format!("{} [{}]", text, target))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
