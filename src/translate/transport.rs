use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::{OverlayError, Result};

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Sends one chat-completions request and hands back the raw success body.
///
/// Any error returned here is treated as retryable by the client.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, body: &'a Value) -> TransportFuture<'a>;
}

/// OpenAI-compatible chat completions over HTTPS.
#[derive(Debug, Clone)]
pub struct ChatCompletionsTransport {
    client: reqwest::Client,
    url: String,
    key: String,
}

impl ChatCompletionsTransport {
    pub fn new(url: impl Into<String>, key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| OverlayError::TranslationFailed(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            url: url.into(),
            key: key.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for ChatCompletionsTransport {
    fn send<'a>(&'a self, body: &'a Value) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(&self.key)
                .json(body)
                .send()
                .await
                .map_err(|err| OverlayError::TranslationFailed(format!("request failed: {err}")))?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return Ok(text);
            }
            Err(OverlayError::TranslationFailed(format!(
                "API error ({}): {}",
                status,
                extract_api_error(&text).unwrap_or(text)
            )))
        })
    }
}

fn extract_api_error(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
