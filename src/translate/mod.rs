use futures_util::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

mod prompt;
mod retry;
mod transport;

pub use prompt::{
    TEMPERATURE, chat_body, extract_content, render_system_prompt, render_user_prompt,
};
pub use retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, backoff_delay};
pub use transport::{ChatCompletionsTransport, Transport, TransportFuture};

use crate::languages::LanguageCode;

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Translates block texts through a chat-completions endpoint.
///
/// Translation never fails from the caller's point of view: when every attempt
/// fails, or the endpoint answers with something unusable, the source text is
/// handed back unchanged.
#[derive(Debug, Clone)]
pub struct TranslationClient<T: Transport = ChatCompletionsTransport> {
    transport: T,
    model: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl<T: Transport> TranslationClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            model: DEFAULT_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn translate(&self, text: &str, src: LanguageCode, dst: LanguageCode) -> String {
        if src == dst {
            return text.to_string();
        }
        let body = match chat_body(&self.model, text, src, dst) {
            Ok(body) => body,
            Err(err) => {
                warn!("{err}; keeping source text");
                return text.to_string();
            }
        };

        for attempt in 1..=self.max_retries {
            match self.transport.send(&body).await {
                Ok(response) => {
                    return match extract_content(&response) {
                        Ok(content) => {
                            debug!("translated {} chars on attempt {}", text.chars().count(), attempt);
                            content
                        }
                        Err(err) => {
                            warn!("{err}; keeping source text");
                            text.to_string()
                        }
                    };
                }
                Err(err) => {
                    retry::wait_with_backoff(
                        attempt,
                        self.max_retries,
                        self.retry_delay,
                        &err.to_string(),
                    )
                    .await;
                }
            }
        }
        warn!("reached {} attempts; keeping source text", self.max_retries);
        text.to_string()
    }

    /// Translates `texts` with up to `concurrency` requests in flight,
    /// returning results in input order.
    pub async fn translate_all(
        &self,
        texts: &[String],
        src: LanguageCode,
        dst: LanguageCode,
        concurrency: usize,
    ) -> Vec<String> {
        stream::iter(texts)
            .map(|text| self.translate(text, src, dst))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
