use crate::config::Config;
use crate::i18n::Language;
use crate::retry::{with_retry_if, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Failure of a single translation request
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("failed to send translation request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse translation response: {0}")]
    Decode(String),
}

impl TranslateError {
    /// Rate limiting, server errors and transport failures are worth retrying.
    /// Other client errors and malformed bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Http(_) => true,
            TranslateError::Status { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            TranslateError::Decode(_) => false,
        }
    }
}

/// External text-translation service
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` into `target`.
    ///
    /// `Ok(None)` means the service had nothing to offer (no translation, or
    /// one identical to the input); callers leave the text as it is.
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Language,
        target: Language,
    ) -> BoxFuture<'a, Result<Option<String>, TranslateError>>;
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "responseData")]
    response_data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

/// Keep a translation only if it is non-empty and differs from the input
fn meaningful_translation(original: &str, translated: Option<String>) -> Option<String> {
    translated
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && t != original.trim())
}

/// Client for a MyMemory-style `GET ?q=&langpair=` translation endpoint
#[derive(Debug, Clone)]
pub struct MyMemoryClient {
    client: reqwest::Client,
    api_url: String,
    retry: RetryConfig,
}

impl MyMemoryClient {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            retry: RetryConfig::single_attempt(),
        }
    }

    /// Build a client with the configured endpoint, timeout and retry policy
    pub fn from_config(config: &Config) -> Result<Self, TranslateError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let retry = if config.max_attempts > 1 {
            RetryConfig::translation(config.max_attempts)
        } else {
            RetryConfig::single_attempt()
        };

        Ok(Self::new(builder.build()?, &config.translate_api_url).with_retry(retry))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Translate a single text
    pub async fn translate_text(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<Option<String>, TranslateError> {
        if source == target {
            return Ok(None);
        }

        let langpair = target.langpair_from(source);

        with_retry_if(
            &self.retry,
            &format!("Translation to {}", target.name()),
            || self.request(text, &langpair),
            TranslateError::is_retryable,
        )
        .await
    }

    async fn request(&self, text: &str, langpair: &str) -> Result<Option<String>, TranslateError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("q", text), ("langpair", langpair)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TranslateError::Status { status, body });
        }

        let parsed: TranslateResponse =
            serde_json::from_str(&body).map_err(|e| TranslateError::Decode(e.to_string()))?;

        let translated = parsed.response_data.and_then(|data| data.translated_text);
        let translated = meaningful_translation(text, translated);
        if translated.is_none() {
            debug!("No translation returned for {:?} ({})", text, langpair);
        }

        Ok(translated)
    }
}

impl Translator for MyMemoryClient {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Language,
        target: Language,
    ) -> BoxFuture<'a, Result<Option<String>, TranslateError>> {
        self.translate_text(text, source, target).boxed()
    }
}
