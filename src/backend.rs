//! Machine translation backend client.
//!
//! The translate stage talks to a LibreTranslate-compatible endpoint
//! through the `TranslationBackend` trait so tests can substitute a
//! stub. Backend failures are stage-local (`SyncError::Backend`); the
//! core never retries, the next change event is the retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{SyncError, SyncResult};

/// Batch translation of plain texts between two locales.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `texts` from `source` into `target`, preserving order
    /// and length.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> SyncResult<Vec<String>>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a [String],
    source: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Vec<String>,
}

/// HTTP client for a LibreTranslate-compatible endpoint.
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> SyncResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut translated = Vec::with_capacity(texts.len());

        // Requests capped at the configured batch size; one failed
        // chunk fails the whole call, already-returned chunks are the
        // caller's at-least-once concern.
        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let request = TranslateRequest {
                q: chunk,
                source,
                target,
                api_key: self.config.api_key.as_deref(),
            };

            let response = self
                .client
                .post(&self.config.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| SyncError::Backend {
                    reason: format!("request to {} failed: {e}", self.config.endpoint),
                })?;

            if !response.status().is_success() {
                return Err(SyncError::Backend {
                    reason: format!("endpoint returned {}", response.status()),
                });
            }

            let body: TranslateResponse =
                response.json().await.map_err(|e| SyncError::Backend {
                    reason: format!("malformed response: {e}"),
                })?;

            if body.translated_text.len() != chunk.len() {
                return Err(SyncError::Backend {
                    reason: format!(
                        "length mismatch: sent {}, received {}",
                        chunk.len(),
                        body.translated_text.len()
                    ),
                });
            }

            translated.extend(body.translated_text);
        }

        Ok(translated)
    }
}

/// Backend that translates nothing; used when machine translation is
/// disabled and as a test double.
#[derive(Debug, Default)]
pub struct NullBackend;

#[async_trait]
impl TranslationBackend for NullBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        _source: &str,
        _target: &str,
    ) -> SyncResult<Vec<String>> {
        Ok(texts.to_vec())
    }
}
