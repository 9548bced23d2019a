//! HTTP embedding provider
//!
//! Speaks the OpenAI-style embeddings wire format: POST `{model, input}`
//! with bearer auth, response `{data: [{embedding: [..]}, ..]}`. Large
//! batches are split into provider-sized sub-batches; results are
//! reassembled in input order.
//!
//! Error classification matters to the pipeline's retry policy:
//! network errors, timeouts, 5xx, and 429 are `ProviderUnavailable`
//! (retriable); 401/403 are `AuthError`; a count or dimension mismatch is
//! `InvalidResponse` (both terminal).

use crate::config::Config;
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    max_batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .embedding_api_key
            .clone()
            .ok_or_else(|| Error::AuthError("EMBEDDING_API_KEY is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: config.embedding_api_url.clone(),
            api_key,
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
            max_batch_size: config.embedding_batch_size,
        })
    }

    /// Send one provider request for up to `max_batch_size` texts.
    async fn embed_single_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model,
            input: texts,
        };

        let start = Instant::now();
        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                warn!(batch_size = texts.len(), "embedding request timed out");
                return Err(Error::ProviderUnavailable("request timed out".to_string()));
            }
            Err(e) => {
                warn!(error = %e, batch_size = texts.len(), "embedding request failed to send");
                return Err(Error::ProviderUnavailable(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = status.as_u16();
            warn!(status = code, batch_size = texts.len(), model, "provider returned error status");
            return Err(match code {
                401 | 403 => Error::AuthError(format!("provider returned {}: {}", status, body)),
                429 => Error::ProviderUnavailable(format!("rate limited: {}", body)),
                500..=599 => {
                    Error::ProviderUnavailable(format!("provider returned {}: {}", status, body))
                }
                _ => Error::InvalidResponse(format!("provider returned {}: {}", status, body)),
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("malformed response body: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(Error::InvalidResponse(format!(
                "got {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(Error::InvalidResponse(format!(
                "expected dimension {}, got {}",
                self.dimensions,
                bad.len()
            )));
        }

        debug!(
            batch_size = texts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedding batch complete"
        );
        Ok(vectors)
    }
}

#[async_trait::async_trait]
impl EmbeddingService for RemoteEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(self.max_batch_size) {
            let vectors = self.embed_single_batch(sub_batch, model).await?;
            all.extend(vectors);
        }
        Ok(all)
    }
}
