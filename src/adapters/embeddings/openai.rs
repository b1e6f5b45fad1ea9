//! OpenAI embedding provider adapter.
//!
//! Calls the `/v1/embeddings` endpoint once per request and classifies
//! failures into [`DependencyError`] so the resilience layer can decide what
//! to retry. Compatible with any OpenAI-compatible embedding API (e.g.,
//! Azure OpenAI, local servers).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{ConfigError, DependencyError};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::EmbeddingProvider;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Longest error body echoed back into an error message.
const MAX_ERROR_BODY: usize = 200;

/// OpenAI embedding provider.
pub struct OpenAiEmbeddingProvider {
    config: EmbeddingConfig,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddingProvider {
    /// Build the provider, resolving the API key from the config or the
    /// `OPENAI_API_KEY` env var.
    ///
    /// # Errors
    /// `MissingCredentials` when no key is available; `HttpClient` if the
    /// HTTP client cannot be built.
    pub fn new(config: EmbeddingConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| {
                ConfigError::MissingCredentials(format!(
                    "OpenAI API key not set. Set {API_KEY_ENV} or configure embedding.api_key."
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

/// Map a transport-level failure.
fn classify_send_error(error: &reqwest::Error) -> DependencyError {
    if error.is_timeout() {
        DependencyError::Timeout
    } else if error.is_connect() {
        DependencyError::Connection(error.to_string())
    } else {
        DependencyError::Unavailable(error.to_string())
    }
}

/// Map a non-success HTTP status.
fn classify_status(status: StatusCode, body: &str) -> DependencyError {
    let detail: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        StatusCode::TOO_MANY_REQUESTS => DependencyError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DependencyError::Authentication,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => DependencyError::Timeout,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            DependencyError::InvalidInput(detail)
        }
        s if s.is_server_error() => DependencyError::Unavailable(format!("{s}: {detail}")),
        s => DependencyError::Rejected(format!("{s}: {detail}")),
    }
}

/// Error body text, or a marker naming why it could not be read.
fn body_detail(body: Result<String, reqwest::Error>) -> String {
    body.unwrap_or_else(|e| format!("<body unavailable: {e}>"))
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DependencyError> {
        let request_body = EmbeddingsRequest {
            model: &self.config.model,
            input: [text],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = body_detail(response.text().await);
            return Err(classify_status(status, &body));
        }

        let result: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| DependencyError::MalformedResponse(e.to_string()))?;

        result
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| DependencyError::MalformedResponse("response has no data".to_string()))
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
