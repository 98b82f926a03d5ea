//! External image generation service client
//!
//! Consumed as: given text, returns a nonempty set of image blobs, or
//! fails. Calls are expensive and rate-limited upstream; the orchestrator
//! guarantees each distinct phrase is sent at most once per process
//! lifetime and throttles bursts of new phrases.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lyrivis_common::{Error, Result};
use serde::Deserialize;
use serde_json::json;

/// Seam for the external image generator
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one or more images for a phrase. An empty result set is
    /// an error.
    async fn generate(&self, prompt: &str) -> Result<Vec<Vec<u8>>>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    /// Base64-encoded PNG payloads
    images: Vec<String>,
}

/// HTTP image generator client
pub struct HttpImageGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpImageGenerator {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<Vec<u8>>> {
        tracing::info!(prompt_len = prompt.len(), "Requesting image generation");

        let mut request = self.client.post(&self.endpoint).json(&json!({ "prompt": prompt }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Image generator request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "Image generator returned {}",
                status
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse generator response: {}", e)))?;

        if body.images.is_empty() {
            return Err(Error::Upstream(
                "Image generator returned no images".to_string(),
            ));
        }

        body.images
            .iter()
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Upstream(format!("Invalid image payload: {}", e)))
            })
            .collect()
    }
}
