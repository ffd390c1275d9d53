//! Voyage AI embedding provider implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::HttpClientTrait;
use crate::domain::embedding::{
    Embedding, EmbeddingInput, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
    EmbeddingUsage,
};
use crate::domain::DomainError;

const DEFAULT_VOYAGE_BASE_URL: &str = "https://api.voyageai.com";

/// Known Voyage embedding models and their default dimensions
const EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("voyage-3.5-lite", 1024),
    ("voyage-3.5", 1024),
    ("voyage-3-large", 1024),
    ("voyage-code-3", 1024),
];

/// Voyage AI embedding provider
#[derive(Debug)]
pub struct VoyageEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> VoyageEmbeddingProvider<C> {
    /// Create a new Voyage embedding provider
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_VOYAGE_BASE_URL)
    }

    /// Create a new provider with custom base URL
    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, request: &EmbeddingRequest) -> serde_json::Value {
        // Voyage takes the input as an array even for a single text
        let input = match request.input() {
            EmbeddingInput::Single(s) => serde_json::json!([s]),
            EmbeddingInput::Batch(v) => serde_json::json!(v),
        };

        let mut body = serde_json::json!({
            "model": request.model(),
            "input": input,
        });

        if let Some(dimension) = request.output_dimension() {
            body["output_dimension"] = serde_json::json!(dimension);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<EmbeddingResponse, DomainError> {
        let response: VoyageEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("voyage", format!("Failed to parse embedding response: {}", e))
        })?;

        let embeddings: Vec<Embedding> = response
            .data
            .into_iter()
            .map(|d| Embedding::new(d.index, d.embedding))
            .collect();

        let usage = EmbeddingUsage::new(response.usage.total_tokens);

        Ok(EmbeddingResponse::new(response.model, embeddings, usage))
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for VoyageEmbeddingProvider<C> {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        let url = self.embeddings_url();
        let body = self.build_request(&request);

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        "voyage"
    }

    fn default_model(&self) -> &'static str {
        "voyage-3.5-lite"
    }

    fn dimensions(&self, model: &str) -> Option<usize> {
        EMBEDDING_MODELS
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, dims)| *dims)
    }
}

// Voyage API types for embeddings

#[derive(Debug, Serialize, Deserialize)]
struct VoyageEmbeddingResponse {
    model: String,
    data: Vec<VoyageEmbeddingData>,
    usage: VoyageEmbeddingUsage,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoyageEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoyageEmbeddingUsage {
    total_tokens: u32,
}
