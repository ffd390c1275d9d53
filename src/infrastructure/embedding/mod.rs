//! Embedding provider implementations

mod voyage;

pub use voyage::VoyageEmbeddingProvider;

// Re-export the HTTP client seam used by providers
pub use super::http_client::{HttpClient, HttpClientTrait};
