//! Embedding request types

use serde::{Deserialize, Serialize};

/// Input for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    /// Single text input
    Single(String),
    /// Batch of text inputs, embedded in matching order
    Batch(Vec<String>),
}

impl EmbeddingInput {
    /// Get all inputs as a vector
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            EmbeddingInput::Single(s) => vec![s.as_str()],
            EmbeddingInput::Batch(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Get the number of inputs
    pub fn len(&self) -> usize {
        match self {
            EmbeddingInput::Single(_) => 1,
            EmbeddingInput::Batch(v) => v.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        match self {
            EmbeddingInput::Single(s) => s.is_empty(),
            EmbeddingInput::Batch(v) => v.is_empty(),
        }
    }
}

/// Request to generate embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Model to use for embedding
    model: String,
    /// Input text(s) to embed
    input: EmbeddingInput,
    /// Requested output dimensionality, for models that support it
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimension: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a new embedding request
    pub fn new(model: impl Into<String>, input: EmbeddingInput) -> Self {
        Self {
            model: model.into(),
            input,
            output_dimension: None,
        }
    }

    /// Create a request for a single text
    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(model, EmbeddingInput::Single(text.into()))
    }

    /// Create a request for multiple texts
    pub fn batch(model: impl Into<String>, texts: Vec<String>) -> Self {
        Self::new(model, EmbeddingInput::Batch(texts))
    }

    /// Set the requested output dimensionality
    pub fn with_output_dimension(mut self, dimension: usize) -> Self {
        self.output_dimension = Some(dimension);
        self
    }

    /// Get the model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the input
    pub fn input(&self) -> &EmbeddingInput {
        &self.input
    }

    /// Get inputs as strings
    pub fn inputs(&self) -> Vec<&str> {
        self.input.as_vec()
    }

    /// Get the requested dimensionality
    pub fn output_dimension(&self) -> Option<usize> {
        self.output_dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_input_single() {
        let input = EmbeddingInput::Single("hello".into());

        assert_eq!(input.len(), 1);
        assert!(!input.is_empty());
        assert_eq!(input.as_vec(), vec!["hello"]);
    }

    #[test]
    fn test_embedding_input_batch() {
        let input = EmbeddingInput::Batch(vec!["hello".into(), "world".into()]);

        assert_eq!(input.len(), 2);
        assert_eq!(input.as_vec(), vec!["hello", "world"]);
    }

    #[test]
    fn test_embedding_request_single() {
        let request = EmbeddingRequest::single("voyage-3.5-lite", "test");

        assert_eq!(request.model(), "voyage-3.5-lite");
        assert_eq!(request.inputs(), vec!["test"]);
        assert_eq!(request.output_dimension(), None);
    }

    #[test]
    fn test_embedding_request_batch_preserves_order() {
        let request = EmbeddingRequest::batch("voyage-3.5-lite", vec!["a".into(), "b".into()]);

        assert_eq!(request.inputs(), vec!["a", "b"]);
    }

    #[test]
    fn test_embedding_request_with_dimension() {
        let request = EmbeddingRequest::single("voyage-3.5-lite", "test").with_output_dimension(1024);

        assert_eq!(request.output_dimension(), Some(1024));
    }
}
