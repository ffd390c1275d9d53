//! Cache entry entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::{fingerprint, normalize};

/// A single cached answer in the durable tier
///
/// The key is always the normalized form of the input that produced the
/// answer, and the fingerprint is derived from it, so an entry can be
/// located either by exact content hash or by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized input text, unique within the durable tier
    key: String,
    /// Content hash of the key
    fingerprint: String,
    /// The stored answer text
    value: String,
    /// Embedding vector for semantic matching, if one has been computed
    embedding: Option<Vec<f32>>,
    /// When this entry was first created
    created_at: DateTime<Utc>,
    /// When this entry was last overwritten
    updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create a new entry from raw input text and its answer
    ///
    /// The input is normalized into the key and fingerprinted; the entry
    /// starts without an embedding.
    pub fn new(input: impl AsRef<str>, value: impl Into<String>) -> Self {
        let key = normalize(input.as_ref());
        let fingerprint = fingerprint(&key);
        let now = Utc::now();

        Self {
            key,
            fingerprint,
            value: value.into(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate an entry from stored fields, trusting them as-is
    pub fn from_parts(
        key: String,
        fingerprint: String,
        value: String,
        embedding: Option<Vec<f32>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            fingerprint,
            value,
            embedding,
            created_at,
            updated_at,
        }
    }

    /// Attach an embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Whether this entry participates in semantic scans
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Consume the entry, returning the stored value
    pub fn into_value(self) -> String {
        self.value
    }
}
