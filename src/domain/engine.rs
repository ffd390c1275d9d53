//! Engine configuration and lookup outcomes

use serde::{Deserialize, Serialize};

/// Configuration for the answer cache engine
///
/// The exact-match probe always runs first; the lexical and semantic
/// fallbacks can be enabled independently. When both are on they layer:
/// the hot tier acts as a cheap pre-filter before the semantic scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether the hot-tier lexical fallback runs on lookups
    #[serde(default = "default_true")]
    pub lexical_enabled: bool,

    /// Whether the durable-tier semantic fallback runs on lookups
    #[serde(default = "default_true")]
    pub semantic_enabled: bool,

    /// Minimum cosine similarity for a semantic hit (0.0 to 1.0)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Minimum normalized edit-distance similarity for a lexical hit
    #[serde(default = "default_lexical_min_similarity")]
    pub lexical_min_similarity: f64,

    /// Score at which the paginated semantic scan stops early
    #[serde(default = "default_early_exit_score")]
    pub early_exit_score: f32,

    /// Number of candidate entries fetched per semantic scan page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Time-to-live for hot-tier projections, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Embedding model used for both lookups and writes
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Fixed dimensionality requested from the embedding provider
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f32 {
    0.9
}

fn default_lexical_min_similarity() -> f64 {
    0.8
}

fn default_early_exit_score() -> f32 {
    0.95
}

fn default_page_size() -> u64 {
    100
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_embedding_model() -> String {
    "voyage-3.5-lite".to_string()
}

fn default_embedding_dimension() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lexical_enabled: default_true(),
            semantic_enabled: default_true(),
            similarity_threshold: default_similarity_threshold(),
            lexical_min_similarity: default_lexical_min_similarity(),
            early_exit_score: default_early_exit_score(),
            page_size: default_page_size(),
            ttl_secs: default_ttl_secs(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hot-tier TTL as a Duration
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }

    pub fn with_lexical_enabled(mut self, enabled: bool) -> Self {
        self.lexical_enabled = enabled;
        self
    }

    pub fn with_semantic_enabled(mut self, enabled: bool) -> Self {
        self.semantic_enabled = enabled;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_lexical_min_similarity(mut self, min: f64) -> Self {
        self.lexical_min_similarity = min.clamp(0.0, 1.0);
        self
    }

    pub fn with_early_exit_score(mut self, score: f32) -> Self {
        self.early_exit_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }
}

/// Classed result of a cache lookup
///
/// Callers that only need the value use [`CacheOutcome::into_value`]; the
/// class is kept for logging and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    /// Fingerprint matched a stored entry
    Exact { value: String },
    /// A hot-tier key was close enough lexically
    Lexical { value: String, similarity: f64 },
    /// A durable entry's embedding cleared the similarity threshold
    Semantic { value: String, score: f32 },
    /// Nothing reusable found. A normal outcome, not an error.
    Miss,
}

impl CacheOutcome {
    /// The matched value, if any
    pub fn into_value(self) -> Option<String> {
        match self {
            Self::Exact { value }
            | Self::Lexical { value, .. }
            | Self::Semantic { value, .. } => Some(value),
            Self::Miss => None,
        }
    }

    /// Short class label for logs
    pub fn class(&self) -> &'static str {
        match self {
            Self::Exact { .. } => "exact",
            Self::Lexical { .. } => "lexical",
            Self::Semantic { .. } => "semantic",
            Self::Miss => "miss",
        }
    }

    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }
}
