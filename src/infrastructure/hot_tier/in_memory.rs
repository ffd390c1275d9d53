//! In-memory hot tier implementation using moka
//!
//! Suitable for development, tests and single-process deployments where a
//! separate Redis is not worth running.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::hot_tier::HotTier;
use crate::domain::{lexical, DomainError};

/// Configuration for the in-memory hot tier
#[derive(Debug, Clone)]
pub struct InMemoryHotTierConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime, regardless of its own TTL
    pub max_ttl: Duration,
}

impl Default for InMemoryHotTierConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(3600),
        }
    }
}

impl InMemoryHotTierConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }
}

/// Value stored in moka, carrying its own expiry
#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    /// Expiration timestamp (millis since epoch)
    expires_at: u64,
}

/// Thread-safe in-memory hot tier
#[derive(Debug)]
pub struct InMemoryHotTier {
    cache: MokaCache<String, StoredValue>,
}

impl InMemoryHotTier {
    /// Creates a new in-memory hot tier with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryHotTierConfig::default())
    }

    /// Creates a new in-memory hot tier with the given configuration
    pub fn with_config(config: InMemoryHotTierConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_ttl)
            .build();

        Self { cache }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(stored: &StoredValue) -> bool {
        Self::current_time_millis() > stored.expires_at
    }
}

impl Default for InMemoryHotTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HotTier for InMemoryHotTier {
    async fn get_exact(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.cache.get(key).await {
            Some(stored) => {
                if Self::is_expired(&stored) {
                    self.cache.invalidate(key).await;
                    Ok(None)
                } else {
                    Ok(Some(stored.value))
                }
            }
            None => Ok(None),
        }
    }

    async fn get_fuzzy(
        &self,
        key: &str,
        min_similarity: f64,
    ) -> Result<Option<String>, DomainError> {
        let mut best: Option<(f64, String)> = None;

        for (stored_key, stored) in self.cache.iter() {
            if Self::is_expired(&stored) {
                continue;
            }

            let sim = lexical::similarity(key, stored_key.as_str());

            if sim >= min_similarity && best.as_ref().is_none_or(|(b, _)| sim > *b) {
                best = Some((sim, stored.value));
            }
        }

        Ok(best.map(|(_, value)| value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let stored = StoredValue {
            value: value.to_string(),
            expires_at: Self::current_time_millis() + ttl.as_millis() as u64,
        };

        self.cache.insert(key.to_string(), stored).await;
        Ok(())
    }
}
