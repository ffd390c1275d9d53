//! Hybrid answer cache
//!
//! Decides whether a previously produced answer can be reused instead of
//! invoking an expensive generation step, by combining:
//! - exact content match (fingerprint probe, O(1))
//! - lexical near-duplicate match over a TTL-bound hot tier
//! - embedding-vector semantic match, paged over the durable corpus
//!
//! The cache is never a correctness-critical store: every infrastructure or
//! provider failure degrades to a miss on read or a no-op on write.

pub mod config;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use tracing::warn;

pub use config::AppConfig;
pub use domain::{CacheEntry, CacheOutcome, DomainError, DurableTier, EngineConfig, HotTier};
pub use infrastructure::services::AnswerCacheService;

use infrastructure::durable_tier::{PostgresDurableTier, PostgresDurableTierConfig};
use infrastructure::embedding::{HttpClient, VoyageEmbeddingProvider};
use infrastructure::hot_tier::{InMemoryHotTier, RedisHotTier, RedisHotTierConfig};

/// Wire up a ready-to-use cache service from configuration
///
/// The durable tier must be reachable; the hot tier may be down (the
/// adapter keeps retrying on later calls). An empty hot-tier URL selects
/// the in-memory hot tier.
pub async fn create_service(config: &AppConfig) -> Result<AnswerCacheService, DomainError> {
    let hot: Arc<dyn HotTier> = if config.hot_tier.url.is_empty() {
        Arc::new(InMemoryHotTier::new())
    } else {
        let redis_config = RedisHotTierConfig::new(&config.hot_tier.url)
            .with_key_prefix(&config.hot_tier.key_prefix)
            .with_error_log_limit(config.hot_tier.error_log_limit);

        let tier = RedisHotTier::new(redis_config)?;

        if let Err(e) = tier.connect().await {
            warn!("Hot tier unavailable at startup; continuing without it: {}", e);
        }

        Arc::new(tier)
    };

    let durable_config = PostgresDurableTierConfig::new(&config.durable_tier.url)
        .with_table_name(&config.durable_tier.table_name)
        .with_max_connections(config.durable_tier.max_connections);

    let durable = Arc::new(PostgresDurableTier::connect(&durable_config).await?);

    let embeddings = Arc::new(VoyageEmbeddingProvider::with_base_url(
        HttpClient::new(),
        &config.embedding.api_key,
        &config.embedding.base_url,
    ));

    Ok(AnswerCacheService::with_config(
        hot,
        durable,
        embeddings,
        config.engine.clone(),
    ))
}
