//! Answer cache orchestration
//!
//! Decides whether a previously produced answer can be reused instead of
//! invoking the expensive generation step. Lookup order: exact fingerprint
//! probe, then hot-tier lexical fallback, then paged semantic scan over the
//! durable tier. Every infrastructure or provider failure degrades to a
//! miss on read or a no-op on write; only malformed arguments are loud.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::entry::CacheEntry;
use crate::domain::fingerprint::{fingerprint, normalize};
use crate::domain::{CacheOutcome, DomainError, DurableTier, EngineConfig, HotTier};
use crate::infrastructure::scoring::ScoringPool;

/// Hybrid answer cache engine
#[derive(Debug)]
pub struct AnswerCacheService {
    hot: Arc<dyn HotTier>,
    durable: Arc<dyn DurableTier>,
    embeddings: Arc<dyn EmbeddingProvider>,
    scoring: ScoringPool,
    config: EngineConfig,
}

impl AnswerCacheService {
    /// Create a new service with default configuration
    pub fn new(
        hot: Arc<dyn HotTier>,
        durable: Arc<dyn DurableTier>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::with_config(hot, durable, embeddings, EngineConfig::default())
    }

    /// Create a new service with custom configuration
    pub fn with_config(
        hot: Arc<dyn HotTier>,
        durable: Arc<dyn DurableTier>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            hot,
            durable,
            embeddings,
            scoring: ScoringPool::new(),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Look up a reusable answer for the input
    ///
    /// Returns the cached value on any class of match, `None` on a miss.
    /// Fails only on malformed input.
    pub async fn get_cached_result(&self, input: &str) -> Result<Option<String>, DomainError> {
        let outcome = self
            .lookup(input, self.config.similarity_threshold)
            .await?;

        debug!("Cache lookup finished: {}", outcome.class());
        Ok(outcome.into_value())
    }

    /// Look up with an explicit semantic similarity threshold, returning
    /// the classed outcome
    pub async fn lookup(&self, input: &str, threshold: f32) -> Result<CacheOutcome, DomainError> {
        let key = normalize(input);

        if key.is_empty() {
            return Err(DomainError::validation("input must not be empty"));
        }

        // 1. Exact fingerprint probe. Always first, always wins.
        let fp = fingerprint(&key);

        match self.durable.get_by_fingerprint(&fp).await {
            Ok(Some(entry)) => {
                debug!("Exact fingerprint hit for key '{}'", entry.key());
                return Ok(CacheOutcome::Exact {
                    value: entry.into_value(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Fingerprint probe failed; continuing without it: {}", e);
            }
        }

        // 2. Hot-tier lexical fallback.
        if self.config.lexical_enabled {
            if let Some(outcome) = self.lexical_lookup(&key).await {
                return Ok(outcome);
            }
        }

        // 3. Durable-tier semantic fallback.
        if self.config.semantic_enabled {
            if let Some(outcome) = self.semantic_lookup(&key, threshold).await {
                return Ok(outcome);
            }
        }

        Ok(CacheOutcome::Miss)
    }

    /// Store a freshly produced answer
    ///
    /// Embedding failure is tolerated (the entry is stored without a
    /// vector and remains eligible for exact/lexical matches); store
    /// failures degrade to a no-op.
    pub async fn set_cache(&self, input: &str, value: &str) -> Result<(), DomainError> {
        let key = normalize(input);

        if key.is_empty() {
            return Err(DomainError::validation("input must not be empty"));
        }

        let mut entry = CacheEntry::new(&key, value);

        match self.embed_single(&key).await {
            Ok(vector) => entry = entry.with_embedding(vector),
            Err(e) => {
                warn!("Embedding failed; storing entry without one: {}", e);
            }
        }

        if let Err(e) = self.durable.upsert(&entry).await {
            warn!("Durable upsert failed; answer will not be cached: {}", e);
        }

        // Hot-tier copies are projections of durable entries; without a
        // durable write there is nothing to project.
        if self.config.lexical_enabled && !self.durable.is_read_only() {
            if let Err(e) = self.hot.set(&key, value, self.config.ttl()).await {
                debug!("Hot tier mirror failed: {}", e);
            }
        }

        Ok(())
    }

    /// Compute embeddings and fingerprints for stored entries that lack
    /// them, in batches. Returns the number of entries updated.
    pub async fn backfill_embeddings(&self, batch_size: u64) -> Result<u64, DomainError> {
        if self.durable.is_read_only() {
            debug!("Durable tier is read-only; skipping backfill");
            return Ok(0);
        }

        let mut updated = 0u64;

        loop {
            let batch = self.durable.scan_unembedded_page(batch_size).await?;

            if batch.is_empty() {
                break;
            }

            let texts: Vec<String> = batch.iter().map(|e| e.key().to_string()).collect();
            let request = EmbeddingRequest::batch(&self.config.embedding_model, texts)
                .with_output_dimension(self.config.embedding_dimension);

            let response = match self.embeddings.embed(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Embedding batch failed; stopping backfill run: {}", e);
                    break;
                }
            };

            let vectors = response.into_embeddings();

            if vectors.len() != batch.len() {
                warn!(
                    "Provider returned {} embeddings for {} inputs; stopping backfill run",
                    vectors.len(),
                    batch.len()
                );
                break;
            }

            for (entry, vector) in batch.into_iter().zip(vectors) {
                let entry = entry.with_embedding(vector.into_vector());
                self.durable.upsert(&entry).await?;
                updated += 1;
            }

            debug!("Backfilled {} entries so far", updated);
        }

        Ok(updated)
    }

    /// Diagnostic: total entries in the durable tier
    pub async fn count(&self) -> Result<u64, DomainError> {
        self.durable.count().await
    }

    async fn lexical_lookup(&self, key: &str) -> Option<CacheOutcome> {
        match self.hot.get_exact(key).await {
            Ok(Some(value)) => {
                debug!("Hot tier exact hit for key '{}'", key);
                return Some(CacheOutcome::Lexical {
                    value,
                    similarity: 1.0,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Hot tier exact probe failed: {}", e);
                return None;
            }
        }

        match self
            .hot
            .get_fuzzy(key, self.config.lexical_min_similarity)
            .await
        {
            Ok(Some(value)) => Some(CacheOutcome::Lexical {
                value,
                similarity: self.config.lexical_min_similarity,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!("Hot tier fuzzy probe failed: {}", e);
                None
            }
        }
    }

    /// Paged semantic scan with a running best and early exit
    async fn semantic_lookup(&self, key: &str, threshold: f32) -> Option<CacheOutcome> {
        let query = match self.embed_single(key).await {
            Ok(vector) => vector,
            Err(e) => {
                // Provider failure aborts the semantic path only
                warn!("Embedding failed; skipping semantic scan: {}", e);
                return None;
            }
        };

        let mut best: Option<CacheEntry> = None;
        let mut best_score = threshold;
        let mut page = 0u64;

        loop {
            let candidates = match self
                .durable
                .scan_embedding_page(page, self.config.page_size)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Semantic scan failed at page {}: {}", page, e);
                    break;
                }
            };

            if candidates.is_empty() {
                break;
            }

            match self.scoring.score_page(&query, candidates, best_score).await {
                Ok(result) => {
                    if let Some(entry) = result.best_match {
                        best_score = result.best_score;
                        best = Some(entry);
                    }
                }
                Err(e) => {
                    warn!("Scoring failed for page {}; skipping it: {}", page, e);
                }
            }

            if best.is_some() && best_score >= self.config.early_exit_score {
                debug!(
                    "Early exit at page {} with score {:.4}",
                    page, best_score
                );
                break;
            }

            page += 1;
        }

        best.map(|entry| {
            debug!(
                "Semantic hit for key '{}' at score {:.4}",
                entry.key(),
                best_score
            );
            CacheOutcome::Semantic {
                value: entry.into_value(),
                score: best_score,
            }
        })
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let request = EmbeddingRequest::single(&self.config.embedding_model, text)
            .with_output_dimension(self.config.embedding_dimension);

        let response = self.embeddings.embed(request).await?;

        response
            .into_embeddings()
            .into_iter()
            .next()
            .map(|e| e.into_vector())
            .ok_or_else(|| DomainError::provider("embedding", "No embedding returned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::hot_tier::mock::MockHotTier;
    use crate::infrastructure::durable_tier::InMemoryDurableTier;

    const DIM: usize = 8;

    fn service_parts() -> (
        Arc<MockHotTier>,
        Arc<InMemoryDurableTier>,
        Arc<MockEmbeddingProvider>,
    ) {
        (
            Arc::new(MockHotTier::new()),
            Arc::new(InMemoryDurableTier::new()),
            Arc::new(MockEmbeddingProvider::new("mock", DIM)),
        )
    }

    fn build_service(
        hot: Arc<dyn HotTier>,
        durable: Arc<dyn DurableTier>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> AnswerCacheService {
        AnswerCacheService::with_config(hot, durable, embeddings, config)
    }

    fn test_config() -> EngineConfig {
        EngineConfig::new()
            .with_similarity_threshold(0.9)
            .with_page_size(2)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (hot, durable, embeddings) = service_parts();
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("What is 2+2?", "4").await.unwrap();

        let result = service.get_cached_result("What is 2+2?").await.unwrap();
        assert_eq!(result, Some("4".to_string()));
    }

    #[tokio::test]
    async fn test_exact_match_ignores_case_and_whitespace() {
        let (hot, durable, embeddings) = service_parts();
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("What is 2+2?", "4").await.unwrap();

        let result = service.get_cached_result("  what is 2+2? ").await.unwrap();
        assert_eq!(result, Some("4".to_string()));
    }

    #[tokio::test]
    async fn test_empty_store_misses() {
        let (hot, durable, embeddings) = service_parts();
        let service = build_service(hot, durable, embeddings, test_config());

        let result = service.get_cached_result("anything at all").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_empty_input_is_loud() {
        let (hot, durable, embeddings) = service_parts();
        let service = build_service(hot, durable, embeddings, test_config());

        let lookup = service.get_cached_result("   ").await;
        assert!(matches!(lookup, Err(DomainError::Validation { .. })));

        let write = service.set_cache("", "v").await;
        assert!(matches!(write, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_semantic_hit_above_threshold() {
        // Scenario: stored "what is 2+2" embeds to E1, query "what's 2+2?"
        // embeds to E2 with cosine(E1, E2) ~ 0.93 >= 0.9
        let e1 = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let c = 0.93f32;
        let s = (1.0 - c * c).sqrt();
        let e2 = vec![c, s, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        let (hot, durable, _) = service_parts();
        let embeddings = Arc::new(
            MockEmbeddingProvider::new("mock", DIM)
                .with_vector("what is 2+2", e1)
                .with_vector("what's 2+2?", e2),
        );
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("what is 2+2", "4").await.unwrap();

        let result = service.get_cached_result("what's 2+2?").await.unwrap();
        assert_eq!(result, Some("4".to_string()));

        let outcome = service.lookup("what's 2+2?", 0.9).await.unwrap();
        assert!(matches!(outcome, CacheOutcome::Semantic { .. }));
    }

    #[tokio::test]
    async fn test_semantic_miss_below_threshold() {
        let e1 = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let e2 = vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        let (hot, durable, _) = service_parts();
        let embeddings = Arc::new(
            MockEmbeddingProvider::new("mock", DIM)
                .with_vector("what is 2+2", e1)
                .with_vector("recommend a movie", e2),
        );
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("what is 2+2", "4").await.unwrap();

        let result = service.get_cached_result("recommend a movie").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_exact_match_beats_higher_semantic_score() {
        // "other question" is semantically identical to the query vector,
        // but the query's fingerprint matches the first entry exactly.
        let shared = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let distinct = vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        let (hot, durable, _) = service_parts();
        let embeddings = Arc::new(
            MockEmbeddingProvider::new("mock", DIM)
                .with_vector("the question", distinct)
                .with_vector("other question", shared.clone()),
        );
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("the question", "direct").await.unwrap();
        service.set_cache("other question", "lookalike").await.unwrap();

        let outcome = service.lookup("the question", 0.1).await.unwrap();
        assert_eq!(
            outcome,
            CacheOutcome::Exact {
                value: "direct".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_miss() {
        let (hot, durable, _) = service_parts();
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let service = build_service(hot, durable.clone(), embeddings.clone(), test_config());

        service.set_cache("what is 2+2", "4").await.unwrap();

        // Provider dies between the write and the lookup
        embeddings.set_error("provider offline");

        let result = service.get_cached_result("a different question").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_provider_failure_still_stores_entry() {
        let (hot, durable, _) = service_parts();
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM).with_error("down"));
        let service = build_service(hot, durable.clone(), embeddings, test_config());

        service.set_cache("what is 2+2", "4").await.unwrap();

        let stored = durable.get_by_key("what is 2+2").await.unwrap().unwrap();
        assert!(!stored.has_embedding());

        // Exact path still works without any embedding
        let result = service.get_cached_result("what is 2+2").await.unwrap();
        assert_eq!(result, Some("4".to_string()));
    }

    #[tokio::test]
    async fn test_read_only_store_never_fabricates_hits() {
        let (hot, durable, embeddings) = service_parts();
        durable.set_read_only(true);
        let config = test_config().with_lexical_enabled(false);
        let service = build_service(hot, durable, embeddings, config);

        service.set_cache("what is 2+2", "4").await.unwrap();

        let result = service.get_cached_result("what is 2+2").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_read_only_store_skips_hot_mirror() {
        let hot = Arc::new(MockHotTier::new());
        let durable = Arc::new(InMemoryDurableTier::new());
        durable.set_read_only(true);
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let service = build_service(hot.clone(), durable, embeddings, test_config());

        service.set_cache("what is 2+2", "4").await.unwrap();

        // No durable entry was written, so no hot projection either
        assert!(hot.is_empty());
        let result = service.get_cached_result("what is 2+2").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_durable_failure_degrades_everywhere() {
        use crate::domain::durable_tier::mock::FailingDurableTier;

        let hot = Arc::new(MockHotTier::new());
        let durable = Arc::new(FailingDurableTier::new("connection refused"));
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let service = build_service(hot, durable, embeddings, test_config());

        assert_eq!(service.get_cached_result("q").await.unwrap(), None);
        service.set_cache("q", "v").await.unwrap();
    }

    #[tokio::test]
    async fn test_hot_tier_failure_degrades_to_semantic_path() {
        let hot = Arc::new(MockHotTier::new().with_error("redis down"));
        let durable = Arc::new(InMemoryDurableTier::new());
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("what is 2+2", "4").await.unwrap();

        let result = service.get_cached_result("what is 2+2").await.unwrap();
        assert_eq!(result, Some("4".to_string()));
    }

    #[tokio::test]
    async fn test_lexical_hit_from_hot_tier() {
        let hot = Arc::new(MockHotTier::new().with_entry("what is 2+2", "4"));
        let durable = Arc::new(InMemoryDurableTier::new());
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let service = build_service(hot, durable, embeddings, test_config());

        let outcome = service.lookup("what is 2+3", 0.9).await.unwrap();
        assert!(matches!(outcome, CacheOutcome::Lexical { .. }));
        assert_eq!(outcome.into_value(), Some("4".to_string()));
    }

    #[tokio::test]
    async fn test_lexical_disabled_skips_hot_tier() {
        let hot = Arc::new(MockHotTier::new().with_entry("what is 2+2", "4"));
        let durable = Arc::new(InMemoryDurableTier::new());
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let config = test_config().with_lexical_enabled(false);
        let service = build_service(hot, durable, embeddings, config);

        let result = service.get_cached_result("what is 2+3").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_pagination_visits_whole_corpus() {
        // 5 entries with page_size 2; best match sits on the last page
        let query = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        let durable = Arc::new(InMemoryDurableTier::new());
        let mut provider = MockEmbeddingProvider::new("mock", DIM).with_vector("probe", query);

        for i in 0..5 {
            let x = 0.91 + i as f32 * 0.005;
            let y = (1.0f32 - x * x).sqrt();
            let vector = vec![x, y, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            provider = provider.with_vector(&format!("entry {}", i), vector);
        }

        let embeddings = Arc::new(provider);
        let hot = Arc::new(MockHotTier::new());
        let config = test_config()
            .with_lexical_enabled(false)
            .with_early_exit_score(0.999);
        let service = build_service(hot, durable, embeddings, config);

        for i in 0..5 {
            service
                .set_cache(&format!("entry {}", i), &format!("answer {}", i))
                .await
                .unwrap();
        }

        // "entry 4" carries the highest similarity and lives on page 3 of 3
        let outcome = service.lookup("probe", 0.9).await.unwrap();
        assert_eq!(outcome.into_value(), Some("answer 4".to_string()));
    }

    #[tokio::test]
    async fn test_early_exit_stops_at_confident_match() {
        let query = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        let durable = Arc::new(InMemoryDurableTier::new());
        let provider = MockEmbeddingProvider::new("mock", DIM)
            .with_vector("probe", query)
            // page 0 already clears the confidence cutoff at ~0.96
            .with_vector("aaa first", vec![0.96, 0.28, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            // page 1 would score higher, but must never be visited
            .with_vector("zzz later", vec![0.99, 0.14107, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let embeddings = Arc::new(provider);
        let hot = Arc::new(MockHotTier::new());
        let config = test_config()
            .with_lexical_enabled(false)
            .with_page_size(1)
            .with_early_exit_score(0.95);
        let service = build_service(hot, durable, embeddings, config);

        service.set_cache("aaa first", "early").await.unwrap();
        service.set_cache("zzz later", "late").await.unwrap();

        let outcome = service.lookup("probe", 0.9).await.unwrap();
        assert_eq!(outcome.into_value(), Some("early".to_string()));
    }

    #[tokio::test]
    async fn test_backfill_populates_missing_embeddings() {
        let (hot, durable, _) = service_parts();
        let embeddings = Arc::new(MockEmbeddingProvider::new("mock", DIM).with_error("down"));
        let service = build_service(hot.clone(), durable.clone(), embeddings, test_config());

        // Written while the provider was down: no embeddings
        service.set_cache("first question", "a1").await.unwrap();
        service.set_cache("second question", "a2").await.unwrap();
        assert!(durable.scan_embedding_page(0, 10).await.unwrap().is_empty());

        // Provider recovers; rebuild the service around a healthy one
        let healthy = Arc::new(MockEmbeddingProvider::new("mock", DIM));
        let service = build_service(hot, durable.clone(), healthy, test_config());

        let updated = service.backfill_embeddings(10).await.unwrap();
        assert_eq!(updated, 2);

        let page = durable.scan_embedding_page(0, 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|e| e.has_embedding()));
    }

    #[tokio::test]
    async fn test_backfill_noop_when_read_only() {
        let (hot, durable, embeddings) = service_parts();
        durable.set_read_only(true);
        let service = build_service(hot, durable, embeddings, test_config());

        let updated = service.backfill_embeddings(10).await.unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_count_reflects_upserts() {
        let (hot, durable, embeddings) = service_parts();
        let service = build_service(hot, durable, embeddings, test_config());

        service.set_cache("q1", "a").await.unwrap();
        service.set_cache("q2", "b").await.unwrap();
        service.set_cache(" Q1 ", "c").await.unwrap();

        assert_eq!(service.count().await.unwrap(), 2);
    }
}
