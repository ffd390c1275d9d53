//! Similarity worker pool
//!
//! Cosine scoring is CPU-bound, so each page of candidates is handed to a
//! blocking task off the async runtime. A panicking page surfaces as an
//! error here and is absorbed by the orchestrator as "no improvement"; it
//! can never take the lookup down.

use tracing::debug;

use crate::domain::embedding::cosine_similarity;
use crate::domain::entry::CacheEntry;
use crate::domain::DomainError;

/// Result of scoring one page of candidates
#[derive(Debug)]
pub struct PageScore {
    /// The candidate that beat the incoming bound, if any
    pub best_match: Option<CacheEntry>,
    /// The winning score, or the unchanged bound when nothing qualified
    pub best_score: f32,
}

/// Dispatches pages of candidate entries to blocking scoring tasks
///
/// Stateless; callers drive at most one page at a time per lookup, so no
/// queueing or ordering machinery is needed.
#[derive(Debug, Default, Clone)]
pub struct ScoringPool;

impl ScoringPool {
    pub fn new() -> Self {
        Self
    }

    /// Scores a page of candidates against the query vector
    ///
    /// Returns the best candidate whose cosine similarity strictly exceeds
    /// `current_best`, or no match with the bound unchanged. Candidates
    /// without an embedding, with a mismatched dimensionality or with a
    /// zero-magnitude vector score 0 and can never qualify.
    pub async fn score_page(
        &self,
        query: &[f32],
        candidates: Vec<CacheEntry>,
        current_best: f32,
    ) -> Result<PageScore, DomainError> {
        let query = query.to_vec();

        tokio::task::spawn_blocking(move || score_candidates(&query, candidates, current_best))
            .await
            .map_err(|e| DomainError::internal(format!("Scoring task failed: {}", e)))
    }
}

fn score_candidates(query: &[f32], candidates: Vec<CacheEntry>, current_best: f32) -> PageScore {
    let mut best_match = None;
    let mut best_score = current_best;

    for candidate in candidates {
        let Some(embedding) = candidate.embedding() else {
            continue;
        };

        let score = cosine_similarity(query, embedding);

        if score > best_score {
            best_score = score;
            best_match = Some(candidate);
        }
    }

    if let Some(ref entry) = best_match {
        debug!(
            "Page best: key '{}' at score {:.4}",
            entry.key(),
            best_score
        );
    }

    PageScore {
        best_match,
        best_score,
    }
}
