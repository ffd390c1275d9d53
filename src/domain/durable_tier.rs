//! Durable tier trait definition
//!
//! The durable tier holds the canonical corpus of cache entries. It is the
//! source of truth for both the exact-match index and the semantic scan.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::entry::CacheEntry;
use crate::domain::DomainError;

/// Persistent document store for cache entries, queried by unique index and
/// scanned in pages by embedding presence
#[async_trait]
pub trait DurableTier: Send + Sync + Debug {
    /// O(1) probe via the unique fingerprint index
    async fn get_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<CacheEntry>, DomainError>;

    /// O(1) probe via the unique key index, used for dedup on write
    async fn get_by_key(&self, key: &str) -> Result<Option<CacheEntry>, DomainError>;

    /// Returns one page of entries that carry an embedding, in a stable
    /// ordering. An empty page signals scan exhaustion.
    async fn scan_embedding_page(
        &self,
        page_index: u64,
        page_size: u64,
    ) -> Result<Vec<CacheEntry>, DomainError>;

    /// Returns up to `limit` entries still lacking an embedding, for
    /// backfill. Entries leave this set once upserted with an embedding.
    async fn scan_unembedded_page(&self, limit: u64) -> Result<Vec<CacheEntry>, DomainError>;

    /// Insert-or-replace keyed by the entry's key. Idempotent; a silent
    /// no-op while the adapter is in read-only mode.
    async fn upsert(&self, entry: &CacheEntry) -> Result<(), DomainError>;

    /// Total number of stored entries. Diagnostic only.
    async fn count(&self) -> Result<u64, DomainError>;

    /// Whether the adapter detected a read-only backing store at connect
    /// time
    fn is_read_only(&self) -> bool;
}
