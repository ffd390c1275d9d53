//! In-memory durable tier implementation
//!
//! Keeps the whole corpus in a BTreeMap so pagination sees the same stable
//! key ordering as the SQL implementation. Suitable for development and
//! tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::durable_tier::DurableTier;
use crate::domain::entry::CacheEntry;
use crate::domain::DomainError;

/// In-memory durable tier
#[derive(Debug, Default)]
pub struct InMemoryDurableTier {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    read_only: AtomicBool,
}

impl InMemoryDurableTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the adapter into (or out of) read-only mode
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn lock_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, CacheEntry>>, DomainError> {
        self.entries
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn lock_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, CacheEntry>>, DomainError> {
        self.entries
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl DurableTier for InMemoryDurableTier {
    async fn get_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<CacheEntry>, DomainError> {
        let entries = self.lock_read()?;

        Ok(entries
            .values()
            .find(|e| e.fingerprint() == fingerprint)
            .cloned())
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        let entries = self.lock_read()?;
        Ok(entries.get(key).cloned())
    }

    async fn scan_embedding_page(
        &self,
        page_index: u64,
        page_size: u64,
    ) -> Result<Vec<CacheEntry>, DomainError> {
        let entries = self.lock_read()?;

        Ok(entries
            .values()
            .filter(|e| e.has_embedding())
            .skip((page_index * page_size) as usize)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn scan_unembedded_page(&self, limit: u64) -> Result<Vec<CacheEntry>, DomainError> {
        let entries = self.lock_read()?;

        Ok(entries
            .values()
            .filter(|e| !e.has_embedding())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), DomainError> {
        if self.is_read_only() {
            debug!(
                "Durable tier is read-only; skipping upsert for key '{}'",
                entry.key()
            );
            return Ok(());
        }

        let mut entries = self.lock_write()?;
        entries.insert(entry.key().to_string(), entry.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.lock_read()?.len() as u64)
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}
