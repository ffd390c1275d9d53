//! Hot tier trait definition
//!
//! The hot tier is an ephemeral, TTL-bound projection of durable entries.
//! Losing it, or missing in it, carries no meaning beyond a slower lookup.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Ephemeral key-value store with TTL and lexical probing over its
/// currently-resident key set
#[async_trait]
pub trait HotTier: Send + Sync + Debug {
    /// Looks up a key verbatim
    async fn get_exact(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Scans resident keys for the lexically closest one at or above
    /// `min_similarity`, returning its value
    async fn get_fuzzy(
        &self,
        key: &str,
        min_similarity: f64,
    ) -> Result<Option<String>, DomainError>;

    /// Stores a value under a key with a time-to-live
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::domain::lexical;

    /// Mock hot tier for testing, with error injection
    #[derive(Debug, Default)]
    pub struct MockHotTier {
        entries: Mutex<HashMap<String, String>>,
        error: Mutex<Option<String>>,
    }

    impl MockHotTier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entry(self, key: &str, value: &str) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl HotTier for MockHotTier {
        async fn get_exact(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check_error()?;
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn get_fuzzy(
            &self,
            key: &str,
            min_similarity: f64,
        ) -> Result<Option<String>, DomainError> {
            self.check_error()?;
            let entries = self.entries.lock().unwrap();

            let best = entries
                .iter()
                .map(|(k, v)| (lexical::similarity(key, k), v))
                .filter(|(sim, _)| *sim >= min_similarity)
                .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            Ok(best.map(|(_, v)| v.clone()))
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), DomainError> {
            self.check_error()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_exact() {
            let tier = MockHotTier::new().with_entry("hello", "world");

            assert_eq!(
                tier.get_exact("hello").await.unwrap(),
                Some("world".to_string())
            );
            assert_eq!(tier.get_exact("missing").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_mock_fuzzy_best_match() {
            let tier = MockHotTier::new()
                .with_entry("what is 2+2", "4")
                .with_entry("completely unrelated", "nope");

            let hit = tier.get_fuzzy("what is 2+3", 0.8).await.unwrap();
            assert_eq!(hit, Some("4".to_string()));
        }

        #[tokio::test]
        async fn test_mock_fuzzy_respects_bound() {
            let tier = MockHotTier::new().with_entry("what is 2+2", "4");

            let hit = tier.get_fuzzy("tell me a story", 0.8).await.unwrap();
            assert_eq!(hit, None);
        }

        #[tokio::test]
        async fn test_mock_error_injection() {
            let tier = MockHotTier::new().with_error("redis down");

            assert!(tier.get_exact("k").await.is_err());
            assert!(tier.set("k", "v", Duration::from_secs(1)).await.is_err());
        }
    }
}
