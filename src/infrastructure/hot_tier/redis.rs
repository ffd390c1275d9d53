//! Redis hot tier implementation
//!
//! Availability is advisory here: when Redis is down, reads answer "unknown"
//! and writes are skipped, and the adapter keeps trying to come back on
//! later calls without ever failing the caller.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::hot_tier::HotTier;
use crate::domain::{lexical, DomainError};

/// Configuration for the Redis hot tier
#[derive(Debug, Clone)]
pub struct RedisHotTierConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: String,
    /// Consecutive errors logged before further ones are silenced
    pub error_log_limit: u32,
}

impl Default for RedisHotTierConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "cache".to_string(),
            error_log_limit: 3,
        }
    }
}

impl RedisHotTierConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the error log limit
    pub fn with_error_log_limit(mut self, limit: u32) -> Self {
        self.error_log_limit = limit;
        self
    }
}

/// Redis-backed hot tier
///
/// Tracks its own connected/connecting state; at most one reconnection
/// attempt is in flight at a time, and consecutive error logging is
/// rate-limited until the next successful reconnect.
pub struct RedisHotTier {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    connected: AtomicBool,
    connecting: AtomicBool,
    error_count: AtomicU32,
    config: RedisHotTierConfig,
}

impl fmt::Debug for RedisHotTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisHotTier")
            .field("config", &self.config)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisHotTier {
    /// Creates the adapter without connecting; call [`connect`] afterwards
    ///
    /// [`connect`]: RedisHotTier::connect
    pub fn new(config: RedisHotTierConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            connected: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            error_count: AtomicU32::new(0),
            config,
        })
    }

    /// Establishes the initial connection
    ///
    /// Failure leaves the adapter usable in disconnected state; later
    /// operations retry on their own.
    pub async fn connect(&self) -> Result<(), DomainError> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let result = self.establish().await;
        self.connecting.store(false, Ordering::SeqCst);
        result
    }

    /// Drops the connection and stops serving from the hot tier
    pub async fn close(&self) {
        *self.connection.write().await = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn establish(&self) -> Result<(), DomainError> {
        match ConnectionManager::new(self.client.clone()).await {
            Ok(manager) => {
                *self.connection.write().await = Some(manager);
                self.connected.store(true, Ordering::SeqCst);
                self.error_count.store(0, Ordering::SeqCst);
                info!("Connected to Redis hot tier");
                Ok(())
            }
            Err(e) => {
                let err = DomainError::cache(format!("Redis connection failed: {}", e));
                self.log_error("connect", &err);
                Err(err)
            }
        }
    }

    /// Best-effort reconnect; duplicate attempts while one is in flight are
    /// suppressed
    async fn reconnect_if_needed(&self) {
        if self.is_connected() {
            return;
        }

        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        warn!("Attempting to reconnect to Redis hot tier");
        let _ = self.establish().await;
        self.connecting.store(false, Ordering::SeqCst);
    }

    fn mark_disconnected(&self, context: &str, err: &DomainError) {
        self.connected.store(false, Ordering::SeqCst);
        self.log_error(context, err);
    }

    fn log_error(&self, context: &str, err: &DomainError) {
        let count = self.error_count.load(Ordering::SeqCst);

        if count < self.config.error_log_limit {
            error!("Redis hot tier error during {}: {}", context, err);
            let new_count = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;

            if new_count == self.config.error_log_limit {
                warn!("Reached Redis error log limit; further errors will be silenced");
            }
        }
    }

    fn prefix_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    fn key_pattern(&self) -> String {
        format!("{}:*", self.config.key_prefix)
    }

    async fn current_connection(&self) -> Option<ConnectionManager> {
        self.connection.read().await.clone()
    }

    /// Enumerates live keys under the adapter's prefix via SCAN
    async fn scan_keys(&self, conn: &mut ConnectionManager) -> Result<Vec<String>, DomainError> {
        let pattern = self.key_pattern();
        let mut cursor = 0u64;
        let mut keys = Vec::new();

        loop {
            let (new_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to scan keys: {}", e)))?;

            keys.extend(batch);
            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl HotTier for RedisHotTier {
    async fn get_exact(&self, key: &str) -> Result<Option<String>, DomainError> {
        self.reconnect_if_needed().await;

        let Some(mut conn) = self.current_connection().await else {
            return Ok(None);
        };

        if !self.is_connected() {
            return Ok(None);
        }

        let prefixed = self.prefix_key(key);

        match conn.get::<_, Option<String>>(&prefixed).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.mark_disconnected(
                    "get_exact",
                    &DomainError::cache(format!("Failed to get key '{}': {}", key, e)),
                );
                Ok(None)
            }
        }
    }

    async fn get_fuzzy(
        &self,
        key: &str,
        min_similarity: f64,
    ) -> Result<Option<String>, DomainError> {
        self.reconnect_if_needed().await;

        let Some(mut conn) = self.current_connection().await else {
            return Ok(None);
        };

        if !self.is_connected() {
            return Ok(None);
        }

        let keys = match self.scan_keys(&mut conn).await {
            Ok(keys) => keys,
            Err(e) => {
                self.mark_disconnected("get_fuzzy", &e);
                return Ok(None);
            }
        };

        let prefix = format!("{}:", self.config.key_prefix);
        let mut best: Option<(f64, &String)> = None;

        for stored in &keys {
            let Some(stored_key) = stored.strip_prefix(&prefix) else {
                continue;
            };

            let sim = lexical::similarity(key, stored_key);

            if sim >= min_similarity && best.is_none_or(|(b, _)| sim > b) {
                best = Some((sim, stored));
            }
        }

        let Some((similarity, matched)) = best else {
            return Ok(None);
        };

        match conn.get::<_, Option<String>>(matched).await {
            Ok(value) => {
                debug!(
                    "Hot tier fuzzy hit with similarity {:.4} on key '{}'",
                    similarity, matched
                );
                Ok(value)
            }
            Err(e) => {
                self.mark_disconnected(
                    "get_fuzzy",
                    &DomainError::cache(format!("Failed to get key '{}': {}", matched, e)),
                );
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        self.reconnect_if_needed().await;

        let Some(mut conn) = self.current_connection().await else {
            debug!("Hot tier disconnected; skipping set for key '{}'", key);
            return Ok(());
        };

        if !self.is_connected() {
            debug!("Hot tier disconnected; skipping set for key '{}'", key);
            return Ok(());
        }

        let prefixed = self.prefix_key(key);
        let ttl_secs = ttl.as_secs().max(1);

        if let Err(e) = conn.set_ex::<_, _, ()>(&prefixed, value, ttl_secs).await {
            self.mark_disconnected(
                "set",
                &DomainError::cache(format!("Failed to set key '{}': {}", key, e)),
            );
        }

        Ok(())
    }
}
