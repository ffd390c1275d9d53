//! PostgreSQL durable tier implementation with connection pooling

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, warn};

use crate::domain::durable_tier::DurableTier;
use crate::domain::entry::CacheEntry;
use crate::domain::{fingerprint, DomainError};

/// SQLSTATE codes that mean the store rejected a write for authorization
/// reasons rather than transient failure
const READ_ONLY_SQLSTATES: &[&str] = &["42501", "25006", "28000"];

const WRITABILITY_PROBE_KEY: &str = "__writability_probe__";

/// PostgreSQL durable tier configuration
#[derive(Debug, Clone)]
pub struct PostgresDurableTierConfig {
    /// Database connection URL
    pub url: String,
    /// Table holding the cache entries
    pub table_name: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresDurableTierConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/answer_cache".to_string(),
            table_name: "answer_cache".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresDurableTierConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// PostgreSQL durable tier
///
/// Entries live in a single table keyed by the normalized input, with a
/// unique index on the fingerprint and an explicit has_embedding flag
/// driving the semantic scan. Writability is probed once at connect time;
/// an authorization rejection flips the adapter into read-only mode for its
/// lifetime.
pub struct PostgresDurableTier {
    pool: PgPool,
    table_name: String,
    read_only: AtomicBool,
}

impl fmt::Debug for PostgresDurableTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDurableTier")
            .field("table_name", &self.table_name)
            .field("read_only", &self.read_only.load(Ordering::Relaxed))
            .finish()
    }
}

impl PostgresDurableTier {
    /// Connects the pool, ensures the schema and probes writability
    pub async fn connect(config: &PostgresDurableTierConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        let tier = Self::new(pool, config.table_name.clone());

        if let Err(e) = tier.ensure_schema().await {
            warn!("Could not ensure cache schema (continuing): {}", e);
        }

        tier.probe_writability().await;

        Ok(tier)
    }

    /// Wraps an existing pool without probing; used by tests
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
            read_only: AtomicBool::new(false),
        }
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Ensures the cache table and its fingerprint index exist
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                value TEXT NOT NULL,
                embedding REAL[],
                has_embedding BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table_name
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        let create_index = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {0}_fingerprint_idx ON {0} (fingerprint)",
            self.table_name
        );

        sqlx::query(&create_index)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    /// One disposable write/delete cycle; an authorization rejection makes
    /// the adapter read-only for its lifetime
    async fn probe_writability(&self) {
        let insert = format!(
            r#"
            INSERT INTO {} (key, fingerprint, value, has_embedding)
            VALUES ($1, $2, '', FALSE)
            ON CONFLICT (key) DO UPDATE SET updated_at = NOW()
            "#,
            self.table_name
        );

        let probe_fp = fingerprint::fingerprint(WRITABILITY_PROBE_KEY);

        let result = sqlx::query(&insert)
            .bind(WRITABILITY_PROBE_KEY)
            .bind(&probe_fp)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                let delete = format!("DELETE FROM {} WHERE key = $1", self.table_name);
                if let Err(e) = sqlx::query(&delete)
                    .bind(WRITABILITY_PROBE_KEY)
                    .execute(&self.pool)
                    .await
                {
                    warn!("Failed to clean up writability probe: {}", e);
                }
            }
            Err(e) => {
                if is_authorization_error(&e) {
                    warn!("Durable tier rejected the probe write; entering read-only mode");
                    self.read_only.store(true, Ordering::SeqCst);
                } else {
                    warn!("Writability probe failed for a non-authorization reason: {}", e);
                }
            }
        }
    }

    fn entry_from_row(row: &PgRow) -> Result<CacheEntry, DomainError> {
        let key: String = row
            .try_get("key")
            .map_err(|e| DomainError::storage(format!("Failed to read key column: {}", e)))?;
        let fingerprint: String = row
            .try_get("fingerprint")
            .map_err(|e| DomainError::storage(format!("Failed to read fingerprint column: {}", e)))?;
        let value: String = row
            .try_get("value")
            .map_err(|e| DomainError::storage(format!("Failed to read value column: {}", e)))?;
        let embedding: Option<Vec<f32>> = row
            .try_get("embedding")
            .map_err(|e| DomainError::storage(format!("Failed to read embedding column: {}", e)))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| DomainError::storage(format!("Failed to read created_at column: {}", e)))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| DomainError::storage(format!("Failed to read updated_at column: {}", e)))?;

        Ok(CacheEntry::from_parts(
            key,
            fingerprint,
            value,
            embedding,
            created_at,
            updated_at,
        ))
    }

    async fn fetch_one_by(
        &self,
        column: &str,
        needle: &str,
    ) -> Result<Option<CacheEntry>, DomainError> {
        let query = format!(
            "SELECT key, fingerprint, value, embedding, created_at, updated_at \
             FROM {} WHERE {} = $1",
            self.table_name, column
        );

        let row = sqlx::query(&query)
            .bind(needle)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to query by {}: {}", column, e)))?;

        row.as_ref().map(Self::entry_from_row).transpose()
    }
}

fn is_authorization_error(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| READ_ONLY_SQLSTATES.contains(&code.as_ref()))
}

#[async_trait]
impl DurableTier for PostgresDurableTier {
    async fn get_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<CacheEntry>, DomainError> {
        self.fetch_one_by("fingerprint", fingerprint).await
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        self.fetch_one_by("key", key).await
    }

    async fn scan_embedding_page(
        &self,
        page_index: u64,
        page_size: u64,
    ) -> Result<Vec<CacheEntry>, DomainError> {
        let query = format!(
            "SELECT key, fingerprint, value, embedding, created_at, updated_at \
             FROM {} WHERE has_embedding ORDER BY key OFFSET $1 LIMIT $2",
            self.table_name
        );

        let offset = (page_index * page_size) as i64;

        let rows = sqlx::query(&query)
            .bind(offset)
            .bind(page_size as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to scan embedding page: {}", e)))?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn scan_unembedded_page(&self, limit: u64) -> Result<Vec<CacheEntry>, DomainError> {
        let query = format!(
            "SELECT key, fingerprint, value, embedding, created_at, updated_at \
             FROM {} WHERE NOT has_embedding ORDER BY key LIMIT $1",
            self.table_name
        );

        let rows = sqlx::query(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to scan unembedded page: {}", e)))?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), DomainError> {
        if self.is_read_only() {
            debug!(
                "Durable tier is read-only; skipping upsert for key '{}'",
                entry.key()
            );
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO {} (key, fingerprint, value, embedding, has_embedding, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (key) DO UPDATE SET
                fingerprint = EXCLUDED.fingerprint,
                value = EXCLUDED.value,
                embedding = EXCLUDED.embedding,
                has_embedding = EXCLUDED.has_embedding,
                updated_at = NOW()
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(entry.key())
            .bind(entry.fingerprint())
            .bind(entry.value())
            .bind(entry.embedding().map(|e| e.to_vec()))
            .bind(entry.has_embedding())
            .bind(entry.created_at())
            .bind(entry.updated_at())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to upsert entry: {}", e)))?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let query = format!("SELECT COUNT(*) as count FROM {}", self.table_name);

        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count entries: {}", e)))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| DomainError::storage(format!("Failed to read count: {}", e)))?;

        Ok(count as u64)
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}
