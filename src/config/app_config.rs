use serde::Deserialize;

use crate::domain::EngineConfig;

/// Application configuration
///
/// Layered from `config/default`, `config/local` and `APP__`-prefixed
/// environment variables (e.g. `APP__HOT_TIER__URL`). Every section has
/// working defaults so a bare environment still produces a usable config.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub hot_tier: HotTierSettings,
    #[serde(default)]
    pub durable_tier: DurableTierSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotTierSettings {
    /// Redis connection URL; empty disables the Redis hot tier in favor of
    /// the in-memory one
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_error_log_limit")]
    pub error_log_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DurableTierSettings {
    pub url: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    /// Voyage AI API key
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_key_prefix() -> String {
    "cache".to_string()
}

fn default_error_log_limit() -> u32 {
    3
}

fn default_table_name() -> String {
    "answer_cache".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_embedding_base_url() -> String {
    "https://api.voyageai.com".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for HotTierSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: default_key_prefix(),
            error_log_limit: default_error_log_limit(),
        }
    }
}

impl Default for DurableTierSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/answer_cache".to_string(),
            table_name: default_table_name(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_embedding_base_url(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
