//! Infrastructure layer - External service implementations

pub mod durable_tier;
pub mod embedding;
pub mod hot_tier;
pub mod http_client;
pub mod logging;
pub mod scoring;
pub mod services;
