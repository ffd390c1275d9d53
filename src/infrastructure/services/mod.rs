//! Service layer - orchestration over the adapters

mod answer_cache_service;

pub use answer_cache_service::AnswerCacheService;
