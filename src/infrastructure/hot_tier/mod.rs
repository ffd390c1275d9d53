//! Hot tier infrastructure - ephemeral store implementations

mod in_memory;
mod redis;

pub use in_memory::{InMemoryHotTier, InMemoryHotTierConfig};
pub use redis::{RedisHotTier, RedisHotTierConfig};
