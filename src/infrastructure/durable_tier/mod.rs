//! Durable tier infrastructure - persistent store implementations

mod in_memory;
mod postgres;

pub use in_memory::InMemoryDurableTier;
pub use postgres::{PostgresDurableTier, PostgresDurableTierConfig};
